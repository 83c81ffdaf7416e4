//! wxwatch - weather station alert checks.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wxwatch::config::{self, AppConfig};
use wxwatch::notify::{LogNotifier, Notifier, WebhookNotifier};
use wxwatch::scheduler::{run_pass, AlertChecks, Watcher};

/// Command line flags. Each overrides the matching `WXWATCH_*` variable.
#[derive(Debug, Parser)]
#[command(name = "wxwatch", version, about = "Weather station alert checks")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Station configuration file
    #[arg(long)]
    stations: Option<PathBuf>,

    /// Alert rule file
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Also POST fired alerts to this URL
    #[arg(long)]
    webhook: Option<String>,

    /// Repeat the checks every N seconds instead of running once
    #[arg(long, value_name = "SECONDS")]
    watch: Option<u64>,
}

impl Cli {
    fn apply(self, cfg: &mut AppConfig) {
        cfg.debug |= self.debug;
        if let Some(path) = self.stations {
            cfg.stations_path = path;
        }
        if let Some(path) = self.rules {
            cfg.rules_path = path;
        }
        if let Some(url) = self.webhook {
            cfg.webhook_url = Some(url);
        }
        if let Some(secs) = self.watch {
            cfg.watch_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut cfg = AppConfig::load();
    Cli::parse().apply(&mut cfg);

    // Initialize logging
    let level = if cfg.debug { "wxwatch=debug" } else { "wxwatch=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    // Load configuration
    let stations = config::load_stations(&cfg.stations_path)?;
    tracing::info!("Loaded {} stations from {}", stations.len(), cfg.stations_path.display());
    let rules = config::load_rules(&cfg.rules_path)?;

    let mut notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
    if let Some(url) = &cfg.webhook_url {
        tracing::info!("Forwarding alerts to {}", url);
        notifiers.push(Box::new(WebhookNotifier::new(url.clone(), cfg.webhook_timeout)));
    }

    let checks = Arc::new(AlertChecks::new(rules, stations, notifiers));

    match cfg.watch_interval {
        Some(interval) => Watcher::new(checks, interval).run().await,
        None => {
            run_pass(checks).await?;
        }
    }

    Ok(())
}
