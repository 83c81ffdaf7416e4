//! Alert notification.
//!
//! A [`Notifier`] receives every fired alert once, after the alert has been
//! registered. Delivery failures are reported back to the caller, which
//! logs them; they never undo the registration.

mod log;
mod message;
mod webhook;

pub use self::log::*;
pub use message::*;
pub use webhook::*;

use crate::alert::{AlertEvent, AlertRule};
use crate::config::StationConfig;
use thiserror::Error;

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint answered {0}")]
    Status(reqwest::StatusCode),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Delivers fired alerts.
pub trait Notifier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn notify(
        &self,
        rule: &AlertRule,
        event: &AlertEvent,
        station: &StationConfig,
    ) -> Result<(), NotificationError>;
}
