//! Notifier that writes alerts to the log.

use super::{AlertMessage, NotificationError, Notifier};
use crate::alert::{AlertEvent, AlertRule};
use crate::config::StationConfig;

/// Logs every alert at `info` level. Always configured, so a fired alert is
/// visible even when no other channel is.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(
        &self,
        rule: &AlertRule,
        event: &AlertEvent,
        station: &StationConfig,
    ) -> Result<(), NotificationError> {
        let message = AlertMessage::compose(rule, event, station);
        tracing::info!(
            rule = %rule.name,
            station = %station.key,
            recipients = ?message.recipients,
            "{}\n{}",
            message.subject,
            message.body
        );
        Ok(())
    }
}
