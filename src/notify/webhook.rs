//! Webhook notifier.

use serde::Serialize;
use std::time::Duration;

use super::{AlertMessage, NotificationError, Notifier};
use crate::alert::{AlertEvent, AlertRule};
use crate::config::StationConfig;

#[derive(Serialize)]
struct Payload<'a> {
    subject: &'a str,
    body: &'a str,
    recipients: &'a [String],
    event: &'a AlertEvent,
}

/// POSTs each alert as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn notify(
        &self,
        rule: &AlertRule,
        event: &AlertEvent,
        station: &StationConfig,
    ) -> Result<(), NotificationError> {
        let message = AlertMessage::compose(rule, event, station);
        let payload = Payload {
            subject: &message.subject,
            body: &message.body,
            recipients: &message.recipients,
            event,
        };

        // Blocking client: notifiers run on the blocking pool.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let response = client.post(&self.url).json(&payload).send()?;
        if !response.status().is_success() {
            return Err(NotificationError::Status(response.status()));
        }

        tracing::debug!(url = %self.url, rule = %rule.name, "Webhook delivered");
        Ok(())
    }
}
