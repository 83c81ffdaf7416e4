//! Human-readable alert messages.

use crate::alert::{format_number, AlertEvent, AlertRule};
use crate::config::StationConfig;

/// Subject, body and recipients of an alert notification.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

impl AlertMessage {
    pub fn compose(rule: &AlertRule, event: &AlertEvent, station: &StationConfig) -> Self {
        let station_name = station.display_name();
        let unit = &rule.unit;
        let current = event
            .trigger
            .last_value()
            .map(|v| format!("{}{unit}", format_number(v)))
            .unwrap_or_else(|| "N/A".to_string());

        let subject = format!("Weather Alert: {} at {}", rule.name, station_name);

        let body = format!(
            "A weather alert has been triggered for {station_name}.\n\
             \n\
             Alert Name: {name}\n\
             Type: {alert_type}\n\
             Threshold: {threshold}{unit}\n\
             Current Value: {current}\n\
             Last Update: {last_time}\n\
             Triggered At: {triggered_at}\n\
             Reason: {reason}\n\
             \n\
             Message: {message}\n\
             \n\
             A new alert can be triggered again after a cooldown period of {cooldown} minute(s).\n",
            name = rule.name,
            alert_type = rule.alert_type(),
            threshold = format_number(rule.threshold()),
            last_time = event.trigger.last_time(),
            triggered_at = event.triggered_at,
            reason = event.reason,
            message = rule.render_message(),
            cooldown = rule.cooldown_minutes,
        );

        Self {
            subject,
            body,
            recipients: rule.recipients.clone(),
        }
    }
}
