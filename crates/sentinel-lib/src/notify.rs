//! Slack notification delivery
//!
//! Best-effort operational notifications via an incoming webhook. Delivery
//! returns a boolean and never an error: a dropped notification must not
//! fail the action that triggered it. With no webhook configured the
//! notifier is disabled and every send reports `false`.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::warn;
use url::Url;

use crate::models::{AdUnit, CycleSummary, KillReason};

/// Sidebar color per severity, Slack attachment hex values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    fn color(&self) -> &'static str {
        match self {
            Severity::Info => "#2196f3",
            Severity::Success => "#4caf50",
            Severity::Warning => "#ff9800",
            Severity::Error => "#f44336",
        }
    }
}

#[derive(Debug, Serialize)]
struct Payload {
    attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
struct Attachment {
    color: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<Field>,
}

#[derive(Debug, Serialize)]
struct Field {
    title: String,
    value: String,
    short: bool,
}

/// Best-effort Slack webhook notifier.
pub struct SlackNotifier {
    webhook_url: Option<Url>,
    client: Client,
}

impl SlackNotifier {
    /// Build a notifier; an absent or unparseable webhook URL disables it.
    pub fn new(webhook_url: Option<String>) -> Self {
        let webhook_url = webhook_url.and_then(|raw| match Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "Invalid Slack webhook URL, notifications disabled");
                None
            }
        });

        Self {
            webhook_url,
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    /// A notifier that drops everything. Used when no webhook is configured
    /// and in tests.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Deliver one message. Returns whether delivery succeeded.
    pub async fn send(
        &self,
        message: &str,
        title: Option<&str>,
        severity: Severity,
        fields: &[(&str, String)],
    ) -> bool {
        let Some(url) = &self.webhook_url else {
            return false;
        };

        let payload = Payload {
            attachments: vec![Attachment {
                color: severity.color(),
                text: message.to_string(),
                title: title.map(str::to_string),
                fields: fields
                    .iter()
                    .map(|(title, value)| Field {
                        title: (*title).to_string(),
                        value: value.clone(),
                        short: true,
                    })
                    .collect(),
            }],
        };

        match self.client.post(url.clone()).json(&payload).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Slack notification delivery failed");
                false
            }
        }
    }

    pub async fn notify_unit_paused(&self, unit: &AdUnit, reason: KillReason) -> bool {
        self.send(
            "An underperforming ad was automatically paused.",
            Some("Ad paused"),
            Severity::Warning,
            &[
                ("Ad", format!("{} ({})", unit.name, unit.id)),
                ("Reason", reason.to_string()),
            ],
        )
        .await
    }

    pub async fn notify_budget_scaled(
        &self,
        unit: &AdUnit,
        old_budget: u64,
        new_budget: u64,
    ) -> bool {
        self.send(
            "A winning ad's budget was increased.",
            Some("Budget scaled"),
            Severity::Success,
            &[
                ("Ad", format!("{} ({})", unit.name, unit.id)),
                ("Ad set", unit.adset_id.clone()),
                ("Old budget", old_budget.to_string()),
                ("New budget", new_budget.to_string()),
            ],
        )
        .await
    }

    pub async fn notify_error(&self, error_msg: &str, context: Option<&str>) -> bool {
        let mut fields = vec![("Error", error_msg.to_string())];
        if let Some(context) = context {
            fields.push(("Context", context.to_string()));
        }

        self.send(
            "The ad monitor hit an operational error.",
            Some("Monitor error"),
            Severity::Error,
            &fields,
        )
        .await
    }

    pub async fn notify_loop_started(&self, interval: Duration, account_id: &str) -> bool {
        self.send(
            "Ad performance monitoring started.",
            Some("Monitor started"),
            Severity::Info,
            &[
                ("Interval", format!("{}m", interval.as_secs() / 60)),
                ("Account", account_id.to_string()),
            ],
        )
        .await
    }

    pub async fn notify_loop_stopped(&self) -> bool {
        self.send(
            "Ad performance monitoring stopped.",
            Some("Monitor stopped"),
            Severity::Warning,
            &[],
        )
        .await
    }

    /// Cycle summary, sent only when something changed.
    pub async fn notify_cycle_summary(&self, summary: &CycleSummary, elapsed: Duration) -> bool {
        self.send(
            "Monitoring cycle complete.",
            Some("Cycle summary"),
            if summary.errors == 0 {
                Severity::Info
            } else {
                Severity::Warning
            },
            &[
                ("Total ads", summary.total.to_string()),
                ("Paused", summary.paused.to_string()),
                ("Scaled", summary.scaled.to_string()),
                ("Errors", summary.errors.to_string()),
                ("Duration", format!("{:.1}s", elapsed.as_secs_f64())),
            ],
        )
        .await
    }
}
