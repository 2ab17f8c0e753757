//! Summary email delivery.
//!
//! Delivery is advisory: any subset of recipients can fail without
//! affecting the end-of-meeting result. Failures are aggregated into the
//! report, never raised.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::meeting::record::{ParticipantRecord, Summary};

/// Aggregated outcome of one delivery round.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailReport {
    pub sent_to: Vec<String>,
    pub failed_to: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

#[async_trait]
pub trait SummaryMailer: Send + Sync {
    async fn send_summary(
        &self,
        meeting_title: &str,
        summary: &Summary,
        recipients: &[Recipient],
    ) -> EmailReport;
}

/// Recipients with a deliverable address. Placeholder addresses the
/// presence layer synthesizes for guests are filtered out.
pub fn real_recipients(participants: &[ParticipantRecord]) -> Vec<Recipient> {
    participants
        .iter()
        .filter_map(|p| {
            let email = p.email.as_deref()?.trim();
            if !email.contains('@') || is_placeholder_address(email) {
                return None;
            }
            Some(Recipient {
                name: p.name.clone(),
                email: email.to_string(),
            })
        })
        .collect()
}

fn is_placeholder_address(email: &str) -> bool {
    let domain = email.rsplit('@').next().unwrap_or_default();
    domain.ends_with(".invalid") || domain == "example.com" || domain.ends_with(".example.com")
}

fn render_summary_text(meeting_title: &str, summary: &Summary) -> String {
    let bullet_list = |items: &[String]| {
        items
            .iter()
            .map(|i| format!("  - {}", i))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Summary for {}\n\n{}\n\nKey points:\n{}\n\nAction items:\n{}\n\nDecisions:\n{}\n",
        meeting_title,
        summary.content,
        bullet_list(&summary.key_points),
        bullet_list(&summary.action_items),
        bullet_list(&summary.decisions),
    )
}

/// Mailer that posts one message per recipient to an HTTP mail gateway.
pub struct HttpSummaryMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from_address: String,
}

impl HttpSummaryMailer {
    pub fn new(endpoint: String, api_key: Option<String>, from_address: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            from_address,
        }
    }

    async fn send_one(&self, recipient: &Recipient, subject: &str, body: &str) -> anyhow::Result<()> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "from": self.from_address,
            "to": recipient.email,
            "subject": subject,
            "text": body,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mail gateway returned {}: {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl SummaryMailer for HttpSummaryMailer {
    async fn send_summary(
        &self,
        meeting_title: &str,
        summary: &Summary,
        recipients: &[Recipient],
    ) -> EmailReport {
        let mut report = EmailReport::default();
        if self.endpoint.is_empty() {
            info!("Mail gateway not configured; skipping summary delivery");
            return report;
        }

        let subject = format!("Meeting summary: {}", meeting_title);
        let body = render_summary_text(meeting_title, summary);

        for recipient in recipients {
            match self.send_one(recipient, &subject, &body).await {
                Ok(()) => report.sent_to.push(recipient.email.clone()),
                Err(e) => {
                    warn!("Failed to send summary to {}: {:#}", recipient.email, e);
                    report.failed_to.push(recipient.email.clone());
                    report.errors.push(format!("{}: {:#}", recipient.email, e));
                }
            }
        }

        info!(
            "Summary delivery for '{}': {} sent, {} failed",
            meeting_title,
            report.sent_to.len(),
            report.failed_to.len()
        );
        report
    }
}
