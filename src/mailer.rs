//! Contact form notification boundary
//!
//! Delivery itself is handled outside this service; the collector renders
//! the notification and hands it to a [`Mailer`].

use async_trait::async_trait;
use tracing::info;

use crate::models::MailLogEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl OutboundMail {
    /// Notification for a contact form submission on `entry.host`
    pub fn contact_submission(from: &str, to: &[String], entry: &MailLogEntry) -> Self {
        let body = format!(
            "Name: {}\nOrganisation: {}\nContact details: {}\nFrom IP: {}\n\n{}\n",
            entry.name, entry.org, entry.details, entry.ip, entry.msg
        );
        Self {
            from: from.to_string(),
            to: to.to_vec(),
            subject: format!("Contact form submission from {}", entry.host),
            body,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutboundMail) -> anyhow::Result<()>;
}

/// Mailer that records notifications in the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutboundMail) -> anyhow::Result<()> {
        info!(
            from = %mail.from,
            to = ?mail.to,
            subject = %mail.subject,
            "contact notification ready for delivery"
        );
        Ok(())
    }
}
