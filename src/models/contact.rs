use serde::{Deserialize, Serialize};

/// Contact form submission body
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContactMessage {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Org")]
    pub org: String,
    /// Free-form reply details (usually an email address)
    #[serde(default, alias = "Details")]
    pub details: String,
    #[serde(default, alias = "Msg")]
    pub msg: String,
}

/// Contact form submission as recorded in the mail log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MailLogEntry {
    pub timestamp: i64,
    pub host: String,
    pub name: String,
    pub org: String,
    pub details: String,
    pub msg: String,
    pub ip: String,
}

impl MailLogEntry {
    pub fn from_message(message: ContactMessage, host: &str, ip: &str, timestamp: i64) -> Self {
        Self {
            timestamp,
            host: host.to_string(),
            name: message.name,
            org: message.org,
            details: message.details,
            msg: message.msg,
            ip: ip.to_string(),
        }
    }
}
