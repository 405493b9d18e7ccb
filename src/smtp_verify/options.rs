use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration knobs for [`probe`](crate::smtp_verify::probe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpProbeOptions {
    pub helo_domain: String,
    /// Envelope sender. Empty means the null reverse-path `<>`.
    pub mail_from: String,
    /// Deadline for the whole probe, every candidate host included.
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub max_mx: usize,
    pub port: u16,
}

impl Default for SmtpProbeOptions {
    fn default() -> Self {
        Self {
            helo_domain: "localhost".to_string(),
            mail_from: "check@localhost".to_string(),
            timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
            command_timeout_ms: 5_000,
            max_mx: 3,
            port: 25,
        }
    }
}

impl SmtpProbeOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn helo_name(&self) -> &str {
        let trimmed = self.helo_domain.trim();
        if trimmed.is_empty() { "localhost" } else { trimmed }
    }

    pub fn mail_from_command(&self) -> String {
        format!("MAIL FROM:<{}>", self.mail_from.trim())
    }
}
