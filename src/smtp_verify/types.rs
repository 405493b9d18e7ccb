use std::fmt;

use serde::{Deserialize, Serialize};

/// Step of the SMTP dialogue, used for error context and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Connect,
    Greeting,
    Ehlo,
    Helo,
    MailFrom,
    RcptTo,
    Quit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Greeting => "greeting",
            Self::Ehlo => "EHLO",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Quit => "QUIT",
        })
    }
}

/// Classification of the server's answer to `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    /// The mailbox was accepted with a 2xx reply.
    Confirmed,
    /// The mailbox was refused with a definitive 5xx reply.
    Rejected,
    /// No definitive answer. The string holds a human-readable reason
    /// (timeout, temporary failure, refused probe, protocol anomaly...).
    Inconclusive(String),
}

impl ProbeOutcome {
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => f.write_str("Confirmed"),
            Self::Rejected => f.write_str("Rejected"),
            Self::Inconclusive(reason) => write!(f, "Inconclusive ({reason})"),
        }
    }
}

/// Final report produced by [`probe`](crate::smtp_verify::probe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpProbeReport {
    pub outcome: ProbeOutcome,
    pub mx_tried: Vec<String>,
    pub transcript: Vec<String>,
}

impl SmtpProbeReport {
    pub fn new(outcome: ProbeOutcome, mx_tried: Vec<String>, transcript: Vec<String>) -> Self {
        Self {
            outcome,
            mx_tried,
            transcript,
        }
    }
}
