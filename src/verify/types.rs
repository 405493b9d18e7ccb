use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mx::MxRecord;
use crate::smtp_verify::{ProbeOutcome, SmtpProbeOptions, SmtpProbeReport};

/// Why the pipeline reached its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    InvalidFormat,
    NoMxRecords,
    DomainLookupFailed,
    SmtpInconclusive,
    SmtpMailboxConfirmed,
    SmtpMailboxRejected,
}

impl Reason {
    /// Deliverability implied by this reason.
    ///
    /// `SmtpInconclusive` counts as valid: MX resolution already succeeded.
    pub const fn is_valid(self) -> bool {
        match self {
            Self::InvalidFormat
            | Self::NoMxRecords
            | Self::DomainLookupFailed
            | Self::SmtpMailboxRejected => false,
            Self::SmtpInconclusive | Self::SmtpMailboxConfirmed => true,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFormat => "InvalidFormat",
            Self::NoMxRecords => "NoMxRecords",
            Self::DomainLookupFailed => "DomainLookupFailed",
            Self::SmtpInconclusive => "SmtpInconclusive",
            Self::SmtpMailboxConfirmed => "SmtpMailboxConfirmed",
            Self::SmtpMailboxRejected => "SmtpMailboxRejected",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidFormat => "Invalid format",
            Self::NoMxRecords => "No MX records found for domain",
            Self::DomainLookupFailed => "Domain lookup failed or does not exist",
            Self::SmtpInconclusive => "SMTP check inconclusive, but MX is valid",
            Self::SmtpMailboxConfirmed => "SMTP check passed: mailbox exists",
            Self::SmtpMailboxRejected => "Mailbox does not exist (SMTP response)",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ProbeOutcome> for Reason {
    fn from(outcome: &ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Confirmed => Self::SmtpMailboxConfirmed,
            ProbeOutcome::Rejected => Self::SmtpMailboxRejected,
            ProbeOutcome::Inconclusive(_) => Self::SmtpInconclusive,
        }
    }
}

/// Final `{valid, reason}` pair for one address.
///
/// Only buildable from a [`Reason`], so `valid` always follows
/// [`Reason::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Verdict {
    valid: bool,
    reason: Reason,
}

impl Verdict {
    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }
}

impl From<Reason> for Verdict {
    fn from(reason: Reason) -> Self {
        Self {
            valid: reason.is_valid(),
            reason,
        }
    }
}

/// Options for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyOptions {
    pub dns_timeout_ms: u64,
    pub probe: SmtpProbeOptions,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            dns_timeout_ms: 5_000,
            probe: SmtpProbeOptions::default(),
        }
    }
}

impl VerifyOptions {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }
}

/// Verdict plus the diagnostic detail gathered on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub email: String,
    pub verdict: Verdict,
    pub mx_records: Vec<MxRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<SmtpProbeReport>,
}

impl VerificationReport {
    pub(crate) fn early(email: &str, reason: Reason) -> Self {
        Self {
            email: email.to_string(),
            verdict: Verdict::from(reason),
            mx_records: Vec::new(),
            probe: None,
        }
    }
}
