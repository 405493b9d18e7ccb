#![forbid(unsafe_code)]
//! E-mail deliverability check: syntax gate, MX lookup, SMTP probe.

pub mod mx;
pub mod smtp_verify;
pub mod syntax;
pub mod verify;

#[cfg(feature = "server")]
pub mod server;

pub use mx::{Error as MxError, LookupMx, MxRecord, MxStatus, SystemResolver, resolve_mx};
pub use smtp_verify::{
    Connector, ProbeOutcome, SmtpProbeOptions, SmtpProbeReport, SmtpVerifyError, TcpConnector,
};
pub use verify::{Reason, VerificationReport, Verdict, Verifier, VerifyOptions, verify_email};
