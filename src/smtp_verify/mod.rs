//! SMTP mailbox probing, the third stage of the pipeline.
//!
//! The public entry point is [`probe`], which runs a minimal
//! `EHLO`/`MAIL FROM`/`RCPT TO` dialogue against the resolved mail exchangers
//! (no `DATA` is ever sent) and classifies the answer into a [`ProbeOutcome`].

mod connector;
mod error;
mod options;
mod probe;
mod session;
mod types;

pub use connector::{Connector, TcpConnector};
pub use error::SmtpVerifyError;
pub use options::SmtpProbeOptions;
pub use probe::probe;
pub use session::{SmtpReply, SmtpSession};
pub use types::{ProbeOutcome, SmtpProbeReport, Stage};

#[cfg(test)]
pub(crate) mod testing;
