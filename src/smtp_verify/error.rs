use std::io;

use thiserror::Error;

use crate::smtp_verify::types::Stage;

#[derive(Debug, Error)]
pub enum SmtpVerifyError {
    #[error("connection to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("connection to {host}:{port} timed out")]
    ConnectTimeout { host: String, port: u16 },
    #[error("I/O error during {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: io::Error,
    },
    #[error("timed out during {stage}")]
    Timeout { stage: Stage },
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SmtpVerifyError {
    pub(crate) fn io(stage: Stage, source: io::Error) -> Self {
        Self::Io { stage, source }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
