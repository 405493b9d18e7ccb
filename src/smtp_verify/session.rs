use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::Instant;
use tracing::debug;

use crate::smtp_verify::error::SmtpVerifyError;
use crate::smtp_verify::types::Stage;

const QUIT_WRITE_GRACE: Duration = Duration::from_millis(100);

/// Longest reply line accepted, CRLF included (RFC 5321 allows 512).
pub const MAX_REPLY_LINE: usize = 1000;

/// Most lines accepted in one multiline reply.
pub const MAX_REPLY_LINES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

/// One SMTP conversation over `S`.
///
/// Every read and write is bounded by the per-command timeout, itself capped
/// by the deadline of the whole probe. The stream is closed when the session
/// is consumed by [`SmtpSession::quit`] or dropped.
pub struct SmtpSession<S> {
    host: String,
    stream: BufReader<S>,
    deadline: Instant,
    command_timeout: Duration,
    transcript: Vec<String>,
}

impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(host: &str, stream: S, deadline: Instant, command_timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            stream: BufReader::new(stream),
            deadline,
            command_timeout,
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    fn budget(&self) -> Duration {
        self.command_timeout
            .min(self.deadline.saturating_duration_since(Instant::now()))
    }

    fn record(&mut self, direction: &str, message: &str) {
        debug!(host = %self.host, "{direction}: {message}");
        self.transcript
            .push(format!("[{}] {direction}: {message}", self.host));
    }

    fn record_reply(&mut self, reply: &SmtpReply) {
        if reply.lines.is_empty() {
            self.record("S", &reply.code.to_string());
        } else {
            for line in &reply.lines {
                self.record("S", &format!("{} {}", reply.code, line));
            }
        }
    }

    /// Read the server greeting.
    pub async fn read_banner(&mut self) -> Result<SmtpReply, SmtpVerifyError> {
        self.read_reply(Stage::Greeting).await
    }

    pub async fn send_command(
        &mut self,
        command: &str,
        stage: Stage,
    ) -> Result<SmtpReply, SmtpVerifyError> {
        self.record("C", command);
        let budget = self.budget();
        self.write_line(command, stage, budget).await?;
        self.read_reply(stage).await
    }

    async fn write_line(
        &mut self,
        command: &str,
        stage: Stage,
        budget: Duration,
    ) -> Result<(), SmtpVerifyError> {
        let mut data = command.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        let writer = self.stream.get_mut();
        bounded(stage, budget, async {
            writer.write_all(&data).await?;
            writer.flush().await
        })
        .await
    }

    pub async fn read_reply(&mut self, stage: Stage) -> Result<SmtpReply, SmtpVerifyError> {
        let mut lines = Vec::new();
        let mut code: Option<u16> = None;
        loop {
            if lines.len() == MAX_REPLY_LINES {
                return Err(SmtpVerifyError::protocol(format!(
                    "SMTP reply exceeds {MAX_REPLY_LINES} lines"
                )));
            }
            let line = self.read_line(stage).await?;
            if line.len() < 3 || !line.is_char_boundary(3) {
                return Err(SmtpVerifyError::protocol(format!(
                    "invalid SMTP reply: '{line}'"
                )));
            }
            let parsed_code = line[..3].parse::<u16>().map_err(|_| {
                SmtpVerifyError::protocol(format!("invalid SMTP status code in line: '{line}'"))
            })?;
            if let Some(existing) = code {
                if existing != parsed_code {
                    return Err(SmtpVerifyError::protocol(format!(
                        "inconsistent SMTP reply codes: {existing} vs {parsed_code}"
                    )));
                }
            } else {
                code = Some(parsed_code);
            }
            let continuation = line.as_bytes().get(3).copied() == Some(b'-');
            let text = line.get(4..).unwrap_or_default().to_string();
            lines.push(text);
            if !continuation {
                break;
            }
        }
        let reply = SmtpReply {
            code: code.ok_or_else(|| SmtpVerifyError::protocol("SMTP reply missing status code"))?,
            lines,
        };
        self.record_reply(&reply);
        Ok(reply)
    }

    async fn read_line(&mut self, stage: Stage) -> Result<String, SmtpVerifyError> {
        let budget = self.budget();
        let raw = bounded(
            stage,
            budget,
            read_limited_line(&mut self.stream, MAX_REPLY_LINE),
        )
        .await?;
        let bytes = match raw {
            RawLine::Line(bytes) => bytes,
            RawLine::Closed => {
                return Err(SmtpVerifyError::io(
                    stage,
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"),
                ));
            }
            RawLine::TooLong => {
                return Err(SmtpVerifyError::protocol(format!(
                    "SMTP reply line exceeds {MAX_REPLY_LINE} bytes"
                )));
            }
        };
        let mut line = String::from_utf8_lossy(&bytes).into_owned();
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    /// Send `QUIT` and close the connection, returning the transcript.
    ///
    /// The reply is only awaited while the probe deadline has budget left, so
    /// a hung server does not extend the probe.
    pub async fn quit(mut self) -> Vec<String> {
        self.record("C", "QUIT");
        let grace = self.budget().max(QUIT_WRITE_GRACE);
        if self.write_line("QUIT", Stage::Quit, grace).await.is_ok() && !self.budget().is_zero() {
            if let Err(err) = self.read_reply(Stage::Quit).await {
                debug!(host = %self.host, error = %err, "no reply to QUIT");
            }
        }
        let _ = bounded(Stage::Quit, QUIT_WRITE_GRACE, self.stream.get_mut().shutdown()).await;
        self.transcript
    }
}

enum RawLine {
    Line(Vec<u8>),
    Closed,
    TooLong,
}

/// Read up to and including `\n`, never buffering more than `limit` bytes.
async fn read_limited_line<R>(reader: &mut R, limit: usize) -> io::Result<RawLine>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(if line.is_empty() {
                RawLine::Closed
            } else {
                RawLine::Line(line)
            });
        }
        let (take, complete) = match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (buf.len(), false),
        };
        if line.len() + take > limit {
            return Ok(RawLine::TooLong);
        }
        line.extend_from_slice(&buf[..take]);
        reader.consume(take);
        if complete {
            return Ok(RawLine::Line(line));
        }
    }
}

async fn bounded<T, F>(stage: Stage, budget: Duration, fut: F) -> Result<T, SmtpVerifyError>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(SmtpVerifyError::io(stage, source)),
        Err(_) => Err(SmtpVerifyError::Timeout { stage }),
    }
}
