use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::mx::MxRecord;
use crate::smtp_verify::connector::Connector;
use crate::smtp_verify::error::SmtpVerifyError;
use crate::smtp_verify::options::SmtpProbeOptions;
use crate::smtp_verify::session::{SmtpReply, SmtpSession};
use crate::smtp_verify::types::{ProbeOutcome, SmtpProbeReport, Stage};

/// Ask the mail exchangers in `hosts` whether they accept `email`.
///
/// Hosts are tried in the given order (callers pass them sorted by
/// preference) until one answers `RCPT TO` definitively, the candidate limit
/// is reached or the probe deadline expires. Never sends `DATA`.
pub async fn probe<C>(
    connector: &C,
    email: &str,
    hosts: &[MxRecord],
    options: &SmtpProbeOptions,
) -> SmtpProbeReport
where
    C: Connector,
{
    let mut mx_tried = Vec::new();
    let mut transcript = Vec::new();

    if email.contains(['\r', '\n']) {
        let outcome = ProbeOutcome::Inconclusive("address contains a line break".to_string());
        return SmtpProbeReport::new(outcome, mx_tried, transcript);
    }

    let deadline = Instant::now() + options.timeout();
    let mut last_result = ProbeOutcome::Inconclusive("no mail exchanger attempted".to_string());

    for candidate in hosts.iter().take(options.max_mx.max(1)) {
        if Instant::now() >= deadline {
            last_result = ProbeOutcome::Inconclusive("probe deadline exceeded".to_string());
            break;
        }
        let host = candidate.exchange.as_str();
        mx_tried.push(host.to_string());

        let attempt = probe_host(connector, host, email, options, deadline).await;
        transcript.extend(attempt.transcript);
        match attempt.result {
            Ok(outcome) if outcome.is_conclusive() => {
                debug!(%host, %outcome, "mail exchanger answered");
                return SmtpProbeReport::new(outcome, mx_tried, transcript);
            }
            Ok(outcome) => {
                debug!(%host, %outcome, "no definitive answer, trying next exchanger");
                last_result = outcome;
            }
            Err(err) => {
                warn!(%host, error = %err, "SMTP probe failed");
                transcript.push(format!("[{host}] ! error: {err}"));
                last_result = ProbeOutcome::Inconclusive(err.to_string());
            }
        }
    }

    SmtpProbeReport::new(last_result, mx_tried, transcript)
}

struct HostAttempt {
    result: Result<ProbeOutcome, SmtpVerifyError>,
    transcript: Vec<String>,
}

impl HostAttempt {
    fn failed(err: SmtpVerifyError) -> Self {
        Self {
            result: Err(err),
            transcript: Vec::new(),
        }
    }
}

async fn probe_host<C>(
    connector: &C,
    host: &str,
    email: &str,
    options: &SmtpProbeOptions,
    deadline: Instant,
) -> HostAttempt
where
    C: Connector,
{
    let budget = options
        .connect_timeout()
        .min(deadline.saturating_duration_since(Instant::now()));
    let port = options.port;
    let stream = match tokio::time::timeout(budget, connector.connect(host, port)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return HostAttempt::failed(SmtpVerifyError::Connect {
                host: host.to_string(),
                port,
                source,
            });
        }
        Err(_) => {
            return HostAttempt::failed(SmtpVerifyError::ConnectTimeout {
                host: host.to_string(),
                port,
            });
        }
    };

    let mut session = SmtpSession::new(host, stream, deadline, options.command_timeout());
    let result = converse(&mut session, email, options).await;
    let transcript = session.quit().await;
    HostAttempt { result, transcript }
}

async fn converse<S>(
    session: &mut SmtpSession<S>,
    email: &str,
    options: &SmtpProbeOptions,
) -> Result<ProbeOutcome, SmtpVerifyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let banner = session.read_banner().await?;
    if !banner.is_positive_completion() {
        return Ok(inconclusive(Stage::Greeting, &banner));
    }

    let helo = options.helo_name();
    let ehlo = session.send_command(&format!("EHLO {helo}"), Stage::Ehlo).await?;
    if !ehlo.is_positive_completion() {
        if !ehlo.is_permanent_failure() {
            return Ok(inconclusive(Stage::Ehlo, &ehlo));
        }
        // pre-ESMTP server
        let reply = session.send_command(&format!("HELO {helo}"), Stage::Helo).await?;
        if !reply.is_positive_completion() {
            return Ok(inconclusive(Stage::Helo, &reply));
        }
    }

    let mail_reply = session
        .send_command(&options.mail_from_command(), Stage::MailFrom)
        .await?;
    if !mail_reply.is_positive_completion() {
        return Ok(inconclusive(Stage::MailFrom, &mail_reply));
    }

    let rcpt_reply = session
        .send_command(&format!("RCPT TO:<{email}>"), Stage::RcptTo)
        .await?;
    Ok(classify_rcpt(&rcpt_reply))
}

fn inconclusive(stage: Stage, reply: &SmtpReply) -> ProbeOutcome {
    ProbeOutcome::Inconclusive(format!("{stage} answered {}", reply.code))
}

pub(crate) fn classify_rcpt(reply: &SmtpReply) -> ProbeOutcome {
    if reply.is_positive_completion() {
        return ProbeOutcome::Confirmed;
    }
    if reply.code == 521 {
        return ProbeOutcome::Inconclusive("521 host does not accept mail".to_string());
    }
    if reply.is_permanent_failure() {
        return ProbeOutcome::Rejected;
    }
    if reply.is_transient_failure() {
        return ProbeOutcome::Inconclusive(format!("temporary failure {}", reply.code));
    }
    ProbeOutcome::Inconclusive(format!("unexpected response {}", reply.code))
}
