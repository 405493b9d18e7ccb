use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};

use super::Connector;

/// Behaviour of a fake mail exchanger.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Connection refused.
    Refuse,
    /// `connect` never completes.
    Blackhole,
    /// Accepts the connection, never writes a byte.
    Silent,
    /// Streams a banner line that never ends.
    Flood,
    /// Sends `banner`, then answers each expected command in order. An empty
    /// response leaves the command unanswered. Once the steps are exhausted
    /// `QUIT` is answered with 221.
    Dialogue {
        banner: &'static str,
        steps: Vec<(&'static str, &'static str)>,
    },
}

impl Script {
    pub(crate) fn dialogue(banner: &'static str, steps: Vec<(&'static str, &'static str)>) -> Self {
        Self::Dialogue { banner, steps }
    }

    /// Standard exchange ending with `rcpt_reply` to `RCPT TO`.
    pub(crate) fn rcpt(rcpt_reply: &'static str) -> Self {
        Self::dialogue(
            "220 mock.smtp.test ESMTP\r\n",
            vec![
                ("EHLO", "250-mock.smtp.test\r\n250 PIPELINING\r\n"),
                ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
                ("RCPT TO:", rcpt_reply),
            ],
        )
    }
}

/// In-memory [`Connector`] keyed by host name. Unknown hosts refuse.
#[derive(Default)]
pub(crate) struct ScriptedConnector {
    scripts: Mutex<HashMap<String, Script>>,
    calls: AtomicUsize,
    received: Arc<Mutex<Vec<String>>>,
    mismatches: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, host: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(host.to_string(), script);
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every command line the fake servers received, CRLF stripped.
    pub(crate) fn received(&self) -> Vec<String> {
        self.received.lock().expect("received lock").clone()
    }

    /// Commands that did not match the next scripted step.
    pub(crate) fn mismatches(&self) -> Vec<String> {
        self.mismatches.lock().expect("mismatches lock").clone()
    }

    pub(crate) fn assert_script_followed(&self) {
        let mismatches = self.mismatches();
        assert!(mismatches.is_empty(), "unscripted commands: {mismatches:?}");
    }
}

impl Connector for ScriptedConnector {
    type Stream = DuplexStream;

    async fn connect(&self, host: &str, _port: u16) -> io::Result<DuplexStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get(host)
            .cloned()
            .unwrap_or(Script::Refuse);
        match script {
            Script::Refuse => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
            Script::Blackhole => std::future::pending().await,
            Script::Silent => {
                let (client, server) = duplex(4096);
                tokio::spawn(async move {
                    let _held = server;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                });
                Ok(client)
            }
            Script::Flood => {
                let (client, mut server) = duplex(4096);
                tokio::spawn(async move {
                    if server.write_all(b"220 ").await.is_err() {
                        return;
                    }
                    let chunk = [b'A'; 1024];
                    while server.write_all(&chunk).await.is_ok() {}
                });
                Ok(client)
            }
            Script::Dialogue { banner, steps } => {
                let (client, server) = duplex(4096);
                let log = Log {
                    received: Arc::clone(&self.received),
                    mismatches: Arc::clone(&self.mismatches),
                };
                tokio::spawn(serve(server, banner, steps, log));
                Ok(client)
            }
        }
    }
}

struct Log {
    received: Arc<Mutex<Vec<String>>>,
    mismatches: Arc<Mutex<Vec<String>>>,
}

async fn serve(
    server: DuplexStream,
    banner: &'static str,
    steps: Vec<(&'static str, &'static str)>,
    log: Log,
) {
    let (read, mut write) = tokio::io::split(server);
    let mut reader = BufReader::new(read);
    if write.write_all(banner.as_bytes()).await.is_err() {
        return;
    }

    for (expected, response) in steps {
        let Some(line) = next_line(&mut reader, &log.received).await else {
            return;
        };
        if !line.starts_with(expected) {
            log.mismatches
                .lock()
                .expect("mismatches lock")
                .push(format!("expected '{expected}', got '{line}'"));
            let _ = write.write_all(b"500 5.5.2 Unscripted command\r\n").await;
            break;
        }
        if response.is_empty() {
            tokio::time::sleep(Duration::from_secs(60)).await;
            return;
        }
        if write.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }

    while let Some(line) = next_line(&mut reader, &log.received).await {
        if line.eq_ignore_ascii_case("QUIT") {
            let _ = write.write_all(b"221 2.0.0 Bye\r\n").await;
            break;
        }
        let _ = write.write_all(b"503 5.5.1 Unexpected command\r\n").await;
    }
}

async fn next_line<R>(reader: &mut R, received: &Mutex<Vec<String>>) -> Option<String>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let line = line.trim_end().to_string();
            received.lock().expect("received lock").push(line.clone());
            Some(line)
        }
    }
}
