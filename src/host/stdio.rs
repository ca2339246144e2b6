//! Stdin/stdout JSON bridge for a headless proctored session.
//!
//! Reads newline-delimited [`HostCommand`]s from stdin and posts them into the
//! session controller's queue. Writes [`EventEnvelope`]s (UI events and shell
//! requests) to stdout as newline-delimited JSON.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{broadcast, mpsc};

use super::adapters::{ShellLink, shell_capabilities};
use super::contract::{EventEnvelope, HostCommand, HostEvent};
use crate::backend::{HttpSessionBackend, SessionBackend};
use crate::channel::{Connector, WsConnector};
use crate::config::ProctorConfig;
use crate::error::{ProctorError, Result};
use crate::events::{EventSender, SessionEvent};
use crate::session::{ProctorEvent, SessionController, SessionOutcome};

/// Run one session over stdin/stdout with the HTTP backend and WebSocket link.
///
/// Returns when the session has navigated to results, or when stdin closes
/// or a `stop` command arrives (the session is disposed in both cases).
pub async fn run_stdio_bridge(config: ProctorConfig, session_id: String) -> Result<SessionOutcome> {
    let backend = Arc::new(HttpSessionBackend::new(config.backend.clone()));
    run_bridge(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        config,
        session_id,
        backend,
        Arc::new(WsConnector),
    )
    .await
}

/// Bridge any line reader and writer to a session controller.
///
/// Two tasks run beside the controller loop:
///
/// 1. **Reader** -- parses each input line and posts it into the controller's
///    queue; parse failures are reported back as `parse_error` lines.
/// 2. **Writer** -- serializes UI events and shell requests to the output.
pub async fn run_bridge<R, W>(
    input: R,
    output: W,
    config: ProctorConfig,
    session_id: String,
    backend: Arc<dyn SessionBackend>,
    connector: Arc<dyn Connector>,
) -> Result<SessionOutcome>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (shell_tx, shell_rx) = mpsc::unbounded_channel();
    let secure_mode_active = Arc::new(AtomicBool::new(false));
    let caps = shell_capabilities(
        ShellLink::new(shell_tx.clone()),
        Arc::clone(&secure_mode_active),
    );

    let mut controller = SessionController::new(config, session_id, caps, backend, connector);
    let ui_rx = controller.subscribe();

    let writer_handle = tokio::spawn(run_writer(BufWriter::new(output), shell_rx, ui_rx));
    let reader_handle = tokio::spawn(run_reader(
        input,
        controller.handle(),
        shell_tx,
        secure_mode_active,
    ));

    let outcome = controller.run().await;
    tracing::info!(
        session_id = %outcome.session_id,
        status = %outcome.status,
        integrity_violation = outcome.integrity_violation,
        "session finished"
    );

    // Dropping the controller closes the UI broadcast and the adapters' shell
    // senders; the writer drains what is left and exits.
    reader_handle.abort();
    let _ = reader_handle.await;
    drop(controller);
    match writer_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "stdout writer stopped with an error"),
        Err(e) => tracing::warn!(error = %e, "stdout writer task failed"),
    }

    Ok(outcome)
}

/// Read input line-by-line and post each command into the session queue.
async fn run_reader<R>(
    mut reader: R,
    events: EventSender,
    shell_tx: mpsc::UnboundedSender<HostEvent>,
    secure_mode_active: Arc<AtomicBool>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| ProctorError::Channel(format!("failed to read from stdin: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("stdin closed (EOF); disposing session");
            let _ = events.send(SessionEvent::Dispose);
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let command: HostCommand = match serde_json::from_str(trimmed) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse host command");
                let _ = shell_tx.send(HostEvent::ParseError {
                    message: format!("failed to parse host command: {e}"),
                });
                continue;
            }
        };

        if let Some(active) = command.secure_mode_state() {
            secure_mode_active.store(active, Ordering::SeqCst);
        }
        let is_stop = command.is_stop();
        if events.send(command.into_event()).is_err() {
            break;
        }
        if is_stop {
            tracing::info!("stop received; shutting down bridge");
            break;
        }
    }
    Ok(())
}

/// Serialize outbound events until both sources are closed.
async fn run_writer<W>(
    mut writer: BufWriter<W>,
    mut shell_rx: mpsc::UnboundedReceiver<HostEvent>,
    mut ui_rx: broadcast::Receiver<ProctorEvent>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut shell_open = true;
    let mut ui_open = true;
    while shell_open || ui_open {
        let body = tokio::select! {
            req = shell_rx.recv(), if shell_open => match req {
                Some(body) => body,
                None => {
                    shell_open = false;
                    continue;
                }
            },
            ev = ui_rx.recv(), if ui_open => match ev {
                Ok(event) => HostEvent::Ui(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event writer lagged; some UI events were dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    ui_open = false;
                    continue;
                }
            },
        };
        match serde_json::to_string(&EventEnvelope::new(body)) {
            Ok(json) => write_line(&mut writer, &json).await?,
            Err(e) => tracing::error!(error = %e, "failed to serialize event envelope; skipping"),
        }
    }
    Ok(())
}

/// Write a single JSON line and flush.
async fn write_line<W>(writer: &mut BufWriter<W>, json: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| ProctorError::Channel(format!("failed to write to stdout: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| ProctorError::Channel(format!("failed to write newline to stdout: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ProctorError::Channel(format!("failed to flush stdout: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use serde_json::Value;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::session::SessionStatus;
    use crate::test_utils::{FakeBackend, FakeConnector};

    async fn run_script(script: &'static str) -> (SessionOutcome, Vec<Value>, FakeConnector) {
        let connector = FakeConnector::default();
        let (out_write, mut out_read) = tokio::io::duplex(1 << 20);
        let outcome = run_bridge(
            BufReader::new(script.as_bytes()),
            out_write,
            ProctorConfig::default(),
            "s1".into(),
            Arc::new(FakeBackend::default()),
            Arc::new(connector.clone()),
        )
        .await
        .expect("bridge run");

        let mut raw = String::new();
        out_read.read_to_string(&mut raw).await.expect("read output");
        let lines = raw
            .lines()
            .map(|l| serde_json::from_str(l).expect("output line is JSON"))
            .collect();
        (outcome, lines, connector)
    }

    fn shell_requests(lines: &[Value]) -> Vec<String> {
        lines
            .iter()
            .filter(|l| l["channel"] == "shell")
            .filter_map(|l| l["request"].as_str().map(str::to_owned))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_session_starts_counts_exits_and_ends() {
        let script = concat!(
            "{\"command\":\"start\"}\n",
            "not json\n",
            "{\"command\":\"exit_key\",\"key\":\"Escape\"}\n",
            "{\"command\":\"end\"}\n",
        );
        let (outcome, lines, connector) = run_script(script).await;

        assert_eq!(outcome.status, SessionStatus::Ended);
        assert!(!outcome.integrity_violation);
        assert_eq!(connector.link_count(), 1);

        assert!(lines.iter().all(|l| l["v"] == 1));
        let requests = shell_requests(&lines);
        assert!(requests.contains(&"acquire_media".to_owned()));
        assert!(requests.contains(&"enter_secure_mode".to_owned()));
        assert!(requests.contains(&"release_media".to_owned()));

        assert!(lines.iter().any(|l| l["channel"] == "parse_error"));
        assert!(lines.iter().any(|l| {
            l["channel"] == "ui" && l["event"] == "secure_mode_exits" && l["count"] == 1
        }));
        assert!(lines.iter().any(|l| {
            l["channel"] == "ui" && l["event"] == "status_changed" && l["status"] == "ended"
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_disposes_without_starting() {
        let (outcome, lines, connector) = run_script("{\"command\":\"stop\"}\n").await;
        assert_eq!(outcome.status, SessionStatus::Scheduled);
        assert!(!outcome.navigated);
        assert_eq!(connector.link_count(), 0);
        assert_eq!(shell_requests(&lines), vec!["cancel_speech", "release_media"]);
    }
}
