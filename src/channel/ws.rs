//! WebSocket link driver built on `tokio-tungstenite`.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

use super::{ChannelEvent, Connector, LinkCommand, LinkEvent, LinkId};
use crate::events::{EventSender, SessionEvent};
use crate::protocol::{ABNORMAL_CLOSURE, NO_STATUS_RECEIVED};

/// Connects links over a real WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn spawn_link(
        &self,
        url: Url,
        link: LinkId,
        commands: mpsc::UnboundedReceiver<LinkCommand>,
        events: EventSender,
    ) {
        tokio::spawn(async move {
            let (code, reason) = match run_link(&url, link, commands, &events).await {
                Ok(closed) => closed,
                Err(e) => {
                    tracing::warn!(link, "session link failed: {e}");
                    (ABNORMAL_CLOSURE, e)
                }
            };
            post(&events, link, LinkEvent::Closed { code, reason });
        });
    }
}

fn post(events: &EventSender, link: LinkId, event: LinkEvent) {
    // Receiver gone means the session is over.
    let _ = events.send(SessionEvent::Channel(ChannelEvent::Link { link, event }));
}

/// Drive one connection until either side closes it.
///
/// Returns the close code and reason on an orderly close, `Err` when the
/// connection failed or dropped without a close frame.
async fn run_link(
    url: &Url,
    link: LinkId,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    events: &EventSender,
) -> Result<(u16, String), String> {
    let (ws_stream, _) = connect_async(url.as_str())
        .await
        .map_err(|e| format!("connect: {e}"))?;
    post(events, link, LinkEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        post(events, link, LinkEvent::Frame(text.to_string()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Ok(match frame {
                            Some(f) => (u16::from(f.code), f.reason.to_string()),
                            None => (NO_STATUS_RECEIVED, String::new()),
                        });
                    }
                    Some(Err(e)) => return Err(format!("read error: {e}")),
                    None => return Err("connection dropped".into()),
                    _ => {} // Binary, Ping/Pong frames handled by tungstenite.
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(LinkCommand::Send(json)) => {
                        write
                            .send(Message::Text(json.into()))
                            .await
                            .map_err(|e| format!("send error: {e}"))?;
                    }
                    Some(LinkCommand::Close(code)) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: "".into(),
                        };
                        let _ = write.send(Message::Close(Some(frame))).await;
                        return Ok((code, "closed by client".into()));
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok((NO_STATUS_RECEIVED, "channel dropped".into()));
                    }
                }
            }
        }
    }
}
