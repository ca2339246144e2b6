//! Session channel: a reconnecting, heartbeated link to the remote agent.
//!
//! [`SessionChannel`] owns the connection state and every timer tied to it
//! (heartbeat interval, pending reconnect). The socket itself runs in a
//! background task spawned by a [`Connector`]; that task reports
//! [`LinkEvent`]s back into the session queue and the controller hands them
//! to [`SessionChannel::handle_event`] on the event loop.
//!
//! Each link gets a fresh [`LinkId`]. Events from a link that is no longer
//! current are dropped, which keeps at most one live link per session.

pub mod ws;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use crate::config::{BackendConfig, ChannelConfig};
use crate::error::{ProctorError, Result};
use crate::events::{EventSender, SessionEvent};
use crate::protocol::{
    ClientMessage, NORMAL_CLOSURE, ServerMessage, decode_server_message, encode_client_message,
};
use crate::timer::{TimerHandle, cancel_slot};

pub use ws::WsConnector;

/// Identifier of one underlying connection attempt.
pub type LinkId = u64;

/// Channel connection state. Owned by the channel; everyone else reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// What a link task reports about its socket.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The connection is established.
    Opened,
    /// One inbound text frame.
    Frame(String),
    /// The connection is gone. Posted exactly once per link.
    Closed { code: u16, reason: String },
}

/// What the channel asks a link task to do.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    /// Write one text frame.
    Send(String),
    /// Close with the given code and stop.
    Close(u16),
}

/// Channel-owned events travelling through the session queue.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Link { link: LinkId, event: LinkEvent },
    HeartbeatDue { link: LinkId },
    ReconnectDue { ticket: u64 },
}

/// Connection-level change worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelUpdate {
    Connected,
    Lost { code: u16, reconnect_scheduled: bool },
    Reconnecting,
}

/// Spawns the background task that drives one link.
///
/// Implementations must post `LinkEvent::Opened` once connected and exactly
/// one `LinkEvent::Closed` when the link ends for any reason (including a
/// failed connect). The task must stop when `commands` is closed or yields
/// `LinkCommand::Close`.
pub trait Connector: Send + Sync {
    fn spawn_link(
        &self,
        url: Url,
        link: LinkId,
        commands: mpsc::UnboundedReceiver<LinkCommand>,
        events: EventSender,
    );
}

/// Build the per-session channel URL from the HTTP base URL.
///
/// `http://host/` becomes `ws://host/<prefix>/interview/<id>/ws`; `https`
/// maps to `wss`.
///
/// # Errors
///
/// Returns [`ProctorError::Config`] for an unparseable base URL or a scheme
/// other than http(s)/ws(s).
pub fn channel_url(backend: &BackendConfig, session_id: &str) -> Result<Url> {
    let mut url = Url::parse(&backend.base_url)
        .map_err(|e| ProctorError::Config(format!("invalid base_url: {e}")))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ProctorError::Config(format!(
                "unsupported base_url scheme: {other}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| ProctorError::Config(format!("cannot switch scheme to {scheme}")))?;

    let prefix = backend.api_prefix.trim_matches('/');
    let base_path = url.path().trim_end_matches('/').to_owned();
    let mut path = base_path;
    if !prefix.is_empty() {
        path.push('/');
        path.push_str(prefix);
    }
    path.push_str(&format!("/interview/{session_id}/ws"));
    url.set_path(&path);
    Ok(url)
}

/// Live link bookkeeping.
struct ActiveLink {
    id: LinkId,
    commands: mpsc::UnboundedSender<LinkCommand>,
}

type MessageHandler = Box<dyn FnMut(ServerMessage) + Send>;

/// Reconnecting, heartbeated message channel to the remote agent.
pub struct SessionChannel {
    config: ChannelConfig,
    backend: BackendConfig,
    connector: Arc<dyn Connector>,
    events: EventSender,
    state: ConnectionState,
    url: Option<Url>,
    link: Option<ActiveLink>,
    next_link: LinkId,
    heartbeat: Option<TimerHandle>,
    reconnect: Option<TimerHandle>,
    reconnect_ticket: u64,
    last_pong_at: Option<Instant>,
    handler: Option<MessageHandler>,
}

impl SessionChannel {
    pub fn new(
        config: ChannelConfig,
        backend: BackendConfig,
        connector: Arc<dyn Connector>,
        events: EventSender,
    ) -> Self {
        Self {
            config,
            backend,
            connector,
            events,
            state: ConnectionState::Disconnected,
            url: None,
            link: None,
            next_link: 0,
            heartbeat: None,
            reconnect: None,
            reconnect_ticket: 0,
            last_pong_at: None,
            handler: None,
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// When the last heartbeat acknowledgement arrived.
    #[must_use]
    pub fn last_pong_at(&self) -> Option<Instant> {
        self.last_pong_at
    }

    /// Whether a reconnection attempt is scheduled.
    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.as_ref().is_some_and(TimerHandle::is_pending)
    }

    /// Register the handler that receives every decoded agent message
    /// (heartbeat acks excluded). Replaces any earlier handler.
    pub fn on_message<F>(&mut self, handler: F)
    where
        F: FnMut(ServerMessage) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Open the channel for `session_id`, replacing any existing link.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel URL cannot be derived from config.
    pub fn open(&mut self, session_id: &str) -> Result<()> {
        let url = channel_url(&self.backend, session_id)?;
        self.url = Some(url.clone());
        cancel_slot(&mut self.reconnect);
        self.start_link(url);
        Ok(())
    }

    /// Re-open immediately, cancelling any scheduled attempt.
    pub fn reconnect_now(&mut self) {
        cancel_slot(&mut self.reconnect);
        if let Some(url) = self.url.clone() {
            self.start_link(url);
        }
    }

    /// Send one message. Returns `false` (and drops the message) when not connected.
    pub fn send(&mut self, msg: &ClientMessage) -> bool {
        if self.state != ConnectionState::Connected {
            tracing::debug!(kind = msg.kind(), state = %self.state, "dropping message; channel not connected");
            return false;
        }
        let Some(link) = self.link.as_ref() else {
            return false;
        };
        match encode_client_message(msg) {
            Ok(json) => link.commands.send(LinkCommand::Send(json)).is_ok(),
            Err(e) => {
                tracing::error!("failed to encode outbound message: {e}");
                false
            }
        }
    }

    /// Close the channel and cancel its timers. Safe to call repeatedly,
    /// including when the channel was never opened.
    pub fn close(&mut self, code: u16) {
        cancel_slot(&mut self.heartbeat);
        cancel_slot(&mut self.reconnect);
        if let Some(link) = self.link.take() {
            tracing::info!(link = link.id, code, "closing session channel");
            let _ = link.commands.send(LinkCommand::Close(code));
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Apply one channel event. `session_live` gates reconnection.
    pub fn handle_event(
        &mut self,
        event: ChannelEvent,
        session_live: bool,
    ) -> Option<ChannelUpdate> {
        match event {
            ChannelEvent::Link { link, event } => {
                if self.link.as_ref().map(|l| l.id) != Some(link) {
                    tracing::debug!(link, "ignoring event from stale link");
                    return None;
                }
                self.handle_link_event(link, event, session_live)
            }
            ChannelEvent::HeartbeatDue { link } => {
                if self.state == ConnectionState::Connected
                    && self.link.as_ref().map(|l| l.id) == Some(link)
                {
                    self.send(&ClientMessage::Ping);
                }
                None
            }
            ChannelEvent::ReconnectDue { ticket } => {
                if ticket != self.reconnect_ticket || self.reconnect.is_none() {
                    tracing::debug!(ticket, "ignoring stale reconnect timer");
                    return None;
                }
                self.reconnect = None;
                if !session_live || self.state == ConnectionState::Connected {
                    return None;
                }
                tracing::info!(ticket, "attempting to reconnect session channel");
                self.reconnect_now();
                Some(ChannelUpdate::Reconnecting)
            }
        }
    }

    fn handle_link_event(
        &mut self,
        link: LinkId,
        event: LinkEvent,
        session_live: bool,
    ) -> Option<ChannelUpdate> {
        match event {
            LinkEvent::Opened => {
                tracing::info!(link, "session channel connected");
                self.state = ConnectionState::Connected;
                cancel_slot(&mut self.heartbeat);
                self.heartbeat = Some(TimerHandle::every(
                    self.config.heartbeat_interval(),
                    self.events.clone(),
                    move || SessionEvent::Channel(ChannelEvent::HeartbeatDue { link }),
                ));
                Some(ChannelUpdate::Connected)
            }
            LinkEvent::Frame(text) => {
                match decode_server_message(&text) {
                    Ok(ServerMessage::Pong {}) => {
                        tracing::debug!(link, "heartbeat acknowledged");
                        self.last_pong_at = Some(Instant::now());
                    }
                    Ok(ServerMessage::Unknown) => {
                        tracing::debug!(link, "ignoring unknown server message type");
                    }
                    Ok(msg) => {
                        if let Some(handler) = self.handler.as_mut() {
                            handler(msg);
                        }
                    }
                    Err(e) => tracing::debug!(link, "ignoring unparseable server frame: {e}"),
                }
                None
            }
            LinkEvent::Closed { code, reason } => {
                self.link = None;
                cancel_slot(&mut self.heartbeat);
                self.state = ConnectionState::Disconnected;
                let reconnect_scheduled = session_live && code != NORMAL_CLOSURE;
                if reconnect_scheduled {
                    tracing::warn!(link, code, %reason, "session channel lost; reconnecting");
                    self.schedule_reconnect();
                } else {
                    tracing::info!(link, code, %reason, "session channel closed");
                }
                Some(ChannelUpdate::Lost {
                    code,
                    reconnect_scheduled,
                })
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        cancel_slot(&mut self.reconnect);
        self.reconnect_ticket += 1;
        let ticket = self.reconnect_ticket;
        self.reconnect = Some(TimerHandle::after(
            self.config.reconnect_delay(),
            self.events.clone(),
            SessionEvent::Channel(ChannelEvent::ReconnectDue { ticket }),
        ));
    }

    fn start_link(&mut self, url: Url) {
        cancel_slot(&mut self.heartbeat);
        if let Some(old) = self.link.take() {
            let _ = old.commands.send(LinkCommand::Close(NORMAL_CLOSURE));
        }
        self.next_link += 1;
        let id = self.next_link;
        let (tx, rx) = mpsc::unbounded_channel();
        tracing::info!(link = id, %url, "opening session channel");
        self.connector
            .spawn_link(url, id, rx, self.events.clone());
        self.link = Some(ActiveLink { id, commands: tx });
        self.state = ConnectionState::Connecting;
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.close(NORMAL_CLOSURE);
    }
}
