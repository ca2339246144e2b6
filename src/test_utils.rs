//! Shared test utilities: fakes for the connector, the capability adapters
//! and the session backend, plus a scheduler helper for paused-clock tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::backend::{SessionAck, SessionBackend};
use crate::capabilities::{
    Capabilities, FrameSource, MediaCapture, SecureMode, SpeechInput, SpeechInputEvent,
    SpeechOutput,
};
use crate::channel::{ChannelEvent, Connector, LinkCommand, LinkEvent, LinkId};
use crate::config::SpeechConfig;
use crate::error::{ProctorError, Result};
use crate::events::{EventSender, SessionEvent};
use crate::protocol::ClientMessage;

/// Let spawned tasks (timers, samplers) run until they block again.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// -- connector ---------------------------------------------------------------

struct FakeLink {
    id: LinkId,
    url: Url,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    events: EventSender,
}

#[derive(Default)]
struct LinkLog {
    links: Vec<FakeLink>,
    sent: Vec<String>,
    close_codes: Vec<u16>,
}

impl LinkLog {
    /// Pull everything the channel has asked the links to do.
    fn drain(&mut self) {
        let Self {
            links,
            sent,
            close_codes,
        } = self;
        for link in links.iter_mut() {
            while let Ok(cmd) = link.commands.try_recv() {
                match cmd {
                    LinkCommand::Send(json) => sent.push(json),
                    LinkCommand::Close(code) => close_codes.push(code),
                }
            }
        }
    }
}

/// In-memory connector. Tests play the remote side by posting link events.
#[derive(Clone, Default)]
pub struct FakeConnector {
    inner: Arc<Mutex<LinkLog>>,
}

impl Connector for FakeConnector {
    fn spawn_link(
        &self,
        url: Url,
        link: LinkId,
        commands: mpsc::UnboundedReceiver<LinkCommand>,
        events: EventSender,
    ) {
        lock(&self.inner).links.push(FakeLink {
            id: link,
            url,
            commands,
            events,
        });
    }
}

impl FakeConnector {
    pub fn link_count(&self) -> usize {
        lock(&self.inner).links.len()
    }

    pub fn urls(&self) -> Vec<String> {
        lock(&self.inner)
            .links
            .iter()
            .map(|l| l.url.to_string())
            .collect()
    }

    fn post(&self, link: Option<LinkId>, event: LinkEvent) {
        let log = lock(&self.inner);
        let target = match link {
            Some(id) => log.links.iter().find(|l| l.id == id),
            None => log.links.last(),
        };
        if let Some(l) = target {
            let _ = l.events.send(SessionEvent::Channel(ChannelEvent::Link {
                link: l.id,
                event,
            }));
        }
    }

    pub fn open_latest(&self) {
        self.post(None, LinkEvent::Opened);
    }

    pub fn open_link(&self, id: LinkId) {
        self.post(Some(id), LinkEvent::Opened);
    }

    pub fn close_latest(&self, code: u16) {
        self.post(
            None,
            LinkEvent::Closed {
                code,
                reason: String::new(),
            },
        );
    }

    pub fn frame_latest(&self, text: &str) {
        self.post(None, LinkEvent::Frame(text.to_owned()));
    }

    /// Every decodable message sent on any link, in order.
    pub fn sent_messages(&self) -> Vec<ClientMessage> {
        let mut log = lock(&self.inner);
        log.drain();
        log.sent
            .iter()
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect()
    }

    /// Sent messages other than heartbeats.
    pub fn sent_payloads(&self) -> Vec<ClientMessage> {
        self.sent_messages()
            .into_iter()
            .filter(|m| *m != ClientMessage::Ping)
            .collect()
    }

    pub fn ping_count(&self) -> usize {
        self.sent_messages()
            .iter()
            .filter(|m| **m == ClientMessage::Ping)
            .count()
    }

    pub fn close_codes(&self) -> Vec<u16> {
        let mut log = lock(&self.inner);
        log.drain();
        log.close_codes.clone()
    }
}

// -- capabilities ------------------------------------------------------------

/// Everything the fake adapters were asked to do.
#[derive(Debug, Default)]
pub struct PlatformLog {
    pub fail_media: bool,
    pub fail_speech: bool,
    pub media_acquired: bool,
    pub media_releases: u32,
    pub video_enabled: Option<bool>,
    pub audio_enabled: Option<bool>,
    pub recognizer_ready: bool,
    pub speech_starts: u32,
    pub speech_stops: u32,
    pub spoken: Vec<(String, f32)>,
    pub speech_cancels: u32,
    pub secure_active: bool,
    pub secure_enters: u32,
    pub secure_exits: u32,
    speech_events: Option<EventSender>,
}

/// Shared state behind the fake adapters.
#[derive(Clone, Default)]
pub struct FakePlatform {
    log: Arc<Mutex<PlatformLog>>,
}

impl FakePlatform {
    pub fn without_media() -> Self {
        let platform = Self::default();
        lock(&platform.log).fail_media = true;
        platform
    }

    pub fn without_speech() -> Self {
        let platform = Self::default();
        lock(&platform.log).fail_speech = true;
        platform
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            media: Box::new(FakeMedia(Arc::clone(&self.log))),
            face_detector: None,
            speech_input: Box::new(FakeSpeechInput(Arc::clone(&self.log))),
            speech_output: Box::new(FakeSpeechOutput(Arc::clone(&self.log))),
            secure_mode: Box::new(FakeSecureMode(Arc::clone(&self.log))),
        }
    }

    /// Read the log.
    pub fn with<R>(&self, f: impl FnOnce(&PlatformLog) -> R) -> R {
        f(&lock(&self.log))
    }

    /// The platform dropped out of secure mode on its own.
    pub fn lose_secure_mode(&self) {
        lock(&self.log).secure_active = false;
    }

    /// Deliver a recognizer callback the way a real recognizer would.
    pub fn speech_event(&self, event: SpeechInputEvent) {
        if let Some(tx) = lock(&self.log).speech_events.as_ref() {
            let _ = tx.send(SessionEvent::Speech(event));
        }
    }
}

struct FakeMedia(Arc<Mutex<PlatformLog>>);

#[async_trait]
impl MediaCapture for FakeMedia {
    async fn acquire(&mut self) -> Result<()> {
        let mut log = lock(&self.0);
        if log.fail_media {
            return Err(ProctorError::Capability("permission denied".into()));
        }
        log.media_acquired = true;
        Ok(())
    }

    fn frame_source(&mut self) -> Option<Box<dyn FrameSource>> {
        None
    }

    fn set_video_enabled(&mut self, enabled: bool) {
        lock(&self.0).video_enabled = Some(enabled);
    }

    fn set_audio_enabled(&mut self, enabled: bool) {
        lock(&self.0).audio_enabled = Some(enabled);
    }

    fn release(&mut self) {
        let mut log = lock(&self.0);
        log.media_acquired = false;
        log.media_releases += 1;
    }
}

struct FakeSpeechInput(Arc<Mutex<PlatformLog>>);

impl SpeechInput for FakeSpeechInput {
    fn initialize(&mut self, _config: &SpeechConfig, events: EventSender) -> Result<()> {
        let mut log = lock(&self.0);
        if log.fail_speech {
            return Err(ProctorError::Capability("speech recognition unsupported".into()));
        }
        log.recognizer_ready = true;
        log.speech_events = Some(events);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        lock(&self.0).speech_starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        lock(&self.0).speech_stops += 1;
    }
}

struct FakeSpeechOutput(Arc<Mutex<PlatformLog>>);

impl SpeechOutput for FakeSpeechOutput {
    fn speak(&mut self, text: &str, rate: f32) -> Result<()> {
        lock(&self.0).spoken.push((text.to_owned(), rate));
        Ok(())
    }

    fn cancel(&mut self) {
        lock(&self.0).speech_cancels += 1;
    }
}

struct FakeSecureMode(Arc<Mutex<PlatformLog>>);

impl SecureMode for FakeSecureMode {
    fn request_enter(&mut self) -> Result<()> {
        let mut log = lock(&self.0);
        log.secure_enters += 1;
        log.secure_active = true;
        Ok(())
    }

    fn request_exit(&mut self) -> Result<()> {
        let mut log = lock(&self.0);
        log.secure_exits += 1;
        log.secure_active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        lock(&self.0).secure_active
    }
}

// -- backend -----------------------------------------------------------------

/// Records start/end calls; either can be made to fail.
#[derive(Default)]
pub struct FakeBackend {
    fail_start: bool,
    fail_end: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn failing_end() -> Self {
        Self {
            fail_end: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    async fn start_session(&self, session_id: &str) -> Result<SessionAck> {
        lock(&self.calls).push(format!("start:{session_id}"));
        if self.fail_start {
            return Err(ProctorError::Backend("start returned HTTP 404".into()));
        }
        Ok(SessionAck {
            status: "started".into(),
        })
    }

    async fn end_session(&self, session_id: &str) -> Result<SessionAck> {
        lock(&self.calls).push(format!("end:{session_id}"));
        if self.fail_end {
            return Err(ProctorError::Backend("end returned HTTP 500".into()));
        }
        Ok(SessionAck {
            status: "completed".into(),
        })
    }
}
