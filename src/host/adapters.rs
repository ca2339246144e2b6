//! Capability adapters that delegate to a native shell.
//!
//! Each adapter turns a capability call into a [`ShellRequest`] line on
//! stdout. The shell performs the platform action and reports results back as
//! inbound commands (secure-mode changes, face counts, speech results), which
//! the bridge feeds into the controller's queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::contract::{HostEvent, ShellRequest};
use crate::capabilities::{
    Capabilities, FrameSource, MediaCapture, SecureMode, SpeechInput, SpeechOutput,
};
use crate::config::SpeechConfig;
use crate::error::{ProctorError, Result};
use crate::events::EventSender;

/// Outbound request sink shared by every shell adapter.
#[derive(Debug, Clone)]
pub struct ShellLink {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl ShellLink {
    pub fn new(tx: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { tx }
    }

    fn request(&self, request: ShellRequest) -> Result<()> {
        self.tx
            .send(HostEvent::Shell(request))
            .map_err(|_| ProctorError::Capability("shell output closed".into()))
    }

    /// Fire-and-forget variant for calls that cannot report failure.
    fn notify(&self, request: ShellRequest) {
        if let Err(e) = self.request(request) {
            tracing::debug!("dropping shell request: {e}");
        }
    }
}

/// Build the full adapter set. `secure_mode_active` is updated by the bridge
/// whenever the shell reports a secure-mode change.
pub fn shell_capabilities(link: ShellLink, secure_mode_active: Arc<AtomicBool>) -> Capabilities {
    Capabilities {
        media: Box::new(ShellMedia { link: link.clone() }),
        face_detector: None,
        speech_input: Box::new(ShellSpeechInput {
            link: link.clone(),
            config: None,
        }),
        speech_output: Box::new(ShellSpeechOutput { link: link.clone() }),
        secure_mode: Box::new(ShellSecureMode {
            link,
            active: secure_mode_active,
        }),
    }
}

struct ShellMedia {
    link: ShellLink,
}

#[async_trait]
impl MediaCapture for ShellMedia {
    async fn acquire(&mut self) -> Result<()> {
        self.link.request(ShellRequest::AcquireMedia)
    }

    fn frame_source(&mut self) -> Option<Box<dyn FrameSource>> {
        // The shell runs detection and posts face counts itself.
        None
    }

    fn set_video_enabled(&mut self, enabled: bool) {
        self.link.notify(ShellRequest::SetVideo { enabled });
    }

    fn set_audio_enabled(&mut self, enabled: bool) {
        self.link.notify(ShellRequest::SetAudio { enabled });
    }

    fn release(&mut self) {
        self.link.notify(ShellRequest::ReleaseMedia);
    }
}

struct ShellSpeechInput {
    link: ShellLink,
    config: Option<SpeechConfig>,
}

impl SpeechInput for ShellSpeechInput {
    fn initialize(&mut self, config: &SpeechConfig, _events: EventSender) -> Result<()> {
        // Results arrive as inbound commands, not through `events`.
        self.config = Some(config.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let Some(config) = self.config.as_ref() else {
            return Err(ProctorError::Capability(
                "speech recognition not initialized".into(),
            ));
        };
        self.link.request(ShellRequest::StartRecognition {
            language: config.language.clone(),
            interim_results: config.interim_results,
        })
    }

    fn stop(&mut self) {
        if self.config.is_some() {
            self.link.notify(ShellRequest::StopRecognition);
        }
    }
}

struct ShellSpeechOutput {
    link: ShellLink,
}

impl SpeechOutput for ShellSpeechOutput {
    fn speak(&mut self, text: &str, rate: f32) -> Result<()> {
        self.link.request(ShellRequest::Speak {
            text: text.to_owned(),
            rate,
        })
    }

    fn cancel(&mut self) {
        self.link.notify(ShellRequest::CancelSpeech);
    }
}

struct ShellSecureMode {
    link: ShellLink,
    active: Arc<AtomicBool>,
}

impl SecureMode for ShellSecureMode {
    fn request_enter(&mut self) -> Result<()> {
        self.link.request(ShellRequest::EnterSecureMode)
    }

    fn request_exit(&mut self) -> Result<()> {
        self.link.request(ShellRequest::ExitSecureMode)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_queue;

    fn drain(rx: &mut mpsc::UnboundedReceiver<HostEvent>) -> Vec<ShellRequest> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let HostEvent::Shell(req) = event {
                out.push(req);
            }
        }
        out
    }

    #[test]
    fn secure_mode_follows_reported_state() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(false));
        let mut caps = shell_capabilities(ShellLink::new(tx), Arc::clone(&active));

        assert!(caps.secure_mode.exit().is_ok());
        assert!(drain(&mut rx).is_empty());

        assert!(caps.secure_mode.enter().is_ok());
        active.store(true, Ordering::SeqCst);
        assert!(caps.secure_mode.enter().is_ok());
        assert!(caps.secure_mode.exit().is_ok());
        assert_eq!(
            drain(&mut rx),
            vec![ShellRequest::EnterSecureMode, ShellRequest::ExitSecureMode]
        );
    }

    #[test]
    fn recognition_needs_initialization() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut caps = shell_capabilities(ShellLink::new(tx), Arc::new(AtomicBool::new(false)));
        assert!(caps.speech_input.start().is_err());
        caps.speech_input.stop();
        assert!(drain(&mut rx).is_empty());

        let (events, _events_rx) = event_queue();
        assert!(
            caps.speech_input
                .initialize(&SpeechConfig::default(), events)
                .is_ok()
        );
        assert!(caps.speech_input.start().is_ok());
        assert_eq!(
            drain(&mut rx),
            vec![ShellRequest::StartRecognition {
                language: "en-US".into(),
                interim_results: true
            }]
        );
    }

    #[test]
    fn closed_output_surfaces_as_capability_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut caps = shell_capabilities(ShellLink::new(tx), Arc::new(AtomicBool::new(false)));
        assert!(matches!(
            caps.speech_output.speak("hello", 0.9),
            Err(ProctorError::Capability(_))
        ));
        caps.speech_output.cancel();
    }
}
