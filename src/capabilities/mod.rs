//! Capability adapters: thin interfaces over platform facilities.
//!
//! The controller never calls camera, speech or fullscreen APIs directly; it
//! talks to these traits. Platform callbacks come back as
//! [`SessionEvent`](crate::events::SessionEvent)s posted to the queue handed
//! out during initialization, so every callback runs on the session loop.

pub mod face;

use async_trait::async_trait;

use crate::config::SpeechConfig;
use crate::error::Result;
use crate::events::EventSender;

pub use face::{FaceDetector, FrameSampler, FrameSource, VideoFrame};

/// Camera + microphone acquisition.
#[async_trait]
pub trait MediaCapture: Send {
    /// Acquire both devices. Failure is reported to the user and the session
    /// degrades; it is never fatal.
    async fn acquire(&mut self) -> Result<()>;

    /// Reader over the acquired video track for in-process face detection.
    ///
    /// `None` when frames are not available here (not acquired, or the
    /// platform runs detection itself and posts face counts directly).
    fn frame_source(&mut self) -> Option<Box<dyn FrameSource>>;

    fn set_video_enabled(&mut self, enabled: bool);

    fn set_audio_enabled(&mut self, enabled: bool);

    /// Stop every track. Safe to call when nothing was acquired.
    fn release(&mut self);
}

/// Continuous speech-to-text.
pub trait SpeechInput: Send {
    /// Prepare the recognizer. Results, errors and end-of-utterance
    /// notifications are posted to `events` as
    /// [`SessionEvent::Speech`](crate::events::SessionEvent::Speech).
    ///
    /// # Errors
    ///
    /// Returns an error when recognition is not supported on this platform.
    fn initialize(&mut self, config: &SpeechConfig, events: EventSender) -> Result<()>;

    /// Begin (or resume) recognition.
    fn start(&mut self) -> Result<()>;

    /// Stop recognition. Safe to call when not started.
    fn stop(&mut self);
}

/// Speech synthesis for agent utterances.
pub trait SpeechOutput: Send {
    /// Start speaking `text`.
    fn speak(&mut self, text: &str, rate: f32) -> Result<()>;

    /// Silence whatever is currently playing.
    fn cancel(&mut self);
}

/// Exclusive full-viewport display mode.
pub trait SecureMode: Send {
    /// Ask the platform to enter secure mode.
    fn request_enter(&mut self) -> Result<()>;

    /// Ask the platform to leave secure mode.
    fn request_exit(&mut self) -> Result<()>;

    fn is_active(&self) -> bool;

    fn enter(&mut self) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }
        self.request_enter()
    }

    /// Leave secure mode. No-op when not active.
    fn exit(&mut self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.request_exit()
    }
}

/// Speech recognition failure categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    NoSpeech,
    NotAllowed,
    Other(String),
}

impl RecognitionError {
    /// Map a platform error code (`no-speech`, `not-allowed`, …).
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Text shown to the candidate.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoSpeech => "No speech detected. Please speak clearly.",
            Self::NotAllowed => "Microphone access denied.",
            Self::Other(_) => "Speech recognition error. Please try again.",
        }
    }
}

/// Speech recognition callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechInputEvent {
    Started,
    Result { text: String, is_final: bool },
    Error(RecognitionError),
    /// The recognizer stopped (end of utterance or explicit stop).
    Ended,
}

/// The full set of adapters a session runs with.
pub struct Capabilities {
    pub media: Box<dyn MediaCapture>,
    /// In-process detector; `None` when face counts arrive from the platform.
    pub face_detector: Option<Box<dyn FaceDetector>>,
    pub speech_input: Box<dyn SpeechInput>,
    pub speech_output: Box<dyn SpeechOutput>,
    pub secure_mode: Box<dyn SecureMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Viewport {
        active: bool,
        requests: Vec<&'static str>,
    }

    impl SecureMode for Viewport {
        fn request_enter(&mut self) -> Result<()> {
            self.requests.push("enter");
            self.active = true;
            Ok(())
        }

        fn request_exit(&mut self) -> Result<()> {
            self.requests.push("exit");
            self.active = false;
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    #[test]
    fn exit_is_noop_when_inactive() {
        let mut v = Viewport {
            active: false,
            requests: Vec::new(),
        };
        assert!(v.exit().is_ok());
        assert!(v.requests.is_empty());

        assert!(v.enter().is_ok());
        assert!(v.enter().is_ok());
        assert!(v.exit().is_ok());
        assert_eq!(v.requests, vec!["enter", "exit"]);
    }

    #[test]
    fn recognition_error_codes() {
        assert_eq!(RecognitionError::from_code("no-speech"), RecognitionError::NoSpeech);
        assert_eq!(RecognitionError::from_code("not-allowed"), RecognitionError::NotAllowed);
        assert_eq!(
            RecognitionError::from_code("network"),
            RecognitionError::Other("network".into())
        );
        assert_eq!(
            RecognitionError::NotAllowed.user_message(),
            "Microphone access denied."
        );
    }
}
