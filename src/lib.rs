//! Proctor: client-side controller for remotely proctored interviews.
//!
//! A candidate talks to a remote questioning agent over a live session while
//! this crate keeps the session honest and connected:
//!
//! - **Channel**: reconnecting, heartbeated WebSocket link to the agent
//! - **Integrity**: secure-mode exit and face-presence policy with escalation
//! - **Capabilities**: injected camera, speech and fullscreen adapters
//! - **Session**: the single-threaded state machine wiring it all together
//!
//! All callbacks are funnelled into one event queue
//! ([`events::SessionEvent`]) consumed by [`session::SessionController`], so
//! state changes happen strictly one at a time.

pub mod backend;
pub mod capabilities;
pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod integrity;
pub mod protocol;
pub mod session;
pub mod timer;
pub mod transcript;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::ProctorConfig;
pub use error::{ProctorError, Result};
pub use events::SessionEvent;
pub use session::{ProctorEvent, SessionController, SessionOutcome, SessionStatus};
