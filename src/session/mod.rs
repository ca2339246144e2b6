//! Session controller: the top-level state machine tying the channel,
//! integrity monitor, clock, transcript and capability adapters together.

mod controller;
mod state;
mod updates;


pub use controller::{SessionController, SessionOutcome};
pub use state::{Session, SessionSnapshot, SessionStatus};
pub use updates::{Notice, NoticeLevel, ProctorEvent};
