//! High level session bridge implementation.
//!
//! A [`Bridge`] owns one editor session against the Sonic Pi server: the
//! session token, the discovered port table, the supervised server process,
//! the control socket, and the little state that gives outbound commands
//! their meaning (run offset, recording flag, mixer flags). External
//! collaborators — the editor's log panel, cue panel and error presenter —
//! drive it through its command methods and consume its [`Event`] stream.

mod bridge;
mod internals;
mod render;
mod state;

pub use bridge::Bridge;
pub use state::Event;
