//! UDP transport layer for the Sonic Pi server protocol.
//!
//! The server and its editor clients exchange OSC messages, one message per
//! UDP datagram. This crate owns the three transport concerns:
//!
//! - [`codec`] encodes outgoing commands to datagram bytes and decodes
//!   incoming datagrams into the closed [`Incoming`] message set, validating
//!   the argument schema of every known address.
//! - [`Dispatcher`] binds the listening socket and runs the receive loop,
//!   delivering each decoded message to the handler registered for its
//!   address, strictly one at a time in arrival order.
//! - [`Sender`] owns the connected send socket and tags every outgoing
//!   command with the session token.
//!
//! Session semantics (run offsets, recording state, mixer flags) belong in
//! the `bridge` crate; nothing here keeps state beyond the sockets.

pub mod bindings;
pub mod codec;
mod dispatcher;
mod message;
mod sender;

pub use codec::CodecError;
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use message::{address, Incoming, MessagePart, MultiMessage, Outgoing};
pub use sender::{SendError, Sender};
