use std::io;
use std::net::UdpSocket;

use crate::codec::{self, CodecError};
use crate::message::Outgoing;

/// Errors raised while sending a command. These are reported to the log
/// sink by the caller; commands are never retried or queued.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Encode(#[from] CodecError),

    #[error("writing datagram: {0}")]
    Io(#[from] io::Error),
}

/// The single outbound path to the server. All commands funnel through one
/// connected socket, and each datagram carries a complete message, so
/// writes from different callers cannot interleave mid-message.
pub struct Sender {
    socket: UdpSocket,
    token: String,
}

impl Sender {
    /// Open a socket connected to the server's command port. The token is
    /// attached to every command sent through this sender.
    pub fn connect(port: u16, token: impl Into<String>) -> io::Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", 0))?;
        socket.connect(("127.0.0.1", port))?;
        Ok(Self {
            socket,
            token: token.into(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn send(&self, command: Outgoing) -> Result<(), SendError> {
        tracing::debug!(address = command.address(), "sending command");
        let bytes = codec::encode_outgoing(&self.token, command)?;
        self.socket.send(&bytes)?;
        Ok(())
    }
}
