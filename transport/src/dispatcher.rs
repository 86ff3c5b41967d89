use std::collections::HashMap;
use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use eyre::WrapErr;

use crate::codec::{self, CodecError};
use crate::message::Incoming;

type Handler = Box<dyn FnMut(Incoming) + Send>;

/// One listening socket plus a table from protocol address to handler.
///
/// Handlers are registered up front; [`Dispatcher::spawn`] then moves the
/// dispatcher onto a background thread that processes one datagram at a
/// time to completion. Log and cue output is order-sensitive, so no
/// concurrency is offered beyond that single thread.
pub struct Dispatcher {
    socket: UdpSocket,
    handlers: HashMap<&'static str, Handler>,
}

impl Dispatcher {
    pub fn bind(port: u16) -> eyre::Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", port)).wrap_err("binding control socket")?;
        socket
            .set_read_timeout(Some(Duration::from_secs(1)))
            .wrap_err("configuring control socket")?;
        Ok(Self {
            socket,
            handlers: HashMap::new(),
        })
    }

    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    pub fn register(&mut self, address: &'static str, handler: impl FnMut(Incoming) + Send + 'static) {
        self.handlers.insert(address, Box::new(handler));
    }

    /// Start the receive loop on a background thread.
    pub fn spawn(self) -> DispatcherHandle {
        let running = Arc::new(AtomicBool::new(true));
        let loop_flag = Arc::clone(&running);
        let thread = thread::spawn(move || self.run(loop_flag));
        DispatcherHandle {
            running,
            thread: Some(thread),
        }
    }

    fn run(mut self, running: Arc<AtomicBool>) {
        let mut buf = [0u8; 65536];
        while running.load(Ordering::SeqCst) {
            let received = match self.socket.recv(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "receiving datagram");
                    continue;
                }
            };

            // a message that cannot be decoded must never take down the
            // session: log and move on
            let message = match codec::decode_incoming(&buf[..received]) {
                Ok(message) => message,
                Err(CodecError::UnknownAddress(addr)) => {
                    tracing::debug!(address = %addr, "ignoring message for unknown address");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "dropping undecodable datagram");
                    continue;
                }
            };

            match self.handlers.get_mut(message.address()) {
                Some(handler) => handler(message),
                None => {
                    tracing::trace!(address = message.address(), "no handler registered")
                }
            }
        }
        tracing::debug!("receive loop exiting");
    }
}

/// Owner of the receive loop thread. Stopping (or dropping) the handle
/// releases the listening socket.
pub struct DispatcherHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DispatcherHandle {
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("receive loop panicked");
            }
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
