//! The `CanTransport` seam between the protocol engine and a concrete CAN
//! bus. Generalizes the teacher's concrete `CanSocket` so the engine can be
//! driven in tests by an in-memory fake instead of a kernel socket; see
//! DESIGN.md for why this is the one intentional generalization beyond the
//! original's direct coupling.

use std::time::Duration;

use crate::errors::{CanSocketOpenError, Error, Result};
use crate::frame::CanFrame;
use crate::socket::CanSocket;

pub trait CanTransport: Send {
    /// Set (or clear, with `None`) the blocking receive timeout.
    fn set_receive_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Send a single 8-byte-or-fewer CAN frame.
    fn send_frame(&self, id: u32, data: &[u8]) -> Result<()>;

    /// Block for a single CAN frame, up to the configured receive timeout.
    /// Returns `Error::Timeout` if none arrives in time.
    fn read_frame(&self) -> Result<(u32, Vec<u8>)>;
}

/// Wraps the teacher's `CanSocket` to speak the `CanTransport` trait.
pub struct SocketCanTransport {
    socket: CanSocket,
}

impl SocketCanTransport {
    pub fn open(interface: &str) -> std::result::Result<SocketCanTransport, CanSocketOpenError> {
        let socket = CanSocket::open(interface)?;
        Ok(SocketCanTransport { socket })
    }
}

impl CanTransport for SocketCanTransport {
    fn set_receive_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let duration = timeout.unwrap_or_default();
        self.socket
            .set_read_timeout(duration)
            .map_err(Error::from)
    }

    fn send_frame(&self, id: u32, data: &[u8]) -> Result<()> {
        let frame = CanFrame::new(id, data, false, false)
            .map_err(|_| Error::Transport(std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad CAN frame")))?;
        self.socket.write(&frame).map_err(Error::from)
    }

    fn read_frame(&self) -> Result<(u32, Vec<u8>)> {
        let (frame, _timestamp) = self.socket.read().map_err(Error::from)?;
        Ok((frame.id(), frame.data().to_vec()))
    }
}
