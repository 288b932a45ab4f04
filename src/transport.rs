//! Sending and receiving management messages.
//!
//! A [`Transport`] moves management message payloads (header included) to and from stations. This
//! crate provides an implementation for Linux:
//!
//! * [`packet`], a raw `AF_PACKET` socket bound to one [`interface`]

use crate::hpav::StationAddress;
use std::fmt::Debug;
use std::time::Duration;

#[cfg(target_os = "linux")]
pub mod interface;

#[cfg(target_os = "linux")]
pub mod packet;

/// A management message payload received from a station.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Received {
    pub source: StationAddress,
    pub payload: Vec<u8>,
}

#[derive(thiserror::Error, Debug)]
pub enum ReceiveError {
    #[error("timed out waiting for a frame")]
    Timeout,
    #[error("receive failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A medium carrying management messages.
///
/// One thread may `receive()` while another calls `send()`.
pub trait Transport: Debug {
    /// Send `payload` to `destination`.
    fn send(&self, destination: StationAddress, payload: &[u8]) -> std::io::Result<()>;

    /// Wait up to `timeout` for the next payload.
    fn receive(&self, timeout: Duration) -> Result<Received, ReceiveError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, destination: StationAddress, payload: &[u8]) -> std::io::Result<()> {
        (**self).send(destination, payload)
    }

    fn receive(&self, timeout: Duration) -> Result<Received, ReceiveError> {
        (**self).receive(timeout)
    }
}
