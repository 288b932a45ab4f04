//! Ethernet II framing.
//!
//! Management messages travel in ordinary Ethernet frames. Unlike the management header, the
//! EtherType is big endian.

use crate::hpav::{read_prefix, StationAddress, TruncatedFrame};
use bytes::BufMut;
use std::mem::size_of;
use zerocopy::{big_endian, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const HEADER_LEN: usize = size_of::<Header>();

/// The shortest frame which may be transmitted, excluding the frame check sequence.
pub const MIN_FRAME_LEN: usize = 60;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, FromBytes, IntoBytes, Unaligned, KnownLayout, Immutable,
)]
#[repr(C)]
pub struct Header {
    pub destination: StationAddress,
    pub source: StationAddress,
    pub ether_type: big_endian::U16,
}

/// An Ethernet frame borrowing its payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame<'a> {
    pub header: Header,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(
        destination: StationAddress,
        source: StationAddress,
        ether_type: u16,
        payload: &'a [u8],
    ) -> Self {
        Self {
            header: Header {
                destination,
                source,
                ether_type: ether_type.into(),
            },
            payload,
        }
    }

    pub fn ether_type(&self) -> u16 {
        self.header.ether_type.get()
    }

    /// Encode the frame for transmission, padding it to the minimum frame length.
    pub fn encode(&self) -> Vec<u8> {
        let len = HEADER_LEN + self.payload.len();
        let mut buffer = Vec::with_capacity(len.max(MIN_FRAME_LEN));
        let initial_capacity = buffer.capacity();

        buffer.put_slice(self.header.as_bytes());
        buffer.put_slice(self.payload);
        if len < MIN_FRAME_LEN {
            buffer.put_bytes(0, MIN_FRAME_LEN - len);
        }

        // Ensure we didn't need to reallocate
        debug_assert_eq!(buffer.capacity(), initial_capacity);

        buffer
    }

    /// Split a received frame into its header and payload.
    ///
    /// Any padding remains part of the payload.
    pub fn decode(bytes: &'a [u8]) -> Result<Self, TruncatedFrame> {
        let (header, payload) = read_prefix(bytes)?;
        Ok(Self { header, payload })
    }
}
