//! The HomePlug AV management message layer.
//!
//! Management messages are carried directly in Ethernet frames using [`ETHER_TYPE`]. Every
//! vendor-specific message starts with a [`ManagementHeader`], followed by a message-specific
//! payload.

// Use `zerocopy` to transmute `#[repr(C)]` structs to/from byte slices
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

mod address;
pub use address::{InvalidStationAddress, NetworkID, Oui, StationAddress};

mod header;
pub use header::{ManagementHeader, MmRole, MmType, Version, HEADER_LEN};

/// The HomePlug AV EtherType, as defined in section 11.1.4 of the HomePlug AV specification.
pub const ETHER_TYPE: u16 = 0x88e1;

/// The input ended before a declared field or record was complete.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
#[error("truncated frame: needed {needed} bytes, {available} available")]
pub struct TruncatedFrame {
    pub needed: usize,
    pub available: usize,
}

/// Read one fixed-size wire struct from the front of `bytes`.
pub(crate) fn read_prefix<T>(bytes: &[u8]) -> Result<(T, &[u8]), TruncatedFrame>
where
    T: FromBytes + KnownLayout + Immutable + Unaligned,
{
    T::read_from_prefix(bytes).map_err(|_| TruncatedFrame {
        needed: std::mem::size_of::<T>(),
        available: bytes.len(),
    })
}
