use super::*;
use std::mem::size_of;
use zerocopy::little_endian;

/// The length of a vendor-specific management message header on the wire.
pub const HEADER_LEN: usize = size_of::<ManagementHeader>();

/// A HomePlug AV management message version, as defined in section 11.1.5 of the HomePlug AV
/// specification.
#[derive(Copy, Clone, Eq, PartialEq, FromBytes, IntoBytes, Unaligned, KnownLayout, Immutable)]
#[repr(transparent)]
pub struct Version(pub u8);
impl Version {
    pub const V1_0: Self = Self(0x00);
    pub const V1_1: Self = Self(0x01);
}

impl std::fmt::Debug for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Self::V1_0 => f.write_str("Version::V1_0"),
            Self::V1_1 => f.write_str("Version::V1_1"),
            _ => f
                .debug_tuple("Version")
                .field(&format_args!("{:#04x}", self.0))
                .finish(),
        }
    }
}

/// The role of a management message, encoded in the low two bits of its type.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MmRole {
    Request,
    Confirm,
    Indication,
    Response,
}

impl MmRole {
    const MASK: u16 = 0b11;

    fn bits(self) -> u16 {
        match self {
            MmRole::Request => 0b00,
            MmRole::Confirm => 0b01,
            MmRole::Indication => 0b10,
            MmRole::Response => 0b11,
        }
    }
}

/// A 16-bit management message type, stored little endian on the wire.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, FromBytes, IntoBytes, Unaligned, KnownLayout, Immutable,
)]
#[repr(transparent)]
pub struct MmType(pub little_endian::U16);

impl MmType {
    pub const fn new(value: u16) -> Self {
        Self(little_endian::U16::new(value))
    }

    pub fn get(self) -> u16 {
        self.0.get()
    }

    /// The message type with its role bits cleared.
    pub fn base(self) -> Self {
        Self::new(self.get() & !MmRole::MASK)
    }

    pub fn role(self) -> MmRole {
        match self.get() & MmRole::MASK {
            0b00 => MmRole::Request,
            0b01 => MmRole::Confirm,
            0b10 => MmRole::Indication,
            _ => MmRole::Response,
        }
    }

    /// The related message type for `role`, e.g. the confirm matching a request.
    pub fn with_role(self, role: MmRole) -> Self {
        Self::new(self.base().get() | role.bits())
    }
}

impl std::fmt::Debug for MmType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("MmType")
            .field(&format_args!("{:#06x}", self.get()))
            .finish()
    }
}

impl std::fmt::Display for MmType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:#06x}", self.get())
    }
}

/// A vendor-specific management message header.
///
/// This is analogous to `qualcomm_hdr` in the open-plc-utils reference implementation: a version
/// byte, a little endian message type, and the vendor's OUI.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, FromBytes, IntoBytes, Unaligned, KnownLayout, Immutable,
)]
#[repr(C)]
pub struct ManagementHeader {
    pub version: Version,
    pub mm_type: MmType,
    pub oui: Oui,
}

impl ManagementHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buffer = [0u8; HEADER_LEN];
        buffer.copy_from_slice(self.as_bytes());
        buffer
    }

    /// Decode a header from the front of `bytes`, returning the header and the message payload
    /// which follows it.
    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8]), TruncatedFrame> {
        read_prefix(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUI: Oui = Oui([0x00, 0xb0, 0x52]);

    #[test]
    fn header_len() {
        assert_eq!(HEADER_LEN, 6);
    }

    #[test]
    fn decode_confirm_header() {
        let (header, payload) =
            ManagementHeader::decode(&[0x00, 0x39, 0xa0, 0x00, 0xb0, 0x52]).unwrap();
        assert_eq!(
            header,
            ManagementHeader {
                version: Version::V1_0,
                mm_type: MmType::new(0xa039),
                oui: OUI,
            }
        );
        assert!(payload.is_empty());
    }

    #[test]
    fn encode_request_header() {
        let header = ManagementHeader {
            version: Version::V1_0,
            mm_type: MmType::new(0xa038),
            oui: OUI,
        };
        assert_eq!(header.encode(), [0x00, 0x38, 0xa0, 0x00, 0xb0, 0x52]);
    }

    #[test]
    fn header_round_trip() {
        for (version, mm_type) in [(0x00, 0xa038), (0x01, 0x6001), (0xff, 0xffff), (0x00, 0x0000)] {
            let header = ManagementHeader {
                version: Version(version),
                mm_type: MmType::new(mm_type),
                oui: Oui([0x12, 0x34, 0x56]),
            };
            let mut bytes = header.encode().to_vec();
            bytes.extend_from_slice(&[0xaa, 0xbb]);

            let (decoded, payload) = ManagementHeader::decode(&bytes).unwrap();
            assert_eq!(decoded, header);
            assert_eq!(payload, &[0xaa, 0xbb]);
        }
    }

    #[test]
    fn decode_short_header() {
        let bytes = [0x00, 0x39, 0xa0, 0x00, 0xb0, 0x52];
        for len in 0..HEADER_LEN {
            assert_eq!(
                ManagementHeader::decode(&bytes[..len]),
                Err(TruncatedFrame {
                    needed: HEADER_LEN,
                    available: len
                })
            );
        }
    }

    #[test]
    fn mm_type_roles() {
        let request = MmType::new(0xa038);
        assert_eq!(request.role(), MmRole::Request);
        assert_eq!(request.with_role(MmRole::Confirm), MmType::new(0xa039));
        assert_eq!(request.with_role(MmRole::Indication), MmType::new(0xa03a));
        assert_eq!(request.with_role(MmRole::Response), MmType::new(0xa03b));

        let confirm = MmType::new(0xa039);
        assert_eq!(confirm.role(), MmRole::Confirm);
        assert_eq!(confirm.base(), request);

        assert_eq!(format!("{:?}", confirm), "MmType(0xa039)");
        assert_eq!(format!("{:?}", Version::V1_0), "Version::V1_0");
        assert_eq!(format!("{:?}", Version(7)), "Version(0x07)");
    }
}
