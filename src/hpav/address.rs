use super::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A 48-bit station (Ethernet MAC) address.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    FromBytes,
    IntoBytes,
    Unaligned,
    KnownLayout,
    Immutable,
)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct StationAddress(pub [u8; 6]);

impl StationAddress {
    /// The all-ones link-layer broadcast address.
    pub const BROADCAST: Self = Self([0xff; 6]);
}

impl std::fmt::Debug for StationAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("StationAddress")
            .field(&format_args!("{}", self))
            .finish()
    }
}

impl std::fmt::Display for StationAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write_hex(f, &self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
#[error("invalid station address: {0:?}")]
pub struct InvalidStationAddress(String);

impl std::str::FromStr for StationAddress {
    type Err = InvalidStationAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains('-') { '-' } else { ':' };

        let mut octets = [0u8; 6];
        let mut parts = s.split(separator);
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .filter(|part| part.len() == 2)
                .ok_or_else(|| InvalidStationAddress(s.into()))?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| InvalidStationAddress(s.into()))?;
        }

        if parts.next().is_some() {
            return Err(InvalidStationAddress(s.into()));
        }

        Ok(Self(octets))
    }
}

impl TryFrom<String> for StationAddress {
    type Error = InvalidStationAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StationAddress> for String {
    fn from(value: StationAddress) -> Self {
        value.to_string()
    }
}

/// A 56-bit logical network identifier.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    JsonSchema,
    FromBytes,
    IntoBytes,
    Unaligned,
    KnownLayout,
    Immutable,
)]
#[repr(transparent)]
#[serde(into = "String")]
pub struct NetworkID(pub [u8; 7]);

impl std::fmt::Debug for NetworkID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("NetworkID")
            .field(&format_args!("{}", self))
            .finish()
    }
}

impl std::fmt::Display for NetworkID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write_hex(f, &self.0)
    }
}

impl From<NetworkID> for String {
    fn from(value: NetworkID) -> Self {
        value.to_string()
    }
}

/// A 24-bit Organizationally Unique Identifier, prefixing vendor-specific protocol extensions.
#[derive(
    Copy, Clone, Eq, PartialEq, Hash, FromBytes, IntoBytes, Unaligned, KnownLayout, Immutable,
)]
#[repr(transparent)]
pub struct Oui(pub [u8; 3]);

impl std::fmt::Debug for Oui {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("Oui").field(&format_args!("{}", self)).finish()
    }
}

impl std::fmt::Display for Oui {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write_hex(f, &self.0)
    }
}

fn write_hex(f: &mut std::fmt::Formatter, bytes: &[u8]) -> std::fmt::Result {
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            f.write_str(":")?;
        }
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_address() {
        let address = StationAddress([0x00, 0x0b, 0x3b, 0x5f, 0x28, 0x52]);
        assert_eq!(address.to_string(), "00:0b:3b:5f:28:52");
        assert_eq!(
            format!("{:?}", address),
            "StationAddress(00:0b:3b:5f:28:52)"
        );

        assert_eq!("00:0b:3b:5f:28:52".parse(), Ok(address));
        assert_eq!("00-0B-3B-5F-28-52".parse(), Ok(address));
        assert_eq!(
            "ff:ff:ff:ff:ff:ff".parse::<StationAddress>(),
            Ok(StationAddress::BROADCAST)
        );
    }

    #[test]
    fn invalid_station_address() {
        for s in [
            "",
            "00:0b:3b:5f:28",
            "00:0b:3b:5f:28:52:01",
            "00:0b:3b:5f:28:5",
            "00:0b:3b:5f:28:zz",
            "000b3b5f2852",
        ] {
            assert_eq!(
                s.parse::<StationAddress>(),
                Err(InvalidStationAddress(s.into())),
                "{:?}",
                s
            );
        }
    }

    #[test]
    fn station_address_serde() {
        let address = StationAddress([0x00, 0x0b, 0x3b, 0x5f, 0x28, 0x56]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"00:0b:3b:5f:28:56\"");
        assert_eq!(
            serde_json::from_str::<StationAddress>(&json).unwrap(),
            address
        );
        assert!(serde_json::from_str::<StationAddress>("\"nope\"").is_err());
    }

    #[test]
    fn network_id_and_oui_fmt() {
        let nid = NetworkID([0x2f, 0x1a, 0x52, 0x87, 0x7a, 0x78, 0x05]);
        assert_eq!(nid.to_string(), "2f:1a:52:87:7a:78:05");
        assert_eq!(format!("{:?}", nid), "NetworkID(2f:1a:52:87:7a:78:05)");

        assert_eq!(Oui([0x00, 0xb0, 0x52]).to_string(), "00:b0:52");
    }
}
