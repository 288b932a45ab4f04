use crate::hpav::{read_prefix, NetworkID, StationAddress, TruncatedFrame};
use bytes::BufMut;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A station's role within a logical network.
///
/// Devices may report values outside the known set; those are passed through unchanged.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
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
#[serde(transparent)]
pub struct StationRole(pub u8);
impl StationRole {
    /// An ordinary station.
    pub const STA: Self = Self(0);
    /// A proxy coordinator.
    pub const PCO: Self = Self(1);
    /// The central coordinator.
    pub const CCO: Self = Self(2);
}

impl std::fmt::Debug for StationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            StationRole::STA => f.write_str("StationRole::STA"),
            StationRole::PCO => f.write_str("StationRole::PCO"),
            StationRole::CCO => f.write_str("StationRole::CCO"),
            _ => f.debug_tuple("StationRole").field(&self.0).finish(),
        }
    }
}

impl std::fmt::Display for StationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            StationRole::STA => f.write_str("STA"),
            StationRole::PCO => f.write_str("PCO"),
            StationRole::CCO => f.write_str("CCO"),
            _ => write!(f, "{}", self.0),
        }
    }
}

/// The status of one logical network a device belongs to.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    JsonSchema,
    FromBytes,
    IntoBytes,
    Unaligned,
    KnownLayout,
    Immutable,
)]
#[repr(C)]
pub struct NetworkStatus {
    pub network_id: NetworkID,
    pub short_id: u8,
    pub tei: u8,
    pub role: StationRole,
    pub cco_address: StationAddress,
    pub cco_tei: u8,
}

/// A station visible to the reporting device.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    JsonSchema,
    FromBytes,
    IntoBytes,
    Unaligned,
    KnownLayout,
    Immutable,
)]
#[repr(C)]
pub struct StationStatus {
    pub address: StationAddress,
    pub tei: u8,
    pub bridged_address: StationAddress,
    /// Average PHY transmit rate, in Mbit/s.
    pub tx_rate: u8,
    /// Average PHY receive rate, in Mbit/s.
    pub rx_rate: u8,
}

impl StationStatus {
    pub fn tx_bytes_per_second(&self) -> u64 {
        bytes_per_second(self.tx_rate)
    }

    pub fn rx_bytes_per_second(&self) -> u64 {
        bytes_per_second(self.rx_rate)
    }
}

/// Convert a PHY rate byte, in Mbit/s, to bytes per second.
pub fn bytes_per_second(rate: u8) -> u64 {
    u64::from(rate) * 1024 * 1024 / 8
}

/// The network information reported by one device.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, JsonSchema)]
pub struct NetworkInfo {
    /// The address of the responding device.
    pub address: StationAddress,
    pub networks: Vec<NetworkStatus>,
    pub stations: Vec<StationStatus>,
}

impl NetworkInfo {
    /// Decode a `NW_INFO.CNF` payload received from `address`.
    pub fn decode(
        address: StationAddress,
        payload: &[u8],
        layout: Layout,
    ) -> Result<Self, TruncatedFrame> {
        let (networks, stations) = layout.decode(payload)?;
        Ok(Self {
            address,
            networks,
            stations,
        })
    }

    /// A device which belongs to no logical network.
    pub fn is_isolated(&self) -> bool {
        self.networks.is_empty()
    }
}

/// The wire layout of a `NW_INFO.CNF` payload.
///
/// Firmware revisions disagree on where station records go:
///
/// * `Flat`: a network count, the network records, a station count, the station records.
/// * `Nested`: a network count, then for each network its record, a station count, and that
///   network's station records.
///
/// `Auto` probes the payload and uses whichever layout decodes it unambiguously, falling back to
/// `Flat`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Flat,
    Nested,
    Auto,
}

impl Layout {
    pub fn decode(
        self,
        payload: &[u8],
    ) -> Result<(Vec<NetworkStatus>, Vec<StationStatus>), TruncatedFrame> {
        match self {
            Layout::Flat => decode_flat(payload),
            Layout::Nested => decode_nested(payload).map(|groups| {
                let mut networks = Vec::with_capacity(groups.len());
                let mut stations = Vec::new();
                for group in groups {
                    networks.push(group.network);
                    stations.extend(group.stations);
                }
                (networks, stations)
            }),
            Layout::Auto => Self::probe(payload).unwrap_or(Layout::Flat).decode(payload),
        }
    }

    /// Determine which concrete layout describes `payload`.
    ///
    /// Returns `None` if neither layout fits, or if both fit with different results. A payload
    /// with at most one network is identical in both layouts and probes as `Flat`.
    pub fn probe(payload: &[u8]) -> Option<Layout> {
        match (
            Layout::Flat.decode(payload),
            Layout::Nested.decode(payload),
        ) {
            (Ok(flat), Ok(nested)) if flat == nested => Some(Layout::Flat),
            (Ok(_), Err(_)) => Some(Layout::Flat),
            (Err(_), Ok(_)) => Some(Layout::Nested),
            _ => None,
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Layout::Flat => f.write_str("flat"),
            Layout::Nested => f.write_str("nested"),
            Layout::Auto => f.write_str("auto"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
#[error("invalid layout {0:?}: expected flat, nested, or auto")]
pub struct InvalidLayout(String);

impl std::str::FromStr for Layout {
    type Err = InvalidLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Layout::Flat),
            "nested" => Ok(Layout::Nested),
            "auto" => Ok(Layout::Auto),
            _ => Err(InvalidLayout(s.into())),
        }
    }
}

/// A network and the stations reported beneath it in the nested layout.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NetworkGroup {
    pub network: NetworkStatus,
    pub stations: Vec<StationStatus>,
}

/// Reads counts and fixed-size records off the front of a payload.
struct Cursor<'a>(&'a [u8]);

impl<'a> Cursor<'a> {
    fn record<T>(&mut self) -> Result<T, TruncatedFrame>
    where
        T: FromBytes + KnownLayout + Immutable + Unaligned,
    {
        let (record, rest) = read_prefix(self.0)?;
        self.0 = rest;
        Ok(record)
    }

    fn count(&mut self) -> Result<usize, TruncatedFrame> {
        self.record::<u8>().map(usize::from)
    }

    fn records<T>(&mut self, count: usize) -> Result<Vec<T>, TruncatedFrame>
    where
        T: FromBytes + KnownLayout + Immutable + Unaligned,
    {
        (0..count).map(|_| self.record()).collect()
    }
}

pub fn decode_flat(
    payload: &[u8],
) -> Result<(Vec<NetworkStatus>, Vec<StationStatus>), TruncatedFrame> {
    let mut cursor = Cursor(payload);

    let count = cursor.count()?;
    let networks = cursor.records(count)?;

    let count = cursor.count()?;
    let stations = cursor.records(count)?;

    // Anything left over is padding
    Ok((networks, stations))
}

pub fn decode_nested(payload: &[u8]) -> Result<Vec<NetworkGroup>, TruncatedFrame> {
    let mut cursor = Cursor(payload);

    let count = cursor.count()?;
    (0..count)
        .map(|_| {
            let network = cursor.record()?;
            let count = cursor.count()?;
            let stations = cursor.records(count)?;
            Ok(NetworkGroup { network, stations })
        })
        .collect()
}

/// A record list is too long for its one-byte count.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
#[error("{0} records cannot be described by a one-byte count")]
pub struct TooManyRecords(pub usize);

fn put_records<T: IntoBytes + Immutable>(
    out: &mut Vec<u8>,
    records: &[T],
) -> Result<(), TooManyRecords> {
    let count = u8::try_from(records.len()).map_err(|_| TooManyRecords(records.len()))?;
    out.put_u8(count);
    for record in records {
        out.put_slice(record.as_bytes());
    }
    Ok(())
}

pub fn encode_flat(
    networks: &[NetworkStatus],
    stations: &[StationStatus],
) -> Result<Vec<u8>, TooManyRecords> {
    let mut out = Vec::with_capacity(
        2 + networks.len() * std::mem::size_of::<NetworkStatus>()
            + stations.len() * std::mem::size_of::<StationStatus>(),
    );
    put_records(&mut out, networks)?;
    put_records(&mut out, stations)?;
    Ok(out)
}

pub fn encode_nested(groups: &[NetworkGroup]) -> Result<Vec<u8>, TooManyRecords> {
    let count = u8::try_from(groups.len()).map_err(|_| TooManyRecords(groups.len()))?;

    let mut out = Vec::new();
    out.put_u8(count);
    for group in groups {
        out.put_slice(group.network.as_bytes());
        put_records(&mut out, group.stations.as_slice())?;
    }
    Ok(out)
}
