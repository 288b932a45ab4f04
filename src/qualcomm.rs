//! Qualcomm Atheros vendor-specific management messages.
//!
//! Only the network information exchange is implemented: a `NW_INFO.REQ` with an empty payload,
//! answered by one `NW_INFO.CNF` per device describing its logical networks and the stations it
//! can see.

use crate::hpav::{ManagementHeader, MmType, Oui, StationAddress, Version};

pub mod network_info;
pub use network_info::{
    bytes_per_second, InvalidLayout, Layout, NetworkGroup, NetworkInfo, NetworkStatus, StationRole,
    StationStatus, TooManyRecords,
};

/// The Qualcomm Atheros OUI used for vendor-specific HomePlug AV extensions.
pub const OUI: Oui = Oui([0x00, 0xb0, 0x52]);

/// The "localcast" address, to which the directly attached device responds.
pub const LOCAL_ADDRESS: StationAddress = StationAddress([0x00, 0xb0, 0x52, 0x00, 0x00, 0x01]);

pub const NW_INFO_REQ: MmType = MmType::new(0xa038);
pub const NW_INFO_CNF: MmType = MmType::new(0xa039);

/// The header of a `NW_INFO.REQ`, which has no payload.
pub fn nw_info_request() -> ManagementHeader {
    ManagementHeader {
        version: Version::V1_0,
        mm_type: NW_INFO_REQ,
        oui: OUI,
    }
}
