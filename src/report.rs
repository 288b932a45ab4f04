//! Records written by one-shot discovery.

use crate::qualcomm::NetworkInfo;
use chrono::{DateTime, Local};
use schemars::JsonSchema;
use serde::Serialize;

/// One device found during a discovery cycle.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct DeviceReport {
    /// The time at which the discovery cycle finished.
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub info: NetworkInfo,
    /// The device belongs to no logical network, and would not be exported as metrics.
    pub isolated: bool,
}

impl DeviceReport {
    pub fn new(timestamp: DateTime<Local>, info: NetworkInfo) -> Self {
        Self {
            timestamp,
            isolated: info.is_isolated(),
            info,
        }
    }
}

/// The JSON schema of a `DeviceReport`.
pub fn schema() -> schemars::Schema {
    schemars::schema_for!(DeviceReport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpav::{NetworkID, StationAddress};
    use crate::qualcomm::{NetworkStatus, StationRole, StationStatus};
    use serde_json::json;

    #[test]
    fn serialize() {
        let info = NetworkInfo {
            address: StationAddress([0x00, 0x0b, 0x3b, 0x5f, 0x28, 0x52]),
            networks: vec![NetworkStatus {
                network_id: NetworkID([0x2f, 0x1a, 0x52, 0x87, 0x7a, 0x78, 0x05]),
                short_id: 12,
                tei: 1,
                role: StationRole::CCO,
                cco_address: StationAddress([0x00, 0x0b, 0x3b, 0x5f, 0x28, 0x52]),
                cco_tei: 1,
            }],
            stations: vec![StationStatus {
                address: StationAddress([0x00, 0x0b, 0x3b, 0x5f, 0x28, 0x56]),
                tei: 3,
                bridged_address: StationAddress::BROADCAST,
                tx_rate: 0x12,
                rx_rate: 0x19,
            }],
        };

        let mut value = serde_json::to_value(DeviceReport::new(Local::now(), info)).unwrap();
        assert!(value["timestamp"].is_string());
        value.as_object_mut().unwrap().remove("timestamp");

        assert_eq!(
            value,
            json!({
                "address": "00:0b:3b:5f:28:52",
                "networks": [{
                    "network_id": "2f:1a:52:87:7a:78:05",
                    "short_id": 12,
                    "tei": 1,
                    "role": 2,
                    "cco_address": "00:0b:3b:5f:28:52",
                    "cco_tei": 1,
                }],
                "stations": [{
                    "address": "00:0b:3b:5f:28:56",
                    "tei": 3,
                    "bridged_address": "ff:ff:ff:ff:ff:ff",
                    "tx_rate": 18,
                    "rx_rate": 25,
                }],
                "isolated": false,
            })
        );
    }

    #[test]
    fn isolated() {
        let info = NetworkInfo {
            address: StationAddress([0x00, 0x0b, 0x3b, 0x5f, 0x28, 0x99]),
            networks: vec![],
            stations: vec![],
        };
        let report = DeviceReport::new(Local::now(), info);
        assert!(report.isolated);
    }

    #[test]
    fn schema_describes_fields() {
        let schema = serde_json::to_value(schema()).unwrap();
        let properties = &schema["properties"];
        for field in ["timestamp", "address", "networks", "stations", "isolated"] {
            assert!(properties.get(field).is_some(), "missing {}", field);
        }
    }
}
