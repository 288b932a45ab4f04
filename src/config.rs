use crate::discovery;
use crate::hpav::StationAddress;
use crate::qualcomm::{self, Layout};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(target_os = "linux")]
use crate::{
    discovery::{Discoverer, LogObserver},
    transport::{interface, packet},
};

/// Where to send the first request of each discovery cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "String", into = "String")]
pub enum Destination {
    /// The directly attached device.
    #[default]
    Local,
    All,
    Broadcast,
    Station(StationAddress),
}

impl Destination {
    pub fn resolve(self) -> StationAddress {
        match self {
            Destination::Local => qualcomm::LOCAL_ADDRESS,
            Destination::All | Destination::Broadcast => StationAddress::BROADCAST,
            Destination::Station(address) => address,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Destination::Local => f.write_str("local"),
            Destination::All => f.write_str("all"),
            Destination::Broadcast => f.write_str("broadcast"),
            Destination::Station(address) => write!(f, "{}", address),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
#[error("invalid destination {0:?}: expected local, all, broadcast, or a station address")]
pub struct InvalidDestination(String);

impl std::str::FromStr for Destination {
    type Err = InvalidDestination;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Destination::Local),
            "all" => Ok(Destination::All),
            "broadcast" => Ok(Destination::Broadcast),
            _ => s
                .parse()
                .map(Destination::Station)
                .map_err(|_| InvalidDestination(s.into())),
        }
    }
}

impl TryFrom<String> for Destination {
    type Error = InvalidDestination;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Destination> for String {
    fn from(value: Destination) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DiscoveryConfig {
    /// The network interface facing the powerline adapter. If absent, the first interface which
    /// is up and not a loopback is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub layout: Layout,
    /// The length of each discovery cycle, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// The longest a single read may block, in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interface: None,
            destination: Destination::default(),
            layout: Layout::default(),
            timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_read_timeout_ms() -> u64 {
    100
}

#[cfg(target_os = "linux")]
#[derive(thiserror::Error, Debug)]
pub enum OpenError {
    #[error(transparent)]
    Interface(#[from] interface::InterfaceError),
    #[error("failed to open packet socket on {interface}: {source}")]
    Socket {
        interface: String,
        source: std::io::Error,
    },
}

impl DiscoveryConfig {
    pub fn options(&self) -> discovery::Options {
        discovery::Options {
            timeout: Duration::from_millis(self.timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            layout: self.layout,
        }
    }

    pub fn target(&self) -> StationAddress {
        self.destination.resolve()
    }

    /// Open a packet socket on the configured interface.
    #[cfg(target_os = "linux")]
    pub fn open(&self) -> Result<Discoverer<packet::Socket, LogObserver>, OpenError> {
        let interface = interface::Interface::find(self.interface.as_deref())?;
        log::info!(
            "using interface {} ({}, mtu {})",
            interface.name,
            interface.address,
            interface.mtu
        );

        let name = interface.name.clone();
        let socket = packet::Socket::open(interface).map_err(|source| OpenError::Socket {
            interface: name,
            source,
        })?;
        Ok(Discoverer::new(socket, LogObserver, self.options()))
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServerConfig {
    /// The address on which to listen, as `host:port` or `:port`.
    #[serde(default = "default_address")]
    pub address: String,
    /// The path at which metrics are served.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_address() -> String {
    ":9702".into()
}

fn default_endpoint() -> String {
    "/metrics".into()
}

impl ServerConfig {
    /// The address to bind, with an omitted host meaning every interface.
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }

    /// The metrics path, with a leading `/`.
    pub fn endpoint(&self) -> String {
        if self.endpoint.starts_with('/') {
            self.endpoint.clone()
        } else {
            format!("/{}", self.endpoint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_aliases() {
        assert_eq!("local".parse::<Destination>(), Ok(Destination::Local));
        assert_eq!("all".parse::<Destination>(), Ok(Destination::All));
        assert_eq!("BROADCAST".parse::<Destination>(), Ok(Destination::Broadcast));
        assert_eq!(
            "00:0B:3B:5F:28:52".parse::<Destination>(),
            Ok(Destination::Station(StationAddress([
                0x00, 0x0b, 0x3b, 0x5f, 0x28, 0x52
            ])))
        );
        assert_eq!(
            "nearby".parse::<Destination>(),
            Err(InvalidDestination("nearby".into()))
        );
    }

    #[test]
    fn destination_resolve() {
        assert_eq!(Destination::Local.resolve(), qualcomm::LOCAL_ADDRESS);
        assert_eq!(Destination::All.resolve(), StationAddress::BROADCAST);
        assert_eq!(Destination::Broadcast.resolve(), StationAddress::BROADCAST);

        let station = StationAddress([0x00, 0x0b, 0x3b, 0x5f, 0x28, 0x52]);
        assert_eq!(Destination::Station(station).resolve(), station);
    }

    #[test]
    fn destination_display_round_trips() {
        for s in ["local", "all", "broadcast", "00:0b:3b:5f:28:52"] {
            assert_eq!(s.parse::<Destination>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn discovery_config_defaults() {
        let config: DiscoveryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DiscoveryConfig::default());
        assert_eq!(config.target(), qualcomm::LOCAL_ADDRESS);
        assert_eq!(config.options(), discovery::Options::default());

        let config: DiscoveryConfig = serde_json::from_str(
            r#"{"interface":"eth1","destination":"broadcast","layout":"nested","timeout_ms":250}"#,
        )
        .unwrap();
        assert_eq!(config.interface.as_deref(), Some("eth1"));
        assert_eq!(config.target(), StationAddress::BROADCAST);
        assert_eq!(config.layout, Layout::Nested);
        assert_eq!(config.options().timeout, Duration::from_millis(250));
        assert_eq!(config.options().read_timeout, Duration::from_millis(100));

        assert!(serde_json::from_str::<DiscoveryConfig>(r#"{"destination":"bogus"}"#).is_err());
    }

    #[test]
    fn server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:9702");
        assert_eq!(config.endpoint(), "/metrics");

        let config = ServerConfig {
            address: "127.0.0.1:9000".into(),
            endpoint: "scrape".into(),
        };
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.endpoint(), "/scrape");
    }
}
