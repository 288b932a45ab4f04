use clap::{Args, Parser, Subcommand};
use homeplug::config::{Destination, DiscoveryConfig, ServerConfig};
use homeplug::discovery::{Discoverer, LogObserver};
use homeplug::qualcomm::Layout;
use homeplug::report::DeviceReport;
use homeplug::transport::interface::Interface;
use homeplug::transport::packet::Socket;
use homeplug::{exporter, report, server};
use log::LevelFilter;
use std::process::exit;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Serve Prometheus metrics, discovering devices on every scrape
    Serve {
        /// Address on which to expose metrics
        #[arg(long = "telemetry.address", default_value = ":9702")]
        address: String,
        /// Path under which to expose metrics
        #[arg(long = "telemetry.endpoint", default_value = "/metrics")]
        endpoint: String,
        #[command(flatten)]
        discovery: Discovery,
    },

    /// Run one discovery cycle, printing each device found as a line of JSON
    Discover {
        #[command(flatten)]
        discovery: Discovery,
    },

    /// List network interfaces which could face a powerline adapter
    ListInterfaces,

    /// Print the JSON schema of `discover` output
    JsonSchema,
}

#[derive(Args, Debug, Clone)]
struct Discovery {
    /// Interface to search for HomePlug devices (default: the first non-loopback interface which
    /// is up)
    #[arg(long)]
    interface: Option<String>,

    /// Destination MAC address for HomePlug devices. Accepts 'local', 'all', and 'broadcast' as
    /// aliases.
    #[arg(long, default_value = "local", value_name = "ADDRESS")]
    destaddr: Destination,

    /// The NW_INFO.CNF payload layout: flat, nested, or auto
    #[arg(long, default_value = "flat")]
    layout: Layout,

    /// The length of each discovery cycle, in milliseconds
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    timeout: u64,

    /// The longest a single read may block, in milliseconds
    #[arg(long, default_value_t = 100, value_name = "MS")]
    read_timeout: u64,
}

impl From<Discovery> for DiscoveryConfig {
    fn from(value: Discovery) -> Self {
        DiscoveryConfig {
            interface: value.interface,
            destination: value.destaddr,
            layout: value.layout,
            timeout_ms: value.timeout,
            read_timeout_ms: value.read_timeout,
        }
    }
}

impl Discovery {
    fn open(&self) -> (Discoverer<Socket, LogObserver>, DiscoveryConfig) {
        let config = DiscoveryConfig::from(self.clone());
        match config.open() {
            Ok(discoverer) => (discoverer, config),
            Err(e) => {
                log::error!("error opening interface: {}", e);
                exit(2);
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Serve {
            address,
            endpoint,
            discovery,
        } => {
            let (discoverer, config) = discovery.open();
            serve(discoverer, &config, ServerConfig { address, endpoint });
        }

        Commands::Discover { discovery } => {
            let (discoverer, config) = discovery.open();
            discover(discoverer, &config);
        }

        Commands::ListInterfaces => list_interfaces(),

        Commands::JsonSchema => {
            println!("{}", serde_json::to_string_pretty(&report::schema()).unwrap());
        }
    }
}

fn serve(
    discoverer: Discoverer<Socket, LogObserver>,
    discovery: &DiscoveryConfig,
    config: ServerConfig,
) {
    log::info!("starting homeplug_exporter {}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "collector parameters: destaddr={} interface={}",
        discovery.destination,
        discoverer.transport().interface().name
    );

    let registry = prometheus::Registry::new();
    let exporter = match exporter::Exporter::new(discoverer, discovery.target()) {
        Ok(exporter) => exporter,
        Err(e) => {
            log::error!("error creating exporter: {}", e);
            exit(1);
        }
    };
    if let Err(e) = exporter::register(&registry, exporter) {
        log::error!("error registering metrics: {}", e);
        exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("error starting runtime: {}", e);
            exit(1);
        }
    };
    if let Err(e) = runtime.block_on(server::run(registry, &config)) {
        log::error!("{}", e);
        exit(1);
    }
}

fn discover(discoverer: Discoverer<Socket, LogObserver>, config: &DiscoveryConfig) {
    let infos = match discoverer.discover(config.target()) {
        Ok(infos) => infos,
        Err(e) => {
            log::error!("error discovering devices: {}", e);
            exit(1);
        }
    };

    if infos.is_empty() {
        log::warn!("no devices responded to {}", config.destination);
    }

    let timestamp = chrono::Local::now();
    for info in infos {
        let report = DeviceReport::new(timestamp, info);
        println!("{}", serde_json::to_string(&report).unwrap());
    }
}

fn list_interfaces() {
    let interfaces = match Interface::list() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            log::error!("error listing interfaces: {}", e);
            exit(1);
        }
    };

    let candidates: Vec<&Interface> = interfaces.iter().filter(|iface| !iface.loopback).collect();
    if candidates.is_empty() {
        println!("No network interfaces detected.");
        return;
    }

    println!("Detected:");
    for iface in candidates {
        println!("    --interface {}", iface.name);
        println!(
            "      {} mtu {} ({})",
            iface.address,
            iface.mtu,
            if iface.up { "up" } else { "down" }
        );
    }
}
