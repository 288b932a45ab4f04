//! Prometheus metrics describing the discovered devices.
//!
//! Every scrape runs one discovery cycle. Metrics are rebuilt from scratch each time, so devices
//! which stop responding disappear from the next scrape.

use crate::discovery::{Discoverer, LogObserver, Observer};
use crate::hpav::StationAddress;
use crate::qualcomm::NetworkInfo;
use crate::transport::Transport;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, Opts, Registry};
use std::sync::{Mutex, PoisonError};

pub const NAMESPACE: &str = "homeplug";

const NETWORK_LABELS: [&str; 7] = [
    "device_addr",
    "nid",
    "snid",
    "tei",
    "role",
    "cco_addr",
    "cco_tei",
];
const STATION_LABELS: [&str; 3] = ["device_addr", "nid", "peer_addr"];

/// A collector which runs a discovery cycle whenever it is scraped.
pub struct Exporter<T, O = LogObserver> {
    discoverer: Mutex<Discoverer<T, O>>,
    target: StationAddress,
    metrics: Metrics,
}

impl<T, O> Exporter<T, O>
where
    T: Transport + Send + Sync,
    O: Observer + Send,
{
    pub fn new(discoverer: Discoverer<T, O>, target: StationAddress) -> prometheus::Result<Self> {
        Ok(Self {
            discoverer: Mutex::new(discoverer),
            target,
            metrics: Metrics::new()?,
        })
    }
}

impl<T: std::fmt::Debug, O: std::fmt::Debug> std::fmt::Debug for Exporter<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("discoverer", &self.discoverer)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl<T, O> Collector for Exporter<T, O>
where
    T: Transport + Send + Sync,
    O: Observer + Send,
{
    fn desc(&self) -> Vec<&Desc> {
        self.metrics.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        // Held until the metrics are collected, so concurrent scrapes can't interleave
        let discoverer = self
            .discoverer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.metrics.reset();
        match discoverer.discover(self.target) {
            Ok(infos) => self.metrics.observe(&infos),
            Err(e) => log::error!("error scraping HomePlug devices: {}", e),
        }
        self.metrics.collect()
    }
}

/// Register `exporter` and the exporter's build information with `registry`.
pub fn register<T, O>(registry: &Registry, exporter: Exporter<T, O>) -> prometheus::Result<()>
where
    T: Transport + Send + Sync + 'static,
    O: Observer + Send + 'static,
{
    registry.register(Box::new(exporter))?;
    registry.register(Box::new(build_info()?))?;
    Ok(())
}

/// `homeplug_exporter_build_info{version}`, always 1.
pub fn build_info() -> prometheus::Result<Gauge> {
    let gauge = Gauge::with_opts(
        Opts::new(
            "exporter_build_info",
            "A metric with a constant '1' value labeled by the exporter version",
        )
        .namespace(NAMESPACE)
        .const_label("version", env!("CARGO_PKG_VERSION")),
    )?;
    gauge.set(1.0);
    Ok(gauge)
}

#[derive(Clone)]
struct Metrics {
    network_info: GaugeVec,
    tx_rate: GaugeVec,
    rx_rate: GaugeVec,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        Ok(Self {
            network_info: GaugeVec::new(
                Opts::new("info", "Logical network information")
                    .namespace(NAMESPACE)
                    .subsystem("network"),
                &NETWORK_LABELS,
            )?,
            tx_rate: GaugeVec::new(
                Opts::new("tx_rate_bytes", "Average PHY Tx data rate")
                    .namespace(NAMESPACE)
                    .subsystem("station"),
                &STATION_LABELS,
            )?,
            rx_rate: GaugeVec::new(
                Opts::new("rx_rate_bytes", "Average PHY Rx data rate")
                    .namespace(NAMESPACE)
                    .subsystem("station"),
                &STATION_LABELS,
            )?,
        })
    }

    fn desc(&self) -> Vec<&Desc> {
        let mut desc = self.network_info.desc();
        desc.extend(self.tx_rate.desc());
        desc.extend(self.rx_rate.desc());
        desc
    }

    fn reset(&self) {
        self.network_info.reset();
        self.tx_rate.reset();
        self.rx_rate.reset();
    }

    fn observe(&self, infos: &[NetworkInfo]) {
        for info in infos {
            let device_addr = info.address.to_string();

            let Some(first) = info.networks.first() else {
                log::info!("ignoring isolated device {}", device_addr);
                continue;
            };

            for network in &info.networks {
                let nid = network.network_id.to_string();
                let snid = network.short_id.to_string();
                let tei = network.tei.to_string();
                let role = network.role.to_string();
                let cco_addr = network.cco_address.to_string();
                let cco_tei = network.cco_tei.to_string();
                self.network_info
                    .with_label_values(&[
                        device_addr.as_str(),
                        nid.as_str(),
                        snid.as_str(),
                        tei.as_str(),
                        role.as_str(),
                        cco_addr.as_str(),
                        cco_tei.as_str(),
                    ])
                    .set(1.0);
            }

            // Stations aren't associated with a particular network; attribute them to the first
            let nid = first.network_id.to_string();
            for station in &info.stations {
                let peer_addr = station.address.to_string();
                let labels = [device_addr.as_str(), nid.as_str(), peer_addr.as_str()];
                self.tx_rate
                    .with_label_values(&labels)
                    .set(station.tx_bytes_per_second() as f64);
                self.rx_rate
                    .with_label_values(&labels)
                    .set(station.rx_bytes_per_second() as f64);
            }
        }
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = self.network_info.collect();
        families.extend(self.tx_rate.collect());
        families.extend(self.rx_rate.collect());
        families
    }
}
