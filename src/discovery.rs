//! Discovering every device on a powerline segment.
//!
//! A discovery cycle sends `NW_INFO.REQ` to an initial target, usually the directly attached
//! device at [`LOCAL_ADDRESS`](crate::qualcomm::LOCAL_ADDRESS). Each `NW_INFO.CNF` names the
//! stations its sender can see, and every station not yet heard from is queried in turn. The cycle
//! ends at a fixed deadline measured from its start.
//!
//! ```text
//!           ┌──────────┐  NetworkInfo  ┌─────────┐
//! frames ──▶│  reader  │──────────────▶│ control │──▶ NW_INFO.REQ
//!           └──────────┘  sync_channel └─────────┘
//! ```
//!
//! The reader runs on its own thread, decoding frames as they arrive. The control loop runs on the
//! caller's thread, deduplicating responses and sending all requests.

use crate::hpav::{ManagementHeader, MmType, StationAddress, TruncatedFrame};
use crate::qualcomm::{self, Layout, NetworkInfo, NW_INFO_CNF};
use crate::transport::{ReceiveError, Received, Transport};
use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::time::{Duration, Instant};


/// Discovery cycle parameters.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Options {
    /// The length of a whole cycle.
    pub timeout: Duration,
    /// The longest a single receive may block.
    pub read_timeout: Duration,
    pub layout: Layout,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            read_timeout: Duration::from_millis(100),
            layout: Layout::default(),
        }
    }
}

/// A received frame which was not a usable `NW_INFO.CNF`.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum FrameError {
    #[error(transparent)]
    Truncated(#[from] TruncatedFrame),
    #[error("unsupported message type {0}")]
    UnsupportedMessageType(MmType),
}

impl FrameError {
    /// How loudly to report this rejection.
    pub fn level(&self) -> log::Level {
        match self {
            FrameError::Truncated(_) => log::Level::Warn,
            // Our own requests are looped back on packet sockets
            FrameError::UnsupportedMessageType(_) => log::Level::Debug,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to send NW_INFO.REQ to {destination}: {source}")]
    Send {
        destination: StationAddress,
        source: std::io::Error,
    },
}

/// Receives notifications about the progress of a discovery cycle.
///
/// Methods are called from both the reader thread and the caller's thread.
pub trait Observer: Sync {
    /// A request was sent.
    fn request_sent(&self, destination: StationAddress);

    /// A frame was received but could not be used.
    fn frame_rejected(&self, source: StationAddress, error: &FrameError);

    /// A confirmation was decoded.
    fn network_info_received(&self, info: &NetworkInfo);

    /// A device responded more than once during this cycle. Only its first response is kept.
    fn duplicate_dropped(&self, address: StationAddress);

    /// Receiving failed, ending the cycle early.
    fn receive_failed(&self, error: &std::io::Error);
}

impl Observer for () {
    fn request_sent(&self, _destination: StationAddress) {}
    fn frame_rejected(&self, _source: StationAddress, _error: &FrameError) {}
    fn network_info_received(&self, _info: &NetworkInfo) {}
    fn duplicate_dropped(&self, _address: StationAddress) {}
    fn receive_failed(&self, _error: &std::io::Error) {}
}

/// An `Observer` which writes to the `log` facade.
#[derive(Debug, Copy, Clone, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn request_sent(&self, destination: StationAddress) {
        log::trace!("sent NW_INFO.REQ to {}", destination);
    }

    fn frame_rejected(&self, source: StationAddress, error: &FrameError) {
        log::log!(error.level(), "ignoring frame from {}: {}", source, error);
    }

    fn network_info_received(&self, info: &NetworkInfo) {
        log::debug!(
            "{} reports {} networks and {} stations",
            info.address,
            info.networks.len(),
            info.stations.len()
        );
        for line in describe(info) {
            log::debug!("  {}", line);
        }
    }

    fn duplicate_dropped(&self, address: StationAddress) {
        log::debug!("dropping duplicate NW_INFO.CNF from {}", address);
    }

    fn receive_failed(&self, error: &std::io::Error) {
        log::warn!("receive failed, ending discovery early: {}", error);
    }
}

/// One line per network and station record in `info`.
fn describe(info: &NetworkInfo) -> Vec<String> {
    let networks = info.networks.iter().map(|network| {
        format!(
            "network nid={} snid={} tei={} role={} cco={} cco_tei={}",
            network.network_id,
            network.short_id,
            network.tei,
            network.role,
            network.cco_address,
            network.cco_tei
        )
    });
    let stations = info.stations.iter().map(|station| {
        format!(
            "station {} tei={} bda={} tx={} B/s rx={} B/s",
            station.address,
            station.tei,
            station.bridged_address,
            station.tx_bytes_per_second(),
            station.rx_bytes_per_second()
        )
    });
    networks.chain(stations).collect()
}

/// Decode a received payload as a `NW_INFO.CNF`.
pub fn decode_confirmation(
    received: &Received,
    layout: Layout,
) -> Result<NetworkInfo, FrameError> {
    let (header, payload) = ManagementHeader::decode(&received.payload)?;
    if header.mm_type != NW_INFO_CNF {
        return Err(FrameError::UnsupportedMessageType(header.mm_type));
    }
    Ok(NetworkInfo::decode(received.source, payload, layout)?)
}

/// Runs discovery cycles over a `Transport`.
#[derive(Debug)]
pub struct Discoverer<T, O = LogObserver> {
    transport: T,
    observer: O,
    options: Options,
}

impl<T: Transport + Sync, O: Observer> Discoverer<T, O> {
    pub fn new(transport: T, observer: O, options: Options) -> Self {
        Self {
            transport,
            observer,
            options,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Run one discovery cycle starting from `target`.
    ///
    /// Returns one `NetworkInfo` per responding device, in the order the responses were accepted.
    /// No response at all is not an error.
    ///
    /// Returns `Error::Send` as soon as any request cannot be sent.
    pub fn discover(&self, target: StationAddress) -> Result<Vec<NetworkInfo>, Error> {
        let deadline = Instant::now() + self.options.timeout;
        let mut cycle = Cycle::default();

        // Replies arriving before the reader starts are queued by the transport
        self.query(&mut cycle, target)?;

        let (tx, rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel();

        std::thread::scope(|scope| {
            scope.spawn(move || self.read(deadline, tx, stop_rx));

            // `rx` and `stop_tx` move in here and are dropped on return, releasing the reader
            self.collect(cycle, deadline, rx, stop_tx)
        })
    }

    fn collect(
        &self,
        mut cycle: Cycle,
        deadline: Instant,
        rx: Receiver<NetworkInfo>,
        _stop: Sender<()>,
    ) -> Result<Vec<NetworkInfo>, Error> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(info) => self.accept(&mut cycle, info)?,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        Ok(cycle.results)
    }

    fn accept(&self, cycle: &mut Cycle, info: NetworkInfo) -> Result<(), Error> {
        if !cycle.seen.insert(info.address) {
            self.observer.duplicate_dropped(info.address);
            return Ok(());
        }

        let peers: Vec<StationAddress> = info.stations.iter().map(|s| s.address).collect();
        cycle.results.push(info);

        for peer in peers {
            if !cycle.seen.contains(&peer) {
                self.query(cycle, peer)?;
            }
        }
        Ok(())
    }

    fn query(&self, cycle: &mut Cycle, destination: StationAddress) -> Result<(), Error> {
        if !cycle.queried.insert(destination) {
            return Ok(());
        }

        let request = qualcomm::nw_info_request().encode();
        self.transport
            .send(destination, &request)
            .map_err(|source| Error::Send {
                destination,
                source,
            })?;
        self.observer.request_sent(destination);
        Ok(())
    }

    fn read(&self, deadline: Instant, tx: SyncSender<NetworkInfo>, stop: Receiver<()>) {
        // A zero read timeout would spin
        let read_timeout = self.options.read_timeout.max(Duration::from_millis(1));

        loop {
            if let Err(TryRecvError::Disconnected) = stop.try_recv() {
                // The control loop is done
                return;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }

            let received = match self.transport.receive(read_timeout.min(remaining)) {
                Ok(received) => received,
                Err(ReceiveError::Timeout) => continue,
                Err(ReceiveError::Io(e)) => {
                    self.observer.receive_failed(&e);
                    return;
                }
            };

            match decode_confirmation(&received, self.options.layout) {
                Ok(info) => {
                    self.observer.network_info_received(&info);
                    if tx.send(info).is_err() {
                        // The control loop is done
                        return;
                    }
                }
                Err(e) => self.observer.frame_rejected(received.source, &e),
            }
        }
    }
}

/// The state of one discovery cycle.
#[derive(Debug, Default)]
struct Cycle {
    /// Devices whose response has been accepted.
    seen: BTreeSet<StationAddress>,
    /// Addresses which have been sent a request.
    queried: BTreeSet<StationAddress>,
    results: Vec<NetworkInfo>,
}
