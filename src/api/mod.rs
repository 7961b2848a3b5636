// btleconn Source Code File
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! The API module holds the collaborator seams of the connection manager and the
//! plain data types that cross them.
//!
//! Three collaborators are consumed:
//!
//! * [`Radio`]: the link-layer stack that scans and connects,
//! * [`Storage`]: the persistent-storage subsystem that owns the whitelist and
//!   may be busy writing to flash,
//! * [`Indicator`]: an optional board LED or similar status output.
//!
//! Advertisement reports flow the other way: the radio's event context calls
//! [`ConnectionManager::on_advertisement`](crate::central::ConnectionManager::on_advertisement).
pub(crate) mod address;

pub use self::address::{AddressType, IdentityResolvingKey, ParseAddressError, PeerAddress};

use async_trait::async_trait;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use serde_cr as serde;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Maximum number of entries of each kind in a whitelist.
pub const WHITELIST_MAX: usize = 8;

/// Application-defined category of a peripheral. The classification is made by
/// the caller from advertisement payload content.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum DeviceType {
    SpeedAndCadence,
    HeartRate,
    Power,
    GearShifter,
    Other(u8),
}

/// A single advertising report as delivered by the radio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advertisement {
    pub address: PeerAddress,
    /// Received signal strength in dBm.
    pub rssi: i8,
    pub payload: Vec<u8>,
}

/// Filter contents read from the storage collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Whitelist {
    pub addresses: Vec<PeerAddress>,
    pub identity_keys: Vec<IdentityResolvingKey>,
}

impl Whitelist {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.identity_keys.is_empty()
    }
}

/// Parameters handed to the radio for a scan, and reused for connection
/// requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanParameters {
    /// Active scanning requests scan responses; passive only listens.
    pub active: bool,
    /// Scan interval in 0.625 ms units.
    pub interval: u16,
    /// Scan window in 0.625 ms units.
    pub window: u16,
    /// Radio-side timeout after which scanning stops by itself. `None` scans
    /// until stopped.
    pub timeout: Option<Duration>,
    /// `Some` restricts reports to whitelisted peers.
    pub whitelist: Option<Whitelist>,
}

impl ScanParameters {
    pub fn is_filtered(&self) -> bool {
        self.whitelist.is_some()
    }

    /// The same timing with filtering turned off. Connection requests are
    /// always directed at an explicit address.
    pub fn unfiltered(&self) -> Self {
        Self {
            whitelist: None,
            ..self.clone()
        }
    }
}

/// Negotiation envelope requested for new connections.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConnectionParameters {
    /// Minimum connection interval in 1.25 ms units.
    pub min_interval: u16,
    /// Maximum connection interval in 1.25 ms units.
    pub max_interval: u16,
    /// Connection events the peripheral may skip.
    pub slave_latency: u16,
    /// Supervision timeout in 10 ms units.
    pub supervision_timeout: u16,
}

impl ConnectionParameters {
    /// Checks the constraints the radio stack places on the envelope. The
    /// manager itself applies parameters as given; this is for callers.
    pub fn validate(&self) -> crate::Result<()> {
        if self.min_interval == 0 || self.min_interval > self.max_interval {
            return Err(crate::Error::InvalidConfig(format!(
                "connection interval range {}..{} is empty",
                self.min_interval, self.max_interval
            )));
        }
        // timeout * 10ms > (1 + latency) * max * 1.25ms * 2, in 0.25 ms steps.
        let timeout = u32::from(self.supervision_timeout) * 40;
        let required = (1 + u32::from(self.slave_latency)) * u32::from(self.max_interval) * 10;
        if timeout <= required {
            return Err(crate::Error::InvalidConfig(format!(
                "supervision timeout {} too short for latency {} at interval {}",
                self.supervision_timeout, self.slave_latency, self.max_interval
            )));
        }
        Ok(())
    }
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            min_interval: 6,          // 7.5 ms
            max_interval: 24,         // 30 ms
            slave_latency: 0,
            supervision_timeout: 400, // 4 s
        }
    }
}

impl Display for ConnectionParameters {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "min conn interval=0x{:x}, max conn interval=0x{:x}, slave latency=0x{:x}, \
             conn supervision timeout=0x{:x}",
            self.min_interval, self.max_interval, self.slave_latency, self.supervision_timeout
        )
    }
}

/// Whether scanning may use the stored whitelist.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub enum WhitelistMode {
    NoScan,
    WhitelistScan,
    #[default]
    FastScan,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndicatorState {
    Scanning,
    Idle,
}

/// Failure reported by the radio collaborator.
#[derive(Copy, Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum RadioError {
    /// The stack is not in a state that allows the request, e.g. stopping a
    /// scan that is not running.
    #[error("invalid state")]
    InvalidState,
    #[error("error code {0:#x}")]
    Code(u32),
}

#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
#[error("indicator update failed: {0}")]
pub struct IndicatorError(pub String);

/// The link-layer stack in central role.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Starts scanning with the given parameters. Reports are delivered
    /// separately through the manager's ingestion entry point.
    async fn scan_start(&self, params: &ScanParameters) -> Result<(), RadioError>;

    /// Stops a running scan. Returns [`RadioError::InvalidState`] if no scan
    /// was running.
    async fn scan_stop(&self) -> Result<(), RadioError>;

    /// Asks the stack to connect to `address`. `Ok` means the request was
    /// accepted; the outcome arrives later as a link-layer event.
    async fn connect(
        &self,
        address: &PeerAddress,
        scan: &ScanParameters,
        conn: &ConnectionParameters,
    ) -> Result<(), RadioError>;
}

/// The persistent-storage subsystem.
pub trait Storage: Send + Sync {
    /// Number of flash operations still queued.
    fn pending_write_count(&self) -> u32;

    /// Current whitelist. Each list may hold at most [`WHITELIST_MAX`]
    /// entries; extra entries are ignored.
    fn whitelist(&self) -> Whitelist;
}

/// Status output for the user. Best effort.
pub trait Indicator: Send + Sync {
    fn set_indicator(&self, state: IndicatorState) -> Result<(), IndicatorError>;
}

/// The type of notifications emitted by the connection manager. Subscribe with
/// [`ConnectionManager::events`](crate::central::ConnectionManager::events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    ScanStarted { filtered: bool },
    ScanStopped,
    ScanDeferred { pending_writes: u32 },
    /// The radio refused to start a scan with an invalid-state error and the
    /// manager carried on as if scanning had started.
    InvalidStateIgnored,
    DeviceDiscovered { index: usize, record: DeviceRecord },
    ConnectRequested { index: usize, address: PeerAddress },
    ConnectFailed { index: usize },
    WhitelistSuppressed,
    StorageReady,
}

/// One discovered peripheral.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_type: DeviceType,
    pub address: PeerAddress,
    /// RSSI in dBm at discovery time.
    pub signal_strength: i8,
}
