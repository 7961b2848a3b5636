//! Tunables of the connection manager. Every timing constant and policy choice
//! lives in [`ManagerConfig`]; its `Default` is tuned for a handful of nearby sensors.
//!
//! With the `serde` feature the configuration can be loaded from any serde
//! format. Missing fields fall back to their defaults.

use crate::api::{ConnectionParameters, WhitelistMode};
use crate::{Error, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use serde_cr as serde;
use std::time::Duration;

/// Default capacity of the discovered-device table.
pub const DEVICE_CAPACITY: usize = 10;
/// Scan interval in 0.625 ms units (100 ms).
pub const SCAN_INTERVAL: u16 = 0x00A0;
/// Scan window in 0.625 ms units (50 ms).
pub const SCAN_WINDOW: u16 = 0x0050;
/// How long a scan cycle listens before stopping.
pub const SCAN_PERIOD_MS: u64 = 10_000;
/// Pause between two connection requests of `connect_all`.
pub const CONNECT_DELAY_MS: u64 = 5_000;
/// Radio-side timeout of whitelist-filtered scans.
pub const WHITELIST_SCAN_TIMEOUT_MS: u64 = 30_000;

/// What `connect_all` does when one request fails.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ConnectAllPolicy {
    /// Stop at the first failure; later devices are not attempted.
    #[default]
    FailFast,
    /// Attempt every device and report all failures together.
    Continue,
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr", default)
)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Run scan-then-connect-all on `initialize` without outside commands.
    pub standalone: bool,
    pub device_capacity: usize,
    pub scan_period_ms: u64,
    pub connect_delay_ms: u64,
    pub whitelist_timeout_ms: u64,
    pub scan_interval: u16,
    pub scan_window: u16,
    /// Request scan responses. Passive by default.
    pub active_scan: bool,
    pub whitelist_mode: WhitelistMode,
    pub connect_policy: ConnectAllPolicy,
    pub connection_parameters: ConnectionParameters,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            standalone: false,
            device_capacity: DEVICE_CAPACITY,
            scan_period_ms: SCAN_PERIOD_MS,
            connect_delay_ms: CONNECT_DELAY_MS,
            whitelist_timeout_ms: WHITELIST_SCAN_TIMEOUT_MS,
            scan_interval: SCAN_INTERVAL,
            scan_window: SCAN_WINDOW,
            active_scan: false,
            whitelist_mode: WhitelistMode::default(),
            connect_policy: ConnectAllPolicy::default(),
            connection_parameters: ConnectionParameters::default(),
        }
    }
}

impl ManagerConfig {
    pub fn standalone() -> Self {
        Self {
            standalone: true,
            ..Self::default()
        }
    }

    pub fn scan_period(&self) -> Duration {
        Duration::from_millis(self.scan_period_ms)
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn whitelist_timeout(&self) -> Duration {
        Duration::from_millis(self.whitelist_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_capacity == 0 {
            return Err(Error::InvalidConfig("device_capacity must be positive".into()));
        }
        if self.scan_window == 0 || self.scan_window > self.scan_interval {
            return Err(Error::InvalidConfig(format!(
                "scan window 0x{:x} does not fit scan interval 0x{:x}",
                self.scan_window, self.scan_interval
            )));
        }
        self.connection_parameters.validate()
    }
}
