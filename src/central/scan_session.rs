// btleconn Source Code File
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Scan start/stop lifecycle and advertisement ingestion.

use super::device_table::{DeviceTable, StoreOutcome};
use super::scan_policy::ScanPolicy;
use super::stats::Counters;
use super::Links;
use crate::api::{
    Advertisement, DeviceType, IndicatorState, ManagerEvent, RadioError, ScanParameters,
    WhitelistMode,
};
use crate::{Error, Result};
use log::{debug, error, info, trace, warn};
use std::sync::atomic::Ordering;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
}

/// Owns whether the radio is scanning. Every start opens a new epoch so that
/// a scan window timer armed for an earlier scan can tell it has been
/// superseded.
#[derive(Debug)]
pub struct ScanSession {
    state: ScanState,
    epoch: u64,
    policy: ScanPolicy,
    last_params: ScanParameters,
}

impl ScanSession {
    pub fn new(policy: ScanPolicy) -> Self {
        let last_params = policy.unfiltered_defaults();
        Self {
            state: ScanState::Idle,
            epoch: 0,
            policy,
            last_params,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Parameters of the most recent scan start.
    pub fn last_params(&self) -> &ScanParameters {
        &self.last_params
    }

    /// Starts a scan and returns its epoch.
    ///
    /// Refused with [`Error::StorageBusy`] while storage has queued writes;
    /// the caller retries once storage reports ready. A running scan is
    /// stopped first. An invalid-state refusal from the radio is counted and
    /// otherwise treated as success.
    pub(crate) async fn start(
        &mut self,
        links: &Links,
        mode: WhitelistMode,
        suppressed: bool,
    ) -> Result<u64> {
        let pending_writes = links.storage.pending_write_count();
        if pending_writes != 0 {
            links.memory_access_pending.store(true, Ordering::SeqCst);
            Counters::bump(&links.counters.scans_deferred);
            links
                .events
                .emit(ManagerEvent::ScanDeferred { pending_writes });
            info!(
                "Deferring scan, storage has {} pending write(s)",
                pending_writes
            );
            return Err(Error::StorageBusy { pending_writes });
        }

        if self.is_scanning() {
            debug!("Restarting scan {}", self.epoch);
            let _ = self.stop(links).await;
        }

        let params = self.policy.resolve(mode, suppressed, links.storage.as_ref());
        debug!("Starting scan: {:?}", params);
        match links.radio.scan_start(&params).await {
            Ok(()) => {}
            Err(RadioError::InvalidState) => {
                warn!("Radio returned invalid state on scan start, continuing as started");
                Counters::bump(&links.counters.invalid_state_ignored);
                links.events.emit(ManagerEvent::InvalidStateIgnored);
            }
            Err(e) => {
                error!("Scan start failed: {}", e);
                return Err(Error::Radio {
                    operation: "scan start",
                    source: e,
                });
            }
        }

        links.indicate(IndicatorState::Scanning);
        self.state = ScanState::Scanning;
        self.epoch += 1;
        Counters::bump(&links.counters.scans_started);
        links.events.emit(ManagerEvent::ScanStarted {
            filtered: params.is_filtered(),
        });
        self.last_params = params;
        Ok(self.epoch)
    }

    /// Asks the radio to stop scanning and returns to `Idle` whatever the
    /// radio answers; a stop that cannot be confirmed must not leave the
    /// session stuck in `Scanning`. The radio's answer is handed back for
    /// callers that act on it.
    pub(crate) async fn stop(&mut self, links: &Links) -> std::result::Result<(), RadioError> {
        let result = links.radio.scan_stop().await;
        if let Err(e) = &result {
            if self.is_scanning() {
                error!("Scan stop failed, reason {}", e);
            } else {
                debug!("Scan stop while idle: {}", e);
            }
            Counters::bump(&links.counters.stop_failures);
        }
        self.finish(links);
        result
    }

    /// The radio ended a timed (whitelist) scan on its own.
    pub(crate) fn on_timeout(&mut self, links: &Links) {
        if self.is_scanning() {
            info!("Scan {} timed out", self.epoch);
            self.finish(links);
        }
    }

    /// Records the advertiser when scanning; reports arriving at any other
    /// time are late and dropped.
    pub(crate) fn ingest(
        &self,
        links: &Links,
        table: &mut DeviceTable,
        device_type: DeviceType,
        report: &Advertisement,
    ) -> Option<StoreOutcome> {
        if !self.is_scanning() {
            trace!("Dropping report from {} outside a scan", report.address);
            return None;
        }

        let outcome = table.store(device_type, report.address, report.rssi);
        match outcome {
            StoreOutcome::Stored(index) => {
                info!(
                    "Discovered {:?} at {} (RSSI {})",
                    device_type, report.address, report.rssi
                );
                if let Some(record) = table.get(index) {
                    links.events.emit(ManagerEvent::DeviceDiscovered {
                        index,
                        record: *record,
                    });
                }
            }
            StoreOutcome::AlreadyPresent(index) => {
                trace!("{:?} at {} already stored at {}", device_type, report.address, index);
            }
            StoreOutcome::CapacityExceeded => {
                Counters::bump(&links.counters.devices_dropped);
            }
        }
        Some(outcome)
    }

    fn finish(&mut self, links: &Links) {
        links.indicate(IndicatorState::Idle);
        if self.is_scanning() {
            self.state = ScanState::Idle;
            links.events.emit(ManagerEvent::ScanStopped);
        }
    }
}
