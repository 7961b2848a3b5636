//! Connection requests towards discovered peripherals.

use super::device_table::DeviceTable;
use super::scan_session::ScanSession;
use super::stats::Counters;
use super::Links;
use crate::api::{ConnectionParameters, ManagerEvent};
use crate::config::ConnectAllPolicy;
use crate::{Error, Result};
use log::{debug, error, info};

/// Holds the parameters applied to new connections and the policy of
/// `connect_all`. Pacing between requests is left to the caller, which owns
/// the timers.
#[derive(Debug)]
pub struct ConnectionOrchestrator {
    params: ConnectionParameters,
    policy: ConnectAllPolicy,
}

impl ConnectionOrchestrator {
    pub fn new(params: ConnectionParameters, policy: ConnectAllPolicy) -> Self {
        Self { params, policy }
    }

    pub fn connection_parameters(&self) -> ConnectionParameters {
        self.params
    }

    /// Applies to requests issued from now on.
    pub fn set_connection_parameters(&mut self, params: ConnectionParameters) {
        self.params = params;
    }

    pub fn policy(&self) -> ConnectAllPolicy {
        self.policy
    }

    /// Stops scanning (best effort) and asks the radio to connect to the
    /// device at `index`.
    ///
    /// Issuing the request clears `whitelist_suppressed`, whether or not the
    /// radio accepts it. `Ok` means the request was accepted; the link itself
    /// is reported later by the radio.
    pub(crate) async fn connect_one(
        &self,
        links: &Links,
        session: &mut ScanSession,
        table: &DeviceTable,
        whitelist_suppressed: &mut bool,
        index: usize,
    ) -> Result<()> {
        // Also drives the indicator to idle.
        let _ = session.stop(links).await;

        let Some(record) = table.get(index) else {
            error!("No discovered device at index {}", index);
            links.events.emit(ManagerEvent::ConnectFailed { index });
            return Err(Error::NoSuchDevice(index));
        };

        debug!("Connection parameters for {}: {}", record.address, self.params);
        let scan = session.last_params().unfiltered();
        let result = links
            .radio
            .connect(&record.address, &scan, &self.params)
            .await;
        *whitelist_suppressed = false;

        match result {
            Ok(()) => {
                info!("Connection requested to {:?} at {}", record.device_type, record.address);
                Counters::bump(&links.counters.connect_requests);
                links.events.emit(ManagerEvent::ConnectRequested {
                    index,
                    address: record.address,
                });
                Ok(())
            }
            Err(e) => {
                error!("Connection request to {} failed, reason {}", record.address, e);
                Counters::bump(&links.counters.connect_failures);
                links.events.emit(ManagerEvent::ConnectFailed { index });
                Err(Error::ConnectRejected { index, source: e })
            }
        }
    }

    pub(crate) fn begin_all(&self, count: usize) -> ConnectAllRun {
        ConnectAllRun {
            policy: self.policy,
            count,
            requested: 0,
            failed: Vec::new(),
        }
    }
}

/// What the caller does after recording one attempt of a `connect_all` pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Step {
    /// Wait the inter-connection delay, then attempt the next index.
    DelayThenNext,
    /// Attempt the next index straight away.
    Next,
    Done,
}

/// Bookkeeping of one `connect_all` pass over indices `0..count`.
#[derive(Debug)]
pub(crate) struct ConnectAllRun {
    policy: ConnectAllPolicy,
    count: usize,
    requested: usize,
    failed: Vec<usize>,
}

impl ConnectAllRun {
    pub fn record(&mut self, index: usize, result: &Result<()>) -> Step {
        let last = index + 1 >= self.count;
        match result {
            Ok(()) => {
                self.requested += 1;
                if last {
                    Step::Done
                } else {
                    Step::DelayThenNext
                }
            }
            Err(_) => {
                self.failed.push(index);
                match self.policy {
                    ConnectAllPolicy::FailFast => Step::Done,
                    ConnectAllPolicy::Continue if last => Step::Done,
                    ConnectAllPolicy::Continue => Step::Next,
                }
            }
        }
    }

    /// Number of accepted requests, or the failed indices.
    pub fn finish(self) -> Result<usize> {
        if self.failed.is_empty() {
            Ok(self.requested)
        } else {
            Err(Error::ConnectAll {
                failed: self.failed,
            })
        }
    }
}
