// btleconn Source Code File
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use super::device_table::{DeviceTable, StoreOutcome};
use super::orchestrator::{ConnectionOrchestrator, Step};
use super::scan_policy::ScanPolicy;
use super::scan_session::{ScanSession, ScanState};
use super::stats::Stats;
use super::Links;
use crate::api::{
    Advertisement, ConnectionParameters, DeviceRecord, DeviceType, Indicator, ManagerEvent,
    Radio, RadioError, Storage, WhitelistMode,
};
use crate::config::ManagerConfig;
use crate::{Error, Result};
use futures::stream::Stream;
use log::{debug, info, warn};
use static_assertions::assert_impl_all;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{self, Instant};

/// What the manager is waiting on, if anything.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    /// A scan window is open until `deadline`.
    Scanning { deadline: Instant },
    /// `connect_all` issues the request for `next` at `deadline`.
    AwaitingNextConnect { next: usize, deadline: Instant },
}

/// Summary of one completed scan cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScanReport {
    /// Whether the scan was restricted to the whitelist.
    pub filtered: bool,
    /// Records in the device table once the window closed.
    pub devices: usize,
}

struct State {
    table: DeviceTable,
    session: ScanSession,
    orchestrator: ConnectionOrchestrator,
    mode: WhitelistMode,
    whitelist_suppressed: bool,
    phase: Phase,
}

impl State {
    async fn stop_scan(&mut self, links: &Links) -> std::result::Result<(), RadioError> {
        let result = self.session.stop(links).await;
        if let Phase::Scanning { .. } = self.phase {
            self.phase = Phase::Idle;
        }
        result
    }

    async fn connect_one(&mut self, links: &Links, index: usize) -> Result<()> {
        let State {
            table,
            session,
            orchestrator,
            whitelist_suppressed,
            phase,
            ..
        } = self;
        let result = orchestrator
            .connect_one(links, session, table, whitelist_suppressed, index)
            .await;
        if let Phase::Scanning { .. } = phase {
            *phase = Phase::Idle;
        }
        result
    }
}

struct Inner {
    links: Links,
    config: ManagerConfig,
    state: Mutex<State>,
    cancel: watch::Sender<u64>,
    shut_down: AtomicBool,
}

/// The connection manager of one radio.
///
/// Cloning is cheap and every clone drives the same manager, so the context
/// delivering radio events can hold its own handle. All state sits behind one
/// async mutex that is never held across a scan window or an inter-connection
/// delay: advertisements, storage notifications and commands keep being
/// served while the manager waits.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

assert_impl_all!(ConnectionManager: Clone, Send, Sync);

impl ConnectionManager {
    pub fn new(
        radio: Arc<dyn Radio>,
        storage: Arc<dyn Storage>,
        indicator: Option<Arc<dyn Indicator>>,
        config: ManagerConfig,
    ) -> Self {
        let session = ScanSession::new(ScanPolicy::new(&config));
        let orchestrator =
            ConnectionOrchestrator::new(config.connection_parameters, config.connect_policy);
        let state = State {
            table: DeviceTable::with_capacity(config.device_capacity),
            session,
            orchestrator,
            mode: config.whitelist_mode,
            whitelist_suppressed: false,
            phase: Phase::Idle,
        };
        let (cancel, _) = watch::channel(0);
        ConnectionManager {
            inner: Arc::new(Inner {
                links: Links::new(radio, storage, indicator),
                config,
                state: Mutex::new(state),
                cancel,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Empties the device table. In standalone mode this is followed by a scan
    /// cycle and [`connect_all`](Self::connect_all).
    pub async fn initialize(&self) -> Result<()> {
        self.ensure_running()?;
        let mut cancel = self.inner.cancel.subscribe();
        {
            let mut state = self.inner.state.lock().await;
            state.table.clear();
        }
        info!(
            "Connection manager initialised (standalone: {})",
            self.inner.config.standalone
        );

        if self.inner.config.standalone {
            self.scan_cycle(&mut cancel).await?;
            let requested = self.connect_sequence(&mut cancel).await?;
            info!("Standalone start-up issued {} connection request(s)", requested);
        }
        Ok(())
    }

    /// Runs one scan cycle: starts scanning, keeps the window open for the
    /// configured period, then stops.
    ///
    /// Fails with [`Error::StorageBusy`] if storage has writes queued; retry
    /// after [`ManagerEvent::StorageReady`]. If another scan start replaces
    /// this one during the window, the replacement is left running.
    pub async fn start_scanning(&self) -> Result<ScanReport> {
        self.ensure_running()?;
        let mut cancel = self.inner.cancel.subscribe();
        self.scan_cycle(&mut cancel).await
    }

    async fn scan_cycle(&self, cancel: &mut watch::Receiver<u64>) -> Result<ScanReport> {
        self.checkpoint(cancel)?;
        let links = &self.inner.links;
        let period = self.inner.config.scan_period();

        let (epoch, filtered) = {
            let mut state = self.inner.state.lock().await;
            let (mode, suppressed) = (state.mode, state.whitelist_suppressed);
            let epoch = state.session.start(links, mode, suppressed).await?;
            state.phase = Phase::Scanning {
                deadline: Instant::now() + period,
            };
            (epoch, state.session.last_params().is_filtered())
        };

        let waited = self.wait(cancel, period).await;

        let mut state = self.inner.state.lock().await;
        if state.session.epoch() == epoch && state.session.is_scanning() {
            let _ = state.stop_scan(links).await;
        } else {
            debug!("Scan {} superseded before its window closed", epoch);
        }
        waited?;

        Ok(ScanReport {
            filtered,
            devices: state.table.len(),
        })
    }

    /// Requests a connection to the discovered device at `index`. Scanning is
    /// stopped first.
    pub async fn connect(&self, index: usize) -> Result<()> {
        self.ensure_running()?;
        let mut state = self.inner.state.lock().await;
        state.connect_one(&self.inner.links, index).await
    }

    /// Requests connections to every discovered device in discovery order,
    /// pausing the configured delay after each accepted request. Returns the
    /// number of accepted requests.
    ///
    /// On failure the configured [`ConnectAllPolicy`](crate::config::ConnectAllPolicy)
    /// decides whether the remaining devices are still attempted; either way
    /// the failed indices are reported in [`Error::ConnectAll`].
    ///
    /// [`cancel_timers`](Self::cancel_timers) or [`shutdown`](Self::shutdown)
    /// during the pass ends it before the next request is issued.
    pub async fn connect_all(&self) -> Result<usize> {
        self.ensure_running()?;
        let mut cancel = self.inner.cancel.subscribe();
        self.connect_sequence(&mut cancel).await
    }

    async fn connect_sequence(&self, cancel: &mut watch::Receiver<u64>) -> Result<usize> {
        let links = &self.inner.links;
        let delay = self.inner.config.connect_delay();

        let mut run = {
            let state = self.inner.state.lock().await;
            state.orchestrator.begin_all(state.table.len())
        };

        let mut index = 0;
        loop {
            self.checkpoint(cancel)?;
            let step = {
                let mut state = self.inner.state.lock().await;
                if index >= state.table.len() {
                    break;
                }
                let result = state.connect_one(links, index).await;
                let step = run.record(index, &result);
                if step == Step::DelayThenNext {
                    state.phase = Phase::AwaitingNextConnect {
                        next: index + 1,
                        deadline: Instant::now() + delay,
                    };
                }
                step
            };

            match step {
                Step::Done => break,
                Step::Next => {}
                Step::DelayThenNext => {
                    let waited = self.wait(cancel, delay).await;
                    self.inner.state.lock().await.phase = Phase::Idle;
                    waited?;
                }
            }
            index += 1;
        }

        run.finish()
    }

    /// Turns the whitelist off until the next connection request.
    ///
    /// With [`WhitelistMode::WhitelistScan`] active and not yet suppressed, the
    /// running scan is stopped and, if the radio confirms the stop, a fresh
    /// unfiltered scan cycle is run. A stop refused because nothing was
    /// scanning counts as success; other stop errors are returned. The
    /// suppression is in effect afterwards in every case.
    pub async fn disable_whitelist(&self) -> Result<()> {
        self.ensure_running()?;
        let mut cancel = self.inner.cancel.subscribe();
        let links = &self.inner.links;

        let restart = {
            let mut state = self.inner.state.lock().await;
            let stop = if state.mode == WhitelistMode::WhitelistScan && !state.whitelist_suppressed
            {
                state.whitelist_suppressed = true;
                links.events.emit(ManagerEvent::WhitelistSuppressed);
                Some(state.stop_scan(links).await)
            } else {
                None
            };
            state.whitelist_suppressed = true;

            match stop {
                Some(Ok(())) => true,
                Some(Err(RadioError::InvalidState)) | None => false,
                Some(Err(e)) => {
                    return Err(Error::Radio {
                        operation: "scan stop",
                        source: e,
                    })
                }
            }
        };

        if restart {
            info!("Whitelist disabled, restarting scan without it");
            self.scan_cycle(&mut cancel).await?;
        }
        Ok(())
    }

    /// Entry point for advertising reports from the radio. `device_type` is
    /// the caller's classification of the advertiser. Returns `None` when no
    /// scan is running and the report was dropped.
    pub async fn on_advertisement(
        &self,
        device_type: DeviceType,
        report: &Advertisement,
    ) -> Option<StoreOutcome> {
        let mut state = self.inner.state.lock().await;
        let State { table, session, .. } = &mut *state;
        session.ingest(&self.inner.links, table, device_type, report)
    }

    /// Entry point for the radio reporting that a timed scan ended by itself.
    pub async fn on_scan_timeout(&self) {
        let mut state = self.inner.state.lock().await;
        state.session.on_timeout(&self.inner.links);
        if let Phase::Scanning { .. } = state.phase {
            state.phase = Phase::Idle;
        }
    }

    pub async fn update_connection_parameters(&self, params: ConnectionParameters) {
        debug!("Updating connection parameters: {}", params);
        let mut state = self.inner.state.lock().await;
        state.orchestrator.set_connection_parameters(params);
    }

    pub async fn connection_parameters(&self) -> ConnectionParameters {
        self.inner.state.lock().await.orchestrator.connection_parameters()
    }

    pub fn is_storage_busy(&self) -> bool {
        self.inner.links.memory_access_pending.load(Ordering::SeqCst)
    }

    /// Called by the storage subsystem. Clearing the flag emits
    /// [`ManagerEvent::StorageReady`]; the manager does not retry deferred
    /// scans by itself.
    pub fn set_storage_busy(&self, busy: bool) {
        let was_busy = self
            .inner
            .links
            .memory_access_pending
            .swap(busy, Ordering::SeqCst);
        if was_busy && !busy {
            debug!("Storage ready");
            self.inner.links.events.emit(ManagerEvent::StorageReady);
        }
    }

    /// Interrupts every operation in progress: a scan window or
    /// inter-connection delay ends at once, and an operation that is busy with
    /// the radio stops at its next wait or connection request. Interrupted
    /// operations return [`Error::Cancelled`]. Operations started afterwards
    /// are not affected.
    pub fn cancel_timers(&self) {
        self.inner.cancel.send_modify(|generation| *generation += 1);
    }

    /// Cancels timers, stops a running scan and refuses further commands with
    /// [`Error::Shutdown`]. Operations in progress return `Error::Shutdown`
    /// at their next wait or connection request.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel_timers();

        let mut state = self.inner.state.lock().await;
        if state.session.is_scanning() {
            if let Err(e) = state.stop_scan(&self.inner.links).await {
                warn!("Scan stop during shutdown failed: {}", e);
            }
        }
        state.phase = Phase::Idle;
        info!("Connection manager shut down");
    }

    pub async fn devices(&self) -> Vec<DeviceRecord> {
        self.inner.state.lock().await.table.iter().copied().collect()
    }

    pub async fn device(&self, index: usize) -> Option<DeviceRecord> {
        self.inner.state.lock().await.table.get(index).copied()
    }

    pub async fn scan_state(&self) -> ScanState {
        self.inner.state.lock().await.session.state()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.state.lock().await.phase
    }

    pub async fn whitelist_mode(&self) -> WhitelistMode {
        self.inner.state.lock().await.mode
    }

    /// Takes effect at the next scan start.
    pub async fn set_whitelist_mode(&self, mode: WhitelistMode) {
        self.inner.state.lock().await.mode = mode;
    }

    pub async fn is_whitelist_suppressed(&self) -> bool {
        self.inner.state.lock().await.whitelist_suppressed
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Stats {
        self.inner.links.counters.snapshot()
    }

    /// Stream of [`ManagerEvent`]s emitted after the call.
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = ManagerEvent> + Send>> {
        self.inner.links.events.event_stream()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            Err(Error::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Fails if the manager was shut down or cancelled since `cancel` was
    /// subscribed.
    fn checkpoint(&self, cancel: &watch::Receiver<u64>) -> Result<()> {
        self.ensure_running()?;
        if cancel.has_changed().unwrap_or(true) {
            debug!("Operation cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Sleeps for `duration` unless `cancel` has moved on, before or during
    /// the sleep.
    async fn wait(&self, cancel: &mut watch::Receiver<u64>, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = time::sleep(duration) => Ok(()),
            _ = cancel.changed() => {
                self.ensure_running()?;
                Err(Error::Cancelled)
            }
        }
    }
}
