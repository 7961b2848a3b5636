#![allow(dead_code)]

use async_trait::async_trait;
use btleconn::api::{
    Advertisement, ConnectionParameters, DeviceType, Indicator, IndicatorError, IndicatorState,
    ManagerEvent, PeerAddress, Radio, RadioError, ScanParameters, Storage, Whitelist,
};
use btleconn::central::ConnectionManager;
use btleconn::config::ManagerConfig;
use futures::stream::{Stream, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Instant;

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    ScanStart(ScanParameters),
    ScanStop,
    Connect(PeerAddress, ScanParameters, ConnectionParameters),
}

/// Radio that records each call with the (paused) clock reading. Scripted
/// results are consumed in order; an empty script answers `Ok`.
///
/// The next scan start or connect can be held in flight until the test
/// releases it, see [`MockRadio::hold_next_connect`].
#[derive(Default)]
pub struct MockRadio {
    log: Mutex<Vec<(Instant, Call)>>,
    start: Mutex<VecDeque<Result<(), RadioError>>>,
    stop: Mutex<VecDeque<Result<(), RadioError>>>,
    connect: Mutex<VecDeque<Result<(), RadioError>>>,
    start_gate: Mutex<Option<Arc<Notify>>>,
    connect_gate: Mutex<Option<Arc<Notify>>>,
    entered: Notify,
}

impl MockRadio {
    pub fn script_start(&self, result: Result<(), RadioError>) {
        self.start.lock().unwrap().push_back(result);
    }

    pub fn script_stop(&self, result: Result<(), RadioError>) {
        self.stop.lock().unwrap().push_back(result);
    }

    pub fn script_connect(&self, result: Result<(), RadioError>) {
        self.connect.lock().unwrap().push_back(result);
    }

    /// The next `connect` blocks until the returned gate is notified.
    pub fn hold_next_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.connect_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// The next `scan_start` blocks until the returned gate is notified.
    pub fn hold_next_scan_start(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once a held call has been entered.
    pub async fn held(&self) {
        self.entered.notified().await;
    }

    async fn pass(&self, gate: &Mutex<Option<Arc<Notify>>>) {
        let gate = gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.entered.notify_one();
            gate.notified().await;
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn scan_starts(&self) -> Vec<ScanParameters> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ScanStart(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Connection requests as (time, address).
    pub fn connects(&self) -> Vec<(Instant, PeerAddress)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(at, c)| match c {
                Call::Connect(address, _, _) => Some((*at, *address)),
                _ => None,
            })
            .collect()
    }

    fn record(
        &self,
        call: Call,
        script: &Mutex<VecDeque<Result<(), RadioError>>>,
    ) -> Result<(), RadioError> {
        self.log.lock().unwrap().push((Instant::now(), call));
        script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn scan_start(&self, params: &ScanParameters) -> Result<(), RadioError> {
        self.pass(&self.start_gate).await;
        self.record(Call::ScanStart(params.clone()), &self.start)
    }

    async fn scan_stop(&self) -> Result<(), RadioError> {
        self.record(Call::ScanStop, &self.stop)
    }

    async fn connect(
        &self,
        address: &PeerAddress,
        scan: &ScanParameters,
        conn: &ConnectionParameters,
    ) -> Result<(), RadioError> {
        self.pass(&self.connect_gate).await;
        self.record(Call::Connect(*address, scan.clone(), *conn), &self.connect)
    }
}

#[derive(Default)]
pub struct MockStorage {
    pending: AtomicU32,
    whitelist: Mutex<Whitelist>,
}

impl MockStorage {
    pub fn set_pending(&self, count: u32) {
        self.pending.store(count, Ordering::SeqCst);
    }

    pub fn set_whitelist(&self, addresses: Vec<PeerAddress>) {
        *self.whitelist.lock().unwrap() = Whitelist {
            addresses,
            identity_keys: Vec::new(),
        };
    }
}

impl Storage for MockStorage {
    fn pending_write_count(&self) -> u32 {
        self.pending.load(Ordering::SeqCst)
    }

    fn whitelist(&self) -> Whitelist {
        self.whitelist.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MockIndicator {
    states: Mutex<Vec<IndicatorState>>,
}

impl MockIndicator {
    pub fn states(&self) -> Vec<IndicatorState> {
        self.states.lock().unwrap().clone()
    }
}

impl Indicator for MockIndicator {
    fn set_indicator(&self, state: IndicatorState) -> Result<(), IndicatorError> {
        self.states.lock().unwrap().push(state);
        Ok(())
    }
}

pub struct Harness {
    pub radio: Arc<MockRadio>,
    pub storage: Arc<MockStorage>,
    pub indicator: Arc<MockIndicator>,
    pub manager: ConnectionManager,
}

pub fn harness(config: ManagerConfig) -> Harness {
    init_logging();
    let radio = Arc::new(MockRadio::default());
    let storage = Arc::new(MockStorage::default());
    let indicator = Arc::new(MockIndicator::default());
    let manager = ConnectionManager::new(
        radio.clone(),
        storage.clone(),
        Some(indicator.clone()),
        config,
    );
    Harness {
        radio,
        storage,
        indicator,
        manager,
    }
}

pub fn address(n: u8) -> PeerAddress {
    PeerAddress::public([0xC0, 0xFF, 0xEE, 0x00, 0x00, n])
}

pub fn advert(n: u8) -> Advertisement {
    Advertisement {
        address: address(n),
        rssi: -40 - n as i8,
        payload: vec![0x02, 0x01, 0x06],
    }
}

pub async fn discover(manager: &ConnectionManager, devices: &[u8]) {
    for &n in devices {
        manager
            .on_advertisement(DeviceType::SpeedAndCadence, &advert(n))
            .await;
    }
}

pub async fn next_event<S>(events: &mut S) -> ManagerEvent
where
    S: Stream<Item = ManagerEvent> + Unpin,
{
    events.next().await.expect("event stream ended")
}

/// Waits for the first event matching `want`, skipping the others.
pub async fn wait_for<S>(events: &mut S, want: impl Fn(&ManagerEvent) -> bool) -> ManagerEvent
where
    S: Stream<Item = ManagerEvent> + Unpin,
{
    while let Some(event) = events.next().await {
        if want(&event) {
            return event;
        }
    }
    panic!("event stream ended");
}

pub async fn wait_for_scan_start<S>(events: &mut S) -> bool
where
    S: Stream<Item = ManagerEvent> + Unpin,
{
    match wait_for(events, |e| matches!(e, ManagerEvent::ScanStarted { .. })).await {
        ManagerEvent::ScanStarted { filtered } => filtered,
        _ => unreachable!(),
    }
}

/// Runs one scan cycle, feeding the given advertisers while the window is open.
pub async fn scan_and_discover(
    manager: &ConnectionManager,
    devices: &[u8],
) -> anyhow::Result<()> {
    let mut events = manager.events();
    let scan = tokio::spawn({
        let manager = manager.clone();
        async move { manager.start_scanning().await }
    });
    wait_for_scan_start(&mut events).await;
    discover(manager, devices).await;
    scan.await??;
    Ok(())
}
