//! In-memory collaborators for unit tests.

use crate::api::{
    ConnectionParameters, Indicator, IndicatorError, IndicatorState, PeerAddress, Radio,
    RadioError, ScanParameters, Storage, Whitelist,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct FakeStorage {
    pending: AtomicU32,
    whitelist: Mutex<Whitelist>,
}

impl FakeStorage {
    pub fn with_whitelist(whitelist: Whitelist) -> Self {
        Self {
            pending: AtomicU32::new(0),
            whitelist: Mutex::new(whitelist),
        }
    }

    pub fn set_pending(&self, count: u32) {
        self.pending.store(count, Ordering::SeqCst);
    }

    pub fn set_whitelist(&self, whitelist: Whitelist) {
        *self.whitelist.lock().unwrap() = whitelist;
    }
}

impl Storage for FakeStorage {
    fn pending_write_count(&self) -> u32 {
        self.pending.load(Ordering::SeqCst)
    }

    fn whitelist(&self) -> Whitelist {
        self.whitelist.lock().unwrap().clone()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RadioCall {
    ScanStart(ScanParameters),
    ScanStop,
    Connect(PeerAddress, ScanParameters, ConnectionParameters),
}

/// Records every call. Results are popped from per-operation queues and
/// default to success once a queue is empty.
#[derive(Debug, Default)]
pub struct FakeRadio {
    calls: Mutex<Vec<RadioCall>>,
    start_results: Mutex<VecDeque<Result<(), RadioError>>>,
    stop_results: Mutex<VecDeque<Result<(), RadioError>>>,
    connect_results: Mutex<VecDeque<Result<(), RadioError>>>,
}

impl FakeRadio {
    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_start(&self, result: Result<(), RadioError>) {
        self.start_results.lock().unwrap().push_back(result);
    }

    pub fn push_stop(&self, result: Result<(), RadioError>) {
        self.stop_results.lock().unwrap().push_back(result);
    }

    pub fn push_connect(&self, result: Result<(), RadioError>) {
        self.connect_results.lock().unwrap().push_back(result);
    }

    fn next(queue: &Mutex<VecDeque<Result<(), RadioError>>>) -> Result<(), RadioError> {
        queue.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl Radio for FakeRadio {
    async fn scan_start(&self, params: &ScanParameters) -> Result<(), RadioError> {
        self.calls
            .lock()
            .unwrap()
            .push(RadioCall::ScanStart(params.clone()));
        Self::next(&self.start_results)
    }

    async fn scan_stop(&self) -> Result<(), RadioError> {
        self.calls.lock().unwrap().push(RadioCall::ScanStop);
        Self::next(&self.stop_results)
    }

    async fn connect(
        &self,
        address: &PeerAddress,
        scan: &ScanParameters,
        conn: &ConnectionParameters,
    ) -> Result<(), RadioError> {
        self.calls
            .lock()
            .unwrap()
            .push(RadioCall::Connect(*address, scan.clone(), *conn));
        Self::next(&self.connect_results)
    }
}

#[derive(Debug, Default)]
pub struct FakeIndicator {
    pub states: Mutex<Vec<IndicatorState>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl FakeIndicator {
    pub fn states(&self) -> Vec<IndicatorState> {
        self.states.lock().unwrap().clone()
    }
}

impl Indicator for FakeIndicator {
    fn set_indicator(&self, state: IndicatorState) -> Result<(), IndicatorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IndicatorError("led driver offline".into()));
        }
        self.states.lock().unwrap().push(state);
        Ok(())
    }
}
