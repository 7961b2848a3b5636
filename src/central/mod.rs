//! The central role: discovery bookkeeping, scan lifecycle and connection
//! orchestration, composed behind [`ConnectionManager`].

mod device_table;
mod manager;
mod orchestrator;
mod scan_policy;
mod scan_session;
mod stats;

pub use self::device_table::{DeviceTable, StoreOutcome};
pub use self::manager::{ConnectionManager, Phase, ScanReport};
pub use self::orchestrator::ConnectionOrchestrator;
pub use self::scan_policy::ScanPolicy;
pub use self::scan_session::{ScanSession, ScanState};
pub use self::stats::Stats;

use crate::api::{Indicator, IndicatorState, Radio, Storage};
use crate::common::event_hub::EventHub;
use log::warn;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Everything outside the manager's own state: collaborators, the event hub and
/// the counters. Shared by reference with the components while they run.
pub(crate) struct Links {
    pub radio: Arc<dyn Radio>,
    pub storage: Arc<dyn Storage>,
    pub indicator: Option<Arc<dyn Indicator>>,
    pub events: EventHub,
    pub counters: stats::Counters,
    /// Set when a scan was refused because storage had writes queued.
    pub memory_access_pending: AtomicBool,
}

impl Links {
    pub fn new(
        radio: Arc<dyn Radio>,
        storage: Arc<dyn Storage>,
        indicator: Option<Arc<dyn Indicator>>,
    ) -> Self {
        Self {
            radio,
            storage,
            indicator,
            events: EventHub::default(),
            counters: stats::Counters::default(),
            memory_access_pending: AtomicBool::new(false),
        }
    }

    /// Indicator failures never abort an operation.
    pub fn indicate(&self, state: IndicatorState) {
        if let Some(indicator) = &self.indicator {
            if let Err(e) = indicator.set_indicator(state) {
                warn!("Setting indicator to {:?} failed: {}", state, e);
            }
        }
    }
}
