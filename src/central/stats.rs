use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub scans_started: AtomicU64,
    pub scans_deferred: AtomicU64,
    pub invalid_state_ignored: AtomicU64,
    pub stop_failures: AtomicU64,
    pub devices_dropped: AtomicU64,
    pub connect_requests: AtomicU64,
    pub connect_failures: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Stats {
            scans_started: get(&self.scans_started),
            scans_deferred: get(&self.scans_deferred),
            invalid_state_ignored: get(&self.invalid_state_ignored),
            stop_failures: get(&self.stop_failures),
            devices_dropped: get(&self.devices_dropped),
            connect_requests: get(&self.connect_requests),
            connect_failures: get(&self.connect_failures),
        }
    }
}

/// Counters accumulated over the manager's lifetime.
///
/// `invalid_state_ignored` counts scan starts the radio refused with an
/// invalid-state error that were nevertheless treated as started; a non-zero
/// value points at overlapping scan requests.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub scans_started: u64,
    pub scans_deferred: u64,
    pub invalid_state_ignored: u64,
    /// Stop requests the radio did not confirm.
    pub stop_failures: u64,
    /// Discoveries dropped because the device table was full.
    pub devices_dropped: u64,
    /// Connection requests accepted by the radio.
    pub connect_requests: u64,
    pub connect_failures: u64,
}
