//! Decides, for each scan start, whether the stored whitelist applies.

use crate::api::{ScanParameters, Storage, Whitelist, WhitelistMode, WHITELIST_MAX};
use crate::config::ManagerConfig;
use log::{debug, warn};
use std::time::Duration;

/// Timing half of the scan parameters; the filtering half is resolved per
/// scan by [`ScanPolicy::resolve`].
#[derive(Clone, Debug)]
pub struct ScanPolicy {
    active: bool,
    interval: u16,
    window: u16,
    whitelist_timeout: Duration,
}

impl ScanPolicy {
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            active: config.active_scan,
            interval: config.scan_interval,
            window: config.scan_window,
            whitelist_timeout: config.whitelist_timeout(),
        }
    }

    /// Filtering is used only in [`WhitelistMode::WhitelistScan`], while not
    /// suppressed, with a non-empty whitelist. Filtered scans carry the
    /// radio-side timeout; unfiltered scans run until stopped.
    ///
    /// The whitelist is read from storage on every call.
    pub fn resolve(
        &self,
        mode: WhitelistMode,
        suppressed: bool,
        storage: &dyn Storage,
    ) -> ScanParameters {
        let whitelist = if mode == WhitelistMode::WhitelistScan && !suppressed {
            Some(capped(storage.whitelist())).filter(|w| !w.is_empty())
        } else {
            None
        };

        debug!(
            "Scan policy: mode={:?} suppressed={} -> {}",
            mode,
            suppressed,
            match &whitelist {
                Some(w) => format!(
                    "whitelist ({} addresses, {} keys)",
                    w.addresses.len(),
                    w.identity_keys.len()
                ),
                None => "no whitelist".to_string(),
            }
        );

        ScanParameters {
            timeout: whitelist.as_ref().map(|_| self.whitelist_timeout),
            whitelist,
            ..self.unfiltered_defaults()
        }
    }

    /// Configured timing without a whitelist or timeout.
    pub fn unfiltered_defaults(&self) -> ScanParameters {
        ScanParameters {
            active: self.active,
            interval: self.interval,
            window: self.window,
            timeout: None,
            whitelist: None,
        }
    }
}

fn capped(mut whitelist: Whitelist) -> Whitelist {
    if whitelist.addresses.len() > WHITELIST_MAX || whitelist.identity_keys.len() > WHITELIST_MAX {
        warn!(
            "Whitelist holds {} addresses and {} keys, using the first {} of each",
            whitelist.addresses.len(),
            whitelist.identity_keys.len(),
            WHITELIST_MAX
        );
        whitelist.addresses.truncate(WHITELIST_MAX);
        whitelist.identity_keys.truncate(WHITELIST_MAX);
    }
    whitelist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{IdentityResolvingKey, PeerAddress};
    use crate::testing::FakeStorage;

    fn policy() -> ScanPolicy {
        ScanPolicy::new(&ManagerConfig::default())
    }

    fn stored(addresses: usize, keys: usize) -> FakeStorage {
        FakeStorage::with_whitelist(Whitelist {
            addresses: (0..addresses)
                .map(|n| PeerAddress::public([0xAA, 0, 0, 0, 0, n as u8]))
                .collect(),
            identity_keys: (0..keys)
                .map(|n| IdentityResolvingKey([n as u8; 16]))
                .collect(),
        })
    }

    #[test]
    fn filters_only_when_every_condition_holds() {
        let modes = [
            WhitelistMode::NoScan,
            WhitelistMode::WhitelistScan,
            WhitelistMode::FastScan,
        ];
        let storages = [stored(0, 0), stored(2, 0), stored(0, 1)];

        for mode in modes {
            for suppressed in [false, true] {
                for storage in &storages {
                    let params = policy().resolve(mode, suppressed, storage);
                    let expect = mode == WhitelistMode::WhitelistScan
                        && !suppressed
                        && !storage.whitelist().is_empty();
                    assert_eq!(params.is_filtered(), expect, "{:?} {}", mode, suppressed);
                    if expect {
                        assert_eq!(params.timeout, Some(Duration::from_secs(30)));
                    } else {
                        assert_eq!(params.timeout, None);
                    }
                }
            }
        }
    }

    #[test]
    fn uses_configured_timing() {
        let params = policy().resolve(WhitelistMode::FastScan, false, &stored(0, 0));
        assert!(!params.active);
        assert_eq!(params.interval, 0x00A0);
        assert_eq!(params.window, 0x0050);
    }

    #[test]
    fn oversized_whitelist_is_capped() {
        let params = policy().resolve(WhitelistMode::WhitelistScan, false, &stored(11, 9));
        let whitelist = params.whitelist.unwrap();
        assert_eq!(whitelist.addresses.len(), WHITELIST_MAX);
        assert_eq!(whitelist.identity_keys.len(), WHITELIST_MAX);
    }

    #[test]
    fn whitelist_is_read_on_every_resolve() {
        let storage = stored(0, 0);
        let policy = policy();
        assert!(!policy
            .resolve(WhitelistMode::WhitelistScan, false, &storage)
            .is_filtered());

        storage.set_whitelist(stored(1, 0).whitelist());
        assert!(policy
            .resolve(WhitelistMode::WhitelistScan, false, &storage)
            .is_filtered());
    }
}
