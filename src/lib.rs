// btleconn Source Code File
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! btleconn is the connection-lifecycle layer of a BLE central. It sits above
//! a radio stack and below the application, and owns three jobs:
//!
//! * scanning for advertising peripherals, optionally restricted by a
//!   whitelist held in persistent storage,
//! * recording what was found in a small, bounded, deduplicating table,
//! * issuing connection requests to one or all of the recorded peripherals.
//!
//! The radio, the storage subsystem and the board indicator are collaborators
//! described by the traits in [`api`]. Everything is driven through a
//! [`ConnectionManager`](central::ConnectionManager).
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use btleconn::api::{Radio, Storage};
//! # use btleconn::{central::ConnectionManager, config::ManagerConfig};
//! # async fn run(radio: Arc<dyn Radio>, storage: Arc<dyn Storage>) -> btleconn::Result<()> {
//! let manager = ConnectionManager::new(radio, storage, None, ManagerConfig::default());
//! manager.initialize().await?;
//! manager.start_scanning().await?;
//! let requested = manager.connect_all().await?;
//! log::info!("{} connection requests issued", requested);
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod central;
pub mod config;
mod common;

use api::RadioError;

/// The main error type returned by most methods in btleconn.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage has {pending_writes} pending write(s), scan deferred")]
    StorageBusy { pending_writes: u32 },

    #[error("Radio rejected {operation}: {source}")]
    Radio {
        operation: &'static str,
        #[source]
        source: RadioError,
    },

    #[error("No discovered device at index {0}")]
    NoSuchDevice(usize),

    #[error("Connection request for device {index} rejected: {source}")]
    ConnectRejected {
        index: usize,
        #[source]
        source: RadioError,
    },

    #[error("Connection requests failed for device(s) {failed:?}")]
    ConnectAll { failed: Vec<usize> },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Connection manager has been shut down")]
    Shutdown,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True when retrying the same operation later may succeed without any
    /// other change, i.e. the storage subsystem was momentarily busy.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StorageBusy { .. })
    }
}

/// Convenience type for a result using the btleconn [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
pub(crate) mod testing;
