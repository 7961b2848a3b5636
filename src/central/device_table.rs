//! Bounded record of the peripherals seen while scanning.

use crate::api::{DeviceRecord, DeviceType, PeerAddress};
use log::debug;

/// Result of [`DeviceTable::store`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StoreOutcome {
    /// Appended at the given index.
    Stored(usize),
    /// A record with the same type and address already sits at the index.
    AlreadyPresent(usize),
    /// The table is full; nothing was changed.
    CapacityExceeded,
}

/// Discovered peripherals in discovery order. The order doubles as the order
/// in which `connect_all` issues requests, so records are never reordered or
/// removed individually.
#[derive(Clone, Debug)]
pub struct DeviceTable {
    records: Vec<DeviceRecord>,
    capacity: usize,
}

impl DeviceTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a peripheral unless it is already known as the same
    /// `(device_type, address)` pair or the table is full. Addresses match on
    /// their six bytes alone, so a peer reported once as public and once as
    /// random static is stored once. Linear in the number of records, which
    /// stays small.
    pub fn store(
        &mut self,
        device_type: DeviceType,
        address: PeerAddress,
        signal_strength: i8,
    ) -> StoreOutcome {
        if let Some(index) = self
            .records
            .iter()
            .position(|r| r.device_type == device_type && r.address.bytes() == address.bytes())
        {
            return StoreOutcome::AlreadyPresent(index);
        }

        if self.records.len() >= self.capacity {
            debug!(
                "Device table full ({} records), dropping {:?} {}",
                self.records.len(),
                device_type,
                address
            );
            return StoreOutcome::CapacityExceeded;
        }

        self.records.push(DeviceRecord {
            device_type,
            address,
            signal_strength,
        });
        StoreOutcome::Stored(self.records.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&DeviceRecord> {
        self.records.get(index)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.iter()
    }
}
