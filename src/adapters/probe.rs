//! Platform probe adapters.
//!
//! [`StaticProbe`] answers configuration-space reads from a fixed table —
//! the simulation stand-in for real PCI access, and the way tests model
//! boards with or without the integrated GPU.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::provision::ports::{PCI_DEVICE_ABSENT, PlatformProbe};

/// Probe answering from a fixed address → value table.
///
/// Unmapped addresses read as [`PCI_DEVICE_ABSENT`], matching what real
/// configuration space returns for a missing device.
#[derive(Default)]
pub struct StaticProbe {
    values: HashMap<u64, u32>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a configuration-space address to a value.
    pub fn set(&mut self, address: u64, value: u32) {
        self.values.insert(address, value);
    }
}

impl PlatformProbe for StaticProbe {
    fn pci_config_read(&mut self, address: u64) -> Result<u32, StoreError> {
        Ok(self
            .values
            .get(&address)
            .copied()
            .unwrap_or(PCI_DEVICE_ABSENT))
    }
}

// ── Tests ────────────────────────────────────────────────────
