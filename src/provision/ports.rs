//! Port traits — the boundary between the provisioning workflows and the
//! platform.
//!
//! ```text
//!   Platform adapter ──▶ Port trait ──▶ Workflow (domain)
//! ```
//!
//! Driven adapters (firmware-volume readers, NVRAM, PCI access) implement
//! these traits. The workflows consume them via trait objects, so the
//! domain core never touches platform services directly.

use crate::error::StoreError;
use crate::guid::Guid;

// ───────────────────────────────────────────────────────────────
// Blob store (driven adapter: storage volume → domain)
// ───────────────────────────────────────────────────────────────

/// Read-only key/value blob store keyed by GUID.
///
/// Backs certificate and public-key material. The in-image fallback for
/// the two recognized provisioning blobs lives in the workflow logic, not
/// here — adapters report honestly what the volume contains.
pub trait BlobStore {
    /// Read the blob identified by `id` into an owned buffer.
    fn read(&self, id: &Guid) -> Result<Vec<u8>, StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Flag store (driven adapter: domain ↔ persistent variables)
// ───────────────────────────────────────────────────────────────

/// Persistent named `u32` variables surviving across provisioning runs.
///
/// Implementations MUST persist `set` durably — a lost completion flag
/// re-runs a provisioning handshake the remote may no longer accept.
pub trait FlagStore {
    /// Read a named variable.
    fn get(&self, name: &str) -> Result<u32, StoreError>;

    /// Write a named variable durably.
    fn set(&mut self, name: &str, value: u32) -> Result<(), StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Platform probe (driven adapter: PCI configuration space → domain)
// ───────────────────────────────────────────────────────────────

/// Value read from configuration space when no device is present.
pub const PCI_DEVICE_ABSENT: u32 = 0xFFFF_FFFF;

/// Minimal view of PCI configuration space for presence probing.
pub trait PlatformProbe {
    /// Read a 32-bit value from configuration space at `address`
    /// (bus/device/function/offset packed in the platform's encoding).
    fn pci_config_read(&mut self, address: u64) -> Result<u32, StoreError>;
}
