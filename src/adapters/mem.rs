//! In-memory store adapters.
//!
//! Simulation backends for the blob and flag ports — used by host-target
//! tests and as a stand-in on platforms without persistent variables.
//! Real firmware wires NVRAM-backed implementations instead.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::guid::Guid;
use crate::provision::ports::{BlobStore, FlagStore};

/// HashMap-backed blob store.
#[derive(Default)]
pub struct MemBlobStore {
    blobs: HashMap<Guid, Vec<u8>>,
}

impl MemBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob.
    pub fn insert(&mut self, id: Guid, data: Vec<u8>) {
        self.blobs.insert(id, data);
    }
}

impl BlobStore for MemBlobStore {
    fn read(&self, id: &Guid) -> Result<Vec<u8>, StoreError> {
        self.blobs.get(id).cloned().ok_or(StoreError::NotFound)
    }
}

/// HashMap-backed flag store.
#[derive(Default)]
pub struct MemFlagStore {
    flags: HashMap<String, u32>,
}

impl MemFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagStore for MemFlagStore {
    fn get(&self, name: &str) -> Result<u32, StoreError> {
        self.flags.get(name).copied().ok_or(StoreError::NotFound)
    }

    fn set(&mut self, name: &str, value: u32) -> Result<(), StoreError> {
        self.flags.insert(name.to_owned(), value);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────
