//! EPID provisioning input data — certificate and group public keys.
//!
//! Both blobs come from the platform's blob store, keyed by well-known
//! file GUIDs, with in-image defaults as fallback for firmware images
//! that ship without them. Sizes are protocol invariants: the remote
//! rejects a certificate that is not exactly 876 bytes, and the key file
//! is a flat array of 392-byte records.
//!
//! Each key record embeds its 32-bit group identifier big-endian in the
//! first four bytes; lookups compare against the little-endian group id
//! the remote reports.

use log::info;

use crate::bus::wire::{EPID_CERTIFICATE_SIZE, EPID_GROUP_PUBLIC_KEY_SIZE};
use crate::error::{Error, Result, StoreError};
use crate::guid::Guid;

use super::ports::BlobStore;

// ───────────────────────────────────────────────────────────────
// Well-known blob identifiers
// ───────────────────────────────────────────────────────────────

/// D1A26C1F-ABF5-4806-BB24-68D317E071D5
pub const EPID_CERTIFICATE_FILE_GUID: Guid = Guid::new(
    0xD1A2_6C1F,
    0xABF5,
    0x4806,
    [0xBB, 0x24, 0x68, 0xD3, 0x17, 0xE0, 0x71, 0xD5],
);

/// 2906CC1F-09CA-4457-9A4F-C212C545D3D3
pub const EPID_GROUP_PUBLIC_KEYS_FILE_GUID: Guid = Guid::new(
    0x2906_CC1F,
    0x09CA,
    0x4457,
    [0x9A, 0x4F, 0xC2, 0x12, 0xC5, 0x45, 0xD3, 0xD3],
);

/// In-image fallback payloads for firmware volumes that lack the blobs.
const DEFAULT_EPID_CERTIFICATE: &[u8] = include_bytes!("default_epid_certificate.bin");
const DEFAULT_GROUP_PUBLIC_KEYS: &[u8] = include_bytes!("default_group_public_keys.bin");

// ───────────────────────────────────────────────────────────────
// Validated blob wrappers
// ───────────────────────────────────────────────────────────────

/// An EPID certificate, exactly [`EPID_CERTIFICATE_SIZE`] bytes.
#[derive(Debug)]
pub struct EpidCertificate(Box<[u8; EPID_CERTIFICATE_SIZE]>);

impl EpidCertificate {
    pub fn as_array(&self) -> &[u8; EPID_CERTIFICATE_SIZE] {
        &self.0
    }
}

/// A flat array of 392-byte group public key records.
#[derive(Debug)]
pub struct GroupPublicKeys(Vec<u8>);

impl GroupPublicKeys {
    /// Number of key records.
    pub fn count(&self) -> usize {
        self.0.len() / EPID_GROUP_PUBLIC_KEY_SIZE
    }

    /// Linear scan for the key whose embedded group identifier matches.
    ///
    /// The identifier is stored big-endian in the record; `group_id` is
    /// the little-endian value the remote reported.
    pub fn find(&self, group_id: u32) -> Option<&[u8; EPID_GROUP_PUBLIC_KEY_SIZE]> {
        self.0
            .chunks_exact(EPID_GROUP_PUBLIC_KEY_SIZE)
            .find(|record| {
                u32::from_be_bytes([record[0], record[1], record[2], record[3]]) == group_id
            })
            .and_then(|record| record.try_into().ok())
    }
}

// ───────────────────────────────────────────────────────────────
// Loading
// ───────────────────────────────────────────────────────────────

/// Read one provisioning blob, falling back to the in-image default when
/// the store has no entry for a recognized identifier. Any other store
/// failure propagates.
fn read_blob(store: &dyn BlobStore, id: &Guid) -> Result<Vec<u8>> {
    match store.read(id) {
        Ok(data) => Ok(data),
        Err(StoreError::NotFound) => {
            info!("provision: no {id} in firmware, using default");
            let default = if *id == EPID_CERTIFICATE_FILE_GUID {
                DEFAULT_EPID_CERTIFICATE
            } else if *id == EPID_GROUP_PUBLIC_KEYS_FILE_GUID {
                DEFAULT_GROUP_PUBLIC_KEYS
            } else {
                return Err(Error::Store(StoreError::NotFound));
            };
            Ok(default.to_vec())
        }
        Err(e) => Err(e.into()),
    }
}

/// Read and validate both EPID input blobs.
///
/// Fails with [`Error::DataCorrupted`] when the certificate is not
/// exactly 876 bytes or the key file is not a multiple of 392; both
/// buffers are owned values, so every failure path releases them.
pub fn read_provisioning_data(
    store: &dyn BlobStore,
) -> Result<(EpidCertificate, GroupPublicKeys)> {
    let certificate = read_blob(store, &EPID_CERTIFICATE_FILE_GUID)?;
    let keys = read_blob(store, &EPID_GROUP_PUBLIC_KEYS_FILE_GUID)?;

    if keys.len() % EPID_GROUP_PUBLIC_KEY_SIZE != 0 {
        return Err(Error::DataCorrupted);
    }
    let certificate: Box<[u8; EPID_CERTIFICATE_SIZE]> = certificate
        .into_boxed_slice()
        .try_into()
        .map_err(|_| Error::DataCorrupted)?;

    Ok((EpidCertificate(certificate), GroupPublicKeys(keys)))
}

// Default payloads must satisfy the same invariants as stored ones.
const _: () = assert!(DEFAULT_EPID_CERTIFICATE.len() == EPID_CERTIFICATE_SIZE);
const _: () = assert!(DEFAULT_GROUP_PUBLIC_KEYS.len() % EPID_GROUP_PUBLIC_KEY_SIZE == 0);

// ── Tests ────────────────────────────────────────────────────
