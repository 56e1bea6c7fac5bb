//! Provisioning workflows layered on the bus engine.
//!
//! Two independent sequential workflows share one shape:
//!
//! ```text
//! CheckNeeded → LocateTransport → ReadInputData (EPID only) → Enumerate
//!   → FindCapableClient → Connect → Exchange → Finalize → Disconnect
//! ```
//!
//! Both run to a terminal [`Outcome`] or a typed error, always disconnect
//! on connected paths, and record the persistent completion flag only for
//! definitive terminal states. Nothing here escalates: the top-level
//! [`run_provisioning`] logs and swallows, because provisioning failure
//! must never block the surrounding boot flow.

pub mod data;
pub mod epid;
pub mod flags;
pub mod fpf;
pub mod ports;

use core::fmt;

use log::{debug, info, warn};

use crate::bus::engine::BusEngine;
use crate::bus::transport::TransportLocator;
use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::guid::Guid;

use flags::ProvisionFlags;
use fpf::FpfHint;
use ports::{BlobStore, FlagStore, PlatformProbe};

/// Terminal outcome of one provisioning workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The remote confirmed the provisioned state; the flag is recorded.
    Provisioned,
    /// Nothing to do: flag already set, hardware absent, hint disabled,
    /// or the remote is not in a provisionable state.
    NotNeeded,
    /// No client advertises the capability; the flag is recorded so
    /// incompatible firmware is never retried.
    ApplicationNotFound,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioned => write!(f, "provisioned"),
            Self::NotNeeded => write!(f, "not needed"),
            Self::ApplicationNotFound => write!(f, "no application found"),
        }
    }
}

/// Linear scan for the client whose capability GUID matches.
///
/// A properties query failure aborts the scan and propagates — a partial
/// scan must not be mistaken for "not present".
pub(crate) fn find_capable_client<L: TransportLocator>(
    engine: &mut BusEngine<L>,
    addresses: &[u8],
    guid: &Guid,
) -> Result<Option<u8>> {
    for &address in addresses {
        let properties = engine.query_client_properties(address)?;
        debug!(
            "provision: client {address:#04x} speaks {}",
            properties.protocol_guid
        );
        if properties.protocol_guid == *guid {
            return Ok(Some(address));
        }
    }
    Ok(None)
}

/// Run every enabled provisioning workflow, logging outcomes.
///
/// Errors are contained here: the boot flow continues regardless of
/// provisioning results.
pub fn run_provisioning<L: TransportLocator>(
    engine: &mut BusEngine<L>,
    blobs: &dyn BlobStore,
    flag_store: &mut dyn FlagStore,
    probe: &mut dyn PlatformProbe,
    fpf_hint: Option<&FpfHint>,
    config: &ProvisionConfig,
) {
    if config.provision_epid {
        info!("provision: starting EPID provisioning");
        let mut flags = ProvisionFlags::new(flag_store, config.force_provisioning);
        match epid::provision_epid(engine, blobs, &mut flags, probe) {
            Ok(outcome) => info!("provision: EPID done - {outcome}"),
            Err(e) => warn!("provision: EPID failed - {e}"),
        }
    }

    if config.provision_fpf {
        info!("provision: starting FPF provisioning");
        let mut flags = ProvisionFlags::new(flag_store, config.force_provisioning);
        match fpf::provision_fpf(engine, &mut flags, fpf_hint) {
            Ok(outcome) => info!("provision: FPF done - {outcome}"),
            Err(e) => warn!("provision: FPF failed - {e}"),
        }
    }
}
