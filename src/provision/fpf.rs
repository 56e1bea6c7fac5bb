//! FPF fuse provisioning workflow.
//!
//! Same shape as the EPID workflow minus the input data: gate on an
//! optional platform hint and the completion flag, enumerate, find the
//! fuse application by capability GUID, connect, query status, and only
//! when the fuses report the awaiting-provision sentinel issue the commit
//! command. Committing fuses is one-way; the caller opts in explicitly
//! via [`crate::config::ProvisionConfig::provision_fpf`].

use log::{info, warn};

use crate::bus::engine::BusEngine;
use crate::bus::transport::TransportLocator;
use crate::bus::wire::{
    FPF_STATUS_AWAITING_PROVISION, FPF_STATUS_DONE, FpfProvisionRequest, FpfProvisionResponse,
    FpfStatusRequest, FpfStatusResponse, ME_FPF_PROTOCOL_GUID,
};
use crate::error::{Error, Result};

use super::flags::{FPF_PROVISIONED_FLAG, ProvisionFlags};
use super::{Outcome, find_capable_client};

/// Platform-provided hint on whether fuse provisioning should run.
///
/// Boards that pre-provision fuses at the factory publish this with
/// `should_provision = false`; absence of the hint defaults to "should
/// provision".
#[derive(Debug, Clone, Copy)]
pub struct FpfHint {
    pub should_provision: bool,
}

/// Run the FPF provisioning workflow to a terminal outcome.
pub fn provision_fpf<L: TransportLocator>(
    engine: &mut BusEngine<L>,
    flags: &mut ProvisionFlags<'_>,
    hint: Option<&FpfHint>,
) -> Result<Outcome> {
    if let Some(hint) = hint {
        if !hint.should_provision {
            info!("fpf: platform hint disables fuse provisioning");
            return Ok(Outcome::NotNeeded);
        }
    }
    if flags.is_done(FPF_PROVISIONED_FLAG) {
        return Ok(Outcome::NotNeeded);
    }

    engine.bind()?;

    let addresses = engine.enumerate_clients()?;
    let Some(address) = find_capable_client(engine, &addresses, &ME_FPF_PROTOCOL_GUID)? else {
        info!("fpf: no fuse application found");
        // Incompatible firmware: suppress retries on every future boot.
        flags.mark_done(FPF_PROVISIONED_FLAG);
        return Ok(Outcome::ApplicationNotFound);
    };
    info!("fpf: found fuse application at {address:#04x}");

    engine.connect(address)?;
    let result = exchange(engine, flags);
    if let Err(e) = engine.disconnect() {
        warn!("fpf: disconnect failed - {e}");
    }
    result
}

/// The status/provision exchange against a connected fuse client.
fn exchange<L: TransportLocator>(
    engine: &mut BusEngine<L>,
    flags: &mut ProvisionFlags<'_>,
) -> Result<Outcome> {
    engine.send_to_client(&FpfStatusRequest.encode())?;
    let mut raw = [0u8; FpfStatusResponse::SIZE];
    engine.await_response(&mut raw)?;
    let status = FpfStatusResponse::decode(&raw)?.status;
    info!("fpf: status {status}");

    if status != FPF_STATUS_AWAITING_PROVISION {
        warn!("fpf: fuses not awaiting provisioning");
        return Err(Error::DeviceError);
    }

    engine.send_to_client(&FpfProvisionRequest.encode())?;
    let mut raw = [0u8; FpfProvisionResponse::SIZE];
    engine.await_response(&mut raw)?;
    let status = FpfProvisionResponse::decode(&raw)?.status;
    info!("fpf: provisioning result {status}");

    if status == FPF_STATUS_DONE {
        flags.mark_done(FPF_PROVISIONED_FLAG);
        Ok(Outcome::Provisioned)
    } else {
        Err(Error::DeviceError)
    }
}

// ── Tests ────────────────────────────────────────────────────
