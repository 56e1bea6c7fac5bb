//! EPID attestation provisioning workflow.
//!
//! Sequential handshake: check whether work is needed, locate the
//! transport, read the certificate and group-key material, enumerate the
//! bus, find the attestation application by capability GUID, connect,
//! run the status/perform exchange, record the completion flag, and
//! disconnect. Every connected path disconnects; the blob buffers are
//! owned values released on every exit path.

use log::{info, warn};

use crate::bus::engine::{BusEngine, retry_on_timeout};
use crate::bus::transport::TransportLocator;
use crate::bus::wire::{
    EPID_STATUS_CAN_PROVISION, EPID_STATUS_FAIL_PROVISION, EPID_STATUS_PROVISIONED,
    EpidPerformRequest, EpidPerformResponse, EpidStatusRequest, EpidStatusResponse,
    ME_EPID_PROTOCOL_GUID,
};
use crate::error::{Error, Result};

use super::data::{self, EpidCertificate, GroupPublicKeys};
use super::flags::{EPID_PROVISIONED_FLAG, ProvisionFlags};
use super::ports::{BlobStore, PCI_DEVICE_ABSENT, PlatformProbe};
use super::{Outcome, find_capable_client};

/// Configuration-space address of the integrated GPU's vendor id
/// (device 2, function 0, offset 0). All-ones means the board has no
/// integrated GPU and EPID provisioning does not apply.
pub const IGPU_CONFIG_ADDRESS: u64 = 0x2_0000;

/// Attempts for the perform response wait; only timeouts are retried.
const PERFORM_ATTEMPTS: usize = 3;

fn builtin_gpu_present(probe: &mut dyn PlatformProbe) -> bool {
    match probe.pci_config_read(IGPU_CONFIG_ADDRESS) {
        Ok(value) => {
            info!("epid: IGPU id {value:#010x}");
            value != PCI_DEVICE_ABSENT
        }
        Err(e) => {
            info!("epid: failed to read IGPU config - {e}");
            false
        }
    }
}

/// Run the EPID provisioning workflow to a terminal outcome.
pub fn provision_epid<L: TransportLocator>(
    engine: &mut BusEngine<L>,
    blobs: &dyn BlobStore,
    flags: &mut ProvisionFlags<'_>,
    probe: &mut dyn PlatformProbe,
) -> Result<Outcome> {
    if !builtin_gpu_present(probe) {
        info!("epid: no integrated GPU, nothing to provision");
        return Ok(Outcome::NotNeeded);
    }
    if flags.is_done(EPID_PROVISIONED_FLAG) {
        return Ok(Outcome::NotNeeded);
    }

    engine.bind()?;

    let (certificate, keys) = data::read_provisioning_data(blobs)?;

    let addresses = engine.enumerate_clients()?;
    let Some(address) = find_capable_client(engine, &addresses, &ME_EPID_PROTOCOL_GUID)? else {
        info!("epid: no attestation application found");
        // Incompatible firmware: suppress retries on every future boot.
        flags.mark_done(EPID_PROVISIONED_FLAG);
        return Ok(Outcome::ApplicationNotFound);
    };
    info!("epid: found attestation application at {address:#04x}");

    engine.connect(address)?;
    let result = exchange(engine, &certificate, &keys, flags);
    if let Err(e) = engine.disconnect() {
        warn!("epid: disconnect failed - {e}");
    }
    result
}

/// The status/perform exchange against a connected attestation client.
fn exchange<L: TransportLocator>(
    engine: &mut BusEngine<L>,
    certificate: &EpidCertificate,
    keys: &GroupPublicKeys,
    flags: &mut ProvisionFlags<'_>,
) -> Result<Outcome> {
    engine.send_to_client(&EpidStatusRequest.encode())?;
    let mut raw = [0u8; EpidStatusResponse::SIZE];
    engine.await_response(&mut raw)?;
    let status = EpidStatusResponse::decode(&raw)?;
    info!(
        "epid: status {:#x} group id {:#x}",
        status.status, status.group_id
    );

    match status.status {
        EPID_STATUS_PROVISIONED => {
            flags.mark_done(EPID_PROVISIONED_FLAG);
            Ok(Outcome::Provisioned)
        }
        EPID_STATUS_CAN_PROVISION => perform(engine, certificate, keys, status.group_id, flags),
        other => {
            warn!("epid: unexpected status {other:#x}, leaving state untouched");
            Ok(Outcome::NotNeeded)
        }
    }
}

/// Install the certificate and the group key matching `group_id`.
fn perform<L: TransportLocator>(
    engine: &mut BusEngine<L>,
    certificate: &EpidCertificate,
    keys: &GroupPublicKeys,
    group_id: u32,
    flags: &mut ProvisionFlags<'_>,
) -> Result<Outcome> {
    let Some(public_key) = keys.find(group_id) else {
        warn!(
            "epid: no group public key for id {group_id:#x} among {} keys",
            keys.count()
        );
        return Err(Error::DeviceError);
    };

    let request = EpidPerformRequest {
        certificate: certificate.as_array(),
        public_key,
    }
    .encode();

    if let Err(e) = engine.send_to_client(&request) {
        warn!("epid: failed to send provisioning command - {e}");
        return Err(Error::DeviceError);
    }

    let mut raw = [0u8; EpidPerformResponse::SIZE];
    if let Err(e) = retry_on_timeout(PERFORM_ATTEMPTS, || engine.await_response(&mut raw)) {
        warn!("epid: provisioning response wait failed - {e}");
        return Err(Error::DeviceError);
    }

    let response = EpidPerformResponse::decode(&raw)?;
    info!(
        "epid: finished provisioning command with status {:#x}",
        response.status
    );

    match response.status {
        EPID_STATUS_PROVISIONED => {
            flags.mark_done(EPID_PROVISIONED_FLAG);
            Ok(Outcome::Provisioned)
        }
        EPID_STATUS_FAIL_PROVISION => {
            // Explicit permanent failure: terminal, never retried.
            flags.mark_done(EPID_PROVISIONED_FLAG);
            Err(Error::DeviceError)
        }
        _ => Err(Error::DeviceError),
    }
}

// ── Tests ────────────────────────────────────────────────────
