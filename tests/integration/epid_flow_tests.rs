//! End-to-end EPID provisioning flow against the fake controller.
//!
//! Exercises the full stack — workflow → engine → codec → transport —
//! with the remote side scripted by [`crate::fake_me::FakeMe`].

use meprov::adapters::mem::{MemBlobStore, MemFlagStore};
use meprov::adapters::probe::StaticProbe;
use meprov::bus::engine::BusEngine;
use meprov::bus::wire::{
    EPID_CERTIFICATE_SIZE, EPID_STATUS_CAN_PROVISION, EPID_STATUS_FAIL_PROVISION,
    EPID_STATUS_PROVISIONED, ME_EPID_PROTOCOL_GUID, ME_FPF_PROTOCOL_GUID,
};
use meprov::guid::Guid;
use meprov::provision::Outcome;
use meprov::provision::data::{EPID_CERTIFICATE_FILE_GUID, EPID_GROUP_PUBLIC_KEYS_FILE_GUID};
use meprov::provision::epid::{IGPU_CONFIG_ADDRESS, provision_epid};
use meprov::provision::flags::{EPID_PROVISIONED_FLAG, ProvisionFlags};
use meprov::provision::ports::FlagStore;
use meprov::Error;

use crate::fake_me::FakeMe;

const EPID_ADDRESS: u8 = 0x07;
const GROUP_ID: u32 = 0x0000_4A21;

fn group_key_record(group_id: u32, fill: u8) -> Vec<u8> {
    let mut record = vec![fill; 392];
    record[0..4].copy_from_slice(&group_id.to_be_bytes());
    record
}

/// Fake controller with an attestation client plus an unrelated neighbor,
/// blob store seeded with matching material, board with integrated GPU.
fn setup() -> (FakeMe, BusEngine<FakeMe>, MemBlobStore, MemFlagStore, StaticProbe) {
    let fake = FakeMe::new();
    fake.add_client(0x03, ME_FPF_PROTOCOL_GUID);
    fake.add_client(EPID_ADDRESS, ME_EPID_PROTOCOL_GUID);
    fake.set_epid(EPID_STATUS_CAN_PROVISION, GROUP_ID, EPID_STATUS_PROVISIONED);

    let engine = BusEngine::new(fake.clone());

    let mut blobs = MemBlobStore::new();
    blobs.insert(EPID_CERTIFICATE_FILE_GUID, vec![0x5A; EPID_CERTIFICATE_SIZE]);
    blobs.insert(
        EPID_GROUP_PUBLIC_KEYS_FILE_GUID,
        [group_key_record(0x1111, 0xCC), group_key_record(GROUP_ID, 0xDD)].concat(),
    );

    let mut probe = StaticProbe::new();
    probe.set(IGPU_CONFIG_ADDRESS, 0x0406_8086);

    (fake, engine, blobs, MemFlagStore::new(), probe)
}

#[test]
fn provisions_end_to_end() {
    let (fake, mut engine, blobs, mut store, mut probe) = setup();

    let outcome = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap()
    };

    assert_eq!(outcome, Outcome::Provisioned);
    assert_eq!(store.get(EPID_PROVISIONED_FLAG).unwrap(), 1);
    assert!(fake.was_connected());
    assert_eq!(fake.connected(), None, "workflow must disconnect");

    // The perform request carries the certificate and the key matching
    // the remote's group id, at their fixed offsets.
    let perform = fake
        .app_messages()
        .into_iter()
        .find(|m| m.len() == 1284)
        .expect("perform request sent");
    assert_eq!(&perform[16..16 + EPID_CERTIFICATE_SIZE], &[0x5A; 876][..]);
    assert_eq!(&perform[892..896], &GROUP_ID.to_be_bytes());
    assert_eq!(perform[896], 0xDD, "wrong key record chosen");
}

#[test]
fn remote_already_provisioned_skips_perform() {
    let (fake, mut engine, blobs, mut store, mut probe) = setup();
    fake.set_epid(EPID_STATUS_PROVISIONED, 0, 0);

    let outcome = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap()
    };

    assert_eq!(outcome, Outcome::Provisioned);
    assert_eq!(store.get(EPID_PROVISIONED_FLAG).unwrap(), 1);
    assert_eq!(fake.app_messages().len(), 1, "only the status query");
    assert_eq!(fake.connected(), None);
}

#[test]
fn no_attestation_client_sets_flag_and_reports_not_found() {
    let (_, _, blobs, mut store, mut probe) = setup();

    // A bus where nothing speaks the attestation protocol.
    let fake = {
        let f = FakeMe::new();
        f.add_client(0x03, ME_FPF_PROTOCOL_GUID);
        f.add_client(0x09, Guid::new(0x1234_5678, 0, 0, [0; 8]));
        f
    };
    let mut engine = BusEngine::new(fake.clone());

    let outcome = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap()
    };

    assert_eq!(outcome, Outcome::ApplicationNotFound);
    // Incompatible firmware is never retried.
    assert_eq!(store.get(EPID_PROVISIONED_FLAG).unwrap(), 1);
    assert!(!fake.was_connected());
}

#[test]
fn perform_timeout_twice_then_succeeds() {
    let (fake, mut engine, blobs, mut store, mut probe) = setup();
    fake.set_perform_timeouts(2);

    let outcome = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap()
    };

    assert_eq!(outcome, Outcome::Provisioned);
    assert_eq!(store.get(EPID_PROVISIONED_FLAG).unwrap(), 1);
}

#[test]
fn perform_timeout_exhausts_retries() {
    let (fake, mut engine, blobs, mut store, mut probe) = setup();
    fake.set_perform_timeouts(3);

    let err = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap_err()
    };

    assert_eq!(err, Error::DeviceError);
    assert!(store.get(EPID_PROVISIONED_FLAG).is_err(), "no flag on abort");
    assert_eq!(fake.connected(), None, "cleanup still disconnects");
}

#[test]
fn corrupt_certificate_aborts_before_any_bus_traffic() {
    let (fake, mut engine, _, mut store, mut probe) = setup();

    let mut blobs = MemBlobStore::new();
    blobs.insert(EPID_CERTIFICATE_FILE_GUID, vec![0x5A; 100]);
    blobs.insert(EPID_GROUP_PUBLIC_KEYS_FILE_GUID, group_key_record(GROUP_ID, 0));

    let err = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap_err()
    };

    assert_eq!(err, Error::DataCorrupted);
    assert!(store.get(EPID_PROVISIONED_FLAG).is_err());
    assert!(fake.sent().is_empty(), "input data is read before the bus is touched");
}

#[test]
fn explicit_fail_provision_is_terminal() {
    let (fake, mut engine, blobs, mut store, mut probe) = setup();
    fake.set_epid(EPID_STATUS_CAN_PROVISION, GROUP_ID, EPID_STATUS_FAIL_PROVISION);

    let err = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap_err()
    };

    assert_eq!(err, Error::DeviceError);
    // A definitive remote failure still suppresses future attempts.
    assert_eq!(store.get(EPID_PROVISIONED_FLAG).unwrap(), 1);
    assert_eq!(fake.connected(), None);
}

#[test]
fn missing_group_key_is_device_error() {
    let (fake, mut engine, _, mut store, mut probe) = setup();

    let mut blobs = MemBlobStore::new();
    blobs.insert(EPID_CERTIFICATE_FILE_GUID, vec![0x5A; EPID_CERTIFICATE_SIZE]);
    blobs.insert(EPID_GROUP_PUBLIC_KEYS_FILE_GUID, group_key_record(0x9999, 0));

    let err = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap_err()
    };

    assert_eq!(err, Error::DeviceError);
    assert!(store.get(EPID_PROVISIONED_FLAG).is_err());
    assert_eq!(fake.connected(), None);
    assert_eq!(fake.app_messages().len(), 1, "perform never sent");
}

#[test]
fn second_run_short_circuits_on_flag() {
    let (fake, mut engine, blobs, mut store, mut probe) = setup();

    {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap();
    }
    let traffic_after_first = fake.sent().len();

    let outcome = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_epid(&mut engine, &blobs, &mut flags, &mut probe).unwrap()
    };

    assert_eq!(outcome, Outcome::NotNeeded);
    assert_eq!(fake.sent().len(), traffic_after_first, "no new bus traffic");
}
