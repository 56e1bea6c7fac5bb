//! End-to-end FPF provisioning flow against the fake controller.

use meprov::Error;
use meprov::adapters::mem::{MemBlobStore, MemFlagStore};
use meprov::adapters::probe::StaticProbe;
use meprov::bus::engine::BusEngine;
use meprov::bus::wire::{
    FPF_STATUS_AWAITING_PROVISION, FPF_STATUS_DONE, ME_EPID_PROTOCOL_GUID, ME_FPF_PROTOCOL_GUID,
};
use meprov::config::ProvisionConfig;
use meprov::provision::Outcome;
use meprov::provision::flags::{FPF_PROVISIONED_FLAG, ProvisionFlags};
use meprov::provision::fpf::{FpfHint, provision_fpf};
use meprov::provision::ports::FlagStore;
use meprov::provision::run_provisioning;

use crate::fake_me::FakeMe;

const FPF_ADDRESS: u8 = 0x0B;

fn setup() -> (FakeMe, BusEngine<FakeMe>, MemFlagStore) {
    let fake = FakeMe::new();
    fake.add_client(0x07, ME_EPID_PROTOCOL_GUID);
    fake.add_client(FPF_ADDRESS, ME_FPF_PROTOCOL_GUID);
    fake.set_fpf(FPF_STATUS_AWAITING_PROVISION, FPF_STATUS_DONE);

    let engine = BusEngine::new(fake.clone());
    (fake, engine, MemFlagStore::new())
}

#[test]
fn provisions_fuses_end_to_end() {
    let (fake, mut engine, mut store) = setup();

    let outcome = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_fpf(&mut engine, &mut flags, None).unwrap()
    };

    assert_eq!(outcome, Outcome::Provisioned);
    assert_eq!(store.get(FPF_PROVISIONED_FLAG).unwrap(), 1);
    assert!(fake.was_connected());
    assert_eq!(fake.connected(), None, "workflow must disconnect");

    // Status query then the commit command.
    let app = fake.app_messages();
    assert_eq!(app.len(), 2);
    assert_eq!(&app[0][0..4], &3u32.to_le_bytes());
    assert_eq!(&app[1][0..4], &5u32.to_le_bytes());
}

#[test]
fn fuses_not_awaiting_is_device_error() {
    let (fake, mut engine, mut store) = setup();
    fake.set_fpf(FPF_STATUS_DONE, FPF_STATUS_DONE);

    let err = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_fpf(&mut engine, &mut flags, None).unwrap_err()
    };

    assert_eq!(err, Error::DeviceError);
    assert!(store.get(FPF_PROVISIONED_FLAG).is_err(), "no flag on error");
    assert_eq!(fake.connected(), None);
    assert_eq!(fake.app_messages().len(), 1, "commit never sent");
}

#[test]
fn commit_rejection_is_device_error() {
    let (fake, mut engine, mut store) = setup();
    fake.set_fpf(FPF_STATUS_AWAITING_PROVISION, 7);

    let err = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_fpf(&mut engine, &mut flags, None).unwrap_err()
    };

    assert_eq!(err, Error::DeviceError);
    assert!(store.get(FPF_PROVISIONED_FLAG).is_err());
    assert_eq!(fake.connected(), None);
}

#[test]
fn no_fuse_client_sets_flag_and_reports_not_found() {
    let fake = FakeMe::new();
    fake.add_client(0x07, ME_EPID_PROTOCOL_GUID);
    let mut engine = BusEngine::new(fake.clone());
    let mut store = MemFlagStore::new();

    let outcome = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        provision_fpf(&mut engine, &mut flags, None).unwrap()
    };

    assert_eq!(outcome, Outcome::ApplicationNotFound);
    assert_eq!(store.get(FPF_PROVISIONED_FLAG).unwrap(), 1);
    assert!(!fake.was_connected());
}

#[test]
fn hint_disables_provisioning_without_traffic() {
    let (fake, mut engine, mut store) = setup();

    let outcome = {
        let mut flags = ProvisionFlags::new(&mut store, false);
        let hint = FpfHint {
            should_provision: false,
        };
        provision_fpf(&mut engine, &mut flags, Some(&hint)).unwrap()
    };

    assert_eq!(outcome, Outcome::NotNeeded);
    assert!(fake.sent().is_empty());
}

#[test]
fn run_provisioning_swallows_failures() {
    // EPID skipped (board without integrated GPU), FPF enabled against
    // fuses that reject the commit: the workflow fails with a device
    // error and the runner must swallow it, not escalate.
    let fake = FakeMe::new();
    fake.add_client(FPF_ADDRESS, ME_FPF_PROTOCOL_GUID);
    fake.set_fpf(FPF_STATUS_AWAITING_PROVISION, 9);
    let mut engine = BusEngine::new(fake.clone());

    let blobs = MemBlobStore::new();
    let mut store = MemFlagStore::new();
    let mut probe = StaticProbe::new();
    let config = ProvisionConfig {
        force_provisioning: false,
        provision_epid: true,
        provision_fpf: true,
    };

    run_provisioning(&mut engine, &blobs, &mut store, &mut probe, None, &config);

    // The failed commit left no flag behind, and cleanup disconnected.
    assert!(store.get(FPF_PROVISIONED_FLAG).is_err());
    assert!(fake.was_connected());
    assert_eq!(fake.connected(), None);
}
