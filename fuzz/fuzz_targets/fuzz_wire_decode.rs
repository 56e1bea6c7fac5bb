//! Fuzz target: bus message decoders
//!
//! Drives arbitrary byte sequences through every wire decoder and asserts
//! that they never panic and never accept a wrongly-sized buffer.
//!
//! cargo fuzz run fuzz_wire_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use meprov::bus::wire::{
    ClientPropertiesResponse, ConnectResponse, ConnectionResetResponse, DisconnectResponse,
    EnumerationResponse, EpidPerformResponse, EpidStatusResponse, FlowControlMessage,
    FpfProvisionResponse, FpfStatusResponse, HostVersionResponse, MeStopRequest,
};

fuzz_target!(|data: &[u8]| {
    let _ = HostVersionResponse::decode(data);
    let _ = MeStopRequest::decode(data);
    let _ = ConnectResponse::decode(data);
    let _ = DisconnectResponse::decode(data);
    let _ = ConnectionResetResponse::decode(data);
    let _ = FlowControlMessage::decode(data);
    let _ = EpidStatusResponse::decode(data);
    let _ = EpidPerformResponse::decode(data);
    let _ = FpfStatusResponse::decode(data);
    let _ = FpfProvisionResponse::decode(data);

    // Decoders accept exactly their protocol size, nothing else.
    if let Ok(resp) = EnumerationResponse::decode(data) {
        assert_eq!(data.len(), EnumerationResponse::SIZE);
        // Every decoded address must map back to a set bit.
        for a in resp.addresses() {
            assert!(resp.valid_addresses[usize::from(a / 8)] & (1 << (a % 8)) != 0);
        }
    }
    if ClientPropertiesResponse::decode(data).is_ok() {
        assert_eq!(data.len(), ClientPropertiesResponse::SIZE);
    }
});
