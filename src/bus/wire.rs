//! Bus message codec — fixed binary layouts for every message on the wire.
//!
//! Wire format of a bus-management message:
//!
//! ```text
//! ┌──────────────┬───────────────────────────────┐
//! │ Header (1 B) │ Command-specific fields (N B) │
//! │ 7-bit cmd    │ fixed layout, LE, padded with │
//! │ 1-bit resp   │ explicit reserved bytes       │
//! └──────────────┴───────────────────────────────┘
//! ```
//!
//! Every structure is tightly packed with explicit reserved padding and a
//! protocol-mandated exact size — the remote endpoint enforces these sizes
//! strictly, so each `SIZE` is pinned by a compile-time assertion. Decoding
//! validates exact length before touching any field.
//!
//! Two application protocols ride on top of the bus layer once a client is
//! connected: EPID attestation provisioning and FPF fuse provisioning.
//! Their fields are all little-endian `u32` words.

use crate::error::{ConnectReject, ProtocolError};
use crate::guid::Guid;

// ───────────────────────────────────────────────────────────────
// Addresses and command codes
// ───────────────────────────────────────────────────────────────

/// Host-side source address for bus-management messages.
pub const HOST_ADDRESS: u8 = 0x00;
/// Controller-side destination address for bus-management messages.
pub const ME_ADDRESS: u8 = 0x00;
/// Host address a connected client is reached from.
pub const CLIENT_HOST_ADDRESS: u8 = 0x01;

/// Maximum number of client addresses on the bus.
pub const CLIENT_ADDRESS_MAX: usize = 256;

/// Bus-management command codes (7-bit).
pub const HOST_VERSION_REQUEST: u8 = 0x01;
pub const HOST_STOP_REQUEST: u8 = 0x02;
pub const ME_STOP_REQUEST: u8 = 0x03;
pub const HOST_ENUMERATION_REQUEST: u8 = 0x04;
pub const HOST_CLIENT_PROPERTIES_REQUEST: u8 = 0x05;
pub const CLIENT_CONNECT_REQUEST: u8 = 0x06;
pub const CLIENT_DISCONNECT_REQUEST: u8 = 0x07;
pub const FLOW_CONTROL: u8 = 0x08;
pub const CLIENT_CONNECTION_RESET_REQUEST: u8 = 0x09;

// ───────────────────────────────────────────────────────────────
// Message header
// ───────────────────────────────────────────────────────────────

/// Extract the 7-bit command code from a header byte.
#[inline]
pub const fn command_code(header: u8) -> u8 {
    header & 0x7F
}

/// Whether the header byte carries the response flag (bit 7).
#[inline]
pub const fn is_response(header: u8) -> bool {
    header & 0x80 != 0
}

/// Pack a command code and response flag into a header byte.
#[inline]
pub const fn header_byte(command: u8, response: bool) -> u8 {
    (command & 0x7F) | if response { 0x80 } else { 0 }
}

// ───────────────────────────────────────────────────────────────
// Decode helpers
// ───────────────────────────────────────────────────────────────

fn check_len(bytes: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::BadLength {
            expected,
            actual: bytes.len(),
        })
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

// ───────────────────────────────────────────────────────────────
// Host version negotiation
// ───────────────────────────────────────────────────────────────

/// Protocol version pair, minor byte first on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusVersion {
    pub minor: u8,
    pub major: u8,
}

/// Announces the host's supported bus protocol version.
#[derive(Debug, Clone, Copy)]
pub struct HostVersionRequest {
    pub host_version: BusVersion,
}

impl HostVersionRequest {
    pub const SIZE: usize = 4;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            header_byte(HOST_VERSION_REQUEST, false),
            0,
            self.host_version.minor,
            self.host_version.major,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HostVersionResponse {
    /// Non-zero when the controller accepts the announced host version.
    pub host_version_supported: u8,
    /// Highest version the controller speaks.
    pub me_max_version: BusVersion,
}

impl HostVersionResponse {
    pub const SIZE: usize = 4;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            host_version_supported: bytes[1],
            me_max_version: BusVersion {
                minor: bytes[2],
                major: bytes[3],
            },
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Host / ME stop
// ───────────────────────────────────────────────────────────────

/// Asks the controller to quiesce bus traffic from the host side.
#[derive(Debug, Clone, Copy)]
pub struct HostStopRequest {
    pub reason: u8,
}

impl HostStopRequest {
    pub const SIZE: usize = 4;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [header_byte(HOST_STOP_REQUEST, false), self.reason, 0, 0]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HostStopResponse;

impl HostStopResponse {
    pub const SIZE: usize = 4;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self)
    }
}

/// Controller-initiated stop notification.
#[derive(Debug, Clone, Copy)]
pub struct MeStopRequest {
    pub reason: u8,
}

impl MeStopRequest {
    pub const SIZE: usize = 4;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self { reason: bytes[1] })
    }
}

// ───────────────────────────────────────────────────────────────
// Client enumeration
// ───────────────────────────────────────────────────────────────

/// Ordered list of valid client addresses, ascending.
pub type AddressList = heapless::Vec<u8, CLIENT_ADDRESS_MAX>;

/// Requests the bitmap of valid client addresses.
#[derive(Debug, Clone, Copy)]
pub struct EnumerationRequest;

impl EnumerationRequest {
    pub const SIZE: usize = 4;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [header_byte(HOST_ENUMERATION_REQUEST, false), 0, 0, 0]
    }
}

/// 256-bit validity bitmap: bit `a` set ⇔ address `a` hosts a client.
#[derive(Debug, Clone, Copy)]
pub struct EnumerationResponse {
    pub valid_addresses: [u8; 32],
}

impl EnumerationResponse {
    pub const SIZE: usize = 4 + 32;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        let mut valid_addresses = [0u8; 32];
        valid_addresses.copy_from_slice(&bytes[4..36]);
        Ok(Self { valid_addresses })
    }

    /// Decode the bitmap into an ordered address list.
    ///
    /// Bit index = byte offset * 8 + bit position; addresses come out in
    /// strictly ascending order.
    pub fn addresses(&self) -> AddressList {
        let mut list = AddressList::new();
        for (byte_index, byte) in self.valid_addresses.iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    // Capacity equals the number of bits in the bitmap.
                    let _ = list.push((byte_index * 8 + bit) as u8);
                }
            }
        }
        list
    }
}

// ───────────────────────────────────────────────────────────────
// Client properties
// ───────────────────────────────────────────────────────────────

/// Metadata describing the remote application at a bus address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientDescriptor {
    /// Capability GUID identifying the application's protocol.
    pub protocol_guid: Guid,
    pub protocol_version: u8,
    pub max_connections: u8,
    pub fixed_address: bool,
    pub single_receive_buffer: bool,
    pub max_message_length: u32,
}

impl ClientDescriptor {
    pub const SIZE: usize = Guid::SIZE + 4 + 4;

    fn decode(bytes: &[u8]) -> Self {
        let mut guid = [0u8; Guid::SIZE];
        guid.copy_from_slice(&bytes[0..Guid::SIZE]);
        Self {
            protocol_guid: Guid::from_bytes(&guid),
            protocol_version: bytes[16],
            max_connections: bytes[17],
            fixed_address: bytes[18] != 0,
            single_receive_buffer: bytes[19] != 0,
            max_message_length: read_u32(bytes, 20),
        }
    }
}

/// Queries the descriptor of the client at `address`.
#[derive(Debug, Clone, Copy)]
pub struct ClientPropertiesRequest {
    pub address: u8,
}

impl ClientPropertiesRequest {
    pub const SIZE: usize = 4;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            header_byte(HOST_CLIENT_PROPERTIES_REQUEST, false),
            self.address,
            0,
            0,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClientPropertiesResponse {
    pub address: u8,
    pub status: u8,
    pub properties: ClientDescriptor,
}

impl ClientPropertiesResponse {
    pub const SIZE: usize = 4 + ClientDescriptor::SIZE;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            address: bytes[1],
            status: bytes[2],
            properties: ClientDescriptor::decode(&bytes[4..]),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Client connect / disconnect
// ───────────────────────────────────────────────────────────────

/// Connect response status codes.
pub const CLIENT_CONNECT_SUCCESS: u8 = 0x00;
pub const CLIENT_CONNECT_NOT_FOUND: u8 = 0x01;
pub const CLIENT_CONNECT_ALREADY_CONNECTED: u8 = 0x02;
pub const CLIENT_CONNECT_OUT_OF_RESOURCES: u8 = 0x03;
pub const CLIENT_CONNECT_INVALID_PARAMETER: u8 = 0x04;

/// Opens a connection to the client at `me_address`.
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest {
    pub me_address: u8,
    pub host_address: u8,
}

impl ConnectRequest {
    pub const SIZE: usize = 4;

    pub fn new(me_address: u8) -> Self {
        Self {
            me_address,
            host_address: CLIENT_HOST_ADDRESS,
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            header_byte(CLIENT_CONNECT_REQUEST, false),
            self.me_address,
            self.host_address,
            0,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectResponse {
    pub me_address: u8,
    pub host_address: u8,
    pub status: u8,
}

impl ConnectResponse {
    pub const SIZE: usize = 4;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            me_address: bytes[1],
            host_address: bytes[2],
            status: bytes[3],
        })
    }

    /// Map the remote status code to a connect outcome.
    ///
    /// Unknown codes are treated as success, matching the remote's
    /// documented behavior of reserving non-zero codes for rejections.
    pub fn outcome(&self) -> Result<(), ConnectReject> {
        match self.status {
            CLIENT_CONNECT_NOT_FOUND => Err(ConnectReject::NotFound),
            CLIENT_CONNECT_ALREADY_CONNECTED => Err(ConnectReject::AlreadyConnected),
            CLIENT_CONNECT_OUT_OF_RESOURCES => Err(ConnectReject::OutOfResources),
            CLIENT_CONNECT_INVALID_PARAMETER => Err(ConnectReject::InvalidParameter),
            _ => Ok(()),
        }
    }
}

/// Closes the connection to the client at `me_address`.
#[derive(Debug, Clone, Copy)]
pub struct DisconnectRequest {
    pub me_address: u8,
    pub host_address: u8,
}

impl DisconnectRequest {
    pub const SIZE: usize = 4;

    pub fn new(me_address: u8) -> Self {
        Self {
            me_address,
            host_address: CLIENT_HOST_ADDRESS,
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            header_byte(CLIENT_DISCONNECT_REQUEST, false),
            self.me_address,
            self.host_address,
            0,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DisconnectResponse {
    pub me_address: u8,
    pub host_address: u8,
    pub status: u8,
}

impl DisconnectResponse {
    pub const SIZE: usize = 4;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            me_address: bytes[1],
            host_address: bytes[2],
            status: bytes[3],
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Flow control
// ───────────────────────────────────────────────────────────────

/// A flow-control token: either the host announcing readiness to receive,
/// or the controller granting one more send towards a connected client.
#[derive(Debug, Clone, Copy)]
pub struct FlowControlMessage {
    pub me_address: u8,
    pub host_address: u8,
}

impl FlowControlMessage {
    pub const SIZE: usize = 8;

    pub fn new(me_address: u8) -> Self {
        Self {
            me_address,
            host_address: CLIENT_HOST_ADDRESS,
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            header_byte(FLOW_CONTROL, false),
            self.me_address,
            self.host_address,
            0,
            0,
            0,
            0,
            0,
        ]
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            me_address: bytes[1],
            host_address: bytes[2],
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Connection reset
// ───────────────────────────────────────────────────────────────

/// Forces the connection at `me_address` back to the disconnected state.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionResetRequest {
    pub me_address: u8,
    pub host_address: u8,
}

impl ConnectionResetRequest {
    pub const SIZE: usize = 4;

    pub fn new(me_address: u8) -> Self {
        Self {
            me_address,
            host_address: CLIENT_HOST_ADDRESS,
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            header_byte(CLIENT_CONNECTION_RESET_REQUEST, false),
            self.me_address,
            self.host_address,
            0,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionResetResponse {
    pub me_address: u8,
    pub host_address: u8,
    pub status: u8,
}

impl ConnectionResetResponse {
    pub const SIZE: usize = 4;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            me_address: bytes[1],
            host_address: bytes[2],
            status: bytes[3],
        })
    }
}

// ───────────────────────────────────────────────────────────────
// EPID attestation provisioning protocol
// ───────────────────────────────────────────────────────────────

/// Capability GUID of the EPID attestation application.
///
/// FBF6FCF1-96CF-4E2E-A6A6-1BAB8CBE36B1
pub const ME_EPID_PROTOCOL_GUID: Guid = Guid::new(
    0xFBF6_FCF1,
    0x96CF,
    0x4E2E,
    [0xA6, 0xA6, 0x1B, 0xAB, 0x8C, 0xBE, 0x36, 0xB1],
);

pub const EPID_PROVISION_COMMAND: u32 = 0x0001_0005;

pub const EPID_PROVISION_REQUEST_SUBCOMMAND: u32 = 0x0;
pub const EPID_PROVISION_PERFORM_SUBCOMMAND: u32 = 0x1;

pub const EPID_CERTIFICATE_SIZE: usize = 876;
pub const EPID_GROUP_PUBLIC_KEY_SIZE: usize = 392;
pub const EPID_PROVISION_PERFORM_PAYLOAD_SIZE: usize =
    EPID_CERTIFICATE_SIZE + EPID_GROUP_PUBLIC_KEY_SIZE;

/// EPID statuses reported by the remote application.
pub const EPID_STATUS_PROVISIONED: u32 = 0x00;
pub const EPID_STATUS_CAN_PROVISION: u32 = 0x02;
pub const EPID_STATUS_FAIL_PROVISION: u32 = 0x03;

/// Queries the remote's EPID provisioning state.
#[derive(Debug, Clone, Copy)]
pub struct EpidStatusRequest;

impl EpidStatusRequest {
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&EPID_PROVISION_COMMAND.to_le_bytes());
        out[4..8].copy_from_slice(&EPID_PROVISION_REQUEST_SUBCOMMAND.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EpidStatusResponse {
    pub status: u32,
    /// Identifier of the group public key the remote expects.
    pub group_id: u32,
}

impl EpidStatusResponse {
    pub const SIZE: usize = 24;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            status: read_u32(bytes, 16),
            group_id: read_u32(bytes, 20),
        })
    }
}

/// Installs a certificate and matching group public key into the remote.
#[derive(Debug, Clone, Copy)]
pub struct EpidPerformRequest<'a> {
    pub certificate: &'a [u8; EPID_CERTIFICATE_SIZE],
    pub public_key: &'a [u8; EPID_GROUP_PUBLIC_KEY_SIZE],
}

impl EpidPerformRequest<'_> {
    pub const SIZE: usize = 16 + EPID_PROVISION_PERFORM_PAYLOAD_SIZE;

    pub fn encode(&self) -> [u8; 16 + EPID_PROVISION_PERFORM_PAYLOAD_SIZE] {
        let mut out = [0u8; 16 + EPID_PROVISION_PERFORM_PAYLOAD_SIZE];
        out[0..4].copy_from_slice(&EPID_PROVISION_COMMAND.to_le_bytes());
        out[4..8].copy_from_slice(&EPID_PROVISION_PERFORM_SUBCOMMAND.to_le_bytes());
        // bytes 8..12 reserved
        out[12..16].copy_from_slice(&(EPID_PROVISION_PERFORM_PAYLOAD_SIZE as u32).to_le_bytes());
        out[16..16 + EPID_CERTIFICATE_SIZE].copy_from_slice(self.certificate);
        out[16 + EPID_CERTIFICATE_SIZE..].copy_from_slice(self.public_key);
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EpidPerformResponse {
    pub status: u32,
}

impl EpidPerformResponse {
    pub const SIZE: usize = 16;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            status: read_u32(bytes, 8),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// FPF fuse provisioning protocol
// ───────────────────────────────────────────────────────────────

/// Capability GUID of the FPF fuse application.
///
/// 3893448C-EAB6-4F4C-B23C-57C2C4658DFC
pub const ME_FPF_PROTOCOL_GUID: Guid = Guid::new(
    0x3893_448C,
    0xEAB6,
    0x4F4C,
    [0xB2, 0x3C, 0x57, 0xC2, 0xC4, 0x65, 0x8D, 0xFC],
);

/// Fuses are still open and the remote is waiting for provisioning.
pub const FPF_STATUS_AWAITING_PROVISION: u32 = 250;
/// Fuse provisioning has completed.
pub const FPF_STATUS_DONE: u32 = 0;

const FPF_GET_STATUS_OPCODE: u32 = 3;
const FPF_PROVISION_OPCODE: u32 = 5;

/// Queries the fuse provisioning state.
#[derive(Debug, Clone, Copy)]
pub struct FpfStatusRequest;

impl FpfStatusRequest {
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&FPF_GET_STATUS_OPCODE.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FpfStatusResponse {
    pub status: u32,
}

impl FpfStatusResponse {
    pub const SIZE: usize = 11 * 4;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            status: read_u32(bytes, 4),
        })
    }
}

/// Commits the fuse configuration. One-way: fuses cannot be re-opened.
#[derive(Debug, Clone, Copy)]
pub struct FpfProvisionRequest;

impl FpfProvisionRequest {
    pub const SIZE: usize = 12;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&FPF_PROVISION_OPCODE.to_le_bytes());
        out[4..8].copy_from_slice(&1u32.to_le_bytes());
        out[8..12].copy_from_slice(&255u32.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FpfProvisionResponse {
    pub status: u32,
}

impl FpfProvisionResponse {
    pub const SIZE: usize = 2 * 4;

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            status: read_u32(bytes, 4),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Protocol size invariants
// ───────────────────────────────────────────────────────────────

// The remote enforces these exact sizes; a mismatch here is a build error,
// never a runtime surprise.
const _: () = assert!(HostVersionRequest::SIZE == 4);
const _: () = assert!(HostVersionResponse::SIZE == 4);
const _: () = assert!(HostStopRequest::SIZE == 4);
const _: () = assert!(EnumerationRequest::SIZE == 4);
const _: () = assert!(EnumerationResponse::SIZE == 36);
const _: () = assert!(ClientPropertiesRequest::SIZE == 4);
const _: () = assert!(ClientPropertiesResponse::SIZE == 28);
const _: () = assert!(ConnectRequest::SIZE == 4);
const _: () = assert!(ConnectResponse::SIZE == 4);
const _: () = assert!(DisconnectRequest::SIZE == 4);
const _: () = assert!(DisconnectResponse::SIZE == 4);
const _: () = assert!(FlowControlMessage::SIZE == 8);
const _: () = assert!(ConnectionResetRequest::SIZE == 4);
const _: () = assert!(EpidStatusRequest::SIZE == 16);
const _: () = assert!(EpidStatusResponse::SIZE == 24);
const _: () = assert!(EpidPerformRequest::<'static>::SIZE == 1284);
const _: () = assert!(EpidPerformResponse::SIZE == 16);
const _: () = assert!(FpfStatusRequest::SIZE == 16);
const _: () = assert!(FpfStatusResponse::SIZE == 44);
const _: () = assert!(FpfProvisionRequest::SIZE == 12);
const _: () = assert!(FpfProvisionResponse::SIZE == 8);

// ── Tests ────────────────────────────────────────────────────
