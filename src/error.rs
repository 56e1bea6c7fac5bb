//! Unified error types for the provisioning driver.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! provisioning workflows' error handling uniform. All variants are `Copy`
//! so they can be cheaply passed across the engine and workflow layers
//! without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level driver error
// ---------------------------------------------------------------------------

/// Every fallible operation in the driver funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Transport discovery failed. Fatal for the current attempt.
    TransportUnavailable,
    /// The transport accepted the operation but reported an I/O failure.
    Transport(TransportError),
    /// The transport call succeeded but the protocol contract was violated.
    Protocol(ProtocolError),
    /// The remote rejected a connection request.
    ConnectRejected(ConnectReject),
    /// A per-client operation was attempted without a connected session.
    NotConnected,
    /// A blocking receive timed out. Retryable only for the EPID perform
    /// response wait; fatal everywhere else.
    Timeout,
    /// Provisioning blob size invariants were violated.
    DataCorrupted,
    /// The remote reported an unexpected status.
    DeviceError,
    /// The blob or flag backend failed.
    Store(StoreError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportUnavailable => write!(f, "transport unavailable"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::ConnectRejected(r) => write!(f, "connect rejected: {r}"),
            Self::NotConnected => write!(f, "no client connected"),
            Self::Timeout => write!(f, "timed out"),
            Self::DataCorrupted => write!(f, "provisioning data corrupted"),
            Self::DeviceError => write!(f, "device error"),
            Self::Store(e) => write!(f, "store: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures reported by the underlying bus transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No transport endpoint could be located.
    NotFound,
    /// A blocking receive expired before a message arrived.
    Timeout,
    /// The transport rejected the operation in its current state.
    NotReady,
    /// The controller aborted the transfer.
    Aborted,
    /// Unrecoverable hardware-level failure.
    DeviceError,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "endpoint not found"),
            Self::Timeout => write!(f, "receive timed out"),
            Self::NotReady => write!(f, "transport not ready"),
            Self::Aborted => write!(f, "transfer aborted"),
            Self::DeviceError => write!(f, "hardware failure"),
        }
    }
}

impl From<TransportError> for Error {
    /// Timeouts keep their own top-level identity so the retry policy can
    /// classify them; everything else stays a transport failure.
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => Self::Timeout,
            other => Self::Transport(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// Violations of the bus message contract. The transport itself succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The response's command code did not echo the request's.
    CommandMismatch { sent: u8, received: u8 },
    /// A message buffer had the wrong length for its kind.
    BadLength { expected: usize, actual: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandMismatch { sent, received } => {
                write!(
                    f,
                    "command echo mismatch: sent {sent:#04x}, got {received:#04x}"
                )
            }
            Self::BadLength { expected, actual } => {
                write!(f, "bad message length: expected {expected}, got {actual}")
            }
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Connect rejection reasons
// ---------------------------------------------------------------------------

/// Remote status codes from a connect response, minus success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReject {
    /// No client listens at the requested address.
    NotFound,
    /// A connection to that client already exists.
    AlreadyConnected,
    /// The controller is out of connection resources.
    OutOfResources,
    /// The request itself was malformed.
    InvalidParameter,
}

impl fmt::Display for ConnectReject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "client not found"),
            Self::AlreadyConnected => write!(f, "already connected"),
            Self::OutOfResources => write!(f, "out of resources"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
        }
    }
}

impl From<ConnectReject> for Error {
    fn from(e: ConnectReject) -> Self {
        Self::ConnectRejected(e)
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Failures from the blob store and the persistent flag store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Requested identifier does not exist.
    NotFound,
    /// Generic I/O error from the backing store.
    IoError,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Driver-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
