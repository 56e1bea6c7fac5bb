//! Transport abstraction — the byte channel to the embedded controller.
//!
//! Concrete implementations wrap whatever the platform exposes: a
//! memory-mapped HECI device, a kernel character device, or a scripted
//! endpoint in tests. The engine is generic over [`TransportLocator`], so
//! swapping transports requires zero changes to the protocol logic.

use log::warn;

use crate::error::{Error, Result, TransportError};

/// Message-oriented bus transport.
///
/// `send` transfers one complete message tagged with source and destination
/// addresses; `receive` fills `buf` with exactly one message of
/// `buf.len()` bytes. Both block from the caller's point of view — any
/// interrupt or polling machinery below is opaque to this layer.
pub trait BusTransport {
    /// Send one message from `src` to `dst`.
    fn send(&mut self, msg: &[u8], src: u8, dst: u8) -> core::result::Result<(), TransportError>;

    /// Receive one message of exactly `buf.len()` bytes.
    ///
    /// With `blocking = false` the call returns [`TransportError::Timeout`]
    /// immediately when no message is pending.
    fn receive(
        &mut self,
        blocking: bool,
        buf: &mut [u8],
    ) -> core::result::Result<(), TransportError>;
}

/// Discovers the platform's bus transport endpoint.
pub trait TransportLocator {
    type Transport: BusTransport;

    /// Perform one discovery attempt. Called at most once per binding;
    /// the result is cached by [`TransportBinding`].
    fn locate(&mut self) -> core::result::Result<Self::Transport, TransportError>;
}

/// Caches the located transport handle.
///
/// Lookups are idempotent: the first successful [`acquire`](Self::acquire)
/// resolves the handle, every later call returns the cached one. Safe to
/// call before every operation that needs the transport.
pub struct TransportBinding<L: TransportLocator> {
    locator: L,
    handle: Option<L::Transport>,
}

impl<L: TransportLocator> TransportBinding<L> {
    pub fn new(locator: L) -> Self {
        Self {
            locator,
            handle: None,
        }
    }

    /// Resolve the transport, locating it on first use.
    pub fn acquire(&mut self) -> Result<&mut L::Transport> {
        if self.handle.is_none() {
            match self.locator.locate() {
                Ok(t) => self.handle = Some(t),
                Err(e) => {
                    warn!("heci: failed to find bus transport - {e}");
                    return Err(Error::TransportUnavailable);
                }
            }
        }
        // Just populated above on the success path.
        self.handle.as_mut().ok_or(Error::TransportUnavailable)
    }

    /// Whether discovery has already succeeded.
    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }
}

/// A null transport that accepts all sends and never delivers a message.
/// Useful as a default when no controller is present.
#[derive(Debug)]
pub struct NullTransport;

impl BusTransport for NullTransport {
    fn send(&mut self, _msg: &[u8], _src: u8, _dst: u8) -> core::result::Result<(), TransportError> {
        Ok(())
    }

    fn receive(
        &mut self,
        _blocking: bool,
        _buf: &mut [u8],
    ) -> core::result::Result<(), TransportError> {
        Err(TransportError::Timeout)
    }
}

// ── Tests ────────────────────────────────────────────────────
