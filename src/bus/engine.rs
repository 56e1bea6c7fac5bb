//! Request/response engine — the protocol's synchronization core.
//!
//! Implements send-then-wait-for-matching-response semantics for
//! bus-management exchanges, per-client sends gated by flow-control
//! credit, and the bounded retry policy for provisioning commands.
//!
//! Bus-management messages travel between the fixed addresses 0 → 0 and
//! bypass per-client credit entirely; application messages go from host
//! address 1 to the connected client's address and spend one credit unit
//! per send.

use log::{debug, info, warn};

use crate::error::{Error, ProtocolError, Result};

use super::session::Session;
use super::transport::{BusTransport, TransportBinding, TransportLocator};
use super::wire::{
    self, AddressList, ClientDescriptor, ClientPropertiesRequest, ClientPropertiesResponse,
    ConnectRequest, ConnectResponse, DisconnectRequest, DisconnectResponse, EnumerationRequest,
    EnumerationResponse, FlowControlMessage, HOST_ADDRESS, ME_ADDRESS,
};

/// Protocol engine bound to one transport, with one client session.
pub struct BusEngine<L: TransportLocator> {
    binding: TransportBinding<L>,
    session: Session,
}

impl<L: TransportLocator> BusEngine<L> {
    pub fn new(locator: L) -> Self {
        Self {
            binding: TransportBinding::new(locator),
            session: Session::new(),
        }
    }

    /// Resolve the transport eagerly, failing fast when the platform has
    /// none. Every other operation also acquires on demand.
    pub fn bind(&mut self) -> Result<()> {
        self.binding.acquire().map(|_| ())
    }

    /// Read-only view of the session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    // ───────────────────────────────────────────────────────────
    // Bus-management exchanges
    // ───────────────────────────────────────────────────────────

    /// Send a bus-management request and block for its response.
    ///
    /// The response must echo the request's command code; a mismatch is a
    /// protocol violation, not an I/O error — the transport call itself
    /// succeeded but the remote broke the contract.
    pub fn send_with_response(&mut self, request: &[u8], response: &mut [u8]) -> Result<()> {
        debug_assert!(!request.is_empty() && !response.is_empty());
        let sent = wire::command_code(request[0]);

        self.binding
            .acquire()?
            .send(request, HOST_ADDRESS, ME_ADDRESS)?;
        self.receive_response(response)?;

        let received = wire::command_code(response[0]);
        if received != sent {
            return Err(ProtocolError::CommandMismatch { sent, received }.into());
        }
        Ok(())
    }

    /// Enumerate the bus: decode the 256-bit validity bitmap into an
    /// ordered address list. Rebuilt fresh per provisioning attempt.
    pub fn enumerate_clients(&mut self) -> Result<AddressList> {
        let request = EnumerationRequest.encode();
        let mut raw = [0u8; EnumerationResponse::SIZE];
        self.send_with_response(&request, &mut raw)?;

        let list = EnumerationResponse::decode(&raw)?.addresses();
        info!("heci: enumerated {} clients", list.len());
        Ok(list)
    }

    /// Query the descriptor of the client at `address`.
    pub fn query_client_properties(&mut self, address: u8) -> Result<ClientDescriptor> {
        let request = ClientPropertiesRequest { address }.encode();
        let mut raw = [0u8; ClientPropertiesResponse::SIZE];
        self.send_with_response(&request, &mut raw)?;

        let response = ClientPropertiesResponse::decode(&raw)?;
        Ok(response.properties)
    }

    /// Connect to the client at `address`.
    ///
    /// A remote rejection maps to [`Error::ConnectRejected`] and leaves any
    /// existing session untouched. On success the session counters start
    /// from zero; the caller must eventually [`disconnect`](Self::disconnect).
    pub fn connect(&mut self, address: u8) -> Result<()> {
        let request = ConnectRequest::new(address).encode();
        let mut raw = [0u8; ConnectResponse::SIZE];
        self.send_with_response(&request, &mut raw)?;

        let response = ConnectResponse::decode(&raw)?;
        info!(
            "heci: connect to client {address:#04x} code {}",
            response.status
        );
        response.outcome()?;

        self.session.on_connect(address);
        Ok(())
    }

    /// Disconnect from the connected client.
    ///
    /// A no-op success when nothing is connected — no transport I/O.
    /// On failure the session stays connected so the caller may retry.
    pub fn disconnect(&mut self) -> Result<()> {
        let Some(address) = self.session.connected_address() else {
            return Ok(());
        };

        // The disconnect response satisfies the receive this exchange is
        // about to perform; account for it up front so no extra ready
        // token goes out.
        self.session.receive_requested();

        let request = DisconnectRequest::new(address).encode();
        let mut raw = [0u8; DisconnectResponse::SIZE];
        self.send_with_response(&request, &mut raw)?;

        let response = DisconnectResponse::decode(&raw)?;
        info!(
            "heci: disconnect from client {address:#04x} code {}",
            response.status
        );

        self.session.on_disconnect();
        Ok(())
    }

    // ───────────────────────────────────────────────────────────
    // Per-client exchanges
    // ───────────────────────────────────────────────────────────

    /// Send an application message to the connected client, spending one
    /// credit unit.
    ///
    /// When credit is exhausted the engine first polls for a pending
    /// grant, then sends regardless of whether credit was replenished —
    /// the transport itself may still accept the message. Preserved
    /// observed behavior of the remote endpoint; see the flow-state
    /// machine in [`super::session`].
    pub fn send_to_client(&mut self, message: &[u8]) -> Result<()> {
        let address = self.session.connected_address().ok_or(Error::NotConnected)?;

        if self.session.receive_credit() == 0 {
            self.poll_flow_control_grant();
            if self.session.receive_credit() == 0 {
                debug!("heci: sending to {address:#04x} without credit");
            }
        }

        self.binding
            .acquire()?
            .send(message, wire::CLIENT_HOST_ADDRESS, address)?;
        self.session.credit_spent();
        Ok(())
    }

    /// Receive the response half of a per-client exchange, filling
    /// `response` with exactly `response.len()` bytes.
    pub fn await_response(&mut self, response: &mut [u8]) -> Result<()> {
        if self.session.connected_address().is_none() {
            return Err(Error::NotConnected);
        }
        self.receive_response(response)
    }

    /// Consume one pending flow-control grant into local credit.
    ///
    /// Performs a blocking receive sized for exactly one flow-control
    /// message; anything else that arrives is dropped.
    pub fn poll_flow_control_grant(&mut self) {
        if self.session.connected_address().is_none() {
            return;
        }
        let Ok(transport) = self.binding.acquire() else {
            return;
        };

        let mut raw = [0u8; FlowControlMessage::SIZE];
        if transport.receive(true, &mut raw).is_ok() {
            if wire::command_code(raw[0]) == wire::FLOW_CONTROL {
                self.session.grant_received();
                debug!(
                    "heci: flow-control grant, credit now {}",
                    self.session.receive_credit()
                );
            } else {
                warn!(
                    "heci: dropped message {:#04x} while polling for grant",
                    wire::command_code(raw[0])
                );
            }
        }
    }

    /// Blocking receive with flow-control accounting.
    ///
    /// While a client is connected the host must announce readiness with
    /// exactly one outstanding flow-control token before receiving; the
    /// token is consumed by the completed receive.
    fn receive_response(&mut self, buf: &mut [u8]) -> Result<()> {
        if let Some(address) = self.session.connected_address() {
            if self.session.requested_receive() == 0 {
                let token = FlowControlMessage::new(address).encode();
                match self.binding.acquire()?.send(&token, HOST_ADDRESS, ME_ADDRESS) {
                    Ok(()) => self.session.receive_requested(),
                    Err(e) => warn!("heci: failed to send ready token - {e}"),
                }
            }
        }

        self.binding.acquire()?.receive(true, buf)?;

        if self.session.connected_address().is_some() {
            self.session.receive_completed();
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Bounded retry
// ───────────────────────────────────────────────────────────────

/// Run `op` up to `attempts` times, retrying only on [`Error::Timeout`].
///
/// Any other failure — and any success — returns immediately. Used for
/// the perform-provisioning response wait; discovery, enumeration, and
/// connect operations fail fast instead.
pub fn retry_on_timeout<T>(attempts: usize, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    debug_assert!(attempts > 0);
    let mut result = Err(Error::Timeout);
    for attempt in 1..=attempts {
        result = op();
        match &result {
            Err(Error::Timeout) => debug!("heci: attempt {attempt}/{attempts} timed out"),
            _ => break,
        }
    }
    result
}

// ── Tests ────────────────────────────────────────────────────
