//! HECI bus protocol stack.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Bus Stack                             │
//! │                                                            │
//! │  ┌───────────┐   ┌──────────┐   ┌───────────────────────┐  │
//! │  │ Transport │──▶│   Wire   │──▶│  Engine (req/resp,    │  │
//! │  │ (trait)   │   │ (codec)  │   │  flow control)        │  │
//! │  └───────────┘   └──────────┘   └───────────────────────┘  │
//! │       ▲                                    │               │
//! │       │              ┌─────────────────────┘               │
//! │       │              ▼                                     │
//! │  ┌───────────┐   ┌──────────┐                              │
//! │  │ Transport │◀──│ Session  │   (credit accounting)        │
//! │  │ (send)    │   │ (state)  │                              │
//! │  └───────────┘   └──────────┘                              │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine speaks the bus-management protocol (enumeration, connect,
//! disconnect, flow control) on addresses 0 → 0 and relays application
//! messages to the single connected client. The provisioning workflows in
//! [`crate::provision`] sit on top.

pub mod engine;
pub mod session;
pub mod transport;
pub mod wire;
