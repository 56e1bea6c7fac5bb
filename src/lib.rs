//! MeProv — HECI bus client driver and ME provisioning engine.
//!
//! Drives the host side of the HECI bus message protocol to negotiate
//! with a remote embedded controller and run two provisioning schemes on
//! top of it: EPID attestation (certificate + group public key install)
//! and FPF fuse commit.
//!
//! Platform services — transport discovery, blob storage, persistent
//! flags, PCI presence probing — enter through the port traits in
//! [`provision::ports`] and [`bus::transport`], so the protocol core is
//! testable on any host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod bus;
pub mod config;
pub mod guid;
pub mod provision;

mod error;

pub use error::{ConnectReject, Error, ProtocolError, Result, StoreError, TransportError};
