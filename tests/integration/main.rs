//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the provisioning
//! stack end-to-end against the scripted fake controller. All tests run
//! on the host with no real bus hardware required.

mod epid_flow_tests;
mod fpf_flow_tests;
