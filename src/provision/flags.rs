//! Persistent provisioning completion flags.
//!
//! One named `u32` per scheme. Value 1 means the scheme has reached a
//! terminal state (provisioned, permanently failed, or incompatible
//! firmware) and must not be attempted again until external state is
//! reset.

use log::warn;

use super::ports::FlagStore;

/// EPID attestation completion flag name.
pub const EPID_PROVISIONED_FLAG: &str = "epid_provisioned";
/// FPF fuse completion flag name.
pub const FPF_PROVISIONED_FLAG: &str = "fpf_provisioned";

const FLAG_DONE: u32 = 1;

/// Flag access with the force-provisioning switch threaded through.
///
/// Forcing affects reads only: `is_done` always reports false so every
/// run re-attempts, while `mark_done` still persists normally.
pub struct ProvisionFlags<'a> {
    store: &'a mut dyn FlagStore,
    force: bool,
}

impl<'a> ProvisionFlags<'a> {
    pub fn new(store: &'a mut dyn FlagStore, force: bool) -> Self {
        Self { store, force }
    }

    /// Whether the named scheme already reached a terminal state.
    pub fn is_done(&self, name: &str) -> bool {
        if self.force {
            return false;
        }
        matches!(self.store.get(name), Ok(FLAG_DONE))
    }

    /// Record the named scheme as terminally handled. Best-effort: a
    /// store failure is logged and the workflow outcome stands.
    pub fn mark_done(&mut self, name: &str) {
        if let Err(e) = self.store.set(name, FLAG_DONE) {
            warn!("provision: failed to persist {name} - {e}");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
