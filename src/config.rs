//! Driver configuration parameters.
//!
//! All tunable behavior of the provisioning driver. Values can be
//! overridden by the embedding firmware's configuration layer and
//! persisted through any storage backend via postcard.

use serde::{Deserialize, Serialize};

/// Provisioning driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Ignore the persisted completion flags on read (always attempt).
    /// Completion flags are still written normally, so turning this off
    /// again restores the short-circuit behavior.
    pub force_provisioning: bool,

    /// Run the EPID attestation workflow.
    pub provision_epid: bool,

    /// Run the FPF fuse workflow. Off by default: committing fuses is
    /// one-way and locks the configuration against further updates.
    pub provision_fpf: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            force_provisioning: false,
            provision_epid: true,
            provision_fpf: false,
        }
    }
}
