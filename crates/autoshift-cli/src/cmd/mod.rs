pub mod check;
pub mod init;
pub mod install;
pub mod login;
pub mod status;

use anyhow::Context;
use autoshift_core::AutoShiftConfig;
use std::path::Path;

/// Load the config file, pointing at `autoshift init` when it is missing.
pub(crate) fn load_config(path: &Path) -> anyhow::Result<AutoShiftConfig> {
    AutoShiftConfig::load(path).with_context(|| {
        format!(
            "could not load {} (run 'autoshift init' to create one)",
            path.display()
        )
    })
}
