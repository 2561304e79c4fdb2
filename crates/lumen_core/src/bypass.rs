//! Per-application bypass decision.
//!
//! # Responsibility
//! - Record the current executable path so users can find and edit their
//!   application's override entry.
//! - Decide whether interception is skipped entirely for this process.
//!
//! # Invariants
//! - The module path is recorded on every create call, bypassing or not.
//! - Store failures never fail the create call; they degrade to the
//!   default (no bypass) and are logged.

use crate::config::CompiledWorkarounds;
use crate::model::ApplicationInfo;
use crate::store::OverrideStore;
use log::{info, warn};

/// Store key holding the recorded executable path.
pub const MODULE_KEY: &str = "module";
/// Store key holding the user-set bypass flag.
pub const BYPASS_KEY: &str = "bypass";

/// Records the current executable path under the application's key.
///
/// # Side effects
/// - Writes the `module` string value; always called, regardless of the
///   bypass outcome.
pub fn record_application_module(store: &dyn OverrideStore, application_name: &str) {
    let path = match std::env::current_exe() {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(err) => {
            warn!(
                "event=module_record module=bypass status=error \
                 application={application_name} error={err}"
            );
            return;
        }
    };

    if let Err(err) = store.set_string(application_name, MODULE_KEY, &path) {
        warn!(
            "event=module_record module=bypass status=error \
             application={application_name} error={err}"
        );
    }
}

/// Returns true when interception must be skipped for this application.
///
/// Bypass applies when the engine is categorically excluded or the user has
/// set a non-zero `bypass` flag for the application.
pub fn should_bypass(
    store: &dyn OverrideStore,
    workarounds: &CompiledWorkarounds,
    application_info: &ApplicationInfo,
) -> bool {
    if workarounds.is_bypassed_engine(&application_info.engine_name) {
        info!(
            "event=bypass_decision module=bypass status=engine_denylisted \
             application={} engine={}",
            application_info.application_name, application_info.engine_name
        );
        return true;
    }

    let flag = match store.get_flag(&application_info.application_name, BYPASS_KEY) {
        Ok(flag) => flag.unwrap_or(0),
        Err(err) => {
            warn!(
                "event=bypass_decision module=bypass status=store_error \
                 application={} error={err}",
                application_info.application_name
            );
            0
        }
    };

    flag != 0
}
