//! Host-facing data model for instance negotiation.
//!
//! # Responsibility
//! - Define the result codes exchanged with the loader and the runtime.
//! - Define the creation envelope and the small system-identity types the
//!   prober reads back.
//!
//! # Invariants
//! - `InstanceCreateInfo` is never mutated after the host hands it over;
//!   derived requests are always fresh copies.

use std::fmt::{Display, Formatter};

/// Result codes crossing the layer boundary.
///
/// Mirrors the subset of runtime result codes this core produces or
/// forwards. Downstream calls return `Result<T, RuntimeCode>` where the
/// error variant carries a non-success code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeCode {
    InitializationFailed,
    RuntimeFailure,
    LimitReached,
    HandleInvalid,
    FunctionUnsupported,
    SystemInvalid,
    ExtensionNotPresent,
}

impl RuntimeCode {
    /// Stable token used in structured log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitializationFailed => "initialization_failed",
            Self::RuntimeFailure => "runtime_failure",
            Self::LimitReached => "limit_reached",
            Self::HandleInvalid => "handle_invalid",
            Self::FunctionUnsupported => "function_unsupported",
            Self::SystemInvalid => "system_invalid",
            Self::ExtensionNotPresent => "extension_not_present",
        }
    }
}

impl Display for RuntimeCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque handle for a runtime instance created through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub u64);

impl Display for InstanceHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Opaque system identifier returned by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(pub u64);

/// Device form factor requested during system acquisition. The prober only
/// ever asks for a head-mounted display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFactor {
    HeadMountedDisplay,
}

/// System identity reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemProperties {
    pub system_name: String,
    pub vendor_id: u32,
}

/// Application identity supplied in the creation envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    pub application_name: String,
    pub application_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
}

/// Immutable request to create a runtime connection (the creation envelope).
///
/// Extension count and name list always move together: the list is a single
/// `Vec` and callers must not introduce duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCreateInfo {
    pub application_info: ApplicationInfo,
    pub enabled_api_layers: Vec<String>,
    pub enabled_extensions: Vec<String>,
}

impl InstanceCreateInfo {
    /// Derives the throwaway-probe request: same identity, zero extensions
    /// and zero enabled API layers.
    pub fn stripped_for_probe(&self) -> InstanceCreateInfo {
        InstanceCreateInfo {
            application_info: self.application_info.clone(),
            enabled_api_layers: Vec::new(),
            enabled_extensions: Vec::new(),
        }
    }
}
