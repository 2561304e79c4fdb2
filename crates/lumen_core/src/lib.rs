//! Bootstrap and negotiation core for the Lumen OpenXR API layer.
//!
//! This crate owns the instance-creation handshake: structural validation
//! of the loader's negotiation records, the per-application bypass
//! decision, scrubbing of incompatible upstream layers, capability probing
//! through a throwaway instance, extension injection and the
//! create-once/destroy-once session lifecycle. Feature logic lives behind
//! the [`feature::FeatureLayer`] contract.

pub mod bypass;
pub mod chain;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod extensions;
pub mod feature;
pub mod logging;
pub mod model;
mod probe;
pub mod store;
pub mod validate;

pub use chain::{ApiLayerCreateInfo, ChainCursor, NextChainRecord, ProcAddr};
pub use config::{CompiledWorkarounds, ConfigError, WorkaroundConfig};
pub use context::{FeatureFactory, LayerContext, SessionError};
pub use dispatch::{
    create_api_layer_instance, destroy_instance, get_instance_proc_addr, LayerError,
};
pub use feature::{FeatureError, FeatureLayer, FeatureResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{
    ApplicationInfo, FormFactor, InstanceCreateInfo, InstanceHandle, RuntimeCode, SystemId,
    SystemProperties,
};
pub use store::{OverrideStore, SqliteOverrideStore, StoreError, StoreResult};
pub use validate::{validate_layer_info, ValidationError};

/// Identity this layer declares to the loader.
pub const LAYER_NAME: &str = "XR_APILAYER_LUMEN_enhancer";

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
