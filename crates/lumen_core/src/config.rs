//! Workaround configuration for third-party runtimes and layers.
//!
//! # Responsibility
//! - Carry the per-vendor workaround lists as data, not logic, so they can
//!   evolve without touching the negotiation algorithm.
//! - Compile layer-name patterns once for the chain scrubber.
//!
//! # Invariants
//! - Built-in defaults always compile.
//! - Matching is exact for engine names and extension names, regex-based
//!   for layer names, substring-based for runtime system signatures.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Declarative workaround lists.
///
/// Unset fields deserialize to the built-in defaults, so a partial override
/// file only has to name the lists it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkaroundConfig {
    /// Engine names for which interception is skipped categorically.
    pub bypassed_engines: Vec<String>,
    /// Engine names that take the fast-initialization path (no scrub, no
    /// probe) to avoid instance-limit exhaustion in repeated-create tools.
    pub fast_init_engines: Vec<String>,
    /// Layer-name patterns spliced out of every creation call.
    pub incompatible_layer_patterns: Vec<String>,
    /// Layers that supply a capability without reliably advertising it,
    /// mapped to the extension assumed present.
    pub implied_layer_extensions: BTreeMap<String, String>,
    /// Extensions this layer opportunistically requests when advertised.
    pub opportunistic_extensions: Vec<String>,
    /// System-name substrings of runtimes that mishandle mid-initialization
    /// teardown; the probe instance is leaked for these.
    pub teardown_averse_system_signatures: Vec<String>,
}

impl Default for WorkaroundConfig {
    fn default() -> Self {
        Self {
            bypassed_engines: vec!["Chromium".to_string()],
            fast_init_engines: vec!["OpenXRDeveloperTools".to_string()],
            incompatible_layer_patterns: vec!["^XR_APILAYER_VIVE_".to_string()],
            implied_layer_extensions: BTreeMap::from([(
                "XR_APILAYER_ULTRALEAP_hand_tracking".to_string(),
                "XR_EXT_hand_tracking".to_string(),
            )]),
            opportunistic_extensions: vec![
                "XR_EXT_hand_tracking".to_string(),
                "XR_EXT_eye_gaze_interaction".to_string(),
                "XR_KHR_win32_convert_performance_counter_time".to_string(),
                "XR_KHR_visibility_mask".to_string(),
                "XR_FB_eye_tracking_social".to_string(),
            ],
            teardown_averse_system_signatures: vec!["Vive Reality system".to_string()],
        }
    }
}

/// Configuration compile errors.
#[derive(Debug)]
pub enum ConfigError {
    InvalidLayerPattern { pattern: String, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLayerPattern { pattern, reason } => {
                write!(f, "invalid layer pattern `{pattern}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Workaround lists with layer-name patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledWorkarounds {
    config: WorkaroundConfig,
    incompatible_layers: Vec<Regex>,
}

impl CompiledWorkarounds {
    /// Compiles one configuration.
    ///
    /// # Errors
    /// - Returns an error when a layer pattern is not a valid regex.
    pub fn compile(config: WorkaroundConfig) -> Result<Self, ConfigError> {
        let mut incompatible_layers = Vec::with_capacity(config.incompatible_layer_patterns.len());
        for pattern in &config.incompatible_layer_patterns {
            let compiled =
                Regex::new(pattern).map_err(|err| ConfigError::InvalidLayerPattern {
                    pattern: pattern.clone(),
                    reason: err.to_string(),
                })?;
            incompatible_layers.push(compiled);
        }
        Ok(Self {
            config,
            incompatible_layers,
        })
    }

    pub fn config(&self) -> &WorkaroundConfig {
        &self.config
    }

    pub fn is_bypassed_engine(&self, engine_name: &str) -> bool {
        self.config
            .bypassed_engines
            .iter()
            .any(|engine| engine == engine_name)
    }

    pub fn is_fast_init_engine(&self, engine_name: &str) -> bool {
        self.config
            .fast_init_engines
            .iter()
            .any(|engine| engine == engine_name)
    }

    pub fn is_incompatible_layer(&self, layer_name: &str) -> bool {
        self.incompatible_layers
            .iter()
            .any(|pattern| pattern.is_match(layer_name))
    }

    pub fn implied_extension(&self, layer_name: &str) -> Option<String> {
        self.config
            .implied_layer_extensions
            .get(layer_name)
            .cloned()
    }

    pub fn wants_extension(&self, extension_name: &str) -> bool {
        self.config
            .opportunistic_extensions
            .iter()
            .any(|extension| extension == extension_name)
    }

    pub fn is_teardown_averse(&self, system_name: &str) -> bool {
        self.config
            .teardown_averse_system_signatures
            .iter()
            .any(|signature| system_name.contains(signature))
    }
}

impl Default for CompiledWorkarounds {
    fn default() -> Self {
        Self::compile(WorkaroundConfig::default())
            .expect("built-in workaround patterns should compile")
    }
}
