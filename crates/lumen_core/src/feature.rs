//! Feature-layer collaborator contract.
//!
//! The feature singleton (rendering enhancements, configuration, per-frame
//! dispatch) lives outside this core; the bootstrap only drives it through
//! this narrow interface.

use crate::chain::{GetProcFn, ProcAddr};
use crate::model::{InstanceCreateInfo, InstanceHandle, RuntimeCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type FeatureResult<T> = Result<T, FeatureError>;

/// Failures reported by the feature layer.
///
/// `Internal` models the raised internal-error condition; it must be caught
/// at this core's boundary and converted to the generic runtime-failure
/// code, never surfaced to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    Code(RuntimeCode),
    Internal(String),
}

impl Display for FeatureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "feature layer returned {code}"),
            Self::Internal(detail) => write!(f, "feature layer internal error: {detail}"),
        }
    }
}

impl Error for FeatureError {}

/// Contract the installed feature singleton fulfills.
pub trait FeatureLayer: Send {
    /// Hands over the resolved real-instance resolver and instance handle.
    fn set_instance_resolver(&mut self, resolver: GetProcFn, instance: InstanceHandle);

    /// Records the upstream layer names for later feature-gating decisions.
    fn set_upstream_layers(&mut self, layers: Vec<String>);

    /// Instance initialization; consumes the original creation envelope.
    fn create_instance(&mut self, request: &InstanceCreateInfo) -> FeatureResult<()>;

    /// Instance teardown.
    fn destroy_instance(&mut self, instance: InstanceHandle) -> FeatureResult<()>;

    /// Steady-state proc-address resolution.
    fn get_instance_proc_addr(
        &mut self,
        instance: InstanceHandle,
        name: &str,
    ) -> FeatureResult<ProcAddr>;
}

#[cfg(test)]
mod tests {
    use super::FeatureError;
    use crate::model::RuntimeCode;

    #[test]
    fn errors_format_with_their_detail() {
        let code = FeatureError::Code(RuntimeCode::LimitReached);
        assert!(code.to_string().contains("limit_reached"));

        let internal = FeatureError::Internal("swapchain setup failed".to_string());
        assert!(internal.to_string().contains("swapchain setup failed"));
    }
}
