//! Process-wide layer context and session lifecycle.
//!
//! # Responsibility
//! - Hold the collaborators (workarounds, store, feature factory) dispatch
//!   needs across calls.
//! - Enforce the create-once/destroy-once lifecycle of the layer session.
//!
//! # Invariants
//! - At most one live session per context; installing over a live session
//!   fails loudly.
//! - The bypass resolver, once captured, serves every later proc-address
//!   call for the life of the context.

use crate::chain::GetProcFn;
use crate::config::CompiledWorkarounds;
use crate::feature::FeatureLayer;
use crate::model::InstanceHandle;
use crate::store::OverrideStore;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Builds a fresh feature layer for each successful instance creation.
pub type FeatureFactory = Box<dyn Fn() -> Box<dyn FeatureLayer> + Send + Sync>;

/// Session lifecycle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    AlreadyActive,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyActive => write!(f, "a layer session is already active"),
        }
    }
}

impl Error for SessionError {}

/// The installed singleton: the feature layer bound to one real instance.
pub struct LayerSession {
    pub(crate) feature: Box<dyn FeatureLayer>,
    pub(crate) instance: InstanceHandle,
}

impl LayerSession {
    pub fn instance(&self) -> InstanceHandle {
        self.instance
    }
}

/// Explicitly passed replacement for process-wide mutable state.
///
/// The host embedding decides where this lives (usually a `static` guarded
/// by a mutex); the core only ever sees `&mut LayerContext`.
pub struct LayerContext {
    workarounds: CompiledWorkarounds,
    store: Arc<dyn OverrideStore>,
    feature_factory: FeatureFactory,
    bypass_resolver: Option<GetProcFn>,
    session: Option<LayerSession>,
}

impl LayerContext {
    pub fn new(
        workarounds: CompiledWorkarounds,
        store: Arc<dyn OverrideStore>,
        feature_factory: FeatureFactory,
    ) -> Self {
        Self {
            workarounds,
            store,
            feature_factory,
            bypass_resolver: None,
            session: None,
        }
    }

    pub fn workarounds(&self) -> &CompiledWorkarounds {
        &self.workarounds
    }

    pub fn store(&self) -> Arc<dyn OverrideStore> {
        Arc::clone(&self.store)
    }

    pub fn new_feature(&self) -> Box<dyn FeatureLayer> {
        (self.feature_factory)()
    }

    /// Captures the host's original resolver; later proc-address calls
    /// forward to it directly.
    pub fn set_bypass_resolver(&mut self, resolver: GetProcFn) {
        self.bypass_resolver = Some(resolver);
    }

    pub fn bypass_resolver(&self) -> Option<GetProcFn> {
        self.bypass_resolver.clone()
    }

    pub fn is_bypassing(&self) -> bool {
        self.bypass_resolver.is_some()
    }

    /// Installs the layer session.
    ///
    /// # Errors
    /// - Returns `SessionError::AlreadyActive` when a session is live; the
    ///   caller must reject the second create.
    pub fn install_session(
        &mut self,
        feature: Box<dyn FeatureLayer>,
        instance: InstanceHandle,
    ) -> Result<(), SessionError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyActive);
        }
        self.session = Some(LayerSession { feature, instance });
        Ok(())
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_mut(&mut self) -> Option<&mut LayerSession> {
        self.session.as_mut()
    }

    pub fn session_instance(&self) -> Option<InstanceHandle> {
        self.session.as_ref().map(|session| session.instance)
    }

    /// Tears the session down; the only legal death of the singleton.
    pub fn clear_session(&mut self) {
        self.session = None;
    }
}
