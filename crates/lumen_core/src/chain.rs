//! Layer-chain records and the scrubbing cursor.
//!
//! # Responsibility
//! - Model the loader's negotiation records (struct tags, versions, sizes).
//! - Model resolved entry points as typed proc addresses.
//! - Walk and splice the chain through an owned cursor instead of mutating
//!   loader-owned memory.
//!
//! # Invariants
//! - The cursor only ever manipulates its own cloned records; host records
//!   are read, never written.
//! - Scrubbing an already-clean chain leaves it unchanged.

use crate::config::CompiledWorkarounds;
use crate::model::{
    FormFactor, InstanceCreateInfo, InstanceHandle, RuntimeCode, SystemId, SystemProperties,
};
use log::{debug, info};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Struct version expected on the create-info record for this build.
pub const API_LAYER_CREATE_INFO_STRUCT_VERSION: u32 = 1;
/// Struct version expected on each chain record for this build.
pub const API_LAYER_NEXT_INFO_STRUCT_VERSION: u32 = 1;
/// Declared byte size expected on the create-info record.
pub const API_LAYER_CREATE_INFO_STRUCT_SIZE: u32 = 88;
/// Declared byte size expected on each chain record.
pub const API_LAYER_NEXT_INFO_STRUCT_SIZE: u32 = 136;

/// Type tag carried by negotiation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStructType {
    ApiLayerCreateInfo,
    ApiLayerNextInfo,
    Undefined,
}

impl Display for NegotiationStructType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            Self::ApiLayerCreateInfo => "api_layer_create_info",
            Self::ApiLayerNextInfo => "api_layer_next_info",
            Self::Undefined => "undefined",
        };
        write!(f, "{token}")
    }
}

/// Next-level create entry point of one chain record.
pub type CreateInstanceFn = Arc<
    dyn Fn(&InstanceCreateInfo, &ChainCursor) -> Result<InstanceHandle, RuntimeCode>
        + Send
        + Sync,
>;

/// Next-level proc-address resolver of one chain record.
pub type GetProcFn =
    Arc<dyn Fn(InstanceHandle, &str) -> Result<ProcAddr, RuntimeCode> + Send + Sync>;

pub type EnumerateExtensionsFn =
    Arc<dyn Fn(InstanceHandle) -> Result<Vec<String>, RuntimeCode> + Send + Sync>;
pub type GetSystemFn =
    Arc<dyn Fn(InstanceHandle, FormFactor) -> Result<SystemId, RuntimeCode> + Send + Sync>;
pub type GetSystemPropertiesFn =
    Arc<dyn Fn(InstanceHandle, SystemId) -> Result<SystemProperties, RuntimeCode> + Send + Sync>;
pub type DestroyInstanceFn =
    Arc<dyn Fn(InstanceHandle) -> Result<(), RuntimeCode> + Send + Sync>;

/// A resolved entry point.
///
/// The four instance-lifetime calls this core invokes itself resolve to
/// typed callables; everything else stays opaque and is only passed back to
/// the host unchanged.
#[derive(Clone)]
pub enum ProcAddr {
    EnumerateExtensions(EnumerateExtensionsFn),
    GetSystem(GetSystemFn),
    GetSystemProperties(GetSystemPropertiesFn),
    DestroyInstance(DestroyInstanceFn),
    Opaque { name: String },
}

impl ProcAddr {
    fn variant_name(&self) -> &'static str {
        match self {
            Self::EnumerateExtensions(_) => "enumerate_extensions",
            Self::GetSystem(_) => "get_system",
            Self::GetSystemProperties(_) => "get_system_properties",
            Self::DestroyInstance(_) => "destroy_instance",
            Self::Opaque { .. } => "opaque",
        }
    }
}

impl std::fmt::Debug for ProcAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opaque { name } => write!(f, "ProcAddr::Opaque({name})"),
            other => write!(f, "ProcAddr::{}", other.variant_name()),
        }
    }
}

impl PartialEq for ProcAddr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::EnumerateExtensions(a), Self::EnumerateExtensions(b)) => Arc::ptr_eq(a, b),
            (Self::GetSystem(a), Self::GetSystem(b)) => Arc::ptr_eq(a, b),
            (Self::GetSystemProperties(a), Self::GetSystemProperties(b)) => Arc::ptr_eq(a, b),
            (Self::DestroyInstance(a), Self::DestroyInstance(b)) => Arc::ptr_eq(a, b),
            (Self::Opaque { name: a }, Self::Opaque { name: b }) => a == b,
            _ => false,
        }
    }
}

/// One chain-link record as handed over by the loader.
///
/// Record `k` names layer `k` and carries the entry points of the level
/// below it, so splicing a record folds its forward functions into the
/// record before it.
#[derive(Clone)]
pub struct NextChainRecord {
    pub struct_type: NegotiationStructType,
    pub struct_version: u32,
    pub struct_size: u32,
    pub layer_name: String,
    pub next_get_proc: Option<GetProcFn>,
    pub next_create: Option<CreateInstanceFn>,
}

impl NextChainRecord {
    /// Builds a well-formed record with this build's tags.
    pub fn new(
        layer_name: impl Into<String>,
        next_get_proc: GetProcFn,
        next_create: CreateInstanceFn,
    ) -> Self {
        Self {
            struct_type: NegotiationStructType::ApiLayerNextInfo,
            struct_version: API_LAYER_NEXT_INFO_STRUCT_VERSION,
            struct_size: API_LAYER_NEXT_INFO_STRUCT_SIZE,
            layer_name: layer_name.into(),
            next_get_proc: Some(next_get_proc),
            next_create: Some(next_create),
        }
    }
}

impl std::fmt::Debug for NextChainRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextChainRecord")
            .field("layer_name", &self.layer_name)
            .field("struct_type", &self.struct_type)
            .field("struct_version", &self.struct_version)
            .field("struct_size", &self.struct_size)
            .field("has_get_proc", &self.next_get_proc.is_some())
            .field("has_create", &self.next_create.is_some())
            .finish()
    }
}

/// The enclosing layer-info record passed alongside the creation envelope.
///
/// `next_info[0]` describes this layer; the following entries describe the
/// layers between us and the runtime, in dispatch order.
#[derive(Debug, Clone)]
pub struct ApiLayerCreateInfo {
    pub struct_type: NegotiationStructType,
    pub struct_version: u32,
    pub struct_size: u32,
    pub next_info: Vec<NextChainRecord>,
}

impl ApiLayerCreateInfo {
    /// Builds a well-formed layer-info record with this build's tags.
    pub fn new(next_info: Vec<NextChainRecord>) -> Self {
        Self {
            struct_type: NegotiationStructType::ApiLayerCreateInfo,
            struct_version: API_LAYER_CREATE_INFO_STRUCT_VERSION,
            struct_size: API_LAYER_CREATE_INFO_STRUCT_SIZE,
            next_info,
        }
    }
}

/// Owned, spliceable view of the chain records.
///
/// Cloned from the host's layer-info record; all splicing happens on this
/// copy. Record 0 is this layer's own record.
#[derive(Debug, Clone)]
pub struct ChainCursor {
    records: Vec<NextChainRecord>,
}

impl ChainCursor {
    pub fn from_layer_info(info: &ApiLayerCreateInfo) -> Self {
        Self {
            records: info.next_info.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_records(records: Vec<NextChainRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolver of the level below this layer, as currently wired.
    pub fn head_resolver(&self) -> Option<GetProcFn> {
        self.records.first().and_then(|r| r.next_get_proc.clone())
    }

    /// Cursor advanced past the head record, for handing to the next level.
    pub fn advanced(&self) -> ChainCursor {
        ChainCursor {
            records: self.records.iter().skip(1).cloned().collect(),
        }
    }

    /// Names of the layers after this one, in dispatch order.
    pub fn upstream_names(&self) -> Vec<String> {
        self.records
            .iter()
            .skip(1)
            .map(|r| r.layer_name.clone())
            .collect()
    }

    /// Removes known-incompatible layers and collects extensions implied by
    /// the presence of specific ones.
    ///
    /// Splicing replaces the current record's forward functions with the
    /// removed record's own forward functions without advancing, so chained
    /// incompatible layers are all removed in one pass.
    pub fn scrub(&mut self, workarounds: &CompiledWorkarounds) -> BTreeSet<String> {
        let mut implied = BTreeSet::new();
        let mut index = 0;
        while index + 1 < self.records.len() {
            let candidate = self.records[index + 1].layer_name.clone();
            if workarounds.is_incompatible_layer(&candidate) {
                info!("event=chain_scrub module=chain status=skip layer={candidate}");
                let removed = self.records.remove(index + 1);
                self.records[index].next_get_proc = removed.next_get_proc;
                self.records[index].next_create = removed.next_create;
            } else {
                debug!("event=chain_scrub module=chain status=keep layer={candidate}");
                if let Some(extension) = workarounds.implied_extension(&candidate) {
                    info!(
                        "event=chain_scrub module=chain status=implied layer={candidate} \
                         extension={extension}"
                    );
                    implied.insert(extension);
                }
                index += 1;
            }
        }
        implied
    }

    /// Forwards a create call to the level below this layer.
    pub fn create_downstream(
        &self,
        request: &InstanceCreateInfo,
    ) -> Result<InstanceHandle, RuntimeCode> {
        let head = self
            .records
            .first()
            .ok_or(RuntimeCode::FunctionUnsupported)?;
        let create = head
            .next_create
            .clone()
            .ok_or(RuntimeCode::FunctionUnsupported)?;
        let rest = self.advanced();
        create(request, &rest)
    }

    /// Resolves a named entry point on `instance` through the level below.
    pub fn resolve_downstream(
        &self,
        instance: InstanceHandle,
        name: &str,
    ) -> Result<ProcAddr, RuntimeCode> {
        let head = self
            .records
            .first()
            .ok_or(RuntimeCode::FunctionUnsupported)?;
        let resolver = head
            .next_get_proc
            .clone()
            .ok_or(RuntimeCode::FunctionUnsupported)?;
        resolver(instance, name)
    }
}
