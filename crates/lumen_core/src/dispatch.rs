//! Host-invoked entry points: create, destroy, proc-address resolution.
//!
//! # Responsibility
//! - Drive the bootstrap pipeline: validation, bypass decision, chain
//!   scrubbing, probing, extension injection, chain invocation, session
//!   install.
//! - Gate the steady-state destroy and proc-address calls.
//!
//! # Invariants
//! - Validation failures and chain failures preserve their result code;
//!   every other failure normalizes to the generic runtime-failure code at
//!   this boundary.
//! - Feature-layer internal errors never cross the host boundary.

use crate::bypass;
use crate::chain::{ApiLayerCreateInfo, ChainCursor, ProcAddr};
use crate::context::{LayerContext, SessionError};
use crate::extensions;
use crate::feature::FeatureError;
use crate::model::{InstanceCreateInfo, InstanceHandle, RuntimeCode};
use crate::probe;
use crate::validate::{self, ValidationError};
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Create-path failures, converted exactly once at the public boundary.
#[derive(Debug)]
pub enum LayerError {
    Validation(ValidationError),
    Chain(RuntimeCode),
    SessionLimit,
    Feature { detail: Option<String> },
}

impl LayerError {
    /// Boundary conversion: only validation and chain failures keep a
    /// specific code.
    pub fn code(&self) -> RuntimeCode {
        match self {
            Self::Validation(_) => RuntimeCode::InitializationFailed,
            Self::Chain(code) => *code,
            Self::SessionLimit => RuntimeCode::LimitReached,
            Self::Feature { .. } => RuntimeCode::RuntimeFailure,
        }
    }
}

impl Display for LayerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "structural validation failed: {err}"),
            Self::Chain(code) => write!(f, "chain create call failed: {code}"),
            Self::SessionLimit => write!(f, "a layer session is already active"),
            Self::Feature { detail: Some(detail) } => {
                write!(f, "feature initialization failed: {detail}")
            }
            Self::Feature { detail: None } => write!(f, "feature initialization failed"),
        }
    }
}

impl Error for LayerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Entry point for creating the layer instance.
pub fn create_api_layer_instance(
    ctx: &mut LayerContext,
    request: &InstanceCreateInfo,
    layer_info: &ApiLayerCreateInfo,
) -> Result<InstanceHandle, RuntimeCode> {
    let activity = Uuid::new_v4();
    info!(
        "event=create_instance module=dispatch status=start activity={activity} \
         application={} engine={}",
        request.application_info.application_name, request.application_info.engine_name
    );

    match create_instance_inner(ctx, request, layer_info) {
        Ok(instance) => {
            info!(
                "event=create_instance module=dispatch status=ok activity={activity} \
                 instance={instance}"
            );
            Ok(instance)
        }
        Err(err) => {
            let code = err.code();
            error!(
                "event=create_instance module=dispatch status=error activity={activity} \
                 error_code={code} error={err}"
            );
            Err(code)
        }
    }
}

fn create_instance_inner(
    ctx: &mut LayerContext,
    request: &InstanceCreateInfo,
    layer_info: &ApiLayerCreateInfo,
) -> Result<InstanceHandle, LayerError> {
    // Side-effect-free validation runs before anything else.
    validate::validate_layer_info(layer_info).map_err(LayerError::Validation)?;

    // Single-session contract: reject a second create before touching the
    // store or the chain.
    if ctx.has_session() {
        return Err(LayerError::SessionLimit);
    }

    let mut cursor = ChainCursor::from_layer_info(layer_info);
    let store = ctx.store();
    let application_info = &request.application_info;

    // Always recorded, so the user can find the entry and edit it.
    bypass::record_application_module(store.as_ref(), &application_info.application_name);

    if bypass::should_bypass(store.as_ref(), ctx.workarounds(), application_info) {
        info!(
            "event=create_instance module=dispatch status=bypass application={} engine={}",
            application_info.application_name, application_info.engine_name
        );
        if let Some(resolver) = cursor.head_resolver() {
            ctx.set_bypass_resolver(resolver);
        }
        // Splice ourselves out and forward the call unmodified.
        return cursor.create_downstream(request).map_err(LayerError::Chain);
    }

    let fast_init = ctx
        .workarounds()
        .is_fast_init_engine(&application_info.engine_name);

    let mut detected = BTreeSet::new();
    if fast_init {
        // Repeated-create tooling: skip the probe to avoid exhausting the
        // runtime's instance limit.
        info!(
            "event=create_instance module=dispatch status=fast_init engine={}",
            application_info.engine_name
        );
    } else {
        detected.extend(cursor.scrub(ctx.workarounds()));
        let outcome = probe::probe_chain(&cursor, request, ctx.workarounds());
        detected.extend(outcome.extensions);
    }

    let chain_request = extensions::augment_create_info(request, &detected);
    for extension in &chain_request.enabled_extensions {
        debug!("event=create_instance module=dispatch status=use_extension name={extension}");
    }

    let instance = cursor
        .create_downstream(&chain_request)
        .map_err(LayerError::Chain)?;
    info!("event=create_instance module=dispatch status=chain_ok instance={instance}");

    let mut feature = ctx.new_feature();
    if let Some(resolver) = cursor.head_resolver() {
        feature.set_instance_resolver(resolver, instance);
    }
    feature.set_upstream_layers(cursor.upstream_names());

    // The feature layer consumes the original, pre-augmentation envelope.
    match feature.create_instance(request) {
        Ok(()) => match ctx.install_session(feature, instance) {
            Ok(()) => Ok(instance),
            Err(SessionError::AlreadyActive) => {
                destroy_real_instance(&cursor, instance);
                Err(LayerError::SessionLimit)
            }
        },
        Err(err) => {
            let detail = match err {
                FeatureError::Internal(detail) => Some(detail),
                FeatureError::Code(code) => Some(format!("feature layer returned {code}")),
            };
            destroy_real_instance(&cursor, instance);
            Err(LayerError::Feature { detail })
        }
    }
}

/// Best-effort cleanup of a real instance whose feature setup failed.
fn destroy_real_instance(cursor: &ChainCursor, instance: InstanceHandle) {
    match cursor.resolve_downstream(instance, "xrDestroyInstance") {
        Ok(ProcAddr::DestroyInstance(destroy)) => {
            if let Err(code) = destroy(instance) {
                warn!(
                    "event=instance_cleanup module=dispatch status=error \
                     instance={instance} error_code={code}"
                );
            } else {
                info!("event=instance_cleanup module=dispatch status=ok instance={instance}");
            }
        }
        other => {
            warn!(
                "event=instance_cleanup module=dispatch status=unresolved \
                 instance={instance} result={other:?}"
            );
        }
    }
}

/// Entry point for destroying the layer instance.
///
/// Success tears the session down; this is the only legal death of the
/// singleton.
pub fn destroy_instance(
    ctx: &mut LayerContext,
    instance: InstanceHandle,
) -> Result<(), RuntimeCode> {
    info!("event=destroy_instance module=dispatch status=start instance={instance}");

    let outcome = match ctx.session_mut() {
        None => {
            error!("event=destroy_instance module=dispatch status=no_session instance={instance}");
            return Err(RuntimeCode::HandleInvalid);
        }
        Some(session) => session.feature.destroy_instance(instance),
    };

    match outcome {
        Ok(()) => {
            ctx.clear_session();
            info!("event=destroy_instance module=dispatch status=ok instance={instance}");
            Ok(())
        }
        Err(FeatureError::Code(code)) => {
            error!(
                "event=destroy_instance module=dispatch status=error \
                 instance={instance} error_code={code}"
            );
            Err(code)
        }
        Err(FeatureError::Internal(detail)) => {
            error!(
                "event=destroy_instance module=dispatch status=error \
                 instance={instance} error_code={} error={detail}",
                RuntimeCode::RuntimeFailure
            );
            Err(RuntimeCode::RuntimeFailure)
        }
    }
}

/// Entry point for proc-address resolution.
///
/// In bypass mode the captured original resolver answers directly, with no
/// interception and no singleton involvement.
pub fn get_instance_proc_addr(
    ctx: &mut LayerContext,
    instance: InstanceHandle,
    name: &str,
) -> Result<ProcAddr, RuntimeCode> {
    if let Some(resolver) = ctx.bypass_resolver() {
        return resolver(instance, name);
    }

    let outcome = match ctx.session_mut() {
        None => {
            warn!(
                "event=get_proc_addr module=dispatch status=no_session \
                 instance={instance} name={name}"
            );
            return Err(RuntimeCode::HandleInvalid);
        }
        Some(session) => session.feature.get_instance_proc_addr(instance, name),
    };

    match outcome {
        Ok(addr) => Ok(addr),
        Err(FeatureError::Code(code)) => Err(code),
        Err(FeatureError::Internal(detail)) => {
            // Unlike destroy, the error text is surfaced to the log sink.
            error!(
                "event=get_proc_addr module=dispatch status=error instance={instance} \
                 name={name} error={detail}"
            );
            Err(RuntimeCode::RuntimeFailure)
        }
    }
}
