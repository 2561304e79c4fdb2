//! Throwaway-instance probing for optional extensions.
//!
//! Some upstream layers do not answer extension enumeration without an
//! instance, so a disposable instance is created just to ask. Every failure
//! in here is non-fatal: the probe degrades to an empty extension set and
//! initialization continues.

use crate::chain::{
    ChainCursor, DestroyInstanceFn, EnumerateExtensionsFn, GetSystemFn, GetSystemPropertiesFn,
    ProcAddr,
};
use crate::config::CompiledWorkarounds;
use crate::model::{FormFactor, InstanceCreateInfo, InstanceHandle};
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Transient probe outcome; never escapes the crate.
pub(crate) struct ProbeOutcome {
    pub extensions: BTreeSet<String>,
    pub system_name: Option<String>,
}

fn resolve_enumerate(cursor: &ChainCursor, instance: InstanceHandle) -> Option<EnumerateExtensionsFn> {
    match cursor.resolve_downstream(instance, "xrEnumerateInstanceExtensionProperties") {
        Ok(ProcAddr::EnumerateExtensions(entry)) => Some(entry),
        other => {
            warn!(
                "event=probe_resolve module=probe status=error \
                 name=xrEnumerateInstanceExtensionProperties result={other:?}"
            );
            None
        }
    }
}

fn resolve_get_system(cursor: &ChainCursor, instance: InstanceHandle) -> Option<GetSystemFn> {
    match cursor.resolve_downstream(instance, "xrGetSystem") {
        Ok(ProcAddr::GetSystem(entry)) => Some(entry),
        other => {
            warn!("event=probe_resolve module=probe status=error name=xrGetSystem result={other:?}");
            None
        }
    }
}

fn resolve_get_system_properties(
    cursor: &ChainCursor,
    instance: InstanceHandle,
) -> Option<GetSystemPropertiesFn> {
    match cursor.resolve_downstream(instance, "xrGetSystemProperties") {
        Ok(ProcAddr::GetSystemProperties(entry)) => Some(entry),
        other => {
            warn!(
                "event=probe_resolve module=probe status=error \
                 name=xrGetSystemProperties result={other:?}"
            );
            None
        }
    }
}

fn resolve_destroy(cursor: &ChainCursor, instance: InstanceHandle) -> Option<DestroyInstanceFn> {
    match cursor.resolve_downstream(instance, "xrDestroyInstance") {
        Ok(ProcAddr::DestroyInstance(entry)) => Some(entry),
        other => {
            warn!(
                "event=probe_resolve module=probe status=error \
                 name=xrDestroyInstance result={other:?}"
            );
            None
        }
    }
}

/// Creates a throwaway instance through the scrubbed chain, enumerates the
/// allow-listed extensions it advertises and reads the system identity.
pub(crate) fn probe_chain(
    cursor: &ChainCursor,
    request: &InstanceCreateInfo,
    workarounds: &CompiledWorkarounds,
) -> ProbeOutcome {
    let mut outcome = ProbeOutcome {
        extensions: BTreeSet::new(),
        system_name: None,
    };

    let probe_request = request.stripped_for_probe();
    let instance = match cursor.create_downstream(&probe_request) {
        Ok(instance) => instance,
        Err(code) => {
            warn!("event=probe_create module=probe status=error error_code={code}");
            return outcome;
        }
    };
    debug!("event=probe_create module=probe status=ok instance={instance}");

    let enumerate = resolve_enumerate(cursor, instance);
    let get_system = resolve_get_system(cursor, instance);
    let get_system_properties = resolve_get_system_properties(cursor, instance);
    let mut destroy = resolve_destroy(cursor, instance);

    match enumerate {
        Some(enumerate) => match enumerate(instance) {
            Ok(advertised) => {
                for extension in advertised {
                    debug!("event=probe_extension module=probe status=advertised name={extension}");
                    if workarounds.wants_extension(&extension) {
                        outcome.extensions.insert(extension);
                    }
                }
            }
            Err(code) => {
                warn!("event=probe_enumerate module=probe status=error error_code={code}");
            }
        },
        None => {
            warn!("event=probe_enumerate module=probe status=unresolved");
        }
    }

    if let (Some(get_system), Some(get_system_properties)) = (get_system, get_system_properties) {
        match get_system(instance, FormFactor::HeadMountedDisplay) {
            Ok(system) => match get_system_properties(instance, system) {
                Ok(properties) => {
                    if workarounds.is_teardown_averse(&properties.system_name) {
                        // This runtime mishandles mid-initialization
                        // teardown; leak the probe instance instead.
                        info!(
                            "event=probe_teardown module=probe status=leak \
                             system={}",
                            properties.system_name
                        );
                        destroy = None;
                    }
                    outcome.system_name = Some(properties.system_name);
                }
                Err(code) => {
                    warn!(
                        "event=probe_system module=probe status=error \
                         stage=properties error_code={code}"
                    );
                }
            },
            Err(code) => {
                warn!(
                    "event=probe_system module=probe status=error stage=acquire error_code={code}"
                );
            }
        }
    }

    if let Some(destroy) = destroy {
        match destroy(instance) {
            Ok(()) => debug!("event=probe_destroy module=probe status=ok instance={instance}"),
            Err(code) => {
                warn!("event=probe_destroy module=probe status=error error_code={code}");
            }
        }
    }

    outcome
}
