//! Shared fakes for exercising the bootstrap pipeline end to end.

#![allow(dead_code)]

use lumen_core::chain::{CreateInstanceFn, GetProcFn};
use lumen_core::feature::{FeatureError, FeatureLayer, FeatureResult};
use lumen_core::{
    ApiLayerCreateInfo, ApplicationInfo, CompiledWorkarounds, InstanceCreateInfo, InstanceHandle,
    LayerContext, NextChainRecord, ProcAddr, RuntimeCode, SqliteOverrideStore, SystemId,
    SystemProperties,
};
use std::sync::{Arc, Mutex, MutexGuard};

/// Observable state of the fake runtime at the end of the chain.
pub struct RuntimeState {
    pub next_handle: u64,
    pub create_requests: Vec<InstanceCreateInfo>,
    pub live: Vec<InstanceHandle>,
    pub destroyed: Vec<InstanceHandle>,
    pub advertised_extensions: Vec<String>,
    pub system_name: String,
    pub fail_creates_remaining: u32,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            next_handle: 0,
            create_requests: Vec::new(),
            live: Vec::new(),
            destroyed: Vec::new(),
            advertised_extensions: Vec::new(),
            system_name: "Acme HMD".to_string(),
            fail_creates_remaining: 0,
        }
    }
}

/// Terminal runtime fake; every chain record in the tests forwards into it.
#[derive(Clone)]
pub struct FakeRuntime {
    state: Arc<Mutex<RuntimeState>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RuntimeState::default())),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().expect("runtime state lock")
    }

    pub fn create_fn(&self) -> CreateInstanceFn {
        let state = Arc::clone(&self.state);
        Arc::new(move |request, _cursor| {
            let mut state = state.lock().expect("runtime state lock");
            if state.fail_creates_remaining > 0 {
                state.fail_creates_remaining -= 1;
                return Err(RuntimeCode::RuntimeFailure);
            }
            state.next_handle += 1;
            let handle = InstanceHandle(state.next_handle);
            state.create_requests.push(request.clone());
            state.live.push(handle);
            Ok(handle)
        })
    }

    pub fn get_proc_fn(&self) -> GetProcFn {
        let state = Arc::clone(&self.state);
        Arc::new(move |_instance, name| match name {
            "xrEnumerateInstanceExtensionProperties" => {
                let state = Arc::clone(&state);
                Ok(ProcAddr::EnumerateExtensions(Arc::new(move |_| {
                    Ok(state
                        .lock()
                        .expect("runtime state lock")
                        .advertised_extensions
                        .clone())
                })))
            }
            "xrGetSystem" => Ok(ProcAddr::GetSystem(Arc::new(|_, _| Ok(SystemId(1))))),
            "xrGetSystemProperties" => {
                let state = Arc::clone(&state);
                Ok(ProcAddr::GetSystemProperties(Arc::new(move |_, _| {
                    Ok(SystemProperties {
                        system_name: state.lock().expect("runtime state lock").system_name.clone(),
                        vendor_id: 0x1209,
                    })
                })))
            }
            "xrDestroyInstance" => {
                let state = Arc::clone(&state);
                Ok(ProcAddr::DestroyInstance(Arc::new(move |instance| {
                    let mut state = state.lock().expect("runtime state lock");
                    state.live.retain(|live| *live != instance);
                    state.destroyed.push(instance);
                    Ok(())
                })))
            }
            other => Ok(ProcAddr::Opaque {
                name: format!("host:{other}"),
            }),
        })
    }

    pub fn record(&self, layer_name: &str) -> NextChainRecord {
        NextChainRecord::new(layer_name, self.get_proc_fn(), self.create_fn())
    }
}

/// Observable state of the fake feature layer.
#[derive(Default)]
pub struct FeatureState {
    pub resolver_instance: Option<InstanceHandle>,
    pub upstream_layers: Vec<String>,
    pub create_requests: Vec<InstanceCreateInfo>,
    pub destroy_calls: Vec<InstanceHandle>,
    pub create_result: Option<FeatureError>,
    pub destroy_result: Option<FeatureError>,
    pub proc_result: Option<FeatureError>,
}

pub struct FakeFeature {
    state: Arc<Mutex<FeatureState>>,
}

impl FeatureLayer for FakeFeature {
    fn set_instance_resolver(&mut self, _resolver: GetProcFn, instance: InstanceHandle) {
        self.state.lock().expect("feature state lock").resolver_instance = Some(instance);
    }

    fn set_upstream_layers(&mut self, layers: Vec<String>) {
        self.state.lock().expect("feature state lock").upstream_layers = layers;
    }

    fn create_instance(&mut self, request: &InstanceCreateInfo) -> FeatureResult<()> {
        let mut state = self.state.lock().expect("feature state lock");
        state.create_requests.push(request.clone());
        match &state.create_result {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn destroy_instance(&mut self, instance: InstanceHandle) -> FeatureResult<()> {
        let mut state = self.state.lock().expect("feature state lock");
        state.destroy_calls.push(instance);
        match &state.destroy_result {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn get_instance_proc_addr(
        &mut self,
        _instance: InstanceHandle,
        name: &str,
    ) -> FeatureResult<ProcAddr> {
        let state = self.state.lock().expect("feature state lock");
        match &state.proc_result {
            Some(err) => Err(err.clone()),
            None => Ok(ProcAddr::Opaque {
                name: format!("feature:{name}"),
            }),
        }
    }
}

/// Everything one end-to-end test needs, wired together.
pub struct Harness {
    pub runtime: FakeRuntime,
    pub feature: Arc<Mutex<FeatureState>>,
    pub store: Arc<SqliteOverrideStore>,
    pub ctx: LayerContext,
}

impl Harness {
    pub fn new() -> Self {
        let runtime = FakeRuntime::new();
        let feature = Arc::new(Mutex::new(FeatureState::default()));
        let store =
            Arc::new(SqliteOverrideStore::open_in_memory().expect("in-memory override store"));

        let factory_state = Arc::clone(&feature);
        let ctx = LayerContext::new(
            CompiledWorkarounds::default(),
            Arc::clone(&store) as Arc<dyn lumen_core::OverrideStore>,
            Box::new(move || {
                Box::new(FakeFeature {
                    state: Arc::clone(&factory_state),
                })
            }),
        );

        Self {
            runtime,
            feature,
            store,
            ctx,
        }
    }

    pub fn feature_state(&self) -> MutexGuard<'_, FeatureState> {
        self.feature.lock().expect("feature state lock")
    }

    /// Layer-info record with this layer at the head and the named layers
    /// chained after it, all forwarding into the fake runtime.
    pub fn layer_info(&self, upstream: &[&str]) -> ApiLayerCreateInfo {
        let mut records = vec![self.runtime.record(lumen_core::LAYER_NAME)];
        for name in upstream {
            records.push(self.runtime.record(name));
        }
        ApiLayerCreateInfo::new(records)
    }
}

pub fn request(application: &str, engine: &str, extensions: &[&str]) -> InstanceCreateInfo {
    InstanceCreateInfo {
        application_info: ApplicationInfo {
            application_name: application.to_string(),
            application_version: 1,
            engine_name: engine.to_string(),
            engine_version: 3,
        },
        enabled_api_layers: Vec::new(),
        enabled_extensions: extensions.iter().map(|name| name.to_string()).collect(),
    }
}
