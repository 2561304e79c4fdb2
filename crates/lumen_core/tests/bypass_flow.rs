//! Bypass behavior: denylisted engines, user-set store flags, and
//! pass-through proc-address resolution.

mod common;

use common::{request, Harness};
use lumen_core::bypass::{BYPASS_KEY, MODULE_KEY};
use lumen_core::{create_api_layer_instance, get_instance_proc_addr, OverrideStore, ProcAddr};

#[test]
fn denylisted_engine_is_bypassed_without_a_session() {
    let mut harness = Harness::new();
    let layer_info = harness.layer_info(&[]);
    let request = request("BrowserShell", "Chromium", &["XR_KHR_visibility_mask"]);

    let instance = create_api_layer_instance(&mut harness.ctx, &request, &layer_info)
        .expect("bypassed create succeeds");

    assert!(harness.ctx.is_bypassing());
    assert!(!harness.ctx.has_session());
    // The feature layer never saw the call.
    assert!(harness.feature_state().create_requests.is_empty());

    let state = harness.runtime.state();
    // Exactly one create, forwarded unmodified. No probe.
    assert_eq!(state.create_requests.len(), 1);
    assert_eq!(
        state.create_requests[0].enabled_extensions,
        vec!["XR_KHR_visibility_mask".to_string()]
    );
    assert_eq!(state.live, vec![instance]);
}

#[test]
fn user_set_store_flag_bypasses_any_engine() {
    let mut harness = Harness::new();
    harness
        .store
        .set_flag("Sim", BYPASS_KEY, 1)
        .expect("set bypass flag");
    let layer_info = harness.layer_info(&[]);
    let request = request("Sim", "Unity", &[]);

    create_api_layer_instance(&mut harness.ctx, &request, &layer_info)
        .expect("bypassed create succeeds");

    assert!(harness.ctx.is_bypassing());
    assert!(!harness.ctx.has_session());
    assert_eq!(harness.runtime.state().create_requests.len(), 1);
}

#[test]
fn bypass_proc_addr_answers_from_the_captured_resolver() {
    let mut harness = Harness::new();
    let layer_info = harness.layer_info(&[]);
    let request = request("BrowserShell", "Chromium", &[]);

    let instance = create_api_layer_instance(&mut harness.ctx, &request, &layer_info)
        .expect("bypassed create succeeds");

    // The answer is exactly what the original resolver would have given.
    let addr = get_instance_proc_addr(&mut harness.ctx, instance, "xrEndFrame")
        .expect("pass-through resolution");
    let direct = harness.runtime.get_proc_fn()(instance, "xrEndFrame").expect("direct resolution");
    assert_eq!(addr, direct);
    assert_eq!(
        addr,
        ProcAddr::Opaque {
            name: "host:xrEndFrame".to_string()
        }
    );
}

#[test]
fn module_path_is_recorded_even_when_bypassed() {
    let mut harness = Harness::new();
    let layer_info = harness.layer_info(&[]);
    let request = request("BrowserShell", "Chromium", &[]);

    create_api_layer_instance(&mut harness.ctx, &request, &layer_info)
        .expect("bypassed create succeeds");

    let module = harness
        .store
        .get_string("BrowserShell", MODULE_KEY)
        .expect("read module")
        .expect("module path recorded");
    assert!(!module.is_empty());
}
