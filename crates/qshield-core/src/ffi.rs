//! C ABI for the presentation surface.
//!
//! Engines are handed out as opaque boxed pointers. State travels back as
//! JSON strings which the caller must release with [`qshield_free_string`].
//! Null pointers are ignored.

use crate::config::{DemoAssets, EngineConfig};
use crate::engine::ThreatStateEngine;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_longlong};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservationResult {
    pub new_anomaly_score: c_double,
    pub alert_emitted: bool,
    /// 0 = calm, 1 = monitoring, 2 = under attack
    pub status: u8,
}

fn to_c_string(json: String) -> *mut c_char {
    CString::new(json)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}

fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

#[unsafe(no_mangle)]
pub extern "C" fn qshield_engine_new() -> *mut ThreatStateEngine {
    Box::into_raw(Box::new(ThreatStateEngine::default()))
}

/// Create an engine from a JSON `EngineConfig`. Falls back to defaults on bad input.
#[unsafe(no_mangle)]
pub extern "C" fn qshield_engine_with_config(config_json: *const c_char) -> *mut ThreatStateEngine {
    let config = opt_str(config_json)
        .and_then(|s| EngineConfig::from_json_str(s).ok())
        .unwrap_or_default();
    Box::into_raw(Box::new(ThreatStateEngine::new(config)))
}

#[unsafe(no_mangle)]
pub extern "C" fn qshield_engine_free(ptr: *mut ThreatStateEngine) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let _ = Box::from_raw(ptr);
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn qshield_observe_sample(
    ptr: *mut ThreatStateEngine,
    sample: c_double,
    out_result: *mut ObservationResult,
) {
    if ptr.is_null() || out_result.is_null() {
        return;
    }
    let engine = unsafe { &mut *ptr };
    let obs = engine.observe_error_rate_sample(sample);
    let result = ObservationResult {
        new_anomaly_score: obs.new_anomaly_score,
        alert_emitted: obs.alert_emitted,
        status: engine.status() as u8,
    };
    unsafe {
        *out_result = result;
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn qshield_trigger_anomaly(ptr: *mut ThreatStateEngine) -> *mut c_char {
    if ptr.is_null() {
        return std::ptr::null_mut();
    }
    let engine = unsafe { &mut *ptr };
    engine.trigger_anomaly();
    to_c_string(engine.snapshot_json())
}

#[unsafe(no_mangle)]
pub extern "C" fn qshield_simulate_eavesdropping(ptr: *mut ThreatStateEngine) -> *mut c_char {
    if ptr.is_null() {
        return std::ptr::null_mut();
    }
    let engine = unsafe { &mut *ptr };
    engine.simulate_eavesdropping();
    to_c_string(engine.snapshot_json())
}

#[unsafe(no_mangle)]
pub extern "C" fn qshield_reset(ptr: *mut ThreatStateEngine) -> *mut c_char {
    if ptr.is_null() {
        return std::ptr::null_mut();
    }
    let engine = unsafe { &mut *ptr };
    engine.reset();
    to_c_string(engine.snapshot_json())
}

/// Returns the outcome as JSON, or `{"error": ...}` for an invalid pair count.
#[unsafe(no_mangle)]
pub extern "C" fn qshield_start_key_exchange(
    ptr: *mut ThreatStateEngine,
    pair_count: c_longlong,
) -> *mut c_char {
    if ptr.is_null() {
        return std::ptr::null_mut();
    }
    let engine = unsafe { &mut *ptr };
    let json = match engine.start_key_exchange(pair_count) {
        Ok(outcome) => serde_json::to_string(&outcome).unwrap_or_else(|_| "{}".to_string()),
        Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
    };
    to_c_string(json)
}

#[unsafe(no_mangle)]
pub extern "C" fn qshield_snapshot(ptr: *const ThreatStateEngine) -> *mut c_char {
    if ptr.is_null() {
        return std::ptr::null_mut();
    }
    let engine = unsafe { &*ptr };
    to_c_string(engine.snapshot_json())
}

/// Merge override documents into the engine's assets. Either pointer may be null.
/// Returns a bitmask: 1 = RSA applied, 2 = profiles applied.
#[unsafe(no_mangle)]
pub extern "C" fn qshield_load_assets(
    ptr: *mut ThreatStateEngine,
    rsa_json: *const c_char,
    profiles_json: *const c_char,
) -> u8 {
    if ptr.is_null() {
        return 0;
    }
    let engine = unsafe { &mut *ptr };
    let mut assets: DemoAssets = engine.assets().clone();
    let report = assets.apply_overrides(opt_str(rsa_json), opt_str(profiles_json), engine.config());
    engine.replace_assets(assets);
    (report.rsa_applied as u8) | ((report.profiles_applied as u8) << 1)
}

#[unsafe(no_mangle)]
pub extern "C" fn qshield_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(s);
    }
}
