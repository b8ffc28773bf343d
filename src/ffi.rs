//! FFI bindings for Synheart Neuro
//!
//! C-compatible functions for driving the signal pipeline from other languages.
//! Inputs and outputs are JSON in null-terminated C strings. Every returned
//! string is allocated here and must be released with `neuro_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::catalog::AdaptationCatalog;
use crate::config::PipelineConfig;
use crate::error::NeuroError;
use crate::pipeline::NeuroProcessor;
use crate::selector::AdaptationSelector;
use crate::types::{MetricVector, Sample};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize `value`, or record the error and return NULL
fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&NeuroError::from(e).to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Rank the default catalog against a metric vector.
///
/// `metrics_json` is an object with all eight metric fields; values are
/// clamped to [0, 1]. Returns a JSON array of `{id, score}`, best first.
///
/// # Safety
/// - `metrics_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `neuro_free_string`.
/// - Returns NULL on error; call `neuro_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn neuro_rank_metrics(metrics_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(metrics_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid metrics string pointer");
            return ptr::null_mut();
        }
    };

    let parsed: MetricVector = match serde_json::from_str(&json_str) {
        Ok(v) => v,
        Err(e) => {
            set_last_error(&NeuroError::from(e).to_string());
            return ptr::null_mut();
        }
    };
    let metrics = MetricVector::from_fn(|m| parsed.get(m));

    let ranking = AdaptationSelector::default().rank(&metrics, &AdaptationCatalog::default());
    json_to_cstr(&ranking)
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a NeuroProcessor
pub struct NeuroProcessorHandle {
    processor: NeuroProcessor,
}

/// Create a processor.
///
/// `config_json` may be NULL for the default configuration; otherwise it is
/// a `PipelineConfig` object where omitted fields take their defaults.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `neuro_processor_free`.
/// - Returns NULL on an invalid configuration.
#[no_mangle]
pub unsafe extern "C" fn neuro_processor_new(
    config_json: *const c_char,
) -> *mut NeuroProcessorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        PipelineConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match PipelineConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match NeuroProcessor::with_config(config) {
        Ok(processor) => Box::into_raw(Box::new(NeuroProcessorHandle { processor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `neuro_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn neuro_processor_free(processor: *mut NeuroProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Run one sample through the processor and return the resulting frame.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `neuro_processor_new`.
/// - `sample_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `neuro_free_string`.
/// - Returns NULL on error; call `neuro_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn neuro_processor_process(
    processor: *mut NeuroProcessorHandle,
    sample_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(sample_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid sample string pointer");
            return ptr::null_mut();
        }
    };

    let sample: Sample = match serde_json::from_str(&json_str) {
        Ok(sample) => sample,
        Err(e) => {
            set_last_error(&NeuroError::from(e).to_string());
            return ptr::null_mut();
        }
    };

    let frame = handle.processor.process(&sample);
    json_to_cstr(&frame)
}

/// Current smoothed metrics as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `neuro_processor_new`.
/// - Returns a newly allocated string that must be freed with `neuro_free_string`.
#[no_mangle]
pub unsafe extern "C" fn neuro_processor_metrics(
    processor: *const NeuroProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    json_to_cstr(&(*processor).processor.current_metrics())
}

/// Current adaptation profile as JSON (`null` when none is active).
///
/// # Safety
/// - `processor` must be a valid pointer returned by `neuro_processor_new`.
/// - Returns a newly allocated string that must be freed with `neuro_free_string`.
#[no_mangle]
pub unsafe extern "C" fn neuro_processor_adaptation(
    processor: *const NeuroProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    json_to_cstr(&(*processor).processor.current_adaptation())
}

/// Adaptation history, oldest first, as a JSON array.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `neuro_processor_new`.
/// - Returns a newly allocated string that must be freed with `neuro_free_string`.
#[no_mangle]
pub unsafe extern "C" fn neuro_processor_history(
    processor: *const NeuroProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    json_to_cstr(&(*processor).processor.history().snapshot())
}

/// Report adaptation effectiveness (0-1) for a profile.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `neuro_processor_new`.
/// - `profile_id` must be a valid null-terminated C string.
/// - Returns 0 when the confidence was updated, 1 when the feedback was
///   ignored (unknown id or NaN), and -1 on a bad argument.
#[no_mangle]
pub unsafe extern "C" fn neuro_processor_feedback(
    processor: *mut NeuroProcessorHandle,
    profile_id: *const c_char,
    effectiveness: f64,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let id = match cstr_to_string(profile_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid profile id string pointer");
            return -1;
        }
    };

    match handle.processor.provide_feedback(&id, effectiveness) {
        Some(_) => 0,
        None => 1,
    }
}

/// Drop all signal state (filters, power windows, smoothing). Catalog
/// confidences and history are kept.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `neuro_processor_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn neuro_processor_reset(processor: *mut NeuroProcessorHandle) {
    if !processor.is_null() {
        (*processor).processor.reset_signal_state();
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a `neuro_*` function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a `neuro_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn neuro_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The pointer is valid until the next `neuro_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn neuro_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn neuro_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
