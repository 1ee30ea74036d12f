#![allow(clippy::missing_safety_doc)]

//! C ABI for the fusion correlator.
//!
//! Recognizers push raw events (label + instant in ms) and get back the fused
//! outputs of that call. Callers own the timeline: every entry point takes an
//! explicit instant and the library never reads a clock on its own.

use std::ptr;
use std::sync::Arc;

use tracing::warn;

use mmi_fusion_core::{ConfigError, EmittedOutput, FusionConfig, RejectedEvent, Timestamp};
use mmi_fusion_supervisor::{EventNormalizer, FusionCorrelator, RawEvent, SystemClock};

/// FFI ABI version for mmi_fusion_ffi.
///
/// Bump this when any `#[repr(C)]` struct layout or exported function signature changes.
pub const MMI_FUSION_FFI_VERSION: u32 = 1;

#[no_mangle]
pub extern "C" fn mmi_fusion_ffi_version() -> u32 {
    MMI_FUSION_FFI_VERSION
}

/// Status codes carried in `MmiOutputArray::rc`.
pub const MMI_OK: i32 = 0;
pub const MMI_ERR_NULL: i32 = -1;
pub const MMI_ERR_UTF8: i32 = -2;
pub const MMI_ERR_UNKNOWN_MODALITY: i32 = -3;

/// Opaque handle exposed over FFI.
pub struct MmiFusion {
    correlator: FusionCorrelator,
    normalizer: EventNormalizer,
}

/// FFI string view (UTF-8 bytes, not NUL-terminated).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct MmiStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl MmiStr {
    unsafe fn as_str<'a>(&self) -> Option<&'a str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = std::slice::from_raw_parts(self.ptr, self.len);
        std::str::from_utf8(bytes).ok()
    }
}

/// One fused output.
/// Note: strings point into the backing blob owned by the enclosing `MmiOutputArray`.
#[repr(C)]
pub struct MmiOutput {
    pub action_id: MmiStr,
    pub wire_label: MmiStr,
    pub emitted_at_ms: u64,
}

/// Owned array returned over FFI; free with `mmi_fusion_outputs_free`.
#[repr(C)]
pub struct MmiOutputArray {
    pub outputs_ptr: *mut MmiOutput,
    pub outputs_len: usize,

    // backing storage for strings (one blob) so the MmiStr pointers stay valid
    pub strings_ptr: *mut u8,
    pub strings_len: usize,

    pub rc: i32,
}

impl MmiOutputArray {
    fn empty(rc: i32) -> Self {
        MmiOutputArray {
            outputs_ptr: ptr::null_mut(),
            outputs_len: 0,
            strings_ptr: ptr::null_mut(),
            strings_len: 0,
            rc,
        }
    }
}

/// Counter snapshot (FFI-safe).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MmiStats {
    pub submitted: u64,
    pub rejected_unknown: u64,
    pub ignored: u64,
    pub emitted: u64,
    pub expired: u64,
    pub pending: u64,
}

fn handle_from_config(cfg: Result<FusionConfig, ConfigError>, shards: usize) -> *mut MmiFusion {
    let built = cfg.and_then(|cfg| Ok((cfg.build_catalogs()?, cfg.correlator)));
    let (catalogs, mut correlator_cfg) = match built {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "fusion catalog rejected");
            return ptr::null_mut();
        }
    };
    if shards > 0 {
        correlator_cfg.shards = shards;
    }

    let catalogs = Arc::new(catalogs);
    let handle = MmiFusion {
        correlator: FusionCorrelator::new(catalogs.clone(), &correlator_cfg, Arc::new(SystemClock::new())),
        normalizer: EventNormalizer::new(catalogs),
    };
    Box::into_raw(Box::new(handle))
}

/// Create a handle over the built-in gesture catalog.
///
/// `shards == 0` keeps the catalog's configured shard count.
#[no_mangle]
pub extern "C" fn mmi_fusion_new_builtin(shards: usize) -> *mut MmiFusion {
    handle_from_config(FusionConfig::builtin(), shards)
}

/// Create a handle from a TOML catalog document. Returns null if the document
/// does not parse or fails validation.
#[no_mangle]
pub unsafe extern "C" fn mmi_fusion_new_from_toml(toml: MmiStr, shards: usize) -> *mut MmiFusion {
    let Some(text) = toml.as_str() else {
        return ptr::null_mut();
    };
    handle_from_config(FusionConfig::from_toml_str(text), shards)
}

#[no_mangle]
pub unsafe extern "C" fn mmi_fusion_free(h: *mut MmiFusion) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

fn outputs_to_ffi(outputs: Vec<EmittedOutput>) -> MmiOutputArray {
    // Build a single backing blob for all strings.
    let mut strings: Vec<u8> = Vec::new();
    let mut offsets: Vec<((usize, usize), (usize, usize))> = Vec::with_capacity(outputs.len());
    for o in &outputs {
        let a = strings.len();
        strings.extend_from_slice(o.action_id.as_str().as_bytes());
        let l = strings.len();
        strings.extend_from_slice(o.wire_label.as_bytes());
        offsets.push(((a, l - a), (l, strings.len() - l)));
    }

    let strings_box = strings.into_boxed_slice();
    let strings_len = strings_box.len();
    let strings_ptr = Box::into_raw(strings_box) as *mut u8;

    let out: Vec<MmiOutput> = outputs
        .iter()
        .zip(offsets)
        .map(|(o, ((a_off, a_len), (l_off, l_len)))| MmiOutput {
            // SAFETY: offsets are within the blob allocated above
            action_id: MmiStr { ptr: unsafe { strings_ptr.add(a_off) }, len: a_len },
            wire_label: MmiStr { ptr: unsafe { strings_ptr.add(l_off) }, len: l_len },
            emitted_at_ms: o.emitted_at.as_millis(),
        })
        .collect();

    let out_box = out.into_boxed_slice();
    let outputs_len = out_box.len();
    let outputs_ptr = Box::into_raw(out_box) as *mut MmiOutput;

    MmiOutputArray {
        outputs_ptr,
        outputs_len,
        strings_ptr,
        strings_len,
        rc: MMI_OK,
    }
}

/// Submit one raw event observed at `at_ms`. Returns the outputs fused by this
/// call (possibly none) with `rc == MMI_OK`, or an empty array with a negative
/// `rc`. Always free the result with `mmi_fusion_outputs_free`.
#[no_mangle]
pub unsafe extern "C" fn mmi_fusion_submit(h: *mut MmiFusion, label: MmiStr, at_ms: u64) -> MmiOutputArray {
    if h.is_null() || label.ptr.is_null() {
        return MmiOutputArray::empty(MMI_ERR_NULL);
    }
    let Some(label) = label.as_str() else {
        return MmiOutputArray::empty(MMI_ERR_UTF8);
    };

    let handle = &*h;
    let at = Timestamp::from_millis(at_ms);
    let raw = RawEvent::new(label, at);

    match handle.correlator.submit_at(&handle.normalizer, &raw, at) {
        Ok(outputs) => outputs_to_ffi(outputs),
        Err(RejectedEvent::UnknownModality(_)) => MmiOutputArray::empty(MMI_ERR_UNKNOWN_MODALITY),
    }
}

#[no_mangle]
pub unsafe extern "C" fn mmi_fusion_outputs_free(arr: MmiOutputArray) {
    if !arr.outputs_ptr.is_null() {
        let slice_ptr = ptr::slice_from_raw_parts_mut(arr.outputs_ptr, arr.outputs_len);
        drop(Box::from_raw(slice_ptr));
    }
    if !arr.strings_ptr.is_null() {
        let slice_ptr = ptr::slice_from_raw_parts_mut(arr.strings_ptr, arr.strings_len);
        drop(Box::from_raw(slice_ptr));
    }
}

/// Expire everything whose window closed by `now_ms`. Returns the number of
/// evidence entries removed (0 for a null handle).
#[no_mangle]
pub unsafe extern "C" fn mmi_fusion_sweep(h: *mut MmiFusion, now_ms: u64) -> u64 {
    if h.is_null() {
        return 0;
    }
    let handle = &*h;
    handle.correlator.sweep_at(Timestamp::from_millis(now_ms)).expired as u64
}

#[no_mangle]
pub unsafe extern "C" fn mmi_fusion_stats(h: *mut MmiFusion) -> MmiStats {
    if h.is_null() {
        return MmiStats::default();
    }
    let handle = &*h;
    let s = handle.correlator.stats();
    MmiStats {
        submitted: s.submitted,
        rejected_unknown: s.rejected_unknown,
        ignored: s.ignored,
        emitted: s.emitted,
        expired: s.expired,
        pending: handle.correlator.pending_total() as u64,
    }
}
