//! FFI smoke tests.
//!
//! These tests call the exported `extern "C"` functions directly (as an external consumer would),
//! to validate:
//! - ABI surface compiles and links
//! - allocation/free symmetry for returned buffers
//! - status codes for bad input

use std::ptr;

use mmi_fusion_ffi::*;

fn s(s: &str) -> MmiStr {
    MmiStr {
        ptr: s.as_ptr(),
        len: s.len(),
    }
}

unsafe fn read(v: MmiStr) -> String {
    let bytes = std::slice::from_raw_parts(v.ptr, v.len);
    String::from_utf8(bytes.to_vec()).unwrap()
}

const LIKE_COMPLEMENTARY: &str = r#"
    [[modality]]
    id = "TOUCH.LIKE"
    label = "[GESTURES][LIKE]"
    window_ms = 5000

    [[modality]]
    id = "VOICE.LIKE"
    label = "[VOICE][LIKE]"
    window_ms = 2000

    [[output]]
    id = "LIKE"
    label = "[FUSION][LIKE]"
    rule = "complementary:{TOUCH.LIKE,VOICE.LIKE}"
"#;

#[test]
fn ffi_version() {
    assert_eq!(mmi_fusion_ffi_version(), MMI_FUSION_FFI_VERSION);
}

#[test]
fn ffi_builtin_submit_and_free() {
    let h = mmi_fusion_new_builtin(0);
    assert!(!h.is_null());

    let arr = unsafe { mmi_fusion_submit(h, s("[GESTURES][VOLUMEU]"), 42) };
    assert_eq!(arr.rc, MMI_OK);
    assert_eq!(arr.outputs_len, 1);
    assert!(!arr.outputs_ptr.is_null());

    let o = unsafe { &*arr.outputs_ptr };
    assert_eq!(unsafe { read(o.action_id) }, "VOLUMEUP");
    assert_eq!(unsafe { read(o.wire_label) }, "[FUSION][VOLUMEU]");
    assert_eq!(o.emitted_at_ms, 42);

    unsafe { mmi_fusion_outputs_free(arr) };

    let stats = unsafe { mmi_fusion_stats(h) };
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.pending, 0);

    unsafe { mmi_fusion_free(h) };
}

#[test]
fn ffi_complementary_and_sweep() {
    let h = unsafe { mmi_fusion_new_from_toml(s(LIKE_COMPLEMENTARY), 2) };
    assert!(!h.is_null());

    let first = unsafe { mmi_fusion_submit(h, s("[GESTURES][LIKE]"), 0) };
    assert_eq!(first.rc, MMI_OK);
    assert_eq!(first.outputs_len, 0);
    unsafe { mmi_fusion_outputs_free(first) };

    // voice after touch expired: nothing fires, both wait for the sweep
    let late = unsafe { mmi_fusion_submit(h, s("[VOICE][LIKE]"), 5100) };
    assert_eq!(late.outputs_len, 0);
    unsafe { mmi_fusion_outputs_free(late) };

    assert_eq!(unsafe { mmi_fusion_sweep(h, 7099) }, 0);
    assert_eq!(unsafe { mmi_fusion_sweep(h, 7100) }, 1);
    assert_eq!(unsafe { mmi_fusion_stats(h) }.pending, 0);

    let t = unsafe { mmi_fusion_submit(h, s("TOUCH.LIKE"), 8000) };
    unsafe { mmi_fusion_outputs_free(t) };
    let v = unsafe { mmi_fusion_submit(h, s("VOICE.LIKE"), 8500) };
    assert_eq!(v.outputs_len, 1);
    let o = unsafe { &*v.outputs_ptr };
    assert_eq!(unsafe { read(o.wire_label) }, "[FUSION][LIKE]");
    assert_eq!(o.emitted_at_ms, 8500);
    unsafe { mmi_fusion_outputs_free(v) };

    unsafe { mmi_fusion_free(h) };
}

#[test]
fn ffi_error_codes() {
    let h = mmi_fusion_new_builtin(1);

    let unknown = unsafe { mmi_fusion_submit(h, s("TOUCH.UNKNOWN"), 0) };
    assert_eq!(unknown.rc, MMI_ERR_UNKNOWN_MODALITY);
    assert!(unknown.outputs_ptr.is_null());
    unsafe { mmi_fusion_outputs_free(unknown) };

    let bad = [0xffu8, 0xfe];
    let bad_utf8 = MmiStr { ptr: bad.as_ptr(), len: bad.len() };
    let arr = unsafe { mmi_fusion_submit(h, bad_utf8, 0) };
    assert_eq!(arr.rc, MMI_ERR_UTF8);

    let null = MmiStr { ptr: ptr::null(), len: 0 };
    let arr = unsafe { mmi_fusion_submit(h, null, 0) };
    assert_eq!(arr.rc, MMI_ERR_NULL);
    let arr = unsafe { mmi_fusion_submit(ptr::null_mut(), s("TOUCH.LIKE"), 0) };
    assert_eq!(arr.rc, MMI_ERR_NULL);

    assert_eq!(unsafe { mmi_fusion_stats(h) }.rejected_unknown, 1);
    unsafe { mmi_fusion_free(h) };
}

#[test]
fn ffi_invalid_catalog_yields_null() {
    let h = unsafe { mmi_fusion_new_from_toml(s("[[output]]\nid = \"X\"\nlabel = \"[X]\"\nrule = \"complementary:{NOPE}\"\n"), 1) };
    assert!(h.is_null());
    // freeing null is a no-op
    unsafe { mmi_fusion_free(h) };
}
