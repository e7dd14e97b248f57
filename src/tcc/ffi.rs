// CLASSIFICATION: COMMUNITY
// Filename: ffi.rs · libtcc bindings v0.2
// Author: Lukas Bower
// Date Modified: 2026-07-07

//! Raw bindings to the libtcc surface this crate consumes. Link against a
//! libtcc built for the target (TCC_TARGET_ARM on the reference board).

#![allow(non_camel_case_types)]

use core::ffi::{c_char, c_int, c_ulong, c_void};

/// Opaque compiler state handle.
#[repr(C)]
pub struct TCCState {
    _private: [u8; 0],
}

/// Output goes to memory, not to a file.
pub const TCC_OUTPUT_MEMORY: c_int = 1;

pub type TCCErrorFunc = extern "C" fn(opaque: *mut c_void, msg: *const c_char);
pub type TCCReallocFunc = extern "C" fn(ptr: *mut c_void, size: c_ulong) -> *mut c_void;

extern "C" {
    pub fn tcc_new() -> *mut TCCState;
    pub fn tcc_delete(s: *mut TCCState);
    pub fn tcc_set_error_func(s: *mut TCCState, opaque: *mut c_void, func: TCCErrorFunc);
    pub fn tcc_set_realloc(realloc: TCCReallocFunc);
    pub fn tcc_set_output_type(s: *mut TCCState, output_type: c_int) -> c_int;
    pub fn tcc_compile_string(s: *mut TCCState, buf: *const c_char) -> c_int;
    pub fn tcc_add_symbol(s: *mut TCCState, name: *const c_char, val: *const c_void) -> c_int;
    pub fn tcc_relocate(s: *mut TCCState) -> c_int;
    pub fn tcc_get_symbol(s: *mut TCCState, name: *const c_char) -> *mut c_void;
}
