// CLASSIFICATION: COMMUNITY
// Filename: shims.rs · C-ABI path shims v0.2
// Author: Lukas Bower
// Date Modified: 2026-07-19

//! C-ABI `realpath`/`getcwd` exports libtcc links against on bare metal.
//!
//! There is no filesystem to resolve against, so `realpath` hands back a
//! bounded copy of its input and `getcwd` reports the fixed root. Bare
//! metal only: on a hosted target these would collide with libc.

use core::ffi::{c_char, c_ulong};
use core::ptr;

use crate::platform::WORKING_DIR;

const PATH_MAX: usize = 128;

static mut REALPATH_BUF: [u8; 256] = [0; 256];
static mut GETCWD_BUF: [u8; 64] = [0; 64];

unsafe fn c_str_len(p: *const c_char) -> usize {
    let mut n = 0usize;
    while *p.add(n) != 0 {
        n += 1;
    }
    n
}

unsafe fn bounded_copy(src: *const c_char, dst: *mut u8, cap: usize) {
    let n = c_str_len(src).min(cap - 1);
    ptr::copy_nonoverlapping(src as *const u8, dst, n);
    *dst.add(n) = 0;
}

/// Null input is rejected with a null return; any other path comes back
/// verbatim, truncated to the destination bound.
#[no_mangle]
pub unsafe extern "C" fn realpath(path: *const c_char, resolved: *mut c_char) -> *mut c_char {
    if path.is_null() {
        return ptr::null_mut();
    }
    if resolved.is_null() {
        let buf = ptr::addr_of_mut!(REALPATH_BUF) as *mut u8;
        bounded_copy(path, buf, 256);
        return buf as *mut c_char;
    }
    bounded_copy(path, resolved as *mut u8, PATH_MAX);
    resolved
}

/// Fixed working directory; errors with null rather than overflowing a
/// too-small caller buffer.
#[no_mangle]
pub unsafe extern "C" fn getcwd(buf: *mut c_char, size: c_ulong) -> *mut c_char {
    let cwd = WORKING_DIR.as_bytes();
    if buf.is_null() {
        let out = ptr::addr_of_mut!(GETCWD_BUF) as *mut u8;
        ptr::copy_nonoverlapping(cwd.as_ptr(), out, cwd.len());
        *out.add(cwd.len()) = 0;
        return out as *mut c_char;
    }
    if (size as usize) <= cwd.len() {
        return ptr::null_mut();
    }
    ptr::copy_nonoverlapping(cwd.as_ptr(), buf as *mut u8, cwd.len());
    *buf.add(cwd.len()) = 0;
    buf
}
