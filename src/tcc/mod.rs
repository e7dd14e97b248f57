// CLASSIFICATION: COMMUNITY
// Filename: mod.rs · libtcc adapter v0.5
// Author: Lukas Bower
// Date Modified: 2026-07-19

//! Adapter binding the [`crate::compiler`] contract to a real libtcc build.
//!
//! The service's global reallocate-shaped allocation hook is bridged onto
//! the session's [`MemoryArena`]: null pointer in means allocate, size zero
//! means release, anything else is grow-and-copy. Exactly one session is
//! live at a time, so routing the global hook through a thread-local slot
//! is sound.

pub mod ffi;
#[cfg(feature = "ffi-shims")]
pub mod shims;

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_ulong, c_void};
use std::ptr::NonNull;
use std::rc::Rc;

use log::{debug, warn};

use crate::arena::MemoryArena;
use crate::compiler::{
    CompilerBackend, CompilerSession, DiagnosticSink, ServiceError, SessionError,
};
use ffi::{TCCState, TCC_OUTPUT_MEMORY};

thread_local! {
    // Arena currently backing the global tcc_set_realloc hook.
    static ARENA_SLOT: RefCell<Option<Rc<RefCell<MemoryArena>>>> = const { RefCell::new(None) };
}

/// Global allocation hook installed into libtcc.
extern "C" fn arena_realloc(ptr: *mut c_void, size: c_ulong) -> *mut c_void {
    ARENA_SLOT.with(|slot| {
        let slot = slot.borrow();
        let Some(arena) = slot.as_ref() else {
            warn!("tcc: allocation request with no arena installed");
            return core::ptr::null_mut();
        };
        let old = NonNull::new(ptr as *mut u8);
        match arena.borrow_mut().reallocate(old, size as usize) {
            Ok(Some(p)) => p.as_ptr() as *mut c_void,
            Ok(None) => core::ptr::null_mut(),
            Err(e) => {
                warn!("tcc: {e}");
                core::ptr::null_mut()
            }
        }
    })
}

struct SinkCtx {
    sink: DiagnosticSink,
}

extern "C" fn on_error(opaque: *mut c_void, msg: *const c_char) {
    if opaque.is_null() || msg.is_null() {
        return;
    }
    let ctx = unsafe { &mut *(opaque as *mut SinkCtx) };
    let text = unsafe { CStr::from_ptr(msg) }.to_string_lossy();
    (ctx.sink)(&text);
}

/// Backend producing sessions over a linked libtcc.
#[derive(Default)]
pub struct TccBackend;

impl TccBackend {
    pub fn new() -> Self {
        TccBackend
    }
}

impl CompilerBackend for TccBackend {
    fn create_session(&mut self) -> Result<Box<dyn CompilerSession>, ServiceError> {
        let state = unsafe { ffi::tcc_new() };
        if state.is_null() {
            return Err(ServiceError::CreateFailed);
        }
        debug!("tcc: session created");
        Ok(Box::new(TccSession {
            state,
            sink_ctx: None,
        }))
    }
}

struct TccSession {
    state: *mut TCCState,
    // Boxed so the opaque pointer handed to libtcc stays stable.
    sink_ctx: Option<Box<SinkCtx>>,
}

impl CompilerSession for TccSession {
    fn set_allocator(&mut self, arena: Rc<RefCell<MemoryArena>>) {
        ARENA_SLOT.with(|slot| *slot.borrow_mut() = Some(arena));
        unsafe { ffi::tcc_set_realloc(arena_realloc) };
    }

    fn set_diagnostic_sink(&mut self, sink: DiagnosticSink) {
        let mut ctx = Box::new(SinkCtx { sink });
        let raw = &mut *ctx as *mut SinkCtx as *mut c_void;
        unsafe { ffi::tcc_set_error_func(self.state, raw, on_error) };
        self.sink_ctx = Some(ctx);
    }

    fn set_output_memory(&mut self) {
        unsafe { ffi::tcc_set_output_type(self.state, TCC_OUTPUT_MEMORY) };
    }

    fn compile(&mut self, source: &str) -> Result<(), SessionError> {
        let c_src = CString::new(source).map_err(|_| {
            if let Some(ctx) = &mut self.sink_ctx {
                (ctx.sink)("source text contains an interior NUL byte");
            }
            SessionError::Compile
        })?;
        let rc = unsafe { ffi::tcc_compile_string(self.state, c_src.as_ptr()) };
        if rc == -1 {
            return Err(SessionError::Compile);
        }
        Ok(())
    }

    fn add_symbol(&mut self, name: &str, addr: usize) {
        let Ok(c_name) = CString::new(name) else {
            warn!("tcc: skipping symbol with interior NUL: {name:?}");
            return;
        };
        unsafe { ffi::tcc_add_symbol(self.state, c_name.as_ptr(), addr as *const c_void) };
    }

    fn relocate(&mut self) -> Result<(), SessionError> {
        let rc = unsafe { ffi::tcc_relocate(self.state) };
        if rc < 0 {
            return Err(SessionError::Relocate);
        }
        Ok(())
    }

    fn resolve(&mut self, name: &str) -> Option<usize> {
        let c_name = CString::new(name).ok()?;
        let addr = unsafe { ffi::tcc_get_symbol(self.state, c_name.as_ptr()) };
        NonNull::new(addr).map(|p| p.as_ptr() as usize)
    }
}

impl Drop for TccSession {
    fn drop(&mut self) {
        unsafe { ffi::tcc_delete(self.state) };
        ARENA_SLOT.with(|slot| *slot.borrow_mut() = None);
        debug!("tcc: session released");
    }
}
