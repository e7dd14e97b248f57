// CLASSIFICATION: COMMUNITY
// Filename: mod.rs · compiler contract v0.4
// Author: Lukas Bower
// Date Modified: 2026-03-28

//! Contract of the external compiler service, as consumed by the pipeline.
//!
//! The service itself is an opaque collaborator: it lexes, parses and
//! generates code on its own; this crate only drives it through the surface
//! below. Two backends exist: the feature-gated [`crate::tcc`] adapter over
//! a real libtcc build, and the scripted [`stub::StubCompiler`] used for
//! hosted demos and tests.

#[cfg(feature = "stub-compiler")]
pub mod stub;

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::arena::MemoryArena;

/// Callback receiving every diagnostic line the service reports.
pub type DiagnosticSink = Box<dyn FnMut(&str)>;

/// Session creation failure: the service could not even set itself up.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("compiler service session could not be created")]
    CreateFailed,
}

/// Failures reported by a live session. Human-readable detail arrives
/// through the diagnostic sink, not through these values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("compilation failed")]
    Compile,
    #[error("relocation failed")]
    Relocate,
}

/// Factory for compiler-service sessions; one session per load attempt.
pub trait CompilerBackend {
    fn create_session(&mut self) -> Result<Box<dyn CompilerSession>, ServiceError>;
}

/// One compiler-service session. Dropping it releases the service handle.
///
/// Call order is the pipeline's responsibility: configuration
/// (`set_allocator`, `set_diagnostic_sink`, `set_output_memory`) strictly
/// before `compile`, symbol registration before `relocate`, `resolve` only
/// after a successful `relocate`.
pub trait CompilerSession {
    /// Install the arena as the session's allocation backend. Every
    /// internal allocation the service makes goes through it.
    fn set_allocator(&mut self, arena: Rc<RefCell<MemoryArena>>);

    /// Install the callback receiving error/warning text.
    fn set_diagnostic_sink(&mut self, sink: DiagnosticSink);

    /// Declare in-memory output. Must precede `compile`.
    fn set_output_memory(&mut self);

    /// Submit source text. Diagnostics explaining a failure have already
    /// been delivered through the sink when this returns `Err`.
    fn compile(&mut self, source: &str) -> Result<(), SessionError>;

    /// Make a native symbol visible to relocation.
    fn add_symbol(&mut self, name: &str, addr: usize);

    /// Link the compiled output into final addresses inside the arena.
    fn relocate(&mut self) -> Result<(), SessionError>;

    /// Resolve a symbol in the relocated image to a native address.
    fn resolve(&mut self, name: &str) -> Option<usize>;
}
