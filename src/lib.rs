// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.7
// Date Modified: 2026-06-30
// Author: Lukas Bower

//! cohjit — in-memory C compile-load-execute for bare-metal targets.
//!
//! Loads C source text at run time, drives an external compiler service to
//! translate it into machine code inside a fixed-capacity arena, binds the
//! host's native symbols, synchronises caches, and jumps into the result.
//! No OS, no filesystem, no general-purpose heap.

/// Fixed-capacity bump arena standing in for malloc/realloc/free.
pub mod arena;

/// Contract of the external compiler service, plus the scripted stand-in.
pub mod compiler;

/// The compile-load-execute state machine.
pub mod pipeline;

/// Process-environment shims, cache maintenance and delays.
pub mod platform;

/// Program-text acquisition with built-in default fallback.
pub mod source;

/// Host symbols callable from compiled programs.
pub mod symbols;

/// Adapter over a linked libtcc build.
#[cfg(feature = "libtcc")]
pub mod tcc;

/// Compile and run `source_text` once with hosted defaults: baseline
/// symbols, the scripted backend, and an arena of `arena_bytes`.
#[cfg(all(feature = "stub-compiler", not(target_os = "none")))]
pub fn run_hosted(source_text: &str, arg: i32, arena_bytes: usize) -> pipeline::SessionReport {
    let mut pipe = pipeline::Pipeline::new(
        arena::MemoryArena::new(arena_bytes),
        symbols::HostSymbolTable::baseline(),
        platform::hosted::HostedPlatform::new(),
        Box::new(compiler::stub::StubCompiler::new()),
    );
    let source = source::ProgramSource {
        text: source_text.to_string(),
        origin: source::SourceOrigin::Resource,
    };
    pipe.run(&source, arg)
}
