// CLASSIFICATION: COMMUNITY
// Filename: pipeline.rs v0.8
// Author: Lukas Bower
// Date Modified: 2026-06-30

//! Compile-load-execute state machine.
//!
//! One [`Pipeline`] drives one load session at a time through the strict
//! forward order
//!
//! `Idle → ArenaReady → ServiceCreated → ServiceConfigured → Compiled →
//! SymbolsBound → Relocated → CacheSynced → Executed → Done`
//!
//! with `Failed` reachable from `ServiceCreated` onward. Every failure path
//! still releases the compiler-service handle before reporting. The cache
//! sync ahead of the entry jump is mandatory: on split-cache parts the
//! processor would otherwise fetch stale instructions from the region the
//! service just wrote.

use std::cell::RefCell;
use std::rc::Rc;

use log::{error, info};
use thiserror::Error;

use crate::arena::MemoryArena;
use crate::compiler::CompilerBackend;
use crate::platform::Platform;
use crate::source::ProgramSource;
use crate::symbols::HostSymbolTable;

/// Symbol the compiled program designates as its start.
pub const DEFAULT_ENTRY_SYMBOL: &str = "main";

/// Pipeline states, in strict forward order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    ArenaReady,
    ServiceCreated,
    ServiceConfigured,
    Compiled,
    SymbolsBound,
    Relocated,
    CacheSynced,
    Executed,
    Done,
    Failed,
}

/// Session-fatal failures. None of these crash the process; a later
/// session is an independent attempt after a fresh arena reset.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("compiler service creation failed")]
    ServiceCreation,
    #[error("compilation failed")]
    Compilation,
    #[error("relocation failed")]
    Relocation,
    #[error("entry point '{0}' missing from relocated image")]
    EntryPointMissing(String),
}

/// Outcome of one load session.
pub struct SessionReport {
    /// Terminal stage: `Done` or `Failed`.
    pub stage: Stage,
    /// Stage the session had reached when it failed; `Done` on success.
    pub reached: Stage,
    /// Every compiler-reported message, in order.
    pub diagnostics: Vec<String>,
    /// Entry-point return value, present only after execution.
    pub exit_code: Option<i32>,
    pub result: Result<i32, PipelineError>,
}

/// Orchestrates arena, symbol table, platform and compiler service for
/// sequential load sessions. Exclusively owns the arena; the service only
/// ever receives an allocation capability bound to it.
pub struct Pipeline<P: Platform> {
    arena: Rc<RefCell<MemoryArena>>,
    symbols: HostSymbolTable,
    platform: P,
    backend: Box<dyn CompilerBackend>,
    entry_symbol: String,
    pace_ms: u32,
}

impl<P: Platform> Pipeline<P> {
    pub fn new(
        arena: MemoryArena,
        symbols: HostSymbolTable,
        platform: P,
        backend: Box<dyn CompilerBackend>,
    ) -> Self {
        Pipeline {
            arena: Rc::new(RefCell::new(arena)),
            symbols,
            platform,
            backend,
            entry_symbol: DEFAULT_ENTRY_SYMBOL.into(),
            pace_ms: 0,
        }
    }

    /// Override the entry symbol resolved after relocation.
    pub fn with_entry_symbol(mut self, name: &str) -> Self {
        self.entry_symbol = name.into();
        self
    }

    /// Blocking delay inserted at operator-visible checkpoints. Zero (the
    /// default) disables pacing.
    pub fn with_pace_ms(mut self, ms: u32) -> Self {
        self.pace_ms = ms;
        self
    }

    pub fn arena(&self) -> &Rc<RefCell<MemoryArena>> {
        &self.arena
    }

    /// Run one complete load session over `source`, invoking the entry
    /// point with `arg` on success.
    pub fn run(&mut self, source: &ProgramSource, arg: i32) -> SessionReport {
        let diagnostics: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let fail = |reached: Stage, err: PipelineError, diags: &Rc<RefCell<Vec<String>>>| {
            error!("pipeline: session failed at {reached:?}: {err}");
            SessionReport {
                stage: Stage::Failed,
                reached,
                diagnostics: diags.borrow().clone(),
                exit_code: None,
                result: Err(err),
            }
        };

        // Idle -> ArenaReady: reclaim everything from the previous session.
        self.arena.borrow_mut().reset();
        info!("pipeline: arena reset ({} bytes)", self.arena.borrow().capacity());

        // ArenaReady -> ServiceCreated.
        let mut session = match self.backend.create_session() {
            Ok(s) => s,
            Err(e) => {
                error!("pipeline: {e}");
                // No handle exists yet; nothing to release.
                return fail(Stage::ArenaReady, PipelineError::ServiceCreation, &diagnostics);
            }
        };
        self.pace();

        // ServiceCreated -> ServiceConfigured: allocator, diagnostics,
        // in-memory output. Purely configuration, no failure path.
        session.set_allocator(Rc::clone(&self.arena));
        let sink_diags = Rc::clone(&diagnostics);
        session.set_diagnostic_sink(Box::new(move |msg| {
            error!("[compiler] {msg}");
            sink_diags.borrow_mut().push(msg.to_string());
        }));
        session.set_output_memory();

        // ServiceConfigured -> Compiled.
        info!("pipeline: compiling {} bytes ({:?})", source.text.len(), source.origin);
        if session.compile(&source.text).is_err() {
            drop(session);
            return fail(Stage::ServiceConfigured, PipelineError::Compilation, &diagnostics);
        }
        self.pace();

        // Compiled -> SymbolsBound: unresolved names surface at relocation.
        for (name, addr) in self.symbols.iter() {
            session.add_symbol(name, addr);
        }
        info!("pipeline: bound {} host symbols", self.symbols.len());

        // SymbolsBound -> Relocated.
        if session.relocate().is_err() {
            drop(session);
            return fail(Stage::SymbolsBound, PipelineError::Relocation, &diagnostics);
        }

        // Relocated -> CacheSynced: strict entry resolution, then flush
        // writes and invalidate the instruction cache over the whole arena
        // (conservative) before any jump.
        let entry_addr = match session.resolve(&self.entry_symbol) {
            Some(addr) => addr,
            None => {
                drop(session);
                return fail(
                    Stage::Relocated,
                    PipelineError::EntryPointMissing(self.entry_symbol.clone()),
                    &diagnostics,
                );
            }
        };
        {
            let arena = self.arena.borrow();
            self.platform.sync_code_region(arena.base(), arena.capacity());
        }
        info!("pipeline: entry '{}' at {entry_addr:#x}, caches synced", self.entry_symbol);
        self.pace();

        // CacheSynced -> Executed. Past this point there is no safety net;
        // a bad jump target is a process fault, which is why resolution
        // above is strict.
        let entry: extern "C" fn(i32) -> i32 = unsafe { core::mem::transmute(entry_addr) };
        let exit_code = entry(arg);
        info!("pipeline: entry returned {exit_code}");

        // Executed -> Done: release the service handle. Arena memory is
        // reclaimed only by the next session's reset.
        drop(session);
        self.pace();

        let diagnostics = diagnostics.borrow().clone();
        SessionReport {
            stage: Stage::Done,
            reached: Stage::Done,
            diagnostics,
            exit_code: Some(exit_code),
            result: Ok(exit_code),
        }
    }

    fn pace(&self) {
        if self.pace_ms > 0 {
            self.platform.delay_ms(self.pace_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::stub::StubCompiler;
    use crate::platform::{hosted::HostedPlatform, ProtFlags, ShimError};
    use crate::source::{ProgramSource, SourceOrigin};
    use std::cell::Cell;

    fn src(text: &str) -> ProgramSource {
        ProgramSource {
            text: text.into(),
            origin: SourceOrigin::Resource,
        }
    }

    fn pipeline(arena_bytes: usize) -> (Pipeline<HostedPlatform>, crate::compiler::stub::SessionCounters) {
        let backend = StubCompiler::new();
        let counters = backend.counters();
        let p = Pipeline::new(
            MemoryArena::new(arena_bytes),
            HostSymbolTable::baseline(),
            HostedPlatform::new(),
            Box::new(backend),
        );
        (p, counters)
    }

    #[test]
    fn valid_program_reaches_done_with_exit_code() {
        let (mut p, counters) = pipeline(64 * 1024);
        let report = p.run(&src("int main(int n) { return n; }"), 42);
        assert_eq!(report.stage, Stage::Done);
        assert_eq!(report.exit_code, Some(42));
        assert_eq!(report.result, Ok(42));
        assert!(report.diagnostics.is_empty());
        assert_eq!(counters.released(), 1);
    }

    #[test]
    fn undefined_symbol_short_circuits_at_relocation() {
        let (mut p, counters) = pipeline(64 * 1024);
        let report = p.run(&src("int main(int n) { return undefined_fn(n); }"), 42);
        assert_eq!(report.stage, Stage::Failed);
        assert_eq!(report.reached, Stage::SymbolsBound);
        assert!(report.reached < Stage::CacheSynced);
        assert_eq!(report.result, Err(PipelineError::Relocation));
        assert!(!report.diagnostics.is_empty());
        assert_eq!(counters.released(), 1);
    }

    #[test]
    fn compile_error_reports_diagnostics_and_releases_handle() {
        let (mut p, counters) = pipeline(64 * 1024);
        let report = p.run(&src("not a c program"), 0);
        assert_eq!(report.result, Err(PipelineError::Compilation));
        assert_eq!(report.reached, Stage::ServiceConfigured);
        assert!(!report.diagnostics.is_empty());
        assert_eq!(counters.released(), 1);
    }

    #[test]
    fn service_creation_failure_is_reported() {
        let mut p = Pipeline::new(
            MemoryArena::new(1024),
            HostSymbolTable::new(),
            HostedPlatform::new(),
            Box::new(StubCompiler::failing_creation()),
        );
        let report = p.run(&src("int main(int n) { return n; }"), 0);
        assert_eq!(report.result, Err(PipelineError::ServiceCreation));
        assert_eq!(report.reached, Stage::ArenaReady);
    }

    #[test]
    fn missing_entry_symbol_fails_after_relocation() {
        let (p, counters) = pipeline(64 * 1024);
        let mut p = p.with_entry_symbol("start");
        let report = p.run(&src("int main(int n) { return n; }"), 0);
        assert_eq!(
            report.result,
            Err(PipelineError::EntryPointMissing("start".into()))
        );
        assert_eq!(report.reached, Stage::Relocated);
        assert_eq!(counters.released(), 1);
    }

    #[test]
    fn arena_exhaustion_surfaces_as_compilation_failure() {
        let (mut p, _) = pipeline(64);
        let report = p.run(&src("int main(int n) { return n; }"), 0);
        assert_eq!(report.result, Err(PipelineError::Compilation));
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.contains("allocation failure")));
    }

    #[test]
    fn arena_is_reset_per_session() {
        let (mut p, _) = pipeline(64 * 1024);
        let program = src("int main(int n) { return n; }");
        p.run(&program, 1);
        let used_once = p.arena().borrow().offset();
        p.run(&program, 2);
        assert_eq!(p.arena().borrow().offset(), used_once);
    }

    /// Platform that records whether cache sync ran before the entry jump.
    struct RecordingPlatform {
        syncs: Rc<Cell<usize>>,
    }

    impl Platform for RecordingPlatform {
        fn resolve_path(&self, path: &str, out: &mut [u8]) -> Result<usize, ShimError> {
            crate::platform::copy_c_string(path, out)
        }
        fn working_dir(&self, out: &mut [u8]) -> Result<usize, ShimError> {
            crate::platform::copy_c_string("/", out)
        }
        fn protect(&self, _: *const u8, _: usize, _: ProtFlags) -> Result<(), ShimError> {
            Ok(())
        }
        fn sync_code_region(&self, _: *const u8, _: usize) {
            self.syncs.set(self.syncs.get() + 1);
        }
        fn delay_ms(&self, _: u32) {}
    }

    thread_local! {
        // How many cache syncs had run when the probe entry was invoked.
        static SYNCS_AT_ENTRY: Cell<Option<usize>> = const { Cell::new(None) };
    }

    thread_local! {
        static SYNC_COUNT: Cell<usize> = const { Cell::new(0) };
    }

    struct CountingPlatform;

    impl Platform for CountingPlatform {
        fn resolve_path(&self, path: &str, out: &mut [u8]) -> Result<usize, ShimError> {
            crate::platform::copy_c_string(path, out)
        }
        fn working_dir(&self, out: &mut [u8]) -> Result<usize, ShimError> {
            crate::platform::copy_c_string("/", out)
        }
        fn protect(&self, _: *const u8, _: usize, _: ProtFlags) -> Result<(), ShimError> {
            Ok(())
        }
        fn sync_code_region(&self, _: *const u8, _: usize) {
            SYNC_COUNT.with(|c| c.set(c.get() + 1));
        }
        fn delay_ms(&self, _: u32) {}
    }

    #[test]
    fn cache_sync_always_precedes_entry_invocation() {
        // The probe snapshots the sync counter at the moment of the jump.
        extern "C" fn probe(_: i32) -> i32 {
            SYNCS_AT_ENTRY.with(|c| c.set(Some(SYNC_COUNT.with(Cell::get))));
            7
        }
        SYNC_COUNT.with(|c| c.set(0));
        SYNCS_AT_ENTRY.with(|c| c.set(None));
        let mut symbols = HostSymbolTable::new();
        symbols.register("probe", probe as extern "C" fn(i32) -> i32 as usize);
        let mut p = Pipeline::new(
            MemoryArena::new(64 * 1024),
            symbols,
            CountingPlatform,
            Box::new(StubCompiler::new()),
        );
        let report = p.run(&src("int main(int n) { return probe(n); }"), 1);
        assert_eq!(report.result, Ok(7));
        assert_eq!(SYNCS_AT_ENTRY.with(Cell::get), Some(1));
    }

    #[test]
    fn failed_session_never_syncs_caches() {
        let syncs = Rc::new(Cell::new(0usize));
        let platform = RecordingPlatform {
            syncs: Rc::clone(&syncs),
        };
        let mut p = Pipeline::new(
            MemoryArena::new(64 * 1024),
            HostSymbolTable::new(),
            platform,
            Box::new(StubCompiler::new()),
        );
        let report = p.run(&src("int main(int n) { return undefined_fn(n); }"), 1);
        assert_eq!(report.result, Err(PipelineError::Relocation));
        assert_eq!(syncs.get(), 0);
    }
}
