// CLASSIFICATION: COMMUNITY
// Filename: pipeline_e2e.rs v0.3
// Date Modified: 2026-07-02
// Author: Lukas Bower

//! End-to-end load sessions over the scripted compiler backend.

use serial_test::serial;

use cohjit::arena::MemoryArena;
use cohjit::compiler::stub::StubCompiler;
use cohjit::pipeline::{Pipeline, PipelineError, Stage};
use cohjit::platform::hosted::HostedPlatform;
use cohjit::source::{acquire, SourceOrigin, SourceStore, DEFAULT_PROGRAM};
use cohjit::symbols::HostSymbolTable;

struct OneResource {
    name: &'static str,
    bytes: Vec<u8>,
}

impl SourceStore for OneResource {
    fn read(&self, name: &str) -> Option<Vec<u8>> {
        (name == self.name).then(|| self.bytes.clone())
    }
}

fn pipeline() -> Pipeline<HostedPlatform> {
    Pipeline::new(
        MemoryArena::new(64 * 1024),
        HostSymbolTable::baseline(),
        HostedPlatform::new(),
        Box::new(StubCompiler::new()),
    )
}

#[test]
#[serial]
fn increment_program_yields_43_with_no_diagnostics() {
    // Stored resource: one format-marker byte, then the program text.
    let store = OneResource {
        name: "tcc.py",
        bytes: {
            let mut b = vec![0x41];
            b.extend_from_slice(b"int main(int n) { return n + 1; }");
            b
        },
    };
    let source = acquire(&store, "tcc.py");
    assert_eq!(source.origin, SourceOrigin::Resource);
    // The marker must not reach the compiler.
    assert!(source.text.starts_with("int main"));

    let report = pipeline().run(&source, 42);
    assert_eq!(report.stage, Stage::Done);
    assert_eq!(report.exit_code, Some(43));
    assert!(report.diagnostics.is_empty());
}

#[test]
#[serial]
fn undefined_symbol_fails_relocation_with_diagnostics() {
    let backend = StubCompiler::new();
    let counters = backend.counters();
    let mut pipe = Pipeline::new(
        MemoryArena::new(64 * 1024),
        HostSymbolTable::baseline(),
        HostedPlatform::new(),
        Box::new(backend),
    );
    let store = OneResource {
        name: "tcc.py",
        bytes: {
            let mut b = vec![0x41];
            b.extend_from_slice(b"int main(int n) { return undefined_fn(n); }");
            b
        },
    };
    let source = acquire(&store, "tcc.py");
    let report = pipe.run(&source, 42);
    assert_eq!(report.result, Err(PipelineError::Relocation));
    assert!(report.reached < Stage::CacheSynced);
    assert!(!report.diagnostics.is_empty());
    assert_eq!(counters.released(), 1);
}

#[test]
#[serial]
fn missing_resource_runs_builtin_program_text() {
    let store = OneResource {
        name: "other",
        bytes: Vec::new(),
    };
    let source = acquire(&store, "tcc.py");
    assert_eq!(source.origin, SourceOrigin::Builtin);
    assert_eq!(source.text, DEFAULT_PROGRAM);
}

#[test]
#[serial]
fn host_symbol_is_callable_from_compiled_program() {
    // `add` is bound with two parameters; call the delay-free identity
    // path through a single-argument host helper instead.
    extern "C" fn triple(x: i32) -> i32 {
        x * 3
    }
    let mut symbols = HostSymbolTable::baseline();
    symbols.register("triple", triple as extern "C" fn(i32) -> i32 as usize);
    let mut pipe = Pipeline::new(
        MemoryArena::new(64 * 1024),
        symbols,
        HostedPlatform::new(),
        Box::new(StubCompiler::new()),
    );
    let store = OneResource {
        name: "tcc.py",
        bytes: {
            let mut b = vec![0x00];
            b.extend_from_slice(b"int main(int n) { return triple(n); }");
            b
        },
    };
    let source = acquire(&store, "tcc.py");
    let report = pipe.run(&source, 14);
    assert_eq!(report.result, Ok(42));
}

#[test]
#[serial]
fn sessions_are_independent_attempts() {
    let mut pipe = pipeline();
    let bad = acquire(
        &OneResource {
            name: "tcc.py",
            bytes: b"\x41int main(int n) { return nope(n); }".to_vec(),
        },
        "tcc.py",
    );
    let good = acquire(
        &OneResource {
            name: "tcc.py",
            bytes: b"\x41int main(int n) { return n; }".to_vec(),
        },
        "tcc.py",
    );
    assert_eq!(pipe.run(&bad, 1).result, Err(PipelineError::Relocation));
    // A fresh session after reset succeeds; the failure left no residue.
    assert_eq!(pipe.run(&good, 9).result, Ok(9));
}

#[test]
#[serial]
fn run_hosted_helper_round_trips() {
    let report = cohjit::run_hosted("int main(int n) { return n; }", 42, 64 * 1024);
    assert_eq!(report.exit_code, Some(42));
}
