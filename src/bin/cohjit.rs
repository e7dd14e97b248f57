// CLASSIFICATION: COMMUNITY
// Filename: cohjit.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-07-02

//! Operator binary: acquire a program, run one load session, report.
//!
//! The process completes unconditionally once the session terminates; the
//! compiled program's exit code is logged, not propagated.

use clap::Parser;

use cohjit::arena::MemoryArena;
use cohjit::compiler::CompilerBackend;
use cohjit::pipeline::Pipeline;
use cohjit::platform::default_platform;
use cohjit::source::{acquire, FileStore, DEFAULT_RESOURCE};
use cohjit::symbols::HostSymbolTable;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Resource holding the program text; falls back to the built-in
    /// default program when missing or empty.
    #[arg(long, default_value = DEFAULT_RESOURCE)]
    resource: String,

    /// Directory the resource is looked up in.
    #[arg(long, default_value = ".")]
    root: String,

    /// Integer argument handed to the program's entry point.
    #[arg(long, default_value_t = 42)]
    arg: i32,

    /// Arena capacity in bytes; all session allocations must fit.
    #[arg(long, default_value_t = 256 * 1024)]
    arena_bytes: usize,

    /// Operator pacing delay between pipeline checkpoints, in ms.
    #[arg(long, default_value_t = 0)]
    pace_ms: u32,
}

#[cfg(feature = "libtcc")]
fn backend() -> Box<dyn CompilerBackend> {
    Box::new(cohjit::tcc::TccBackend::new())
}

#[cfg(all(feature = "stub-compiler", not(feature = "libtcc")))]
fn backend() -> Box<dyn CompilerBackend> {
    Box::new(cohjit::compiler::stub::StubCompiler::new())
}

#[cfg(not(any(feature = "libtcc", feature = "stub-compiler")))]
compile_error!("enable either the `libtcc` or the `stub-compiler` feature");

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    println!("[cohjit] in-memory C loader");
    println!("[cohjit] reading resource '{}'", cli.resource);
    let store = FileStore::new(cli.root.as_str());
    let source = acquire(&store, &cli.resource);

    let mut pipe = Pipeline::new(
        MemoryArena::new(cli.arena_bytes),
        HostSymbolTable::baseline(),
        default_platform(),
        backend(),
    )
    .with_pace_ms(cli.pace_ms);

    let report = pipe.run(&source, cli.arg);
    for line in &report.diagnostics {
        eprintln!("[cohjit] diag: {line}");
    }
    match report.result {
        Ok(code) => println!("[cohjit] session done, exit code {code}"),
        Err(e) => println!("[cohjit] session failed at {:?}: {e}", report.reached),
    }
}
