// CLASSIFICATION: COMMUNITY
// Filename: symbols.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-02-19

//! Host symbol table: the names compiled programs may call back into.
//!
//! Populated before each compile, read by the compiler service during
//! relocation, and re-registered identically for every session. The
//! baseline surface mirrors the firmware demo set: an integer-addition
//! helper, a millisecond delay, and a read-only greeting string.

use std::collections::HashMap;

/// Exact-name mapping from symbol to native address.
#[derive(Default)]
pub struct HostSymbolTable {
    map: HashMap<String, usize>,
}

impl HostSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-loaded with the fixed demonstration surface. A real
    /// deployment extends this with the platform's full capability set.
    pub fn baseline() -> Self {
        let mut table = Self::new();
        table.register("add", (host_add as extern "C" fn(i32, i32) -> i32) as usize);
        table.register("msleep_ms", (host_msleep_ms as extern "C" fn(i32)) as usize);
        table.register("hello", HELLO.as_ptr() as usize);
        table
    }

    /// Add or overwrite a binding. Duplicates overwrite silently.
    pub fn register(&mut self, name: &str, addr: usize) {
        self.map.insert(name.into(), addr);
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.map.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.map.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Greeting string readable from compiled programs. NUL-terminated for the
/// C side.
pub static HELLO: &[u8] = b"Hello World (from cohjit)!\0";

/// Integer addition helper callable from compiled programs.
pub extern "C" fn host_add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

/// Millisecond delay callable from compiled programs. Blocking by design;
/// there is no cancellation on the single thread of control.
#[cfg(not(target_os = "none"))]
pub extern "C" fn host_msleep_ms(ms: i32) {
    if ms > 0 {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}

/// Bare-metal variant: spin until the board timer hook is wired up.
#[cfg(target_os = "none")]
pub extern "C" fn host_msleep_ms(ms: i32) {
    let mut spins = (ms.max(0) as u64) * 10_000;
    while spins > 0 {
        core::hint::spin_loop();
        spins -= 1;
    }
}
