// CLASSIFICATION: COMMUNITY
// Filename: embedded.rs · platform v0.3
// Author: Lukas Bower
// Date Modified: 2026-05-09

//! Bare-metal implementation of the platform capabilities.
//!
//! Path resolution and the working directory are constant-returning shims;
//! protection is an unconditional success because the arena is placed in
//! uniformly executable SRAM. Cache maintenance calls out to board-support
//! hooks on split-cache targets and degrades to an ordering fence when
//! compiled for a host (so the logic stays under test).

use log::debug;

use super::{copy_c_string, Platform, ProtFlags, ShimError, WORKING_DIR};

// Board-support cache hooks. On ARMv7-M these wrap the CMSIS clean /
// invalidate-by-range sequence ending in DSB+ISB.
#[cfg(target_os = "none")]
extern "C" {
    fn cohjit_dcache_clean(addr: *const u8, len: usize);
    fn cohjit_icache_invalidate(addr: *const u8, len: usize);
}

/// Spins per millisecond for the fallback busy-wait delay. Calibrated for
/// the reference board clock; boards with a timer should hook one up.
const SPINS_PER_MS: u64 = 10_000;

#[derive(Default)]
pub struct EmbeddedPlatform;

impl EmbeddedPlatform {
    pub fn new() -> Self {
        EmbeddedPlatform
    }
}

impl Platform for EmbeddedPlatform {
    fn resolve_path(&self, path: &str, out: &mut [u8]) -> Result<usize, ShimError> {
        // No filesystem to consult: the input is already canonical.
        copy_c_string(path, out)
    }

    fn working_dir(&self, out: &mut [u8]) -> Result<usize, ShimError> {
        copy_c_string(WORKING_DIR, out)
    }

    fn protect(&self, addr: *const u8, len: usize, flags: ProtFlags) -> Result<(), ShimError> {
        // The arena lives in uniformly executable memory; nothing to change.
        // A port to hardware with a real MPU must replace this.
        debug!("platform/embedded: protect {addr:p}+{len:#x} {flags:?} accepted");
        Ok(())
    }

    fn sync_code_region(&self, addr: *const u8, len: usize) {
        debug!("platform/embedded: sync code region {addr:p}+{len:#x}");
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
        #[cfg(target_os = "none")]
        unsafe {
            cohjit_dcache_clean(addr, len);
            cohjit_icache_invalidate(addr, len);
        }
    }

    fn delay_ms(&self, ms: u32) {
        let mut spins = u64::from(ms) * SPINS_PER_MS;
        while spins > 0 {
            core::hint::spin_loop();
            spins -= 1;
        }
    }
}
