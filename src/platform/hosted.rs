// CLASSIFICATION: COMMUNITY
// Filename: hosted.rs · platform v0.2
// Author: Lukas Bower
// Date Modified: 2026-03-14

//! Workstation implementation of the platform capabilities. Lets the same
//! pipeline logic run unmodified on a development host: caches are
//! coherent, protection is already permissive, delays are real sleeps.

use log::debug;

use super::{copy_c_string, Platform, ProtFlags, ShimError, WORKING_DIR};

#[derive(Default)]
pub struct HostedPlatform;

impl HostedPlatform {
    pub fn new() -> Self {
        HostedPlatform
    }
}

impl Platform for HostedPlatform {
    fn resolve_path(&self, path: &str, out: &mut [u8]) -> Result<usize, ShimError> {
        copy_c_string(path, out)
    }

    fn working_dir(&self, out: &mut [u8]) -> Result<usize, ShimError> {
        copy_c_string(WORKING_DIR, out)
    }

    fn protect(&self, addr: *const u8, len: usize, flags: ProtFlags) -> Result<(), ShimError> {
        debug!("platform/hosted: protect {addr:p}+{len:#x} {flags:?} (no-op)");
        Ok(())
    }

    fn sync_code_region(&self, addr: *const u8, len: usize) {
        // Unified, coherent caches on hosted targets; ordering fence only.
        debug!("platform/hosted: sync code region {addr:p}+{len:#x}");
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    fn delay_ms(&self, ms: u32) {
        if ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
        }
    }
}
