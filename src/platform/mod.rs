// CLASSIFICATION: COMMUNITY
// Filename: mod.rs · platform facade v0.3
// Author: Lukas Bower
// Date Modified: 2026-03-14

//! Platform shim layer: the process-environment stand-ins the external
//! compiler service needs to run without an OS, plus the cache and delay
//! capabilities the pipeline depends on.
//!
//! Two implementations, both always compiled so hosted tests cover the
//! embedded logic:
//!
//!   * [`hosted::HostedPlatform`]     – workstation runs and tests
//!   * [`embedded::EmbeddedPlatform`] – bare-metal targets
//!
//! [`default_platform`] selects between them at build time.

pub mod embedded;
#[cfg(not(target_os = "none"))]
pub mod hosted;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Memory-protection request flags handed to [`Platform::protect`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ProtFlags: u32 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC  = 1 << 2;
    }
}

/// Fixed working directory reported on targets without a filesystem.
pub const WORKING_DIR: &str = "/";

/// Errors surfaced by the shim layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShimError {
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },
}

/// Platform capabilities consumed by the pipeline and the compiler service.
pub trait Platform {
    /// Resolve `path` into `out` as a NUL-terminated string. There is no
    /// filesystem to consult, so the path is returned verbatim; the only
    /// failure is an undersized buffer. Returns the string length without
    /// the terminator.
    fn resolve_path(&self, path: &str, out: &mut [u8]) -> Result<usize, ShimError>;

    /// Write the fixed working directory into `out`, NUL-terminated.
    /// Signals [`ShimError::BufferTooSmall`] rather than overflowing.
    fn working_dir(&self, out: &mut [u8]) -> Result<usize, ShimError>;

    /// Adjust protection on a region. On targets whose arena lives in
    /// uniformly executable memory this unconditionally succeeds; a port to
    /// hardware without that property must supply a real call here.
    fn protect(&self, addr: *const u8, len: usize, flags: ProtFlags) -> Result<(), ShimError>;

    /// Flush buffered data writes covering `[addr, addr+len)` and invalidate
    /// the instruction cache over the same range. Mandatory before jumping
    /// into freshly written code on split-cache architectures.
    fn sync_code_region(&self, addr: *const u8, len: usize);

    /// Blocking millisecond delay used for operator pacing.
    fn delay_ms(&self, ms: u32);
}

/// Shared verbatim-copy implementation of path resolution.
pub(crate) fn copy_c_string(src: &str, out: &mut [u8]) -> Result<usize, ShimError> {
    let needed = src.len() + 1;
    if out.len() < needed {
        return Err(ShimError::BufferTooSmall {
            needed,
            have: out.len(),
        });
    }
    out[..src.len()].copy_from_slice(src.as_bytes());
    out[src.len()] = 0;
    Ok(src.len())
}

/// Platform implementation for the current build target.
#[cfg(not(target_os = "none"))]
pub fn default_platform() -> hosted::HostedPlatform {
    hosted::HostedPlatform::new()
}

/// Platform implementation for the current build target.
#[cfg(target_os = "none")]
pub fn default_platform() -> embedded::EmbeddedPlatform {
    embedded::EmbeddedPlatform::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_c_string_terminates() {
        let mut buf = [0xffu8; 8];
        let n = copy_c_string("abc", &mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..4], b"abc\0");
    }

    #[test]
    fn copy_c_string_rejects_short_buffer() {
        let mut buf = [0u8; 3];
        let err = copy_c_string("abc", &mut buf).unwrap_err();
        assert_eq!(err, ShimError::BufferTooSmall { needed: 4, have: 3 });
    }

    #[test]
    fn copy_c_string_accepts_exact_fit() {
        let mut buf = [0u8; 4];
        assert_eq!(copy_c_string("abc", &mut buf), Ok(3));
    }
}
