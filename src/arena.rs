// CLASSIFICATION: COMMUNITY
// Filename: arena.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-02-07

//! Fixed-capacity bump arena backing every allocation of a load session.
//!
//! The arena stands in for `malloc`/`realloc`/`free` while the external
//! compiler service runs: one statically sized region, a monotone offset,
//! and reclamation only by [`MemoryArena::reset`] between sessions. Each
//! block carries a four-byte size tag ahead of the returned address so
//! [`MemoryArena::reallocate`] can copy exactly `min(old, new)` bytes
//! forward instead of guessing.

use core::ptr::NonNull;
use thiserror::Error;

/// Natural alignment for the target word size. Every allocation is rounded
/// up to a multiple of this.
pub const ARENA_ALIGN: usize = 4;

/// Bytes reserved ahead of each block for the size tag.
const HEADER_BYTES: usize = 4;

/// Errors returned by arena operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    /// The request does not fit in the space left before `capacity`.
    /// Non-fatal to the process, fatal to the current load session.
    #[error("arena out of memory: requested {requested} bytes, {remaining} remaining")]
    OutOfMemory { requested: usize, remaining: usize },
}

/// Fixed-size, resettable bump allocator.
///
/// Owned exclusively by the pipeline; the compiler service only ever sees
/// an allocation capability bound to it, never the internals.
pub struct MemoryArena {
    buf: Box<[u8]>,
    offset: usize,
}

impl MemoryArena {
    /// Reserve `capacity` bytes. The region is never resized afterwards.
    pub fn new(capacity: usize) -> Self {
        MemoryArena {
            buf: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Base address of the backing region, for whole-arena cache maintenance.
    pub fn base(&self) -> *const u8 {
        self.buf.as_ptr()
    }

    /// Reclaim everything. Idempotent. All previously returned addresses are
    /// invalid after this; callers must not dereference them.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Hand out the next `size` bytes, rounded up to [`ARENA_ALIGN`].
    ///
    /// Returned ranges never overlap until the next [`reset`](Self::reset).
    /// On failure `offset` is left untouched.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, ArenaError> {
        let total = align_up(size)
            .and_then(|aligned| aligned.checked_add(HEADER_BYTES))
            .ok_or(ArenaError::OutOfMemory {
                requested: size,
                remaining: self.remaining(),
            })?;
        if total > self.remaining() {
            return Err(ArenaError::OutOfMemory {
                requested: size,
                remaining: self.remaining(),
            });
        }
        let user = self.offset + HEADER_BYTES;
        self.buf[self.offset..user].copy_from_slice(&(size as u32).to_le_bytes());
        self.offset += total;
        // Invariant: `user < capacity`, so the pointer is inside the live
        // backing allocation and never null.
        let ptr = unsafe { NonNull::new_unchecked(self.buf.as_mut_ptr().add(user)) };
        Ok(ptr)
    }

    /// Reallocate-shaped entry point matching the compiler service's
    /// size-based convention: `None` in behaves as [`allocate`](Self::allocate),
    /// `new_size == 0` behaves as [`release`](Self::release) and yields `None`.
    ///
    /// Growth is always "allocate fresh, copy forward"; the old block is
    /// never reclaimed. Content is preserved up to `min(old, new)` bytes via
    /// the size tag. Callers expecting full POSIX `realloc` semantics
    /// (in-place growth, freeing of the old block) must not rely on this
    /// allocator.
    pub fn reallocate(
        &mut self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, ArenaError> {
        let old = match ptr {
            None => return self.allocate(new_size).map(Some),
            Some(p) => p,
        };
        if new_size == 0 {
            self.release(old);
            return Ok(None);
        }
        let old_off = self.offset_of(old);
        let old_size = self.read_tag(old_off);
        let fresh = self.allocate(new_size)?;
        let new_off = self.offset_of(fresh);
        let keep = old_size.min(new_size);
        self.buf.copy_within(old_off..old_off + keep, new_off);
        Ok(Some(fresh))
    }

    /// Deliberate no-op: individual blocks are only reclaimed by `reset`.
    pub fn release(&mut self, _ptr: NonNull<u8>) {}

    /// True if `ptr` points inside the arena's backing region.
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        let base = self.buf.as_ptr() as usize;
        let p = ptr.as_ptr() as usize;
        p >= base && p < base + self.buf.len()
    }

    fn offset_of(&self, ptr: NonNull<u8>) -> usize {
        debug_assert!(self.contains(ptr), "pointer not from this arena");
        ptr.as_ptr() as usize - self.buf.as_ptr() as usize
    }

    fn read_tag(&self, user_off: usize) -> usize {
        debug_assert!(user_off >= HEADER_BYTES);
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&self.buf[user_off - HEADER_BYTES..user_off]);
        u32::from_le_bytes(tag) as usize
    }
}

fn align_up(size: usize) -> Option<usize> {
    size.checked_add(ARENA_ALIGN - 1).map(|v| v & !(ARENA_ALIGN - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_monotone_and_disjoint() {
        let mut arena = MemoryArena::new(1024);
        let a = arena.allocate(10).unwrap().as_ptr() as usize;
        let b = arena.allocate(1).unwrap().as_ptr() as usize;
        let c = arena.allocate(32).unwrap().as_ptr() as usize;
        assert!(a < b && b < c);
        // 10 rounds to 12; the next block's tag starts after it.
        assert!(b - a >= 12);
        assert!(arena.offset() <= arena.capacity());
    }

    #[test]
    fn exhaustion_leaves_offset_unchanged() {
        let mut arena = MemoryArena::new(64);
        arena.allocate(16).unwrap();
        let before = arena.offset();
        let err = arena.allocate(1024).unwrap_err();
        assert!(matches!(err, ArenaError::OutOfMemory { requested: 1024, .. }));
        assert_eq!(arena.offset(), before);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut arena = MemoryArena::new(128);
        arena.allocate(40).unwrap();
        arena.reset();
        assert_eq!(arena.offset(), 0);
        arena.reset();
        assert_eq!(arena.offset(), 0);
    }

    #[test]
    fn reallocate_none_allocates() {
        let mut arena = MemoryArena::new(128);
        let p = arena.reallocate(None, 8).unwrap();
        assert!(p.is_some());
    }

    #[test]
    fn reallocate_zero_releases() {
        let mut arena = MemoryArena::new(128);
        let p = arena.allocate(8).unwrap();
        let offset = arena.offset();
        assert_eq!(arena.reallocate(Some(p), 0).unwrap(), None);
        assert_eq!(arena.offset(), offset);
    }

    #[test]
    fn reallocate_preserves_prefix() {
        let mut arena = MemoryArena::new(256);
        let p = arena.allocate(4).unwrap();
        unsafe {
            p.as_ptr().copy_from(b"coh!".as_ptr(), 4);
        }
        let grown = arena.reallocate(Some(p), 16).unwrap().unwrap();
        let mut out = [0u8; 4];
        unsafe {
            grown.as_ptr().copy_to(out.as_mut_ptr(), 4);
        }
        assert_eq!(&out, b"coh!");
    }

    #[test]
    fn reallocate_shrink_copies_new_size_only() {
        let mut arena = MemoryArena::new(256);
        let p = arena.allocate(8).unwrap();
        unsafe {
            p.as_ptr().copy_from(b"abcdefgh".as_ptr(), 8);
        }
        let shrunk = arena.reallocate(Some(p), 2).unwrap().unwrap();
        let mut out = [0u8; 2];
        unsafe {
            shrunk.as_ptr().copy_to(out.as_mut_ptr(), 2);
        }
        assert_eq!(&out, b"ab");
    }

    #[test]
    fn oversized_request_reports_remaining() {
        let mut arena = MemoryArena::new(32);
        match arena.allocate(usize::MAX) {
            Err(ArenaError::OutOfMemory { remaining, .. }) => assert_eq!(remaining, 32),
            other => panic!("expected OutOfMemory, got {other:?}"),
        }
    }
}
