// Copyright 2021 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! A contiguous physical frame allocator.
//!
//! The allocator carves physical memory into fixed-size [`FRAME_SIZE`]
//! frames and hands out contiguous runs of them via [`PoolHandle`]s. Each
//! [`Pool`](pool::Pool) owns a region of frames and a 2-bit-per-frame
//! bitmap tracking which are free, used, or the first frame of an
//! allocated run; the process-wide [`Registry`](registry::Registry) lets a
//! bare frame number returned by [`new_pool`] be handed back to
//! [`release_frames`] without the caller remembering which pool, or how
//! many frames, it originally asked for.
//!
//! # Examples
//!
//! ```
//! let kernel_pool = physmem::new_pool(512, 512, 0);
//! let frame = kernel_pool.get_frames(1);
//! assert_ne!(frame, 0);
//!
//! physmem::release_frames(frame);
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::missing_panics_doc)]
#![allow(clippy::panic)]
#![deny(clippy::return_self_not_must_use)]
#![deny(clippy::single_char_lifetime_names)]
#![deny(clippy::wildcard_imports)]
#![allow(unsafe_code)]

mod pool;
mod registry;

pub use pool::needed_info_frames;

use lazy_static::lazy_static;
use registry::Registry;
use spin::{lock, Mutex};

/// The size, in bytes, of a single physical memory frame.
///
pub const FRAME_SIZE: usize = 4096;

lazy_static! {
    static ref REGISTRY: Mutex<Registry> = Mutex::new(Registry::empty());
}

/// An opaque, stable reference to a registered [`Pool`](pool::Pool).
///
/// A handle never expires: pools live for the remainder of the kernel's
/// life once constructed.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHandle(usize);

impl PoolHandle {
    /// Allocates `n` contiguous free frames from this pool, returning the
    /// absolute number of the first frame, or `0` if no run of that length
    /// is available.
    ///
    /// # Panics
    ///
    /// `get_frames` panics if `n == 0`.
    ///
    pub fn get_frames(self, n: usize) -> usize {
        let mut registry = lock!(REGISTRY);
        let pool = registry.pool_mut(self.0);
        let frame = pool.get_frames(n);

        if frame == 0 {
            serial::println!(
                "physmem: allocation of {} frames failed: pool exhausted",
                n
            );
        } else if pool.free_frames() == 0 {
            serial::println!("physmem: pool at base {} is now fully allocated", pool.base_frame_no());
        }

        frame
    }

    /// Forcibly reserves `n` consecutive frames starting at the relative
    /// index `base`, regardless of their prior state. Used to carve out
    /// memory holes the pool should never hand out.
    ///
    /// # Panics
    ///
    /// `mark_inaccessible` panics if the requested range falls outside the
    /// pool, or if `n == 0`.
    ///
    pub fn mark_inaccessible(self, base: usize, n: usize) {
        lock!(REGISTRY).pool_mut(self.0).mark_inaccessible(base, n);
    }

    /// Returns the number of frames in this pool that are currently free.
    ///
    pub fn free_frames(self) -> usize {
        lock!(REGISTRY).pool_mut(self.0).free_frames()
    }

    /// Returns the absolute frame number of the first frame in this pool.
    ///
    pub fn base_frame_no(self) -> usize {
        lock!(REGISTRY).pool_mut(self.0).base_frame_no()
    }
}

/// Constructs a new pool covering `n_frames` frames starting at
/// `base_frame_no`, storing its bitmap at `info_frame_no` (or inside its
/// own first frame, if `info_frame_no == 0`), and registers it for static
/// release.
///
/// # Panics
///
/// `new_pool` panics if the bitmap for `n_frames` frames would not fit in a
/// single frame (see [`needed_info_frames`]), or if the registry is already
/// tracking its maximum number of pools.
///
pub fn new_pool(base_frame_no: usize, n_frames: usize, info_frame_no: usize) -> PoolHandle {
    let pool = pool::Pool::new(base_frame_no, n_frames, info_frame_no);
    serial::println!(
        "physmem: new pool at base frame {} ({} frames, {})",
        base_frame_no,
        n_frames,
        pretty::Bytes::from_u64((n_frames * FRAME_SIZE) as u64)
    );

    let idx = lock!(REGISTRY).insert(pool);
    PoolHandle(idx)
}

/// Releases the run of frames starting at the absolute frame number `f`,
/// routing it to its owning pool.
///
/// If `f` is not the first frame of an allocated run, or is not owned by
/// any registered pool, `release_frames` logs a diagnostic (in the former
/// case) or does nothing (in the latter) and returns without modifying any
/// pool's bitmap.
///
pub fn release_frames(f: usize) {
    lock!(REGISTRY).release_frames(f);
}

/// Prints an occupancy summary for every registered pool.
///
pub fn debug() {
    lock!(REGISTRY).debug();
}

/// Returns a mutable view of the `len` bytes of physical memory starting
/// at byte address `addr`.
///
/// # Safety
///
/// The caller must ensure that `addr..addr+len` is backed by valid,
/// identity-mapped physical memory, and that no other live reference
/// (Rust or otherwise) aliases the same bytes for the duration of the
/// returned slice's use.
///
#[cfg(not(test))]
unsafe fn raw_bytes_mut(addr: usize, len: usize) -> &'static mut [u8] {
    core::slice::from_raw_parts_mut(addr as *mut u8, len)
}

/// The test build has no identity-mapped physical memory to speak of, so
/// frame addresses index into a large static arena instead. Frame numbers
/// used by any one test must stay within bounds and disjoint from those
/// used by any other test that can run concurrently; the scenario tests in
/// [`tests`] below own the low end of the arena (matching the reference
/// configuration's addresses) and small focused unit tests are kept far
/// away from it, near the top.
///
#[cfg(test)]
const TEST_ARENA_FRAMES: usize = 10240;

#[cfg(test)]
struct TestArena(core::cell::UnsafeCell<[u8; TEST_ARENA_FRAMES * FRAME_SIZE]>);

#[cfg(test)]
unsafe impl Sync for TestArena {}

#[cfg(test)]
static TEST_ARENA: TestArena = TestArena(core::cell::UnsafeCell::new(
    [0u8; TEST_ARENA_FRAMES * FRAME_SIZE],
));

#[cfg(test)]
unsafe fn raw_bytes_mut(addr: usize, len: usize) -> &'static mut [u8] {
    assert!(
        addr + len <= TEST_ARENA_FRAMES * FRAME_SIZE,
        "test frame access at {}..{} exceeds the {} frame test arena",
        addr,
        addr + len,
        TEST_ARENA_FRAMES
    );

    let base = TEST_ARENA.0.get() as *mut u8;
    core::slice::from_raw_parts_mut(base.add(addr), len)
}
