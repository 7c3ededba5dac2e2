// Copyright 2021 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The reference memory layout: fixed addresses for the kernel and process
//! pools, matching a small educational kernel's fixed early-boot layout.
//!
//! There is no runtime configuration surface for any of this: the pool
//! layout is as static as the rest of the allocator's single-threaded,
//! pre-scheduler environment.

/// Frames are `4096` bytes, in both pools.
///
pub const FRAME_SIZE: usize = physmem::FRAME_SIZE;

/// The kernel pool covers `2 MiB..4 MiB` of physical memory and stores its
/// own bitmap in its first frame.
///
pub const KERNEL_POOL_BASE_FRAME: usize = (2 * 1024 * 1024) / FRAME_SIZE;
pub const KERNEL_POOL_LENGTH_FRAMES: usize = (2 * 1024 * 1024) / FRAME_SIZE;

/// The process pool covers `4 MiB..32 MiB` of physical memory. Its bitmap
/// is stored in the frame immediately following its own range, so it
/// doesn't compete with either pool for a frame it would otherwise own.
///
pub const PROCESS_POOL_BASE_FRAME: usize = (4 * 1024 * 1024) / FRAME_SIZE;
pub const PROCESS_POOL_LENGTH_FRAMES: usize = (28 * 1024 * 1024) / FRAME_SIZE;
pub const PROCESS_POOL_INFO_FRAME: usize = PROCESS_POOL_BASE_FRAME + PROCESS_POOL_LENGTH_FRAMES;

/// A reserved region at `15 MiB..16 MiB`, excluded from the process pool
/// via `mark_inaccessible` once it's constructed.
///
pub const MEMORY_HOLE_BASE_FRAME: usize = (15 * 1024 * 1024) / FRAME_SIZE;
pub const MEMORY_HOLE_LENGTH_FRAMES: usize = (1024 * 1024) / FRAME_SIZE;
