// Copyright 2021 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! A single contiguous region of physical memory frames, tracked with a
//! frame-state bitmap.

use crate::raw_bytes_mut;
use crate::FRAME_SIZE;
use bitmap_index::{Bitmap, FrameState};

/// The number of bytes an info frame can hold for its bitmap is exactly one
/// frame: `needed_info_frames` must never exceed 1 for a pool to be valid.
///
/// A pool of zero frames still needs an info frame to hold its (empty)
/// bitmap, so this is `1` at `n_frames == 0`, not `0`.
///
pub fn needed_info_frames(n_frames: usize) -> usize {
    if n_frames == 0 {
        return 1;
    }

    let bits_needed = n_frames * 2;
    let bits_per_frame = FRAME_SIZE * 8;
    (bits_needed + bits_per_frame - 1) / bits_per_frame
}

/// One contiguous region of physical frames, with its own bitmap.
///
/// A `Pool` never moves and is never dropped once registered: it lives for
/// the remainder of the kernel's life, so all of its methods take `&mut
/// self` rather than consuming it.
///
pub(crate) struct Pool {
    base_frame_no: usize,
    n_frames: usize,
    info_frame_no: usize,
    free_frames: usize,
}

impl Pool {
    /// Constructs a new pool covering `[base_frame_no, base_frame_no +
    /// n_frames)`, storing its bitmap at `info_frame_no` (or inside its own
    /// first frame, if `info_frame_no == 0`).
    ///
    /// # Panics
    ///
    /// `new` panics if the bitmap for `n_frames` frames would not fit in a
    /// single frame.
    ///
    pub(crate) fn new(base_frame_no: usize, n_frames: usize, info_frame_no: usize) -> Self {
        if needed_info_frames(n_frames) != 1 {
            panic!(
                "cannot construct a pool of {} frames: its bitmap needs {} info frames, but exactly 1 is required",
                n_frames,
                needed_info_frames(n_frames)
            );
        }

        let mut pool = Pool {
            base_frame_no,
            n_frames,
            info_frame_no,
            free_frames: n_frames,
        };

        // Zero-initialise before ever touching frame 0, so that the
        // self-reservation below (if any) is the first meaningful write.
        pool.with_bitmap(|bitmap| bitmap.zero());

        if info_frame_no == 0 {
            pool.with_bitmap(|bitmap| bitmap.set_state(0, FrameState::HeadOfSequence));
            pool.free_frames -= 1;
        }

        pool
    }

    pub(crate) fn base_frame_no(&self) -> usize {
        self.base_frame_no
    }

    pub(crate) fn n_frames(&self) -> usize {
        self.n_frames
    }

    pub(crate) fn free_frames(&self) -> usize {
        self.free_frames
    }

    /// Returns whether the absolute frame number `f` falls within this
    /// pool's range.
    ///
    pub(crate) fn contains(&self, f: usize) -> bool {
        self.base_frame_no <= f && f <= self.base_frame_no + self.n_frames - 1
    }

    /// Allocates `n` contiguous free frames, returning the absolute number
    /// of the first frame, or `0` if no run of that length is available.
    ///
    /// # Panics
    ///
    /// `get_frames` panics if `n == 0`.
    ///
    pub(crate) fn get_frames(&mut self, n: usize) -> usize {
        assert!(n >= 1, "get_frames requires n >= 1, got 0");

        let mut start = 0usize;
        while start + n <= self.n_frames {
            let mut advance = None;
            for i in 0..n {
                if self.state(start + i) != FrameState::Free {
                    advance = Some(i);
                    break;
                }
            }

            match advance {
                Some(i) => start += i + 1,
                None => {
                    self.mark_run(start, n);
                    return start + self.base_frame_no;
                }
            }
        }

        0
    }

    /// Forcibly reserves `n` consecutive frames starting at the relative
    /// index `base`, regardless of their prior state.
    ///
    /// # Panics
    ///
    /// `mark_inaccessible` panics if the requested range falls outside the
    /// pool, or if `n == 0`.
    ///
    pub(crate) fn mark_inaccessible(&mut self, base: usize, n: usize) {
        assert!(n >= 1, "mark_inaccessible requires n >= 1, got 0");
        assert!(
            base + n <= self.n_frames,
            "mark_inaccessible({}, {}) out of range for pool of {} frames",
            base,
            n,
            self.n_frames
        );

        self.mark_run(base, n);
    }

    /// Releases the run starting at relative frame `k`, if `k` is the head
    /// of a run. Otherwise logs a diagnostic and leaves the bitmap
    /// unchanged.
    ///
    pub(crate) fn release_relative(&mut self, k: usize) {
        if self.state(k) != FrameState::HeadOfSequence {
            serial::println!(
                "physmem: release of frame {} in pool at base {} ignored: not a head of sequence",
                self.base_frame_no + k,
                self.base_frame_no
            );
            return;
        }

        let n_frames = self.n_frames;
        let freed = self.with_bitmap(|bitmap| {
            bitmap.set_state(k, FrameState::Free);
            let mut freed = 1usize;
            let mut j = k + 1;
            while j < n_frames && bitmap.get_state(j) == FrameState::Used {
                bitmap.set_state(j, FrameState::Free);
                freed += 1;
                j += 1;
            }
            freed
        });

        self.free_frames += freed;
    }

    /// Prints a one-line occupancy summary for this pool.
    ///
    pub(crate) fn debug(&self) {
        serial::println!(
            "  {:#010x}-{:#010x} {:6} frames, {:6} free ({} / {})",
            self.base_frame_no * FRAME_SIZE,
            (self.base_frame_no + self.n_frames) * FRAME_SIZE - 1,
            self.n_frames,
            self.free_frames,
            pretty::Bytes::from_u64((self.free_frames * FRAME_SIZE) as u64),
            pretty::Bytes::from_u64((self.n_frames * FRAME_SIZE) as u64)
        );
    }

    /// Marks `[base, base+n)` as an allocated run (`HeadOfSequence` then
    /// `Used`), updating the free-frame count by however many of those
    /// frames were actually free beforehand.
    ///
    fn mark_run(&mut self, base: usize, n: usize) {
        let mut freed = 0usize;
        for i in 0..n {
            if self.state(base + i) == FrameState::Free {
                freed += 1;
            }
        }

        self.with_bitmap(|bitmap| {
            bitmap.set_state(base, FrameState::HeadOfSequence);
            for i in 1..n {
                bitmap.set_state(base + i, FrameState::Used);
            }
        });

        self.free_frames -= freed;
    }

    pub(crate) fn state(&self, k: usize) -> FrameState {
        self.with_bitmap(|bitmap| bitmap.get_state(k))
    }

    /// Resolves the byte address of this pool's bitmap.
    ///
    fn bitmap_addr(&self) -> usize {
        let frame = if self.info_frame_no != 0 {
            self.info_frame_no
        } else {
            self.base_frame_no
        };

        frame * FRAME_SIZE
    }

    /// Borrows the bitmap for the duration of `f`. The borrow never
    /// outlives this call: nothing holds a `Bitmap` across operations,
    /// since its storage is plain physical memory, not a Rust-owned
    /// allocation.
    ///
    fn with_bitmap<R>(&self, f: impl FnOnce(&mut Bitmap) -> R) -> R {
        let len = Bitmap::bytes_required(self.n_frames);
        let addr = self.bitmap_addr();
        let bytes = unsafe { raw_bytes_mut(addr, len) };
        let mut bitmap = Bitmap::new(bytes, self.n_frames);
        f(&mut bitmap)
    }
}
