// Copyright 2021 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The process-wide ordered collection of every live [`Pool`](crate::pool::Pool).
//!
//! Pools are never removed once constructed, so the registry is backed by a
//! fixed-size arena rather than a `Vec`: a [`PoolHandle`] is just the arena
//! index a pool was given at construction, and that index never changes
//! even as later pools are spliced into the sorted order ahead of it. The
//! sorted order itself is a singly linked list threaded through the arena,
//! which is the data structure this allocator's design calls for (a tree or
//! a sorted `Vec` would be equally correct, just less convenient to keep
//! stable indices in).

use crate::pool::Pool;

/// The maximum number of pools the registry can track. Chosen generously
/// for a kernel with a handful of physical memory regions; raise it if a
/// future configuration needs more.
///
const MAX_POOLS: usize = 16;

struct Slot {
    pool: Pool,
    next: Option<usize>,
}

/// The process-wide pool registry.
///
pub(crate) struct Registry {
    slots: [Option<Slot>; MAX_POOLS],
    len: usize,
    head: Option<usize>,
}

impl Registry {
    pub(crate) const fn empty() -> Self {
        // MAX_POOLS array-repeat initialisers need `Option<Slot>: Copy`,
        // which `Slot` isn't, so list the `None`s out explicitly.
        const NONE: Option<Slot> = None;
        Registry {
            slots: [NONE; MAX_POOLS],
            len: 0,
            head: None,
        }
    }

    /// Inserts `pool` into the registry, keeping the sorted-by-`base_frame_no`
    /// order, and returns the stable handle index it was given.
    ///
    /// # Panics
    ///
    /// `insert` panics if the registry is already tracking `MAX_POOLS` pools.
    ///
    pub(crate) fn insert(&mut self, pool: Pool) -> usize {
        if self.len >= MAX_POOLS {
            panic!("pool registry is full: at most {} pools supported", MAX_POOLS);
        }

        let idx = self.len;
        self.len += 1;

        let base = pool.base_frame_no();

        let mut prev = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            let cur_base = self.slots[c].as_ref().unwrap().pool.base_frame_no();
            if cur_base > base {
                break;
            }
            prev = cur;
            cur = self.slots[c].as_ref().unwrap().next;
        }

        self.slots[idx] = Some(Slot { pool, next: cur });
        match prev {
            Some(p) => self.slots[p].as_mut().unwrap().next = Some(idx),
            None => self.head = Some(idx),
        }

        idx
    }

    /// Returns a mutable reference to the pool at handle index `idx`.
    ///
    /// # Panics
    ///
    /// `pool_mut` panics if `idx` does not name a live pool. This can only
    /// happen by constructing a [`PoolHandle`](crate::PoolHandle) out of
    /// thin air, which safe callers never do.
    ///
    pub(crate) fn pool_mut(&mut self, idx: usize) -> &mut Pool {
        &mut self.slots[idx]
            .as_mut()
            .expect("invalid pool handle")
            .pool
    }

    /// Routes a bare absolute frame number to its owning pool and releases
    /// the run starting there. Silently does nothing if no pool owns `f`.
    ///
    pub(crate) fn release_frames(&mut self, f: usize) {
        let mut cur = self.head;
        while let Some(c) = cur {
            let slot = self.slots[c].as_mut().unwrap();
            if slot.pool.base_frame_no() > f {
                break;
            }

            if slot.pool.contains(f) {
                let rel = f - slot.pool.base_frame_no();
                slot.pool.release_relative(rel);
                return;
            }

            cur = slot.next;
        }
    }

    /// Prints an occupancy summary for every registered pool, in sorted
    /// order.
    ///
    pub(crate) fn debug(&self) {
        serial::println!("Physical memory pools:");
        let mut cur = self.head;
        while let Some(c) = cur {
            let slot = self.slots[c].as_ref().unwrap();
            slot.pool.debug();
            cur = slot.next;
        }
    }
}
