// Copyright 2021 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! A minimal paging bootstrapper, shown as an example consumer of the
//! allocator's contract.
//!
//! Real page-table management is out of scope here: this module only
//! demonstrates that the allocator's single-frame requests are sufficient
//! to stand one up. It never writes to the frames it allocates; a real
//! implementation would use them to back page directories and tables.

use physmem::PoolHandle;

/// The frames a minimal paging bootstrapper needs before it can map its
/// first page.
///
pub struct PagingBootstrap {
    /// Holds the page directory.
    pub page_directory_frame: usize,
    /// Holds the initial page table.
    pub page_table_frame: usize,
}

impl PagingBootstrap {
    /// Allocates the frames needed to get paging off the ground: one for
    /// the page directory, one for the initial page table.
    ///
    /// # Panics
    ///
    /// `new` panics if `pool` cannot satisfy either single-frame request;
    /// there is no recovery from failing to set up paging this early in
    /// boot.
    ///
    pub fn new(pool: PoolHandle) -> Self {
        let page_directory_frame = pool.get_frames(1);
        assert_ne!(page_directory_frame, 0, "out of memory allocating a page directory frame");

        let page_table_frame = pool.get_frames(1);
        assert_ne!(page_table_frame, 0, "out of memory allocating an initial page table frame");

        PagingBootstrap {
            page_directory_frame,
            page_table_frame,
        }
    }

    /// Allocates one further frame for a new page table, as paging grows
    /// beyond what the initial table covers.
    ///
    /// Returns `0` on exhaustion, exactly as [`PoolHandle::get_frames`]
    /// does: it is the caller's responsibility to treat that as fatal or
    /// recoverable, depending on context.
    ///
    pub fn allocate_page_table(&self, pool: PoolHandle) -> usize {
        pool.get_frames(1)
    }
}
