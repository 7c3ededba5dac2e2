// Copyright 2021 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! The reference-configuration glue around the physical frame allocator.
//!
//! This crate wires [`physmem`] up with the addresses a real kernel would
//! use (see [`config`]), and gives an example of the allocator's minimal
//! client contract: a paging bootstrapper that only ever asks for
//! single-frame runs (see [`paging`]).

#![cfg_attr(not(test), no_std)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::missing_panics_doc)]
#![allow(clippy::panic)]
#![deny(clippy::return_self_not_must_use)]
#![deny(clippy::single_char_lifetime_names)]
#![deny(clippy::wildcard_imports)]

pub mod config;
pub mod paging;

pub use physmem::release_frames;

use core::panic::PanicInfo;
use serial::println;

/// Initialises the kernel's two reference-configuration pools: the kernel
/// pool and, if it fits alongside the kernel pool's info frame, the
/// process pool with its memory hole excluded.
///
/// Returns the handles so a caller (or a test) can drive allocations
/// against them directly.
///
pub fn init() -> (physmem::PoolHandle, physmem::PoolHandle) {
    let kernel_pool = physmem::new_pool(
        config::KERNEL_POOL_BASE_FRAME,
        config::KERNEL_POOL_LENGTH_FRAMES,
        0,
    );

    let process_pool = physmem::new_pool(
        config::PROCESS_POOL_BASE_FRAME,
        config::PROCESS_POOL_LENGTH_FRAMES,
        config::PROCESS_POOL_INFO_FRAME,
    );
    process_pool.mark_inaccessible(
        config::MEMORY_HOLE_BASE_FRAME - config::PROCESS_POOL_BASE_FRAME,
        config::MEMORY_HOLE_LENGTH_FRAMES,
    );

    physmem::debug();

    (kernel_pool, process_pool)
}

/// Halts the CPU forever. This is the only recovery path for a fatal
/// invariant violation: there is no scheduler to hand control back to.
///
#[cfg(not(test))]
pub fn halt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

/// There's no CPU to halt under `cfg(test)`, so spin instead; nothing in
/// the test suite ever calls this, but it keeps the signature identical to
/// the real kernel build.
///
#[cfg(test)]
pub fn halt_loop() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// The kernel's panic handler: report the failure over the serial console,
/// then halt.
///
/// This isn't registered as `#[panic_handler]` here, since a `lib` crate
/// used from tests must not define one (the test harness provides its
/// own); the binary that links this crate as its kernel image should call
/// this from its own `#[panic_handler]`.
///
pub fn report_panic(info: &PanicInfo) -> ! {
    println!("{}", info);
    halt_loop()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_configuration_constants_are_consistent() {
        assert_eq!(config::KERNEL_POOL_BASE_FRAME, 512);
        assert_eq!(config::KERNEL_POOL_LENGTH_FRAMES, 512);
        assert_eq!(config::PROCESS_POOL_BASE_FRAME, 1024);
        assert_eq!(config::PROCESS_POOL_LENGTH_FRAMES, 7168);
        assert_eq!(config::MEMORY_HOLE_BASE_FRAME, 3840);
        assert_eq!(config::MEMORY_HOLE_LENGTH_FRAMES, 256);

        // The kernel and process pools must not overlap, and the process
        // pool's info frame must sit outside both.
        let kernel_end = config::KERNEL_POOL_BASE_FRAME + config::KERNEL_POOL_LENGTH_FRAMES;
        assert!(kernel_end <= config::PROCESS_POOL_BASE_FRAME);
        let process_end = config::PROCESS_POOL_BASE_FRAME + config::PROCESS_POOL_LENGTH_FRAMES;
        assert!(config::PROCESS_POOL_INFO_FRAME >= process_end);

        // The memory hole must fall within the process pool's range.
        assert!(config::MEMORY_HOLE_BASE_FRAME >= config::PROCESS_POOL_BASE_FRAME);
        assert!(config::MEMORY_HOLE_BASE_FRAME + config::MEMORY_HOLE_LENGTH_FRAMES <= process_end);
    }

    // init() and the paging bootstrap both construct pools at the
    // reference-configuration addresses, which are never reclaimed from
    // the registry; they share one test so the two don't race when
    // `cargo test` runs them concurrently.
    #[test]
    fn init_and_paging_bootstrap() {
        let (kernel, process) = init();

        let hole_start = config::MEMORY_HOLE_BASE_FRAME;
        let hole_len = config::MEMORY_HOLE_LENGTH_FRAMES;
        for _ in 0..(config::PROCESS_POOL_LENGTH_FRAMES - hole_len) {
            let frame = process.get_frames(1);
            if frame == 0 {
                break;
            }
            assert!(frame < hole_start || frame >= hole_start + hole_len);
        }

        let bootstrap = paging::PagingBootstrap::new(kernel);
        assert_ne!(bootstrap.page_directory_frame, 0);
        assert_ne!(bootstrap.page_table_frame, 0);
        assert_ne!(bootstrap.page_directory_frame, bootstrap.page_table_frame);

        let extra = bootstrap.allocate_page_table(kernel);
        assert_ne!(extra, 0);
    }
}
