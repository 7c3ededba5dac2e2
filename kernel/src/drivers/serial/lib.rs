// Copyright 2021 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Provides access to the first serial port and implements the `print` and
//! `println` macros used to report allocator diagnostics.
//!
//! # Examples
//!
//! ```
//! println!("This is written to serial port COM1!");
//! ```
//!
//! # Safety
//!
//! The [`print`] and [`println`] macros both disable interrupts while
//! running, to prevent deadlocks when locking [`COM1`].

#![cfg_attr(not(test), no_std)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::missing_panics_doc)]
#![deny(clippy::panic)]
#![deny(clippy::return_self_not_must_use)]
#![deny(clippy::single_char_lifetime_names)]
#![deny(clippy::wildcard_imports)]
#![allow(unsafe_code)]

use core::fmt::Write;
use spin::{lock, Mutex};

#[cfg(not(test))]
use uart_16550::SerialPort;
#[cfg(not(test))]
use x86_64::instructions::interrupts::without_interrupts;

/// COM1 is the first serial port device.
///
#[cfg(not(test))]
pub static COM1: Mutex<SerialPort> = unsafe { Mutex::new(SerialPort::new(0x3f8)) };

#[cfg(test)]
pub static COM1: Mutex<alloc::string::String> = Mutex::new(alloc::string::String::new());

#[cfg(test)]
extern crate alloc;

/// _print writes text to the serial port by acquiring `COM1` using a spin
/// lock.
///
#[doc(hidden)]
#[cfg(not(test))]
pub fn _print(args: ::core::fmt::Arguments) {
    without_interrupts(|| {
        lock!(COM1)
            .write_fmt(args)
            .expect("printing to COM1 failed");
    });
}

/// Under `cfg(test)` there is no UART, so output goes to an in-memory
/// buffer instead; this keeps call sites identical between kernel and test
/// builds.
///
#[doc(hidden)]
#[cfg(test)]
pub fn _print(args: ::core::fmt::Arguments) {
    lock!(COM1)
        .write_fmt(args)
        .expect("printing to the test COM1 buffer failed");
}

/// Print to the first serial port, COM1.
///
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::_print(format_args!($($arg)*)));
}

/// Print a line to the first serial port, COM1.
///
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
