//! rboot-core - Core library for the rboot bootloader flash engine
//!
//! This crate implements the hardware-facing layer of a USB bootloader for
//! 32-bit microcontrollers: the flash write engines (a generic half-word
//! programmer and a page-buffered programmer with an erratum workaround),
//! the interrupt-driven transmit ring buffer that carries diagnostic bytes
//! off the device, and the bootloader entry decision. It is designed to be
//! `no_std` compatible for use on the target itself; hardware access goes
//! through the capability traits in [`controller`], [`uart`] and [`trigger`]
//! so that tests and the host-side simulator can substitute deterministic
//! fakes.
//!
//! # Features
//!
//! - `std` - Enable standard library support (error trait integration)
//!
//! # Example
//!
//! ```ignore
//! use rboot_core::engine::{FlashTarget, PageBufferEngine};
//!
//! fn flash_image<M: rboot_core::controller::FlashMmio>(mmio: M, layout: rboot_core::layout::FlashLayout) {
//!     let mut engine = PageBufferEngine::new(mmio, layout, rboot_core::diag::NullDiag);
//!     engine.unlock();
//!     match engine.program_array(0x0800_2000, &[0x1111, 0x2222, 0x3333]) {
//!         Ok(()) => {}
//!         Err(e) => log::error!("flashing failed: {}", e),
//!     }
//!     engine.lock();
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod controller;
pub mod diag;
pub mod engine;
pub mod error;
pub mod layout;
pub mod trigger;
pub mod uart;

pub use error::{Error, Result};
