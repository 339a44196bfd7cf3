//! rboot-stm32f1 - Register backend for STM32F103/CH32F103-class targets
//!
//! Implements the core's capability traits over the real peripheral
//! register map: the flash controller (both the generic half-word
//! protocol and raw word access for the page-buffered engine), the
//! USART1 transmit register, the backup-domain cell carrying the
//! bootloader request, and a GPIO input pin for the boot button.
//!
//! Everything here is a thin volatile shim; all sequencing and policy
//! lives in `rboot-core`. Constructors are `unsafe` because the caller
//! promises exclusive access to the peripheral and that clocks (and, for
//! the backup domain, write access) are already set up by the board init
//! code.

#![no_std]
#![warn(rust_2018_idioms)]

mod backup;
mod button;
mod flash;
mod mmio;
mod uart;

pub use backup::BackupCell;
pub use button::{ports, CycleDelay, GpioPin};
pub use flash::F1Flash;
pub use mmio::RawMmio;
pub use uart::{usart1_tx_isr, Usart1Tx};
