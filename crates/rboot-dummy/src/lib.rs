//! rboot-dummy - In-memory hardware emulation for testing
//!
//! This crate emulates the bootloader's hardware collaborators in memory:
//! a flash array behind the half-word programming primitives, a
//! register-level model of the page-buffered controller (with
//! deterministic busy/done transitions for the engines' spin loops), and
//! a capturing UART for the diagnostic byte stream. It's useful for
//! testing and for the host-side simulator, without real hardware.

mod controller;
mod flash;

pub use controller::{MockController, MockControllerConfig};
pub use flash::{MemFlash, MemFlashConfig};

use rboot_core::diag::DiagSink;
use rboot_core::uart::TxUart;

/// UART that records everything handed to the transmit register
#[derive(Debug, Default)]
pub struct CapturedUart {
    /// Bytes written to the data register, in order
    pub sent: Vec<u8>,
    /// Current state of the transmit-empty interrupt mask
    pub armed: bool,
}

impl CapturedUart {
    /// Create a disarmed UART with nothing sent
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire drain events until the interrupt is disarmed
    pub fn drain<const N: usize>(&mut self, ring: &rboot_core::uart::TxRing<N>) {
        while self.armed {
            rboot_core::uart::on_tx_empty(ring, self);
        }
    }
}

impl TxUart for CapturedUart {
    fn write_data(&mut self, byte: u8) {
        self.sent.push(byte);
    }

    fn set_tx_empty_interrupt(&mut self, enabled: bool) {
        self.armed = enabled;
    }
}

/// Diagnostic sink that appends every frame to a byte vector
#[derive(Debug, Default)]
pub struct VecDiag(pub Vec<u8>);

impl VecDiag {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagSink for VecDiag {
    fn send(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }
}
