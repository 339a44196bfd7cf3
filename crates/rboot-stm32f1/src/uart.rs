//! USART1 transmit register hookup

use rboot_core::uart::{on_tx_empty, TxRing, TxUart};

const USART1_BASE: u32 = 0x4001_3800;
const USART1_SR: u32 = USART1_BASE;
const USART1_DR: u32 = USART1_BASE + 0x04;
const USART1_CR1: u32 = USART1_BASE + 0x0C;

/// SR: transmit data register empty
const SR_TXE: u32 = 1 << 7;
/// CR1: transmit-empty interrupt enable
const CR1_TXEIE: u32 = 1 << 7;

/// Producer/consumer access to the USART1 transmitter
pub struct Usart1Tx {
    _private: (),
}

impl Usart1Tx {
    /// Create the accessor
    ///
    /// # Safety
    ///
    /// USART1 must be clocked and configured for transmission, and the
    /// caller must not race another owner of CR1 (the interrupt handler
    /// and the main line each construct their own access; the TXEIE bit
    /// is the only contended field and is read-modify-written from both
    /// sides only while the other is not running, per the single
    /// producer / single consumer discipline of the ring).
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    /// True when the hardware raised transmit-empty while armed
    pub fn tx_empty_pending(&self) -> bool {
        let cr1 = unsafe { core::ptr::read_volatile(USART1_CR1 as *const u32) };
        let sr = unsafe { core::ptr::read_volatile(USART1_SR as *const u32) };
        cr1 & CR1_TXEIE != 0 && sr & SR_TXE != 0
    }
}

impl TxUart for Usart1Tx {
    fn write_data(&mut self, byte: u8) {
        unsafe { core::ptr::write_volatile(USART1_DR as *mut u32, u32::from(byte)) }
    }

    fn set_tx_empty_interrupt(&mut self, enabled: bool) {
        unsafe {
            let cr1 = core::ptr::read_volatile(USART1_CR1 as *const u32);
            let cr1 = if enabled {
                cr1 | CR1_TXEIE
            } else {
                cr1 & !CR1_TXEIE
            };
            core::ptr::write_volatile(USART1_CR1 as *mut u32, cr1);
        }
    }
}

/// Body of the USART1 interrupt vector
///
/// Checks that the wakeup really is an armed transmit-empty event, then
/// drains exactly one byte from the ring.
///
/// # Safety
///
/// Must only be called from the USART1 interrupt handler, with `ring`
/// being the same ring the main line enqueues into.
pub unsafe fn usart1_tx_isr<const N: usize>(ring: &TxRing<N>) {
    let mut uart = unsafe { Usart1Tx::new() };
    if uart.tx_empty_pending() {
        on_tx_empty(ring, &mut uart);
    }
}
