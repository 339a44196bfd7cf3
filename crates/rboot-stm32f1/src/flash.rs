//! Half-word programming protocol of the F1 flash controller
//!
//! The standard controller programs one half-word at a time: unlock with
//! the two-key sequence, select page erase or programming in CR, and spin
//! on the busy flag until the operation completes. This is the backend
//! for the generic `HalfWordEngine`; the page-buffered parts drive
//! `PageBufferEngine` over [`RawMmio`](crate::RawMmio) directly instead.

use rboot_core::controller::{DeviceInfo, FlashMmio, HalfWordFlash};
use rboot_core::engine::regs::{self, Cr, Sr};

/// Electronic signature register holding the flash capacity in KiB
const DESIG_FLASH_SIZE: u32 = 0x1FFF_F7E0;

/// F1 flash controller behind the half-word primitives
///
/// Generic over [`FlashMmio`] so the protocol itself can be exercised
/// against an emulated register file.
pub struct F1Flash<M> {
    mmio: M,
}

impl<M: FlashMmio> F1Flash<M> {
    /// Wrap register access into the half-word protocol
    pub fn new(mmio: M) -> Self {
        Self { mmio }
    }

    /// Release the underlying register access
    pub fn into_inner(self) -> M {
        self.mmio
    }

    fn cr_set(&mut self, bits: Cr) {
        let cr = self.mmio.read32(regs::FLASH_CR);
        self.mmio.write32(regs::FLASH_CR, cr | bits.bits());
    }

    fn cr_clear(&mut self, bits: Cr) {
        let cr = self.mmio.read32(regs::FLASH_CR);
        self.mmio.write32(regs::FLASH_CR, cr & !bits.bits());
    }

    fn wait_not_busy(&mut self) {
        while Sr::from_bits_truncate(self.mmio.read32(regs::FLASH_SR)).contains(Sr::BSY) {}
    }
}

impl<M: FlashMmio> HalfWordFlash for F1Flash<M> {
    fn unlock(&mut self) {
        log::debug!("unlocking flash controller");
        self.mmio.write32(regs::FLASH_KEYR, regs::KEY1);
        self.mmio.write32(regs::FLASH_KEYR, regs::KEY2);
    }

    fn lock(&mut self) {
        self.cr_set(Cr::LOCK);
    }

    fn erase_page(&mut self, addr: u32) {
        self.cr_set(Cr::PER);
        self.mmio.write32(regs::FLASH_AR, addr);
        self.cr_set(Cr::STRT);
        self.wait_not_busy();
        self.cr_clear(Cr::PER);
    }

    fn program_half_word(&mut self, addr: u32, value: u16) {
        self.cr_set(Cr::PG);
        self.mmio.write16(addr, value);
        self.wait_not_busy();
        self.cr_clear(Cr::PG);
    }

    fn read_half_word(&mut self, addr: u32) -> u16 {
        self.mmio.read16(addr)
    }
}

impl<M: FlashMmio> DeviceInfo for F1Flash<M> {
    fn flash_size_kb(&mut self) -> u32 {
        // low half-word of the electronic signature block
        u32::from(self.mmio.read16(DESIG_FLASH_SIZE))
    }
}
