//! Volatile access to the peripheral address space

use rboot_core::controller::FlashMmio;

/// Raw volatile accessor over absolute peripheral addresses
pub struct RawMmio {
    _private: (),
}

impl RawMmio {
    /// Create the accessor
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to the flash controller
    /// registers and the flash data window for the lifetime of the value.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl FlashMmio for RawMmio {
    fn read32(&mut self, addr: u32) -> u32 {
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
    }

    fn read16(&mut self, addr: u32) -> u16 {
        unsafe { core::ptr::read_volatile(addr as *const u16) }
    }

    fn write16(&mut self, addr: u32, value: u16) {
        unsafe { core::ptr::write_volatile(addr as *mut u16, value) }
    }
}
