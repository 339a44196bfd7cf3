//! Backup-domain data cell

use rboot_core::trigger::BackupRegister;

const BKP_BASE: u32 = 0x4000_6C00;

/// One 16-bit backup data register surviving reset
///
/// The cells sit in the low half of 32-bit registers starting at
/// BKP_DR1; writes require backup-domain access to have been enabled by
/// the board init code.
pub struct BackupCell {
    addr: u32,
}

impl BackupCell {
    /// Access backup data register `index` (1-based, BKP_DR1 = 1)
    ///
    /// # Safety
    ///
    /// The backup domain must be clocked and write-enabled, and the
    /// caller must be the only user of this cell.
    pub unsafe fn new(index: u32) -> Self {
        Self {
            addr: BKP_BASE + 4 * index,
        }
    }
}

impl BackupRegister for BackupCell {
    fn read(&mut self) -> u16 {
        unsafe { core::ptr::read_volatile(self.addr as *const u32) as u16 }
    }

    fn write(&mut self, value: u16) {
        unsafe { core::ptr::write_volatile(self.addr as *mut u32, u32::from(value)) }
    }
}
