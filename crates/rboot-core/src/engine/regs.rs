//! Register map of the memory-mapped flash controller
//!
//! Offsets and bit assignments shared by both controller families; the
//! page-buffer mode bits (upper half of CR) and the auxiliary mode-key
//! register exist only on the page-buffered parts.

use bitflags::bitflags;

/// Base address of the flash controller register block
pub const FLASH_R_BASE: u32 = 0x4002_2000;
/// Main key register opening write access
pub const FLASH_KEYR: u32 = FLASH_R_BASE + 0x04;
/// Status register
pub const FLASH_SR: u32 = FLASH_R_BASE + 0x0C;
/// Control register
pub const FLASH_CR: u32 = FLASH_R_BASE + 0x10;
/// Address register for erase and page commits
pub const FLASH_AR: u32 = FLASH_R_BASE + 0x14;
/// Auxiliary key register opening the page-buffer programming mode
pub const FLASH_MODEKEYR: u32 = FLASH_R_BASE + 0x24;
/// Cache-line control register used by the erratum workaround
pub const FLASH_CACHE_CTL: u32 = FLASH_R_BASE + 0x34;

/// First half of the unlock key sequence
pub const KEY1: u32 = 0x4567_0123;
/// Second half of the unlock key sequence
pub const KEY2: u32 = 0xCDEF_89AB;

/// Page size of the page-buffered controller in bytes
pub const PAGE_SIZE: u32 = 128;
/// Address bits inside one page of the page-buffered controller
pub const PAGE_MASK: u32 = 0x7F;
/// Page buffer capacity in half-words
pub const PAGE_HALF_WORDS: usize = 64;
/// Words staged into the page buffer per load batch
pub const WORDS_PER_BATCH: usize = 4;
/// Address offset XORed in for the erratum cache-refresh read
pub const CACHE_REFRESH_XOR: u32 = 0x100;

bitflags! {
    /// Control register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cr: u32 {
        /// Half-word programming
        const PG = 1 << 0;
        /// Page erase
        const PER = 1 << 1;
        /// Mass erase
        const MER = 1 << 2;
        /// Start the selected erase operation
        const STRT = 1 << 6;
        /// Lock the controller
        const LOCK = 1 << 7;
        /// Page-buffer programming mode
        const PAGE_PROGRAM = 1 << 16;
        /// Page-buffer erase mode
        const PAGE_ERASE = 1 << 17;
        /// Load the staged words into the page buffer
        const BUF_LOAD = 1 << 18;
        /// Reset the page buffer
        const BUF_RST = 1 << 19;
    }

    /// Status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Sr: u32 {
        /// Operation in progress
        const BSY = 1 << 0;
        /// Programming error (write to a non-erased location)
        const PGERR = 1 << 2;
        /// Write-protection error
        const WRPRTERR = 1 << 4;
        /// End of operation
        const EOP = 1 << 5;
    }
}
