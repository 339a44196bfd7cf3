//! Page-buffered flash write engine with the cache-refresh erratum
//! workaround
//!
//! The alternate controller family programs through a 128-byte page
//! buffer: words are staged in batches of four, loaded into the buffer,
//! and committed to the array in one operation. After every committing
//! operation the controller's read cache must be refreshed manually by
//! reading a word at the target address XOR 0x100 and writing it to the
//! cache control register.

use crate::controller::FlashMmio;
use crate::diag::{self, DiagSink};
use crate::error::{Error, Result, VerifyFailure};
use crate::layout::FlashLayout;

use super::regs::{self, Cr, Sr};
use super::FlashTarget;

/// Flash write engine for the page-buffered controller
pub struct PageBufferEngine<M, T> {
    mmio: M,
    layout: FlashLayout,
    trace: T,
}

impl<M: FlashMmio, T: DiagSink> PageBufferEngine<M, T> {
    /// Compose the engine from its register access, layout and trace sink
    pub fn new(mmio: M, layout: FlashLayout, trace: T) -> Self {
        Self {
            mmio,
            layout,
            trace,
        }
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

    /// Erratum workaround: force a cache-line refresh after a commit
    fn cache_refresh(&mut self, addr: u32) {
        let word = self.mmio.read32(addr ^ regs::CACHE_REFRESH_XOR);
        self.mmio.write32(regs::FLASH_CACHE_CTL, word);
    }

    /// Program one page through the page buffer
    ///
    /// `addr` must be page aligned and `data` must fit the page buffer;
    /// both are checked before any register is touched. The page must
    /// already be erased.
    pub fn program_page(&mut self, addr: u32, data: &[u16]) -> Result<()> {
        self.trace.send(&diag::page_frame(addr, data.len()));

        if addr & regs::PAGE_MASK != 0 {
            return Err(Error::InvalidAlignment);
        }
        if data.len() > regs::PAGE_HALF_WORDS {
            return Err(Error::PageOverflow);
        }

        // drop anything left in the page buffer
        self.cr_set(Cr::PAGE_PROGRAM);
        self.cr_set(Cr::BUF_RST);
        self.wait_not_busy();
        self.cr_clear(Cr::PAGE_PROGRAM);

        let mut word_addr = addr;
        let mut remaining = data;
        while !remaining.is_empty() {
            let batch_start = word_addr;
            self.cr_set(Cr::PAGE_PROGRAM);

            let mut slots = regs::WORDS_PER_BATCH;
            while remaining.len() > 1 && slots > 0 {
                let word = u32::from(remaining[0]) | (u32::from(remaining[1]) << 16);
                self.mmio.write32(word_addr, word);
                word_addr += 4;
                remaining = &remaining[2..];
                slots -= 1;
            }
            if remaining.len() == 1 && slots > 0 {
                // trailing odd half-word, upper half left erased
                self.mmio
                    .write32(word_addr, 0xFFFF_0000 | u32::from(remaining[0]));
                word_addr += 4;
                remaining = &remaining[1..];
            }

            self.cr_set(Cr::BUF_LOAD);
            self.wait_not_busy();
            self.cr_clear(Cr::PAGE_PROGRAM);
            self.cache_refresh(batch_start);
        }

        // commit the buffered page to the array
        self.cr_set(Cr::PAGE_PROGRAM);
        self.mmio.write32(regs::FLASH_AR, addr);
        self.cr_set(Cr::STRT);
        self.wait_not_busy();
        self.cr_clear(Cr::PAGE_PROGRAM);
        self.cache_refresh(addr);

        let sr = Sr::from_bits_truncate(self.mmio.read32(regs::FLASH_SR));
        let faults = sr & (Sr::PGERR | Sr::WRPRTERR);
        if !faults.is_empty() {
            self.mmio.write32(regs::FLASH_SR, faults.bits());
            return Err(Error::ControllerFault {
                program_error: sr.contains(Sr::PGERR),
                write_protect_error: sr.contains(Sr::WRPRTERR),
            });
        }

        self.trace.send(&[diag::STATUS_PROGRAM]);
        Ok(())
    }
}

impl<M: FlashMmio, T: DiagSink> FlashTarget for PageBufferEngine<M, T> {
    fn unlock(&mut self) {
        self.mmio.write32(regs::FLASH_KEYR, regs::KEY1);
        self.mmio.write32(regs::FLASH_KEYR, regs::KEY2);
        self.mmio.write32(regs::FLASH_MODEKEYR, regs::KEY1);
        self.mmio.write32(regs::FLASH_MODEKEYR, regs::KEY2);
        self.trace.send(&[diag::STATUS_UNLOCK]);
    }

    fn lock(&mut self) {
        self.cr_set(Cr::LOCK);
        self.trace.send(&[diag::STATUS_LOCK]);
    }

    fn erase_page(&mut self, addr: u32) {
        let addr = addr & !regs::PAGE_MASK;
        self.cr_set(Cr::PAGE_ERASE);
        self.mmio.write32(regs::FLASH_AR, addr);
        self.cr_set(Cr::STRT);
        self.wait_not_busy();
        self.cr_clear(Cr::PAGE_ERASE);
        self.cache_refresh(addr);
        self.trace.send(&[diag::STATUS_ERASE]);
    }

    fn program_array(&mut self, dest: u32, data: &[u16]) -> Result<()> {
        self.trace.send(&diag::session_frame(data.len()));
        self.trace.send(&diag::page_frame(dest, data.len()));
        log::debug!(
            "page-buffer program: {} half-words at {:#010X}",
            data.len(),
            dest
        );

        if dest & regs::PAGE_MASK != 0 {
            return Err(Error::InvalidAlignment);
        }
        // the whole run must fit below the flash end before anything is
        // erased; a partial update across the boundary is never attempted
        let len_bytes = (data.len() as u32) * 2;
        if dest >= self.layout.end() || len_bytes > self.layout.end() - dest {
            return Err(Error::AddressOutOfBounds);
        }

        for (index, chunk) in data.chunks(regs::PAGE_HALF_WORDS).enumerate() {
            let addr = dest + (index as u32) * regs::PAGE_SIZE;
            self.erase_page(addr);
            self.program_page(addr, chunk)?;

            for (offset, &expected) in chunk.iter().enumerate() {
                let read_addr = addr + (offset as u32) * 2;
                let found = self.mmio.read16(read_addr);
                if found != expected {
                    return Err(Error::VerifyError(VerifyFailure {
                        addr: read_addr,
                        expected,
                        found,
                    }));
                }
            }
        }

        Ok(())
    }

    fn max_firmware_size(&self) -> u32 {
        self.layout.max_firmware_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::NullDiag;
    use crate::layout::{FlashLayout, LayoutConfig};
    use std::vec::Vec;

    /// Register access that only records; status always reads idle
    #[derive(Default)]
    struct RecordingMmio {
        writes: Vec<(u32, u32)>,
    }

    impl FlashMmio for RecordingMmio {
        fn read32(&mut self, _addr: u32) -> u32 {
            0
        }

        fn write32(&mut self, addr: u32, value: u32) {
            self.writes.push((addr, value));
        }

        fn read16(&mut self, _addr: u32) -> u16 {
            0xFFFF
        }

        fn write16(&mut self, addr: u32, value: u16) {
            self.writes.push((addr, u32::from(value)));
        }
    }

    fn engine() -> PageBufferEngine<RecordingMmio, NullDiag> {
        let layout = FlashLayout::new(
            &LayoutConfig {
                flash_base: 0x0800_0000,
                app_base: 0x0800_2000,
                page_size: regs::PAGE_SIZE,
                size_override: Some(16 * 1024),
            },
            &mut Fixed16K,
        );
        PageBufferEngine::new(RecordingMmio::default(), layout, NullDiag)
    }

    struct Fixed16K;

    impl crate::controller::DeviceInfo for Fixed16K {
        fn flash_size_kb(&mut self) -> u32 {
            16
        }
    }

    #[test]
    fn misaligned_page_is_rejected_before_hardware() {
        let mut engine = engine();
        assert_eq!(
            engine.program_page(0x0800_2001, &[0x1111]),
            Err(Error::InvalidAlignment)
        );
        assert!(engine.mmio.writes.is_empty());
    }

    #[test]
    fn oversized_page_is_rejected_before_hardware() {
        let mut engine = engine();
        let data = [0u16; 65];
        assert_eq!(
            engine.program_page(0x0800_2000, &data),
            Err(Error::PageOverflow)
        );
        assert!(engine.mmio.writes.is_empty());
    }

    #[test]
    fn misaligned_array_is_rejected_before_hardware() {
        let mut engine = engine();
        assert_eq!(
            engine.program_array(0x0800_2002, &[0x1111]),
            Err(Error::InvalidAlignment)
        );
        assert!(engine.mmio.writes.is_empty());
    }

    #[test]
    fn run_past_flash_end_is_rejected_before_hardware() {
        let mut engine = engine();
        let end = 0x0800_0000 + 16 * 1024;

        assert_eq!(
            engine.program_array(end, &[0x1111]),
            Err(Error::AddressOutOfBounds)
        );
        // in bounds but the run pokes out past the end
        assert_eq!(
            engine.program_array(end - 128, &[0u16; 65]),
            Err(Error::AddressOutOfBounds)
        );
        assert!(engine.mmio.writes.is_empty());
    }

    #[test]
    fn unlock_issues_both_key_sequences() {
        let mut engine = engine();
        engine.unlock();
        assert_eq!(
            engine.mmio.writes,
            [
                (regs::FLASH_KEYR, regs::KEY1),
                (regs::FLASH_KEYR, regs::KEY2),
                (regs::FLASH_MODEKEYR, regs::KEY1),
                (regs::FLASH_MODEKEYR, regs::KEY2),
            ]
        );
    }

    #[test]
    fn odd_tail_half_word_keeps_upper_half_erased() {
        let mut engine = engine();
        engine.program_page(0x0800_2000, &[0x1111, 0x2222, 0x3333]).unwrap();

        let data_writes: Vec<&(u32, u32)> = engine
            .mmio
            .writes
            .iter()
            .filter(|(addr, _)| (0x0800_2000..0x0800_2080).contains(addr))
            .collect();
        assert_eq!(
            data_writes,
            [&(0x0800_2000, 0x2222_1111), &(0x0800_2004, 0xFFFF_3333)]
        );
    }
}
