//! Register-level emulation of the page-buffered flash controller
//!
//! Implements [`FlashMmio`] over an in-memory register file and flash
//! array, faithfully enough that both engines can be driven against it:
//! the two-stage key sequences, the page buffer with its load batches, the
//! busy flag (reported busy for a deterministic number of status reads
//! after each operation, so the engines' spin loops actually spin), and
//! the program-error / write-protect-error fault flags.

use rboot_core::controller::{DeviceInfo, FlashMmio};
use rboot_core::engine::regs::{self, Cr, Sr};

/// Configuration for the emulated controller
#[derive(Debug, Clone, Copy)]
pub struct MockControllerConfig {
    /// Address the flash array is mapped at
    pub flash_base: u32,
    /// Flash array size in bytes
    pub size: usize,
    /// Page size of the standard (PER) erase path in bytes
    pub per_page_size: u32,
    /// Status reads that report busy after each operation
    pub busy_reads: u8,
}

impl Default for MockControllerConfig {
    fn default() -> Self {
        Self {
            flash_base: 0x0800_0000,
            size: 16 * 1024,
            per_page_size: 1024,
            busy_reads: 2,
        }
    }
}

/// Emulated page-buffered flash controller
pub struct MockController {
    config: MockControllerConfig,
    data: Vec<u8>,
    cr: u32,
    sr: u32,
    ar: u32,
    key_stage: bool,
    mode_key_stage: bool,
    unlocked: bool,
    mode_unlocked: bool,
    page_buffer: [u8; regs::PAGE_SIZE as usize],
    busy_countdown: u8,
    /// Force write-protect faults on every commit and erase
    pub write_protected: bool,
    erases: Vec<u32>,
    commits: Vec<u32>,
    refreshes: Vec<u32>,
}

impl MockController {
    /// Create a locked controller over a fully-erased array
    pub fn new(config: MockControllerConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            cr: Cr::LOCK.bits(),
            sr: 0,
            ar: 0,
            key_stage: false,
            mode_key_stage: false,
            unlocked: false,
            mode_unlocked: false,
            page_buffer: [0xFF; regs::PAGE_SIZE as usize],
            busy_countdown: 0,
            write_protected: false,
            erases: Vec::new(),
            commits: Vec::new(),
            refreshes: Vec::new(),
        }
    }

    /// Create a controller with `initial` pre-programmed at the base
    pub fn with_data(config: MockControllerConfig, initial: &[u8]) -> Self {
        let mut controller = Self::new(config);
        let len = initial.len().min(controller.data.len());
        controller.data[..len].copy_from_slice(&initial[..len]);
        controller
    }

    /// Get the configuration
    pub fn config(&self) -> &MockControllerConfig {
        &self.config
    }

    /// Get a reference to the flash array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True while the controller accepts write operations
    pub fn is_unlocked(&self) -> bool {
        self.unlocked && self.mode_unlocked
    }

    /// Page addresses erased, in order
    pub fn erases(&self) -> &[u32] {
        &self.erases
    }

    /// Page addresses committed from the page buffer, in order
    pub fn commits(&self) -> &[u32] {
        &self.commits
    }

    /// Values written to the cache control register, in order
    pub fn refreshes(&self) -> &[u32] {
        &self.refreshes
    }

    fn in_flash(&self, addr: u32) -> bool {
        addr >= self.config.flash_base
            && addr < self.config.flash_base + self.config.size as u32
    }

    fn index(&self, addr: u32) -> usize {
        (addr - self.config.flash_base) as usize
    }

    fn cr(&self) -> Cr {
        Cr::from_bits_truncate(self.cr)
    }

    fn start_operation(&mut self) {
        self.busy_countdown = self.config.busy_reads;
    }

    fn fault(&mut self, flag: Sr) {
        self.sr |= flag.bits();
    }

    fn erase(&mut self, addr: u32, page_size: u32) {
        let page = addr & !(page_size - 1);
        log::trace!("mock erase of {} bytes at {:#010X}", page_size, page);
        self.erases.push(page);
        if self.write_protected {
            self.fault(Sr::WRPRTERR);
            return;
        }
        if !self.in_flash(page) {
            return;
        }
        let start = self.index(page);
        let end = start + page_size as usize;
        for byte in &mut self.data[start..end] {
            *byte = 0xFF;
        }
    }

    fn commit_page_buffer(&mut self) {
        let page = self.ar & !regs::PAGE_MASK;
        log::trace!("mock page-buffer commit at {:#010X}", page);
        self.commits.push(page);
        if self.write_protected {
            self.fault(Sr::WRPRTERR);
            return;
        }
        if !self.in_flash(page) {
            return;
        }
        let start = self.index(page);
        for i in 0..self.page_buffer.len() {
            let wanted = self.page_buffer[i];
            let old = self.data[start + i];
            let programmed = old & wanted;
            self.data[start + i] = programmed;
            if programmed != wanted {
                // tried to raise a bit in a non-erased location
                self.fault(Sr::PGERR);
            }
        }
        self.page_buffer = [0xFF; regs::PAGE_SIZE as usize];
    }

    fn handle_cr_write(&mut self, value: u32) {
        let rising = Cr::from_bits_truncate(value & !self.cr);
        let new = Cr::from_bits_truncate(value);

        if rising.contains(Cr::LOCK) {
            self.unlocked = false;
            self.mode_unlocked = false;
        }

        if !self.unlocked {
            // a locked controller latches the lock bit and nothing else
            self.cr |= value & Cr::LOCK.bits();
            return;
        }

        if rising.contains(Cr::BUF_RST) && new.contains(Cr::PAGE_PROGRAM) && self.mode_unlocked {
            self.page_buffer = [0xFF; regs::PAGE_SIZE as usize];
            self.start_operation();
        }

        if rising.contains(Cr::BUF_LOAD) && new.contains(Cr::PAGE_PROGRAM) && self.mode_unlocked {
            // staging writes already landed in the buffer
            self.start_operation();
        }

        if rising.contains(Cr::STRT) {
            if new.contains(Cr::PAGE_ERASE) {
                // the fast operations additionally need the mode key
                if self.mode_unlocked {
                    self.erase(self.ar, regs::PAGE_SIZE);
                } else {
                    self.fault(Sr::WRPRTERR);
                }
            } else if new.contains(Cr::PAGE_PROGRAM) {
                if self.mode_unlocked {
                    self.commit_page_buffer();
                } else {
                    self.fault(Sr::WRPRTERR);
                }
            } else if new.contains(Cr::PER) {
                self.erase(self.ar, self.config.per_page_size);
            }
            self.start_operation();
        }

        // the start and buffer strobes self-clear when the operation ends
        self.cr = value & !(Cr::STRT | Cr::BUF_RST | Cr::BUF_LOAD).bits();
    }

    fn handle_key_write(&mut self, value: u32) {
        if value == regs::KEY1 {
            self.key_stage = true;
        } else if self.key_stage && value == regs::KEY2 {
            self.unlocked = true;
            self.key_stage = false;
            self.cr &= !Cr::LOCK.bits();
        } else {
            self.key_stage = false;
        }
    }

    fn handle_mode_key_write(&mut self, value: u32) {
        if value == regs::KEY1 {
            self.mode_key_stage = true;
        } else if self.mode_key_stage && value == regs::KEY2 {
            self.mode_unlocked = true;
            self.mode_key_stage = false;
        } else {
            self.mode_key_stage = false;
        }
    }

    fn stage_into_page_buffer(&mut self, addr: u32, value: u32) {
        // the hardware latches whole word lanes
        let offset = (addr & regs::PAGE_MASK & !3) as usize;
        self.page_buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl FlashMmio for MockController {
    fn read32(&mut self, addr: u32) -> u32 {
        match addr {
            regs::FLASH_SR => {
                if self.busy_countdown > 0 {
                    self.busy_countdown -= 1;
                    self.sr | Sr::BSY.bits()
                } else {
                    self.sr
                }
            }
            regs::FLASH_CR => self.cr,
            regs::FLASH_AR => self.ar,
            regs::FLASH_KEYR | regs::FLASH_MODEKEYR | regs::FLASH_CACHE_CTL => 0,
            _ if self.in_flash(addr) && self.in_flash(addr + 3) => {
                let i = self.index(addr);
                let mut word = [0u8; 4];
                word.copy_from_slice(&self.data[i..i + 4]);
                u32::from_le_bytes(word)
            }
            _ => 0xFFFF_FFFF,
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        match addr {
            regs::FLASH_KEYR => self.handle_key_write(value),
            regs::FLASH_MODEKEYR => self.handle_mode_key_write(value),
            regs::FLASH_CR => self.handle_cr_write(value),
            regs::FLASH_AR => self.ar = value,
            regs::FLASH_SR => {
                // write one to clear
                let clearable = Sr::PGERR | Sr::WRPRTERR | Sr::EOP;
                self.sr &= !(value & clearable.bits());
            }
            regs::FLASH_CACHE_CTL => self.refreshes.push(value),
            _ if self.in_flash(addr) && self.cr().contains(Cr::PAGE_PROGRAM) => {
                if self.is_unlocked() {
                    self.stage_into_page_buffer(addr, value);
                }
            }
            _ => {}
        }
    }

    fn read16(&mut self, addr: u32) -> u16 {
        if !self.in_flash(addr) || !self.in_flash(addr + 1) {
            return 0xFFFF;
        }
        let i = self.index(addr);
        u16::from(self.data[i]) | (u16::from(self.data[i + 1]) << 8)
    }

    fn write16(&mut self, addr: u32, value: u16) {
        // standard half-word programming path (PG bit)
        if !self.in_flash(addr) || !self.in_flash(addr + 1) || !self.cr().contains(Cr::PG) || !self.unlocked
        {
            return;
        }
        let i = self.index(addr);
        self.data[i] &= value as u8;
        self.data[i + 1] &= (value >> 8) as u8;
        self.start_operation();
    }
}

impl DeviceInfo for MockController {
    fn flash_size_kb(&mut self) -> u32 {
        (self.config.size / 1024) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VecDiag;
    use rboot_core::diag::{self, NullDiag};
    use rboot_core::engine::{FlashTarget, PageBufferEngine};
    use rboot_core::error::Error;
    use rboot_core::layout::{FlashLayout, LayoutConfig};

    const APP_OFFSET: u32 = 0x2000;

    fn layout(controller: &mut MockController) -> FlashLayout {
        let config = *controller.config();
        FlashLayout::new(
            &LayoutConfig {
                flash_base: config.flash_base,
                app_base: config.flash_base + APP_OFFSET,
                page_size: regs::PAGE_SIZE,
                size_override: None,
            },
            controller,
        )
    }

    fn engine(
        controller: &mut MockController,
    ) -> PageBufferEngine<&mut MockController, NullDiag> {
        let layout = layout(controller);
        PageBufferEngine::new(controller, layout, NullDiag)
    }

    #[test]
    fn end_to_end_three_half_words() {
        let mut controller = MockController::new(MockControllerConfig::default());
        let app_base = controller.config().flash_base + APP_OFFSET;
        {
            let mut engine = engine(&mut controller);
            engine.unlock();
            engine
                .program_array(app_base, &[0x1111, 0x2222, 0x3333])
                .unwrap();
            engine.lock();
        }

        // one page erase, one commit, and the data reads back out of order
        assert_eq!(controller.erases(), [app_base]);
        assert_eq!(controller.commits(), [app_base]);
        assert_eq!(controller.read16(app_base + 4), 0x3333);
        assert_eq!(controller.read16(app_base), 0x1111);
        assert_eq!(controller.read16(app_base + 2), 0x2222);
        // the unprogrammed upper half of the trailing word stays erased
        assert_eq!(controller.read16(app_base + 6), 0xFFFF);
    }

    #[test]
    fn multi_page_run_erases_and_commits_each_page() {
        let mut controller = MockController::new(MockControllerConfig::default());
        let app_base = controller.config().flash_base + APP_OFFSET;
        let data: Vec<u16> = (0..65u16).map(|v| 0x4000 | v).collect();
        {
            let mut engine = engine(&mut controller);
            engine.unlock();
            engine.program_array(app_base, &data).unwrap();
        }

        // 65 half-words = one full page plus one half-word on the next
        assert_eq!(controller.erases(), [app_base, app_base + 128]);
        assert_eq!(controller.commits(), [app_base, app_base + 128]);
        for (i, &value) in data.iter().enumerate() {
            assert_eq!(controller.read16(app_base + 2 * i as u32), value);
        }
    }

    #[test]
    fn locked_controller_faults_instead_of_writing() {
        let mut controller = MockController::new(MockControllerConfig::default());
        let app_base = controller.config().flash_base + APP_OFFSET;
        let result = {
            let mut engine = engine(&mut controller);
            // no unlock
            engine.program_array(app_base, &[0x1234])
        };

        assert!(result.is_err());
        assert!(controller.data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn programming_non_erased_flash_reports_the_fault_and_clears_it() {
        let mut controller = MockController::new(MockControllerConfig::default());
        let app_base = controller.config().flash_base + APP_OFFSET;
        {
            let mut engine = engine(&mut controller);
            engine.unlock();
            engine.program_array(app_base, &[0x0000]).unwrap();

            // second commit over the same page without an erase in between
            let result = engine.program_page(app_base, &[0xFFFF]);
            assert_eq!(
                result,
                Err(Error::ControllerFault {
                    program_error: true,
                    write_protect_error: false,
                })
            );
        }

        // the engine cleared the fault flags before returning
        assert_eq!(controller.read32(regs::FLASH_SR) & Sr::PGERR.bits(), 0);
    }

    #[test]
    fn write_protect_fault_is_surfaced() {
        let mut controller = MockController::new(MockControllerConfig::default());
        controller.write_protected = true;
        let app_base = controller.config().flash_base + APP_OFFSET;
        let result = {
            let mut engine = engine(&mut controller);
            engine.unlock();
            engine.program_array(app_base, &[0x1234])
        };

        assert_eq!(
            result,
            Err(Error::ControllerFault {
                program_error: false,
                write_protect_error: true,
            })
        );
    }

    #[test]
    fn erratum_refresh_runs_after_every_committing_operation() {
        let mut controller = MockController::new(MockControllerConfig::default());
        let app_base = controller.config().flash_base + APP_OFFSET;
        {
            let mut engine = engine(&mut controller);
            engine.unlock();
            // 9 half-words: two load batches (8 + 1)
            let data: Vec<u16> = (0..9u16).collect();
            engine.program_array(app_base, &data).unwrap();
        }

        // one refresh per erase, one per load batch, one per commit
        assert_eq!(controller.refreshes().len(), 1 + 2 + 1);
    }

    #[test]
    fn diagnostics_frame_the_whole_session() {
        let mut controller = MockController::new(MockControllerConfig::default());
        let app_base = controller.config().flash_base + APP_OFFSET;
        let layout = layout(&mut controller);
        let mut trace = VecDiag::new();
        {
            let mut engine = PageBufferEngine::new(&mut controller, layout, &mut trace);
            engine.unlock();
            engine.program_array(app_base, &[0x1111]).unwrap();
            engine.lock();
        }

        let mut expected = Vec::new();
        expected.push(diag::STATUS_UNLOCK);
        expected.extend_from_slice(&diag::session_frame(1));
        expected.extend_from_slice(&diag::page_frame(app_base, 1));
        expected.push(diag::STATUS_ERASE);
        expected.extend_from_slice(&diag::page_frame(app_base, 1));
        expected.push(diag::STATUS_PROGRAM);
        expected.push(diag::STATUS_LOCK);
        assert_eq!(trace.0, expected);
    }

    #[test]
    fn busy_flag_spins_the_engine_without_wedging_it() {
        let config = MockControllerConfig {
            busy_reads: 7,
            ..MockControllerConfig::default()
        };
        let mut controller = MockController::new(config);
        let app_base = controller.config().flash_base + APP_OFFSET;
        {
            let mut engine = engine(&mut controller);
            engine.unlock();
            engine.program_array(app_base, &[0xBEEF]).unwrap();
        }
        assert_eq!(controller.read16(app_base), 0xBEEF);
    }
}
