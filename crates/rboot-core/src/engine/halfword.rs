//! Generic half-word flash write engine
//!
//! Programs flash one half-word at a time through the
//! [`HalfWordFlash`] primitives, erasing lazily: a page is erased at most
//! once per contiguous write run, tracked by a window of addresses known
//! to be erased.

use crate::controller::HalfWordFlash;
use crate::diag::{self, DiagSink};
use crate::error::{Error, Result, VerifyFailure};
use crate::layout::FlashLayout;

use super::FlashTarget;

/// Address range already known to be erased
///
/// Starts empty; any destination outside the window forces a fresh page
/// erase. After each programmed half-word the start advances past the
/// written address, so rewriting an address re-erases its page.
#[derive(Debug, Clone, Copy, Default)]
struct ErasedWindow {
    start: u32,
    end: u32,
}

impl ErasedWindow {
    fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Flash write engine for the generic half-word controller
pub struct HalfWordEngine<F, T> {
    flash: F,
    layout: FlashLayout,
    trace: T,
    window: ErasedWindow,
}

impl<F: HalfWordFlash, T: DiagSink> HalfWordEngine<F, T> {
    /// Compose the engine from its controller, layout and trace sink
    pub fn new(flash: F, layout: FlashLayout, trace: T) -> Self {
        Self {
            flash,
            layout,
            trace,
            window: ErasedWindow::default(),
        }
    }

    /// Forget the erased window, forcing the next write to erase
    ///
    /// Called by [`unlock`](FlashTarget::unlock) so each flashing session
    /// starts without stale knowledge from the previous one.
    pub fn reset_window(&mut self) {
        self.window = ErasedWindow::default();
    }

    /// Release the underlying controller
    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: HalfWordFlash, T: DiagSink> FlashTarget for HalfWordEngine<F, T> {
    fn unlock(&mut self) {
        self.flash.unlock();
        self.reset_window();
        self.trace.send(&[diag::STATUS_UNLOCK]);
    }

    fn lock(&mut self) {
        self.flash.lock();
        self.trace.send(&[diag::STATUS_LOCK]);
    }

    fn erase_page(&mut self, addr: u32) {
        self.flash.erase_page(self.layout.page_base(addr));
        self.trace.send(&[diag::STATUS_ERASE]);
    }

    fn program_array(&mut self, dest: u32, data: &[u16]) -> Result<()> {
        self.trace.send(&diag::page_frame(dest, data.len()));
        log::debug!(
            "half-word program: {} half-words at {:#010X}",
            data.len(),
            dest
        );

        let mut dest = dest;
        for &value in data {
            // Detect exhaustion before writing out of bounds. Half-words
            // already written stay written; there is no rollback.
            if dest >= self.layout.end() {
                return Err(Error::AddressOutOfBounds);
            }

            if !self.window.contains(dest) {
                let page = self.layout.page_base(dest);
                self.erase_page(page);
                self.window = ErasedWindow {
                    start: page,
                    end: page + self.layout.page_size(),
                };
            }

            self.flash.program_half_word(dest, value);
            self.window.start = dest + 2;

            let found = self.flash.read_half_word(dest);
            if found != value {
                return Err(Error::VerifyError(VerifyFailure {
                    addr: dest,
                    expected: value,
                    found,
                }));
            }

            dest += 2;
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
    use crate::controller::DeviceInfo;
    use crate::diag::NullDiag;
    use crate::layout::LayoutConfig;
    use std::vec;
    use std::vec::Vec;

    const FLASH_BASE: u32 = 0x0800_0000;
    const APP_BASE: u32 = 0x0800_2000;
    const PAGE_SIZE: u32 = 1024;
    const FLASH_SIZE: u32 = 16 * 1024;

    /// In-memory flash with the 1->0 programming rule and operation logs
    struct MockFlash {
        data: Vec<u8>,
        erases: Vec<u32>,
        locked: bool,
    }

    impl MockFlash {
        fn new() -> Self {
            Self {
                data: vec![0xFF; FLASH_SIZE as usize],
                erases: Vec::new(),
                locked: true,
            }
        }

        fn index(addr: u32) -> usize {
            (addr - FLASH_BASE) as usize
        }
    }

    impl HalfWordFlash for MockFlash {
        fn unlock(&mut self) {
            self.locked = false;
        }

        fn lock(&mut self) {
            self.locked = true;
        }

        fn erase_page(&mut self, addr: u32) {
            self.erases.push(addr);
            let start = Self::index(addr);
            for byte in &mut self.data[start..start + PAGE_SIZE as usize] {
                *byte = 0xFF;
            }
        }

        fn program_half_word(&mut self, addr: u32, value: u16) {
            if self.locked {
                return;
            }
            let i = Self::index(addr);
            // flash programming can only clear bits
            self.data[i] &= value as u8;
            self.data[i + 1] &= (value >> 8) as u8;
        }

        fn read_half_word(&mut self, addr: u32) -> u16 {
            let i = Self::index(addr);
            u16::from(self.data[i]) | (u16::from(self.data[i + 1]) << 8)
        }
    }

    impl DeviceInfo for MockFlash {
        fn flash_size_kb(&mut self) -> u32 {
            FLASH_SIZE / 1024
        }
    }

    fn layout() -> FlashLayout {
        FlashLayout::new(
            &LayoutConfig {
                flash_base: FLASH_BASE,
                app_base: APP_BASE,
                page_size: PAGE_SIZE,
                size_override: None,
            },
            &mut MockFlash::new(),
        )
    }

    fn engine() -> HalfWordEngine<MockFlash, NullDiag> {
        let mut engine = HalfWordEngine::new(MockFlash::new(), layout(), NullDiag);
        engine.unlock();
        engine
    }

    #[test]
    fn round_trip_and_one_erase_per_page() {
        let mut engine = engine();

        // two and a half pages of ascending half-words
        let data: Vec<u16> = (0..1280u16).map(|v| !v).collect();
        engine.program_array(APP_BASE, &data).unwrap();

        let flash = &mut engine.flash;
        for (i, &value) in data.iter().enumerate() {
            assert_eq!(flash.read_half_word(APP_BASE + 2 * i as u32), value);
        }
        assert_eq!(flash.erases, vec![APP_BASE, APP_BASE + 1024, APP_BASE + 2048]);
    }

    #[test]
    fn window_survives_contiguous_calls() {
        let mut engine = engine();

        engine.program_array(APP_BASE, &[0x1111, 0x2222]).unwrap();
        engine.program_array(APP_BASE + 4, &[0x3333]).unwrap();

        // second call continued inside the erased page: still one erase
        assert_eq!(engine.flash.erases.len(), 1);
        assert_eq!(engine.flash.read_half_word(APP_BASE), 0x1111);
        assert_eq!(engine.flash.read_half_word(APP_BASE + 4), 0x3333);
    }

    #[test]
    fn rewriting_an_address_erases_again() {
        let mut engine = engine();

        engine.program_array(APP_BASE, &[0x1234]).unwrap();
        engine.program_array(APP_BASE, &[0x4321]).unwrap();

        assert_eq!(engine.flash.erases.len(), 2);
        assert_eq!(engine.flash.read_half_word(APP_BASE), 0x4321);
    }

    #[test]
    fn unlock_resets_the_window() {
        let mut engine = engine();

        engine.program_array(APP_BASE, &[0x1111]).unwrap();
        engine.unlock();
        engine.program_array(APP_BASE + 2, &[0x2222]).unwrap();

        // the fresh session may not trust the old erase
        assert_eq!(engine.flash.erases, vec![APP_BASE, APP_BASE]);
    }

    #[test]
    fn out_of_bounds_fails_before_touching_flash() {
        let mut engine = engine();
        let end = FLASH_BASE + FLASH_SIZE;

        assert_eq!(
            engine.program_array(end, &[0x1111]),
            Err(Error::AddressOutOfBounds)
        );
        assert!(engine.flash.erases.is_empty());
        assert!(engine.flash.data.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn run_past_end_stops_at_the_boundary() {
        let mut engine = engine();
        let end = FLASH_BASE + FLASH_SIZE;

        // last half-word of flash, then one beyond
        let result = engine.program_array(end - 2, &[0xAAAA, 0xBBBB]);
        assert_eq!(result, Err(Error::AddressOutOfBounds));

        // the in-bounds half-word was written and stays written
        assert_eq!(engine.flash.read_half_word(end - 2), 0xAAAA);
    }

    #[test]
    fn verify_mismatch_aborts_without_rollback() {
        let mut engine = engine();

        // a locked controller ignores programming, so read-back mismatches
        engine.program_array(APP_BASE, &[0x1111]).unwrap();
        engine.lock();
        let result = engine.program_array(APP_BASE + 2, &[0x2222]);

        match result {
            Err(Error::VerifyError(failure)) => {
                assert_eq!(failure.addr, APP_BASE + 2);
                assert_eq!(failure.expected, 0x2222);
            }
            other => panic!("expected verify failure, got {:?}", other),
        }
    }

    #[test]
    fn fails_closed_on_zero_capacity() {
        // end below the application base: report zero and refuse writes
        let layout = FlashLayout::new(
            &LayoutConfig {
                flash_base: FLASH_BASE,
                app_base: APP_BASE,
                page_size: PAGE_SIZE,
                size_override: Some(0x1000),
            },
            &mut MockFlash::new(),
        );
        let mut engine = HalfWordEngine::new(MockFlash::new(), layout, NullDiag);
        engine.unlock();

        assert_eq!(engine.max_firmware_size(), 0);
        assert_eq!(
            engine.program_array(APP_BASE, &[0x1111]),
            Err(Error::AddressOutOfBounds)
        );
        assert!(engine.flash.erases.is_empty());
    }
}
