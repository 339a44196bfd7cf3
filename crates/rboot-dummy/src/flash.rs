//! In-memory flash behind the half-word programming primitives

use rboot_core::controller::{DeviceInfo, HalfWordFlash};

/// Configuration for the emulated flash array
#[derive(Debug, Clone, Copy)]
pub struct MemFlashConfig {
    /// Address the array is mapped at
    pub base: u32,
    /// Array size in bytes
    pub size: usize,
    /// Erase page size in bytes
    pub page_size: u32,
}

impl Default for MemFlashConfig {
    fn default() -> Self {
        Self {
            base: 0x0800_0000,
            size: 64 * 1024,
            page_size: 1024,
        }
    }
}

/// Emulated flash array for the generic half-word controller
///
/// Models the physics that matter to the engine: erase sets a whole page
/// to 0xFF, programming can only clear bits, and a locked controller
/// ignores programming entirely (which the engine's read-back verify then
/// catches). All erase and program operations are logged for assertions.
pub struct MemFlash {
    config: MemFlashConfig,
    data: Vec<u8>,
    erases: Vec<u32>,
    programs: Vec<(u32, u16)>,
    locked: bool,
}

impl MemFlash {
    /// Create a fully-erased array
    pub fn new(config: MemFlashConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            erases: Vec::new(),
            programs: Vec::new(),
            locked: true,
        }
    }

    /// Create an array pre-filled with `initial` at the base address
    pub fn with_data(config: MemFlashConfig, initial: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = initial.len().min(flash.data.len());
        flash.data[..len].copy_from_slice(&initial[..len]);
        flash
    }

    /// Get the configuration
    pub fn config(&self) -> &MemFlashConfig {
        &self.config
    }

    /// Get a reference to the array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Addresses of all page erases, in order
    pub fn erases(&self) -> &[u32] {
        &self.erases
    }

    /// All half-word programs, in order
    pub fn programs(&self) -> &[(u32, u16)] {
        &self.programs
    }

    fn index(&self, addr: u32) -> usize {
        (addr - self.config.base) as usize
    }
}

impl HalfWordFlash for MemFlash {
    fn unlock(&mut self) {
        self.locked = false;
    }

    fn lock(&mut self) {
        self.locked = true;
    }

    fn erase_page(&mut self, addr: u32) {
        let page = addr & !(self.config.page_size - 1);
        self.erases.push(page);
        if self.locked {
            return;
        }
        let start = self.index(page);
        let end = start + self.config.page_size as usize;
        for byte in &mut self.data[start..end] {
            *byte = 0xFF;
        }
    }

    fn program_half_word(&mut self, addr: u32, value: u16) {
        self.programs.push((addr, value));
        if self.locked {
            return;
        }
        let i = self.index(addr);
        // flash programming only clears bits
        self.data[i] &= value as u8;
        self.data[i + 1] &= (value >> 8) as u8;
    }

    fn read_half_word(&mut self, addr: u32) -> u16 {
        let i = self.index(addr);
        u16::from(self.data[i]) | (u16::from(self.data[i + 1]) << 8)
    }
}

impl DeviceInfo for MemFlash {
    fn flash_size_kb(&mut self) -> u32 {
        (self.config.size / 1024) as u32
    }
}
