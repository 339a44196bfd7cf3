//! Command implementations

pub mod flash;
pub mod trace;

use crate::cli::Variant;
use rboot_core::layout::{FlashLayout, LayoutConfig};

/// Address the emulated flash region is mapped at
pub const FLASH_BASE: u32 = 0x0800_0000;

/// Errors surfaced by the commands
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("image is empty")]
    EmptyImage,

    #[error("image ({actual} bytes) exceeds usable flash ({available} bytes)")]
    ImageTooLarge {
        /// Image size on disk
        actual: usize,
        /// Bytes between the destination and the flash end
        available: u32,
    },

    #[error("flashed data does not match the image at offset {offset:#X}")]
    ReadBackMismatch { offset: usize },

    #[error("flash operation failed: {0}")]
    Flash(#[from] rboot_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Show the computed flash layout for the given parameters
pub fn run_info(variant: Variant, base: u32, size_kb: u32) {
    let layout = FlashLayout::new(
        &LayoutConfig {
            flash_base: FLASH_BASE,
            app_base: base,
            page_size: variant.page_size(),
            size_override: Some(size_kb * 1024),
        },
        // capacity is overridden, the probe is never consulted
        &mut NoProbe,
    );

    println!("Flash Layout");
    println!("============");
    println!("Variant:           {:?}", variant);
    println!("Flash base:        {:#010X}", layout.flash_base());
    println!("Application base:  {:#010X}", layout.app_base());
    println!("Flash end:         {:#010X}", layout.end());
    println!("Page size:         {} bytes", layout.page_size());
    println!(
        "Max firmware size: {} bytes ({} KiB)",
        layout.max_firmware_size(),
        layout.max_firmware_size() / 1024
    );
}

struct NoProbe;

impl rboot_core::controller::DeviceInfo for NoProbe {
    fn flash_size_kb(&mut self) -> u32 {
        0
    }
}
