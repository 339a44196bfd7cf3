//! Flash address space bookkeeping
//!
//! The layout is computed once at engine initialization and is immutable
//! afterwards. The flash end is taken either from an explicit size override
//! or from the chip's self-reported capacity.

use crate::controller::DeviceInfo;

/// Parameters the composition root supplies to compute a [`FlashLayout`]
#[derive(Debug, Clone, Copy)]
pub struct LayoutConfig {
    /// Start of the flash region in the address map
    pub flash_base: u32,
    /// First address available to the application image
    pub app_base: u32,
    /// Erase page size in bytes (power of two)
    pub page_size: u32,
    /// Fixed flash size in bytes; `None` queries the chip at init
    pub size_override: Option<u32>,
}

/// The resolved flash address space
#[derive(Debug, Clone, Copy)]
pub struct FlashLayout {
    flash_base: u32,
    app_base: u32,
    page_size: u32,
    end: u32,
}

impl FlashLayout {
    /// Resolve the layout, querying the device capacity unless overridden
    pub fn new(config: &LayoutConfig, device: &mut impl DeviceInfo) -> Self {
        debug_assert!(config.page_size.is_power_of_two());
        let size = config
            .size_override
            .unwrap_or_else(|| device.flash_size_kb() * 1024);
        let end = config.flash_base.saturating_add(size);
        log::debug!(
            "flash layout: base={:#010X} app={:#010X} end={:#010X} page={}",
            config.flash_base,
            config.app_base,
            end,
            config.page_size
        );
        Self {
            flash_base: config.flash_base,
            app_base: config.app_base,
            page_size: config.page_size,
            end,
        }
    }

    /// Start of the flash region
    pub fn flash_base(&self) -> u32 {
        self.flash_base
    }

    /// First address available to the application image
    pub fn app_base(&self) -> u32 {
        self.app_base
    }

    /// Erase page size in bytes
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// One past the last usable flash address
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Usable bytes between the application base and the flash end
    ///
    /// Reports zero when the end lies below the application base; the
    /// engines then fail every write closed.
    pub fn max_firmware_size(&self) -> u32 {
        if self.end >= self.app_base {
            self.end - self.app_base
        } else {
            0
        }
    }

    /// Base address of the page containing `addr`
    pub fn page_base(&self, addr: u32) -> u32 {
        addr & !(self.page_size - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCapacity(u32);

    impl DeviceInfo for FixedCapacity {
        fn flash_size_kb(&mut self) -> u32 {
            self.0
        }
    }

    const CONFIG: LayoutConfig = LayoutConfig {
        flash_base: 0x0800_0000,
        app_base: 0x0800_2000,
        page_size: 1024,
        size_override: None,
    };

    #[test]
    fn queried_capacity() {
        let layout = FlashLayout::new(&CONFIG, &mut FixedCapacity(64));
        assert_eq!(layout.end(), 0x0801_0000);
        assert_eq!(layout.max_firmware_size(), 0x1_0000 - 0x2000);
    }

    #[test]
    fn override_wins_over_query() {
        let config = LayoutConfig {
            size_override: Some(128 * 1024),
            ..CONFIG
        };
        let layout = FlashLayout::new(&config, &mut FixedCapacity(64));
        assert_eq!(layout.end(), 0x0802_0000);
    }

    #[test]
    fn fails_closed_when_end_below_app_base() {
        let config = LayoutConfig {
            size_override: Some(0x1000),
            ..CONFIG
        };
        let layout = FlashLayout::new(&config, &mut FixedCapacity(64));
        assert_eq!(layout.max_firmware_size(), 0);
    }

    #[test]
    fn page_base_masks_low_bits() {
        let layout = FlashLayout::new(&CONFIG, &mut FixedCapacity(64));
        assert_eq!(layout.page_base(0x0800_2401), 0x0800_2400);
        assert_eq!(layout.page_base(0x0800_27FF), 0x0800_2400);
        assert_eq!(layout.page_base(0x0800_2800), 0x0800_2800);
    }
}
