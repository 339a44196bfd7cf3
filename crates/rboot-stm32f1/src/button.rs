//! Boot button input

use rboot_core::trigger::{Delay, InputPin};

/// Input data register offset within a GPIO port block
const GPIO_IDR: u32 = 0x08;

/// GPIO port base addresses
pub mod ports {
    /// Port A
    pub const GPIOA: u32 = 0x4001_0800;
    /// Port B
    pub const GPIOB: u32 = 0x4001_0C00;
    /// Port C
    pub const GPIOC: u32 = 0x4001_1000;
}

/// One GPIO input pin
pub struct GpioPin {
    idr: u32,
    mask: u32,
}

impl GpioPin {
    /// Access pin `pin` on the port at `port_base` (see [`ports`])
    ///
    /// # Safety
    ///
    /// The port must be clocked and the pin configured as an input by
    /// the board init code.
    pub unsafe fn new(port_base: u32, pin: u8) -> Self {
        Self {
            idr: port_base + GPIO_IDR,
            mask: 1 << pin,
        }
    }
}

impl InputPin for GpioPin {
    fn is_high(&mut self) -> bool {
        let idr = unsafe { core::ptr::read_volatile(self.idr as *const u32) };
        idr & self.mask != 0
    }
}

/// Delay that burns processor cycles in a spin loop
pub struct CycleDelay;

impl Delay for CycleDelay {
    fn delay_cycles(&mut self, cycles: u32) {
        for _ in 0..cycles {
            core::hint::spin_loop();
        }
    }
}
