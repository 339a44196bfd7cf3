//! Bootloader entry decision
//!
//! At boot the protocol layer asks once whether to stay in bootloader
//! mode. Two inputs feed the decision: a 16-bit backup-domain cell that
//! survives reset (so a running application can request one bootloader
//! entry), and an optional physical button sampled after a debounce delay.

/// Persisted backup-domain cell surviving a device reset
pub trait BackupRegister {
    /// Read the 16-bit cell
    fn read(&mut self) -> u16;

    /// Overwrite the 16-bit cell
    fn write(&mut self, value: u16);
}

/// Raw button input level
pub trait InputPin {
    /// True when the pin reads high
    fn is_high(&mut self) -> bool;
}

/// Busy-wait delay source
pub trait Delay {
    /// Spin for roughly `cycles` processor cycles
    fn delay_cycles(&mut self, cycles: u32);
}

/// Command value that requests one bootloader entry ("BO")
pub const FORCE_BOOTLOADER_COMMAND: u16 = 0x4F42;

/// Button wiring of the board
#[derive(Debug, Clone, Copy)]
pub struct ButtonConfig {
    /// True when a pressed button pulls the pin high
    pub active_high: bool,
    /// Cycles to wait before sampling, for boards with a debounce capacitor
    pub debounce_cycles: u32,
}

/// Decide bootloader entry from the persisted command alone
///
/// The cell is cleared unconditionally so a single request affects exactly
/// one boot, whatever its value was.
pub fn should_force_bootloader(backup: &mut impl BackupRegister) -> bool {
    let command = backup.read();
    backup.write(0);
    command == FORCE_BOOTLOADER_COMMAND
}

/// Decide bootloader entry from the persisted command and a button
///
/// The button is sampled once after the debounce delay; its polarity comes
/// from the board configuration. Either input alone forces entry.
pub fn should_force_bootloader_with_button(
    backup: &mut impl BackupRegister,
    pin: &mut impl InputPin,
    delay: &mut impl Delay,
    config: ButtonConfig,
) -> bool {
    let mut force = should_force_bootloader(backup);

    delay.delay_cycles(config.debounce_cycles);
    if pin.is_high() == config.active_high {
        force = true;
    }

    force
}
