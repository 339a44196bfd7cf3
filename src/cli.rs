//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "rboot")]
#[command(author, version, about = "Bootloader flash engine simulator", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flash controller variant to emulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    /// Generic half-word programmer (1 KiB pages)
    HalfWord,
    /// Page-buffered controller with the erratum workaround (128 B pages)
    PageBuffer,
}

impl Variant {
    /// Erase page size of the emulated controller
    pub fn page_size(self) -> u32 {
        match self {
            Variant::HalfWord => 1024,
            Variant::PageBuffer => rboot_core::engine::regs::PAGE_SIZE,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Program a firmware image into the emulated target and verify it
    Flash {
        /// Image file to program
        #[arg(short, long)]
        input: PathBuf,

        /// Controller variant
        #[arg(long, value_enum, default_value = "page-buffer")]
        variant: Variant,

        /// Destination address of the image
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x08002000")]
        base: u32,

        /// Emulated flash capacity in KiB
        #[arg(long, default_value_t = 64)]
        size_kb: u32,

        /// Decode the captured diagnostic stream after flashing
        #[arg(long)]
        trace: bool,
    },

    /// Decode a captured diagnostic byte stream
    Trace {
        /// Capture file (raw bytes as received from the serial line)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show the computed flash layout
    Info {
        /// Controller variant
        #[arg(long, value_enum, default_value = "page-buffer")]
        variant: Variant,

        /// Destination address of the image
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x08002000")]
        base: u32,

        /// Emulated flash capacity in KiB
        #[arg(long, default_value_t = 64)]
        size_kb: u32,
    },
}
