//! rboot - driver and simulator for the bootloader flash core
//!
//! Exercises the two flash write engines from `rboot-core` against the
//! in-memory hardware emulation from `rboot-dummy`: program a firmware
//! image, verify it byte for byte, and decode the diagnostic byte stream
//! the engines emit over the (captured) serial line. Useful for working
//! on the engines and for reading field trace captures without a target
//! board attached.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Flash {
            input,
            variant,
            base,
            size_kb,
            trace,
        } => commands::flash::run_flash(&input, variant, base, size_kb, trace)?,
        Commands::Trace { input } => commands::trace::run_trace(&input)?,
        Commands::Info {
            variant,
            base,
            size_kb,
        } => commands::run_info(variant, base, size_kb),
    }

    Ok(())
}
