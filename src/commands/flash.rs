//! Flash an image into the emulated target

use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rboot_core::engine::{FlashTarget, HalfWordEngine, PageBufferEngine};
use rboot_core::layout::{FlashLayout, LayoutConfig};
use rboot_dummy::{MemFlash, MemFlashConfig, MockController, MockControllerConfig, VecDiag};

use super::{trace, CommandError, FLASH_BASE};
use crate::cli::Variant;

/// Program `input` at `base` through the selected engine variant and
/// verify the result against the emulated flash contents
pub fn run_flash(
    input: &Path,
    variant: Variant,
    base: u32,
    size_kb: u32,
    show_trace: bool,
) -> Result<(), CommandError> {
    let image = fs::read(input)?;
    if image.is_empty() {
        return Err(CommandError::EmptyImage);
    }
    let half_words = to_half_words(&image);
    let size = size_kb as usize * 1024;

    let config = LayoutConfig {
        flash_base: FLASH_BASE,
        app_base: base,
        page_size: variant.page_size(),
        size_override: Some(size_kb * 1024),
    };
    let page_half_words = (variant.page_size() / 2) as usize;

    let mut captured = VecDiag::new();
    let (erases, read_back) = match variant {
        Variant::HalfWord => {
            let mut flash = MemFlash::new(MemFlashConfig {
                base: FLASH_BASE,
                size,
                page_size: variant.page_size(),
            });
            let layout = FlashLayout::new(&config, &mut flash);
            check_fit(&image, base, &layout)?;

            let mut engine = HalfWordEngine::new(&mut flash, layout, &mut captured);
            program(&mut engine, base, &half_words, page_half_words)?;
            drop(engine);

            let offset = (base - FLASH_BASE) as usize;
            let read_back = flash.data()[offset..offset + image.len()].to_vec();
            (flash.erases().len(), read_back)
        }
        Variant::PageBuffer => {
            let mut controller = MockController::new(MockControllerConfig {
                flash_base: FLASH_BASE,
                size,
                ..MockControllerConfig::default()
            });
            let layout = FlashLayout::new(&config, &mut controller);
            check_fit(&image, base, &layout)?;

            let mut engine = PageBufferEngine::new(&mut controller, layout, &mut captured);
            program(&mut engine, base, &half_words, page_half_words)?;
            drop(engine);

            let offset = (base - FLASH_BASE) as usize;
            let read_back = controller.data()[offset..offset + image.len()].to_vec();
            (controller.erases().len(), read_back)
        }
    };

    if let Some(offset) = read_back.iter().zip(image.iter()).position(|(a, b)| a != b) {
        return Err(CommandError::ReadBackMismatch { offset });
    }

    println!(
        "Programmed {} bytes ({} half-words) at {:#010X}",
        image.len(),
        half_words.len(),
        base
    );
    println!("Pages erased:      {}", erases);
    println!("Read-back verify:  OK");

    if show_trace {
        println!();
        println!("Diagnostic stream ({} bytes):", captured.0.len());
        for line in trace::decode(&captured.0) {
            println!("  {}", line);
        }
    } else {
        println!(
            "Diagnostic stream: {} bytes (use --trace to decode)",
            captured.0.len()
        );
    }

    Ok(())
}

/// Walk the image page by page through the engine
fn program<E: FlashTarget>(
    engine: &mut E,
    base: u32,
    half_words: &[u16],
    page_half_words: usize,
) -> Result<(), CommandError> {
    let pages = half_words.len().div_ceil(page_half_words);
    let bar = ProgressBar::new(pages as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} pages")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    engine.unlock();
    let mut result = Ok(());
    for (i, chunk) in half_words.chunks(page_half_words).enumerate() {
        let addr = base + (i * page_half_words * 2) as u32;
        if let Err(e) = engine.program_array(addr, chunk) {
            result = Err(e);
            break;
        }
        bar.inc(1);
    }
    engine.lock();
    bar.finish_and_clear();

    Ok(result?)
}

fn check_fit(image: &[u8], base: u32, layout: &FlashLayout) -> Result<(), CommandError> {
    if base < layout.flash_base() {
        return Err(CommandError::Flash(rboot_core::Error::AddressOutOfBounds));
    }
    let available = layout.end().saturating_sub(base);
    if image.len() as u32 > available {
        return Err(CommandError::ImageTooLarge {
            actual: image.len(),
            available,
        });
    }
    Ok(())
}

/// Split the image into little-endian half-words, padding an odd trailing
/// byte with the erased value
fn to_half_words(image: &[u8]) -> Vec<u16> {
    let mut half_words = Vec::with_capacity(image.len().div_ceil(2));
    let mut pairs = image.chunks_exact(2);
    for pair in &mut pairs {
        half_words.push(u16::from_le_bytes([pair[0], pair[1]]));
    }
    if let [last] = pairs.remainder() {
        half_words.push(u16::from_le_bytes([*last, 0xFF]));
    }
    half_words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_images_pad_with_the_erased_value() {
        assert_eq!(to_half_words(&[0x11, 0x22, 0x33]), [0x2211, 0xFF33]);
        assert_eq!(to_half_words(&[0x11, 0x22]), [0x2211]);
    }
}
