//! Diagnostic byte stream decoding

use std::fs;
use std::path::Path;

use super::CommandError;

/// Decode a raw diagnostic capture into human-readable lines
pub fn decode(bytes: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'U' => {
                lines.push("controller unlocked".to_string());
                i += 1;
            }
            b'L' => {
                lines.push("controller locked".to_string());
                i += 1;
            }
            b'E' => {
                lines.push("page erased".to_string());
                i += 1;
            }
            b'P' => {
                lines.push("page programmed".to_string());
                i += 1;
            }
            b'A' => {
                // A=<8 hex>,C=<4 hex>\n
                match bytes.get(i..i + 18).and_then(parse_page_frame) {
                    Some((addr, count)) => {
                        lines.push(format!(
                            "page operation: addr={:#010X} count={} half-words",
                            addr, count
                        ));
                        i += 18;
                    }
                    None => {
                        lines.push(format!("truncated or garbled frame at offset {}", i));
                        break;
                    }
                }
            }
            b'S' => {
                // S<6 decimal>|
                match bytes.get(i..i + 8).and_then(parse_session_frame) {
                    Some(count) => {
                        lines.push(format!("session start: {} half-words", count));
                        i += 8;
                    }
                    None => {
                        lines.push(format!("truncated or garbled frame at offset {}", i));
                        break;
                    }
                }
            }
            b'.' => {
                // .I=<4 hex>\n
                match bytes.get(i..i + 8).and_then(parse_idle_frame) {
                    Some(state) => {
                        lines.push(format!("heartbeat: state {:#06X}", state));
                        i += 8;
                    }
                    None => {
                        lines.push(format!("truncated or garbled frame at offset {}", i));
                        break;
                    }
                }
            }
            other => {
                lines.push(format!("unknown byte {:#04X} at offset {}", other, i));
                i += 1;
            }
        }
    }

    lines
}

fn parse_page_frame(frame: &[u8]) -> Option<(u32, u32)> {
    if !frame.starts_with(b"A=") || frame[10..13] != *b",C=" || frame[17] != b'\n' {
        return None;
    }
    let addr = hex_field(&frame[2..10])?;
    let count = hex_field(&frame[13..17])?;
    Some((addr, count))
}

fn parse_session_frame(frame: &[u8]) -> Option<u32> {
    if frame[0] != b'S' || frame[7] != b'|' {
        return None;
    }
    std::str::from_utf8(&frame[1..7]).ok()?.parse().ok()
}

fn parse_idle_frame(frame: &[u8]) -> Option<u32> {
    if !frame.starts_with(b".I=") || frame[7] != b'\n' {
        return None;
    }
    hex_field(&frame[3..7])
}

fn hex_field(digits: &[u8]) -> Option<u32> {
    u32::from_str_radix(std::str::from_utf8(digits).ok()?, 16).ok()
}

/// Decode a capture file and print it
pub fn run_trace(input: &Path) -> Result<(), CommandError> {
    let bytes = fs::read(input)?;
    log::info!("decoding {} captured bytes", bytes.len());

    for line in decode(&bytes) {
        println!("{}", line);
    }

    Ok(())
}
