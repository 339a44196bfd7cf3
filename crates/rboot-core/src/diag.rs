//! Diagnostic byte protocol encoder
//!
//! The bootloader reports its progress over the serial line as compact
//! ASCII frames so field failures can be traced with nothing but a
//! terminal. Frames are assembled into small fixed-capacity buffers and
//! handed to a [`DiagSink`]; the engines depend on the sink for tracing
//! only, never for correctness, and a sink is free to drop bytes.

use heapless::Vec;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Length of the address/count trace frame
pub const PAGE_FRAME_LEN: usize = 18;
/// Length of the session-size and idle frames
pub const SHORT_FRAME_LEN: usize = 8;

/// Status byte emitted after the controller is unlocked
pub const STATUS_UNLOCK: u8 = b'U';
/// Status byte emitted after the controller is locked
pub const STATUS_LOCK: u8 = b'L';
/// Status byte emitted after a page erase completes
pub const STATUS_ERASE: u8 = b'E';
/// Status byte emitted after a page program commit succeeds
pub const STATUS_PROGRAM: u8 = b'P';

/// Consumer of diagnostic bytes
///
/// Implementations may drop data (queue overflow is silent by design); the
/// engines never observe whether a frame made it out.
pub trait DiagSink {
    /// Hand a frame (or a single status byte) to the transmit path
    fn send(&mut self, bytes: &[u8]);
}

impl<T: DiagSink + ?Sized> DiagSink for &mut T {
    fn send(&mut self, bytes: &[u8]) {
        (**self).send(bytes)
    }
}

/// Sink that throws all diagnostics away (tracing disabled)
pub struct NullDiag;

impl DiagSink for NullDiag {
    fn send(&mut self, _bytes: &[u8]) {}
}

/// `A=<8 hex>,C=<4 hex>\n` - address/count frame before a page operation
pub fn page_frame(addr: u32, half_words: usize) -> Vec<u8, PAGE_FRAME_LEN> {
    let mut frame = Vec::new();
    let _ = frame.extend_from_slice(b"A=00000000,C=0000\n");
    let mut value = addr;
    for i in 0..8 {
        frame[9 - i] = HEX[(value & 0xF) as usize];
        value >>= 4;
    }
    let mut value = half_words as u32;
    for i in 0..4 {
        frame[16 - i] = HEX[(value & 0xF) as usize];
        value >>= 4;
    }
    frame
}

/// `S<6 decimal>|` - total half-word count at session entry
pub fn session_frame(half_words: usize) -> Vec<u8, SHORT_FRAME_LEN> {
    let mut frame = Vec::new();
    let _ = frame.extend_from_slice(b"S000000|");
    let mut value = half_words;
    for i in 0..6 {
        frame[6 - i] = b'0' + (value % 10) as u8;
        value /= 10;
    }
    frame
}

/// `.I=<4 hex>\n` - heartbeat frame carrying the protocol state word
pub fn idle_frame(state: u16) -> Vec<u8, SHORT_FRAME_LEN> {
    let mut frame = Vec::new();
    let _ = frame.extend_from_slice(b".I=0000\n");
    let mut value = state;
    for i in 0..4 {
        frame[6 - i] = HEX[(value & 0xF) as usize];
        value >>= 4;
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_frame_pads_hex_fields() {
        assert_eq!(page_frame(0x0800_2000, 3).as_slice(), b"A=08002000,C=0003\n");
        assert_eq!(page_frame(0, 0).as_slice(), b"A=00000000,C=0000\n");
        assert_eq!(
            page_frame(0xDEAD_BEEF, 0xABC).as_slice(),
            b"A=DEADBEEF,C=0ABC\n"
        );
    }

    #[test]
    fn session_frame_is_decimal() {
        assert_eq!(session_frame(3).as_slice(), b"S000003|");
        assert_eq!(session_frame(123_456).as_slice(), b"S123456|");
    }

    #[test]
    fn idle_frame_carries_state_word() {
        assert_eq!(idle_frame(0x02FE).as_slice(), b".I=02FE\n");
    }
}
