//! Interrupt-driven transmit ring buffer
//!
//! Diagnostic bytes are queued from main-line code and drained one byte at
//! a time by the transmit-register-empty interrupt, so flash operations
//! never wait for the serial line. The queue is single-producer /
//! single-consumer: each index is written by exactly one side, and index
//! updates are single atomic-width stores, so no lock is needed.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::diag::DiagSink;

/// Default transmit queue capacity in bytes
pub const DEFAULT_CAPACITY: usize = 1024;

/// Hardware side of the transmitter
pub trait TxUart {
    /// Hand one byte to the transmit data register
    fn write_data(&mut self, byte: u8);

    /// Arm or disarm the transmit-register-empty interrupt
    fn set_tx_empty_interrupt(&mut self, enabled: bool);
}

impl<T: TxUart + ?Sized> TxUart for &mut T {
    fn write_data(&mut self, byte: u8) {
        (**self).write_data(byte)
    }

    fn set_tx_empty_interrupt(&mut self, enabled: bool) {
        (**self).set_tx_empty_interrupt(enabled)
    }
}

/// Fixed-capacity byte queue shared between main line and interrupt
///
/// The buffer is empty iff the indices are equal; one slot is sacrificed so
/// that it can never reach "full". An enqueue that would collide with the
/// read index discards the remainder of the payload.
pub struct TxRing<const N: usize> {
    storage: UnsafeCell<[u8; N]>,
    read_index: AtomicUsize,
    write_index: AtomicUsize,
}

// One producer context and one interrupt consumer; each slot is written
// before the write index is released and read before the read index is
// released, so the UnsafeCell accesses never overlap.
unsafe impl<const N: usize> Sync for TxRing<N> {}

impl<const N: usize> TxRing<N> {
    /// Create an empty ring
    pub const fn new() -> Self {
        Self {
            storage: UnsafeCell::new([0; N]),
            read_index: AtomicUsize::new(0),
            write_index: AtomicUsize::new(0),
        }
    }

    /// True when no bytes are queued
    pub fn is_empty(&self) -> bool {
        self.read_index.load(Ordering::Acquire) == self.write_index.load(Ordering::Acquire)
    }

    /// Number of queued bytes
    pub fn len(&self) -> usize {
        let rd = self.read_index.load(Ordering::Acquire);
        let wr = self.write_index.load(Ordering::Acquire);
        (wr + N - rd) % N
    }

    /// Producer side: queue as much of `bytes` as fits
    ///
    /// Returns the number of bytes accepted; the tail of an overflowing
    /// burst is dropped, not wrapped over unread data.
    pub fn enqueue(&self, bytes: &[u8]) -> usize {
        let mut wr = self.write_index.load(Ordering::Relaxed);
        let mut accepted = 0;
        for &byte in bytes {
            let next = (wr + 1) % N;
            if next == self.read_index.load(Ordering::Acquire) {
                // overflow, discard remaining data
                break;
            }
            unsafe { (*self.storage.get())[wr] = byte };
            self.write_index.store(next, Ordering::Release);
            wr = next;
            accepted += 1;
        }
        accepted
    }

    /// Consumer side: take the oldest byte, if any
    pub fn dequeue(&self) -> Option<u8> {
        let rd = self.read_index.load(Ordering::Relaxed);
        if rd == self.write_index.load(Ordering::Acquire) {
            return None;
        }
        let byte = unsafe { (*self.storage.get())[rd] };
        self.read_index.store((rd + 1) % N, Ordering::Release);
        Some(byte)
    }
}

impl<const N: usize> Default for TxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue `bytes` for transmission and arm the drain interrupt
///
/// Main-line entry point. Bytes past the free capacity are silently
/// dropped; the interrupt is armed only when at least one byte was
/// accepted. Returns the number of bytes accepted.
pub fn send<const N: usize>(ring: &TxRing<N>, uart: &mut impl TxUart, bytes: &[u8]) -> usize {
    let accepted = ring.enqueue(bytes);
    if accepted > 0 {
        uart.set_tx_empty_interrupt(true);
    }
    accepted
}

/// Body of the transmit-register-empty interrupt handler
///
/// Hands exactly one byte to the hardware per invocation; disarms the
/// interrupt once the queue is empty.
pub fn on_tx_empty<const N: usize>(ring: &TxRing<N>, uart: &mut impl TxUart) {
    match ring.dequeue() {
        Some(byte) => uart.write_data(byte),
        None => uart.set_tx_empty_interrupt(false),
    }
}

/// Producer handle pairing a ring with its hardware register access
///
/// Implements [`DiagSink`] for the engines' tracing and
/// [`embedded_io::Write`] for formatted output. Both drop overflow
/// silently, so the error type is infallible.
pub struct TxPort<'a, const N: usize, U: TxUart> {
    ring: &'a TxRing<N>,
    uart: U,
}

impl<'a, const N: usize, U: TxUart> TxPort<'a, N, U> {
    /// Bind a ring to the producer-side hardware access
    pub fn new(ring: &'a TxRing<N>, uart: U) -> Self {
        Self { ring, uart }
    }

    /// Queue bytes and arm the drain interrupt
    pub fn send(&mut self, bytes: &[u8]) -> usize {
        send(self.ring, &mut self.uart, bytes)
    }
}

impl<const N: usize, U: TxUart> DiagSink for TxPort<'_, N, U> {
    fn send(&mut self, bytes: &[u8]) {
        TxPort::send(self, bytes);
    }
}

impl<const N: usize, U: TxUart> embedded_io::ErrorType for TxPort<'_, N, U> {
    type Error = core::convert::Infallible;
}

impl<const N: usize, U: TxUart> embedded_io::Write for TxPort<'_, N, U> {
    fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, Self::Error> {
        Ok(self.send(buf))
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}
