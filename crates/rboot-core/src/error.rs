//! Error types for rboot-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. All flash operations fail with a local error
//! value; there is no unwinding and no internal retry.

use core::fmt;

/// Details about a read-back verification failure
///
/// Flash is left in whatever partially-written state produced the mismatch;
/// no rollback capability exists at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyFailure {
    /// Address of the half-word that read back wrong
    pub addr: u32,
    /// The value that was programmed
    pub expected: u16,
    /// The value read back from flash
    pub found: u16,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Parameter rejection - detected before any hardware mutation
    /// Destination is not aligned to the required page boundary
    InvalidAlignment,
    /// More half-words than the controller's page buffer can hold
    PageOverflow,
    /// Destination runs at or past the end of the flash region
    AddressOutOfBounds,

    // Operation errors
    /// Programmed data read back with a different value
    VerifyError(VerifyFailure),
    /// Controller fault flags observed after a commit (page-buffered
    /// variant); the flags have been cleared before returning
    ControllerFault {
        /// Program-error flag was set
        program_error: bool,
        /// Write-protect-error flag was set
        write_protect_error: bool,
    },
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "verify failed at {:#010X}: wrote {:#06X}, read {:#06X}",
            self.addr, self.expected, self.found
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAlignment => write!(f, "destination not page aligned"),
            Self::PageOverflow => write!(f, "request exceeds the page buffer"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::VerifyError(failure) => write!(f, "{}", failure),
            Self::ControllerFault {
                program_error,
                write_protect_error,
            } => write!(
                f,
                "controller fault (program-error={}, write-protect-error={})",
                program_error, write_protect_error
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
