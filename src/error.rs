//! Error types for the CXD5610 driver

use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during driver operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the underlying character device
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Interrupt wait or reply wait expired
    #[error("Operation timed out")]
    Timeout,

    /// Non-blocking read found no fresh sample
    #[error("No new sample available")]
    WouldBlock,

    /// Recoverable framing fault (resync exhausted, checksum mismatch)
    #[error("Transient protocol error: {0}")]
    Transient(String),

    /// Fatal transport fault (end of stream, short write, dead handle)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Packet payload larger than the destination buffer
    #[error("Payload overflow: {len} bytes exceeds {cap}-byte buffer")]
    Overflow { len: usize, cap: usize },

    /// Caller passed an invalid argument or used a closed handle
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Interrupt line setup or wait failure
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Configuration file problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Faults the packet reader's callers may retry without escalating.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transient(_) | Error::Timeout | Error::WouldBlock
        )
    }

    /// Timeout-class faults (no data arrived before the deadline).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout | Error::WouldBlock)
    }
}
