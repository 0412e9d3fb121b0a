//! Data-ready interrupt line abstraction

use crate::error::Result;

mod gpio;
pub mod mock;
pub use gpio::GpioInterrupt;

/// Edge-detection interrupt line for the receiver's "data ready" signal
pub trait Interrupt: Send {
    /// Wait for a rising edge
    ///
    /// A zero timeout only checks for an already-queued edge without
    /// blocking; a positive timeout waits up to that many milliseconds.
    /// Returns `Error::Timeout` when no edge arrives in time. A successful
    /// wait consumes the edge(s) that satisfied it.
    fn wait_edge(&mut self, timeout_ms: u32) -> Result<()>;
}
