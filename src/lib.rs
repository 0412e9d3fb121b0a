//! CXD5610-IO - User-space session driver for the Sony CXD5610 GNSS receiver
//!
//! This library talks to the receiver over an I2C character device with a
//! data-ready GPIO interrupt. A background session thread configures the
//! receiver, decodes its notification stream and publishes the latest fix;
//! consumers pull snapshots through [`GnssDriver::read`].

pub mod config;
pub mod devices;
pub mod error;
pub mod interrupt;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use devices::cxd5610::GnssDriver;
pub use error::{Error, Result};
pub use types::{DriverStats, GnssFix};
