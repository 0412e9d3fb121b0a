//! CXD5610-IO - GNSS session daemon for the Sony CXD5610 receiver
//!
//! Brings the receiver up over I2C, then logs one fix line per report
//! interval until stopped. Transient gaps in the notification stream are
//! ridden out; the session recovers itself after persistent faults.

mod config;
mod devices;
mod error;
mod interrupt;
mod transport;
mod types;

use crate::config::Config;
use crate::devices::cxd5610::GnssDriver;
use crate::error::{Error, Result};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "/etc/cxd5610.toml";

/// Parse config path from command line arguments.
///
/// Supports:
/// - `cxd5610-io <path>` (positional)
/// - `cxd5610-io --config <path>` (flag-based)
/// - `cxd5610-io -c <path>` (short flag)
///
/// Defaults to `/etc/cxd5610.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    DEFAULT_CONFIG_PATH.to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = match Config::from_file(&config_path) {
        Ok(config) => config,
        Err(Error::Io(e))
            if e.kind() == std::io::ErrorKind::NotFound && config_path == DEFAULT_CONFIG_PATH =>
        {
            Config::rpi_defaults()
        }
        Err(e) => return Err(e),
    };

    // Initialize logger; RUST_LOG still overrides the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    log::info!("CXD5610-IO v0.1.0 starting...");
    log::info!("Using config: {}", config_path);
    log::info!(
        "Device: {} (addr 0x{:02x}, irq {}:{})",
        config.device.i2c_bus,
        config.device.i2c_address,
        config.device.gpio_chip,
        config.device.irq_line
    );

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {e}")))?;

    let driver = GnssDriver::create(&config.device)?;
    let wait_ms = config.session.fix_interval_ms as i32;

    log::info!("CXD5610-IO running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        match driver.read(wait_ms) {
            Ok((fix, opc)) => {
                log::info!(
                    "Fix: opc=0x{:02x} lat={:.7} lon={:.7} alt={:.2} speed={:.2} track={:.2} fix={} sats={}/{}",
                    opc,
                    fix.lat,
                    fix.lon,
                    fix.alt,
                    fix.speed,
                    fix.track,
                    fix.mode,
                    fix.used_sats,
                    fix.total_sats
                );
            }
            Err(e) if e.is_timeout() => continue,
            Err(e) => {
                log::error!("Read error: {e}");
            }
        }
    }

    // Shutdown
    log::info!("Shutting down...");
    driver.close()?;

    let stats = driver.stats();
    log::info!(
        "CXD5610-IO stopped ({} packets, {} notifications, {} recoveries)",
        stats.packets,
        stats.notifies,
        stats.recoveries
    );
    Ok(())
}
