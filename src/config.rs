//! Configuration for the CXD5610 driver
//!
//! Loads configuration from a TOML file with the minimal parameters
//! needed to reach the receiver hardware.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Receiver hardware configuration (I2C bus and interrupt line)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// I2C character device the receiver is wired to
    pub i2c_bus: String,
    /// 7-bit I2C slave address of the receiver
    pub i2c_address: u16,
    /// GPIO character device carrying the data-ready line
    pub gpio_chip: String,
    /// Line offset of the data-ready interrupt (BCM numbering)
    pub irq_line: u32,
}

/// Session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// How long each CLI read waits for a fresh fix, in milliseconds
    pub fix_interval_ms: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Arguments
    /// - `path`: Path to TOML configuration file
    ///
    /// # Returns
    /// Parsed configuration or error
    ///
    /// # Example
    /// ```no_run
    /// use cxd5610_io::config::Config;
    ///
    /// let config = Config::from_file("cxd5610.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        Ok(config)
    }

    /// Default configuration for a Raspberry Pi carrier board
    ///
    /// Suitable for testing and development. Production deployments
    /// should use a proper TOML configuration file.
    pub fn rpi_defaults() -> Self {
        Self {
            device: DeviceConfig {
                i2c_bus: "/dev/i2c-1".to_string(),
                i2c_address: 0x24,
                gpio_chip: "/dev/gpiochip4".to_string(),
                irq_line: 17,
            },
            session: SessionConfig {
                fix_interval_ms: 1000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::rpi_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::rpi_defaults();
        assert_eq!(config.device.i2c_bus, "/dev/i2c-1");
        assert_eq!(config.device.i2c_address, 0x24);
        assert_eq!(config.device.gpio_chip, "/dev/gpiochip4");
        assert_eq!(config.device.irq_line, 17);
        assert_eq!(config.session.fix_interval_ms, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_serialization() {
        let config = Config::rpi_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        // Should contain all sections
        assert!(toml_string.contains("[device]"));
        assert!(toml_string.contains("[session]"));
        assert!(toml_string.contains("[logging]"));

        // Should contain key values
        assert!(toml_string.contains("i2c_bus = \"/dev/i2c-1\""));
        assert!(toml_string.contains("irq_line = 17"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[device]
i2c_bus = "/dev/i2c-0"
i2c_address = 0x24
gpio_chip = "/dev/gpiochip0"
irq_line = 4

[session]
fix_interval_ms = 200

[logging]
level = "debug"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device.i2c_bus, "/dev/i2c-0");
        assert_eq!(config.device.i2c_address, 0x24);
        assert_eq!(config.device.irq_line, 4);
        assert_eq!(config.session.fix_interval_ms, 200);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_malformed_config_rejected() {
        let err = toml::from_str::<Config>("[device]\ni2c_bus = 42\n").unwrap_err();
        assert!(err.to_string().contains("i2c_bus"));
    }
}
