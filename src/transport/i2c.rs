//! Linux I2C character-device transport

use super::Transport;
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

/// `I2C_SLAVE` ioctl request from linux/i2c-dev.h
const I2C_SLAVE: libc::c_int = 0x0703;

nix::ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);

/// I2C transport over a `/dev/i2c-*` character device.
///
/// The slave address is bound once with the `I2C_SLAVE` ioctl, after which
/// plain `read`/`write` calls address the device directly.
pub struct I2cTransport {
    file: File,
    path: String,
    address: u16,
}

impl I2cTransport {
    /// Open an I2C bus and bind the given 7-bit slave address
    ///
    /// # Arguments
    /// * `path` - Bus device path (e.g., "/dev/i2c-1")
    /// * `address` - 7-bit slave address (e.g., 0x24)
    pub fn open(path: &str, address: u16) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        unsafe { i2c_set_slave(file.as_raw_fd(), address as libc::c_int) }.map_err(|e| {
            Error::Transport(format!("I2C_SLAVE ioctl failed for {path}: {e}"))
        })?;

        log::info!("I2C: opened {} (slave address 0x{:02x})", path, address);

        Ok(I2cTransport {
            file,
            path: path.to_string(),
            address,
        })
    }
}

impl Transport for I2cTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buffer)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.file.write(data)?)
    }

    fn reopen(&mut self) -> Result<()> {
        let reopened = Self::open(&self.path, self.address)?;
        self.file = reopened.file;
        log::info!("I2C: reopened {}", self.path);
        Ok(())
    }
}
