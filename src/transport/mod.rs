//! Transport layer for bus I/O abstraction

use crate::error::{Error, Result};

mod i2c;
pub mod mock;
pub use i2c::I2cTransport;

/// Transport trait for device communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 = end of stream)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Close and reopen the underlying device after a bus fault
    fn reopen(&mut self) -> Result<()>;
}

/// Read exactly `buf.len()` bytes, retrying on interrupted system calls.
///
/// Short reads continue; end of stream is a fatal transport error.
pub(crate) fn read_exact(transport: &mut dyn Transport, buf: &mut [u8]) -> Result<()> {
    let mut off = 0;
    while off < buf.len() {
        match transport.read(&mut buf[off..]) {
            Ok(0) => return Err(Error::Transport("end of stream".to_string())),
            Ok(n) => off += n,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Write exactly `data.len()` bytes, retrying on interrupted system calls.
pub(crate) fn write_exact(transport: &mut dyn Transport, data: &[u8]) -> Result<()> {
    let mut off = 0;
    while off < data.len() {
        match transport.write(&data[off..]) {
            Ok(0) => return Err(Error::Transport("short write".to_string())),
            Ok(n) => off += n,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_read_exact_drains_injected_bytes() {
        let mock = MockTransport::new();
        mock.inject_read(&[0x01, 0x02, 0x03, 0x04]);

        let mut transport = mock.clone();
        let mut buf = [0u8; 4];
        read_exact(&mut transport, &mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_read_exact_end_of_stream() {
        let mock = MockTransport::new();
        mock.inject_read(&[0xAA]);

        let mut transport = mock.clone();
        let mut buf = [0u8; 3];
        let err = read_exact(&mut transport, &mut buf).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_write_exact_captures_all_bytes() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        write_exact(&mut transport, &[0x7F, 0x00, 0x00, 0x31, 0xB0]).unwrap();
        assert_eq!(mock.get_written(), vec![0x7F, 0x00, 0x00, 0x31, 0xB0]);
    }
}
