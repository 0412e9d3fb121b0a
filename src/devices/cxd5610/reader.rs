//! Packet reader: framing, resynchronization and chunked payload reads

use super::protocol::{
    checksum, read_u16_le, HEADER_LEN, MAX_TRANSFER, NOTIFY_BUF_LEN, NOTIFY_THRESHOLD,
    REPLY_BUF_LEN, RESYNC_SCAN, SYNC,
};
use super::session::SessionStats;
use crate::error::{Error, Result};
use crate::interrupt::Interrupt;
use crate::transport::{read_exact, write_exact, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Slice length for indefinite interrupt waits; keeps them responsive to
/// the shutdown flag
const SHUTDOWN_POLL_MS: u32 = 1000;

/// Turns the raw byte pipe into framed `(opcode, payload)` packets.
///
/// Owns the bus transport, the interrupt line and both receive scratch
/// buffers. Command replies (opcode below the notify threshold) land in
/// the small reply buffer, notifications in the large notify buffer.
pub(crate) struct PacketReader {
    transport: Box<dyn Transport>,
    interrupt: Box<dyn Interrupt>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
    reply_buf: [u8; REPLY_BUF_LEN],
    notify_buf: [u8; NOTIFY_BUF_LEN],
}

impl PacketReader {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        interrupt: Box<dyn Interrupt>,
        shutdown: Arc<AtomicBool>,
        stats: Arc<SessionStats>,
    ) -> Self {
        PacketReader {
            transport,
            interrupt,
            shutdown,
            stats,
            reply_buf: [0; REPLY_BUF_LEN],
            notify_buf: [0; NOTIFY_BUF_LEN],
        }
    }

    /// Read one frame; returns the opcode and payload length.
    ///
    /// Payload bytes land in the reply or notify buffer by opcode class;
    /// fetch them with [`Self::payload`]. A zero timeout skips the header
    /// interrupt wait entirely (data is assumed pending) and only checks
    /// for already-queued edges before payload chunks; a negative timeout
    /// waits indefinitely. Quiet mode downgrades framing-fault logs for
    /// reads where stale bytes are expected.
    pub(crate) fn read_packet(&mut self, timeout_ms: i32, quiet: bool) -> Result<(u8, usize)> {
        let PacketReader {
            transport,
            interrupt,
            shutdown,
            stats,
            reply_buf,
            notify_buf,
        } = self;
        let transport = transport.as_mut();

        if timeout_ms != 0 {
            wait_irq(interrupt.as_mut(), shutdown, timeout_ms)?;
        }

        let mut header = [0u8; HEADER_LEN];
        read_exact(transport, &mut header)?;

        if header[0] != SYNC {
            framing_fault(
                stats,
                quiet,
                &format!("sync byte mismatch: 0x{:02x}", header[0]),
            );
            let mut found = false;
            for _ in 0..RESYNC_SCAN {
                let mut byte = [0u8; 1];
                read_exact(transport, &mut byte)?;
                if byte[0] == SYNC {
                    header[0] = SYNC;
                    read_exact(transport, &mut header[1..])?;
                    found = true;
                    break;
                }
            }
            if !found {
                return Err(Error::Transient("resync scan exhausted".to_string()));
            }
        }

        let mut len = read_u16_le(&header, 1) as usize;
        let mut opc = header[3];

        if header[4] != checksum(&header[..4]) {
            framing_fault(
                stats,
                quiet,
                &format!("header checksum opc=0x{opc:02x} len={len}"),
            );
            // Rescan, this time validating the checksum inside the loop.
            let mut valid = false;
            for _ in 0..RESYNC_SCAN {
                let mut byte = [0u8; 1];
                read_exact(transport, &mut byte)?;
                if byte[0] != SYNC {
                    continue;
                }
                header[0] = SYNC;
                read_exact(transport, &mut header[1..])?;
                if header[4] == checksum(&header[..4]) {
                    len = read_u16_le(&header, 1) as usize;
                    opc = header[3];
                    valid = true;
                    break;
                }
            }
            if !valid {
                return Err(Error::Transient("resync scan exhausted".to_string()));
            }
        }

        let cap = if opc < NOTIFY_THRESHOLD {
            REPLY_BUF_LEN
        } else {
            NOTIFY_BUF_LEN
        };
        if len + 1 > cap {
            log::error!("CXD5610: buffer too small opc=0x{:02x} len={}", opc, len);
            return Err(Error::Overflow { len: len + 1, cap });
        }

        if len > 0 {
            wait_irq(interrupt.as_mut(), shutdown, timeout_ms)?;

            let buf: &mut [u8] = if opc < NOTIFY_THRESHOLD {
                &mut reply_buf[..]
            } else {
                &mut notify_buf[..]
            };
            let total = len + 1; // payload plus trailing checksum
            let mut off = 0;
            while off < total {
                if off > 0 {
                    wait_irq(interrupt.as_mut(), shutdown, timeout_ms)?;
                }
                let chunk = (total - off).min(MAX_TRANSFER);
                read_exact(transport, &mut buf[off..off + chunk])?;
                off += chunk;
            }

            if buf[len] != checksum(&buf[..len]) {
                framing_fault(
                    stats,
                    quiet,
                    &format!("payload checksum opc=0x{opc:02x} len={len}"),
                );
                return Err(Error::Transient("payload checksum mismatch".to_string()));
            }
        }

        Ok((opc, len))
    }

    /// Payload bytes of the last packet returned by [`Self::read_packet`].
    pub(crate) fn payload(&self, opc: u8, len: usize) -> &[u8] {
        if opc < NOTIFY_THRESHOLD {
            &self.reply_buf[..len]
        } else {
            &self.notify_buf[..len]
        }
    }

    /// Write a complete command frame to the bus.
    pub(crate) fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        write_exact(self.transport.as_mut(), frame)
    }

    /// Close and reopen the bus transport after a fault.
    pub(crate) fn reopen(&mut self) -> Result<()> {
        self.transport.reopen()
    }
}

/// Wait for a data-ready edge with the packet reader's timeout semantics.
///
/// Indefinite waits run in bounded slices so a shutdown request is seen
/// within one slice.
fn wait_irq(interrupt: &mut dyn Interrupt, shutdown: &AtomicBool, timeout_ms: i32) -> Result<()> {
    if timeout_ms >= 0 {
        return interrupt.wait_edge(timeout_ms as u32);
    }

    loop {
        if shutdown.load(Ordering::SeqCst) {
            return Err(Error::Transport("interrupted by shutdown".to_string()));
        }
        match interrupt.wait_edge(SHUTDOWN_POLL_MS) {
            Ok(()) => return Ok(()),
            Err(Error::Timeout) => continue,
            Err(e) => return Err(e),
        }
    }
}

fn framing_fault(stats: &SessionStats, quiet: bool, message: &str) {
    if quiet {
        stats.quiet_errors.fetch_add(1, Ordering::Relaxed);
        log::debug!("CXD5610: {message} (quiet window)");
    } else {
        log::warn!("CXD5610: {message}");
    }
}
