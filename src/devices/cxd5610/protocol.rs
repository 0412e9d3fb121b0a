//! Wire protocol definitions for the CXD5610 binary framing
//!
//! A frame is `[sync][len_lo][len_hi][opcode][header_ck]` followed, when
//! the length is non-zero, by that many payload bytes plus one trailing
//! payload checksum byte. Both checksums are the byte sum modulo 256 of
//! the bytes they cover; the checksum byte itself is never included.

/// Frame sync byte
pub(crate) const SYNC: u8 = 0x7F;
/// Frame header length (sync + 16-bit length + opcode + checksum)
pub(crate) const HEADER_LEN: usize = 5;
/// Largest single bus transfer; longer payloads arrive in chunks
pub(crate) const MAX_TRANSFER: usize = 512;
/// Notification receive buffer size
pub(crate) const NOTIFY_BUF_LEN: usize = 1536;
/// Command reply receive buffer size
pub(crate) const REPLY_BUF_LEN: usize = 64;
/// Largest command payload that fits the 64-byte send window
pub(crate) const MAX_COMMAND_PAYLOAD: usize = REPLY_BUF_LEN - HEADER_LEN - 1;
/// Bytes scanned for a sync byte before resync gives up
pub(crate) const RESYNC_SCAN: usize = 64;
/// Opcodes at or above this value are notifications, below are replies
pub(crate) const NOTIFY_THRESHOLD: u8 = 0x80;
/// Sanity cap on the per-report satellite count
pub(crate) const MAX_SATELLITES: usize = 150;

/// System state change instruction (reply class)
pub(crate) const OPC_SYS_STATE_CHANGE: u8 = 0x00;
/// Start positioning
pub(crate) const OPC_GNSS_START: u8 = 0x30;
/// Stop positioning
pub(crate) const OPC_GNSS_STOP: u8 = 0x31;
/// Select satellite systems
pub(crate) const OPC_GNSS_SAT_SETTING: u8 = 0x32;
/// Subscribe to binary notifications
pub(crate) const OPC_BINARY_OUTPUT_SET: u8 = 0x34;
/// UTC time notification
pub(crate) const OPC_TIME_NOTIFY: u8 = 0x80;
/// Receiver position notification
pub(crate) const OPC_RECEIVER_POS_NOTIFY: u8 = 0x81;
/// Receiver velocity notification
pub(crate) const OPC_RECEIVER_VEL_NOTIFY: u8 = 0x82;
/// Satellite info notification
pub(crate) const OPC_SAT_INFO_NOTIFY: u8 = 0x83;
/// Accuracy index notification
pub(crate) const OPC_ACCURACY_IDX_NOTIFY: u8 = 0x89;
/// Disaster/crisis report notification
pub(crate) const OPC_DISASTER_CRISIS_NOTIFY: u8 = 0x8B;

/// State byte of a system state change: reset complete
pub(crate) const STATE_RESET: u8 = 0x01;
/// State byte of a system state change: wakeup complete
pub(crate) const STATE_WAKEUP: u8 = 0x02;

/// Satellite system mask enabling all constellations
pub(crate) const SAT_SYSTEM_MASK: [u8; 2] = [0b1111_0111, 0b0011_1111];
/// Notification opcodes subscribed during configure
pub(crate) const NOTIFY_SUBSCRIPTION: [u8; 5] = [
    OPC_TIME_NOTIFY,
    OPC_RECEIVER_POS_NOTIFY,
    OPC_RECEIVER_VEL_NOTIFY,
    OPC_SAT_INFO_NOTIFY,
    OPC_ACCURACY_IDX_NOTIFY,
];
/// Start parameter selecting hot-start positioning
pub(crate) const START_MODE_HOT: u8 = 3;

/// Byte sum modulo 256 over `data`.
pub(crate) fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Unsigned little-endian 16-bit read at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Signed little-endian 16-bit read at `offset`.
pub(crate) fn read_i16_le(buf: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Signed little-endian 32-bit read at `offset`.
pub(crate) fn read_i32_le(buf: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Build a complete command frame for `opc` with `payload`.
///
/// The payload checksum trailer is only present for non-empty payloads.
pub(crate) fn build_frame(opc: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_COMMAND_PAYLOAD);

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + 1);
    frame.push(SYNC);
    frame.push((payload.len() & 0xFF) as u8);
    frame.push((payload.len() >> 8) as u8);
    frame.push(opc);
    frame.push(checksum(&frame));

    if !payload.is_empty() {
        frame.extend_from_slice(payload);
        frame.push(checksum(payload));
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_header() {
        // 0x7F + 0x0E + 0x00 + 0x81 = 0x10E -> 0x0E
        assert_eq!(checksum(&[0x7F, 0x0E, 0x00, 0x81]), 0x0E);
    }

    #[test]
    fn test_checksum_known_payload() {
        let payload = [
            0x81, 0x23, 0x80, 0x93, 0xDC, 0x14, 0x00, 0x6F, 0xDD, 0x52, 0x42, 0x27, 0x00, 0x00,
        ];
        assert_eq!(checksum(&payload), 0xAE);
    }

    #[test]
    fn test_checksum_wraps_modulo_256() {
        assert_eq!(checksum(&[0xFF, 0x01]), 0x00);
        assert_eq!(checksum(&[0xFF, 0xFF, 0x03]), 0x01);
        assert_eq!(checksum(&[]), 0x00);
    }

    #[test]
    fn test_build_frame_without_payload() {
        // Stop command: 7F 00 00 31 B0
        let frame = build_frame(OPC_GNSS_STOP, &[]);
        assert_eq!(frame, vec![0x7F, 0x00, 0x00, 0x31, 0xB0]);
    }

    #[test]
    fn test_build_frame_with_payload() {
        // Start command: 7F 01 00 30 B0 | 03 03
        let frame = build_frame(OPC_GNSS_START, &[START_MODE_HOT]);
        assert_eq!(frame, vec![0x7F, 0x01, 0x00, 0x30, 0xB0, 0x03, 0x03]);
    }

    #[test]
    fn test_built_frame_validates_with_same_codec() {
        let payload = [0x11, 0x22, 0x33, 0xFE];
        let frame = build_frame(0x34, &payload);
        assert_eq!(frame[4], checksum(&frame[..4]));
        assert_eq!(*frame.last().unwrap(), checksum(&payload));
        assert_eq!(read_u16_le(&frame, 1) as usize, payload.len());
    }

    #[test]
    fn test_le_decoders_signed() {
        let buf = [0x00, 0x93, 0xDC, 0x14, 0x00, 0xFF, 0xFF];
        assert_eq!(read_i32_le(&buf, 1), 350_000_000);
        assert_eq!(read_u16_le(&buf, 5), 0xFFFF);
        assert_eq!(read_i16_le(&buf, 5), -1);
    }
}
