//! Notification payload decoders
//!
//! Every notification starts with a version byte whose top bit flags the
//! payload as valid; invalid or short payloads are dropped without touching
//! the published fix.

use super::protocol::{
    read_i16_le, read_i32_le, read_u16_le, MAX_SATELLITES, OPC_ACCURACY_IDX_NOTIFY,
    OPC_DISASTER_CRISIS_NOTIFY, OPC_RECEIVER_POS_NOTIFY, OPC_RECEIVER_VEL_NOTIFY,
    OPC_SAT_INFO_NOTIFY, OPC_TIME_NOTIFY,
};
use crate::types::GnssFix;
use chrono::{TimeZone, Utc};

/// Satellite info entry stride: signal, svid, C/N0, elevation, azimuth u16
const SAT_ENTRY_LEN: usize = 6;

/// Disaster/crisis report: version, count, three 33-byte messages
const DC_REPORT_MIN_LEN: usize = 2 + 3 * 33;

fn is_invalid(version: u8) -> bool {
    version & 0x80 == 0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Apply one notification to the fix under the session lock.
pub(crate) fn dispatch(opc: u8, payload: &[u8], fix: &mut GnssFix) {
    match opc {
        OPC_TIME_NOTIFY => decode_time(payload, fix),
        OPC_RECEIVER_POS_NOTIFY => decode_position(payload, fix),
        OPC_RECEIVER_VEL_NOTIFY => decode_velocity(payload, fix),
        OPC_SAT_INFO_NOTIFY => decode_satellites(payload, fix),
        OPC_ACCURACY_IDX_NOTIFY => decode_accuracy(payload, fix),
        OPC_DISASTER_CRISIS_NOTIFY => decode_dc_report(payload),
        _ => {}
    }
}

fn decode_time(payload: &[u8], fix: &mut GnssFix) {
    if payload.len() < 9 || is_invalid(payload[0]) {
        return;
    }

    // Year is split: low byte plus the upper nibble of the month byte
    let year = (((payload[3] >> 4) as i32) << 8) | payload[2] as i32;
    let month = (payload[3] & 0x0f) as u32;
    let day = payload[4] as u32;
    let hour = payload[5] as u32;
    let minute = payload[6] as u32;
    let second = payload[7] as u32;

    if let Some(utc) = Utc
        .with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
    {
        fix.timestamp_sec = utc.timestamp();
        fix.timestamp_nsec = payload[8] as u32 * 10_000_000; // 1/100 s units
    }
}

fn decode_position(payload: &[u8], fix: &mut GnssFix) {
    if payload.len() < 14 || is_invalid(payload[0]) {
        return;
    }

    fix.lat = read_i32_le(payload, 2) as f64 / 10_000_000.0; // [deg]
    fix.lon = read_i32_le(payload, 6) as f64 / 10_000_000.0; // [deg]
    fix.alt = read_i32_le(payload, 10) as f64 / 100.0; // [m]
    fix.status = (payload[1] & 0x0f) as i32;
}

fn decode_velocity(payload: &[u8], fix: &mut GnssFix) {
    if payload.len() < 10 || is_invalid(payload[0]) {
        return;
    }

    fix.track = read_u16_le(payload, 2) as f64 / 10.0; // [deg]
    fix.speed = read_i16_le(payload, 6) as f64 / 10.0 * 1000.0 / 3600.0; // [km/h] -> [m/s]
}

fn decode_satellites(payload: &[u8], fix: &mut GnssFix) {
    if payload.len() < 4 || is_invalid(payload[0]) {
        return;
    }

    let mut numsv = read_u16_le(payload, 2) as usize;
    if numsv > MAX_SATELLITES {
        numsv = MAX_SATELLITES;
    }
    if payload.len() < 4 + numsv * SAT_ENTRY_LEN {
        numsv = (payload.len() - 4) / SAT_ENTRY_LEN;
    }

    let tracking = payload[4..4 + numsv * SAT_ENTRY_LEN]
        .chunks_exact(SAT_ENTRY_LEN)
        .filter(|entry| entry[0] & 0x20 != 0)
        .count();

    fix.used_sats = tracking as i32;
    fix.total_sats = numsv as i32;
    fix.mode = (payload[1] & 0x3) as i32;
}

fn decode_accuracy(payload: &[u8], fix: &mut GnssFix) {
    if payload.len() < 17 || is_invalid(payload[0]) {
        return;
    }

    fix.pdop = round3(payload[9] as f64 / 10.0);
    fix.hdop = round3(payload[10] as f64 / 10.0);
    fix.vdop = round3(payload[11] as f64 / 10.0);
}

fn decode_dc_report(payload: &[u8]) {
    if payload.len() < DC_REPORT_MIN_LEN || is_invalid(payload[0]) {
        return;
    }

    // Decoded for diagnostics only; DC reports carry no fix data
    let count = payload[1].min(3);
    log::debug!("CXD5610: disaster/crisis report with {count} message(s)");
}

#[cfg(test)]
mod tests {
    use super::*;

    // Header 7F 0E 00 81 0E on the wire; decodes to 35.0 N, 139.0243584 E
    const POS_PAYLOAD: [u8; 14] = [
        0x81, 0x23, 0x80, 0x93, 0xDC, 0x14, 0x00, 0x6F, 0xDD, 0x52, 0x42, 0x27, 0x00, 0x00,
    ];

    #[test]
    fn test_position_decode() {
        let mut fix = GnssFix::unknown();
        dispatch(OPC_RECEIVER_POS_NOTIFY, &POS_PAYLOAD, &mut fix);
        assert_eq!(fix.lat, 35.0);
        assert!((fix.lon - 139.024_358_4).abs() < 1e-9);
        assert_eq!(fix.alt, 100.5);
        assert_eq!(fix.status, 3);
    }

    #[test]
    fn test_invalid_bit_drops_payload() {
        let mut payload = POS_PAYLOAD;
        payload[0] = 0x01; // validity bit clear
        let mut fix = GnssFix::unknown();
        dispatch(OPC_RECEIVER_POS_NOTIFY, &payload, &mut fix);
        assert!(fix.lat.is_nan());
        assert_eq!(fix.status, -1);
    }

    #[test]
    fn test_short_payload_dropped() {
        let mut fix = GnssFix::unknown();
        dispatch(OPC_RECEIVER_POS_NOTIFY, &POS_PAYLOAD[..13], &mut fix);
        assert!(fix.lat.is_nan());
    }

    #[test]
    fn test_velocity_decode() {
        // course 123.4 deg, 36.0 km/h over ground
        let payload = [
            0x81, 0x00, 0xD2, 0x04, 0x00, 0x00, 0x68, 0x01, 0x00, 0x00,
        ];
        let mut fix = GnssFix::unknown();
        dispatch(OPC_RECEIVER_VEL_NOTIFY, &payload, &mut fix);
        assert!((fix.track - 123.4).abs() < 1e-9);
        assert!((fix.speed - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_decode() {
        // 2024-05-06 07:08:09.50 UTC
        let payload = [0x81, 0x00, 0xE8, 0x75, 6, 7, 8, 9, 50];
        let mut fix = GnssFix::unknown();
        dispatch(OPC_TIME_NOTIFY, &payload, &mut fix);
        assert_eq!(fix.timestamp_sec, 1_714_979_289);
        assert_eq!(fix.timestamp_nsec, 500_000_000);
    }

    #[test]
    fn test_time_invalid_date_ignored() {
        let payload = [0x81, 0x00, 0xE8, 0x7D, 40, 7, 8, 9, 50]; // month 13, day 40
        let mut fix = GnssFix::unknown();
        dispatch(OPC_TIME_NOTIFY, &payload, &mut fix);
        assert_eq!(fix.timestamp_sec, 0);
        assert_eq!(fix.timestamp_nsec, 0);
    }

    fn sat_payload(mode: u8, claimed: u16, signals: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x81, mode, (claimed & 0xFF) as u8, (claimed >> 8) as u8];
        for (i, signal) in signals.iter().enumerate() {
            payload.extend_from_slice(&[*signal, i as u8 + 1, 40, 45, 0x10, 0x00]);
        }
        payload
    }

    #[test]
    fn test_satellite_counts_and_mode() {
        let payload = sat_payload(0x07, 5, &[0x21, 0x01, 0x25, 0x81, 0x61]);
        let mut fix = GnssFix::unknown();
        dispatch(OPC_SAT_INFO_NOTIFY, &payload, &mut fix);
        assert_eq!(fix.used_sats, 3); // entries with the tracking bit set
        assert_eq!(fix.total_sats, 5);
        assert_eq!(fix.mode, 3); // low two bits of the mode byte
    }

    #[test]
    fn test_satellite_count_truncated_to_payload() {
        let payload = sat_payload(0x02, 10, &[0x21, 0x21, 0x01]);
        let mut fix = GnssFix::unknown();
        dispatch(OPC_SAT_INFO_NOTIFY, &payload, &mut fix);
        assert_eq!(fix.total_sats, 3);
        assert_eq!(fix.used_sats, 2);
        assert_eq!(fix.mode, 2);
    }

    #[test]
    fn test_satellite_count_capped() {
        let payload = sat_payload(0x03, 200, &[0x21; 150]);
        assert_eq!(payload.len(), 904);
        let mut fix = GnssFix::unknown();
        dispatch(OPC_SAT_INFO_NOTIFY, &payload, &mut fix);
        assert_eq!(fix.total_sats, 150);
        assert_eq!(fix.used_sats, 150);
    }

    #[test]
    fn test_accuracy_decode_rounds_dop() {
        let mut payload = [0u8; 17];
        payload[0] = 0x81;
        payload[9] = 25;
        payload[10] = 7;
        payload[11] = 13;
        let mut fix = GnssFix::unknown();
        dispatch(OPC_ACCURACY_IDX_NOTIFY, &payload, &mut fix);
        assert_eq!(fix.pdop, 2.5);
        assert_eq!(fix.hdop, 0.7);
        assert_eq!(fix.vdop, 1.3);
    }

    #[test]
    fn test_dc_report_leaves_fix_unchanged() {
        let mut payload = vec![0u8; DC_REPORT_MIN_LEN];
        payload[0] = 0x81;
        payload[1] = 2;
        let mut fix = GnssFix::unknown();
        dispatch(OPC_DISASTER_CRISIS_NOTIFY, &payload, &mut fix);
        assert!(fix.lat.is_nan());
        assert_eq!(fix.used_sats, -1);
    }

    #[test]
    fn test_unknown_opcode_ignored() {
        let mut fix = GnssFix::unknown();
        dispatch(0xFF, &[0x81, 0x00], &mut fix);
        assert!(fix.lat.is_nan());
    }
}
