//! Shared data types for the CXD5610 driver

/// Latest navigation solution published by the session worker.
///
/// Every field starts at an explicit "unknown" sentinel (NaN for floats,
/// -1 for counts and enums, zero for the timestamp) and is reset to that
/// sentinel whenever the session is (re)configured. Zero is a legitimate
/// reading for every numeric field, so it is never used as a sentinel.
#[derive(Debug, Clone, Copy)]
pub struct GnssFix {
    /// Latitude in degrees, signed
    pub lat: f64,
    /// Longitude in degrees, signed
    pub lon: f64,
    /// Altitude in meters
    pub alt: f64,
    /// Ground speed in m/s
    pub speed: f64,
    /// Track (course over ground) in degrees
    pub track: f64,
    /// Positioning mode from the satellite report (-1 = unknown)
    pub mode: i32,
    /// Fix status from the position report (-1 = unknown)
    pub status: i32,
    /// Position dilution of precision, quantized to 3 decimals (NaN = unknown)
    pub pdop: f64,
    /// Horizontal dilution of precision, quantized to 3 decimals (NaN = unknown)
    pub hdop: f64,
    /// Vertical dilution of precision, quantized to 3 decimals (NaN = unknown)
    pub vdop: f64,
    /// Satellites used in the solution (-1 = unknown)
    pub used_sats: i32,
    /// Satellites reported by the receiver (-1 = unknown)
    pub total_sats: i32,
    /// UTC timestamp, seconds since the epoch (0 = unknown)
    pub timestamp_sec: i64,
    /// UTC timestamp, sub-second nanoseconds
    pub timestamp_nsec: u32,
}

impl GnssFix {
    /// A fix with every field at its "unknown" sentinel.
    pub fn unknown() -> Self {
        GnssFix {
            lat: f64::NAN,
            lon: f64::NAN,
            alt: f64::NAN,
            speed: f64::NAN,
            track: f64::NAN,
            mode: -1,
            status: -1,
            pdop: f64::NAN,
            hdop: f64::NAN,
            vdop: f64::NAN,
            used_sats: -1,
            total_sats: -1,
            timestamp_sec: 0,
            timestamp_nsec: 0,
        }
    }

    /// Reset every field back to its "unknown" sentinel.
    pub(crate) fn reset(&mut self) {
        *self = Self::unknown();
    }
}

impl Default for GnssFix {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Snapshot of the driver's internal counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverStats {
    /// Packets read successfully (replies and notifications)
    pub packets: u64,
    /// Notifications dispatched into the published fix
    pub notifies: u64,
    /// Framing faults observed during quiet-tolerance reads
    pub quiet_errors: u64,
    /// Recovery cycles run after fault streaks
    pub recoveries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fix_sentinels() {
        let fix = GnssFix::unknown();
        assert!(fix.lat.is_nan());
        assert!(fix.lon.is_nan());
        assert!(fix.alt.is_nan());
        assert!(fix.speed.is_nan());
        assert!(fix.track.is_nan());
        assert!(fix.pdop.is_nan());
        assert!(fix.hdop.is_nan());
        assert!(fix.vdop.is_nan());
        assert_eq!(fix.mode, -1);
        assert_eq!(fix.status, -1);
        assert_eq!(fix.used_sats, -1);
        assert_eq!(fix.total_sats, -1);
        assert_eq!(fix.timestamp_sec, 0);
        assert_eq!(fix.timestamp_nsec, 0);
    }

    #[test]
    fn test_reset_clears_previous_reading() {
        let mut fix = GnssFix::unknown();
        fix.lat = 35.0;
        fix.used_sats = 9;
        fix.timestamp_sec = 1_700_000_000;
        fix.reset();
        assert!(fix.lat.is_nan());
        assert_eq!(fix.used_sats, -1);
        assert_eq!(fix.timestamp_sec, 0);
    }
}
