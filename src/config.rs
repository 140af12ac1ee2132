//! Clock display flags and the time-print function for the end-of-stream
//! discarded-events diagnostic (spec.md §6 "Time-print surface").
//!
//! spec.md §9's "Global mutable state" design note calls these four flags
//! and the clock offset out explicitly: they're read-only after CLI
//! parsing in the original, so here they're a plain value passed into
//! [`ClockDisplayConfig::format_timestamp`], never a global.

use chrono::{DateTime, Local, TimeZone, Utc};

/// Governs how a reconstructed trace timestamp is rendered for display
/// (spec.md §6).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ClockDisplayConfig {
    /// Print raw `seconds.nanoseconds` instead of a broken-down clock time.
    pub clock_raw: bool,
    /// Same effect as `clock_raw`, kept as a separate flag per spec.md §6.
    pub clock_seconds: bool,
    /// Prefix the broken-down time with a `YYYY-MM-DD` date.
    pub clock_date: bool,
    /// Render the broken-down time in GMT rather than local time.
    pub clock_gmt: bool,
    /// Signed offset, in seconds, applied before formatting.
    pub clock_offset: i64,
}

impl ClockDisplayConfig {
    /// Formats `timestamp_ns` (a reconstructed 64-bit trace timestamp,
    /// nanoseconds since the clock's epoch) per spec.md §6's "Time-print
    /// surface": `HH:MM:SS.nnnnnnnnn` local or GMT, with an optional
    /// leading `YYYY-MM-DD`, or raw `seconds.nanoseconds`.
    pub fn format_timestamp(&self, timestamp_ns: u64) -> String {
        let offset_ns = self.clock_offset.saturating_mul(1_000_000_000);
        let adjusted = (timestamp_ns as i64).saturating_add(offset_ns);
        let secs = adjusted.div_euclid(1_000_000_000);
        let nanos = adjusted.rem_euclid(1_000_000_000) as u32;

        if self.clock_raw || self.clock_seconds {
            return format!("{secs}.{nanos:09}");
        }

        if self.clock_gmt {
            let dt = Utc
                .timestamp_opt(secs, nanos)
                .single()
                .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap());
            self.render(dt)
        } else {
            let dt = Local
                .timestamp_opt(secs, nanos)
                .single()
                .unwrap_or_else(|| Local.timestamp_opt(0, 0).single().unwrap());
            self.render(dt)
        }
    }

    fn render<Tz: TimeZone>(&self, dt: DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        if self.clock_date {
            dt.format("%Y-%m-%d %H:%M:%S%.9f").to_string()
        } else {
            dt.format("%H:%M:%S%.9f").to_string()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn raw_mode_prints_seconds_and_nanoseconds() {
        let cfg = ClockDisplayConfig {
            clock_raw: true,
            ..Default::default()
        };
        assert_eq!(cfg.format_timestamp(1_500_000_000), "1.500000000");
    }

    #[test]
    fn offset_shifts_the_raw_seconds() {
        let cfg = ClockDisplayConfig {
            clock_raw: true,
            clock_offset: -1,
            ..Default::default()
        };
        assert_eq!(cfg.format_timestamp(1_500_000_000), "0.500000000");
    }

    #[test]
    fn gmt_mode_renders_a_clock_time() {
        let cfg = ClockDisplayConfig {
            clock_gmt: true,
            ..Default::default()
        };
        assert_eq!(cfg.format_timestamp(0), "00:00:00.000000000");
    }

    #[test]
    fn date_flag_prefixes_the_date() {
        let cfg = ClockDisplayConfig {
            clock_gmt: true,
            clock_date: true,
            ..Default::default()
        };
        assert_eq!(cfg.format_timestamp(0), "1970-01-01 00:00:00.000000000");
    }
}
