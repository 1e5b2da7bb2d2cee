//! Decoders for date, time, timestamp and interval values.
//!
//! Binary timestamps are i64 microseconds since 2000-01-01T00:00:00, binary
//! dates are i32 days since the same epoch, binary intervals are 16 bytes of
//! (i64 microseconds, i32 days, i32 months).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};

use super::{fixed, Decode};
use crate::error::{Error, Result};
use crate::time::{
    parse_clock, parse_date, parse_timestamp, ClockLimits, Duration, Interval, Resolution,
    UtcTime, PG_EPOCH_OFFSET_USEC, USEC_PER_SEC,
};

/// `NaiveDate::num_days_from_ce` of 2000-01-01.
const PG_EPOCH_DAYS_FROM_CE: i32 = 730_120;

const USEC_PER_DAY: i64 = 86_400 * USEC_PER_SEC;

fn sys_from_pg_micros(micros: i64) -> Result<DateTime<Utc>> {
    micros
        .checked_add(PG_EPOCH_OFFSET_USEC)
        .and_then(DateTime::from_timestamp_micros)
        .ok_or_else(|| Error::InvalidData(format!("timestamp out of range: {}us", micros)))
}

// ============================================================================
// Time points
// ============================================================================

impl<'r> Decode<'r> for DateTime<Utc> {
    const MIN_SIZE: usize = 8;
    const MAX_SIZE: usize = 8;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        sys_from_pg_micros(i64::from_be_bytes(fixed(bytes)?))
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        let (naive, _) = parse_timestamp(text, "timestamp", false)?;
        Ok(naive.and_utc())
    }
}

impl<'r> Decode<'r> for NaiveDateTime {
    const MIN_SIZE: usize = 8;
    const MAX_SIZE: usize = 8;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        DateTime::<Utc>::decode_binary(bytes).map(|t| t.naive_utc())
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        let (naive, _) = parse_timestamp(text, "timestamp", false)?;
        Ok(naive)
    }
}

impl<'r> Decode<'r> for UtcTime {
    const MIN_SIZE: usize = 8;
    const MAX_SIZE: usize = 8;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        DateTime::<Utc>::decode_binary(bytes).map(UtcTime::from_sys)
    }

    /// Second 60 is accepted only where a leap second was actually inserted.
    /// Times within an hour of the largest system time clamp to
    /// [`UtcTime::MAX`].
    fn decode_text(text: &'r str) -> Result<Self> {
        let (naive, leap) = parse_timestamp(text, "utc timestamp", true)?;
        let sys = naive.and_utc();

        if sys >= DateTime::<Utc>::MAX_UTC - TimeDelta::hours(1) {
            return Ok(UtcTime::MAX);
        }

        let utc = UtcTime::from_sys(sys);
        if !leap {
            return Ok(utc);
        }

        let inside = UtcTime::from_micros(utc.as_micros() + USEC_PER_SEC);
        if !inside.leap_second_info().is_leap_second {
            return Err(Error::parse(text, "utc timestamp", "not a leap second"));
        }
        Ok(inside)
    }
}

// ============================================================================
// Dates and times of day
// ============================================================================

impl<'r> Decode<'r> for NaiveDate {
    const MIN_SIZE: usize = 4;
    const MAX_SIZE: usize = 4;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        let days = i32::from_be_bytes(fixed(bytes)?);
        days.checked_add(PG_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .ok_or_else(|| Error::InvalidData(format!("date out of range: {} days", days)))
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        parse_date(text, text, "date")
    }
}

impl<'r> Decode<'r> for NaiveTime {
    const MIN_SIZE: usize = 8;
    const MAX_SIZE: usize = 8;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        let micros = i64::from_be_bytes(fixed(bytes)?);
        if !(0..USEC_PER_DAY).contains(&micros) {
            return Err(Error::InvalidData(format!("time out of range: {}us", micros)));
        }
        let secs = (micros / USEC_PER_SEC) as u32;
        let nanos = (micros % USEC_PER_SEC) as u32 * 1_000;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
            .ok_or_else(|| Error::InvalidData(format!("time out of range: {}us", micros)))
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        let clock = parse_clock(text, text, "time", 9, ClockLimits::TIME_OF_DAY)?;
        NaiveTime::from_hms_nano_opt(
            clock.hours as u32,
            clock.minutes as u32,
            clock.seconds as u32,
            clock.ticks as u32,
        )
        .ok_or_else(|| Error::parse(text, "time", "invalid time"))
    }
}

// ============================================================================
// Intervals and durations
// ============================================================================

impl<'r> Decode<'r> for Interval {
    const MIN_SIZE: usize = 16;
    const MAX_SIZE: usize = 16;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        let raw: [u8; 16] = fixed(bytes)?;
        let micros = i64::from_be_bytes(fixed(&raw[..8])?);
        let days = i32::from_be_bytes(fixed(&raw[8..12])?);
        let months = i32::from_be_bytes(fixed(&raw[12..])?);
        Ok(Interval::new(months, days, micros))
    }

    /// PostgreSQL's default `postgres` style: optional `N year[s]`,
    /// `N mon[s]` and `N day[s]` counts, then an optional `[+-]HH:MM:SS[.f]`
    /// clock, e.g. `1 year 2 mons -3 days +04:05:06.5`.
    fn decode_text(text: &'r str) -> Result<Self> {
        let invalid = |reason: &'static str| Error::parse(text, "interval", reason);
        if text.trim().is_empty() {
            return Err(invalid("empty interval"));
        }

        let (mut months, mut days, mut micros) = (0i32, 0i32, 0i64);
        let mut tokens = text.split_whitespace();
        while let Some(token) = tokens.next() {
            if token.contains(':') {
                let clock = token.strip_prefix('+').unwrap_or(token);
                micros = Duration::<crate::time::Micros>::decode_text(clock)?.ticks();
                if tokens.next().is_some() {
                    return Err(invalid("unexpected text after time"));
                }
                break;
            }

            let count: i32 = token.parse().map_err(|_| invalid("invalid count"))?;
            let unit = tokens.next().ok_or_else(|| invalid("missing unit"))?;
            let total = match unit {
                "year" | "years" => count.checked_mul(12).and_then(|m| months.checked_add(m)),
                "mon" | "mons" => months.checked_add(count),
                "day" | "days" => days.checked_add(count),
                _ => return Err(invalid("unknown unit")),
            };
            let total = total.ok_or_else(|| invalid("out of range"))?;
            if unit.starts_with('d') {
                days = total;
            } else {
                months = total;
            }
        }

        Ok(Interval::new(months, days, micros))
    }
}

/// Only the microsecond part of an interval is used; its day and month
/// components are dropped.
impl<'r, R: Resolution> Decode<'r> for Duration<R> {
    const MIN_SIZE: usize = 16;
    const MAX_SIZE: usize = 16;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        let interval = Interval::decode_binary(bytes)?;
        if interval.is_lossy() {
            tracing::trace!(
                days = interval.days,
                months = interval.months,
                "interval calendar components dropped"
            );
        }
        interval.duration().ok_or_else(|| {
            Error::InvalidData(format!(
                "interval of {}us does not fit the requested resolution",
                interval.micros
            ))
        })
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        let clock = parse_clock(text, text, "duration", R::DIGITS, ClockLimits::DURATION)?;
        clock
            .total_ticks(R::PER_SECOND)
            .map(Duration::from_ticks)
            .ok_or_else(|| Error::parse(text, "duration", "out of range"))
    }
}

impl<'r> Decode<'r> for TimeDelta {
    const MIN_SIZE: usize = 16;
    const MAX_SIZE: usize = 16;

    fn decode_binary(bytes: &'r [u8]) -> Result<Self> {
        Duration::<crate::time::Micros>::decode_binary(bytes).map(|d| TimeDelta::microseconds(d.ticks()))
    }

    fn decode_text(text: &'r str) -> Result<Self> {
        Duration::<crate::time::Micros>::decode_text(text).map(|d| TimeDelta::microseconds(d.ticks()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Micros, Millis, Nanos, Seconds};
    use pretty_assertions::assert_eq;

    fn interval_bytes(micros: i64, days: i32, months: i32) -> Vec<u8> {
        let mut out = micros.to_be_bytes().to_vec();
        out.extend_from_slice(&days.to_be_bytes());
        out.extend_from_slice(&months.to_be_bytes());
        out
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_zero_is_the_pg_epoch() {
        let t = DateTime::<Utc>::decode_binary(&[0; 8]).unwrap();
        assert_eq!(t, utc(2000, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_timestamp_binary() {
        // 2024-01-01 00:00:00 = 8766 days after the epoch
        let micros: i64 = 8766 * 86_400 * 1_000_000 + 1;
        let t = DateTime::<Utc>::decode_binary(&micros.to_be_bytes()).unwrap();
        assert_eq!(t.timestamp(), 1_704_067_200);
        assert_eq!(t.timestamp_subsec_micros(), 1);

        let before = DateTime::<Utc>::decode_binary(&(-1_000_000i64).to_be_bytes()).unwrap();
        assert_eq!(before, utc(1999, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_timestamp_infinity_is_out_of_range() {
        assert!(matches!(
            DateTime::<Utc>::decode_binary(&i64::MAX.to_be_bytes()),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_timestamp_text() {
        let t = DateTime::<Utc>::decode_text("2024-01-01 00:00:00.000001").unwrap();
        assert_eq!(t.timestamp(), 1_704_067_200);
        assert_eq!(t.timestamp_subsec_micros(), 1);
        assert!(DateTime::<Utc>::decode_text("2024-01-01").is_err());
        assert!(NaiveDateTime::decode_text("2024-13-01 00:00:00").is_err());
    }

    #[test]
    fn test_utc_time_binary_inserts_leap_seconds() {
        // 2017-01-01 00:00:00
        let micros: i64 = (1_483_228_800 - 946_684_800) * 1_000_000;
        let t = UtcTime::decode_binary(&micros.to_be_bytes()).unwrap();
        assert_eq!(t.as_micros(), (1_483_228_800 + 27) * 1_000_000);
    }

    #[test]
    fn test_utc_time_text_leap_second() {
        let t = UtcTime::decode_text("2016-12-31 23:59:60.5").unwrap();
        assert!(t.leap_second_info().is_leap_second);
        assert!(matches!(
            UtcTime::decode_text("2016-12-30 23:59:60"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_utc_time_text_clamps_near_max() {
        use chrono::Datelike;

        let max = DateTime::<Utc>::MAX_UTC;
        let text = format!("{}-{:02}-{:02} 23:30:00", max.year(), max.month(), max.day());
        assert_eq!(UtcTime::decode_text(&text).unwrap(), UtcTime::MAX);
        assert_ne!(UtcTime::decode_text("2024-01-01 00:00:00").unwrap(), UtcTime::MAX);
    }

    #[test]
    fn test_date_and_time() {
        assert_eq!(
            NaiveDate::decode_binary(&0i32.to_be_bytes()).unwrap(),
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
        );
        assert_eq!(
            NaiveDate::decode_binary(&8766i32.to_be_bytes()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert!(NaiveDate::decode_binary(&i32::MAX.to_be_bytes()).is_err());

        let usec: i64 = 12 * 3_600_000_000 + 30 * 60_000_000 + 45 * 1_000_000 + 123_456;
        assert_eq!(
            NaiveTime::decode_binary(&usec.to_be_bytes()).unwrap(),
            NaiveTime::from_hms_micro_opt(12, 30, 45, 123_456).unwrap()
        );
        assert_eq!(
            NaiveTime::decode_text("14:30:00").unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_duration_text() {
        let d = Duration::<Micros>::decode_text("01:02:03.5").unwrap();
        assert_eq!(d.ticks(), 3_723_500_000);

        assert_eq!(Duration::<Millis>::decode_text("00:00:01.25").unwrap().ticks(), 1_250);
        assert_eq!(Duration::<Nanos>::decode_text("-00:00:00.000000001").unwrap().ticks(), -1);
        assert_eq!(Duration::<Seconds>::decode_text("00:00:01.9").unwrap().ticks(), 1);
        assert!(Duration::<Micros>::decode_text("00:00:01.").is_err());
    }

    #[test]
    fn test_duration_binary_uses_first_eight_bytes() {
        let bytes = interval_bytes(3_723_500_000, 0, 0);
        assert_eq!(Duration::<Micros>::decode_binary(&bytes).unwrap().ticks(), 3_723_500_000);
        assert_eq!(Duration::<Seconds>::decode_binary(&bytes).unwrap().ticks(), 3_723);
        assert_eq!(Duration::<Millis>::decode_binary(&bytes).unwrap().ticks(), 3_723_500);
    }

    #[test]
    fn test_duration_drops_calendar_components() {
        let bytes = interval_bytes(1_000_000, 3, 2);
        assert_eq!(Duration::<Micros>::decode_binary(&bytes).unwrap().ticks(), 1_000_000);

        let interval = Interval::decode_binary(&bytes).unwrap();
        assert_eq!(interval, Interval::new(2, 3, 1_000_000));
        assert!(interval.is_lossy());
    }

    #[test]
    fn test_interval_text_in_postgres_style() {
        assert_eq!(
            Interval::decode_text("1 day 02:00:00").unwrap(),
            Interval::new(0, 1, 2 * 3_600 * USEC_PER_SEC)
        );
        assert_eq!(Interval::decode_text("1 mon").unwrap(), Interval::new(1, 0, 0));
        assert_eq!(
            Interval::decode_text("1 year 2 mons -3 days +04:05:06.5").unwrap(),
            Interval::new(14, -3, 14_706_500_000)
        );
        assert_eq!(
            Interval::decode_text("-2 days -00:00:01").unwrap(),
            Interval::new(0, -2, -USEC_PER_SEC)
        );
        assert_eq!(Interval::decode_text("00:00:05.5").unwrap(), Interval::new(0, 0, 5_500_000));

        for bad in ["", "1", "1 week", "x days", "1 day 02:00:00 extra", "2147483647 years"] {
            assert!(Interval::decode_text(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_duration_nanos_overflow_is_an_error() {
        let bytes = interval_bytes(i64::MAX, 0, 0);
        assert!(matches!(
            Duration::<Nanos>::decode_binary(&bytes),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_time_delta() {
        let bytes = interval_bytes(-5, 0, 0);
        assert_eq!(TimeDelta::decode_binary(&bytes).unwrap(), TimeDelta::microseconds(-5));
        assert_eq!(
            TimeDelta::decode_text("00:01:00").unwrap(),
            TimeDelta::microseconds(60_000_000)
        );
    }
}
