//! Text encoders.
//!
//! The counterpart of [`crate::decode`]: each type renders the text form
//! PostgreSQL accepts for it. Durations use ISO-8601 (`PT1H2M3.5S`), which
//! the server parses as an interval.

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::time::{Duration, Interval, Resolution, UtcTime, USEC_PER_SEC};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Text form of a value.
pub trait Encode {
    fn encode_text(&self, out: &mut String);

    fn is_null(&self) -> bool {
        false
    }

    /// Encoded text, or `None` for a null value.
    fn to_text(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        let mut out = String::new();
        self.encode_text(&mut out);
        Some(out)
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode_text(&self, out: &mut String) {
        (**self).encode_text(out)
    }

    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode_text(&self, out: &mut String) {
        if let Some(value) = self {
            value.encode_text(out);
        }
    }

    fn is_null(&self) -> bool {
        self.is_none()
    }
}

// ============================================================================
// Scalars
// ============================================================================

impl Encode for bool {
    fn encode_text(&self, out: &mut String) {
        out.push(if *self { 't' } else { 'f' });
    }
}

macro_rules! impl_encode_display {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode_text(&self, out: &mut String) {
                    let _ = write!(out, "{}", self);
                }
            }
        )*
    };
}

impl_encode_display!(i16, i32, i64, serde_json::Value);

macro_rules! impl_encode_float {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode_text(&self, out: &mut String) {
                    if self.is_nan() {
                        out.push_str("NaN");
                    } else if self.is_infinite() {
                        out.push_str(if *self > 0.0 { "Infinity" } else { "-Infinity" });
                    } else {
                        let _ = write!(out, "{}", self);
                    }
                }
            }
        )*
    };
}

impl_encode_float!(f32, f64);

impl Encode for str {
    fn encode_text(&self, out: &mut String) {
        out.push_str(self);
    }
}

impl Encode for String {
    fn encode_text(&self, out: &mut String) {
        out.push_str(self);
    }
}

/// bytea hex format.
impl Encode for [u8] {
    fn encode_text(&self, out: &mut String) {
        out.reserve(2 + self.len() * 2);
        out.push_str("\\x");
        for b in self {
            let _ = write!(out, "{:02x}", b);
        }
    }
}

impl Encode for Vec<u8> {
    fn encode_text(&self, out: &mut String) {
        self.as_slice().encode_text(out)
    }
}

impl Encode for Uuid {
    fn encode_text(&self, out: &mut String) {
        let _ = write!(out, "{}", self.hyphenated());
    }
}

// ============================================================================
// Dates and time points
// ============================================================================

impl Encode for NaiveDate {
    fn encode_text(&self, out: &mut String) {
        let _ = write!(out, "{}", self.format("%Y-%m-%d"));
    }
}

impl Encode for NaiveTime {
    fn encode_text(&self, out: &mut String) {
        let _ = write!(out, "{}", self.format("%H:%M:%S%.6f"));
    }
}

impl Encode for NaiveDateTime {
    fn encode_text(&self, out: &mut String) {
        let _ = write!(out, "{}", self.format(TIMESTAMP_FORMAT));
    }
}

impl Encode for DateTime<Utc> {
    fn encode_text(&self, out: &mut String) {
        self.naive_utc().encode_text(out)
    }
}

/// Prints second `60` inside a leap second. Values outside the system
/// clock's range print as `infinity` / `-infinity`.
impl Encode for UtcTime {
    fn encode_text(&self, out: &mut String) {
        let Some(sys) = self.to_sys() else {
            out.push_str(if self.as_micros() < 0 { "-infinity" } else { "infinity" });
            return;
        };
        match self.leap_offset_micros() {
            Some(offset) => {
                let _ = write!(out, "{} 23:59:60.{:06}", sys.format("%Y-%m-%d"), offset);
            }
            None => sys.encode_text(out),
        }
    }
}

// ============================================================================
// Durations
// ============================================================================

/// ISO-8601 with a leading `-` for negative spans: `-PT1.5S`.
impl<R: Resolution> Encode for Duration<R> {
    fn encode_text(&self, out: &mut String) {
        if self.ticks() < 0 {
            out.push('-');
        }
        out.push('P');
        write_iso_time(
            out,
            "",
            u128::from(self.ticks().unsigned_abs()),
            R::PER_SECOND as u128,
            true,
        );
    }
}

impl Encode for TimeDelta {
    fn encode_text(&self, out: &mut String) {
        let micros = i128::from(self.num_seconds()) * i128::from(USEC_PER_SEC)
            + i128::from(self.subsec_nanos() / 1_000);
        if micros < 0 {
            out.push('-');
        }
        out.push('P');
        write_iso_time(out, "", micros.unsigned_abs(), USEC_PER_SEC as u128, true);
    }
}

/// `P[nM][nD]T...` with a sign on each negative component, as PostgreSQL's
/// `iso_8601` interval style writes them. Hours are not folded into days.
impl Encode for Interval {
    fn encode_text(&self, out: &mut String) {
        out.push('P');
        if self.months != 0 {
            let _ = write!(out, "{}M", self.months);
        }
        if self.days != 0 {
            let _ = write!(out, "{}D", self.days);
        }
        let sign = if self.micros < 0 { "-" } else { "" };
        write_iso_time(
            out,
            sign,
            u128::from(self.micros.unsigned_abs()),
            USEC_PER_SEC as u128,
            false,
        );
    }
}

/// Write `[nD]T[nH][nM]n[.fraction]S` for `ticks` at `per_second`. Zero
/// day/hour/minute parts are omitted; seconds are always written. `sign`
/// prefixes every number.
fn write_iso_time(out: &mut String, sign: &str, mut ticks: u128, per_second: u128, days: bool) {
    let mut part = |out: &mut String, unit_secs: u128, suffix: char| {
        let unit = unit_secs * per_second;
        let n = ticks / unit;
        if n != 0 {
            let _ = write!(out, "{}{}{}", sign, n, suffix);
            ticks -= n * unit;
        }
    };

    if days {
        part(out, 86_400, 'D');
    }
    out.push('T');
    part(out, 3_600, 'H');
    part(out, 60, 'M');

    let _ = write!(out, "{}{}", sign, ticks / per_second);
    ticks %= per_second;
    if ticks > 0 {
        out.push('.');
        let mut denom = per_second / 10;
        while ticks != 0 && denom != 0 {
            let _ = write!(out, "{}", ticks / denom);
            ticks %= denom;
            denom /= 10;
        }
    }
    out.push('S');
}
