//! Text grammars for temporal values.
//!
//! - clock: `[-]H+:MM:SS[.fraction]` (durations, times of day)
//! - date: `YYYY-MM-DD`
//! - timestamp: `YYYY-MM-DD HH:MM:SS[.fraction][(+|-)HH[:MM[:SS]]]`
//!
//! Fractional seconds are read literally, right-padded with `0` to the
//! target's digit count (extra digits are cut) and then converted to ticks.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::error::{Error, Result};

/// Per-target constraints on the clock grammar.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClockLimits {
    pub max_hours: Option<i64>,
    pub allow_sign: bool,
    /// 59, or 60 where a leap second may be written.
    pub max_second: i64,
}

impl ClockLimits {
    pub const DURATION: ClockLimits = ClockLimits {
        max_hours: None,
        allow_sign: true,
        max_second: 59,
    };

    pub const TIME_OF_DAY: ClockLimits = ClockLimits {
        max_hours: Some(23),
        allow_sign: false,
        max_second: 59,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Clock {
    pub negative: bool,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    /// Fractional seconds in ticks of `10^-digits` seconds.
    pub ticks: i64,
}

impl Clock {
    /// Signed total in ticks of `per_second`; `None` on overflow.
    pub fn total_ticks(&self, per_second: i64) -> Option<i64> {
        let secs = self
            .hours
            .checked_mul(3600)?
            .checked_add(self.minutes * 60 + self.seconds)?;
        let total = secs.checked_mul(per_second)?.checked_add(self.ticks)?;
        Some(if self.negative { -total } else { total })
    }
}

/// Parse `part` with the clock grammar. Errors name `full`, the complete
/// text being decoded.
pub(crate) fn parse_clock(
    part: &str,
    full: &str,
    target: &'static str,
    digits: usize,
    limits: ClockLimits,
) -> Result<Clock> {
    let (negative, body) = match part.strip_prefix('-') {
        Some(rest) if limits.allow_sign => (true, rest),
        _ => (false, part),
    };

    let (hms, fraction) = match body.split_once('.') {
        Some((hms, fraction)) => (hms, Some(fraction)),
        None => (body, None),
    };

    let mut fields = hms.split(':');
    let hours = fields
        .next()
        .and_then(|h| number(h, None))
        .filter(|h| limits.max_hours.map_or(true, |max| *h <= max))
        .ok_or_else(|| Error::parse(full, target, "invalid hours"))?;
    let minutes = fields
        .next()
        .and_then(|m| number(m, Some(2)))
        .filter(|m| *m < 60)
        .ok_or_else(|| Error::parse(full, target, "invalid minutes"))?;
    let seconds = fields
        .next()
        .and_then(|s| number(s, Some(2)))
        .filter(|s| *s <= limits.max_second)
        .ok_or_else(|| Error::parse(full, target, "invalid seconds"))?;
    if fields.next().is_some() {
        return Err(Error::parse(full, target, "too many time components"));
    }

    let ticks = match fraction {
        None => 0,
        Some(fraction) => parse_fraction(fraction, digits)
            .ok_or_else(|| Error::parse(full, target, "invalid fractional seconds"))?,
    };

    Ok(Clock {
        negative,
        hours,
        minutes,
        seconds,
        ticks,
    })
}

/// Fraction digits to ticks.
///
/// `None` (a hard error) when the text after the decimal point is empty or not
/// all digits. A padded string that does not convert to an integer, which is
/// what a zero-digit resolution produces, yields zero ticks.
fn parse_fraction(fraction: &str, digits: usize) -> Option<i64> {
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut kept: String = fraction.chars().take(digits).collect();
    while kept.len() < digits {
        kept.push('0');
    }

    match kept.parse::<i64>() {
        Ok(ticks) => Some(ticks),
        Err(_) => {
            tracing::trace!(fraction, digits, "fractional seconds dropped");
            Some(0)
        }
    }
}

/// Parse `[+-]YYYY-MM-DD`. Years past 9999 or before year 1 carry a sign, as
/// chrono's `%Y` prints them; unsigned years of five or more digits are also
/// accepted.
pub(crate) fn parse_date(part: &str, full: &str, target: &'static str) -> Result<NaiveDate> {
    let invalid = || Error::parse(full, target, "invalid date");

    let (sign, unsigned) = match part.as_bytes().first() {
        Some(b'+') => (1, &part[1..]),
        Some(b'-') => (-1, &part[1..]),
        _ => (1, part),
    };

    let mut fields = unsigned.splitn(3, '-');
    let year = fields
        .next()
        .filter(|y| y.len() >= 4)
        .and_then(|y| number(y, None))
        .and_then(|y| i32::try_from(y).ok())
        .map(|y| sign * y)
        .ok_or_else(invalid)?;
    let month = fields.next().and_then(|m| number(m, Some(2))).ok_or_else(invalid)?;
    let day = fields.next().and_then(|d| number(d, Some(2))).ok_or_else(invalid)?;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(invalid)
}

/// Parse a timestamp into UTC wall time.
///
/// Returns the time and whether the text named second 60 (only accepted when
/// `allow_leap` is set; the returned time is then second 59 and the caller
/// decides whether that instant really was a leap second).
pub(crate) fn parse_timestamp(
    text: &str,
    target: &'static str,
    allow_leap: bool,
) -> Result<(NaiveDateTime, bool)> {
    let (date, rest) = text
        .split_once(' ')
        .or_else(|| text.split_once('T'))
        .ok_or_else(|| Error::parse(text, target, "expected date and time"))?;
    let date = parse_date(date, text, target)?;

    let (clock, offset) = split_offset(rest);
    let offset_secs = match offset {
        None => 0,
        Some(offset) => {
            parse_offset(offset).ok_or_else(|| Error::parse(text, target, "invalid UTC offset"))?
        }
    };

    let limits = ClockLimits {
        max_second: if allow_leap { 60 } else { 59 },
        ..ClockLimits::TIME_OF_DAY
    };
    let clock = parse_clock(clock, text, target, 9, limits)?;
    let leap = clock.seconds == 60;

    let time = NaiveTime::from_hms_nano_opt(
        clock.hours as u32,
        clock.minutes as u32,
        clock.seconds.min(59) as u32,
        clock.ticks as u32,
    )
    .ok_or_else(|| Error::parse(text, target, "invalid time"))?;

    let naive = date
        .and_time(time)
        .checked_sub_signed(TimeDelta::seconds(offset_secs))
        .ok_or_else(|| Error::parse(text, target, "timestamp out of range"))?;

    Ok((naive, leap))
}

fn split_offset(rest: &str) -> (&str, Option<&str>) {
    if let Some(i) = rest.find(['+', '-']) {
        (&rest[..i], Some(&rest[i..]))
    } else if let Some(clock) = rest.strip_suffix('Z') {
        (clock, Some("+00"))
    } else {
        (rest, None)
    }
}

/// `(+|-)HH[:MM[:SS]]` to signed seconds east of UTC.
fn parse_offset(offset: &str) -> Option<i64> {
    let (sign, body) = match offset.as_bytes().first()? {
        b'+' => (1, &offset[1..]),
        b'-' => (-1, &offset[1..]),
        _ => return None,
    };

    let mut fields = body.split(':');
    let hours = number(fields.next()?, Some(2)).filter(|h| *h <= 23)?;
    let minutes = match fields.next() {
        Some(m) => number(m, Some(2)).filter(|m| *m < 60)?,
        None => 0,
    };
    let seconds = match fields.next() {
        Some(s) => number(s, Some(2)).filter(|s| *s < 60)?,
        None => 0,
    };
    if fields.next().is_some() {
        return None;
    }

    Some(sign * (hours * 3600 + minutes * 60 + seconds))
}

/// Unsigned decimal, optionally of an exact width.
fn number(s: &str, width: Option<usize>) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if width.is_some_and(|w| s.len() != w) {
        return None;
    }
    s.parse().ok()
}
