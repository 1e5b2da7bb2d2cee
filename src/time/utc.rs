//! Leap-second-aware time points.
//!
//! A [`UtcTime`] counts every SI second since 1970-01-01, including the 27
//! positive leap seconds inserted between 1972 and 2016. System time
//! (`chrono::DateTime<Utc>`) skips them, so the two scales drift apart by one
//! second at each insertion.

use std::fmt;

use chrono::{DateTime, Utc};

use super::USEC_PER_SEC;

/// Unix seconds of the midnight following each inserted leap second.
const LEAP_SECONDS: [i64; 27] = [
    78_796_800,    // 1972-07-01
    94_694_400,    // 1973-01-01
    126_230_400,   // 1974-01-01
    157_766_400,   // 1975-01-01
    189_302_400,   // 1976-01-01
    220_924_800,   // 1977-01-01
    252_460_800,   // 1978-01-01
    283_996_800,   // 1979-01-01
    315_532_800,   // 1980-01-01
    362_793_600,   // 1981-07-01
    394_329_600,   // 1982-07-01
    425_865_600,   // 1983-07-01
    489_024_000,   // 1985-07-01
    567_993_600,   // 1988-01-01
    631_152_000,   // 1990-01-01
    662_688_000,   // 1991-01-01
    709_948_800,   // 1992-07-01
    741_484_800,   // 1993-07-01
    773_020_800,   // 1994-07-01
    820_454_400,   // 1996-01-01
    867_715_200,   // 1997-07-01
    915_148_800,   // 1999-01-01
    1_136_073_600, // 2006-01-01
    1_230_768_000, // 2009-01-01
    1_341_100_800, // 2012-07-01
    1_435_708_800, // 2015-07-01
    1_483_228_800, // 2017-01-01
];

/// Whether a [`UtcTime`] falls inside a leap second, and how many leap seconds
/// had been inserted by then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeapSecondInfo {
    pub is_leap_second: bool,
    pub elapsed: i64,
}

/// A time point on the continuous UTC scale, in microseconds since
/// 1970-01-01T00:00:00 with leap seconds counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcTime {
    micros: i64,
}

impl UtcTime {
    pub const MIN: UtcTime = UtcTime { micros: i64::MIN };
    pub const MAX: UtcTime = UtcTime { micros: i64::MAX };

    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    #[inline]
    pub const fn as_micros(self) -> i64 {
        self.micros
    }

    /// Convert a system time, inserting every leap second up to and including
    /// `sys`. Sub-microsecond precision is truncated.
    pub fn from_sys(sys: DateTime<Utc>) -> Self {
        let sys_micros = sys.timestamp_micros();
        let elapsed = leap_seconds_before(sys_micros);
        Self::from_micros(sys_micros.saturating_add(elapsed * USEC_PER_SEC))
    }

    /// Convert back to system time. A time inside a leap second maps to the
    /// last microsecond before the following midnight. `None` if the result
    /// is outside chrono's range.
    pub fn to_sys(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.sys_micros())
    }

    pub fn leap_second_info(self) -> LeapSecondInfo {
        let mut elapsed = 0;
        for (i, &insertion) in LEAP_SECONDS.iter().enumerate() {
            let start = (insertion + i as i64) * USEC_PER_SEC;
            if self.micros < start {
                break;
            }
            if self.micros < start + USEC_PER_SEC {
                return LeapSecondInfo {
                    is_leap_second: true,
                    elapsed: i as i64 + 1,
                };
            }
            elapsed = i as i64 + 1;
        }
        LeapSecondInfo {
            is_leap_second: false,
            elapsed,
        }
    }

    /// Microseconds past the start of the leap second this time falls in.
    pub(crate) fn leap_offset_micros(self) -> Option<i64> {
        let info = self.leap_second_info();
        if !info.is_leap_second {
            return None;
        }
        let i = info.elapsed - 1;
        let start = (LEAP_SECONDS[i as usize] + i) * USEC_PER_SEC;
        Some(self.micros - start)
    }

    fn sys_micros(self) -> i64 {
        let info = self.leap_second_info();
        if info.is_leap_second {
            LEAP_SECONDS[(info.elapsed - 1) as usize] * USEC_PER_SEC - 1
        } else {
            self.micros.saturating_sub(info.elapsed * USEC_PER_SEC)
        }
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        crate::encode::Encode::encode_text(self, &mut out);
        f.write_str(&out)
    }
}

/// Leap seconds inserted at or before `sys_micros` on the system scale.
fn leap_seconds_before(sys_micros: i64) -> i64 {
    LEAP_SECONDS.partition_point(|&s| s * USEC_PER_SEC <= sys_micros) as i64
}
