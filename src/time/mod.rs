//! Temporal value types.
//!
//! PostgreSQL sends timestamps as microseconds since 2000-01-01 and intervals
//! as (microseconds, days, months). This module provides the Rust-side types
//! those are decoded into:
//!
//! - system time points are plain `chrono::DateTime<Utc>` / `NaiveDateTime`;
//! - [`UtcTime`] is a leap-second-aware time point;
//! - [`Duration<R>`] is an exact tick count at a resolution `R` of one second
//!   or finer;
//! - [`Interval`] is the full interval wire value, for callers that need the
//!   day and month components a [`Duration`] drops.

mod text;
mod utc;

use std::fmt;
use std::marker::PhantomData;

pub(crate) use text::{parse_clock, parse_date, parse_timestamp, ClockLimits};
pub use utc::{LeapSecondInfo, UtcTime};

/// Microseconds between 1970-01-01 and the PostgreSQL epoch 2000-01-01.
pub const PG_EPOCH_OFFSET_USEC: i64 = 946_684_800_000_000;

pub(crate) const USEC_PER_SEC: i64 = 1_000_000;

// ============================================================================
// Resolutions
// ============================================================================

mod sealed {
    pub trait Sealed {}
}

/// Tick length of a [`Duration`].
///
/// Only resolutions of one second or finer exist; the trait is sealed so a
/// coarser unit cannot be introduced downstream.
pub trait Resolution:
    sealed::Sealed
    + Copy
    + Clone
    + fmt::Debug
    + Default
    + PartialEq
    + Eq
    + PartialOrd
    + Ord
    + std::hash::Hash
    + Send
    + Sync
    + 'static
{
    /// Ticks in one second.
    const PER_SECOND: i64;
    /// `log10(PER_SECOND)`: digits of fractional seconds the resolution keeps.
    const DIGITS: usize;
}

macro_rules! resolution {
    ($($(#[$meta:meta])* $name:ident => $per_second:expr, $digits:expr;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $name;

            impl sealed::Sealed for $name {}

            impl Resolution for $name {
                const PER_SECOND: i64 = $per_second;
                const DIGITS: usize = $digits;
            }
        )*
    };
}

resolution! {
    /// Whole seconds.
    Seconds => 1, 0;
    /// Milliseconds.
    Millis => 1_000, 3;
    /// Microseconds, the native resolution of the wire format.
    Micros => 1_000_000, 6;
    /// Nanoseconds.
    Nanos => 1_000_000_000, 9;
}

// ============================================================================
// Duration
// ============================================================================

/// A signed span of time counted in ticks of `R`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration<R: Resolution = Micros> {
    ticks: i64,
    _resolution: PhantomData<R>,
}

impl<R: Resolution> Duration<R> {
    pub const ZERO: Self = Self::from_ticks(0);

    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self {
            ticks,
            _resolution: PhantomData,
        }
    }

    /// Whole seconds; saturates at the representable range.
    pub fn from_secs(secs: i64) -> Self {
        Self::from_ticks(secs.saturating_mul(R::PER_SECOND))
    }

    /// Convert a microsecond count, truncating toward zero for coarser
    /// resolutions. `None` if the value does not fit at a finer resolution.
    pub fn from_micros(micros: i64) -> Option<Self> {
        let ticks = if R::PER_SECOND >= USEC_PER_SEC {
            micros.checked_mul(R::PER_SECOND / USEC_PER_SEC)?
        } else {
            micros / (USEC_PER_SEC / R::PER_SECOND)
        };
        Some(Self::from_ticks(ticks))
    }

    #[inline]
    pub const fn ticks(self) -> i64 {
        self.ticks
    }

    /// Whole seconds, truncated toward zero.
    pub fn as_secs(self) -> i64 {
        self.ticks / R::PER_SECOND
    }

    /// Ticks past the last whole second (negative for negative durations).
    pub fn subsec_ticks(self) -> i64 {
        self.ticks % R::PER_SECOND
    }

    /// Re-express at another resolution, truncating toward zero when coarser.
    pub fn convert<S: Resolution>(self) -> Option<Duration<S>> {
        let ticks = if S::PER_SECOND >= R::PER_SECOND {
            self.ticks.checked_mul(S::PER_SECOND / R::PER_SECOND)?
        } else {
            self.ticks / (R::PER_SECOND / S::PER_SECOND)
        };
        Some(Duration::from_ticks(ticks))
    }
}

impl<R: Resolution> std::ops::Neg for Duration<R> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::from_ticks(self.ticks.wrapping_neg())
    }
}

// ============================================================================
// Interval
// ============================================================================

/// The complete `interval` wire value.
///
/// Months and days are calendar components whose length depends on the date
/// they are applied to, so they cannot be folded into a fixed span. Decoding
/// an interval as a [`Duration`] keeps only `micros`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Interval {
    pub micros: i64,
    pub days: i32,
    pub months: i32,
}

impl Interval {
    pub fn new(months: i32, days: i32, micros: i64) -> Self {
        Self {
            micros,
            days,
            months,
        }
    }

    /// Whether decoding this value as a [`Duration`] loses information.
    pub fn is_lossy(&self) -> bool {
        self.days != 0 || self.months != 0
    }

    /// The microsecond component at resolution `R`; days and months are
    /// dropped.
    pub fn duration<R: Resolution>(&self) -> Option<Duration<R>> {
        Duration::from_micros(self.micros)
    }
}
