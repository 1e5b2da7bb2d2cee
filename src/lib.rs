//! pgview - typed, zero-copy views over PostgreSQL query results.
//!
//! - [`decode`] / [`encode`]: per-type binary and text codecs
//! - [`time`]: durations at a chosen resolution, leap-second-aware UTC time
//! - [`pg`]: backend message decoding and the [`ResultSet`] handle
//! - [`view`]: [`Field`], [`Row`] and [`ResultIter`] views over a handle
//! - [`executor`]: the background event loop that runs database I/O

pub mod decode;
pub mod encode;
mod error;
pub mod executor;
pub mod pg;
pub mod time;
pub mod view;

pub use decode::Decode;
pub use encode::Encode;
pub use error::{Error, Result};
pub use executor::{Engine, EngineConfig};
pub use pg::{Format, Oid, RawResult, ResultSet};
pub use time::{Duration, Interval, UtcTime};
pub use view::{Field, ResultIter, Row};
