//! Zero-copy views over a result handle.
//!
//! [`Field`], [`Row`] and [`ResultIter`] hold a shared reference to a
//! [`RawResult`](crate::pg::RawResult) plus integer coordinates. They never
//! copy cell bytes; decoding borrows straight from the handle, and the borrow
//! checker keeps the handle alive for as long as any view exists.
//!
//! ```ignore
//! for row in &result {
//!     let id: i32 = row.get(0).get()?;
//!     let email: Option<&str> = row.field("email").get()?;
//! }
//! ```

mod field;
mod iter;
mod row;

pub use field::{Field, NO_SUCH_FIELD};
pub use iter::ResultIter;
pub use row::Row;
