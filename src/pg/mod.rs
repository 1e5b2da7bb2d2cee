//! PostgreSQL result handles.
//!
//! Architecture:
//! - `protocol`: Backend message decoding (RowDescription, DataRow, ...)
//! - `result`: The raw result handle trait and the `ResultSet` built from messages
//! - `types`: Type OIDs

pub mod protocol;
pub mod result;
pub mod types;


pub use protocol::{BackendMessage, FieldDescription, Format, TransactionStatus};
pub use result::{RawResult, ResultSet, ResultSetBuilder, SharedColumns};
pub use types::Oid;
