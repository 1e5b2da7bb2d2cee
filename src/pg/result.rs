//! Raw result handles.
//!
//! [`RawResult`] is the shape every view in [`crate::view`] reads through: a
//! grid of cells that are either NULL or a byte slice, plus per-column
//! metadata. [`ResultSet`] is the handle this crate assembles from backend
//! messages; connections that keep their own buffers can implement the trait
//! directly instead.

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use smallvec::SmallVec;

use super::protocol::{error_from_fields, BackendMessage, FieldDescription, Format};
use super::types::Oid;
use crate::error::{Error, Result};
use crate::view::{ResultIter, Row};

/// Shared column descriptions - wrapped in Arc so cloning a handle never
/// copies per-column metadata.
pub type SharedColumns = Arc<Vec<FieldDescription>>;

/// One row of cells. Most results have few columns, so up to 16 cells are
/// stored inline.
type DataRow = SmallVec<[Option<Bytes>; 16]>;

/// Read-only access to one completed query's result grid.
///
/// Every method must tolerate out-of-range coordinates by returning `None` /
/// `true` rather than panicking; the views turn those answers into errors.
pub trait RawResult {
    /// Number of rows in the result.
    fn row_count(&self) -> usize;

    /// Number of columns in the result.
    fn column_count(&self) -> usize;

    /// Whether the cell has no value. Out-of-range coordinates count as null.
    fn is_null(&self, row: usize, col: usize) -> bool;

    /// Payload of a non-null cell.
    fn value(&self, row: usize, col: usize) -> Option<&[u8]>;

    /// Wire format of a column. Format is a per-column property.
    fn format(&self, col: usize) -> Option<Format>;

    /// Name of a column as sent by the server.
    fn column_name(&self, col: usize) -> Option<&str>;

    /// Type OID of a column.
    fn column_type(&self, col: usize) -> Option<Oid>;

    /// Position of the column called `name`, using libpq's `PQfnumber` rules:
    /// unquoted names are case-folded to lower case, double-quoted names are
    /// matched exactly.
    fn column_number(&self, name: &str) -> Option<usize> {
        let wanted = fold_column_name(name);
        (0..self.column_count()).find(|&col| self.column_name(col) == Some(&*wanted))
    }
}

/// Apply `PQfnumber` case folding to a lookup key.
fn fold_column_name(name: &str) -> Cow<'_, str> {
    if !name.contains('"') && !name.bytes().any(|b| b.is_ascii_uppercase()) {
        return Cow::Borrowed(name);
    }

    let mut folded = String::with_capacity(name.len());
    let mut in_quotes = false;
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                folded.push('"');
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
        } else if in_quotes {
            folded.push(c);
        } else {
            folded.push(c.to_ascii_lowercase());
        }
    }
    Cow::Owned(folded)
}

// ============================================================================
// Result Set
// ============================================================================

/// A complete, immutable query result.
///
/// Cloning is cheap: columns and rows are reference-counted and cell payloads
/// are slices of the DataRow buffers they arrived in.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: SharedColumns,
    rows: Arc<Vec<DataRow>>,
    command_tag: String,
}

impl ResultSet {
    /// Start building a result by hand or from backend messages.
    pub fn builder() -> ResultSetBuilder {
        ResultSetBuilder::default()
    }

    /// Assemble a result from the backend messages of one statement.
    ///
    /// Consumes messages up to the statement's completion (CommandComplete,
    /// EmptyQueryResponse or PortalSuspended). An ErrorResponse is returned as
    /// [`Error::Server`].
    pub fn from_messages<I>(messages: I) -> Result<Self>
    where
        I: IntoIterator<Item = BackendMessage>,
    {
        let mut builder = Self::builder();
        for msg in messages {
            if builder.push_message(msg)? {
                break;
            }
        }
        builder.build()
    }

    /// Decode backend messages from a raw buffer and assemble the result.
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        let mut builder = Self::builder();
        while !buf.is_empty() {
            let msg = BackendMessage::decode(&mut buf)?;
            if builder.push_message(msg)? {
                break;
            }
        }
        builder.build()
    }

    /// Column descriptions.
    pub fn columns(&self) -> &SharedColumns {
        &self.columns
    }

    /// Command tag (e.g., "SELECT 5" or "INSERT 0 1")
    pub fn command_tag(&self) -> &str {
        &self.command_tag
    }

    /// Rows affected according to the command tag.
    pub fn rows_affected(&self) -> u64 {
        parse_rows_affected(&self.command_tag)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterator positioned at the first row.
    pub fn begin(&self) -> ResultIter<'_> {
        ResultIter::new(self)
    }

    /// Iterator positioned one past the last row.
    pub fn end(&self) -> ResultIter<'_> {
        ResultIter::at(self, self.len())
    }

    /// Forward traversal over all rows.
    pub fn iter(&self) -> ResultIter<'_> {
        self.begin()
    }

    /// View of row `n`. Not bounds-checked; field access on a missing row
    /// fails with [`Error::RowOutOfRange`].
    pub fn row(&self, n: usize) -> Row<'_> {
        Row::new(self, n)
    }

    fn cell(&self, row: usize, col: usize) -> Option<&Bytes> {
        self.rows.get(row)?.get(col)?.as_ref()
    }
}

impl RawResult for ResultSet {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn is_null(&self, row: usize, col: usize) -> bool {
        self.cell(row, col).is_none()
    }

    fn value(&self, row: usize, col: usize) -> Option<&[u8]> {
        self.cell(row, col).map(|b| b.as_ref())
    }

    fn format(&self, col: usize) -> Option<Format> {
        self.columns.get(col).map(|c| c.format)
    }

    fn column_name(&self, col: usize) -> Option<&str> {
        self.columns.get(col).map(|c| c.name.as_str())
    }

    fn column_type(&self, col: usize) -> Option<Oid> {
        self.columns.get(col).map(|c| c.type_oid)
    }
}

impl<'r> IntoIterator for &'r ResultSet {
    type Item = Row<'r>;
    type IntoIter = ResultIter<'r>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects columns and rows, validating row width on [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ResultSetBuilder {
    columns: Vec<FieldDescription>,
    rows: Vec<DataRow>,
    command_tag: String,
}

impl ResultSetBuilder {
    /// Append a column description.
    pub fn column(mut self, name: impl Into<String>, type_oid: Oid, format: Format) -> Self {
        self.columns.push(FieldDescription::new(name, type_oid, format));
        self
    }

    /// Append a row of cells; `None` is NULL.
    pub fn row(mut self, values: Vec<Option<Bytes>>) -> Self {
        self.rows.push(DataRow::from_vec(values));
        self
    }

    /// Set the command tag.
    pub fn command_tag(mut self, tag: impl Into<String>) -> Self {
        self.command_tag = tag.into();
        self
    }

    /// Feed one backend message. Returns `true` once the statement completed.
    pub fn push_message(&mut self, msg: BackendMessage) -> Result<bool> {
        match msg {
            BackendMessage::RowDescription { fields } => {
                if !self.rows.is_empty() {
                    return Err(Error::Protocol(
                        "RowDescription after DataRow".to_string(),
                    ));
                }
                self.columns = fields;
                Ok(false)
            }
            BackendMessage::DataRow { values } => {
                if values.len() != self.columns.len() {
                    return Err(Error::Protocol(format!(
                        "DataRow has {} values, expected {}",
                        values.len(),
                        self.columns.len()
                    )));
                }
                self.rows.push(DataRow::from_vec(values));
                Ok(false)
            }
            BackendMessage::CommandComplete { tag } => {
                self.command_tag = tag;
                Ok(true)
            }
            BackendMessage::EmptyQueryResponse
            | BackendMessage::PortalSuspended
            | BackendMessage::ReadyForQuery { .. } => Ok(true),
            BackendMessage::ErrorResponse { fields } => Err(error_from_fields(&fields)),
            // Notices, parameter status and extended-protocol acknowledgements
            // carry nothing for the result itself.
            _ => Ok(false),
        }
    }

    /// Finish the result, rejecting rows whose width differs from the columns.
    pub fn build(self) -> Result<ResultSet> {
        if let Some(bad) = self.rows.iter().find(|r| r.len() != self.columns.len()) {
            return Err(Error::Protocol(format!(
                "DataRow has {} values, expected {}",
                bad.len(),
                self.columns.len()
            )));
        }
        Ok(ResultSet {
            columns: Arc::new(self.columns),
            rows: Arc::new(self.rows),
            command_tag: self.command_tag,
        })
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Parse rows affected from a PostgreSQL command tag.
fn parse_rows_affected(tag: &str) -> u64 {
    // - "INSERT 0 5" -> 5 rows
    // - "UPDATE 3" / "DELETE 2" / "SELECT 10" / "COPY 7"
    let parts: Vec<&str> = tag.split_whitespace().collect();
    match parts.as_slice() {
        ["INSERT", _, n]
        | ["UPDATE", n]
        | ["DELETE", n]
        | ["SELECT", n]
        | ["MERGE", n]
        | ["MOVE", n]
        | ["FETCH", n]
        | ["COPY", n] => n.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> ResultSet {
        ResultSet::builder()
            .column("id", Oid::INT4, Format::Binary)
            .column("Name", Oid::TEXT, Format::Text)
            .column("email", Oid::TEXT, Format::Text)
            .row(vec![
                Some(Bytes::from_static(&[0, 0, 0, 1])),
                Some(Bytes::from_static(b"ada")),
                None,
            ])
            .command_tag("SELECT 1")
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_rows_affected() {
        assert_eq!(parse_rows_affected("INSERT 0 5"), 5);
        assert_eq!(parse_rows_affected("UPDATE 3"), 3);
        assert_eq!(parse_rows_affected("DELETE 2"), 2);
        assert_eq!(parse_rows_affected("SELECT 10"), 10);
        assert_eq!(parse_rows_affected("UNKNOWN"), 0);
    }

    #[test]
    fn test_raw_access() {
        let rs = people();
        assert_eq!(rs.row_count(), 1);
        assert_eq!(rs.column_count(), 3);
        assert_eq!(rs.value(0, 0), Some(&[0u8, 0, 0, 1][..]));
        assert!(rs.is_null(0, 2));
        assert!(rs.is_null(5, 0));
        assert!(rs.is_null(0, 9));
        assert_eq!(rs.format(1), Some(Format::Text));
        assert_eq!(rs.format(3), None);
        assert_eq!(rs.column_type(0), Some(Oid::INT4));
        assert_eq!(rs.rows_affected(), 1);
    }

    #[test]
    fn test_column_number_folds_case_like_pqfnumber() {
        let rs = people();
        assert_eq!(rs.column_number("id"), Some(0));
        assert_eq!(rs.column_number("ID"), Some(0));
        // Unquoted lookups fold to lower case, so a mixed-case column needs quotes.
        assert_eq!(rs.column_number("Name"), None);
        assert_eq!(rs.column_number("\"Name\""), Some(1));
        assert_eq!(rs.column_number("missing"), None);
    }

    #[test]
    fn test_fold_column_name_unescapes_quotes() {
        assert_eq!(fold_column_name("\"a\"\"b\""), "a\"b");
        assert_eq!(fold_column_name("MiXeD"), "mixed");
        assert!(matches!(fold_column_name("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_build_rejects_ragged_rows() {
        let err = ResultSet::builder()
            .column("a", Oid::INT4, Format::Text)
            .row(vec![None, None])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_clone_shares_rows() {
        let rs = people();
        let copy = rs.clone();
        assert!(Arc::ptr_eq(&rs.rows, &copy.rows));
        assert!(Arc::ptr_eq(rs.columns(), copy.columns()));
    }
}
