use std::fmt;

use super::field::{Field, NO_SUCH_FIELD};
use crate::error::{Error, Result};
use crate::pg::{RawResult, ResultSet};

/// One row of a result.
pub struct Row<'r, R: RawResult + ?Sized = ResultSet> {
    res: &'r R,
    row: usize,
}

impl<'r, R: RawResult + ?Sized> Row<'r, R> {
    pub fn new(res: &'r R, row: usize) -> Self {
        Self { res, row }
    }

    /// Position of this row in the result.
    pub fn index(&self) -> usize {
        self.row
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.res.column_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field at `col` without a bounds check; a bad position is reported when
    /// the field is read.
    pub fn get(&self, col: usize) -> Field<'r, R> {
        Field::new(self.res, self.row, col)
    }

    /// Field at `col`, bounds-checked against the row's field count.
    pub fn at(&self, col: usize) -> Result<Field<'r, R>> {
        let columns = self.len();
        if col >= columns {
            return Err(Error::ColumnOutOfRange {
                column: col,
                columns,
            });
        }
        Ok(self.get(col))
    }

    /// Field for the column called `name` (libpq lookup rules). A miss yields
    /// a field at [`NO_SUCH_FIELD`] that fails every read with
    /// [`Error::NoSuchField`].
    pub fn field(&self, name: &str) -> Field<'r, R> {
        let col = self.res.column_number(name).unwrap_or(NO_SUCH_FIELD);
        self.get(col)
    }

    /// Like [`field`](Self::field), but a miss is reported immediately.
    pub fn try_field(&self, name: &str) -> Result<Field<'r, R>> {
        self.res
            .column_number(name)
            .map(|col| self.get(col))
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    /// All fields in column order.
    pub fn fields(&self) -> impl Iterator<Item = Field<'r, R>> + 'r {
        let (res, row) = (self.res, self.row);
        (0..res.column_count()).map(move |col| Field::new(res, row, col))
    }
}

impl<R: RawResult + ?Sized> Clone for Row<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: RawResult + ?Sized> Copy for Row<'_, R> {}

impl<R: RawResult + ?Sized> fmt::Debug for Row<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("row", &self.row)
            .field("fields", &self.len())
            .finish()
    }
}
