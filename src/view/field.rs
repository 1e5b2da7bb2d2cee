use std::fmt;

use crate::decode::Decode;
use crate::error::{Error, Result};
use crate::pg::{Format, Oid, RawResult, ResultSet};

/// Column index carried by a [`Field`] whose name lookup found nothing.
pub const NO_SUCH_FIELD: usize = usize::MAX;

/// One cell of a result, addressed by row and column.
///
/// Coordinates are checked on every access rather than at construction, so a
/// `Field` can be built for any position and will report the problem when it
/// is read.
pub struct Field<'r, R: RawResult + ?Sized = ResultSet> {
    res: &'r R,
    row: usize,
    col: usize,
}

impl<'r, R: RawResult + ?Sized> Field<'r, R> {
    pub fn new(res: &'r R, row: usize, col: usize) -> Self {
        Self { res, row, col }
    }

    pub fn row_index(&self) -> usize {
        self.row
    }

    pub fn column_index(&self) -> usize {
        self.col
    }

    /// Decode the cell as `T`.
    ///
    /// Fails if the cell is NULL and `T` cannot represent NULL, or if a binary
    /// cell's length is outside what `T` accepts. A zero-length binary cell is
    /// accepted for nullable `T`.
    pub fn get<T: Decode<'r>>(&self) -> Result<T> {
        self.check()?;

        if self.res.is_null(self.row, self.col) {
            if !T::NULLABLE {
                return Err(Error::UnexpectedNull {
                    column: self.label(),
                });
            }
            return T::decode_null().map_err(|e| self.annotate(e));
        }

        let format = self.format()?;
        if format == Format::Binary {
            let len = self.bytes().map_or(0, <[u8]>::len);
            let nullable_empty = T::NULLABLE && len == 0;
            if !nullable_empty && !(T::MIN_SIZE..=T::MAX_SIZE).contains(&len) {
                return Err(Error::LengthOutOfRange {
                    len,
                    min: T::MIN_SIZE,
                    max: T::MAX_SIZE,
                    column: self.label(),
                });
            }
        }

        self.decode(format)
    }

    /// Like [`get`](Self::get), but a NULL cell yields `default` without
    /// running the decoder.
    pub fn get_or<T: Decode<'r>>(&self, default: T) -> Result<T> {
        self.check()?;
        if self.res.is_null(self.row, self.col) {
            return Ok(default);
        }
        self.get()
    }

    /// Decode without the nullability and length checks, for callers that
    /// already validated the result's shape. Still picks the text or binary
    /// decoder from the column format, and decoders still reject bytes they
    /// cannot read.
    pub fn get_unvalidated<T: Decode<'r>>(&self) -> Result<T> {
        self.check()?;
        if self.res.is_null(self.row, self.col) {
            return T::decode_null().map_err(|e| self.annotate(e));
        }
        self.decode(self.format()?)
    }

    pub fn get_unvalidated_or<T: Decode<'r>>(&self, default: T) -> Result<T> {
        self.check()?;
        if self.res.is_null(self.row, self.col) {
            return Ok(default);
        }
        self.decode(self.format()?)
    }

    /// Whether the cell has no value. Positions outside the result are null.
    pub fn is_null(&self) -> bool {
        self.res.is_null(self.row, self.col)
    }

    /// Wire format of this field's column.
    pub fn format(&self) -> Result<Format> {
        self.check()?;
        self.res.format(self.col).ok_or(Error::ColumnOutOfRange {
            column: self.col,
            columns: self.res.column_count(),
        })
    }

    /// Column name as sent by the server.
    pub fn name(&self) -> Option<&'r str> {
        self.res.column_name(self.col)
    }

    pub fn type_oid(&self) -> Option<Oid> {
        self.res.column_type(self.col)
    }

    /// Raw cell payload; `None` for NULL or an invalid position.
    pub fn bytes(&self) -> Option<&'r [u8]> {
        self.res.value(self.row, self.col)
    }

    fn check(&self) -> Result<()> {
        if self.col == NO_SUCH_FIELD {
            return Err(Error::NoSuchField);
        }
        let rows = self.res.row_count();
        if self.row >= rows {
            return Err(Error::RowOutOfRange {
                row: self.row,
                rows,
            });
        }
        let columns = self.res.column_count();
        if self.col >= columns {
            return Err(Error::ColumnOutOfRange {
                column: self.col,
                columns,
            });
        }
        Ok(())
    }

    fn decode<T: Decode<'r>>(&self, format: Format) -> Result<T> {
        let bytes: &'r [u8] = self.bytes().unwrap_or_default();
        let decoded = match format {
            Format::Binary => T::decode_binary(bytes),
            Format::Text => std::str::from_utf8(bytes)
                .map_err(|e| Error::InvalidData(format!("Invalid UTF-8 in text value: {}", e)))
                .and_then(T::decode_text),
        };
        decoded.map_err(|e| self.annotate(e))
    }

    fn label(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("#{}", self.col),
        }
    }

    fn annotate(&self, source: Error) -> Error {
        Error::Column {
            column: self.label(),
            source: Box::new(source),
        }
    }
}

impl<R: RawResult + ?Sized> Clone for Field<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: RawResult + ?Sized> Copy for Field<'_, R> {}

impl<R: RawResult + ?Sized> fmt::Debug for Field<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("row", &self.row)
            .field("col", &self.col)
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::fixtures::numbered;
    use bytes::Bytes;
    use chrono::{DateTime, NaiveDate, Utc};

    fn single(oid: Oid, format: Format, cell: Option<&'static [u8]>) -> ResultSet {
        ResultSet::builder()
            .column("v", oid, format)
            .row(vec![cell.map(Bytes::from_static)])
            .build()
            .unwrap()
    }

    #[test]
    fn test_get_binary_and_text() {
        let rs = numbered(3);
        assert_eq!(Field::new(&rs, 2, 0).get::<i32>().unwrap(), 2);
        assert_eq!(Field::new(&rs, 1, 1).get::<&str>().unwrap(), "row 1");
        assert_eq!(
            Field::new(&rs, 0, 2).get::<DateTime<Utc>>().unwrap(),
            NaiveDate::from_ymd_opt(2000, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc()
        );
    }

    #[test]
    fn test_null_handling() {
        let rs = numbered(2);
        let null = Field::new(&rs, 1, 2);
        assert!(null.is_null());
        assert!(matches!(
            null.get::<DateTime<Utc>>(),
            Err(Error::UnexpectedNull { ref column }) if column == "created_at"
        ));
        assert_eq!(null.get::<Option<DateTime<Utc>>>().unwrap(), None);

        let fallback = DateTime::<Utc>::MIN_UTC;
        assert_eq!(null.get_or(fallback).unwrap(), fallback);
        assert_eq!(null.get_unvalidated_or(fallback).unwrap(), fallback);
    }

    #[test]
    fn test_get_or_ignores_default_for_values() {
        let rs = numbered(1);
        assert_eq!(Field::new(&rs, 0, 0).get_or(-1i32).unwrap(), 0);
    }

    #[test]
    fn test_binary_length_bounds() {
        let short = single(Oid::TIMESTAMPTZ, Format::Binary, Some(&[0; 7]));
        match Field::new(&short, 0, 0).get::<DateTime<Utc>>() {
            Err(Error::LengthOutOfRange {
                len,
                min,
                max,
                column,
            }) => {
                assert_eq!((len, min, max), (7, 8, 8));
                assert_eq!(column, "v");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let exact = single(Oid::TIMESTAMPTZ, Format::Binary, Some(&[0; 8]));
        assert!(Field::new(&exact, 0, 0).get::<DateTime<Utc>>().is_ok());
    }

    #[test]
    fn test_empty_binary_cell_is_none_for_nullable() {
        let empty = single(Oid::INT8, Format::Binary, Some(&[]));
        assert_eq!(Field::new(&empty, 0, 0).get::<Option<i64>>().unwrap(), None);
        assert!(matches!(
            Field::new(&empty, 0, 0).get::<i64>(),
            Err(Error::LengthOutOfRange { len: 0, .. })
        ));
    }

    #[test]
    fn test_text_cells_skip_length_check() {
        let text = single(Oid::INT8, Format::Text, Some(b"1234567"));
        assert_eq!(Field::new(&text, 0, 0).get::<i64>().unwrap(), 1_234_567);
    }

    #[test]
    fn test_unvalidated_still_fails_cleanly() {
        let short = single(Oid::INT8, Format::Binary, Some(&[0; 7]));
        let err = Field::new(&short, 0, 0).get_unvalidated::<i64>().unwrap_err();
        assert!(matches!(err, Error::Column { ref source, .. } if matches!(**source, Error::InvalidData(_))));

        let ok = single(Oid::INT8, Format::Binary, Some(&[0, 0, 0, 0, 0, 0, 0, 9]));
        assert_eq!(Field::new(&ok, 0, 0).get_unvalidated::<i64>().unwrap(), 9);
    }

    #[test]
    fn test_decode_errors_name_the_column() {
        let bad = single(Oid::INTERVAL, Format::Text, Some(b"01:xx:03"));
        let err = Field::new(&bad, 0, 0)
            .get::<crate::time::Duration>()
            .unwrap_err();
        assert!(err.to_string().starts_with("field v: cannot parse"));
    }

    #[test]
    fn test_out_of_range_coordinates() {
        let rs = numbered(2);
        assert!(matches!(
            Field::new(&rs, 2, 0).get::<i32>(),
            Err(Error::RowOutOfRange { row: 2, rows: 2 })
        ));
        assert!(matches!(
            Field::new(&rs, 0, 3).get::<i32>(),
            Err(Error::ColumnOutOfRange { column: 3, columns: 3 })
        ));
        assert!(Field::new(&rs, 0, 3).is_null());
        assert!(Field::new(&rs, 9, 0).get_or(0i32).is_err());
        assert!(matches!(
            Field::new(&rs, 0, NO_SUCH_FIELD).get::<i32>(),
            Err(Error::NoSuchField)
        ));
    }

    #[test]
    fn test_introspection() {
        let rs = numbered(1);
        let f = Field::new(&rs, 0, 1);
        assert_eq!(f.format().unwrap(), Format::Text);
        assert_eq!(f.name(), Some("label"));
        assert_eq!(f.type_oid(), Some(Oid::TEXT));
        assert_eq!(f.bytes(), Some(&b"row 0"[..]));
        assert_eq!((f.row_index(), f.column_index()), (0, 1));
    }

    #[test]
    fn test_borrowed_str_points_into_the_handle() {
        let rs = numbered(1);
        let f = Field::new(&rs, 0, 1);
        let s: &str = f.get().unwrap();
        assert_eq!(s.as_ptr(), f.bytes().unwrap().as_ptr());
    }
}
