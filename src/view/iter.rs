use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use super::row::Row;
use crate::pg::{RawResult, ResultSet};

/// A row position in a result.
///
/// Works both as a cursor (offset it, subtract two positions, compare them)
/// and as a forward [`Iterator`] yielding [`Row`] views. Arithmetic wraps like
/// an unsigned index; a position past the end simply yields no rows and its
/// fields fail with [`Error::RowOutOfRange`](crate::Error::RowOutOfRange).
pub struct ResultIter<'r, R: RawResult + ?Sized = ResultSet> {
    res: &'r R,
    pos: usize,
}

impl<'r, R: RawResult + ?Sized> ResultIter<'r, R> {
    /// Iterator at the first row.
    pub fn new(res: &'r R) -> Self {
        Self::at(res, 0)
    }

    pub fn at(res: &'r R, pos: usize) -> Self {
        Self { res, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Row at the current position.
    pub fn row(&self) -> Row<'r, R> {
        Row::new(self.res, self.pos)
    }
}

impl<'r, R: RawResult + ?Sized> Iterator for ResultIter<'r, R> {
    type Item = Row<'r, R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.res.row_count() {
            return None;
        }
        let row = self.row();
        self.pos += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.res.row_count().saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}

impl<R: RawResult + ?Sized> ExactSizeIterator for ResultIter<'_, R> {}

impl<R: RawResult + ?Sized> FusedIterator for ResultIter<'_, R> {}

// ============================================================================
// Position arithmetic
// ============================================================================

impl<R: RawResult + ?Sized> Add<usize> for ResultIter<'_, R> {
    type Output = Self;

    fn add(mut self, n: usize) -> Self {
        self += n;
        self
    }
}

impl<'r, R: RawResult + ?Sized> Add<ResultIter<'r, R>> for usize {
    type Output = ResultIter<'r, R>;

    fn add(self, it: ResultIter<'r, R>) -> ResultIter<'r, R> {
        it + self
    }
}

impl<R: RawResult + ?Sized> Sub<usize> for ResultIter<'_, R> {
    type Output = Self;

    fn sub(mut self, n: usize) -> Self {
        self -= n;
        self
    }
}

/// Signed distance in rows.
impl<R: RawResult + ?Sized> Sub for ResultIter<'_, R> {
    type Output = isize;

    fn sub(self, other: Self) -> isize {
        self.pos.wrapping_sub(other.pos) as isize
    }
}

impl<R: RawResult + ?Sized> AddAssign<usize> for ResultIter<'_, R> {
    fn add_assign(&mut self, n: usize) {
        self.pos = self.pos.wrapping_add(n);
    }
}

impl<R: RawResult + ?Sized> SubAssign<usize> for ResultIter<'_, R> {
    fn sub_assign(&mut self, n: usize) {
        self.pos = self.pos.wrapping_sub(n);
    }
}

// Equality and ordering look at the position only.

impl<R: RawResult + ?Sized> PartialEq for ResultIter<'_, R> {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
    }
}

impl<R: RawResult + ?Sized> Eq for ResultIter<'_, R> {}

impl<R: RawResult + ?Sized> PartialOrd for ResultIter<'_, R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R: RawResult + ?Sized> Ord for ResultIter<'_, R> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pos.cmp(&other.pos)
    }
}

impl<R: RawResult + ?Sized> Clone for ResultIter<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: RawResult + ?Sized> Copy for ResultIter<'_, R> {}

impl<R: RawResult + ?Sized> fmt::Debug for ResultIter<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultIter").field("pos", &self.pos).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::fixtures::numbered;
    use crate::Error;

    #[test]
    fn test_offset_algebra() {
        let rs = numbered(10);
        let it = rs.begin() + 3;

        assert_eq!((it + 2) - it, 2);
        assert_eq!(it - (it + 2), -2);
        assert_eq!(it + 2, 2 + it);
        assert_eq!((it + 2 - 1).position(), 4);
        assert!(it < it + 1);
        assert!(it + 1 >= it);
        assert_eq!(rs.end() - rs.begin(), 10);
    }

    #[test]
    fn test_deref_matches_direct_row() {
        let rs = numbered(10);
        let it = rs.begin() + 3;
        let via_iter = (it + 2).row();
        let direct = rs.row(5);
        assert_eq!(via_iter.index(), 5);
        for (a, b) in via_iter.fields().zip(direct.fields()) {
            assert_eq!(a.bytes(), b.bytes());
        }
        assert_eq!(via_iter.get(0).get::<i32>().unwrap(), 5);
    }

    #[test]
    fn test_compound_assignment() {
        let rs = numbered(4);
        let mut it = rs.begin();
        it += 3;
        assert_eq!(it.position(), 3);
        it -= 1;
        assert_eq!(it.position(), 2);
    }

    #[test]
    fn test_forward_traversal() {
        let rs = numbered(4);
        let ids: Vec<i32> = rs.iter().map(|row| row.get(0).get().unwrap()).collect();
        assert_eq!(ids, [0, 1, 2, 3]);

        let mut it = rs.begin() + 2;
        assert_eq!(it.len(), 2);
        assert_eq!(it.next().map(|r| r.index()), Some(2));
        assert_eq!(it.len(), 1);

        let mut count = 0;
        for row in &rs {
            assert!(row.index() < 4);
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn test_past_the_end() {
        let rs = numbered(2);
        let mut end = rs.end();
        assert_eq!(end.len(), 0);
        assert!(end.next().is_none());
        assert!(matches!(
            end.row().get(0).get::<i32>(),
            Err(Error::RowOutOfRange { row: 2, rows: 2 })
        ));

        // Stepping back from the start wraps instead of panicking.
        let before = rs.begin() - 1;
        assert_eq!(before.position(), usize::MAX);
        assert_eq!(before.len(), 0);
    }
}
