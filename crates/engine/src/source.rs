//! Raw row sources
//!
//! The engine never tokenizes text itself. It pulls ordered field arrays from a
//! [`RawSource`], which must also be able to replay from the beginning.

use crate::error::Result;

/// One physical row as produced by a tokenizer. `None` is an empty/unset field.
pub type RawRow = Vec<Option<String>>;

/// A rewindable stream of raw rows.
pub trait RawSource {
    /// Next raw row, or `None` at end of stream.
    fn next_raw_row(&mut self) -> Result<Option<RawRow>>;

    /// Reset the cursor so `next_raw_row` replays from the first row.
    fn rewind(&mut self) -> Result<()>;
}

impl<S: RawSource + ?Sized> RawSource for &mut S {
    fn next_raw_row(&mut self) -> Result<Option<RawRow>> {
        (**self).next_raw_row()
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }
}

impl<S: RawSource + ?Sized> RawSource for Box<S> {
    fn next_raw_row(&mut self) -> Result<Option<RawRow>> {
        (**self).next_raw_row()
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }
}

/// In-memory source over pre-tokenized rows.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    rows: Vec<RawRow>,
    cursor: usize,
}

impl VecSource {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows, cursor: 0 }
    }

    /// Build from string cells, treating `""` as an empty field.
    pub fn from_strs<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        let cell = cell.as_ref();
                        if cell.is_empty() {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect()
            })
            .collect();
        Self::new(rows)
    }

    /// Rows not yet handed out.
    pub fn remaining(&self) -> usize {
        self.rows.len().saturating_sub(self.cursor)
    }
}

impl RawSource for VecSource {
    fn next_raw_row(&mut self) -> Result<Option<RawRow>> {
        let row = self.rows.get(self.cursor).cloned();
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_after_rewind() {
        let mut source = VecSource::from_strs(vec![vec!["a", ""], vec!["b"]]);
        assert_eq!(
            source.next_raw_row().unwrap(),
            Some(vec![Some("a".to_string()), None])
        );
        assert_eq!(source.remaining(), 1);
        assert!(source.next_raw_row().unwrap().is_some());
        assert_eq!(source.next_raw_row().unwrap(), None);

        source.rewind().unwrap();
        assert_eq!(source.remaining(), 2);
        assert_eq!(
            source.next_raw_row().unwrap(),
            Some(vec![Some("a".to_string()), None])
        );
    }

    #[test]
    fn test_empty_row_is_still_a_row() {
        let mut source = VecSource::new(vec![vec![]]);
        assert_eq!(source.next_raw_row().unwrap(), Some(vec![]));
        assert_eq!(source.next_raw_row().unwrap(), None);
    }
}
