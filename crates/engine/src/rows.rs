//! Rows driver
//!
//! Pulls raw rows from a [`RawSource`], peels off the header rows on first
//! use, then yields the remaining rows as [`Row`]s after applying the skip
//! policies. Every new pass over the rows rewinds the source and resolves the
//! header again.
//!
//! State machine:
//! - `Fresh`: nothing read in the current generation
//! - `Active`: header resolved, data rows streaming
//! - `Exhausted`: the source returned end of stream
//!
//! Starting a pass after an earlier one was started rewinds the source, drops
//! the memoized header and bumps the generation.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::header::{Header, HeaderNames, ParsedHeader};
use crate::row::Row;
use crate::source::{RawRow, RawSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsState {
    Fresh,
    Active,
    Exhausted,
}

/// Parsed rows of a CSV source.
///
/// Not meant to be shared across threads: iteration holds `&mut self`, which
/// serializes header resolution and the source cursor.
pub struct Rows<S> {
    source: S,
    config: Arc<Config>,
    parsed: Option<ParsedHeader>,
    state: RowsState,
    started: bool,
    generation: u64,
}

impl<S: RawSource> Rows<S> {
    pub fn new(source: S, config: impl Into<Arc<Config>>) -> Self {
        Self {
            source,
            config: config.into(),
            parsed: None,
            state: RowsState::Fresh,
            started: false,
            generation: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> RowsState {
        self.state
    }

    /// Bumped every time a pass restarts from a rewound source.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolved header names. On first call this reads the header rows off
    /// the source; a pass started afterwards reuses them.
    pub fn header(&mut self) -> Result<HeaderNames> {
        let parsed = self.parsed()?;
        Ok(Arc::clone(parsed.header.names()))
    }

    /// The memoized header parse: header, data start index, consumed rows.
    pub fn parsed(&mut self) -> Result<&ParsedHeader> {
        let parsed = match self.parsed.take() {
            Some(parsed) => parsed,
            None => {
                let parsed = Header::parse(&mut self.source, Arc::clone(&self.config))?;
                log::debug!(
                    "parsed header (generation {}), data starts at row {}",
                    self.generation,
                    parsed.index
                );
                self.state = RowsState::Active;
                parsed
            }
        };
        Ok(self.parsed.insert(parsed))
    }

    /// Lazy iterator over the data rows. Nothing is read until the first
    /// `next()`.
    pub fn iter(&mut self) -> RowIter<'_, S> {
        RowIter {
            rows: self,
            header: None,
            generation: None,
            index: 0,
            done: false,
        }
    }

    /// Collect one full pass.
    pub fn to_vec(&mut self) -> Result<Vec<Row>> {
        self.iter().collect()
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Start a pass: rewind if an earlier pass was started, then resolve the header.
    fn begin_pass(&mut self) -> Result<HeaderNames> {
        if self.started {
            self.source.rewind()?;
            self.parsed = None;
            self.generation += 1;
            self.state = RowsState::Fresh;
            log::debug!("rewound source for generation {}", self.generation);
        } else {
            self.started = true;
        }
        let names = self.header()?;
        self.state = RowsState::Active;
        Ok(names)
    }

    /// `index` counts data rows from the first row after the header.
    fn should_skip(&self, fields: &RawRow, index: usize) -> bool {
        if self.config.skip_rows().contains(&index) {
            return true;
        }
        self.config.skip_blanks() && is_blank(fields)
    }
}

impl<S> std::fmt::Debug for Rows<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

fn is_blank(fields: &RawRow) -> bool {
    fields
        .iter()
        .all(|f| f.as_deref().map_or(true, str::is_empty))
}

impl<'a, S: RawSource> IntoIterator for &'a mut Rows<S> {
    type Item = Result<Row>;
    type IntoIter = RowIter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Cursor over one pass of a [`Rows`].
pub struct RowIter<'a, S> {
    rows: &'a mut Rows<S>,
    header: Option<HeaderNames>,
    generation: Option<u64>,
    /// Next data row index, skipped rows included.
    index: usize,
    done: bool,
}

impl<S> RowIter<'_, S> {
    /// Generation this cursor is bound to, once it has started.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }
}

impl<S: RawSource> Iterator for RowIter<'_, S> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let header = match &self.header {
            Some(header) => Arc::clone(header),
            None => match self.rows.begin_pass() {
                Ok(header) => {
                    self.generation = Some(self.rows.generation);
                    self.header = Some(Arc::clone(&header));
                    header
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            },
        };

        loop {
            let fields = match self.rows.source.next_raw_row() {
                Ok(Some(fields)) => fields,
                Ok(None) => {
                    self.rows.state = RowsState::Exhausted;
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let index = self.index;
            self.index += 1;
            if self.rows.should_skip(&fields, index) {
                log::trace!("skipping data row {index}");
                continue;
            }
            let nil_empty = self.rows.config.nil_empty();
            return Some(Ok(Row::new(header, fields, nil_empty)));
        }
    }
}
