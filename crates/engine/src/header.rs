//! Header resolution
//!
//! One or more raw header rows are folded into a single sequence of column
//! names. The pipeline runs in a fixed order:
//!
//! 1. blank cells become `None`, then every row is squared to the widest one
//! 2. optional normalization of every named cell
//! 3. optional left-fill expansion of selected rows
//! 4. combination of all rows, column by column, joined by the separator
//! 5. optional uniquing of repeated names
//!
//! The result is computed on first use and memoized.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::config::Config;
use crate::error::Result;
use crate::source::{RawRow, RawSource};

/// Resolved column names, shared between the header and every row built from it.
pub type HeaderNames = Arc<HeaderColumns>;

/// Column names plus the name -> position table used for lookups.
///
/// Derefs to the name slice. When a name repeats, the table points at the
/// last column carrying it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderColumns {
    names: Vec<Option<String>>,
    positions: HashMap<String, usize>,
}

impl HeaderColumns {
    pub fn new(names: Vec<Option<String>>) -> Self {
        let positions = names
            .iter()
            .enumerate()
            .filter_map(|(pos, name)| name.clone().map(|name| (name, pos)))
            .collect();
        Self { names, positions }
    }

    /// Position of the last column named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Number of distinct names.
    pub fn named_len(&self) -> usize {
        self.positions.len()
    }
}

impl From<Vec<Option<String>>> for HeaderColumns {
    fn from(names: Vec<Option<String>>) -> Self {
        Self::new(names)
    }
}

impl Deref for HeaderColumns {
    type Target = [Option<String>];

    fn deref(&self) -> &Self::Target {
        &self.names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    Unresolved,
    Resolved,
}

/// A raw header row tagged with its zero-based position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRow {
    pub index: usize,
    pub cells: RawRow,
}

/// A parsed CSV header.
#[derive(Debug)]
pub struct Header {
    rows: Vec<HeaderRow>,
    config: Arc<Config>,
    resolved: OnceCell<HeaderNames>,
}

/// Outcome of reading the header rows off a source.
#[derive(Debug)]
pub struct ParsedHeader {
    pub header: Header,
    /// Raw index of the first data row.
    pub index: usize,
    /// Every row consumed before data starts, header rows included.
    pub rows: Vec<RawRow>,
}

impl Header {
    /// Header over `rows`, tagged with the configured header row indexes in
    /// order. Rows beyond the configured list are tagged by position.
    pub fn new(rows: Vec<RawRow>, config: Arc<Config>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(pos, cells)| HeaderRow {
                index: config.header_rows().get(pos).copied().unwrap_or(pos),
                cells,
            })
            .collect();
        Self::from_rows(rows, config)
    }

    pub fn from_rows(rows: Vec<HeaderRow>, config: Arc<Config>) -> Self {
        Self {
            rows,
            config,
            resolved: OnceCell::new(),
        }
    }

    /// Read the configured header rows off `source`.
    ///
    /// Consumes exactly `max(header_rows) + 1` rows (none when there is no
    /// header), leaving the source positioned at the first data row.
    pub fn parse<S: RawSource + ?Sized>(source: &mut S, config: Arc<Config>) -> Result<ParsedHeader> {
        let index = config.data_start();
        let mut rows = Vec::with_capacity(index);
        while rows.len() < index {
            match source.next_raw_row()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        if rows.len() < index {
            log::debug!(
                "source ended after {} of {} header rows; missing rows treated as empty",
                rows.len(),
                index
            );
        }

        let header_rows = config
            .header_rows()
            .iter()
            .map(|&i| HeaderRow {
                index: i,
                cells: rows.get(i).cloned().unwrap_or_default(),
            })
            .collect();

        Ok(ParsedHeader {
            header: Self::from_rows(header_rows, config),
            index,
            rows,
        })
    }

    pub fn state(&self) -> HeaderState {
        if self.resolved.get().is_some() {
            HeaderState::Resolved
        } else {
            HeaderState::Unresolved
        }
    }

    pub fn raw_rows(&self) -> &[HeaderRow] {
        &self.rows
    }

    /// The resolved names. Resolves on first call.
    pub fn names(&self) -> &HeaderNames {
        self.resolved.get_or_init(|| {
            let names = resolve(&self.rows, &self.config);
            log::debug!(
                "resolved {} header columns from {} header rows",
                names.len(),
                self.rows.len()
            );
            Arc::new(HeaderColumns::new(names))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.names().iter().map(|name| name.as_deref())
    }

    pub fn to_vec(&self) -> Vec<Option<String>> {
        self.names().to_vec()
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run the full pipeline over raw header rows.
pub fn resolve(rows: &[HeaderRow], config: &Config) -> Vec<Option<String>> {
    if rows.is_empty() {
        return Vec::new();
    }

    let mut grid = square(rows);
    if let Some(normalizer) = config.normalizer() {
        for cell in grid.iter_mut().flatten() {
            *cell = cell.as_deref().map(|key| normalizer.normalize(key));
        }
    }
    for (row, cells) in rows.iter().zip(grid.iter_mut()) {
        if config.expand_headers().contains(&row.index) {
            expand(cells);
        }
    }

    let combined = combine(&grid, config.header_separator());
    if config.unique_headers() {
        unique(combined, config.header_separator())
    } else {
        combined
    }
}

/// Copy the rows with blank cells as `None`, padded to the widest row.
fn square(rows: &[HeaderRow]) -> Vec<RawRow> {
    let width = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
    rows.iter()
        .map(|row| {
            let mut cells: RawRow = row
                .cells
                .iter()
                .map(|cell| cell.clone().filter(|c| !c.is_empty()))
                .collect();
            cells.resize(width, None);
            cells
        })
        .collect()
}

/// Fill `None` cells with the nearest name to their left.
fn expand(cells: &mut [Option<String>]) {
    let mut last: Option<String> = None;
    for cell in cells.iter_mut() {
        match cell {
            Some(key) => last = Some(key.clone()),
            None => *cell = last.clone(),
        }
    }
}

/// Join each column's named cells top to bottom.
pub fn combine(grid: &[RawRow], separator: &str) -> Vec<Option<String>> {
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .map(|col| {
            let parts: Vec<&str> = grid
                .iter()
                .filter_map(|row| row.get(col).and_then(|c| c.as_deref()))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(separator))
            }
        })
        .collect()
}

/// Suffix ordinals onto every name shared by more than one column.
///
/// Unnamed columns form a group too and become `"0"`, `"1"`, ... Renamed
/// columns are not re-checked against existing names.
pub fn unique(mut combined: Vec<Option<String>>, separator: &str) -> Vec<Option<String>> {
    let mut groups: HashMap<Option<String>, Vec<usize>> = HashMap::new();
    for (pos, key) in combined.iter().enumerate() {
        groups.entry(key.clone()).or_default().push(pos);
    }

    for (key, positions) in groups {
        if positions.len() == 1 {
            continue;
        }
        for (ordinal, pos) in positions.into_iter().enumerate() {
            combined[pos] = Some(match &key {
                Some(name) => format!("{name}{separator}{ordinal}"),
                None => ordinal.to_string(),
            });
        }
    }
    combined
}
