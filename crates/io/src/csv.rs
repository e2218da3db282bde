// CSV tokenizer adapter: feeds `csv` crate records to the row engine

use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};

use csvrows_engine::config::{CsvOptions, RowSep};
use csvrows_engine::error::{CsvRowsError, Result};
use csvrows_engine::{RawRow, RawSource};

/// Raw row source over any seekable reader.
///
/// Yields one raw row per physical line. Empty fields come out as `None`; the
/// `csv` crate does not tell quoted empty fields apart from bare ones. Empty
/// lines, which `csv` skips, are rebuilt from byte positions and come out as
/// rows with no fields.
pub struct CsvSource<R> {
    reader: csv::Reader<Tracked<R>>,
    record: csv::StringRecord,
    row_sep: RowSep,
    field_size_limit: Option<usize>,
    /// Rows already tokenized but not yet handed out.
    pending: VecDeque<Result<RawRow>>,
    done: bool,
}

impl<R: Read> CsvSource<R> {
    pub fn new(rdr: R, options: CsvOptions) -> Self {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(options.col_sep)
            .quote(options.quote_char);
        match options.row_sep {
            RowSep::Auto => builder.terminator(csv::Terminator::CRLF),
            RowSep::Byte(b) => builder.terminator(csv::Terminator::Any(b)),
        };

        Self {
            reader: builder.from_reader(Tracked::new(rdr)),
            record: csv::StringRecord::new(),
            row_sep: options.row_sep,
            field_size_limit: options.field_size_limit,
            pending: VecDeque::new(),
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner().inner
    }

    /// Read the next record and queue it behind the empty lines before it.
    fn fill(&mut self) -> Result<()> {
        let start = self.reader.position().byte();
        let more = self
            .reader
            .read_record(&mut self.record)
            .map_err(|e| CsvRowsError::Source(e.to_string()))?;
        let end = self.reader.position().byte();

        let tracked = self.reader.get_ref();
        let blanks = blank_lines(tracked.bytes(start, end), tracked.byte_before(start), self.row_sep);
        if blanks > 0 {
            log::trace!("restoring {blanks} empty lines before byte {end}");
        }
        self.pending.extend((0..blanks).map(|_| Ok(Vec::new())));

        if more {
            let row = self.convert();
            self.pending.push_back(row);
        } else {
            self.done = true;
        }
        self.reader.get_mut().release(end);
        Ok(())
    }

    fn convert(&self) -> Result<RawRow> {
        let line = self.reader.position().line();
        log::trace!("read {} fields ending on line {line}", self.record.len());

        let mut row = Vec::with_capacity(self.record.len());
        for field in self.record.iter() {
            if let Some(limit) = self.field_size_limit {
                if field.len() > limit {
                    return Err(CsvRowsError::Source(format!(
                        "line {line}: field of {} bytes exceeds field_size_limit {limit}",
                        field.len()
                    )));
                }
            }
            row.push(if field.is_empty() {
                None
            } else {
                Some(field.to_string())
            });
        }
        Ok(row)
    }
}

impl<R: Read + Seek> RawSource for CsvSource<R> {
    fn next_raw_row(&mut self) -> Result<Option<RawRow>> {
        while self.pending.is_empty() && !self.done {
            self.fill()?;
        }
        self.pending.pop_front().transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        log::debug!("rewinding CSV reader");
        self.pending.clear();
        self.done = false;
        self.reader
            .seek(csv::Position::new())
            .map_err(|e| CsvRowsError::Source(e.to_string()))
    }
}

/// Number of empty lines at the start of `gap`, the bytes the parser consumed
/// for one read. `prev` is the byte before `gap`.
///
/// A record ended by `\r\n` is handed out after the `\r`, so a `\n` right
/// after a `\r` finishes that terminator rather than opening an empty line.
fn blank_lines(gap: &[u8], prev: Option<u8>, row_sep: RowSep) -> usize {
    match row_sep {
        RowSep::Byte(term) => gap.iter().take_while(|&&b| b == term).count(),
        RowSep::Auto => {
            let mut prev = prev;
            let mut count = 0;
            for &b in gap.iter().take_while(|&&b| b == b'\r' || b == b'\n') {
                if !(b == b'\n' && prev == Some(b'\r')) {
                    count += 1;
                }
                prev = Some(b);
            }
            count
        }
    }
}

/// Reader that keeps the bytes handed to the parser until they are released,
/// indexed by absolute offset.
struct Tracked<R> {
    inner: R,
    window: Vec<u8>,
    /// Offset of `window[0]`.
    base: u64,
}

impl<R> Tracked<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            window: Vec::new(),
            base: 0,
        }
    }

    fn bytes(&self, start: u64, end: u64) -> &[u8] {
        let hi = (end.saturating_sub(self.base) as usize).min(self.window.len());
        let lo = (start.saturating_sub(self.base) as usize).min(hi);
        &self.window[lo..hi]
    }

    fn byte_before(&self, pos: u64) -> Option<u8> {
        let prev = pos.checked_sub(1)?.checked_sub(self.base)?;
        self.window.get(prev as usize).copied()
    }

    /// Drop everything before `pos - 1`; the byte before `pos` is still needed
    /// to read the next gap.
    fn release(&mut self, pos: u64) {
        let keep = pos.saturating_sub(1);
        if keep > self.base {
            let n = ((keep - self.base) as usize).min(self.window.len());
            self.window.drain(..n);
            self.base += n as u64;
        }
    }
}

impl<R: Read> Read for Tracked<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.window.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl<R: Seek> Seek for Tracked<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let offset = self.inner.seek(pos)?;
        self.window.clear();
        self.base = offset;
        Ok(offset)
    }
}
