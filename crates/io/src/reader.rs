//! Top-level reader: wires a config and a byte stream to the row engine.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use csvrows_engine::error::{CsvRowsError, Result};
use csvrows_engine::{Config, ConfigOptions, HeaderNames, Row, RowIter, Rows};

use crate::csv::CsvSource;

/// Parsed CSV document.
pub struct CsvReader<R> {
    rows: Rows<CsvSource<R>>,
}

impl<R: Read + Seek> CsvReader<R> {
    pub fn new(rdr: R, config: Config) -> Self {
        let source = CsvSource::new(rdr, config.csv_options());
        Self {
            rows: Rows::new(source, config),
        }
    }

    /// Build the config in place, starting from the defaults.
    ///
    /// ```ignore
    /// let mut reader = CsvReader::configure(file, |o| o.header_rows = 0.into())?;
    /// ```
    pub fn configure<F>(rdr: R, configure: F) -> Result<Self>
    where
        F: FnOnce(&mut ConfigOptions),
    {
        let mut options = ConfigOptions::default();
        configure(&mut options);
        Ok(Self::new(rdr, Config::new(options)?))
    }

    pub fn config(&self) -> &Config {
        self.rows.config()
    }

    /// Lazy iterator over the data rows. Each call starts a fresh pass.
    pub fn iter(&mut self) -> RowIter<'_, CsvSource<R>> {
        self.rows.iter()
    }

    pub fn to_vec(&mut self) -> Result<Vec<Row>> {
        self.rows.to_vec()
    }

    pub fn header(&mut self) -> Result<HeaderNames> {
        self.rows.header()
    }

    /// The underlying row driver.
    pub fn rows(&mut self) -> &mut Rows<CsvSource<R>> {
        &mut self.rows
    }
}

impl CsvReader<Cursor<Vec<u8>>> {
    pub fn from_string(content: impl Into<String>, config: Config) -> Self {
        Self::new(Cursor::new(content.into().into_bytes()), config)
    }
}

impl CsvReader<File> {
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| CsvRowsError::Io(format!("{}: {e}", path.display())))?;
        log::debug!("opened {}", path.display());
        Ok(Self::new(file, config))
    }
}

impl<'a, R: Read + Seek> IntoIterator for &'a mut CsvReader<R> {
    type Item = Result<Row>;
    type IntoIter = RowIter<'a, CsvSource<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
