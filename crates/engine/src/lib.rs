//! `csvrows-engine`: row/header model over a raw CSV token stream.
//!
//! Pure engine crate: pulls pre-tokenized rows from a [`RawSource`], resolves
//! (possibly multi-row) headers and yields [`Row`]s. No tokenizer or file IO.

pub mod config;
pub mod error;
pub mod header;
pub mod key_normalizer;
pub mod row;
pub mod rows;
pub mod source;

pub use config::{Config, ConfigOptions, ExpandHeaders, IndexList, NormalizeHeaders};
pub use error::CsvRowsError;
pub use header::{Header, HeaderColumns, HeaderNames, ParsedHeader};
pub use key_normalizer::{HeaderNormalizer, KeyNormalizer, KeyNormalizerOptions};
pub use row::{Key, Row};
pub use rows::{RowIter, Rows, RowsState};
pub use source::{RawRow, RawSource, VecSource};
