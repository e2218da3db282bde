use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::CsvRowsError;
use crate::key_normalizer::{HeaderNormalizer, KeyNormalizer, KeyNormalizerOptions};

// ---------------------------------------------------------------------------
// Options (caller-facing, deserializable)
// ---------------------------------------------------------------------------

/// Raw configuration options. Every field has a default, so a partial TOML
/// document (or `..Default::default()`) is enough.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOptions {
    /// Zero-based indexes of the rows used as headers. Data above the last
    /// header row is not yielded.
    pub header_rows: IndexList,
    /// Joins cells of multi-row headers, and names from their ordinals when uniquing.
    pub header_separator: String,
    /// Fill blank header cells from the left.
    pub expand_headers: ExpandHeaders,
    pub normalize_headers: NormalizeHeaders,
    /// Append ordinals to repeated header names.
    pub unique_headers: bool,
    /// Data row indexes to drop, counted from the first row after the headers.
    pub skip_rows: IndexList,
    /// Drop rows whose fields are all empty.
    pub skip_blanks: bool,
    /// Surface empty fields as `None` (otherwise as `""`).
    pub nil_empty: bool,

    // Passed through to the tokenizer
    pub col_sep: String,
    /// `"auto"` or a single terminator character.
    pub row_sep: String,
    pub quote_char: String,
    pub field_size_limit: Option<usize>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            header_rows: IndexList::default(),
            header_separator: ".".to_string(),
            expand_headers: ExpandHeaders::default(),
            normalize_headers: NormalizeHeaders::default(),
            unique_headers: false,
            skip_rows: IndexList::default(),
            skip_blanks: false,
            nil_empty: true,
            col_sep: ",".to_string(),
            row_sep: "auto".to_string(),
            quote_char: "\"".to_string(),
            field_size_limit: None,
        }
    }
}

/// A single index or a list of indexes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IndexList {
    One(usize),
    Many(Vec<usize>),
}

impl Default for IndexList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl IndexList {
    pub fn to_vec(&self) -> Vec<usize> {
        match self {
            Self::One(i) => vec![*i],
            Self::Many(v) => v.clone(),
        }
    }
}

impl From<usize> for IndexList {
    fn from(index: usize) -> Self {
        Self::One(index)
    }
}

impl From<Vec<usize>> for IndexList {
    fn from(indexes: Vec<usize>) -> Self {
        Self::Many(indexes)
    }
}

impl<const N: usize> From<[usize; N]> for IndexList {
    fn from(indexes: [usize; N]) -> Self {
        Self::Many(indexes.to_vec())
    }
}

/// Which header rows get left-fill expansion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpandHeaders {
    /// `true` expands every header row, `false` none.
    All(bool),
    /// Only the listed raw row indexes.
    Rows(IndexList),
}

impl Default for ExpandHeaders {
    fn default() -> Self {
        Self::All(false)
    }
}

impl From<bool> for ExpandHeaders {
    fn from(all: bool) -> Self {
        Self::All(all)
    }
}

impl From<usize> for ExpandHeaders {
    fn from(index: usize) -> Self {
        Self::Rows(IndexList::One(index))
    }
}

impl From<Vec<usize>> for ExpandHeaders {
    fn from(indexes: Vec<usize>) -> Self {
        Self::Rows(IndexList::Many(indexes))
    }
}

/// Header normalization setting.
#[derive(Clone, Default, Deserialize)]
#[serde(from = "NormalizeHeadersRepr")]
pub enum NormalizeHeaders {
    #[default]
    Disabled,
    /// [`KeyNormalizer`] with default options.
    Default,
    /// [`KeyNormalizer`] with a custom separator.
    Separator(String),
    Options(KeyNormalizerOptions),
    /// Caller-supplied normalizer. Not expressible in config files.
    Custom(Arc<dyn HeaderNormalizer>),
}

impl NormalizeHeaders {
    pub fn custom<N: HeaderNormalizer + 'static>(normalizer: N) -> Self {
        Self::Custom(Arc::new(normalizer))
    }

    fn resolve(self) -> Option<Arc<dyn HeaderNormalizer>> {
        match self {
            Self::Disabled => None,
            Self::Default => Some(Arc::new(KeyNormalizer::default())),
            Self::Separator(sep) => Some(Arc::new(KeyNormalizer::with_separator(sep))),
            Self::Options(options) => Some(Arc::new(KeyNormalizer::new(options))),
            Self::Custom(normalizer) => Some(normalizer),
        }
    }
}

impl fmt::Debug for NormalizeHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Disabled"),
            Self::Default => write!(f, "Default"),
            Self::Separator(sep) => f.debug_tuple("Separator").field(sep).finish(),
            Self::Options(options) => f.debug_tuple("Options").field(options).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl From<bool> for NormalizeHeaders {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Default
        } else {
            Self::Disabled
        }
    }
}

/// On-disk shapes: `true`/`false`, a separator string, or an options table.
#[derive(Deserialize)]
#[serde(untagged)]
enum NormalizeHeadersRepr {
    Flag(bool),
    Separator(String),
    Options(KeyNormalizerOptions),
}

impl From<NormalizeHeadersRepr> for NormalizeHeaders {
    fn from(repr: NormalizeHeadersRepr) -> Self {
        match repr {
            NormalizeHeadersRepr::Flag(enabled) => enabled.into(),
            NormalizeHeadersRepr::Separator(sep) => Self::Separator(sep),
            NormalizeHeadersRepr::Options(options) => Self::Options(options),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokenizer pass-through
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSep {
    /// Any of `\r`, `\n` or `\r\n`.
    Auto,
    Byte(u8),
}

/// Options forwarded to the tokenizer, already checked to be single bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub col_sep: u8,
    pub row_sep: RowSep,
    pub quote_char: u8,
    pub field_size_limit: Option<usize>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            col_sep: b',',
            row_sep: RowSep::Auto,
            quote_char: b'"',
            field_size_limit: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

/// Immutable configuration snapshot shared by headers, rows and the driver.
#[derive(Clone)]
pub struct Config {
    header_rows: Vec<usize>,
    header_separator: String,
    expand_headers: BTreeSet<usize>,
    normalizer: Option<Arc<dyn HeaderNormalizer>>,
    unique_headers: bool,
    skip_rows: HashSet<usize>,
    skip_blanks: bool,
    nil_empty: bool,
    csv: CsvOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            header_rows: Vec::new(),
            header_separator: ".".to_string(),
            expand_headers: BTreeSet::new(),
            normalizer: None,
            unique_headers: false,
            skip_rows: HashSet::new(),
            skip_blanks: false,
            nil_empty: true,
            csv: CsvOptions::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("header_rows", &self.header_rows)
            .field("header_separator", &self.header_separator)
            .field("expand_headers", &self.expand_headers)
            .field("normalize_headers", &self.normalizer.is_some())
            .field("unique_headers", &self.unique_headers)
            .field("skip_rows", &self.skip_rows)
            .field("skip_blanks", &self.skip_blanks)
            .field("nil_empty", &self.nil_empty)
            .field("csv", &self.csv)
            .finish()
    }
}

impl Config {
    pub fn new(options: ConfigOptions) -> Result<Self, CsvRowsError> {
        let csv = CsvOptions {
            col_sep: single_byte("col_sep", &options.col_sep)?,
            row_sep: parse_row_sep(&options.row_sep)?,
            quote_char: single_byte("quote_char", &options.quote_char)?,
            field_size_limit: options.field_size_limit,
        };
        if csv.field_size_limit == Some(0) {
            return Err(CsvRowsError::ConfigValidation(
                "field_size_limit must be greater than zero".into(),
            ));
        }
        if csv.col_sep == csv.quote_char {
            return Err(CsvRowsError::ConfigValidation(format!(
                "col_sep and quote_char must differ, both are '{}'",
                csv.col_sep as char
            )));
        }

        let mut header_rows = options.header_rows.to_vec();
        header_rows.sort_unstable();
        header_rows.dedup();

        let expand_headers: BTreeSet<usize> = match options.expand_headers {
            ExpandHeaders::All(true) => header_rows.iter().copied().collect(),
            ExpandHeaders::All(false) => BTreeSet::new(),
            ExpandHeaders::Rows(rows) => rows.to_vec().into_iter().collect(),
        };
        for index in &expand_headers {
            if !header_rows.contains(index) {
                log::warn!("expand_headers lists row {index}, which is not a header row");
            }
        }

        Ok(Self {
            header_rows,
            header_separator: options.header_separator,
            expand_headers,
            normalizer: options.normalize_headers.resolve(),
            unique_headers: options.unique_headers,
            skip_rows: options.skip_rows.to_vec().into_iter().collect(),
            skip_blanks: options.skip_blanks,
            nil_empty: options.nil_empty,
            csv,
        })
    }

    pub fn from_toml(input: &str) -> Result<Self, CsvRowsError> {
        let options: ConfigOptions =
            toml::from_str(input).map_err(|e| CsvRowsError::ConfigParse(e.to_string()))?;
        Self::new(options)
    }

    /// Header row indexes, ascending and distinct.
    pub fn header_rows(&self) -> &[usize] {
        &self.header_rows
    }

    pub fn header_separator(&self) -> &str {
        &self.header_separator
    }

    /// Raw row indexes of the header rows that get left-fill expansion.
    pub fn expand_headers(&self) -> &BTreeSet<usize> {
        &self.expand_headers
    }

    pub fn normalizer(&self) -> Option<&dyn HeaderNormalizer> {
        self.normalizer.as_deref()
    }

    pub fn unique_headers(&self) -> bool {
        self.unique_headers
    }

    pub fn skip_rows(&self) -> &HashSet<usize> {
        &self.skip_rows
    }

    pub fn skip_blanks(&self) -> bool {
        self.skip_blanks
    }

    pub fn nil_empty(&self) -> bool {
        self.nil_empty
    }

    pub fn csv_options(&self) -> CsvOptions {
        self.csv
    }

    /// Number of raw rows consumed before data starts.
    pub fn data_start(&self) -> usize {
        self.header_rows.last().map_or(0, |last| last + 1)
    }
}

fn single_byte(name: &str, value: &str) -> Result<u8, CsvRowsError> {
    match value.as_bytes() {
        [b] => Ok(*b),
        _ => Err(CsvRowsError::ConfigValidation(format!(
            "{name} must be a single byte, got {value:?}"
        ))),
    }
}

fn parse_row_sep(value: &str) -> Result<RowSep, CsvRowsError> {
    if value == "auto" {
        return Ok(RowSep::Auto);
    }
    single_byte("row_sep", value).map(RowSep::Byte)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_defaults() {
        let config = Config::new(ConfigOptions::default()).unwrap();
        assert!(!config.skip_blanks());
        assert!(config.nil_empty());
        assert_eq!(config.header_separator(), ".");
        assert!(config.header_rows().is_empty());
        assert_eq!(config.data_start(), 0);
        assert_eq!(config.csv_options(), CsvOptions::default());
    }

    #[test]
    fn test_default_config_matches_default_options() {
        let built = Config::new(ConfigOptions::default()).unwrap();
        let default = Config::default();
        assert_eq!(format!("{built:?}"), format!("{default:?}"));
    }

    #[test]
    fn test_sets_skipped_rows() {
        let config = Config::new(ConfigOptions {
            skip_rows: vec![1, 4].into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.skip_rows(), &HashSet::from([1, 4]));
    }

    #[test]
    fn test_header_rows_single_or_list() {
        let config = Config::new(ConfigOptions {
            header_rows: 3.into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.header_rows(), &[3]);

        let config = Config::new(ConfigOptions {
            header_rows: vec![4, 3, 4].into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.header_rows(), &[3, 4]);
        assert_eq!(config.data_start(), 5);
    }

    #[test]
    fn test_expand_headers_variants() {
        let none = Config::new(ConfigOptions {
            header_rows: vec![1, 2].into(),
            expand_headers: false.into(),
            ..Default::default()
        })
        .unwrap();
        assert!(none.expand_headers().is_empty());

        let all = Config::new(ConfigOptions {
            header_rows: vec![1, 2].into(),
            expand_headers: true.into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(all.expand_headers(), &BTreeSet::from([1, 2]));

        let partial = Config::new(ConfigOptions {
            header_rows: vec![1, 2].into(),
            expand_headers: 2.into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(partial.expand_headers(), &BTreeSet::from([2]));
    }

    #[test]
    fn test_normalize_headers_flag() {
        let config = Config::new(ConfigOptions {
            normalize_headers: true.into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.normalizer().unwrap().normalize("A b"), "a_b");
        assert!(Config::default().normalizer().is_none());
    }

    #[test]
    fn test_normalize_headers_custom() {
        let config = Config::new(ConfigOptions {
            normalize_headers: NormalizeHeaders::custom(|k: &str| format!("<{k}>")),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.normalizer().unwrap().normalize("x"), "<x>");
    }

    #[test]
    fn test_rejects_multi_byte_col_sep() {
        let err = Config::new(ConfigOptions {
            col_sep: "::".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, CsvRowsError::ConfigValidation(_)));
        assert!(err.to_string().contains("col_sep"));
    }

    #[test]
    fn test_rejects_zero_field_size_limit() {
        let err = Config::new(ConfigOptions {
            field_size_limit: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("field_size_limit"));
    }

    #[test]
    fn test_parse_toml_options() {
        let input = r#"
header_rows = [0, 1]
header_separator = "/"
expand_headers = [0]
unique_headers = true
skip_rows = 2
skip_blanks = true
nil_empty = false
col_sep = "\t"
row_sep = "\n"
field_size_limit = 1024

[normalize_headers]
separator = "$"
downcase = false
"#;
        let config = Config::from_toml(input).unwrap();
        assert_eq!(config.header_rows(), &[0, 1]);
        assert_eq!(config.header_separator(), "/");
        assert_eq!(config.expand_headers(), &BTreeSet::from([0]));
        assert!(config.unique_headers());
        assert_eq!(config.skip_rows(), &HashSet::from([2]));
        assert!(config.skip_blanks());
        assert!(!config.nil_empty());
        assert_eq!(
            config.csv_options(),
            CsvOptions {
                col_sep: b'\t',
                row_sep: RowSep::Byte(b'\n'),
                quote_char: b'"',
                field_size_limit: Some(1024),
            }
        );
        assert_eq!(config.normalizer().unwrap().normalize("Big Name"), "Big$Name");
    }

    #[test]
    fn test_parse_toml_normalize_separator_string() {
        let config = Config::from_toml(r#"normalize_headers = "%""#).unwrap();
        assert_eq!(config.normalizer().unwrap().normalize("a b"), "a%b");
    }

    #[test]
    fn test_parse_toml_rejects_unrecognized_normalizer() {
        let err = Config::from_toml("normalize_headers = 5").unwrap_err();
        assert!(matches!(err, CsvRowsError::ConfigParse(_)));
    }

    #[test]
    fn test_parse_toml_rejects_unknown_option() {
        let err = Config::from_toml("header_row = 0").unwrap_err();
        assert!(matches!(err, CsvRowsError::ConfigParse(_)));
    }
}
