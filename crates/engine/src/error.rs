use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvRowsError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (multi-byte separator, zero field size limit, etc.).
    ConfigValidation(String),
    /// The raw row source failed to read or rewind.
    Source(String),
    /// IO error (file open, etc.).
    Io(String),
}

impl fmt::Display for CsvRowsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Source(msg) => write!(f, "source error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for CsvRowsError {}

pub type Result<T> = std::result::Result<T, CsvRowsError>;
