//! Header key normalization
//!
//! Turns free-form header text ("Has spaces", "IM YELLING!!!") into a canonical
//! identifier ("has_spaces", "im_yelling").

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("static pattern"));

/// Options accepted by [`KeyNormalizer`], deserializable from config files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyNormalizerOptions {
    /// Replaces every run of non-alphanumeric characters. May be empty.
    pub separator: String,
    /// Lower-case the result.
    pub downcase: bool,
}

impl Default for KeyNormalizerOptions {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            downcase: true,
        }
    }
}

/// Normalizes strings into a consistent key format.
#[derive(Debug, Clone)]
pub struct KeyNormalizer {
    separator: String,
    downcase: bool,
}

impl Default for KeyNormalizer {
    fn default() -> Self {
        Self::new(KeyNormalizerOptions::default())
    }
}

impl From<KeyNormalizerOptions> for KeyNormalizer {
    fn from(options: KeyNormalizerOptions) -> Self {
        Self::new(options)
    }
}

impl KeyNormalizer {
    pub fn new(options: KeyNormalizerOptions) -> Self {
        Self {
            separator: options.separator,
            downcase: options.downcase,
        }
    }

    /// Normalizer using `separator` and the default case folding.
    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self::new(KeyNormalizerOptions {
            separator: separator.into(),
            ..KeyNormalizerOptions::default()
        })
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn downcase(&self) -> bool {
        self.downcase
    }

    /// Normalize an optional key. `None` stays `None`.
    pub fn normalize(&self, key: Option<&str>) -> Option<String> {
        key.map(|k| self.normalize_str(k))
    }

    /// Normalize a present key.
    ///
    /// Non-alphanumeric runs become the separator, repeated separators collapse
    /// into one, a single leading and a single trailing separator are stripped,
    /// and the result is lower-cased unless `downcase` is off.
    pub fn normalize_str(&self, key: &str) -> String {
        let sep = self.separator.as_str();
        let replaced = NON_ALPHANUMERIC.replace_all(key, regex::NoExpand(sep));

        // Once runs are collapsed at most one separator is left at either end,
        // so dropping every empty piece both collapses and trims.
        let key = if sep.is_empty() {
            replaced.into_owned()
        } else {
            replaced
                .split(sep)
                .filter(|piece| !piece.is_empty())
                .collect::<Vec<_>>()
                .join(sep)
        };

        if self.downcase {
            key.to_lowercase()
        } else {
            key
        }
    }
}

/// Anything that can rewrite a header cell. Implemented for [`KeyNormalizer`]
/// and for plain closures.
pub trait HeaderNormalizer: Send + Sync {
    fn normalize(&self, key: &str) -> String;
}

impl HeaderNormalizer for KeyNormalizer {
    fn normalize(&self, key: &str) -> String {
        self.normalize_str(key)
    }
}

impl<F> HeaderNormalizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn normalize(&self, key: &str) -> String {
        self(key)
    }
}
