//! A single data row. Fields are reachable by zero-based position or by
//! resolved header name.

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::header::HeaderNames;
use crate::source::RawRow;

/// Field lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    Index(usize),
    Name(&'a str),
    /// Never matches a field.
    Unset,
}

impl From<usize> for Key<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name)
    }
}

impl<'a, K: Into<Key<'a>>> From<Option<K>> for Key<'a> {
    fn from(key: Option<K>) -> Self {
        key.map_or(Self::Unset, Into::into)
    }
}

/// One data record paired with the shared resolved header.
///
/// Name lookups go through the header's position table, so the last column
/// wins when names repeat.
#[derive(Debug, Clone)]
pub struct Row {
    header: HeaderNames,
    /// Raw values, padded with `None` up to the header width.
    fields: RawRow,
    nil_empty: bool,
}

impl Row {
    pub fn new(header: HeaderNames, mut fields: RawRow, nil_empty: bool) -> Self {
        if fields.len() < header.len() {
            fields.resize(header.len(), None);
        }
        Self {
            header,
            fields,
            nil_empty,
        }
    }

    /// Number of columns: the wider of header and fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a field by position or header name. Unknown names, positions past
    /// the end and [`Key::Unset`] all give `None`.
    pub fn get<'k>(&self, key: impl Into<Key<'k>>) -> Option<&str> {
        let pos = match key.into() {
            Key::Index(pos) => pos,
            Key::Name(name) => self.header.position(name)?,
            Key::Unset => return None,
        };
        let raw = self.fields.get(pos)?;
        self.present(raw.as_deref())
    }

    /// [`Row::get`], falling back to `default`.
    pub fn fetch<'a, 'k>(&'a self, key: impl Into<Key<'k>>, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// [`Row::get`], falling back to `fallback(key)`.
    pub fn fetch_with<'k, F>(&self, key: impl Into<Key<'k>>, fallback: F) -> Cow<'_, str>
    where
        F: FnOnce(Key<'k>) -> String,
    {
        let key = key.into();
        match self.get(key) {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Owned(fallback(key)),
        }
    }

    /// Header name of a column. Columns past the header are unnamed.
    pub fn header_name(&self, pos: usize) -> Option<&str> {
        self.header.get(pos).and_then(|name| name.as_deref())
    }

    /// Header squared to the row width.
    pub fn header(&self) -> Vec<Option<&str>> {
        (0..self.len()).map(|pos| self.header_name(pos)).collect()
    }

    /// All values, with the empty/nil policy applied.
    pub fn fields(&self) -> Vec<Option<&str>> {
        self.fields.iter().map(|f| self.present(f.as_deref())).collect()
    }

    /// `(header name, value)` for every column, unnamed ones included.
    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, Option<&str>)> + '_ {
        self.fields
            .iter()
            .enumerate()
            .map(|(pos, f)| (self.header_name(pos), self.present(f.as_deref())))
    }

    /// Named columns only, in header order. A repeated name keeps its first
    /// position and its last value.
    pub fn as_map(&self) -> IndexMap<&str, Option<&str>> {
        let mut map = IndexMap::with_capacity(self.header.named_len());
        for (name, value) in self.iter() {
            if let Some(name) = name {
                map.insert(name, value);
            }
        }
        map
    }

    fn present<'a>(&self, value: Option<&'a str>) -> Option<&'a str> {
        match value {
            Some("") if self.nil_empty => None,
            None if !self.nil_empty => Some(""),
            other => other,
        }
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (Option<&'a str>, Option<&'a str>);
    type IntoIter = Box<dyn Iterator<Item = Self::Item> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Serializes as an object of the named columns.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map = self.as_map();
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (name, value) in map {
            out.serialize_entry(name, &value)?;
        }
        out.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderColumns;
    use std::sync::Arc;

    fn header(names: &[&str]) -> HeaderNames {
        columns(names.iter().map(|n| Some(n.to_string())).collect())
    }

    fn columns(names: Vec<Option<String>>) -> HeaderNames {
        Arc::new(HeaderColumns::new(names))
    }

    fn fields(values: &[&str]) -> RawRow {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    fn row(names: &[&str], values: &[&str]) -> Row {
        Row::new(header(names), fields(values), true)
    }

    #[test]
    fn test_gets_field_by_header() {
        let r = row(&["foo", "bar"], &["my_value", "other_val"]);
        assert_eq!(r.get("bar"), Some("other_val"));
        assert_eq!(r.get(&"foo".to_string()), Some("my_value"));
    }

    #[test]
    fn test_gets_field_by_index() {
        let r = row(&["foo", "bar"], &["my_value", "other_val"]);
        assert_eq!(r.get(1), Some("other_val"));
        assert_eq!(r.get(2), None);
    }

    #[test]
    fn test_unset_and_unknown_keys_are_absent() {
        let r = row(&["foo"], &["v"]);
        assert_eq!(r.get(None::<&str>), None);
        assert_eq!(r.get(Key::Unset), None);
        assert_eq!(r.get("nope"), None);
        assert_eq!(r.get(Some("foo")), Some("v"));
    }

    #[test]
    fn test_squares_header_with_fields() {
        let r = row(&["foo", "bar"], &["my_value", "other_val", "third_val"]);
        assert_eq!(r.header(), vec![Some("foo"), Some("bar"), None]);
        assert_eq!(r.get(2), Some("third_val"));
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn test_squares_fields_with_header() {
        let r = row(&["foo", "bar", "baz"], &["my_value"]);
        assert_eq!(r.fields(), vec![Some("my_value"), None, None]);

        let r = Row::new(header(&["foo", "bar"]), fields(&["v1"]), false);
        assert_eq!(r.fields(), vec![Some("v1"), Some("")]);
    }

    #[test]
    fn test_overflow_field_reachable_by_index() {
        let r = row(&["foo"], &["v1", "v2"]);
        assert_eq!(r.get(1), Some("v2"));
        assert_eq!(r.header_name(1), None);
    }

    #[test]
    fn test_gets_a_map_of_named_columns() {
        let r = row(&["foo", "bar"], &["my_value", "other_val", "third_val"]);
        let map = r.as_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["foo"], Some("my_value"));
        assert_eq!(map["bar"], Some("other_val"));
    }

    #[test]
    fn test_duplicate_names_last_value_wins() {
        let r = row(&["a", "b", "a"], &["1", "2", "3"]);
        assert_eq!(r.get("a"), Some("3"));
        assert_eq!(r.get(0), Some("1"));
        let map = r.as_map();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map["a"], Some("3"));
    }

    #[test]
    fn test_fetch_with_default_value() {
        let r = row(&["foo", "bar"], &["my_value", "other_val"]);
        assert_eq!(r.fetch("baz", "nuts"), "nuts");
        assert_eq!(r.fetch("foo", "nuts"), "my_value");
    }

    #[test]
    fn test_fetch_with_fallback() {
        let r = row(&["foo", "bar"], &["my_value", "other_val"]);
        let value = r.fetch_with("baz", |key| match key {
            Key::Name(name) => name.to_string(),
            _ => String::new(),
        });
        assert_eq!(value, "baz");
        assert_eq!(r.fetch_with(0, |_| "x".into()), "my_value");
    }

    #[test]
    fn test_iterates_over_pairs_including_unnamed() {
        let names = columns(vec![Some("foo".to_string()), None]);
        let r = Row::new(names, fields(&["my_value", "other_val", "extra"]), true);
        let pairs: Vec<_> = r.iter().collect();
        assert_eq!(
            pairs,
            vec![
                (Some("foo"), Some("my_value")),
                (None, Some("other_val")),
                (None, Some("extra")),
            ]
        );
        // Restartable: a second pass sees the same pairs
        assert_eq!((&r).into_iter().count(), 3);
        assert_eq!(r.iter().collect::<Vec<_>>(), pairs);
    }

    #[test]
    fn test_mapping_pairs_like_an_enumerable() {
        let r = row(&["foo", "bar"], &["my_value", "other_val"]);
        let joined: Vec<String> = r
            .iter()
            .map(|(k, v)| format!("{}:{}", k.unwrap_or(""), v.unwrap_or("")))
            .collect();
        assert_eq!(joined, vec!["foo:my_value", "bar:other_val"]);
    }

    #[test]
    fn test_nilifies_empty_strings() {
        let r = Row::new(header(&["foo"]), vec![Some(String::new())], true);
        assert_eq!(r.fields(), vec![None]);
        assert_eq!(r.get("foo"), None);
        assert_eq!(r.fetch("foo", "dflt"), "dflt");
    }

    #[test]
    fn test_stringifies_nils() {
        let r = Row::new(header(&["foo", "bar"]), vec![Some("x".into()), None], false);
        assert_eq!(r.fields(), vec![Some("x"), Some("")]);
        assert_eq!(r.get("bar"), Some(""));
        assert_eq!(r.get(5), None);
    }

    #[test]
    fn test_policy_applied_on_every_read() {
        let r = Row::new(header(&["a"]), vec![Some(String::new())], true);
        assert_eq!(r.get(0), None);
        assert_eq!(r.get(0), None);
        assert_eq!(r.iter().next(), Some((Some("a"), None)));
    }

    #[test]
    fn test_shares_header() {
        let names = header(&["a"]);
        let r1 = Row::new(Arc::clone(&names), fields(&["1"]), true);
        let r2 = Row::new(Arc::clone(&names), fields(&["2"]), true);
        assert_eq!(Arc::strong_count(&names), 3);
        assert_eq!(r1.get("a"), Some("1"));
        assert_eq!(r2.get("a"), Some("2"));
    }

    #[test]
    fn test_serializes_named_columns() {
        let names = columns(vec![Some("b".to_string()), None, Some("a".to_string())]);
        let r = Row::new(names, vec![Some("1".into()), Some("x".into()), None], true);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"b":"1","a":null}"#);
    }
}
