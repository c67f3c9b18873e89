// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Flat attribute maps describing one media file
//!
//! Keys are stored lowercase and looked up case-insensitively. Every record
//! carries the universal keys produced by [`universal_attributes`]:
//! `filename`, `filename_with_extension`, `extension`, `size`,
//! `creation_date`, `creation_year`, `creation_month`, `creation_month_name`
//! and `file_type`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::category::Category;

/// Sentinel stored for attributes an extractor could not determine
pub const UNKNOWN: &str = "Unknown";

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Text(String),
}

impl AttributeValue {
    /// True for blank text or the `Unknown` sentinel
    pub fn is_unknown(&self) -> bool {
        match self {
            AttributeValue::Text(s) => {
                let trimmed = s.trim();
                trimmed.is_empty() || trimmed == UNKNOWN
            }
            AttributeValue::Integer(_) => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Integer(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Integer(i64::from(value))
    }
}

/// Attribute map with lowercase keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
    values: BTreeMap<String, AttributeValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value
    pub fn set(&mut self, key: &str, value: impl Into<AttributeValue>) {
        self.values.insert(key.to_lowercase(), value.into());
    }

    /// Insert a text value unless it is blank
    pub fn set_text(&mut self, key: &str, value: &str) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.set(key, trimmed);
        }
    }

    /// Insert a value only if the key is missing or still unknown
    pub fn fill(&mut self, key: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        if value.is_unknown() {
            return;
        }
        if self.get(key).map_or(true, AttributeValue::is_unknown) {
            self.set(key, value);
        }
    }

    /// Set every listed key to the unknown sentinel if it is absent
    pub fn default_unknown(&mut self, keys: &[&str]) {
        for key in keys {
            self.values
                .entry(key.to_lowercase())
                .or_insert_with(|| AttributeValue::Text(UNKNOWN.to_string()));
        }
    }

    /// Case-insensitive lookup
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(&key.to_lowercase())
    }

    /// Lookup rendered as text; unknown keys read as the sentinel
    pub fn text(&self, key: &str) -> String {
        self.get(key)
            .map(ToString::to_string)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_lowercase())
    }

    /// Merge `other` over `self`, keeping existing known values
    pub fn merge_missing(&mut self, other: Attributes) {
        for (key, value) in other.values {
            self.fill(&key, value);
        }
    }

    /// Overwrite with every value from `other`
    pub fn extend(&mut self, other: Attributes) {
        self.values.extend(other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<AttributeValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (key, value) in iter {
            attributes.set(key.as_ref(), value);
        }
        attributes
    }
}

/// One scanned file with its classification and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub source_path: PathBuf,
    pub category: Category,
    pub attributes: Attributes,
}

/// Filename stem, falling back to the whole name
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

const STAT_KEYS: [&str; 5] = [
    "size",
    "creation_date",
    "creation_year",
    "creation_month",
    "creation_month_name",
];

/// Attributes derived from the file system alone.
///
/// Creation time is used where the platform reports it, otherwise the
/// modification time. Size and dates read `Unknown` when the stat fails.
pub fn universal_attributes(path: &Path, category: Category) -> Attributes {
    let mut attributes = Attributes::new();
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    attributes.set("filename", file_stem(path));
    attributes.set("filename_with_extension", name);
    attributes.set("extension", extension);
    attributes.set("file_type", category.as_str());

    match std::fs::metadata(path) {
        Ok(meta) => {
            attributes.set("size", meta.len() as i64);
            let stamp = meta.created().or_else(|_| meta.modified());
            if let Ok(stamp) = stamp {
                let date: DateTime<Local> = stamp.into();
                set_creation_date(&mut attributes, &date);
            }
        }
        Err(e) => tracing::debug!("Cannot stat {:?}: {}", path, e),
    }
    attributes.default_unknown(&STAT_KEYS);

    attributes
}

fn set_creation_date(attributes: &mut Attributes, date: &DateTime<Local>) {
    attributes.set("creation_date", date.format("%Y-%m-%d").to_string());
    attributes.set("creation_year", date.format("%Y").to_string());
    attributes.set("creation_month", date.format("%m").to_string());
    attributes.set("creation_month_name", date.format("%B").to_string());
}

/// Leading four digits of the first run of at least four digits
pub fn extract_year(value: &str) -> Option<String> {
    let mut run = 0usize;
    for (i, c) in value.char_indices() {
        if c.is_ascii_digit() {
            run += 1;
            if run == 4 {
                return Some(value[i + 1 - 4..=i].to_string());
            }
        } else {
            run = 0;
        }
    }
    None
}

/// Seconds rendered as `M:SS`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut attrs = Attributes::new();
        attrs.set("Artist", "Nina Simone");
        assert_eq!(attrs.text("ARTIST"), "Nina Simone");
        assert!(attrs.contains_key("artist"));
        assert_eq!(attrs.text("missing"), UNKNOWN);
    }

    #[test]
    fn test_fill_only_replaces_unknown() {
        let mut attrs = Attributes::new();
        attrs.default_unknown(&["genre", "title"]);
        attrs.set("title", "Kept");
        attrs.fill("title", "Replaced");
        attrs.fill("genre", "Jazz");
        attrs.fill("album", "  ");
        assert_eq!(attrs.text("title"), "Kept");
        assert_eq!(attrs.text("genre"), "Jazz");
        assert!(!attrs.contains_key("album"));
    }

    #[test]
    fn test_universal_attributes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Holiday.JPG");
        fs::write(&path, b"12345").unwrap();

        let attrs = universal_attributes(&path, Category::Image);
        assert_eq!(attrs.text("filename"), "Holiday");
        assert_eq!(attrs.text("filename_with_extension"), "Holiday.JPG");
        assert_eq!(attrs.text("extension"), "jpg");
        assert_eq!(attrs.get("size"), Some(&AttributeValue::Integer(5)));
        assert_eq!(attrs.text("file_type"), "image");
        assert_eq!(attrs.text("creation_year").len(), 4);
        assert_eq!(attrs.text("creation_month").len(), 2);
        assert_eq!(attrs.text("creation_date").len(), 10);
    }

    #[test]
    fn test_unreadable_file_has_unknown_stat_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vanished.mp3");

        let attrs = universal_attributes(&path, Category::Audio);
        assert_eq!(attrs.text("filename"), "vanished");
        for key in ["size", "creation_date", "creation_year", "creation_month", "creation_month_name"] {
            assert!(attrs.contains_key(key), "{}", key);
            assert_eq!(attrs.text(key), "Unknown");
        }
    }

    #[test]
    fn test_creation_date_fields() {
        let mut attrs = Attributes::new();
        let date = Local.with_ymd_and_hms(2021, 3, 9, 12, 0, 0).unwrap();
        set_creation_date(&mut attrs, &date);
        assert_eq!(attrs.text("creation_date"), "2021-03-09");
        assert_eq!(attrs.text("creation_year"), "2021");
        assert_eq!(attrs.text("creation_month"), "03");
        assert_eq!(attrs.text("creation_month_name"), "March");
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("2019-05-01T00:00:00"), Some("2019".to_string()));
        assert_eq!(extract_year("D:20030101120000"), Some("2003".to_string()));
        assert_eq!(extract_year("12/05"), None);
        assert_eq!(extract_year("Released 1999"), Some("1999".to_string()));
        assert_eq!(extract_year("n/a"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(61.9), "1:01");
        assert_eq!(format_duration(3725.0), "62:05");
    }

    #[test]
    fn test_value_serializes_untagged() {
        let attrs: Attributes = [("width", AttributeValue::from(640u32)), ("mode", "RGB".into())]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"mode":"RGB","width":640}"#);
    }
}
