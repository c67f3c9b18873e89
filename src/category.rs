// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Media categories and the extension registry used to classify files
//!
//! Classification is a pure lookup of the lowercased extension (dot included)
//! against a registry snapshot. The registry itself is user-editable, so every
//! run takes its own copy.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use crate::MediaShelfError;

/// Broad media category assigned to a file by extension lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Audio,
    Video,
    Image,
    Ebook,
    Unknown,
}

impl Category {
    /// Every category that can own extensions and templates
    pub const MEDIA: [Category; 4] = [
        Category::Audio,
        Category::Video,
        Category::Image,
        Category::Ebook,
    ];

    /// Lowercase name, also used as the fallback top-level folder
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Audio => "audio",
            Category::Video => "video",
            Category::Image => "image",
            Category::Ebook => "ebook",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MediaShelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "audio" => Ok(Category::Audio),
            "video" => Ok(Category::Video),
            "image" => Ok(Category::Image),
            "ebook" => Ok(Category::Ebook),
            "unknown" => Ok(Category::Unknown),
            other => Err(MediaShelfError::Configuration(format!(
                "unknown media category '{}'",
                other
            ))),
        }
    }
}

/// Normalize a user-supplied extension to the registry form (`.mp3`).
///
/// Returns `None` for blank input.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

/// Lowercased extension of a path including the leading dot, if any
pub fn path_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(normalize_extension)
}

/// Keep the entries of a category-keyed JSON object that name a known
/// category and hold a readable value. Everything else is logged and dropped.
pub(crate) fn category_keyed<V: DeserializeOwned>(
    raw: BTreeMap<String, serde_json::Value>,
    what: &str,
) -> BTreeMap<Category, V> {
    let mut map = BTreeMap::new();
    for (key, value) in raw {
        let category = match key.parse::<Category>() {
            Ok(category) => category,
            Err(_) => {
                warn!("Ignoring {} for unknown category '{}'", what, key);
                continue;
            }
        };
        match serde_json::from_value::<V>(value) {
            Ok(value) => {
                map.insert(category, value);
            }
            Err(e) => warn!("Ignoring unreadable {} for {}: {}", what, category, e),
        }
    }
    map
}

/// Mapping from category to the extensions it claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtensionRegistry {
    categories: BTreeMap<Category, Vec<String>>,
}

impl ExtensionRegistry {
    /// Registry with the stock extension lists
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.set_extensions(
            Category::Audio,
            [".mp3", ".flac", ".m4a", ".aac", ".ogg", ".wav"],
        );
        registry.set_extensions(Category::Video, [".mp4", ".mkv", ".avi", ".mov", ".wmv"]);
        registry.set_extensions(
            Category::Image,
            [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff"],
        );
        registry.set_extensions(
            Category::Ebook,
            [".epub", ".pdf", ".mobi", ".azw", ".azw3", ".fb2"],
        );
        registry
    }

    /// Registry that classifies everything as `unknown`
    pub fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }

    /// Replace the extension list of a category.
    ///
    /// Entries are normalized; blanks and duplicates are dropped while the
    /// caller's order is kept.
    pub fn set_extensions<I, S>(&mut self, category: Category, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if category == Category::Unknown {
            return;
        }
        let mut list: Vec<String> = Vec::new();
        for ext in extensions {
            if let Some(normalized) = normalize_extension(ext.as_ref()) {
                if !list.contains(&normalized) {
                    list.push(normalized);
                }
            }
        }
        self.categories.insert(category, list);
    }

    /// Add one extension to a category. Returns false when already present.
    pub fn add_extension(&mut self, category: Category, ext: &str) -> bool {
        let Some(normalized) = normalize_extension(ext) else {
            return false;
        };
        if category == Category::Unknown {
            return false;
        }
        let list = self.categories.entry(category).or_default();
        if list.contains(&normalized) {
            return false;
        }
        list.push(normalized);
        true
    }

    /// Remove an extension from a category. Returns true if it was present.
    pub fn remove_extension(&mut self, category: Category, ext: &str) -> bool {
        let Some(normalized) = normalize_extension(ext) else {
            return false;
        };
        match self.categories.get_mut(&category) {
            Some(list) => {
                let before = list.len();
                list.retain(|e| e != &normalized);
                list.len() != before
            }
            None => false,
        }
    }

    /// Extensions claimed by a category, in registration order
    pub fn extensions(&self, category: Category) -> &[String] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every registered extension across all categories
    pub fn all_extensions(&self) -> ExtensionSet {
        ExtensionSet::from_iter(self.categories.values().flatten())
    }

    /// Category owning an extension (`mp3`, `.MP3` and `.mp3` all match)
    pub fn category_of_extension(&self, ext: &str) -> Category {
        let Some(normalized) = normalize_extension(ext) else {
            return Category::Unknown;
        };
        Category::MEDIA
            .into_iter()
            .find(|c| self.extensions(*c).contains(&normalized))
            .unwrap_or(Category::Unknown)
    }
}

impl<'de> Deserialize<'de> for ExtensionRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut registry = Self::empty();
        for (category, list) in category_keyed::<Vec<String>>(raw, "custom extensions") {
            registry.set_extensions(category, list);
        }
        Ok(registry)
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a path by its extension against a registry snapshot
pub fn classify(path: &Path, registry: &ExtensionRegistry) -> Category {
    match path_extension(path) {
        Some(ext) => registry.category_of_extension(&ext),
        None => Category::Unknown,
    }
}

/// Immutable snapshot of the extensions a caller has selected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionSet {
    extensions: BTreeSet<String>,
}

impl ExtensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the path's extension is part of the selection
    pub fn matches(&self, path: &Path) -> bool {
        path_extension(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    pub fn contains(&self, ext: &str) -> bool {
        normalize_extension(ext).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Copy of this set with `ext` added
    pub fn with(&self, ext: &str) -> Self {
        let mut next = self.clone();
        if let Some(ext) = normalize_extension(ext) {
            next.extensions.insert(ext);
        }
        next
    }

    /// Copy of this set with `ext` removed
    pub fn without(&self, ext: &str) -> Self {
        let mut next = self.clone();
        if let Some(ext) = normalize_extension(ext) {
            next.extensions.remove(&ext);
        }
        next
    }

    /// Copy of this set with every extension of `category` added or removed
    pub fn with_category(&self, registry: &ExtensionRegistry, category: Category, selected: bool) -> Self {
        let mut next = self.clone();
        for ext in registry.extensions(category) {
            if selected {
                next.extensions.insert(ext.clone());
            } else {
                next.extensions.remove(ext);
            }
        }
        next
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExtensionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            extensions: iter
                .into_iter()
                .filter_map(|e| normalize_extension(e.as_ref()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        let registry = ExtensionRegistry::new();
        assert_eq!(classify(Path::new("Track.MP3"), &registry), Category::Audio);
        assert_eq!(classify(Path::new("Track.mp3"), &registry), Category::Audio);
        assert_eq!(classify(Path::new("dir/Clip.MkV"), &registry), Category::Video);
    }

    #[test]
    fn test_classify_unknown_extension() {
        let registry = ExtensionRegistry::new();
        assert_eq!(classify(Path::new("notes.xyz"), &registry), Category::Unknown);
        assert_eq!(classify(Path::new("README"), &registry), Category::Unknown);
    }

    #[test]
    fn test_default_registry_categories() {
        let registry = ExtensionRegistry::new();
        assert_eq!(registry.category_of_extension("azw3"), Category::Ebook);
        assert_eq!(registry.category_of_extension(".TIFF"), Category::Image);
        assert_eq!(registry.category_of_extension(".wmv"), Category::Video);
        assert_eq!(registry.extensions(Category::Unknown), &[] as &[String]);
    }

    #[test]
    fn test_registry_edits_normalize() {
        let mut registry = ExtensionRegistry::empty();
        assert!(registry.add_extension(Category::Audio, "OPUS"));
        assert!(!registry.add_extension(Category::Audio, ".opus"));
        assert_eq!(registry.extensions(Category::Audio), &[".opus".to_string()]);
        assert_eq!(classify(Path::new("a.Opus"), &registry), Category::Audio);

        assert!(registry.remove_extension(Category::Audio, "opus"));
        assert_eq!(classify(Path::new("a.opus"), &registry), Category::Unknown);
    }

    #[test]
    fn test_set_extensions_drops_blanks_and_duplicates() {
        let mut registry = ExtensionRegistry::empty();
        registry.set_extensions(Category::Video, ["mp4", " ", ".MP4", "webm"]);
        assert_eq!(
            registry.extensions(Category::Video),
            &[".mp4".to_string(), ".webm".to_string()]
        );
    }

    #[test]
    fn test_extension_set_snapshots() {
        let registry = ExtensionRegistry::new();
        let all = registry.all_extensions();
        let no_ebooks = all.with_category(&registry, Category::Ebook, false);

        assert!(all.matches(Path::new("book.EPUB")));
        assert!(!no_ebooks.matches(Path::new("book.epub")));
        assert!(no_ebooks.matches(Path::new("song.mp3")));
        assert_eq!(no_ebooks.with("epub").len(), all.len() - 5);
        assert!(!all.without(".mp3").contains("MP3"));
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Ebook".parse::<Category>().unwrap(), Category::Ebook);
        assert!("podcast".parse::<Category>().is_err());
    }
}
