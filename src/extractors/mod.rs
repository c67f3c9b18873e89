// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Per-category metadata extractors

pub mod audio;
pub mod ebook;
pub mod image;
pub mod video;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::attributes::{file_stem, universal_attributes, Attributes, MediaRecord};
use crate::category::Category;
use crate::Result;

const IDENTITY_KEYS: [&str; 4] = ["filename", "filename_with_extension", "extension", "file_type"];

/// Trait for metadata extractors
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Category this extractor serves
    fn category(&self) -> Category;

    /// Extract category-specific attributes.
    ///
    /// Keys the extractor cannot determine are set to `Unknown`. Universal
    /// file attributes are added by the caller.
    async fn extract(&self, path: &Path) -> Result<Attributes>;
}

/// Registry of extractors keyed by category
#[derive(Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<Category, Arc<dyn MetadataExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new registry with the built-in extractors
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(audio::AudioExtractor::new()));
        registry.register(Arc::new(video::VideoExtractor::new()));
        registry.register(Arc::new(image::ImageExtractor::new()));
        registry.register(Arc::new(ebook::EbookExtractor::new()));
        registry
    }

    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register an extractor, replacing any previous one for its category
    pub fn register(&mut self, extractor: Arc<dyn MetadataExtractor>) {
        self.extractors.insert(extractor.category(), extractor);
    }

    pub fn get(&self, category: Category) -> Option<&Arc<dyn MetadataExtractor>> {
        self.extractors.get(&category)
    }

    /// Categories with a registered extractor
    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.extractors.keys().copied().collect();
        categories.sort();
        categories
    }

    /// Build the full record for one file.
    ///
    /// Never fails: an extractor error leaves only the universal attributes
    /// plus `title` taken from the filename stem.
    pub async fn extract_record(&self, path: &Path, category: Category) -> MediaRecord {
        let universal = universal_attributes(path, category);
        let mut attributes = universal.clone();

        match self.get(category) {
            Some(extractor) => match extractor.extract(path).await {
                Ok(specific) => attributes.extend(specific),
                Err(e) => {
                    warn!("Metadata extraction failed for {:?}: {}", path, e);
                    attributes.set("title", file_stem(path));
                }
            },
            None => {
                debug!("No extractor for {} file {:?}", category, path);
                attributes.set("title", file_stem(path));
            }
        }

        // Category-specific values never shadow the file's own identity
        for key in IDENTITY_KEYS {
            if let Some(value) = universal.get(key) {
                attributes.set(key, value.clone());
            }
        }

        MediaRecord {
            source_path: path.to_path_buf(),
            category,
            attributes,
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaShelfError;
    use std::fs;
    use tempfile::tempdir;

    struct FailingExtractor;

    #[async_trait]
    impl MetadataExtractor for FailingExtractor {
        fn category(&self) -> Category {
            Category::Image
        }

        async fn extract(&self, _path: &Path) -> Result<Attributes> {
            Err(MediaShelfError::extraction("corrupt header"))
        }
    }

    struct TitleExtractor;

    #[async_trait]
    impl MetadataExtractor for TitleExtractor {
        fn category(&self) -> Category {
            Category::Audio
        }

        async fn extract(&self, _path: &Path) -> Result<Attributes> {
            let mut attrs = Attributes::new();
            attrs.set("title", "Blue in Green");
            attrs.set("extension", "bogus");
            Ok(attrs)
        }
    }

    #[test]
    fn test_registry_has_builtin_extractors() {
        let registry = ExtractorRegistry::new();
        assert_eq!(registry.categories(), Category::MEDIA.to_vec());
        assert!(registry.get(Category::Unknown).is_none());
    }

    #[tokio::test]
    async fn test_failed_extraction_falls_back_to_filename() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        fs::write(&path, b"not a jpeg").unwrap();

        let mut registry = ExtractorRegistry::empty();
        registry.register(Arc::new(FailingExtractor));
        let record = registry.extract_record(&path, Category::Image).await;

        assert_eq!(record.category, Category::Image);
        assert_eq!(record.attributes.text("title"), "cover");
        assert_eq!(record.attributes.text("filename_with_extension"), "cover.jpg");
        assert!(record.attributes.contains_key("creation_year"));
    }

    #[tokio::test]
    async fn test_specific_attributes_merge_over_universal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("track.flac");
        fs::write(&path, b"").unwrap();

        let mut registry = ExtractorRegistry::empty();
        registry.register(Arc::new(TitleExtractor));
        let record = registry.extract_record(&path, Category::Audio).await;

        assert_eq!(record.attributes.text("title"), "Blue in Green");
        assert_eq!(record.attributes.text("extension"), "flac");
    }

    #[tokio::test]
    async fn test_unknown_category_gets_title() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.xyz");
        fs::write(&path, b"hi").unwrap();

        let record = ExtractorRegistry::new()
            .extract_record(&path, Category::Unknown)
            .await;
        assert_eq!(record.attributes.text("title"), "notes");
        assert_eq!(record.attributes.text("file_type"), "unknown");
    }
}
