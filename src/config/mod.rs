// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for mediashelf

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::category::{category_keyed, Category, ExtensionRegistry, ExtensionSet};
use crate::MediaShelfError;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Root scanned for media files
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    /// Root receiving the organized layout
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Path template per category
    #[serde(default)]
    pub templates: TemplateConfig,

    /// Per-category extension selection (`.mp3` -> selected)
    #[serde(default, deserialize_with = "lenient_extension_toggles")]
    pub extensions: BTreeMap<Category, BTreeMap<String, bool>>,

    /// Per-category exclude-unknown flags
    #[serde(default)]
    pub exclude_unknown: ExcludeUnknownConfig,

    /// User-editable extension registry
    #[serde(default)]
    pub custom_extensions: ExtensionRegistry,

    #[serde(default, deserialize_with = "lenient_operation_mode")]
    pub operation_mode: OperationMode,

    /// Show absolute paths in previews instead of root-relative ones
    #[serde(default)]
    pub show_full_paths: bool,

    /// Maximum number of records kept by a preview pass
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,

    #[serde(default = "default_logging_level")]
    pub logging_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TemplateConfig {
    #[serde(default = "default_audio_template")]
    pub audio: String,
    #[serde(default = "default_video_template")]
    pub video: String,
    #[serde(default = "default_image_template")]
    pub image: String,
    #[serde(default = "default_ebook_template")]
    pub ebook: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ExcludeUnknownConfig {
    #[serde(default = "default_true")]
    pub audio: bool,
    #[serde(default = "default_true")]
    pub video: bool,
    #[serde(default = "default_true")]
    pub image: bool,
    #[serde(default = "default_true")]
    pub ebook: bool,
}

/// What the executor does with each source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    #[default]
    Copy,
    Move,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationMode::Copy => f.write_str("copy"),
            OperationMode::Move => f.write_str("move"),
        }
    }
}

impl FromStr for OperationMode {
    type Err = MediaShelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "copy" => Ok(OperationMode::Copy),
            "move" => Ok(OperationMode::Move),
            other => Err(MediaShelfError::Configuration(format!(
                "Invalid operation mode '{}', expected 'copy' or 'move'",
                other
            ))),
        }
    }
}

fn lenient_operation_mode<'de, D>(deserializer: D) -> Result<OperationMode, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let mode = raw
        .as_str()
        .and_then(|s| s.parse::<OperationMode>().ok())
        .unwrap_or_else(|| {
            tracing::warn!("Unreadable operation mode {}, falling back to copy", raw);
            OperationMode::Copy
        });
    Ok(mode)
}

fn lenient_extension_toggles<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<Category, BTreeMap<String, bool>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(category_keyed(raw, "extension toggles"))
}

// Default value functions
fn default_true() -> bool { true }
fn default_preview_limit() -> usize { 100 }
fn default_logging_level() -> String { "info".to_string() }
fn default_audio_template() -> String { "{creation_year}/{genre}/{filename}".to_string() }
fn default_video_template() -> String { "{creation_year}/{filename}".to_string() }
fn default_image_template() -> String { "{creation_year}/{filename}".to_string() }
fn default_ebook_template() -> String { "{author}/{title}/{filename}".to_string() }

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            audio: default_audio_template(),
            video: default_video_template(),
            image: default_image_template(),
            ebook: default_ebook_template(),
        }
    }
}

impl TemplateConfig {
    /// Template for a category; anything without its own falls back to audio
    pub fn get(&self, category: Category) -> &str {
        match category {
            Category::Video => &self.video,
            Category::Image => &self.image,
            Category::Ebook => &self.ebook,
            Category::Audio | Category::Unknown => &self.audio,
        }
    }

    pub fn set(&mut self, category: Category, template: impl Into<String>) {
        let template = template.into();
        match category {
            Category::Audio => self.audio = template,
            Category::Video => self.video = template,
            Category::Image => self.image = template,
            Category::Ebook => self.ebook = template,
            Category::Unknown => {
                tracing::debug!("Ignoring template for unknown category: {}", template)
            }
        }
    }
}

impl Default for ExcludeUnknownConfig {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            image: true,
            ebook: true,
        }
    }
}

impl ExcludeUnknownConfig {
    pub fn get(&self, category: Category) -> bool {
        match category {
            Category::Video => self.video,
            Category::Image => self.image,
            Category::Ebook => self.ebook,
            Category::Audio | Category::Unknown => self.audio,
        }
    }

    pub fn set(&mut self, category: Category, exclude: bool) {
        match category {
            Category::Audio => self.audio = exclude,
            Category::Video => self.video = exclude,
            Category::Image => self.image = exclude,
            Category::Ebook => self.ebook = exclude,
            Category::Unknown => {}
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            output_dir: None,
            templates: TemplateConfig::default(),
            extensions: BTreeMap::new(),
            exclude_unknown: ExcludeUnknownConfig::default(),
            custom_extensions: ExtensionRegistry::new(),
            operation_mode: OperationMode::Copy,
            show_full_paths: false,
            preview_limit: default_preview_limit(),
            logging_level: default_logging_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content).map_err(|e| {
                MediaShelfError::Configuration(format!("Failed to parse config: {}", e))
            })?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Extensions currently selected for scanning.
    ///
    /// Every registered extension is selected unless the `extensions` table
    /// explicitly switches it off.
    pub fn selected_extensions(&self) -> ExtensionSet {
        let mut selected = Vec::new();
        for category in Category::MEDIA {
            let toggles = self.extensions.get(&category);
            for ext in self.custom_extensions.extensions(category) {
                let enabled = toggles
                    .and_then(|t| t.get(ext).or_else(|| t.get(ext.trim_start_matches('.'))))
                    .copied()
                    .unwrap_or(true);
                if enabled {
                    selected.push(ext.clone());
                }
            }
        }
        ExtensionSet::from_iter(selected)
    }

    /// Record a selection in the per-category toggle table
    pub fn set_selected_extensions(&mut self, selection: &ExtensionSet) {
        self.extensions.clear();
        for category in Category::MEDIA {
            let toggles = self
                .custom_extensions
                .extensions(category)
                .iter()
                .map(|ext| (ext.clone(), selection.contains(ext)))
                .collect();
            self.extensions.insert(category, toggles);
        }
    }

    /// Check the settings needed before an organize run
    pub fn validate(&self) -> crate::Result<()> {
        if self.preview_limit == 0 {
            return Err(MediaShelfError::Configuration(
                "preview_limit must be at least 1".to_string(),
            ));
        }
        for category in Category::MEDIA {
            if self.templates.get(category).trim().is_empty() {
                return Err(MediaShelfError::Configuration(format!(
                    "Template for {} is empty",
                    category
                )));
            }
        }
        Ok(())
    }
}
