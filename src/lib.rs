// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! mediashelf: metadata-driven media library organizer
//!
//! Scans a source tree for audio, video, image and ebook files, reads their
//! embedded metadata and copies or moves each file to a path rendered from a
//! per-category template such as `{creation_year}/{genre}/{filename}`.
//! Previews are computed from a capped sample and can be re-filtered by file
//! type without scanning again.

pub mod attributes;
pub mod category;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod extractors;
pub mod preview;
pub mod scanner;
pub mod template;

pub use attributes::{AttributeValue, Attributes, MediaRecord};
pub use category::{classify, Category, ExtensionRegistry, ExtensionSet};
pub use config::{AppConfig, OperationMode};
pub use engine::{Engine, EngineEvent, RunHandle};
pub use error::{MediaShelfError, Result};
pub use executor::{PlanEntry, Progress, ProgressItem, RunOutcome, RunState};
pub use preview::{PreviewCache, PreviewRecord};
