// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Preview cache and incremental filter
//!
//! One capped analysis pass is cached unfiltered. Changing the extension
//! selection afterwards only re-derives the visible subset from memory; the
//! source tree is not scanned again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::category::{classify, Category, ExtensionSet};
use crate::config::AppConfig;
use crate::executor::{PlanEntry, Progress, ProgressItem};
use crate::extractors::ExtractorRegistry;
use crate::scanner::Scanner;
use crate::template;

/// One analyzed file as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRecord {
    pub display_source: String,
    pub display_destination: String,
    pub source_path: PathBuf,
    /// Rendered path relative to the output root
    pub destination_relative_path: PathBuf,
    pub category: Category,
}

impl PreviewRecord {
    pub fn plan_entry(&self) -> PlanEntry {
        PlanEntry::new(&self.source_path, &self.destination_relative_path)
    }
}

/// Records from the last analysis plus the true number of matching files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewCache {
    records: Vec<PreviewRecord>,
    total_count: usize,
}

impl PreviewCache {
    pub fn new(records: Vec<PreviewRecord>, total_count: usize) -> Self {
        Self {
            records,
            total_count,
        }
    }

    pub fn records(&self) -> &[PreviewRecord] {
        &self.records
    }

    /// Files the source holds for the selection at analysis time, beyond the cap
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.total_count = 0;
    }

    pub fn filter(&self, selection: &ExtensionSet) -> Vec<&PreviewRecord> {
        filter(&self.records, selection)
    }
}

/// Records whose source extension is selected, in their original order
pub fn filter<'a>(records: &'a [PreviewRecord], selection: &ExtensionSet) -> Vec<&'a PreviewRecord> {
    records
        .iter()
        .filter(|record| selection.matches(&record.source_path))
        .collect()
}

/// Number of records per category
pub fn category_counts<'a, I>(records: I) -> BTreeMap<Category, usize>
where
    I: IntoIterator<Item = &'a PreviewRecord>,
{
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.category).or_insert(0) += 1;
    }
    counts
}

/// Human summary such as `2 audio, 1 video`
pub fn describe_counts(counts: &BTreeMap<Category, usize>) -> String {
    counts
        .iter()
        .map(|(category, count)| format!("{} {}", count, category))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Count every matching file, then extract and render at most `sample_limit`
/// of them. Nothing on disk is modified.
pub async fn analyze<F>(
    scanner: &Scanner,
    output_root: Option<&Path>,
    config: &AppConfig,
    extractors: &ExtractorRegistry,
    sample_limit: usize,
    mut on_progress: F,
) -> PreviewCache
where
    F: FnMut(Progress),
{
    let total_count = scanner.count();
    let sample = total_count.min(sample_limit);
    info!("Found {} files, previewing {}", total_count, sample);

    let mut records = Vec::with_capacity(sample);
    for path in scanner.files().take(sample_limit) {
        let category = classify(&path, &config.custom_extensions);
        let record = extractors.extract_record(&path, category).await;
        let relative = template::render_record(&record, &config.templates, &config.exclude_unknown);
        debug!("{:?} -> {}", path, relative);

        records.push(preview_record(
            path,
            PathBuf::from(relative),
            category,
            scanner.root(),
            output_root,
            config.show_full_paths,
        ));
        on_progress(Progress {
            processed: records.len(),
            total: sample,
            item: ProgressItem::File(records[records.len() - 1].source_path.clone()),
        });
    }

    on_progress(Progress {
        processed: records.len(),
        total: sample,
        item: ProgressItem::Complete,
    });
    PreviewCache::new(records, total_count)
}

fn preview_record(
    source_path: PathBuf,
    destination_relative_path: PathBuf,
    category: Category,
    source_root: &Path,
    output_root: Option<&Path>,
    full_paths: bool,
) -> PreviewRecord {
    let display_source = match source_path.strip_prefix(source_root) {
        Ok(relative) if !full_paths => relative.to_string_lossy().into_owned(),
        _ => source_path.to_string_lossy().into_owned(),
    };
    let display_destination = match output_root {
        Some(root) if full_paths => root.join(&destination_relative_path).to_string_lossy().into_owned(),
        _ => destination_relative_path.to_string_lossy().into_owned(),
    };

    PreviewRecord {
        display_source,
        display_destination,
        source_path,
        destination_relative_path,
        category,
    }
}
