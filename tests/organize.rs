// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use mediashelf::attributes::Attributes;
use mediashelf::executor::Executor;
use mediashelf::extractors::{ExtractorRegistry, MetadataExtractor};
use mediashelf::template::render;
use mediashelf::{
    classify, AppConfig, Category, Engine, EngineEvent, ExtensionRegistry, ExtensionSet,
    OperationMode, PlanEntry, PreviewCache, PreviewRecord, ProgressItem, RunState,
};

fn seed(root: &Path, names: &[&str]) {
    for name in names {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"placeholder").unwrap();
    }
}

fn files_under(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

#[test]
fn classification_ignores_case() {
    let registry = ExtensionRegistry::new();
    assert_eq!(classify(Path::new("Track.MP3"), &registry), Category::Audio);
    assert_eq!(classify(Path::new("Track.mp3"), &registry), Category::Audio);
    assert_eq!(classify(Path::new("data.xyz"), &registry), Category::Unknown);
}

#[test]
fn forbidden_characters_are_replaced() {
    let attrs: Attributes = [
        ("artist", "AC/DC:Live*Band?"),
        ("title", "Hit<>:\"Song\"|"),
        ("filename_with_extension", "live.mp3"),
    ]
    .into_iter()
    .collect();
    assert!(render("{artist}/{title}", &attrs, false).ends_with("AC_DC_Live_Band_/Hit____Song__/live.mp3"));
}

#[test]
fn preview_filter_round_trip() {
    let records: Vec<PreviewRecord> = [
        ("song.mp3", Category::Audio),
        ("song.flac", Category::Audio),
        ("video.mp4", Category::Video),
        ("photo.jpg", Category::Image),
        ("book.epub", Category::Ebook),
        ("book.pdf", Category::Ebook),
    ]
    .into_iter()
    .map(|(name, category)| PreviewRecord {
        display_source: name.to_string(),
        display_destination: format!("2024/{}", name),
        source_path: PathBuf::from("/src").join(name),
        destination_relative_path: PathBuf::from("2024").join(name),
        category,
    })
    .collect();
    let cache = PreviewCache::new(records.clone(), 6);

    let registry = ExtensionRegistry::new();
    let without_ebooks = registry
        .all_extensions()
        .with_category(&registry, Category::Ebook, false);
    let visible = cache.filter(&without_ebooks);
    assert_eq!(visible.len(), 4);
    assert!(visible.iter().all(|r| r.category != Category::Ebook));

    let everything = without_ebooks.with_category(&registry, Category::Ebook, true);
    let visible: Vec<PreviewRecord> = cache.filter(&everything).into_iter().cloned().collect();
    assert_eq!(visible, records);
}

#[tokio::test]
async fn nested_output_is_never_rescanned() {
    let dir = tempdir().unwrap();
    let source = dir.path().to_path_buf();
    let output = source.join("organized");
    seed(&source, &["a.jpg", "b.png", "deep/c.gif"]);
    seed(&output, &["2020/old.jpg"]);

    let mut engine = Engine::new(AppConfig::default());
    engine.set_source_dir(&source);
    engine.set_output_dir(&output);

    let preview = engine.start_analyze(100).unwrap().wait().await.unwrap();
    assert_eq!(preview.total, 3);
    assert!(engine
        .preview()
        .records()
        .iter()
        .all(|r| !r.source_path.starts_with(&output)));

    let outcome = engine.start_organize().unwrap().wait().await.unwrap();
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.succeeded, 3);

    // A second run sees the same three sources, not the copies
    let again = engine.start_organize().unwrap().wait().await.unwrap();
    assert_eq!(again.total, 3);
}

#[tokio::test]
async fn unknown_metadata_falls_back_to_category_folder() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("in");
    let output = dir.path().join("out");
    seed(&source, &["cover.jpg"]);

    let mut engine = Engine::new(AppConfig::default());
    engine.set_source_dir(&source);
    engine.set_output_dir(&output);
    engine.set_template(Category::Image, "{camera_make}/{camera_model}");

    let outcome = engine.start_organize().unwrap().wait().await.unwrap();
    assert_eq!(outcome.succeeded, 1);
    assert!(output.join("image/cover.jpg").exists());
    assert!(files_under(&output)
        .iter()
        .all(|p| p.components().all(|c| c.as_os_str() != "Unknown")));
}

#[tokio::test]
async fn unknown_segments_kept_when_not_excluding() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("in");
    let output = dir.path().join("out");
    seed(&source, &["cover.jpg"]);

    let mut engine = Engine::new(AppConfig::default());
    engine.set_source_dir(&source);
    engine.set_output_dir(&output);
    engine.set_template(Category::Image, "{camera_make}/{filename}");
    engine.set_exclude_unknown(Category::Image, false);

    engine.start_organize().unwrap().wait().await.unwrap();
    assert!(output.join("Unknown/cover.jpg").exists());
}

#[tokio::test]
async fn move_mode_relocates_selected_files_only() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("in");
    let output = dir.path().join("out");
    seed(&source, &["a.jpg", "b.pdf", "c.txt"]);

    let mut engine = Engine::new(AppConfig::default());
    engine.set_source_dir(&source);
    engine.set_output_dir(&output);
    engine.set_operation_mode("move").unwrap();
    engine.set_selected_extensions(&ExtensionSet::from_iter([".jpg"]));
    engine.set_template(Category::Image, "pictures/{filename}");

    let outcome = engine.start_organize().unwrap().wait().await.unwrap();
    assert_eq!(outcome.total, 1);
    assert!(output.join("pictures/a.jpg").exists());
    assert!(!source.join("a.jpg").exists());
    assert!(source.join("b.pdf").exists());
    assert!(source.join("c.txt").exists());
}

#[test]
fn cancel_mid_run_reports_partial_counts() {
    let dir = tempdir().unwrap();
    seed(dir.path(), &["1.mp3", "2.mp3", "3.mp3", "4.mp3"]);
    let plan: Vec<PlanEntry> = ["1.mp3", "2.mp3", "3.mp3", "4.mp3"]
        .iter()
        .map(|name| PlanEntry::new(dir.path().join(name), format!("sorted/{}", name)))
        .collect();

    let cancel = Arc::new(AtomicBool::new(false));
    let executor = Executor::new(dir.path().join("out"), OperationMode::Copy, Arc::clone(&cancel));
    let mut events = Vec::new();
    let outcome = executor.execute(plan, 4, |progress| {
        if progress.processed == 2 {
            cancel.store(true, Ordering::SeqCst);
        }
        events.push(progress);
    });

    assert_eq!(outcome.state, RunState::Cancelled);
    assert_eq!(outcome.processed, 2);
    let last = events.last().unwrap();
    assert_eq!(last.item, ProgressItem::Complete);
    assert_eq!((last.processed, last.total), (2, 4));
    assert_eq!(events.iter().filter(|e| e.item == ProgressItem::Complete).count(), 1);
}

/// Image extractor that takes a while, so a stop can land mid-run
struct SlowImages;

#[async_trait]
impl MetadataExtractor for SlowImages {
    fn category(&self) -> Category {
        Category::Image
    }

    async fn extract(&self, _path: &Path) -> mediashelf::Result<Attributes> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(Attributes::new())
    }
}

#[tokio::test]
async fn engine_stop_is_observed_between_files() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("in");
    seed(&source, &["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg"]);

    let mut extractors = ExtractorRegistry::empty();
    extractors.register(Arc::new(SlowImages));
    let mut engine = Engine::with_extractors(AppConfig::default(), extractors);
    engine.set_source_dir(&source);
    engine.set_output_dir(dir.path().join("out"));
    let engine = Arc::new(engine);

    let handle = engine.start_organize().unwrap();
    let stopper = Arc::clone(&engine);
    let mut completes = 0;
    let outcome = handle
        .drain(|event| {
            if let EngineEvent::Progress(progress) = event {
                match progress.item {
                    ProgressItem::File(_) => stopper.stop(),
                    ProgressItem::Complete => completes += 1,
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(outcome.state, RunState::Cancelled);
    assert!(outcome.processed < 6);
    assert_eq!(completes, 1);
    assert!(!engine.is_busy());
}

#[test]
fn files_without_extractor_get_filename_title() {
    let dir = tempdir().unwrap();
    seed(dir.path(), &["mystery.xyz"]);
    let path = dir.path().join("mystery.xyz");

    let record = tokio_test::block_on(ExtractorRegistry::new().extract_record(&path, Category::Unknown));
    assert_eq!(record.attributes.text("title"), "mystery");
    assert_eq!(record.attributes.text("extension"), "xyz");
    assert_eq!(record.attributes.text("file_type"), "unknown");
}
