// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Organization engine
//!
//! Owns the configuration, the cached preview and the single background
//! worker. Every run executes on tokio's blocking pool, driving extractor
//! futures through the runtime handle, and reports back through an event
//! channel. Only one run may be active at a time. Configuration and extractors are snapshotted when a run starts, so
//! changing settings mid-run affects only the next run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::category::{classify, Category, ExtensionRegistry, ExtensionSet};
use crate::config::{AppConfig, OperationMode};
use crate::executor::{Executor, PlanEntry, Progress, RunOutcome, RunState};
use crate::extractors::ExtractorRegistry;
use crate::preview::{self, PreviewCache, PreviewRecord};
use crate::scanner::Scanner;
use crate::template;
use crate::{MediaShelfError, Result};

/// Message sent from a background run to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Free-form status line such as "Counting files..."
    Status(String),
    Progress(Progress),
}

/// Handle to a spawned run
pub struct RunHandle {
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Wait for the run to end without looking at its events
    pub async fn wait(self) -> Result<RunOutcome> {
        self.join
            .await
            .map_err(|e| MediaShelfError::Worker(e.to_string()))
    }

    /// Feed every event to `on_event`, then wait for the outcome
    pub async fn drain<F: FnMut(EngineEvent)>(mut self, mut on_event: F) -> Result<RunOutcome> {
        while let Some(event) = self.events.recv().await {
            on_event(event);
        }
        self.wait().await
    }
}

/// Clears the busy flag when a run ends, however it ends
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| MediaShelfError::EngineBusy)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Event sink shared by the worker and its progress callbacks
#[derive(Clone)]
struct Events(mpsc::UnboundedSender<EngineEvent>);

impl Events {
    fn status(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("{}", message);
        // The caller may have dropped the receiver; the run carries on
        let _ = self.0.send(EngineEvent::Status(message));
    }

    fn progress(&self, progress: Progress) {
        let _ = self.0.send(EngineEvent::Progress(progress));
    }
}

pub struct Engine {
    config: AppConfig,
    extractors: ExtractorRegistry,
    busy: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    preview: Arc<Mutex<PreviewCache>>,
}

impl Engine {
    pub fn new(config: AppConfig) -> Self {
        Self::with_extractors(config, ExtractorRegistry::new())
    }

    /// Engine with a custom extractor set
    pub fn with_extractors(config: AppConfig, extractors: ExtractorRegistry) -> Self {
        Self {
            config,
            extractors,
            busy: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            preview: Arc::new(Mutex::new(PreviewCache::default())),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn set_source_dir(&mut self, path: impl Into<PathBuf>) {
        self.config.source_dir = Some(path.into());
        self.clear_preview();
    }

    pub fn set_output_dir(&mut self, path: impl Into<PathBuf>) {
        self.config.output_dir = Some(path.into());
        self.clear_preview();
    }

    /// Accepts `copy` or `move`, case-insensitively
    pub fn set_operation_mode(&mut self, mode: &str) -> Result<()> {
        self.config.operation_mode = mode.parse()?;
        Ok(())
    }

    pub fn set_template(&mut self, category: Category, template: impl Into<String>) {
        self.config.templates.set(category, template);
    }

    pub fn set_selected_extensions(&mut self, selection: &ExtensionSet) {
        self.config.set_selected_extensions(selection);
    }

    pub fn set_exclude_unknown(&mut self, category: Category, exclude: bool) {
        self.config.exclude_unknown.set(category, exclude);
    }

    pub fn set_extension_registry(&mut self, registry: ExtensionRegistry) {
        self.config.custom_extensions = registry;
    }

    pub fn set_show_full_paths(&mut self, show: bool) {
        self.config.show_full_paths = show;
    }

    /// Request cancellation; observed at the next file boundary
    pub fn stop(&self) {
        info!("Stop requested");
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Scan the source, cache a capped preview and report progress.
    ///
    /// The outcome's `processed` is the number of cached records and `total`
    /// the number of matching files in the source.
    pub fn start_analyze(&self, sample_limit: usize) -> Result<RunHandle> {
        if sample_limit == 0 {
            return Err(MediaShelfError::Configuration(
                "Preview sample limit must be at least 1".to_string(),
            ));
        }

        let runtime = runtime_handle()?;
        let guard = BusyGuard::acquire(&self.busy)?;
        let source = self.source_root()?;
        let output = self.config.output_dir.clone();
        let scanner = self.scanner(&source, output.as_deref())?;
        self.reset_cancel();
        self.clear_preview();

        let config = self.config.clone();
        let extractors = self.extractors.clone();
        let cache_slot = Arc::clone(&self.preview);
        let cancel = Arc::clone(&self.cancel);
        let (tx, rx) = mpsc::unbounded_channel();
        let events = Events(tx);

        info!("Generating preview for {:?}", source);
        let join = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            events.status("Counting files...");

            let sink = events.clone();
            let cache = runtime.block_on(preview::analyze(
                &scanner,
                output.as_deref(),
                &config,
                &extractors,
                sample_limit,
                move |progress| sink.progress(progress),
            ));

            let state = if cancel.load(Ordering::SeqCst) {
                RunState::Cancelled
            } else {
                RunState::Completed
            };
            let shown = cache.len();
            let total = cache.total_count();
            if total == 0 {
                events.status("No media files found in the source directory.");
            } else {
                events.status(format!(
                    "Preview generated for {} of {} files. Found: {}",
                    shown,
                    total,
                    preview::describe_counts(&preview::category_counts(cache.records()))
                ));
            }
            *lock(&cache_slot) = cache;

            RunOutcome {
                state,
                processed: shown,
                succeeded: shown,
                failed: 0,
                total,
            }
        });

        Ok(RunHandle { events: rx, join })
    }

    /// Organize every selected file under the source into the output root
    pub fn start_organize(&self) -> Result<RunHandle> {
        let runtime = runtime_handle()?;
        let guard = BusyGuard::acquire(&self.busy)?;
        let source = self.source_root()?;
        let output = self.output_root()?;
        let scanner = self.scanner(&source, Some(&output))?;
        self.reset_cancel();

        let config = self.config.clone();
        let extractors = self.extractors.clone();
        let executor = Executor::new(output, config.operation_mode, Arc::clone(&self.cancel));
        let (tx, rx) = mpsc::unbounded_channel();
        let events = Events(tx);

        let join = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            events.status("Counting files...");
            let total = scanner.count();
            events.status(format!("Found {} files to organize", total));

            let mut emit = |progress: Progress| events.progress(progress);
            let mut run = executor.start(total);
            for path in scanner.files() {
                if run.should_stop() {
                    break;
                }
                let category = classify(&path, &config.custom_extensions);
                let record = runtime.block_on(extractors.extract_record(&path, category));
                let relative = template::render_record(&record, &config.templates, &config.exclude_unknown);
                run.apply(&PlanEntry::new(path, relative), &mut emit);
            }
            // The walk itself stops on cancel, so poll once more
            run.should_stop();
            let outcome = run.finish(&mut emit);

            events.status(completion_message(executor.mode(), &outcome));
            outcome
        });

        Ok(RunHandle { events: rx, join })
    }

    /// Process an explicit plan, such as the rows picked from a preview
    pub fn start_execute(&self, plan: Vec<PlanEntry>, mode: OperationMode) -> Result<RunHandle> {
        let guard = BusyGuard::acquire(&self.busy)?;
        let output = self.output_root()?;
        self.reset_cancel();

        let executor = Executor::new(output, mode, Arc::clone(&self.cancel));
        let (tx, rx) = mpsc::unbounded_channel();
        let events = Events(tx);

        let join = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let total = plan.len();
            let outcome = executor.execute(plan, total, |progress| events.progress(progress));
            events.status(completion_message(executor.mode(), &outcome));
            outcome
        });

        Ok(RunHandle { events: rx, join })
    }

    /// Visible preview rows for a selection, computed from the cache only
    pub fn filter_preview(&self, selection: &ExtensionSet) -> Vec<PreviewRecord> {
        lock(&self.preview)
            .filter(selection)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Plan for the visible preview rows
    pub fn preview_plan(&self, selection: &ExtensionSet) -> Vec<PlanEntry> {
        lock(&self.preview)
            .filter(selection)
            .into_iter()
            .map(PreviewRecord::plan_entry)
            .collect()
    }

    /// Snapshot of the cached preview
    pub fn preview(&self) -> PreviewCache {
        lock(&self.preview).clone()
    }

    pub fn clear_preview(&self) {
        lock(&self.preview).clear();
    }

    fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    fn source_root(&self) -> Result<PathBuf> {
        self.config
            .source_dir
            .clone()
            .ok_or_else(|| MediaShelfError::Configuration("No source directory selected".to_string()))
    }

    fn output_root(&self) -> Result<PathBuf> {
        self.config
            .output_dir
            .clone()
            .ok_or_else(|| MediaShelfError::Configuration("No output directory selected".to_string()))
    }

    fn scanner(&self, source: &Path, output: Option<&Path>) -> Result<Scanner> {
        let selection = self.config.selected_extensions();
        if selection.is_empty() {
            return Err(MediaShelfError::Configuration(
                "No file types selected. Please select at least one file type.".to_string(),
            ));
        }
        Scanner::new(source, output, selection, Arc::clone(&self.cancel))
    }
}

fn runtime_handle() -> Result<Handle> {
    Handle::try_current().map_err(|e| MediaShelfError::Worker(e.to_string()))
}

fn lock(cache: &Mutex<PreviewCache>) -> MutexGuard<'_, PreviewCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

fn completion_message(mode: OperationMode, outcome: &RunOutcome) -> String {
    let verb = match mode {
        OperationMode::Copy => "Copied",
        OperationMode::Move => "Moved",
    };
    match outcome.state {
        RunState::Cancelled => format!(
            "Organization stopped. {} {} of {} files ({} failed).",
            verb, outcome.succeeded, outcome.total, outcome.failed
        ),
        _ => format!(
            "Organization complete. {} {} of {} files ({} failed).",
            verb, outcome.succeeded, outcome.total, outcome.failed
        ),
    }
}
