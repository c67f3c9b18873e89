// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Copy/move executor with progress reporting and cooperative cancellation
//!
//! Per-file failures are logged and counted; a run never rolls back and never
//! aborts because one file could not be placed. Exactly one terminal
//! [`ProgressItem::Complete`] event closes every run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::OperationMode;
use crate::Result;

/// One planned file operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub source_path: PathBuf,
    /// Relative to the output root, or absolute to bypass it
    pub destination_relative_path: PathBuf,
}

impl PlanEntry {
    pub fn new(source_path: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_relative_path: destination.into(),
        }
    }
}

/// Lifecycle of a long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Summary returned when a run ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub state: RunState,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

/// What a progress event refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressItem {
    File(PathBuf),
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub item: ProgressItem,
}

/// Places files under an output root
#[derive(Debug, Clone)]
pub struct Executor {
    output_root: PathBuf,
    mode: OperationMode,
    cancel: Arc<AtomicBool>,
}

impl Executor {
    pub fn new(output_root: impl Into<PathBuf>, mode: OperationMode, cancel: Arc<AtomicBool>) -> Self {
        Self {
            output_root: output_root.into(),
            mode,
            cancel,
        }
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// Absolute destination for an entry
    pub fn destination_for(&self, entry: &PlanEntry) -> PathBuf {
        if entry.destination_relative_path.is_absolute() {
            entry.destination_relative_path.clone()
        } else {
            self.output_root.join(&entry.destination_relative_path)
        }
    }

    /// Process every entry, reporting after each attempt
    pub fn execute<I, F>(&self, entries: I, total: usize, mut on_progress: F) -> RunOutcome
    where
        I: IntoIterator<Item = PlanEntry>,
        F: FnMut(Progress),
    {
        let mut run = self.start(total);
        for entry in entries {
            if run.should_stop() {
                break;
            }
            run.apply(&entry, &mut on_progress);
        }
        run.finish(&mut on_progress)
    }

    /// Begin a run driven one entry at a time
    pub fn start(&self, total: usize) -> Run<'_> {
        info!("Starting {} of {} files into {:?}", self.mode, total, self.output_root);
        Run {
            executor: self,
            total,
            processed: 0,
            succeeded: 0,
            failed: 0,
            cancelled: false,
        }
    }

    fn place(&self, entry: &PlanEntry) -> Result<PathBuf> {
        let source = &entry.source_path;
        let destination = self.destination_for(entry);

        if !source.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("source file {} does not exist", source.display()),
            )
            .into());
        }

        if same_file(source, &destination) {
            debug!("{:?} is already in place", source);
            return Ok(destination);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        match self.mode {
            OperationMode::Copy => {
                copy_preserving(source, &destination)?;
                info!("Copied {:?} to {:?}", source, destination);
            }
            OperationMode::Move => {
                move_file(source, &destination)?;
                info!("Moved {:?} to {:?}", source, destination);
            }
        }

        Ok(destination)
    }
}

/// An in-progress executor run
pub struct Run<'a> {
    executor: &'a Executor,
    total: usize,
    processed: usize,
    succeeded: usize,
    failed: usize,
    cancelled: bool,
}

impl Run<'_> {
    /// Poll the cancel flag; call once per iteration
    pub fn should_stop(&mut self) -> bool {
        if self.executor.cancel.load(Ordering::Relaxed) {
            if !self.cancelled {
                info!("Organization stopped by user");
            }
            self.cancelled = true;
        }
        self.cancelled
    }

    /// Attempt one entry and report progress whatever the result
    pub fn apply<F: FnMut(Progress)>(&mut self, entry: &PlanEntry, on_progress: &mut F) {
        match self.executor.place(entry) {
            Ok(_) => self.succeeded += 1,
            Err(e) => {
                error!("Error processing file {:?}: {}", entry.source_path, e);
                self.failed += 1;
            }
        }
        self.processed += 1;
        on_progress(Progress {
            processed: self.processed,
            total: self.total,
            item: ProgressItem::File(entry.source_path.clone()),
        });
    }

    /// Emit the terminal event and summarize
    pub fn finish<F: FnMut(Progress)>(self, on_progress: &mut F) -> RunOutcome {
        on_progress(Progress {
            processed: self.processed,
            total: self.total,
            item: ProgressItem::Complete,
        });

        let state = if self.cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        info!(
            "{} operation {:?}. Processed {} files ({} failed).",
            self.executor.mode, state, self.processed, self.failed
        );

        RunOutcome {
            state,
            processed: self.processed,
            succeeded: self.succeeded,
            failed: self.failed,
            total: self.total,
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy contents and permissions, then carry over access and modification times
pub fn copy_preserving(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination)?;
    let meta = fs::metadata(source)?;
    let atime = filetime::FileTime::from_last_access_time(&meta);
    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    if let Err(e) = filetime::set_file_times(destination, atime, mtime) {
        warn!("Could not preserve timestamps on {:?}: {}", destination, e);
    }
    Ok(())
}

/// Rename, falling back to copy and remove when crossing devices
pub fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("Rename of {:?} failed ({}), copying instead", source, e);
            copy_preserving(source, destination)?;
            if let Err(e) = fs::remove_file(source) {
                warn!("Could not remove {:?} after copying ({}), discarding the copy", source, e);
                if let Err(cleanup) = fs::remove_file(destination) {
                    error!("{:?} is now duplicated at {:?}: {}", source, destination, cleanup);
                }
                return Err(e);
            }
            Ok(())
        }
    }
}
