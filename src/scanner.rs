// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Recursive source scanning
//!
//! When the destination root lies inside the source root, the destination
//! subtree is pruned from the walk so organized files are never picked up
//! again.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::category::ExtensionSet;
use crate::{MediaShelfError, Result};

/// Enumerates selected files under a source root
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    excluded: Option<PathBuf>,
    selection: ExtensionSet,
    cancel: Arc<AtomicBool>,
}

impl Scanner {
    /// Prepare a scan, failing eagerly if the source root cannot be read
    pub fn new(
        source_root: &Path,
        destination_root: Option<&Path>,
        selection: ExtensionSet,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self> {
        std::fs::read_dir(source_root).map_err(|source| MediaShelfError::Scan {
            path: source_root.to_path_buf(),
            source,
        })?;

        let root = resolve_root(source_root);
        let excluded = destination_root
            .map(resolve_root)
            .filter(|dest| is_within(dest, &root));

        if let Some(dest) = &excluded {
            info!("Destination {:?} is inside the source, excluding it from the scan", dest);
        }

        Ok(Self {
            root,
            excluded,
            selection,
            cancel,
        })
    }

    /// Resolved source root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subtree pruned from the walk, if any
    pub fn excluded(&self) -> Option<&Path> {
        self.excluded.as_deref()
    }

    /// Number of files a full walk would yield
    pub fn count(&self) -> usize {
        self.files().count()
    }

    /// Walk the source tree in file-name order.
    ///
    /// Unreadable entries are skipped and the walk stops early once the
    /// cancel flag is set.
    pub fn files(&self) -> impl Iterator<Item = PathBuf> + Send + 'static {
        let excluded = self.excluded.clone();
        let selection = self.selection.clone();
        let cancel = Arc::clone(&self.cancel);

        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !is_pruned(entry, excluded.as_deref()))
            .take_while(move |_| !cancel.load(Ordering::Relaxed))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(DirEntry::into_path)
            .filter(move |path| selection.matches(path))
    }
}

fn is_pruned(entry: &DirEntry, excluded: Option<&Path>) -> bool {
    match excluded {
        Some(dest) => is_within(entry.path(), dest),
        None => false,
    }
}

/// Absolute, normalized form of a root.
///
/// Existing paths are canonicalized. For a path that does not exist yet the
/// deepest existing ancestor is canonicalized and the rest is appended
/// lexically.
pub fn resolve_root(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let lexical = lexical_normalize(&absolute);

    let mut existing = lexical.as_path();
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return lexical,
        }
    }
}

/// Resolve `.` and `..` without touching the file system
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True when `path` equals `root` or lies underneath it.
///
/// Compared component-wise, so trailing separators do not matter, and
/// case-insensitively on Windows and macOS.
pub fn is_within(path: &Path, root: &Path) -> bool {
    let mut path_parts = path.components().filter(|c| !matches!(c, Component::CurDir));
    for root_part in root.components().filter(|c| !matches!(c, Component::CurDir)) {
        match path_parts.next() {
            Some(part) if same_component(part, root_part) => {}
            _ => return false,
        }
    }
    true
}

fn same_component(a: Component<'_>, b: Component<'_>) -> bool {
    if cfg!(any(windows, target_os = "macos")) {
        a.as_os_str().to_string_lossy().to_lowercase() == b.as_os_str().to_string_lossy().to_lowercase()
    } else {
        a == b
    }
}
