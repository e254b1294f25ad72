// SPDX-License-Identifier: MIT OR Apache-2.0
//! User shading libraries and their reflection cache.

use crate::reflection::{reflect_file, ReflectionError};
use crate::signature::{Signature, StructDefinition};
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A reflected user library
#[derive(Debug, Clone)]
pub struct Library {
    /// Root file of the library
    pub path: PathBuf,
    /// Functions keyed by name, or declaration for overloads
    pub functions: IndexMap<String, Signature>,
    /// Structures keyed by name
    pub structs: IndexMap<String, StructDefinition>,
    /// Every file read while reflecting, root first
    pub included_paths: IndexSet<PathBuf>,
    /// When reflection finished
    pub reflected_at: SystemTime,
}

impl Library {
    /// Reflect a library file and its transitive includes
    pub fn reflect(path: &Path, include_dirs: &[PathBuf]) -> Result<Self, ReflectionError> {
        let reflection = reflect_file(path, include_dirs)?;
        Ok(Self {
            path: path.to_path_buf(),
            functions: reflection.functions,
            structs: reflection.structs,
            included_paths: reflection.paths,
            reflected_at: SystemTime::now(),
        })
    }

    /// Whether any file of the library was modified after `checkpoint`.
    ///
    /// Files that can no longer be read are skipped.
    pub fn is_stale(&self, checkpoint: SystemTime) -> bool {
        self.included_paths
            .iter()
            .any(|path| modified_after(path, checkpoint))
    }
}

fn modified_after(path: &Path, checkpoint: SystemTime) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .is_ok_and(|modified| modified > checkpoint)
}

/// Reflection cache keyed by library path.
///
/// A path whose reflection fails keeps its last good reflection. A path that
/// has never reflected successfully is retried once its file changes.
#[derive(Debug, Default)]
pub struct LibraryRegistry {
    include_dirs: Vec<PathBuf>,
    entries: IndexMap<PathBuf, Library>,
    pending: IndexSet<PathBuf>,
    failed: IndexSet<PathBuf>,
}

impl LibraryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the directories searched for includes
    pub fn with_include_dirs(mut self, include_dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = include_dirs;
        self
    }

    /// Directories searched for includes
    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    /// Get a cached library
    pub fn get(&self, path: &Path) -> Option<&Library> {
        self.entries.get(path)
    }

    /// Cached library paths
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Queue a path for reflection if it is not known yet
    pub fn track(&mut self, path: &Path) {
        if !self.entries.contains_key(path) && !self.failed.contains(path) {
            self.pending.insert(path.to_path_buf());
        }
    }

    /// Paths queued for reflection
    pub fn pending(&self) -> impl Iterator<Item = &Path> {
        self.pending.iter().map(PathBuf::as_path)
    }

    /// Paths that have never reflected successfully
    pub fn failed(&self) -> impl Iterator<Item = &Path> {
        self.failed.iter().map(PathBuf::as_path)
    }

    /// Return the cached library, reflecting it first if needed
    pub fn reflect(&mut self, path: &Path) -> Result<&Library, ReflectionError> {
        if self.entries.contains_key(path) {
            return Ok(&self.entries[path]);
        }
        self.refresh(path)
    }

    /// Reflect a path unconditionally and replace the cache entry
    pub fn refresh(&mut self, path: &Path) -> Result<&Library, ReflectionError> {
        self.pending.swap_remove(path);
        match Library::reflect(path, &self.include_dirs) {
            Ok(library) => {
                tracing::info!(
                    "Reflected library {path:?}: {} functions, {} structs",
                    library.functions.len(),
                    library.structs.len()
                );
                self.failed.swap_remove(path);
                self.entries.insert(path.to_path_buf(), library);
                Ok(&self.entries[path])
            }
            Err(err) => {
                tracing::error!("Failed to reflect library {path:?}: {err}");
                if !self.entries.contains_key(path) {
                    self.failed.insert(path.to_path_buf());
                }
                Err(err)
            }
        }
    }

    /// Paths whose files changed after `checkpoint`
    pub fn stale(&self, checkpoint: SystemTime) -> Vec<PathBuf> {
        let cached = self
            .entries
            .values()
            .filter(|library| library.is_stale(checkpoint))
            .map(|library| library.path.clone());
        let failed = self
            .failed
            .iter()
            .filter(|path| modified_after(path, checkpoint))
            .cloned();
        cached.chain(failed).collect()
    }

    /// Drop every path not in `referenced`, returning the evicted paths
    pub fn retain(&mut self, referenced: &IndexSet<PathBuf>) -> Vec<PathBuf> {
        let evicted: Vec<PathBuf> = self
            .entries
            .keys()
            .chain(self.failed.iter())
            .filter(|path| !referenced.contains(*path))
            .cloned()
            .collect();
        for path in &evicted {
            tracing::debug!("Evicting unreferenced library {path:?}");
            self.entries.shift_remove(path);
            self.failed.shift_remove(path);
        }
        self.pending.retain(|path| referenced.contains(path));
        evicted
    }

    /// Forget every library
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
        self.failed.clear();
    }
}
