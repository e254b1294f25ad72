// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generated source files on disk.

use ordoplay_shader_graph::transpiler::sanitize_identifier;
use ordoplay_shader_graph::{Graph, SourceSink};
use std::path::{Path, PathBuf};

/// Error writing a generated source
#[derive(Debug, thiserror::Error)]
pub enum SourceCacheError {
    /// Output directory could not be created
    #[error("Failed to create output directory {path:?}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Source file could not be written
    #[error("Failed to write {path:?}: {source}")]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Writes one file per graph stage into a directory
#[derive(Debug, Clone)]
pub struct SourceCache {
    dir: PathBuf,
    prefix: String,
    written: usize,
    unchanged: usize,
}

impl SourceCache {
    /// Cache writing into `dir`, file names starting with `prefix`
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            written: 0,
            unchanged: 0,
        }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a stage of a graph is written to
    pub fn path_for(&self, graph: &str, stage: &str, extension: &str) -> PathBuf {
        let graph = sanitize_identifier(graph);
        let name = if self.prefix.is_empty() {
            format!("{graph}-{stage}{extension}")
        } else {
            format!("{}-{graph}-{stage}{extension}", self.prefix)
        };
        self.dir.join(name)
    }

    /// Files written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Writes skipped because the file already held the same source
    pub fn unchanged(&self) -> usize {
        self.unchanged
    }
}

impl SourceSink for SourceCache {
    type Error = SourceCacheError;

    fn write(&mut self, graph: &Graph, stage: &str, extension: &str, source: &str) -> Result<(), Self::Error> {
        std::fs::create_dir_all(&self.dir).map_err(|source| SourceCacheError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(&graph.name, stage, extension);
        if std::fs::read_to_string(&path).is_ok_and(|existing| existing == source) {
            tracing::debug!("{path:?} is up to date");
            self.unchanged += 1;
            return Ok(());
        }

        std::fs::write(&path, source).map_err(|source| SourceCacheError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!("Wrote {path:?}");
        self.written += 1;
        Ok(())
    }
}
