// SPDX-License-Identifier: MIT OR Apache-2.0
//! A loaded generator configuration and the state compiled from it.

use crate::config::ShadergenConfig;
use crate::source_cache::{SourceCache, SourceCacheError};
use ordoplay_shader_graph::transpiler::sanitize_identifier;
use ordoplay_shader_graph::{
    ChangeTracker, CompileError, DocumentError, GraphDocument, LibraryRegistry, PipelineError, TickReport,
    TrackerError, Workspace, WorkspaceError,
};
use std::collections::HashMap;
use std::path::PathBuf;

/// Error running the generator
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A pipeline definition could not be loaded
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A graph document could not be read
    #[error("Failed to load graph {path:?}: {source}")]
    Document {
        /// Document path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: DocumentError,
    },

    /// A graph could not be added to the workspace
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// A watched file could not be reloaded
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// A graph failed to compile
    #[error("Graph {graph:?} failed to compile: {source}")]
    Compile {
        /// Graph name
        graph: String,
        /// Underlying error
        #[source]
        source: CompileError,
    },

    /// A generated source could not be written
    #[error(transparent)]
    Cache(#[from] SourceCacheError),

    /// Two graphs would write the same output files
    #[error("Graphs {first:?} and {second:?} map to the same output file name")]
    OutputCollision {
        /// Graph loaded first
        first: String,
        /// Graph loaded second
        second: String,
    },
}

/// Workspace, tracker and output cache for one configuration
#[derive(Debug)]
pub struct Session {
    workspace: Workspace,
    tracker: ChangeTracker,
    cache: SourceCache,
}

impl Session {
    /// Load every pipeline and graph the configuration lists
    pub fn open(config: &ShadergenConfig) -> Result<Self, SessionError> {
        let libraries = LibraryRegistry::new().with_include_dirs(config.include_dirs.clone());
        let mut workspace = Workspace::new().with_libraries(libraries);

        for path in &config.pipelines {
            let name = workspace.pipelines_mut().load(path)?;
            tracing::debug!("Loaded pipeline {name:?} from {path:?}");
        }
        for path in &config.graphs {
            let document = GraphDocument::load(path).map_err(|source| SessionError::Document {
                path: path.clone(),
                source,
            })?;
            workspace.load_graph(&document)?;
        }
        check_output_names(&workspace)?;

        Ok(Self {
            workspace,
            tracker: ChangeTracker::new().with_interval(config.tick_interval()),
            cache: SourceCache::new(config.generated_dir.as_path(), config.file_prefix.as_str()),
        })
    }

    /// The workspace
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Compile every graph once and write the results.
    ///
    /// Fails on the first library or compile error.
    pub fn build(&mut self) -> Result<usize, SessionError> {
        let report = self.tracker.setup(&mut self.workspace)?;
        self.fail_on_compile_errors(report)?;
        let written = self.workspace.write_pending(&mut self.cache)?;
        tracing::info!(
            "Built {} graphs into {:?}: {} written, {} unchanged",
            self.workspace.graph_ids().len(),
            self.cache.dir(),
            self.cache.written(),
            self.cache.unchanged()
        );
        Ok(written)
    }

    /// Run one watch step: reload what changed and write fresh sources.
    ///
    /// Reload and compile failures are logged; the step still writes every
    /// graph that compiled. Returns the delay before the next step.
    pub fn step(&mut self) -> Result<std::time::Duration, SessionError> {
        let next = match self.tracker.tick(&mut self.workspace) {
            Ok(report) => {
                for (id, err) in &report.failed_graphs {
                    let name = self.workspace.graph(*id).map_or("?", |g| g.name.as_str());
                    tracing::error!("Graph {name:?} failed to compile: {err}");
                }
                report.next_tick
            }
            Err(err) => {
                tracing::error!("{err}");
                self.tracker.interval()
            }
        };
        self.workspace.write_pending(&mut self.cache)?;
        Ok(next)
    }

    /// Poll for changes until `ticks` steps ran, or forever without a limit
    pub fn watch(&mut self, ticks: Option<u64>) -> Result<(), SessionError> {
        tracing::info!(
            "Watching {} graphs every {:?}",
            self.workspace.graph_ids().len(),
            self.tracker.interval()
        );
        let mut remaining = ticks;
        while remaining != Some(0) {
            let next = self.step()?;
            if let Some(n) = remaining.as_mut() {
                *n -= 1;
            }
            if remaining != Some(0) {
                std::thread::sleep(next);
            }
        }
        Ok(())
    }

    fn fail_on_compile_errors(&self, report: TickReport) -> Result<(), SessionError> {
        match report.failed_graphs.into_iter().next() {
            Some((id, source)) => Err(SessionError::Compile {
                graph: self
                    .workspace
                    .graph(id)
                    .map(|g| g.name.clone())
                    .unwrap_or_default(),
                source,
            }),
            None => Ok(()),
        }
    }
}

fn check_output_names(workspace: &Workspace) -> Result<(), SessionError> {
    let mut stems: HashMap<String, &str> = HashMap::new();
    for graph in workspace.graphs() {
        if let Some(first) = stems.insert(sanitize_identifier(&graph.name), &graph.name) {
            return Err(SessionError::OutputCollision {
                first: first.to_string(),
                second: graph.name.clone(),
            });
        }
    }
    Ok(())
}
