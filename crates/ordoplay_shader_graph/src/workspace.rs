// SPDX-License-Identifier: MIT OR Apache-2.0
//! All live graphs plus the pipelines and libraries they compile against.

use crate::compiler::CompileError;
use crate::document::{DocumentError, GraphDocument};
use crate::graph::{Graph, GraphId};
use crate::library::LibraryRegistry;
use crate::namespace::Namespace;
use crate::node::SetupContext;
use crate::pipeline::PipelineRegistry;
use crate::reflection::ReflectionError;
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};

/// Destination for generated sources
pub trait SourceSink {
    /// Error writing a source
    type Error;

    /// Store the source of one stage of a graph
    fn write(&mut self, graph: &Graph, stage: &str, extension: &str, source: &str) -> Result<(), Self::Error>;
}

/// Error operating on the workspace
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// No graph with this ID
    #[error("Unknown graph {0:?}")]
    UnknownGraph(GraphId),

    /// The graph's pipeline is not registered
    #[error("Unknown pipeline {0:?}")]
    UnknownPipeline(String),

    /// The graph failed to compile
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A graph document could not be loaded
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// A library could not be reflected
    #[error("Failed to reflect library {path:?}: {source}")]
    Library {
        /// Library path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: ReflectionError,
    },
}

/// Graphs, pipelines and libraries
#[derive(Debug, Default)]
pub struct Workspace {
    pipelines: PipelineRegistry,
    libraries: LibraryRegistry,
    graphs: IndexMap<GraphId, Graph>,
}

impl Workspace {
    /// Create an empty workspace
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured library registry
    pub fn with_libraries(mut self, libraries: LibraryRegistry) -> Self {
        self.libraries = libraries;
        self
    }

    /// Registered pipelines
    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    /// Mutable registered pipelines
    pub fn pipelines_mut(&mut self) -> &mut PipelineRegistry {
        &mut self.pipelines
    }

    /// Library reflection cache
    pub fn libraries(&self) -> &LibraryRegistry {
        &self.libraries
    }

    /// Mutable library reflection cache
    pub fn libraries_mut(&mut self) -> &mut LibraryRegistry {
        &mut self.libraries
    }

    /// Add a graph; its library is queued for reflection
    pub fn add_graph(&mut self, graph: Graph) -> GraphId {
        if let Some(library) = &graph.library {
            self.libraries.track(library);
        }
        let id = graph.id;
        self.graphs.insert(id, graph);
        id
    }

    /// Instantiate a document and add the resulting graph.
    ///
    /// A library that fails to reflect leaves the graph's nodes unresolved;
    /// the failure is reported by the next tracker setup.
    pub fn load_graph(&mut self, document: &GraphDocument) -> Result<GraphId, WorkspaceError> {
        if let Some(library) = &document.library {
            if let Err(err) = self.libraries.reflect(library) {
                tracing::warn!("Loading graph {:?} without its library: {err}", document.name);
            }
        }
        let pipeline = self
            .pipelines
            .get(&document.pipeline)
            .ok_or_else(|| WorkspaceError::UnknownPipeline(document.pipeline.clone()))?;
        let library = document.library.as_deref().and_then(|p| self.libraries.get(p));
        let namespace = Namespace::merge(Some(pipeline), library);
        let graph = document.instantiate(&SetupContext::new(&namespace, pipeline))?;
        tracing::info!("Loaded graph {:?} ({} nodes)", graph.name, graph.node_count());
        Ok(self.add_graph(graph))
    }

    /// Remove a graph
    pub fn remove_graph(&mut self, id: GraphId) -> Option<Graph> {
        self.graphs.shift_remove(&id)
    }

    /// Get a graph
    pub fn graph(&self, id: GraphId) -> Option<&Graph> {
        self.graphs.get(&id)
    }

    /// Get a graph by name
    pub fn graph_by_name(&self, name: &str) -> Option<&Graph> {
        self.graphs.values().find(|g| g.name == name)
    }

    /// All graphs
    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.graphs.values()
    }

    /// All graph IDs
    pub fn graph_ids(&self) -> Vec<GraphId> {
        self.graphs.keys().copied().collect()
    }

    /// Whether a graph's pipeline is registered
    pub fn is_active(&self, id: GraphId) -> bool {
        self.graphs
            .get(&id)
            .is_some_and(|g| self.pipelines.get(&g.pipeline).is_some())
    }

    /// Namespace a graph resolves names in
    pub fn namespace(&self, id: GraphId) -> Result<Namespace, WorkspaceError> {
        let graph = self.graphs.get(&id).ok_or(WorkspaceError::UnknownGraph(id))?;
        let pipeline = self
            .pipelines
            .get(&graph.pipeline)
            .ok_or_else(|| WorkspaceError::UnknownPipeline(graph.pipeline.clone()))?;
        let library = graph.library.as_deref().and_then(|p| self.libraries.get(p));
        Ok(Namespace::merge(Some(pipeline), library))
    }

    /// Run edits on a graph with its current setup context
    pub fn edit<R>(
        &mut self,
        id: GraphId,
        f: impl FnOnce(&mut Graph, &SetupContext<'_>) -> R,
    ) -> Result<R, WorkspaceError> {
        let graph = self.graphs.get_mut(&id).ok_or(WorkspaceError::UnknownGraph(id))?;
        let pipeline = self
            .pipelines
            .get(&graph.pipeline)
            .ok_or_else(|| WorkspaceError::UnknownPipeline(graph.pipeline.clone()))?;
        let library = graph.library.as_deref().and_then(|p| self.libraries.get(p));
        let namespace = Namespace::merge(Some(pipeline), library);
        Ok(f(graph, &SetupContext::new(&namespace, pipeline)))
    }

    /// Point a graph at a different library and reload it.
    ///
    /// The graph is reloaded even when the new library fails to reflect, and
    /// the reflection error is returned afterwards.
    pub fn set_library(&mut self, id: GraphId, library: Option<PathBuf>) -> Result<(), WorkspaceError> {
        let graph = self.graphs.get_mut(&id).ok_or(WorkspaceError::UnknownGraph(id))?;
        graph.library.clone_from(&library);
        let reflected = match library {
            Some(path) if self.libraries.get(&path).is_none() => self
                .libraries
                .reflect(&path)
                .map(|_| ())
                .map_err(|source| WorkspaceError::Library { path, source }),
            _ => Ok(()),
        };
        self.reload_graph(id)?;
        reflected
    }

    /// Re-run node setup against the current namespace and recompile
    pub fn reload_graph(&mut self, id: GraphId) -> Result<(), WorkspaceError> {
        Ok(self.edit(id, |graph, ctx| graph.reload_nodes(ctx))??)
    }

    /// Validate links and recompile
    pub fn update_graph(&mut self, id: GraphId) -> Result<(), WorkspaceError> {
        Ok(self.edit(id, |graph, ctx| graph.update(ctx))??)
    }

    /// Compile one stage of a graph
    pub fn compile(&self, id: GraphId, stage: &str) -> Result<String, WorkspaceError> {
        let graph = self.graphs.get(&id).ok_or(WorkspaceError::UnknownGraph(id))?;
        let pipeline = self
            .pipelines
            .get(&graph.pipeline)
            .ok_or_else(|| WorkspaceError::UnknownPipeline(graph.pipeline.clone()))?;
        let namespace = self.namespace(id)?;
        Ok(graph.compile(stage, &SetupContext::new(&namespace, pipeline))?)
    }

    /// Libraries used by active graphs
    pub fn referenced_libraries(&self) -> IndexSet<PathBuf> {
        self.graphs
            .values()
            .filter(|g| self.pipelines.get(&g.pipeline).is_some())
            .filter_map(|g| g.library.clone())
            .collect()
    }

    /// Active graphs using any of the given pipelines or libraries
    pub fn graphs_using(&self, pipelines: &[String], libraries: &[PathBuf]) -> Vec<GraphId> {
        self.graphs
            .values()
            .filter(|g| self.pipelines.get(&g.pipeline).is_some())
            .filter(|g| {
                pipelines.contains(&g.pipeline)
                    || g.library.as_deref().is_some_and(|l| libraries.iter().any(|p| p == l))
            })
            .map(|g| g.id)
            .collect()
    }

    /// Graphs using a library
    pub fn graphs_using_library(&self, library: &Path) -> Vec<GraphId> {
        self.graphs
            .values()
            .filter(|g| g.library.as_deref() == Some(library))
            .map(|g| g.id)
            .collect()
    }

    /// Write every changed stage source to `sink`, returning how many were written
    pub fn write_pending<S: SourceSink>(&mut self, sink: &mut S) -> Result<usize, S::Error> {
        let mut written = 0;
        for graph in self.graphs.values_mut() {
            if !graph.has_pending_write() {
                continue;
            }
            let Some(pipeline) = self.pipelines.get(&graph.pipeline) else {
                continue;
            };
            for (stage, source) in graph.generated_sources() {
                let extension = pipeline
                    .stage(stage)
                    .map_or("", |s| s.file_extension.as_str());
                sink.write(graph, stage, extension, source)?;
                written += 1;
            }
            graph.mark_written();
        }
        Ok(written)
    }

    /// Drop every graph, pipeline and library
    pub fn clear(&mut self) {
        self.graphs.clear();
        self.pipelines.clear();
        self.libraries.clear();
    }
}
