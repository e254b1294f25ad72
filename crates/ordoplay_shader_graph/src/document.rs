// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-disk graph documents.
//!
//! Documents refer to nodes and sockets by name and to functions by
//! namespace key, so they stay readable and survive library edits.
//! Signature snapshots are rebuilt when a document is instantiated.

use crate::graph::Graph;
use crate::node::{Node, NodeId, NodeKind, SetupContext};
use crate::nodes::{CustomParameter, InlineNode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current graph document format version
pub const GRAPH_FORMAT_VERSION: u32 = 1;

/// Serialized node variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKindDocument {
    /// Function call by namespace key
    Function {
        /// Namespace key
        key: String,
    },
    /// Structure construction
    Struct {
        /// Structure type name
        struct_type: String,
    },
    /// Stage terminal
    Io {
        /// Stage name
        stage: String,
        /// Output terminal when true
        is_output: bool,
        /// Custom parameters in order
        #[serde(default)]
        custom_parameters: Vec<CustomParameter>,
    },
    /// Inline code
    Inline(InlineNode),
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Node name, unique within the document
    pub name: String,
    /// Variant data
    pub kind: NodeKindDocument,
    /// Literal defaults for unlinked inputs
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub defaults: IndexMap<String, String>,
}

/// Serialized link, by node and socket names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDocument {
    /// Source node name
    pub from: String,
    /// Source output socket
    pub from_socket: String,
    /// Target node name
    pub to: String,
    /// Target input socket
    pub to_socket: String,
}

/// A graph as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Format version
    pub version: u32,
    /// Graph name
    pub name: String,
    /// Pipeline name
    pub pipeline: String,
    /// User library, relative to the document when loaded from disk
    #[serde(default)]
    pub library: Option<PathBuf>,
    /// Nodes in order
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    /// Links
    #[serde(default)]
    pub links: Vec<LinkDocument>,
}

/// Error reading, writing or instantiating a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// File could not be read or written
    #[error("Failed to access graph document {path:?}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid document
    #[error("Invalid graph document: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Document could not be serialized
    #[error("Failed to serialize graph document: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Graph document version {0} is newer than supported version {GRAPH_FORMAT_VERSION}")]
    UnsupportedVersion(u32),

    /// Two nodes share a name
    #[error("Duplicate node name {0:?}")]
    DuplicateNode(String),

    /// A link names a node that does not exist
    #[error("Link refers to unknown node {0:?}")]
    UnknownNode(String),
}

impl GraphDocument {
    /// Create an empty document
    pub fn new(name: impl Into<String>, pipeline: impl Into<String>) -> Self {
        Self {
            version: GRAPH_FORMAT_VERSION,
            name: name.into(),
            pipeline: pipeline.into(),
            library: None,
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Capture a graph
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| NodeDocument {
                name: node.name.clone(),
                kind: match &node.kind {
                    NodeKind::Function(function) => NodeKindDocument::Function {
                        key: function.key.clone(),
                    },
                    NodeKind::Struct(structure) => NodeKindDocument::Struct {
                        struct_type: structure.struct_type.clone(),
                    },
                    NodeKind::Io(io) => NodeKindDocument::Io {
                        stage: io.stage.clone(),
                        is_output: io.is_output,
                        custom_parameters: io.custom_parameters().to_vec(),
                    },
                    NodeKind::Inline(inline) => NodeKindDocument::Inline(inline.clone()),
                },
                defaults: node.input_defaults.clone(),
            })
            .collect();

        let name_of = |id: NodeId| graph.node(id).map(|n| n.name.clone()).unwrap_or_default();
        let links = graph
            .links()
            .map(|link| LinkDocument {
                from: name_of(link.from_node),
                from_socket: link.from_socket.clone(),
                to: name_of(link.to_node),
                to_socket: link.to_socket.clone(),
            })
            .collect();

        Self {
            version: GRAPH_FORMAT_VERSION,
            name: graph.name.clone(),
            pipeline: graph.pipeline.clone(),
            library: graph.library.clone(),
            nodes,
            links,
        }
    }

    /// Parse a document from RON text
    pub fn from_ron(source: &str) -> Result<Self, DocumentError> {
        let document: Self = ron::from_str(source)?;
        if document.version > GRAPH_FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion(document.version));
        }
        Ok(document)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, DocumentError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load a document, resolving a relative library path against its directory
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document = Self::from_ron(&content)?;
        if let (Some(library), Some(dir)) = (&document.library, path.parent()) {
            if library.is_relative() {
                document.library = Some(dir.join(library));
            }
        }
        Ok(document)
    }

    /// Save a document
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let content = self.to_ron()?;
        std::fs::write(path, content).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build a live graph.
    ///
    /// Links that no longer fit the namespace are dropped with a warning.
    pub fn instantiate(&self, ctx: &SetupContext<'_>) -> Result<Graph, DocumentError> {
        let mut graph = Graph::new(self.name.as_str(), self.pipeline.as_str());
        graph.library.clone_from(&self.library);

        graph.suppress_updates(ctx, |graph| {
            let mut ids: IndexMap<&str, NodeId> = IndexMap::new();
            for document in &self.nodes {
                if ids.contains_key(document.name.as_str()) {
                    return Err(DocumentError::DuplicateNode(document.name.clone()));
                }
                let mut node = match &document.kind {
                    NodeKindDocument::Function { key } => Node::function(document.name.as_str(), key.as_str()),
                    NodeKindDocument::Struct { struct_type } => {
                        Node::structure(document.name.as_str(), struct_type.as_str())
                    }
                    NodeKindDocument::Io {
                        stage,
                        is_output,
                        custom_parameters,
                    } => {
                        let mut node = Node::io(document.name.as_str(), stage.as_str(), *is_output);
                        if let Some(io) = node.kind.as_io_mut() {
                            io.set_custom_parameters(custom_parameters.clone());
                        }
                        node
                    }
                    NodeKindDocument::Inline(inline) => Node::inline(document.name.as_str(), inline.clone()),
                };
                node.input_defaults.clone_from(&document.defaults);
                ids.insert(document.name.as_str(), graph.add_node(node, ctx));
            }

            for link in &self.links {
                let from = *ids
                    .get(link.from.as_str())
                    .ok_or_else(|| DocumentError::UnknownNode(link.from.clone()))?;
                let to = *ids
                    .get(link.to.as_str())
                    .ok_or_else(|| DocumentError::UnknownNode(link.to.clone()))?;
                if let Err(err) = graph.connect(from, &link.from_socket, to, &link.to_socket, ctx) {
                    tracing::warn!(
                        "Dropping link {}.{} -> {}.{} in graph {:?}: {err}",
                        link.from,
                        link.from_socket,
                        link.to,
                        link.to_socket,
                        self.name
                    );
                }
            }
            Ok(())
        })?;

        Ok(graph)
    }
}
