// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and links.
//!
//! Every mutation runs the update hook: links are revalidated and every
//! stage is recompiled. Batch edits wrap their mutations in
//! [`Graph::suppress_updates`] so the hook runs once at the end.

use crate::compiler::{compile_all, compile_stage, CompileError};
use crate::link::{Link, LinkId};
use crate::namespace::Namespace;
use crate::node::{Node, NodeId, SetupContext};
use crate::nodes::CustomParameterError;
use crate::transpiler::sanitize_identifier;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

/// A shader graph
#[derive(Debug, Clone)]
pub struct Graph {
    /// Unique graph ID
    pub id: GraphId,
    /// Graph name
    pub name: String,
    /// Name of the pipeline this graph compiles against
    pub pipeline: String,
    /// User library file
    pub library: Option<PathBuf>,
    nodes: IndexMap<NodeId, Node>,
    links: IndexMap<LinkId, Link>,
    updates_suppressed: bool,
    generated: IndexMap<String, String>,
    pending_write: bool,
    last_error: Option<String>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>, pipeline: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            pipeline: pipeline.into(),
            library: None,
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            updates_suppressed: false,
            generated: IndexMap::new(),
            pending_write: false,
            last_error: None,
        }
    }

    /// Set the user library
    pub fn with_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.library = Some(path.into());
        self
    }

    /// Generated variables derive from the sanitized name, so two names
    /// that sanitize alike count as the same name.
    fn unique_name(&self, base: &str, except: Option<NodeId>) -> String {
        let taken = |name: &str| {
            let identifier = sanitize_identifier(name);
            self.nodes
                .values()
                .any(|n| Some(n.id) != except && sanitize_identifier(&n.name) == identifier)
        };
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base}.{i:03}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Add a node, renaming it if its name is taken
    pub fn add_node(&mut self, mut node: Node, ctx: &SetupContext<'_>) -> NodeId {
        node.name = self.unique_name(&node.name, None);
        node.setup(ctx);
        let id = node.id;
        tracing::debug!("Added node {:?} to graph {:?}", node.name, self.name);
        self.nodes.insert(id, node);
        self.on_changed(ctx);
        id
    }

    /// Remove a node and its links
    pub fn remove_node(&mut self, node_id: NodeId, ctx: &SetupContext<'_>) -> Option<Node> {
        let node = self.nodes.shift_remove(&node_id)?;
        self.links.retain(|_, link| !link.involves_node(node_id));
        self.on_changed(ctx);
        Some(node)
    }

    /// Rename a node, returning the name actually given
    pub fn rename_node(
        &mut self,
        node_id: NodeId,
        name: &str,
        ctx: &SetupContext<'_>,
    ) -> Result<String, NodeError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(NodeError::NodeNotFound(node_id));
        }
        let name = self.unique_name(name, Some(node_id));
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.name = name.clone();
        }
        self.on_changed(ctx);
        Ok(name)
    }

    /// Set the literal used by an unlinked input
    pub fn set_input_default(
        &mut self,
        node_id: NodeId,
        socket: &str,
        literal: impl Into<String>,
        ctx: &SetupContext<'_>,
    ) -> Result<(), NodeError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(NodeError::NodeNotFound(node_id))?;
        if node.input(socket).is_none() {
            return Err(NodeError::SocketNotFound {
                node: node_id,
                socket: socket.to_string(),
            });
        }
        node.input_defaults.insert(socket.to_string(), literal.into());
        self.on_changed(ctx);
        Ok(())
    }

    /// Add a custom parameter to an IO terminal and return its name
    pub fn add_custom_parameter(
        &mut self,
        node_id: NodeId,
        name: Option<&str>,
        ty: &str,
        ctx: &SetupContext<'_>,
    ) -> Result<String, NodeError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(NodeError::NodeNotFound(node_id))?;
        let io = node
            .kind
            .as_io_mut()
            .ok_or(NodeError::NotAnIoTerminal(node_id))?;
        let name = io.add_custom_parameter(name, ty)?;
        node.setup(ctx);
        self.on_changed(ctx);
        Ok(name)
    }

    /// Remove a custom parameter from an IO terminal
    pub fn remove_custom_parameter(
        &mut self,
        node_id: NodeId,
        name: &str,
        ctx: &SetupContext<'_>,
    ) -> Result<bool, NodeError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(NodeError::NodeNotFound(node_id))?;
        let io = node
            .kind
            .as_io_mut()
            .ok_or(NodeError::NotAnIoTerminal(node_id))?;
        let removed = io.remove_custom_parameter(name);
        if removed {
            node.setup(ctx);
            self.on_changed(ctx);
        }
        Ok(removed)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a node by name
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.name == name)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Link an output socket to an input socket
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_socket: &str,
        to_node: NodeId,
        to_socket: &str,
        ctx: &SetupContext<'_>,
    ) -> Result<LinkId, ConnectionError> {
        // Validate nodes exist
        let source_node = self
            .nodes
            .get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self
            .nodes
            .get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;

        // Validate sockets exist
        let source = source_node
            .output(from_socket)
            .ok_or_else(|| ConnectionError::SocketNotFound {
                node: from_node,
                socket: from_socket.to_string(),
            })?;
        let target = target_node
            .input(to_socket)
            .ok_or_else(|| ConnectionError::SocketNotFound {
                node: to_node,
                socket: to_socket.to_string(),
            })?;

        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        if !source.can_link_to(target, ctx.namespace) {
            return Err(ConnectionError::IncompatibleSockets {
                from_type: source.data_type.clone(),
                to_type: target.data_type.clone(),
            });
        }

        // Inputs take a single link
        if self.incoming_link(to_node, to_socket).is_some() {
            return Err(ConnectionError::SocketAlreadyLinked {
                node: to_node,
                socket: to_socket.to_string(),
            });
        }

        let link = Link::new(from_node, from_socket, to_node, to_socket);
        let id = link.id;
        self.links.insert(id, link);
        self.on_changed(ctx);
        Ok(id)
    }

    /// Remove a link
    pub fn disconnect(&mut self, link_id: LinkId, ctx: &SetupContext<'_>) -> Option<Link> {
        let link = self.links.shift_remove(&link_id)?;
        self.on_changed(ctx);
        Some(link)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// The link feeding an input socket
    pub fn incoming_link(&self, node_id: NodeId, socket: &str) -> Option<&Link> {
        self.links.values().find(|l| l.targets(node_id, socket))
    }

    /// Links leaving an output socket
    pub fn links_from<'a>(&'a self, node_id: NodeId, socket: &'a str) -> impl Iterator<Item = &'a Link> {
        self.links
            .values()
            .filter(move |l| l.from_node == node_id && l.from_socket == socket)
    }

    /// Links involving a node
    pub fn links_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.involves_node(node_id))
    }

    /// Remove every link whose sockets vanished or became incompatible
    pub fn validate_links(&mut self, namespace: &Namespace) -> Vec<LinkId> {
        let nodes = &self.nodes;
        let invalid: Vec<LinkId> = self
            .links
            .values()
            .filter(|link| {
                let source = nodes.get(&link.from_node).and_then(|n| n.output(&link.from_socket));
                let target = nodes.get(&link.to_node).and_then(|n| n.input(&link.to_socket));
                match (source, target) {
                    (Some(source), Some(target)) => !source.can_link_to(target, namespace),
                    _ => true,
                }
            })
            .map(|link| link.id)
            .collect();

        for id in &invalid {
            if let Some(link) = self.links.shift_remove(id) {
                tracing::debug!(
                    "Removed invalid link {:?} -> {:?} in graph {:?}",
                    link.from_socket,
                    link.to_socket,
                    self.name
                );
            }
        }
        invalid
    }

    /// Re-run setup on every node, then update once
    pub fn reload_nodes(&mut self, ctx: &SetupContext<'_>) -> Result<(), CompileError> {
        for node in self.nodes.values_mut() {
            node.setup(ctx);
        }
        if self.updates_suppressed {
            return Ok(());
        }
        self.update(ctx)
    }

    /// Run a batch of mutations with the update hook deferred to the end
    pub fn suppress_updates<R>(&mut self, ctx: &SetupContext<'_>, f: impl FnOnce(&mut Self) -> R) -> R {
        let outer = !self.updates_suppressed;
        self.updates_suppressed = true;
        let result = f(self);
        if outer {
            self.updates_suppressed = false;
            self.on_changed(ctx);
        }
        result
    }

    /// Whether updates are currently deferred
    pub fn updates_suppressed(&self) -> bool {
        self.updates_suppressed
    }

    fn on_changed(&mut self, ctx: &SetupContext<'_>) {
        if self.updates_suppressed {
            return;
        }
        // Failures are logged and kept in last_error
        let _ = self.update(ctx);
    }

    /// Validate links and recompile every stage.
    ///
    /// Sources are only marked for writing when their text changed.
    pub fn update(&mut self, ctx: &SetupContext<'_>) -> Result<(), CompileError> {
        self.validate_links(ctx.namespace);
        match compile_all(self, ctx) {
            Ok(generated) => {
                if generated != self.generated {
                    self.generated = generated;
                    self.pending_write = true;
                }
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Failed to compile graph {:?}: {err}", self.name);
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// The output terminal a stage compiles from
    pub fn output_terminal(&self, stage: &str) -> Option<&Node> {
        let mut terminals = self.nodes.values().filter(|n| {
            n.kind
                .as_io()
                .is_some_and(|io| io.is_output && io.stage == stage)
        });
        let first = terminals.next()?;
        if terminals.next().is_some() {
            tracing::warn!(
                "Graph {:?} has several outputs for stage {stage:?}, using {:?}",
                self.name,
                first.name
            );
        }
        Some(first)
    }

    /// Compile one stage to source text
    pub fn compile(&self, stage: &str, ctx: &SetupContext<'_>) -> Result<String, CompileError> {
        Ok(compile_stage(self, ctx, stage)?.to_source())
    }

    /// Last generated source per stage
    pub fn generated_sources(&self) -> &IndexMap<String, String> {
        &self.generated
    }

    /// Whether generated sources changed since they were last written
    pub fn has_pending_write(&self) -> bool {
        self.pending_write
    }

    /// Mark generated sources as written
    pub fn mark_written(&mut self) {
        self.pending_write = false;
    }

    /// Error from the last failed compilation
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Error when creating a link
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Socket not found
    #[error("Socket {socket:?} not found on node {node:?}")]
    SocketNotFound {
        /// Node searched
        node: NodeId,
        /// Socket name
        socket: String,
    },

    /// Types differ and no cast exists
    #[error("Cannot link {from_type} to {to_type}")]
    IncompatibleSockets {
        /// Source type
        from_type: String,
        /// Target type
        to_type: String,
    },

    /// Input already has a link
    #[error("Socket {socket:?} on node {node:?} is already linked")]
    SocketAlreadyLinked {
        /// Target node
        node: NodeId,
        /// Input socket name
        socket: String,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}

/// Error editing a node
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Socket not found
    #[error("Socket {socket:?} not found on node {node:?}")]
    SocketNotFound {
        /// Node searched
        node: NodeId,
        /// Socket name
        socket: String,
    },

    /// Operation needs an IO terminal
    #[error("Node {0:?} is not a stage terminal")]
    NotAnIoTerminal(NodeId),

    /// Custom parameter rejected
    #[error(transparent)]
    CustomParameter(#[from] CustomParameterError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Language, PipelineGraphDefinition, StageDefinition};
    use crate::signature::{Parameter, ParameterDirection, Signature};

    fn fixtures() -> (Namespace, PipelineGraphDefinition) {
        let mut namespace = Namespace::new();
        namespace.insert_function(
            Signature::new("scale")
                .returns("vec3")
                .param(Parameter::new("v", "vec3"))
                .param(Parameter::new("s", "float")),
        );
        namespace.insert_function(
            Signature::new("float_from_vec3")
                .returns("float")
                .param(Parameter::new("v", "vec3")),
        );
        let pipeline = PipelineGraphDefinition::new("Mesh", Language::Glsl).with_stage(
            "PIXEL",
            StageDefinition::new(
                Signature::new("PIXEL_SHADER")
                    .param(Parameter::new("color", "vec3").with_direction(ParameterDirection::Out)),
                ".glsl",
            ),
        );
        (namespace, pipeline)
    }

    #[test]
    fn test_unique_names() {
        let (namespace, pipeline) = fixtures();
        let ctx = SetupContext::new(&namespace, &pipeline);
        let mut graph = Graph::new("test", "Mesh");
        let a = graph.add_node(Node::function("scale", "scale"), &ctx);
        let b = graph.add_node(Node::function("scale", "scale"), &ctx);
        assert_eq!(graph.node(a).unwrap().name, "scale");
        assert_eq!(graph.node(b).unwrap().name, "scale.001");
    }

    #[test]
    fn test_connect_validation() {
        let (namespace, pipeline) = fixtures();
        let ctx = SetupContext::new(&namespace, &pipeline);
        let mut graph = Graph::new("test", "Mesh");
        let a = graph.add_node(Node::function("a", "scale"), &ctx);
        let b = graph.add_node(Node::function("b", "scale"), &ctx);

        assert!(matches!(
            graph.connect(a, "result", a, "v", &ctx),
            Err(ConnectionError::SelfLoop)
        ));
        assert!(matches!(
            graph.connect(a, "missing", b, "v", &ctx),
            Err(ConnectionError::SocketNotFound { .. })
        ));

        graph.connect(a, "result", b, "v", &ctx).unwrap();
        assert!(matches!(
            graph.connect(a, "result", b, "v", &ctx),
            Err(ConnectionError::SocketAlreadyLinked { .. })
        ));

        // vec3 into float goes through the cast
        graph.connect(a, "result", b, "s", &ctx).unwrap();
        assert_eq!(graph.link_count(), 2);
    }

    #[test]
    fn test_remove_node_drops_links() {
        let (namespace, pipeline) = fixtures();
        let ctx = SetupContext::new(&namespace, &pipeline);
        let mut graph = Graph::new("test", "Mesh");
        let a = graph.add_node(Node::function("a", "scale"), &ctx);
        let b = graph.add_node(Node::function("b", "scale"), &ctx);
        graph.connect(a, "result", b, "v", &ctx).unwrap();

        graph.remove_node(a, &ctx);
        assert_eq!(graph.link_count(), 0);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_suppressed_updates_compile_once() {
        let (namespace, pipeline) = fixtures();
        let ctx = SetupContext::new(&namespace, &pipeline);
        let mut graph = Graph::new("test", "Mesh");

        graph.suppress_updates(&ctx, |graph| {
            graph.add_node(Node::io("out", "PIXEL", true), &ctx);
            assert!(graph.updates_suppressed());
            assert!(graph.generated_sources().is_empty());
        });
        assert!(!graph.updates_suppressed());
        assert!(graph.generated_sources().contains_key("PIXEL"));
        assert!(graph.has_pending_write());
    }

    #[test]
    fn test_set_input_default() {
        let (namespace, pipeline) = fixtures();
        let ctx = SetupContext::new(&namespace, &pipeline);
        let mut graph = Graph::new("test", "Mesh");
        let a = graph.add_node(Node::function("a", "scale"), &ctx);
        graph.set_input_default(a, "s", "2.0", &ctx).unwrap();
        assert_eq!(graph.node(a).unwrap().input_defaults["s"], "2.0");
        assert!(matches!(
            graph.set_input_default(a, "nope", "1.0", &ctx),
            Err(NodeError::SocketNotFound { .. })
        ));
    }
}
