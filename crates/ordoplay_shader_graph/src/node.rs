// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the shader graph.

use crate::compiler::CodegenContext;
use crate::namespace::Namespace;
use crate::nodes::{FunctionNode, InlineNode, IoNode, StructNode};
use crate::pipeline::PipelineGraphDefinition;
use crate::socket::Socket;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the socket carrying a function's return value
pub const RESULT_SOCKET: &str = "result";

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a node needs to (re)build its sockets
#[derive(Debug, Clone, Copy)]
pub struct SetupContext<'a> {
    /// Functions and structures visible to the graph
    pub namespace: &'a Namespace,
    /// The graph's pipeline
    pub pipeline: &'a PipelineGraphDefinition,
}

impl<'a> SetupContext<'a> {
    /// Create a setup context
    pub fn new(namespace: &'a Namespace, pipeline: &'a PipelineGraphDefinition) -> Self {
        Self { namespace, pipeline }
    }
}

/// Sockets produced by a node's setup
#[derive(Debug, Clone, Default)]
pub struct SocketLayout {
    /// Input sockets in order
    pub inputs: Vec<Socket>,
    /// Output sockets in order
    pub outputs: Vec<Socket>,
}

/// Per-variant node behavior
pub trait NodeBehavior {
    /// Resolve the node's declaration and build its sockets.
    ///
    /// When the declaration can no longer be found the previous snapshot is
    /// kept and the node reports itself unresolved.
    fn setup(&mut self, node: NodeId, ctx: &SetupContext<'_>) -> SocketLayout;

    /// Whether the declaration was found at the last setup
    fn is_resolved(&self) -> bool {
        true
    }

    /// Short description used in diagnostics
    fn describe(&self) -> String;

    /// Statements computing the node's outputs
    fn emit_code(&self, node: &Node, ctx: &CodegenContext<'_>) -> String;

    /// Declarations that must live at file scope
    fn emit_global_declarations(&self, _node: &Node, _ctx: &CodegenContext<'_>) -> String {
        String::new()
    }

    /// Expression reading one of the node's output sockets
    fn socket_reference(&self, node: &Node, socket: &Socket, ctx: &CodegenContext<'_>) -> String;
}

/// Node variant
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Calls a function
    Function(FunctionNode),
    /// Builds a structure value
    Struct(StructNode),
    /// Stage input or output terminal
    Io(IoNode),
    /// User-written code snippet
    Inline(InlineNode),
}

impl NodeKind {
    /// Behavior of this variant
    pub fn behavior(&self) -> &dyn NodeBehavior {
        match self {
            Self::Function(node) => node,
            Self::Struct(node) => node,
            Self::Io(node) => node,
            Self::Inline(node) => node,
        }
    }

    /// Mutable behavior of this variant
    pub fn behavior_mut(&mut self) -> &mut dyn NodeBehavior {
        match self {
            Self::Function(node) => node,
            Self::Struct(node) => node,
            Self::Io(node) => node,
            Self::Inline(node) => node,
        }
    }

    /// IO terminal data, if this is one
    pub fn as_io(&self) -> Option<&IoNode> {
        match self {
            Self::Io(node) => Some(node),
            _ => None,
        }
    }

    /// Mutable IO terminal data, if this is one
    pub fn as_io_mut(&mut self) -> Option<&mut IoNode> {
        match self {
            Self::Io(node) => Some(node),
            _ => None,
        }
    }
}

/// A node instance in the graph
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Name, unique within the graph
    pub name: String,
    /// Variant data
    pub kind: NodeKind,
    /// Literal values used by unlinked inputs, by socket name
    pub input_defaults: IndexMap<String, String>,
    inputs: Vec<Socket>,
    outputs: Vec<Socket>,
}

impl Node {
    /// Create a node. Sockets are built on the first setup.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            kind,
            input_defaults: IndexMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Node calling the function stored under `key`
    pub fn function(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Function(FunctionNode::new(key)))
    }

    /// Node building a value of structure `struct_type`
    pub fn structure(name: impl Into<String>, struct_type: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Struct(StructNode::new(struct_type)))
    }

    /// Stage terminal; `is_output` selects the output side
    pub fn io(name: impl Into<String>, stage: impl Into<String>, is_output: bool) -> Self {
        Self::new(name, NodeKind::Io(IoNode::new(stage, is_output)))
    }

    /// Inline code node
    pub fn inline(name: impl Into<String>, inline: InlineNode) -> Self {
        Self::new(name, NodeKind::Inline(inline))
    }

    /// Set a literal used when an input is unlinked
    pub fn with_default(mut self, input: impl Into<String>, literal: impl Into<String>) -> Self {
        self.input_defaults.insert(input.into(), literal.into());
        self
    }

    /// Rebuild sockets from the current namespace and pipeline
    pub fn setup(&mut self, ctx: &SetupContext<'_>) {
        let layout = self.kind.behavior_mut().setup(self.id, ctx);
        self.inputs = layout.inputs;
        self.outputs = layout.outputs;
    }

    /// Input sockets
    pub fn inputs(&self) -> &[Socket] {
        &self.inputs
    }

    /// Output sockets
    pub fn outputs(&self) -> &[Socket] {
        &self.outputs
    }

    /// Get an input socket by name
    pub fn input(&self, name: &str) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.name == name)
    }

    /// Get an output socket by name
    pub fn output(&self, name: &str) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.name == name)
    }

    /// Whether the node's declaration was found at the last setup
    pub fn is_resolved(&self) -> bool {
        self.kind.behavior().is_resolved()
    }

    /// Statements for this node, or a placeholder comment if unresolved
    pub fn emit_code(&self, ctx: &CodegenContext<'_>) -> String {
        let behavior = self.kind.behavior();
        if !behavior.is_resolved() {
            tracing::warn!("Node {:?} has no declaration: {}", self.name, behavior.describe());
            return ctx
                .transpiler
                .comment(&format!("{}: unresolved {}", self.name, behavior.describe()));
        }
        behavior.emit_code(self, ctx)
    }

    /// File scope declarations for this node
    pub fn emit_global_declarations(&self, ctx: &CodegenContext<'_>) -> String {
        let behavior = self.kind.behavior();
        if !behavior.is_resolved() {
            return String::new();
        }
        behavior.emit_global_declarations(self, ctx)
    }

    /// Expression reading one of this node's outputs
    pub fn socket_reference(&self, socket: &Socket, ctx: &CodegenContext<'_>) -> String {
        self.kind.behavior().socket_reference(self, socket, ctx)
    }
}
