// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structure construction nodes.

use crate::compiler::CodegenContext;
use crate::node::{Node, NodeBehavior, NodeId, SetupContext, SocketLayout};
use crate::signature::StructDefinition;
use crate::socket::Socket;

/// Builds a structure value and exposes its members.
///
/// The socket named after the structure carries the whole value. Every
/// member gets its own input and output socket.
#[derive(Debug, Clone)]
pub struct StructNode {
    /// Structure type name
    pub struct_type: String,
    definition: Option<StructDefinition>,
    resolved: bool,
}

impl StructNode {
    /// Create an unresolved node for `struct_type`
    pub fn new(struct_type: impl Into<String>) -> Self {
        Self {
            struct_type: struct_type.into(),
            definition: None,
            resolved: false,
        }
    }

    /// Definition snapshot taken at the last successful setup
    pub fn definition(&self) -> Option<&StructDefinition> {
        self.definition.as_ref()
    }
}

impl NodeBehavior for StructNode {
    fn setup(&mut self, node: NodeId, ctx: &SetupContext<'_>) -> SocketLayout {
        match ctx.namespace.struct_definition(&self.struct_type) {
            Some(definition) => {
                self.definition = Some(definition.clone());
                self.resolved = true;
            }
            None => {
                tracing::warn!("Struct {:?} not found, keeping previous sockets", self.struct_type);
                self.resolved = false;
            }
        }

        let mut layout = SocketLayout::default();
        let Some(definition) = &self.definition else {
            return layout;
        };
        let name = definition.name.as_str();
        layout.inputs.push(Socket::input(node, name, name));
        layout.outputs.push(Socket::output(node, name, name));
        for member in &definition.members {
            layout.inputs.push(
                Socket::input(node, member.name.as_str(), member.ty.as_str())
                    .with_array_size(member.array_size),
            );
            layout.outputs.push(
                Socket::output(node, member.name.as_str(), member.ty.as_str())
                    .with_array_size(member.array_size),
            );
        }
        layout
    }

    fn is_resolved(&self) -> bool {
        self.resolved && self.definition.is_some()
    }

    fn describe(&self) -> String {
        format!("struct {}", self.struct_type)
    }

    fn emit_code(&self, node: &Node, ctx: &CodegenContext<'_>) -> String {
        let transpiler = ctx.transpiler;
        let local = transpiler.node_reference(&node.name);
        let initialization = node
            .input(&self.struct_type)
            .and_then(|socket| ctx.initialization(node, socket));
        let mut code = transpiler.declaration(&self.struct_type, 0, &local, initialization.as_deref());

        for socket in node.inputs().iter().filter(|s| s.name != self.struct_type) {
            if let Some(value) = ctx.linked_expression(node, socket) {
                let member = transpiler.member_reference(&local, &socket.name);
                code.push_str(&transpiler.assignment(&member, &value));
            }
        }
        code
    }

    fn socket_reference(&self, node: &Node, socket: &Socket, ctx: &CodegenContext<'_>) -> String {
        let local = ctx.transpiler.node_reference(&node.name);
        if socket.name == self.struct_type {
            local
        } else {
            ctx.transpiler.member_reference(&local, &socket.name)
        }
    }
}
