// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inline code nodes.

use crate::compiler::CodegenContext;
use crate::node::{Node, NodeBehavior, NodeId, SetupContext, SocketLayout, RESULT_SOCKET};
use crate::socket::Socket;
use serde::{Deserialize, Serialize};

/// A named input of an inline node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineInput {
    /// Name, usable as a variable in the code
    pub name: String,
    /// Type name
    #[serde(rename = "type")]
    pub ty: String,
}

/// Runs a user-written snippet.
///
/// The snippet sees each input as a local of the same name and assigns its
/// value to `result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineNode {
    /// Snippet source
    pub code: String,
    /// Inputs in order
    #[serde(default)]
    pub inputs: Vec<InlineInput>,
    /// Type of `result`
    pub result_type: String,
}

impl InlineNode {
    /// Create a snippet with no inputs
    pub fn new(code: impl Into<String>, result_type: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            inputs: Vec::new(),
            result_type: result_type.into(),
        }
    }

    /// Append an input
    pub fn input(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.inputs.push(InlineInput {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }
}

impl NodeBehavior for InlineNode {
    fn setup(&mut self, node: NodeId, _ctx: &SetupContext<'_>) -> SocketLayout {
        SocketLayout {
            inputs: self
                .inputs
                .iter()
                .map(|input| Socket::input(node, input.name.as_str(), input.ty.as_str()))
                .collect(),
            outputs: vec![Socket::output(node, RESULT_SOCKET, self.result_type.as_str())],
        }
    }

    fn describe(&self) -> String {
        "inline code".to_string()
    }

    fn emit_code(&self, node: &Node, ctx: &CodegenContext<'_>) -> String {
        let transpiler = ctx.transpiler;
        let result = transpiler.parameter_reference(&node.name, RESULT_SOCKET);
        let mut code = transpiler.declaration(&self.result_type, 0, &result, None);

        let mut scoped = String::new();
        for socket in node.inputs() {
            let value = ctx.initialization_or_default(node, socket);
            scoped.push_str(&transpiler.declaration(&socket.data_type, 0, &socket.name, Some(&value)));
        }
        scoped.push_str(&transpiler.declaration(&self.result_type, 0, RESULT_SOCKET, None));
        if !self.code.trim().is_empty() {
            scoped.push_str(&transpiler.statement(&self.code));
        }
        scoped.push_str(&transpiler.assignment(&result, RESULT_SOCKET));

        code.push_str(&transpiler.scoped(&scoped));
        code
    }

    fn socket_reference(&self, node: &Node, socket: &Socket, ctx: &CodegenContext<'_>) -> String {
        ctx.transpiler.parameter_reference(&node.name, &socket.name)
    }
}
