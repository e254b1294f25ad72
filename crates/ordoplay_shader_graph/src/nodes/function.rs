// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function call nodes.

use crate::compiler::CodegenContext;
use crate::node::{Node, NodeBehavior, NodeId, SetupContext, SocketLayout, RESULT_SOCKET};
use crate::signature::{ParameterDirection, Signature};
use crate::socket::Socket;

/// Calls one function from the namespace
#[derive(Debug, Clone)]
pub struct FunctionNode {
    /// Namespace key of the function
    pub key: String,
    signature: Option<Signature>,
    resolved: bool,
}

impl FunctionNode {
    /// Create an unresolved node for `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            signature: None,
            resolved: false,
        }
    }

    /// Signature snapshot taken at the last successful setup
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }
}

/// A returned value and a parameter both claiming the result socket
pub(crate) fn shadows_result(signature: &Signature) -> bool {
    signature.return_type.is_some() && signature.parameters.iter().any(|p| p.name == RESULT_SOCKET)
}

impl NodeBehavior for FunctionNode {
    fn setup(&mut self, node: NodeId, ctx: &SetupContext<'_>) -> SocketLayout {
        match ctx.namespace.function(&self.key) {
            Some(signature) if shadows_result(signature) => {
                tracing::warn!(
                    "Function {:?} has a parameter named {RESULT_SOCKET:?} besides its return value, keeping previous sockets",
                    self.key
                );
                self.resolved = false;
            }
            Some(signature) => {
                self.signature = Some(signature.clone());
                self.resolved = true;
            }
            None => {
                tracing::warn!("Function {:?} not found, keeping previous sockets", self.key);
                self.resolved = false;
            }
        }

        let mut layout = SocketLayout::default();
        let Some(signature) = &self.signature else {
            return layout;
        };
        if let Some(ty) = &signature.return_type {
            layout.outputs.push(Socket::output(node, RESULT_SOCKET, ty.as_str()));
        }
        for parameter in &signature.parameters {
            if parameter.direction.is_output() {
                layout.outputs.push(
                    Socket::output(node, parameter.name.as_str(), parameter.ty.as_str())
                        .with_array_size(parameter.array_size),
                );
            }
            if parameter.direction.is_input() {
                layout.inputs.push(
                    Socket::input(node, parameter.name.as_str(), parameter.ty.as_str())
                        .with_array_size(parameter.array_size),
                );
            }
        }
        layout
    }

    fn is_resolved(&self) -> bool {
        self.resolved && self.signature.is_some()
    }

    fn describe(&self) -> String {
        format!("function {}", self.key)
    }

    fn emit_code(&self, node: &Node, ctx: &CodegenContext<'_>) -> String {
        let Some(signature) = &self.signature else {
            return String::new();
        };
        let transpiler = ctx.transpiler;
        let mut code = String::new();
        let mut arguments = Vec::with_capacity(signature.parameters.len());

        for parameter in &signature.parameters {
            if parameter.direction.is_output() {
                let local = transpiler.parameter_reference(&node.name, &parameter.name);
                // out locals start default constructed, inout ones take the input value
                let initialization = match parameter.direction {
                    ParameterDirection::InOut => node
                        .input(&parameter.name)
                        .and_then(|socket| ctx.initialization(node, socket)),
                    _ => None,
                };
                code.push_str(&transpiler.declaration(
                    &parameter.ty,
                    parameter.array_size,
                    &local,
                    initialization.as_deref(),
                ));
                arguments.push(local);
            } else {
                let argument = match node.input(&parameter.name) {
                    Some(socket) => ctx.initialization_or_default(node, socket),
                    None => transpiler.default_value(&parameter.ty, parameter.array_size),
                };
                arguments.push(argument);
            }
        }

        let call = transpiler.call(&signature.name, &arguments);
        match &signature.return_type {
            Some(ty) => {
                let result = transpiler.parameter_reference(&node.name, RESULT_SOCKET);
                code.push_str(&transpiler.declaration(ty, 0, &result, Some(&call)));
            }
            None => code.push_str(&transpiler.statement(&call)),
        }
        code
    }

    fn socket_reference(&self, node: &Node, socket: &Socket, ctx: &CodegenContext<'_>) -> String {
        ctx.transpiler.parameter_reference(&node.name, &socket.name)
    }
}
