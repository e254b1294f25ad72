// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stage input and output terminals.
//!
//! An output terminal is the root a stage compiles from. Its inputs are the
//! stage's `out` parameters (plus `result` for stages returning a value) and
//! any custom outputs. An input terminal exposes the stage's `in` parameters
//! and custom inputs as outputs.

use super::function::shadows_result;
use crate::compiler::CodegenContext;
use crate::node::{Node, NodeBehavior, NodeId, SetupContext, SocketLayout, RESULT_SOCKET};
use crate::signature::Signature;
use crate::socket::Socket;
use crate::transpiler::IoDirection;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// A user-added stage parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomParameter {
    /// Parameter name
    pub name: String,
    /// Type name
    #[serde(rename = "type")]
    pub ty: String,
}

/// Error adding a custom parameter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustomParameterError {
    /// Stage accepts no custom parameters on this side
    #[error("Stage {0:?} does not accept custom parameters")]
    NotAllowed(String),

    /// Type is not in the stage's permissible set
    #[error("Type {ty:?} is not allowed for custom parameters of stage {stage:?}")]
    UnsupportedType {
        /// Requested type
        ty: String,
        /// Stage name
        stage: String,
    },

    /// Name already used by a fixed or custom parameter
    #[error("Parameter name {0:?} is already in use")]
    DuplicateName(String),
}

/// Stage terminal node
#[derive(Debug, Clone)]
pub struct IoNode {
    /// Stage name in the pipeline
    pub stage: String,
    /// Output terminal when true, input terminal otherwise
    pub is_output: bool,
    custom_parameters: Vec<CustomParameter>,
    signature: Option<Signature>,
    dynamic_types: IndexSet<String>,
    custom_output_start_index: u32,
    shader_type: Option<String>,
    resolved: bool,
}

impl IoNode {
    /// Create an unresolved terminal
    pub fn new(stage: impl Into<String>, is_output: bool) -> Self {
        Self {
            stage: stage.into(),
            is_output,
            custom_parameters: Vec::new(),
            signature: None,
            dynamic_types: IndexSet::new(),
            custom_output_start_index: 0,
            shader_type: None,
            resolved: false,
        }
    }

    /// Stage signature snapshot
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Custom parameters in declaration order
    pub fn custom_parameters(&self) -> &[CustomParameter] {
        &self.custom_parameters
    }

    /// Types allowed for custom parameters on this side of the stage
    pub fn permissible_types(&self) -> &IndexSet<String> {
        &self.dynamic_types
    }

    fn side(&self) -> IoDirection {
        if self.is_output {
            IoDirection::Out
        } else {
            IoDirection::In
        }
    }

    fn fixed_names(&self) -> Vec<&str> {
        let Some(signature) = &self.signature else {
            return Vec::new();
        };
        let mut names = Vec::new();
        if self.is_output && signature.has_result() {
            names.push(RESULT_SOCKET);
        }
        names.extend(
            signature
                .parameters
                .iter()
                .filter(|p| {
                    if self.is_output {
                        p.direction.is_output()
                    } else {
                        p.direction.is_input()
                    }
                })
                .map(|p| p.name.as_str()),
        );
        names
    }

    fn name_in_use(&self, name: &str) -> bool {
        self.fixed_names().contains(&name) || self.custom_parameters.iter().any(|p| p.name == name)
    }

    /// Add a custom parameter and return its name.
    ///
    /// Without an explicit name the first unused `Custom Output N` (or
    /// `Custom Input N`) is chosen. Takes effect at the next setup.
    pub fn add_custom_parameter(
        &mut self,
        name: Option<&str>,
        ty: &str,
    ) -> Result<String, CustomParameterError> {
        if self.dynamic_types.is_empty() {
            return Err(CustomParameterError::NotAllowed(self.stage.clone()));
        }
        if !self.dynamic_types.contains(ty) {
            return Err(CustomParameterError::UnsupportedType {
                ty: ty.to_string(),
                stage: self.stage.clone(),
            });
        }

        let name = match name {
            Some(name) if self.name_in_use(name) => {
                return Err(CustomParameterError::DuplicateName(name.to_string()))
            }
            Some(name) => name.to_string(),
            None => {
                let base = if self.is_output { "Custom Output" } else { "Custom Input" };
                (1..)
                    .map(|i| format!("{base} {i}"))
                    .find(|candidate| !self.name_in_use(candidate))
                    .unwrap_or_else(|| base.to_string())
            }
        };

        self.custom_parameters.push(CustomParameter {
            name: name.clone(),
            ty: ty.to_string(),
        });
        Ok(name)
    }

    /// Remove a custom parameter by name
    pub fn remove_custom_parameter(&mut self, name: &str) -> bool {
        let before = self.custom_parameters.len();
        self.custom_parameters.retain(|p| p.name != name);
        self.custom_parameters.len() != before
    }

    /// Restore custom parameters without validation (used when loading documents)
    pub fn set_custom_parameters(&mut self, parameters: Vec<CustomParameter>) {
        self.custom_parameters = parameters;
    }

    /// Output slot index of every custom output, in declaration order
    pub fn custom_output_slots(&self) -> Vec<(&str, u32)> {
        if !self.is_output {
            return Vec::new();
        }
        self.custom_parameters
            .iter()
            .zip(self.custom_output_start_index..)
            .map(|(p, index)| (p.name.as_str(), index))
            .collect()
    }
}

impl NodeBehavior for IoNode {
    fn setup(&mut self, node: NodeId, ctx: &SetupContext<'_>) -> SocketLayout {
        match ctx.pipeline.stage(&self.stage) {
            Some(stage) => {
                self.signature = Some(stage.signature.clone());
                self.dynamic_types = stage.dynamic_types(self.is_output).clone();
                self.custom_output_start_index = stage.custom_output_start_index.unwrap_or(0);
                self.shader_type = stage.shader_type.clone();
                self.resolved = true;
            }
            None => {
                tracing::warn!(
                    "Stage {:?} not found in pipeline {:?}, keeping previous sockets",
                    self.stage,
                    ctx.pipeline.name
                );
                self.resolved = false;
            }
        }

        let mut fixed = Vec::new();
        if let Some(signature) = &self.signature {
            if self.is_output {
                if let Some(ty) = &signature.return_type {
                    fixed.push(Socket::input(node, RESULT_SOCKET, ty.as_str()));
                }
                if shadows_result(signature) {
                    tracing::warn!(
                        "Stage {:?} has a parameter named {RESULT_SOCKET:?} besides its return value, the parameter is ignored",
                        self.stage
                    );
                }
                for parameter in signature
                    .parameters
                    .iter()
                    .filter(|p| p.direction.is_output())
                    .filter(|p| !(signature.return_type.is_some() && p.name == RESULT_SOCKET))
                {
                    fixed.push(
                        Socket::input(node, parameter.name.as_str(), parameter.ty.as_str())
                            .with_array_size(parameter.array_size),
                    );
                }
            } else {
                for parameter in signature.parameters.iter().filter(|p| p.direction.is_input()) {
                    fixed.push(
                        Socket::output(node, parameter.name.as_str(), parameter.ty.as_str())
                            .with_array_size(parameter.array_size),
                    );
                }
            }
        }

        let mut sockets = fixed;
        for parameter in &self.custom_parameters {
            if sockets.iter().any(|s| s.name == parameter.name) {
                tracing::warn!(
                    "Custom parameter {:?} shadows a stage parameter and is ignored",
                    parameter.name
                );
                continue;
            }
            let socket = if self.is_output {
                Socket::input(node, parameter.name.as_str(), parameter.ty.as_str())
            } else {
                Socket::output(node, parameter.name.as_str(), parameter.ty.as_str())
            };
            sockets.push(socket.into_custom());
        }

        if self.is_output {
            SocketLayout {
                inputs: sockets,
                outputs: Vec::new(),
            }
        } else {
            SocketLayout {
                inputs: Vec::new(),
                outputs: sockets,
            }
        }
    }

    fn is_resolved(&self) -> bool {
        self.resolved && self.signature.is_some()
    }

    fn describe(&self) -> String {
        let side = if self.is_output { "output" } else { "input" };
        format!("{side} of stage {}", self.stage)
    }

    fn emit_code(&self, node: &Node, ctx: &CodegenContext<'_>) -> String {
        if !self.is_output {
            return String::new();
        }
        let transpiler = ctx.transpiler;
        let returns = self.signature.as_ref().and_then(|s| s.return_type.as_ref());
        let mut code = String::new();

        for socket in node.inputs() {
            if !socket.custom && socket.name == RESULT_SOCKET && returns.is_some() {
                continue;
            }
            let Some(value) = ctx.linked_expression(node, socket) else {
                continue;
            };
            let target = if socket.custom {
                transpiler.custom_io_reference(IoDirection::Out, &self.stage, &socket.name)
            } else {
                transpiler.io_parameter_reference(&socket.name, IoDirection::Out)
            };
            code.push_str(&transpiler.assignment(&target, &value));
        }

        if let Some(ty) = returns {
            let value = node
                .inputs()
                .iter()
                .find(|s| !s.custom && s.name == RESULT_SOCKET)
                .map(|socket| ctx.initialization_or_default(node, socket))
                .unwrap_or_else(|| transpiler.default_value(ty, 0));
            code.push_str(&transpiler.result(&value));
        }
        code
    }

    fn emit_global_declarations(&self, node: &Node, ctx: &CodegenContext<'_>) -> String {
        let transpiler = ctx.transpiler;
        let side = self.side();
        let custom_sockets = || {
            let sockets = if self.is_output { node.inputs() } else { node.outputs() };
            sockets.iter().filter(|s| s.custom)
        };

        let mut code = String::new();
        if self.is_output {
            for (name, index) in self.custom_output_slots() {
                let Some(socket) = custom_sockets().find(|s| s.name == name) else {
                    continue;
                };
                let reference = transpiler.custom_io_reference(side, &self.stage, name);
                code.push_str(&transpiler.custom_output_declaration(
                    &socket.data_type,
                    &reference,
                    index,
                    self.shader_type.as_deref(),
                ));
            }
        } else {
            for socket in custom_sockets() {
                let reference = transpiler.custom_io_reference(side, &self.stage, &socket.name);
                code.push_str(&transpiler.global_declaration(&socket.data_type, 0, &reference));
            }
        }
        code
    }

    fn socket_reference(&self, _node: &Node, socket: &Socket, ctx: &CodegenContext<'_>) -> String {
        if socket.custom {
            ctx.transpiler
                .custom_io_reference(self.side(), &self.stage, &socket.name)
        } else {
            ctx.transpiler.io_parameter_reference(&socket.name, self.side())
        }
    }
}
