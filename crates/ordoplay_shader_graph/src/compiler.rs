// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph to source compilation.
//!
//! A stage compiles from its output terminal. Dependencies are walked
//! depth-first in input order and emitted in post-order, so every node's
//! code appears after the code of the nodes it reads from.

use crate::graph::Graph;
use crate::namespace::Namespace;
use crate::node::{Node, NodeId, SetupContext};
use crate::pipeline::PipelineGraphDefinition;
use crate::signature::Signature;
use crate::socket::Socket;
use crate::transpiler::Transpiler;
use indexmap::{IndexMap, IndexSet};

/// Error while compiling a graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// A dependency path loops back onto itself
    #[error("Graph contains a cycle through node {name:?}")]
    Cycle {
        /// Node reached twice on one path
        node: NodeId,
        /// Its name
        name: String,
    },

    /// Stage does not exist in the pipeline
    #[error("Unknown stage {0:?}")]
    UnknownStage(String),
}

/// Generated source for one stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSource {
    /// File scope declarations
    pub globals: String,
    /// Statements of the stage body
    pub body: String,
}

impl StageSource {
    /// Whether nothing was generated
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty() && self.body.is_empty()
    }

    /// Globals followed by the body
    pub fn to_source(&self) -> String {
        if self.globals.is_empty() {
            self.body.clone()
        } else {
            format!("{}\n{}", self.globals, self.body)
        }
    }

    /// Globals followed by the body wrapped in the stage entry point
    pub fn to_entry_point(&self, transpiler: &dyn Transpiler, signature: &Signature) -> String {
        let function = transpiler.stage_function(signature, &self.body);
        if self.globals.is_empty() {
            function
        } else {
            format!("{}\n{}", self.globals, function)
        }
    }
}

/// What node code generation can see
#[derive(Clone, Copy)]
pub struct CodegenContext<'a> {
    /// Graph being compiled
    pub graph: &'a Graph,
    /// Functions and structures visible to the graph
    pub namespace: &'a Namespace,
    /// The graph's pipeline
    pub pipeline: &'a PipelineGraphDefinition,
    /// Target language
    pub transpiler: &'a dyn Transpiler,
}

impl<'a> CodegenContext<'a> {
    /// Create a context using the pipeline's language
    pub fn new(graph: &'a Graph, setup: &SetupContext<'a>) -> Self {
        Self {
            graph,
            namespace: setup.namespace,
            pipeline: setup.pipeline,
            transpiler: setup.pipeline.transpiler(),
        }
    }

    /// Node and output socket feeding an input
    pub fn linked_source(&self, node: &Node, input: &str) -> Option<(&'a Node, &'a Socket)> {
        let link = self.graph.incoming_link(node.id, input)?;
        let source = self.graph.node(link.from_node)?;
        let socket = source.output(&link.from_socket)?;
        Some((source, socket))
    }

    /// Expression for a linked input, cast to the input's type when needed
    pub fn linked_expression(&self, node: &Node, input: &Socket) -> Option<String> {
        let (source, socket) = self.linked_source(node, &input.name)?;
        let reference = source.socket_reference(socket, self);
        if socket.data_type == input.data_type {
            return Some(reference);
        }
        match self.namespace.cast(&socket.data_type, &input.data_type) {
            Some(cast) => Some(self.transpiler.call(&cast.name, &[reference])),
            None => {
                tracing::warn!(
                    "No cast from {} to {} for {}.{}",
                    socket.data_type,
                    input.data_type,
                    node.name,
                    input.name
                );
                Some(reference)
            }
        }
    }

    /// Linked expression, else the node's literal default
    pub fn initialization(&self, node: &Node, input: &Socket) -> Option<String> {
        self.linked_expression(node, input)
            .or_else(|| node.input_defaults.get(&input.name).cloned())
    }

    /// Linked expression, literal default, or default-constructed value
    pub fn initialization_or_default(&self, node: &Node, input: &Socket) -> String {
        self.initialization(node, input)
            .unwrap_or_else(|| self.transpiler.default_value(&input.data_type, input.array_size))
    }
}

fn dependencies(graph: &Graph, node: NodeId) -> Vec<NodeId> {
    let Some(node) = graph.node(node) else {
        return Vec::new();
    };
    node.inputs()
        .iter()
        .filter_map(|input| graph.incoming_link(node.id, &input.name))
        .map(|link| link.from_node)
        .collect()
}

/// Nodes `root` depends on, in emission order, ending with `root`.
///
/// Each node appears once. A dependency reached again while it is still
/// being visited is a cycle.
pub fn traverse(graph: &Graph, root: NodeId) -> Result<Vec<NodeId>, CompileError> {
    let mut order = Vec::new();
    let mut visited = IndexSet::new();
    let mut in_progress = IndexSet::new();
    let mut stack: Vec<(NodeId, Vec<NodeId>, usize)> = vec![(root, dependencies(graph, root), 0)];
    in_progress.insert(root);

    while let Some((id, deps, next)) = stack.last_mut() {
        if let Some(&dep) = deps.get(*next) {
            *next += 1;
            if visited.contains(&dep) {
                continue;
            }
            if in_progress.contains(&dep) {
                let name = graph.node(dep).map(|n| n.name.clone()).unwrap_or_default();
                return Err(CompileError::Cycle { node: dep, name });
            }
            in_progress.insert(dep);
            stack.push((dep, dependencies(graph, dep), 0));
        } else {
            let id = *id;
            stack.pop();
            in_progress.swap_remove(&id);
            visited.insert(id);
            order.push(id);
        }
    }
    Ok(order)
}

/// Compile one stage.
///
/// A stage with no output terminal compiles to empty source.
pub fn compile_stage(
    graph: &Graph,
    ctx: &SetupContext<'_>,
    stage: &str,
) -> Result<StageSource, CompileError> {
    if ctx.pipeline.stage(stage).is_none() {
        return Err(CompileError::UnknownStage(stage.to_string()));
    }
    let Some(root) = graph.output_terminal(stage) else {
        return Ok(StageSource::default());
    };

    let order = traverse(graph, root.id)?;
    let codegen = CodegenContext::new(graph, ctx);
    let transpiler = codegen.transpiler;
    let nodes: Vec<&Node> = order
        .iter()
        .filter(|id| **id != root.id)
        .filter_map(|id| graph.node(*id))
        .collect();

    let mut globals = String::new();
    if let Some(library) = &graph.library {
        globals.push_str(&transpiler.include(&library.to_string_lossy()));
    }
    globals.push_str(&root.emit_global_declarations(&codegen));
    for node in &nodes {
        globals.push_str(&node.emit_global_declarations(&codegen));
    }

    let mut body = String::new();
    for node in &nodes {
        body.push_str(&node.emit_code(&codegen));
    }
    body.push_str(&root.emit_code(&codegen));

    tracing::trace!(
        "Compiled stage {stage:?} of graph {:?} from {} nodes",
        graph.name,
        order.len()
    );
    Ok(StageSource { globals, body })
}

/// Compile every stage that has an output terminal, keyed by stage name
pub fn compile_all(
    graph: &Graph,
    ctx: &SetupContext<'_>,
) -> Result<IndexMap<String, String>, CompileError> {
    let mut sources = IndexMap::new();
    for stage in ctx.pipeline.stages.keys() {
        if graph.output_terminal(stage).is_none() {
            continue;
        }
        sources.insert(stage.clone(), compile_stage(graph, ctx, stage)?.to_source());
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::InlineNode;
    use crate::pipeline::{Language, StageDefinition};
    use crate::signature::{Parameter, ParameterDirection, StructDefinition, StructMember};

    fn fixtures(language: Language) -> (Namespace, PipelineGraphDefinition) {
        let mut namespace = Namespace::new();
        namespace.insert_function(
            Signature::new("brighten")
                .returns("vec3")
                .param(Parameter::new("color", "vec3"))
                .param(Parameter::new("amount", "float")),
        );
        namespace.insert_function(
            Signature::new("split")
                .param(Parameter::new("v", "vec3"))
                .param(Parameter::new("x", "float").with_direction(ParameterDirection::Out))
                .param(Parameter::new("acc", "float").with_direction(ParameterDirection::InOut)),
        );
        namespace.insert_struct(
            StructDefinition::new("Light")
                .member(StructMember::new("color", "vec3"))
                .member(StructMember::new("power", "float")),
        );
        let pipeline = PipelineGraphDefinition::new("Mesh", language).with_stage(
            "PIXEL",
            StageDefinition::new(
                Signature::new("PIXEL_SHADER")
                    .param(Parameter::new("base", "vec3"))
                    .param(Parameter::new("color", "vec3").with_direction(ParameterDirection::Out)),
                ".glsl",
            ),
        );
        (namespace, pipeline)
    }

    #[test]
    fn test_function_call_lowering() {
        let (namespace, pipeline) = fixtures(Language::Glsl);
        let ctx = SetupContext::new(&namespace, &pipeline);
        let mut graph = Graph::new("test", "Mesh");
        let input = graph.add_node(Node::io("in", "PIXEL", false), &ctx);
        let bright = graph.add_node(Node::function("bright", "brighten").with_default("amount", "2.0"), &ctx);
        let output = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
        graph.connect(input, "base", bright, "color", &ctx).unwrap();
        graph.connect(bright, "result", output, "color", &ctx).unwrap();

        assert_eq!(
            graph.compile("PIXEL", &ctx).unwrap(),
            "vec3 node_bright_result = brighten(base, 2.0);\ncolor = node_bright_result;\n"
        );
    }

    #[test]
    fn test_out_and_inout_parameters() {
        let (namespace, pipeline) = fixtures(Language::Glsl);
        let ctx = SetupContext::new(&namespace, &pipeline);
        let mut graph = Graph::new("test", "Mesh");
        let node = graph.add_node(Node::function("s", "split").with_default("acc", "1.0"), &ctx);
        graph.add_node(Node::io("out", "PIXEL", true), &ctx);
        let output = graph.output_terminal("PIXEL").unwrap().id;
        graph.connect(node, "x", output, "color", &ctx).unwrap_err();

        let source = compile_stage(&graph, &ctx, "PIXEL").unwrap();
        // Nothing links the split node to the output, so it is not emitted
        assert!(source.body.is_empty());

        let code = {
            let codegen = CodegenContext::new(&graph, &ctx);
            graph.node(node).unwrap().emit_code(&codegen)
        };
        assert_eq!(
            code,
            "float node_s_x = float();\nfloat node_s_acc = 1.0;\nsplit(vec3(), node_s_x, node_s_acc);\n"
        );
    }

    #[test]
    fn test_struct_node_lowering() {
        let (namespace, pipeline) = fixtures(Language::Glsl);
        let ctx = SetupContext::new(&namespace, &pipeline);
        let mut graph = Graph::new("test", "Mesh");
        let input = graph.add_node(Node::io("in", "PIXEL", false), &ctx);
        let light = graph.add_node(Node::structure("light", "Light"), &ctx);
        let output = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
        graph.connect(input, "base", light, "color", &ctx).unwrap();
        graph.connect(light, "color", output, "color", &ctx).unwrap();

        assert_eq!(
            graph.compile("PIXEL", &ctx).unwrap(),
            "Light node_light = Light();\nnode_light.color = base;\ncolor = node_light.color;\n"
        );
    }

    #[test]
    fn test_inline_node_python() {
        let (namespace, pipeline) = fixtures(Language::Python);
        let ctx = SetupContext::new(&namespace, &pipeline);
        let mut graph = Graph::new("test", "Mesh");
        let inline = InlineNode::new("result = a * 2", "vec3").input("a", "vec3");
        let snippet = graph.add_node(Node::inline("double", inline), &ctx);
        let output = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
        graph.connect(snippet, "result", output, "color", &ctx).unwrap();

        assert_eq!(
            graph.compile("PIXEL", &ctx).unwrap(),
            "node_double_result = vec3()\n\
             if True:\n    a = vec3()\n    result = vec3()\n    result = a * 2\n    node_double_result = result\n\
             color = node_double_result\n"
        );
    }

    #[test]
    fn test_unknown_stage() {
        let (namespace, pipeline) = fixtures(Language::Glsl);
        let ctx = SetupContext::new(&namespace, &pipeline);
        let graph = Graph::new("test", "Mesh");
        assert_eq!(
            compile_stage(&graph, &ctx, "VERTEX"),
            Err(CompileError::UnknownStage("VERTEX".into()))
        );
    }

    #[test]
    fn test_entry_point_wrapping() {
        let source = StageSource {
            globals: "uniform float k;\n".into(),
            body: "color = vec3(k);\n".into(),
        };
        let signature = Signature::new("PIXEL_SHADER")
            .param(Parameter::new("color", "vec3").with_direction(ParameterDirection::Out));
        assert_eq!(
            source.to_entry_point(&crate::transpiler::GlslTranspiler, &signature),
            "uniform float k;\n\nvoid PIXEL_SHADER(out vec3 color)\n{\n    color = vec3(k);\n}\n"
        );
    }
}
