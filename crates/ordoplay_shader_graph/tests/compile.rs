// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end compilation through the public API.

use ordoplay_shader_graph::compiler::traverse;
use ordoplay_shader_graph::{
    CompileError, Graph, Language, Namespace, Node, Parameter, ParameterDirection, PipelineGraphDefinition,
    SetupContext, Signature, StageDefinition,
};

fn pipeline() -> PipelineGraphDefinition {
    let mut pixel = StageDefinition::new(
        Signature::new("PIXEL_SHADER")
            .param(Parameter::new("uv", "vec2"))
            .param(Parameter::new("color", "vec4").with_direction(ParameterDirection::Out)),
        ".glsl",
    )
    .with_dynamic_outputs(["float", "vec4"]);
    // Slot 0 belongs to `color`
    pixel.custom_output_start_index = Some(1);

    PipelineGraphDefinition::new("Mesh", Language::Glsl)
        .with_stage("PIXEL", pixel)
        .with_stage(
            "SHADOW",
            StageDefinition::new(Signature::new("SHADOW_SHADER").returns("float"), ".glsl"),
        )
}

fn namespace() -> Namespace {
    let mut namespace = Namespace::new();
    namespace.insert_function(
        Signature::new("tint")
            .returns("vec4")
            .param(Parameter::new("color", "vec4"))
            .param(Parameter::new("amount", "float")),
    );
    namespace.insert_function(Signature::new("vec4_from_float").returns("vec4").param(Parameter::new("f", "float")));
    namespace.insert_function(Signature::new("luma").returns("float").param(Parameter::new("color", "vec4")));
    namespace
}

#[test]
fn empty_graph_compiles_to_nothing() {
    let (namespace, pipeline) = (namespace(), pipeline());
    let ctx = SetupContext::new(&namespace, &pipeline);
    let mut graph = Graph::new("empty", "Mesh");
    graph.add_node(Node::function("orphan", "tint"), &ctx);

    assert_eq!(graph.compile("PIXEL", &ctx).unwrap(), "");
    assert!(graph.generated_sources().is_empty());

    // A terminal with nothing linked still produces no statements
    graph.add_node(Node::io("out", "PIXEL", true), &ctx);
    assert_eq!(graph.compile("PIXEL", &ctx).unwrap(), "");
}

#[test]
fn chain_emits_in_dependency_order() {
    let (namespace, pipeline) = (namespace(), pipeline());
    let ctx = SetupContext::new(&namespace, &pipeline);
    let mut graph = Graph::new("chain", "Mesh");
    // Added out of order so node order alone cannot explain the result
    let r = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
    let c = graph.add_node(Node::function("c", "tint"), &ctx);
    let a = graph.add_node(Node::function("a", "tint"), &ctx);
    let b = graph.add_node(Node::function("b", "tint"), &ctx);
    graph.connect(a, "result", b, "color", &ctx).unwrap();
    graph.connect(b, "result", c, "color", &ctx).unwrap();
    graph.connect(c, "result", r, "color", &ctx).unwrap();

    assert_eq!(traverse(&graph, r).unwrap(), vec![a, b, c, r]);
    assert_eq!(
        graph.compile("PIXEL", &ctx).unwrap(),
        "vec4 node_a_result = tint(vec4(), float());\n\
         vec4 node_b_result = tint(node_a_result, float());\n\
         vec4 node_c_result = tint(node_b_result, float());\n\
         color = node_c_result;\n"
    );
}

#[test]
fn names_that_sanitize_alike_get_distinct_variables() {
    let (namespace, pipeline) = (namespace(), pipeline());
    let ctx = SetupContext::new(&namespace, &pipeline);
    let mut graph = Graph::new("names", "Mesh");
    let r = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
    let dotted = graph.add_node(Node::function("tint.001", "tint"), &ctx);
    let underscored = graph.add_node(Node::function("tint_001", "tint"), &ctx);
    graph.connect(dotted, "result", underscored, "color", &ctx).unwrap();
    graph.connect(underscored, "result", r, "color", &ctx).unwrap();

    assert_eq!(graph.node(underscored).unwrap().name, "tint_001.001");
    assert_eq!(
        graph.compile("PIXEL", &ctx).unwrap(),
        "vec4 node_tint_001_result = tint(vec4(), float());\n\
         vec4 node_tint_001_001_result = tint(node_tint_001_result, float());\n\
         color = node_tint_001_001_result;\n"
    );

    // Renaming follows the same rule
    let renamed = graph.rename_node(dotted, "tint_001.001", &ctx).unwrap();
    assert_eq!(renamed, "tint_001.001.001");
}

#[test]
fn diamond_emits_shared_node_once() {
    let (namespace, pipeline) = (namespace(), pipeline());
    let ctx = SetupContext::new(&namespace, &pipeline);
    let mut graph = Graph::new("diamond", "Mesh");
    let r = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
    let d = graph.add_node(Node::function("d", "tint"), &ctx);
    let c = graph.add_node(Node::function("c", "luma"), &ctx);
    let b = graph.add_node(Node::function("b", "tint"), &ctx);
    let a = graph.add_node(Node::function("a", "tint"), &ctx);
    graph.connect(a, "result", b, "color", &ctx).unwrap();
    graph.connect(a, "result", c, "color", &ctx).unwrap();
    graph.connect(b, "result", d, "color", &ctx).unwrap();
    graph.connect(c, "result", d, "amount", &ctx).unwrap();
    graph.connect(d, "result", r, "color", &ctx).unwrap();

    assert_eq!(traverse(&graph, r).unwrap(), vec![a, b, c, d, r]);

    let source = graph.compile("PIXEL", &ctx).unwrap();
    assert_eq!(source.matches("node_a_result = tint").count(), 1);
    assert!(source.contains("vec4 node_d_result = tint(node_b_result, node_c_result);"));
}

#[test]
fn cycle_is_a_compile_error() {
    let (namespace, pipeline) = (namespace(), pipeline());
    let ctx = SetupContext::new(&namespace, &pipeline);
    let mut graph = Graph::new("cycle", "Mesh");
    let a = graph.add_node(Node::function("a", "tint"), &ctx);
    let b = graph.add_node(Node::function("b", "tint"), &ctx);
    let r = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
    graph.connect(a, "result", b, "color", &ctx).unwrap();
    graph.connect(b, "result", r, "color", &ctx).unwrap();
    graph.connect(b, "result", a, "color", &ctx).unwrap();

    let err = graph.compile("PIXEL", &ctx).unwrap_err();
    assert!(matches!(err, CompileError::Cycle { node, .. } if node == b));
    assert!(graph.last_error().is_some());

    // Breaking the cycle clears the error
    let back = graph.incoming_link(a, "color").map(|l| l.id).unwrap();
    graph.disconnect(back, &ctx);
    assert!(graph.compile("PIXEL", &ctx).is_ok());
    assert!(graph.last_error().is_none());
}

#[test]
fn casts_wrap_linked_values() {
    let (namespace, pipeline) = (namespace(), pipeline());
    let ctx = SetupContext::new(&namespace, &pipeline);
    let mut graph = Graph::new("cast", "Mesh");
    let l = graph.add_node(Node::function("l", "luma"), &ctx);
    let r = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
    graph.connect(l, "result", r, "color", &ctx).unwrap();

    assert_eq!(
        graph.compile("PIXEL", &ctx).unwrap(),
        "float node_l_result = luma(vec4());\ncolor = vec4_from_float(node_l_result);\n"
    );
}

#[test]
fn links_pruned_when_cast_disappears() {
    let pipeline = pipeline();
    let with_cast = namespace();
    let ctx = SetupContext::new(&with_cast, &pipeline);
    let mut graph = Graph::new("prune", "Mesh");
    let l = graph.add_node(Node::function("l", "luma"), &ctx);
    let t = graph.add_node(Node::function("t", "tint"), &ctx);
    let r = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
    let cast_link = graph.connect(l, "result", r, "color", &ctx).unwrap();
    let kept = graph.connect(l, "result", t, "amount", &ctx).unwrap();

    let mut without_cast = namespace();
    without_cast.functions.shift_remove("vec4_from_float");
    let removed = graph.validate_links(&without_cast);

    assert_eq!(removed, vec![cast_link]);
    assert!(graph.link(kept).is_some());
    assert_eq!(graph.link_count(), 1);
}

#[test]
fn recompiling_is_byte_identical() {
    let (namespace, pipeline) = (namespace(), pipeline());
    let ctx = SetupContext::new(&namespace, &pipeline);
    let mut graph = Graph::new("stable", "Mesh");
    let r = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
    let t = graph.add_node(Node::function("t", "tint").with_default("amount", "0.5"), &ctx);
    let l = graph.add_node(Node::function("l", "luma"), &ctx);
    graph.connect(t, "result", l, "color", &ctx).unwrap();
    graph.connect(l, "result", r, "color", &ctx).unwrap();

    let first = graph.compile("PIXEL", &ctx).unwrap();
    for _ in 0..8 {
        assert_eq!(graph.compile("PIXEL", &ctx).unwrap(), first);
    }
    graph.mark_written();
    graph.update(&ctx).unwrap();
    assert!(!graph.has_pending_write());
}

#[test]
fn custom_outputs_get_increasing_slots() {
    let (namespace, pipeline) = (namespace(), pipeline());
    let ctx = SetupContext::new(&namespace, &pipeline);
    let mut graph = Graph::new("custom", "Mesh");
    let r = graph.add_node(Node::io("out", "PIXEL", true), &ctx);
    graph.add_custom_parameter(r, Some("Normal"), "vec4", &ctx).unwrap();
    graph.add_custom_parameter(r, Some("Depth"), "float", &ctx).unwrap();
    let l = graph.add_node(Node::function("l", "luma"), &ctx);
    graph.connect(l, "result", r, "Depth", &ctx).unwrap();

    let source = graph.compile("PIXEL", &ctx).unwrap();
    let normal = source.find("layout (location = 1) out vec4 OUT_PIXEL_Normal;").unwrap();
    let depth = source.find("layout (location = 2) out float OUT_PIXEL_Depth;").unwrap();
    assert!(normal < depth);
    assert!(source.contains("OUT_PIXEL_Depth = node_l_result;"));

    // Types outside the stage's dynamic set are refused
    assert!(graph.add_custom_parameter(r, Some("Bad"), "mat4", &ctx).is_err());
}

#[test]
fn stages_compile_independently() {
    let (namespace, pipeline) = (namespace(), pipeline());
    let ctx = SetupContext::new(&namespace, &pipeline);
    let mut graph = Graph::new("stages", "Mesh");
    let l = graph.add_node(Node::function("l", "luma"), &ctx);
    let pixel = graph.add_node(Node::io("pixel", "PIXEL", true), &ctx);
    let shadow = graph.add_node(Node::io("shadow", "SHADOW", true), &ctx);
    graph.connect(l, "result", pixel, "color", &ctx).unwrap();
    graph.connect(l, "result", shadow, "result", &ctx).unwrap();

    let keys: Vec<_> = graph.generated_sources().keys().cloned().collect();
    assert_eq!(keys, vec!["PIXEL".to_string(), "SHADOW".to_string()]);
    assert!(graph.generated_sources()["SHADOW"].ends_with("return node_l_result;\n"));
}
