// SPDX-License-Identifier: MIT OR Apache-2.0
//! Target language formatting.
//!
//! Node code generation never writes language syntax directly. Every
//! declaration, call and reference goes through a [`Transpiler`].

use crate::signature::Signature;

/// Side of a stage interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoDirection {
    /// Value read by the stage
    In,
    /// Value written by the stage
    Out,
}

impl IoDirection {
    fn prefix(self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
        }
    }
}

/// Replace every character that cannot appear in an identifier with `_`.
///
/// Runs of replaced characters collapse to a single `_` and a leading digit
/// is prefixed with `_`.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Formats code fragments for one target language
pub trait Transpiler: Sync {
    /// Language name, used in diagnostics
    fn name(&self) -> &'static str;

    /// Local variable declaration, default-constructed when `initialization` is `None`
    fn declaration(&self, ty: &str, array_size: u32, name: &str, initialization: Option<&str>) -> String;

    /// Assignment statement
    fn assignment(&self, name: &str, value: &str) -> String;

    /// Call expression
    fn call(&self, function: &str, arguments: &[String]) -> String {
        format!("{function}({})", arguments.join(", "))
    }

    /// Expression or user code as a statement
    fn statement(&self, code: &str) -> String;

    /// Return statement
    fn result(&self, value: &str) -> String;

    /// Default-constructed value of a type
    fn default_value(&self, ty: &str, array_size: u32) -> String;

    /// Global (uniform) declaration for a custom stage input
    fn global_declaration(&self, ty: &str, array_size: u32, name: &str) -> String;

    /// Output slot declaration for a custom stage output
    fn custom_output_declaration(
        &self,
        ty: &str,
        name: &str,
        index: u32,
        shader_type: Option<&str>,
    ) -> String;

    /// Include a library file
    fn include(&self, path: &str) -> String;

    /// Single line comment
    fn comment(&self, text: &str) -> String;

    /// Wrap code in its own scope
    fn scoped(&self, code: &str) -> String;

    /// Stage entry point wrapping a body
    fn stage_function(&self, signature: &Signature, body: &str) -> String;

    /// Reference to a fixed stage parameter
    fn io_parameter_reference(&self, name: &str, _direction: IoDirection) -> String {
        name.to_string()
    }

    /// Reference to a custom stage parameter
    fn custom_io_reference(&self, direction: IoDirection, stage: &str, name: &str) -> String {
        format!(
            "{}_{}_{}",
            direction.prefix(),
            sanitize_identifier(stage).to_uppercase(),
            sanitize_identifier(name)
        )
    }

    /// Local variable holding a node's own value
    fn node_reference(&self, node_name: &str) -> String {
        format!("node_{}", sanitize_identifier(node_name))
    }

    /// Local variable holding one of a node's output values
    fn parameter_reference(&self, node_name: &str, socket_name: &str) -> String {
        format!(
            "{}_{}",
            self.node_reference(node_name),
            sanitize_identifier(socket_name)
        )
    }

    /// Structure member access
    fn member_reference(&self, base: &str, member: &str) -> String {
        format!("{base}.{member}")
    }
}

fn indent(code: &str, prefix: &str) -> String {
    code.lines()
        .map(|line| {
            if line.is_empty() {
                "\n".to_string()
            } else {
                format!("{prefix}{line}\n")
            }
        })
        .collect()
}

/// OpenGL shading language
#[derive(Debug, Clone, Copy, Default)]
pub struct GlslTranspiler;

impl GlslTranspiler {
    fn array_suffix(array_size: u32) -> String {
        if array_size > 0 {
            format!("[{array_size}]")
        } else {
            String::new()
        }
    }
}

impl Transpiler for GlslTranspiler {
    fn name(&self) -> &'static str {
        "GLSL"
    }

    fn declaration(&self, ty: &str, array_size: u32, name: &str, initialization: Option<&str>) -> String {
        let value = match initialization {
            Some(value) => value.to_string(),
            None => self.default_value(ty, array_size),
        };
        format!("{ty} {name}{} = {value};\n", Self::array_suffix(array_size))
    }

    fn assignment(&self, name: &str, value: &str) -> String {
        format!("{name} = {value};\n")
    }

    fn statement(&self, code: &str) -> String {
        let code = code.trim_end();
        if code.ends_with(';') || code.ends_with('}') {
            format!("{code}\n")
        } else {
            format!("{code};\n")
        }
    }

    fn result(&self, value: &str) -> String {
        format!("return {value};\n")
    }

    fn default_value(&self, ty: &str, array_size: u32) -> String {
        format!("{ty}{}()", Self::array_suffix(array_size))
    }

    fn global_declaration(&self, ty: &str, array_size: u32, name: &str) -> String {
        format!("uniform {ty} {name}{};\n", Self::array_suffix(array_size))
    }

    fn custom_output_declaration(
        &self,
        ty: &str,
        name: &str,
        index: u32,
        shader_type: Option<&str>,
    ) -> String {
        let declaration = format!("layout (location = {index}) out {ty} {name};\n");
        match shader_type {
            Some(guard) => format!("#ifdef {guard}\n{declaration}#endif\n"),
            None => declaration,
        }
    }

    fn include(&self, path: &str) -> String {
        format!("#include \"{}\"\n", path.replace('\\', "/"))
    }

    fn comment(&self, text: &str) -> String {
        format!("// {text}\n")
    }

    fn scoped(&self, code: &str) -> String {
        format!("{{\n{}}}\n", indent(code, "    "))
    }

    fn stage_function(&self, signature: &Signature, body: &str) -> String {
        let parameters: Vec<String> = signature
            .parameters
            .iter()
            .map(|p| {
                format!(
                    "{} {} {}{}",
                    p.direction.keyword(),
                    p.ty,
                    p.name,
                    Self::array_suffix(p.array_size)
                )
            })
            .collect();
        format!(
            "{} {}({})\n{{\n{}}}\n",
            signature.return_type.as_deref().unwrap_or("void"),
            signature.name,
            parameters.join(", "),
            indent(body, "    ")
        )
    }
}

/// Python, for CPU-side graphs
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonTranspiler;

impl Transpiler for PythonTranspiler {
    fn name(&self) -> &'static str {
        "Python"
    }

    fn declaration(&self, ty: &str, array_size: u32, name: &str, initialization: Option<&str>) -> String {
        let value = match initialization {
            Some(value) => value.to_string(),
            None => self.default_value(ty, array_size),
        };
        format!("{name} = {value}\n")
    }

    fn assignment(&self, name: &str, value: &str) -> String {
        format!("{name} = {value}\n")
    }

    fn statement(&self, code: &str) -> String {
        format!("{}\n", code.trim_end())
    }

    fn result(&self, value: &str) -> String {
        format!("return {value}\n")
    }

    fn default_value(&self, ty: &str, array_size: u32) -> String {
        if array_size > 0 {
            format!("[{ty}() for _ in range({array_size})]")
        } else {
            format!("{ty}()")
        }
    }

    fn global_declaration(&self, _ty: &str, _array_size: u32, name: &str) -> String {
        format!("{name} = None\n")
    }

    fn custom_output_declaration(
        &self,
        _ty: &str,
        name: &str,
        _index: u32,
        _shader_type: Option<&str>,
    ) -> String {
        format!("{name} = None\n")
    }

    fn include(&self, path: &str) -> String {
        format!("exec(open(r'{path}').read())\n")
    }

    fn comment(&self, text: &str) -> String {
        format!("# {text}\n")
    }

    fn scoped(&self, code: &str) -> String {
        if code.trim().is_empty() {
            return "pass\n".to_string();
        }
        format!("if True:\n{}", indent(code, "    "))
    }

    fn stage_function(&self, signature: &Signature, body: &str) -> String {
        let parameters: Vec<&str> = signature.parameters.iter().map(|p| p.name.as_str()).collect();
        let body = if body.trim().is_empty() { "pass\n" } else { body };
        format!(
            "def {}({}):\n{}",
            signature.name,
            parameters.join(", "),
            indent(body, "    ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Parameter, ParameterDirection};

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("Custom Output 1"), "Custom_Output_1");
        assert_eq!(sanitize_identifier("Mix.001"), "Mix_001");
        assert_eq!(sanitize_identifier("3d  noise"), "_3d_noise");
    }

    #[test]
    fn test_glsl_fragments() {
        let glsl = GlslTranspiler;
        assert_eq!(glsl.declaration("vec3", 0, "a", None), "vec3 a = vec3();\n");
        assert_eq!(glsl.declaration("float", 4, "w", Some("x")), "float w[4] = x;\n");
        assert_eq!(glsl.call("mix", &["a".into(), "b".into()]), "mix(a, b)");
        assert_eq!(glsl.statement("foo(a)"), "foo(a);\n");
        assert_eq!(glsl.statement("foo(a);"), "foo(a);\n");
        assert_eq!(
            glsl.custom_io_reference(IoDirection::Out, "Pixel", "Custom Output 1"),
            "OUT_PIXEL_Custom_Output_1"
        );
        assert_eq!(glsl.parameter_reference("Mix.001", "result"), "node_Mix_001_result");
        assert_eq!(
            glsl.custom_output_declaration("vec4", "OUT_X", 2, Some("PIXEL_SHADER")),
            "#ifdef PIXEL_SHADER\nlayout (location = 2) out vec4 OUT_X;\n#endif\n"
        );
    }

    #[test]
    fn test_glsl_stage_function() {
        let signature = Signature::new("PIXEL_SHADER")
            .param(Parameter::new("S", "Surface").with_direction(ParameterDirection::InOut));
        assert_eq!(
            GlslTranspiler.stage_function(&signature, "S.x = 1.0;\n"),
            "void PIXEL_SHADER(inout Surface S)\n{\n    S.x = 1.0;\n}\n"
        );
    }

    #[test]
    fn test_python_fragments() {
        let python = PythonTranspiler;
        assert_eq!(python.declaration("float", 0, "a", None), "a = float()\n");
        assert_eq!(python.result("a"), "return a\n");
        assert_eq!(python.scoped("x = 1\n"), "if True:\n    x = 1\n");
        let signature = Signature::new("main").param(Parameter::new("uv", "vec2"));
        assert_eq!(python.stage_function(&signature, ""), "def main(uv):\n    pass\n");
    }
}
