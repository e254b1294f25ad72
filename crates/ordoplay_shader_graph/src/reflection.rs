// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reflection of function and structure declarations from shading source.
//!
//! The scanner understands the subset of C-like shading languages needed to
//! build node signatures:
//! - `struct Name { type a; type b[4], c; };`
//! - function definitions `[qualifiers] type name(params) { body }`
//! - `#include "path"` and `#include <path>` directives
//! - `/* META @meta: internal; @param: key=value; */` annotations
//!
//! Everything else at file scope (uniforms, layouts, globals, other
//! preprocessor lines) is skipped. Prototypes without a body are ignored.

use crate::signature::{Meta, Parameter, ParameterDirection, Signature, StructDefinition, StructMember};
use indexmap::{IndexMap, IndexSet};
use logos::Logos;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Shading source token.
///
/// Whitespace and `//` comments are skipped. Block comments are kept so the
/// scanner can pick up `META` annotations.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum Token<'s> {
    /// Preprocessor line, including backslash continuations
    #[regex(r"#([^\n\\]|\\[^\n]|\\\n)*", |lex| lex.slice())]
    Directive(&'s str),

    /// `/* ... */`
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", |lex| lex.slice())]
    BlockComment(&'s str),

    /// Identifier or keyword
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Ident(&'s str),

    /// Numeric literal
    #[regex(r"[0-9][0-9A-Za-z_.]*", |lex| lex.slice())]
    Number(&'s str),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("=")]
    Assign,

    /// Any other operator character
    #[regex(r"[+\-*/%<>!&|^~?:.\\]")]
    Symbol,
}

/// Qualifiers that carry no information for node signatures
const IGNORED_QUALIFIERS: &[&str] = &[
    "const",
    "highp",
    "mediump",
    "lowp",
    "precise",
    "invariant",
    "flat",
    "smooth",
    "noperspective",
    "inline",
    "static",
];

/// Declarations found in a single source file
#[derive(Debug, Clone, Default)]
pub struct SourceDeclarations {
    /// Function definitions in source order
    pub functions: Vec<Signature>,
    /// Structure definitions in source order
    pub structs: Vec<StructDefinition>,
    /// Include directives in source order
    pub includes: Vec<String>,
}

/// Merged declarations of a file and everything it includes
#[derive(Debug, Clone, Default)]
pub struct Reflection {
    /// Functions keyed by name, or by declaration for overloads
    pub functions: IndexMap<String, Signature>,
    /// Structures keyed by name
    pub structs: IndexMap<String, StructDefinition>,
    /// Every file read, root first
    pub paths: IndexSet<PathBuf>,
}

impl Reflection {
    /// Key a flat list of declarations.
    ///
    /// Functions with a unique name are keyed by that name. Overloaded
    /// functions are keyed by their full declaration.
    pub fn from_declarations(functions: Vec<Signature>, structs: Vec<StructDefinition>) -> Self {
        let mut name_counts: IndexMap<&str, usize> = IndexMap::new();
        for function in &functions {
            *name_counts.entry(function.name.as_str()).or_insert(0) += 1;
        }
        let overloaded: IndexSet<String> = name_counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_string())
            .collect();

        let mut keyed = IndexMap::new();
        for function in functions {
            let key = if overloaded.contains(&function.name) {
                function.declaration()
            } else {
                function.name.clone()
            };
            keyed.insert(key, function);
        }

        Self {
            functions: keyed,
            structs: structs.into_iter().map(|s| (s.name.clone(), s)).collect(),
            paths: IndexSet::new(),
        }
    }
}

/// Error while reflecting a source file
#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    /// The file could not be read
    #[error("Failed to read {path:?}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// An include directive could not be resolved
    #[error("Include {include:?} in {from:?} not found")]
    IncludeNotFound {
        /// Path as written in the directive
        include: String,
        /// File containing the directive
        from: PathBuf,
    },

    /// Source contained a character the lexer does not understand
    #[error("Unexpected input in {file} at byte {offset}")]
    Lex {
        /// File label
        file: String,
        /// Byte offset
        offset: usize,
    },

    /// A declaration was cut off by the end of the file
    #[error("Unterminated declaration in {file} at byte {offset}")]
    Unterminated {
        /// File label
        file: String,
        /// Byte offset where the declaration started
        offset: usize,
    },
}

/// Scan one source string. `file` is recorded as the provenance of every declaration.
pub fn reflect_source(source: &str, file: &str) -> Result<SourceDeclarations, ReflectionError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                return Err(ReflectionError::Lex {
                    file: file.to_string(),
                    offset: lexer.span().start,
                })
            }
        }
    }

    Scanner { tokens, pos: 0, file }.run()
}

/// Reflect a file and, transitively, every file it includes.
///
/// Includes resolve relative to the including file first, then against each
/// of `include_dirs`. Every file is read once. Provenance labels are relative
/// to the root file's directory where possible.
pub fn reflect_file(path: &Path, include_dirs: &[PathBuf]) -> Result<Reflection, ReflectionError> {
    let root_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut visited = IndexSet::new();
    let mut paths = IndexSet::new();
    let mut functions = Vec::new();
    let mut structs = Vec::new();

    visit_file(
        path,
        &root_dir,
        include_dirs,
        &mut visited,
        &mut paths,
        &mut functions,
        &mut structs,
    )?;

    let mut reflection = Reflection::from_declarations(functions, structs);
    reflection.paths = paths;
    Ok(reflection)
}

fn visit_file(
    path: &Path,
    root_dir: &Path,
    include_dirs: &[PathBuf],
    visited: &mut IndexSet<PathBuf>,
    paths: &mut IndexSet<PathBuf>,
    functions: &mut Vec<Signature>,
    structs: &mut Vec<StructDefinition>,
) -> Result<(), ReflectionError> {
    let identity = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(identity) {
        return Ok(());
    }
    paths.insert(path.to_path_buf());

    let source = std::fs::read_to_string(path).map_err(|source| ReflectionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let label = file_label(path, root_dir);
    let declarations = reflect_source(&source, &label)?;

    let from_dir = path.parent().unwrap_or(root_dir);
    for include in &declarations.includes {
        let resolved = resolve_include(include, from_dir, include_dirs).ok_or_else(|| {
            ReflectionError::IncludeNotFound {
                include: include.clone(),
                from: path.to_path_buf(),
            }
        })?;
        visit_file(&resolved, root_dir, include_dirs, visited, paths, functions, structs)?;
    }

    functions.extend(declarations.functions);
    structs.extend(declarations.structs);
    Ok(())
}

fn resolve_include(include: &str, from_dir: &Path, include_dirs: &[PathBuf]) -> Option<PathBuf> {
    std::iter::once(from_dir)
        .chain(include_dirs.iter().map(PathBuf::as_path))
        .map(|dir| dir.join(include))
        .find(|candidate| candidate.is_file())
}

fn file_label(path: &Path, root_dir: &Path) -> String {
    path.strip_prefix(root_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Parse the target of an `#include` directive
fn parse_include(directive: &str) -> Option<String> {
    let rest = directive.strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("include")?.trim();
    let (open, close) = match rest.chars().next()? {
        '"' => ('"', '"'),
        '<' => ('<', '>'),
        _ => return None,
    };
    let inner = rest.strip_prefix(open)?;
    let end = inner.find(close)?;
    Some(inner[..end].to_string())
}

/// Annotations parsed from a `/* META ... */` comment
#[derive(Debug, Default)]
struct ParsedMeta {
    declaration: Meta,
    targets: IndexMap<String, Meta>,
}

fn parse_meta(comment: &str) -> Option<ParsedMeta> {
    let body = comment.strip_prefix("/*")?.strip_suffix("*/")?.trim();
    let body = body.strip_prefix("META")?;

    let mut parsed = ParsedMeta::default();
    for entry in body.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (target, items) = match entry.strip_prefix('@') {
            Some(rest) => match rest.split_once(':') {
                Some((target, items)) => (Some(target.trim()), items),
                None => (Some(rest.trim()), ""),
            },
            None => (None, entry),
        };
        let meta = match target {
            None | Some("meta") => &mut parsed.declaration,
            Some(name) => parsed.targets.entry(name.to_string()).or_default(),
        };
        for item in items.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            match item.split_once('=') {
                Some((key, value)) => meta.insert(key.trim(), value.trim()),
                None => meta.insert(item, "true"),
            }
        }
    }
    Some(parsed)
}

struct Scanner<'s> {
    tokens: Vec<(Token<'s>, Range<usize>)>,
    pos: usize,
    file: &'s str,
}

impl<'s> Scanner<'s> {
    fn run(mut self) -> Result<SourceDeclarations, ReflectionError> {
        let mut out = SourceDeclarations::default();
        let mut pending_meta = None;

        while let Some(token) = self.peek() {
            match token {
                Token::Directive(text) => {
                    self.pos += 1;
                    if let Some(include) = parse_include(text) {
                        out.includes.push(include);
                    }
                }
                Token::BlockComment(text) => {
                    self.pos += 1;
                    if let Some(meta) = parse_meta(text) {
                        pending_meta = Some(meta);
                    }
                }
                Token::Ident("struct") => {
                    let meta = pending_meta.take();
                    if let Some(definition) = self.parse_struct(meta)? {
                        out.structs.push(definition);
                    }
                }
                _ => {
                    let meta = pending_meta.take();
                    if let Some(function) = self.parse_declaration(meta)? {
                        out.functions.push(function);
                    }
                }
            }
        }

        Ok(out)
    }

    fn peek(&self) -> Option<Token<'s>> {
        self.tokens.get(self.pos).map(|(t, _)| *t)
    }

    fn offset(&self, pos: usize) -> usize {
        self.tokens
            .get(pos)
            .map(|(_, span)| span.start)
            .unwrap_or_default()
    }

    fn unterminated(&self, start: usize) -> ReflectionError {
        ReflectionError::Unterminated {
            file: self.file.to_string(),
            offset: self.offset(start),
        }
    }

    /// Index just past the bracket matching the opener at `open`
    fn matching_close(&self, open: usize) -> Result<usize, ReflectionError> {
        let mut depth = 0usize;
        for (i, (token, _)) in self.tokens.iter().enumerate().skip(open) {
            match token {
                Token::LParen | Token::LBrace | Token::LBracket => depth += 1,
                Token::RParen | Token::RBrace | Token::RBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(i + 1);
                    }
                }
                _ => {}
            }
        }
        Err(self.unterminated(open))
    }

    /// Skip to just past the next `;` outside any brackets
    fn skip_statement(&mut self) -> Result<(), ReflectionError> {
        let start = self.pos;
        while let Some(token) = self.peek() {
            match token {
                Token::Semicolon => {
                    self.pos += 1;
                    return Ok(());
                }
                Token::LParen | Token::LBrace | Token::LBracket => {
                    self.pos = self.matching_close(self.pos)?;
                }
                Token::Directive(_) if self.pos > start => return Ok(()),
                _ => self.pos += 1,
            }
        }
        Ok(())
    }

    fn parse_struct(&mut self, meta: Option<ParsedMeta>) -> Result<Option<StructDefinition>, ReflectionError> {
        let start = self.pos;
        self.pos += 1;
        let Some(Token::Ident(name)) = self.peek() else {
            self.skip_statement()?;
            return Ok(None);
        };
        self.pos += 1;
        if self.peek() != Some(Token::LBrace) {
            self.skip_statement()?;
            return Ok(None);
        }

        let body_end = self.matching_close(self.pos).map_err(|_| self.unterminated(start))?;
        let body: Vec<Token<'s>> = self.tokens[self.pos + 1..body_end - 1]
            .iter()
            .map(|(t, _)| *t)
            .filter(|t| !matches!(t, Token::BlockComment(_) | Token::Directive(_)))
            .collect();
        self.pos = body_end;
        // Trailing declarators (`} instance;`)
        self.skip_statement()?;

        let meta = meta.unwrap_or_default();
        let mut definition = StructDefinition::new(name).in_file(self.file);
        definition.meta = meta.declaration;

        for statement in body.split(|t| *t == Token::Semicolon) {
            let mut idents = statement.iter();
            let mut ty = None;
            while let Some(token) = idents.next() {
                if let Token::Ident(word) = token {
                    if !IGNORED_QUALIFIERS.contains(word) {
                        ty = Some(*word);
                        break;
                    }
                }
            }
            let Some(ty) = ty else { continue };
            let rest: Vec<Token<'s>> = idents.copied().collect();
            for declarator in rest.split(|t| *t == Token::Comma) {
                let Some((member_name, array_size)) = parse_declarator(declarator) else {
                    continue;
                };
                let mut member = StructMember::new(member_name, ty);
                member.array_size = array_size;
                if let Some(member_meta) = meta.targets.get(member_name) {
                    member.meta = member_meta.clone();
                }
                definition.members.push(member);
            }
        }

        Ok(Some(definition))
    }

    fn parse_declaration(&mut self, meta: Option<ParsedMeta>) -> Result<Option<Signature>, ReflectionError> {
        let start = self.pos;
        let mut head = Vec::new();

        while let Some(token) = self.peek() {
            match token {
                Token::LParen | Token::LBrace | Token::Semicolon | Token::Assign => break,
                Token::Directive(_) => return Ok(None),
                Token::RParen | Token::RBrace | Token::RBracket if head.is_empty() => {
                    // Stray closer at file scope
                    self.pos += 1;
                    return Ok(None);
                }
                Token::BlockComment(_) => self.pos += 1,
                _ => {
                    head.push(token);
                    self.pos += 1;
                }
            }
        }

        match self.peek() {
            Some(Token::LParen) => {}
            Some(Token::LBrace) => {
                self.pos = self.matching_close(self.pos)?;
                self.skip_statement()?;
                return Ok(None);
            }
            Some(_) => {
                self.skip_statement()?;
                return Ok(None);
            }
            None => return Ok(None),
        }

        let words: Vec<&str> = head
            .iter()
            .filter_map(|t| match t {
                Token::Ident(w) if !IGNORED_QUALIFIERS.contains(w) => Some(*w),
                _ => None,
            })
            .collect();
        let is_function_head = head.len() >= 2
            && matches!(head[head.len() - 1], Token::Ident(_))
            && matches!(head[head.len() - 2], Token::Ident(_))
            && words.len() >= 2;
        if !is_function_head {
            self.skip_statement()?;
            return Ok(None);
        }
        let name = words[words.len() - 1];
        let return_type = words[words.len() - 2];

        let params_end = self.matching_close(self.pos).map_err(|_| self.unterminated(start))?;
        let params: Vec<Token<'s>> = self.tokens[self.pos + 1..params_end - 1]
            .iter()
            .map(|(t, _)| *t)
            .filter(|t| !matches!(t, Token::BlockComment(_)))
            .collect();
        self.pos = params_end;

        match self.peek() {
            Some(Token::LBrace) => {
                self.pos = self.matching_close(self.pos).map_err(|_| self.unterminated(start))?;
            }
            Some(Token::Semicolon) => {
                self.pos += 1;
                return Ok(None);
            }
            _ => {
                self.skip_statement()?;
                return Ok(None);
            }
        }

        let meta = meta.unwrap_or_default();
        let mut signature = Signature::new(name).in_file(self.file);
        if return_type != "void" {
            signature.return_type = Some(return_type.to_string());
        }
        signature.meta = meta.declaration;

        for (index, chunk) in split_params(&params).into_iter().enumerate() {
            if let [Token::Ident("void")] = chunk.as_slice() {
                continue;
            }
            let Some(mut parameter) = parse_parameter(&chunk, index) else {
                continue;
            };
            if let Some(param_meta) = meta.targets.get(&parameter.name) {
                parameter.meta = param_meta.clone();
            }
            signature.parameters.push(parameter);
        }

        Ok(Some(signature))
    }
}

fn split_params<'s>(tokens: &[Token<'s>]) -> Vec<Vec<Token<'s>>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    for token in tokens {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                chunks.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(*token);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn parse_parameter(tokens: &[Token<'_>], index: usize) -> Option<Parameter> {
    let mut direction = ParameterDirection::In;
    let mut words = Vec::new();
    let mut array_size = 0;

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token {
            Token::Ident("in") => direction = ParameterDirection::In,
            Token::Ident("out") => direction = ParameterDirection::Out,
            Token::Ident("inout") => direction = ParameterDirection::InOut,
            Token::Ident(w) if IGNORED_QUALIFIERS.contains(w) => {}
            Token::Ident(w) => words.push(*w),
            Token::LBracket => {
                array_size = parse_array_size(iter.next());
            }
            Token::Assign => break,
            _ => {}
        }
    }

    let ty = words.first()?;
    let name = words
        .get(1)
        .map(|n| (*n).to_string())
        .unwrap_or_else(|| format!("param_{index}"));
    Some(
        Parameter::new(name, *ty)
            .with_direction(direction)
            .with_array_size(array_size),
    )
}

fn parse_declarator<'s>(tokens: &[Token<'s>]) -> Option<(&'s str, u32)> {
    let mut name = None;
    let mut array_size = 0;
    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token {
            Token::Ident(w) if name.is_none() => name = Some(*w),
            Token::LBracket => array_size = parse_array_size(iter.next()),
            _ => {}
        }
    }
    name.map(|n| (n, array_size))
}

fn parse_array_size(token: Option<&Token<'_>>) -> u32 {
    match token {
        Some(Token::Number(n)) => n.trim_end_matches(['u', 'U']).parse().unwrap_or_else(|_| {
            tracing::warn!("Unsupported array size literal {n:?}, treating as unsized");
            0
        }),
        Some(Token::Ident(macro_name)) => {
            tracing::warn!("Array size {macro_name:?} is a macro, treating as unsized");
            0
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
#include "Common.glsl"
#define PI 3.14159

uniform sampler2D albedo;
layout(location = 0) out vec4 OUT_COLOR;

struct Light
{
    vec3 color;
    float intensity, radius;
    vec4 cascades[4];
};

/* META
    @meta: internal;
    @t: default=0.5;
*/
vec3 blend(vec3 a, vec3 b, float t)
{
    return mix(a, b, t);
}

void split(in vec4 v, out vec3 rgb, inout float a)
{
    rgb = v.rgb; { a *= v.a; }
}

float prototype_only(float x);
"#;

    #[test]
    fn test_reflect_source() {
        let decls = reflect_source(SOURCE, "Test.glsl").unwrap();

        assert_eq!(decls.includes, vec!["Common.glsl".to_string()]);

        assert_eq!(decls.structs.len(), 1);
        let light = &decls.structs[0];
        assert_eq!(light.name, "Light");
        let members: Vec<_> = light.members.iter().map(|m| (m.name.as_str(), m.ty.as_str(), m.array_size)).collect();
        assert_eq!(
            members,
            vec![
                ("color", "vec3", 0),
                ("intensity", "float", 0),
                ("radius", "float", 0),
                ("cascades", "vec4", 4),
            ]
        );

        let names: Vec<_> = decls.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["blend", "split"]);

        let blend = &decls.functions[0];
        assert_eq!(blend.return_type.as_deref(), Some("vec3"));
        assert_eq!(blend.file, "Test.glsl");
        assert!(blend.meta.is_internal());
        assert_eq!(blend.parameter("t").unwrap().meta.get("default"), Some("0.5"));

        let split = &decls.functions[1];
        assert_eq!(split.return_type, None);
        let dirs: Vec<_> = split.parameters.iter().map(|p| p.direction).collect();
        assert_eq!(
            dirs,
            vec![ParameterDirection::In, ParameterDirection::Out, ParameterDirection::InOut]
        );
    }

    #[test]
    fn test_void_parameter_list() {
        let decls = reflect_source("float zero(void) { return 0.0; }", "z.glsl").unwrap();
        assert!(decls.functions[0].parameters.is_empty());
    }

    #[test]
    fn test_overloads_keyed_by_declaration() {
        let decls = reflect_source(
            "float luma(vec3 c) { return c.r; }\nfloat luma(vec4 c) { return c.r; }\nfloat one() { return 1.0; }",
            "l.glsl",
        )
        .unwrap();
        let reflection = Reflection::from_declarations(decls.functions, decls.structs);
        let keys: Vec<_> = reflection.functions.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["luma(in vec3 c)".to_string(), "luma(in vec4 c)".to_string(), "one".to_string()]
        );
    }

    #[test]
    fn test_unterminated_body_is_an_error() {
        let result = reflect_source("void broken() { if (x) {", "b.glsl");
        assert!(matches!(result, Err(ReflectionError::Unterminated { .. })));
    }

    #[test]
    fn test_reflect_file_follows_includes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("shared")).unwrap();
        std::fs::write(
            dir.path().join("shared/Math.glsl"),
            "float square(float x) { return x * x; }\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Library.glsl"),
            "#include \"shared/Math.glsl\"\n#include \"shared/Math.glsl\"\nstruct Surface { vec3 normal; };\n",
        )
        .unwrap();

        let reflection = reflect_file(&dir.path().join("Library.glsl"), &[]).unwrap();
        assert!(reflection.functions.contains_key("square"));
        assert_eq!(reflection.functions["square"].file, "shared/Math.glsl");
        assert!(reflection.structs.contains_key("Surface"));
        assert_eq!(reflection.paths.len(), 2);
    }

    #[test]
    fn test_missing_include_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Library.glsl"), "#include \"Missing.glsl\"\n").unwrap();
        let result = reflect_file(&dir.path().join("Library.glsl"), &[]);
        assert!(matches!(result, Err(ReflectionError::IncludeNotFound { .. })));
    }

    #[test]
    fn test_include_dirs_are_searched() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        std::fs::write(shared.path().join("Noise.glsl"), "float noise(vec3 p) { return 0.0; }\n").unwrap();
        std::fs::write(dir.path().join("Library.glsl"), "#include <Noise.glsl>\n").unwrap();

        let reflection =
            reflect_file(&dir.path().join("Library.glsl"), &[shared.path().to_path_buf()]).unwrap();
        assert!(reflection.functions.contains_key("noise"));
    }
}
