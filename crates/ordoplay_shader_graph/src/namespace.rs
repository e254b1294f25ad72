// SPDX-License-Identifier: MIT OR Apache-2.0
//! Name resolution scope for one graph: pipeline built-ins plus its library.

use crate::library::Library;
use crate::pipeline::PipelineGraphDefinition;
use crate::signature::{cast_function_name, Signature, StructDefinition};
use indexmap::IndexMap;

/// Functions and structures visible to a graph
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    /// Functions by key
    pub functions: IndexMap<String, Signature>,
    /// Structures by name
    pub structs: IndexMap<String, StructDefinition>,
}

impl Namespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge pipeline built-ins with a library; library entries win on key collision
    pub fn merge(pipeline: Option<&PipelineGraphDefinition>, library: Option<&Library>) -> Self {
        let mut namespace = Self::new();
        if let Some(pipeline) = pipeline {
            namespace.extend(&pipeline.functions, &pipeline.structs);
        }
        if let Some(library) = library {
            namespace.extend(&library.functions, &library.structs);
        }
        namespace
    }

    fn extend(
        &mut self,
        functions: &IndexMap<String, Signature>,
        structs: &IndexMap<String, StructDefinition>,
    ) {
        for (key, function) in functions {
            self.functions.insert(key.clone(), function.clone());
        }
        for (name, definition) in structs {
            self.structs.insert(name.clone(), definition.clone());
        }
    }

    /// Add or replace a function under its name
    pub fn insert_function(&mut self, signature: Signature) {
        self.functions.insert(signature.name.clone(), signature);
    }

    /// Add or replace a structure
    pub fn insert_struct(&mut self, definition: StructDefinition) {
        self.structs.insert(definition.name.clone(), definition);
    }

    /// Get a function by key
    pub fn function(&self, key: &str) -> Option<&Signature> {
        self.functions.get(key)
    }

    /// Get a structure by name
    pub fn struct_definition(&self, name: &str) -> Option<&StructDefinition> {
        self.structs.get(name)
    }

    /// Cast function converting `from` into `to`, if one exists
    pub fn cast(&self, from: &str, to: &str) -> Option<&Signature> {
        let name = cast_function_name(from, to);
        self.functions
            .get(&name)
            .filter(|f| f.is_cast(from, to))
            .or_else(|| self.functions.values().find(|f| f.is_cast(from, to)))
    }

    /// Functions offered for node creation (internal ones hidden)
    pub fn visible_functions(&self) -> impl Iterator<Item = (&str, &Signature)> {
        self.functions
            .iter()
            .filter(|(_, f)| !f.meta.is_internal())
            .map(|(key, f)| (key.as_str(), f))
    }

    /// Structures offered for node creation (internal ones hidden)
    pub fn visible_structs(&self) -> impl Iterator<Item = &StructDefinition> {
        self.structs.values().filter(|s| !s.meta.is_internal())
    }

    /// Visible function keys grouped by provenance file, files sorted
    pub fn functions_by_file(&self) -> IndexMap<&str, Vec<&str>> {
        let mut grouped: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (key, function) in self.visible_functions() {
            grouped.entry(function.file.as_str()).or_default().push(key);
        }
        grouped.sort_keys();
        grouped
    }

    /// Display label for a function key: the `label` annotation, else the name
    pub fn function_label(&self, key: &str) -> Option<String> {
        let function = self.functions.get(key)?;
        Some(match function.meta.get("label") {
            Some(label) => label.to_string(),
            None if key != function.name => key.replace('_', " "),
            None => function.name.replace('_', " "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Language;
    use crate::signature::Parameter;

    fn pipeline() -> PipelineGraphDefinition {
        PipelineGraphDefinition::new("Mesh", Language::Glsl)
            .with_function(Signature::new("luma").returns("float").in_file("builtins"))
            .with_struct(StructDefinition::new("Surface"))
    }

    fn library(functions: Vec<Signature>) -> Library {
        Library {
            path: "lib.glsl".into(),
            functions: functions.into_iter().map(|f| (f.name.clone(), f)).collect(),
            structs: IndexMap::new(),
            included_paths: Default::default(),
            reflected_at: std::time::SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_library_overrides_pipeline() {
        let overriding = library(vec![Signature::new("luma").returns("vec3").in_file("lib.glsl")]);
        let namespace = Namespace::merge(Some(&pipeline()), Some(&overriding));
        assert_eq!(namespace.function("luma").unwrap().return_type.as_deref(), Some("vec3"));
        assert!(namespace.struct_definition("Surface").is_some());
    }

    #[test]
    fn test_cast_lookup() {
        let cast = Signature::new("float_from_vec3")
            .returns("float")
            .param(Parameter::new("v", "vec3"));
        let namespace = Namespace::merge(None, Some(&library(vec![cast])));
        assert!(namespace.cast("vec3", "float").is_some());
        assert!(namespace.cast("float", "vec3").is_none());
    }

    #[test]
    fn test_internal_functions_hidden() {
        let mut hidden = Signature::new("helper").in_file("lib.glsl");
        hidden.meta.insert("internal", "true");
        let visible = Signature::new("blend").in_file("lib.glsl");
        let namespace = Namespace::merge(Some(&pipeline()), Some(&library(vec![hidden, visible])));

        let keys: Vec<&str> = namespace.visible_functions().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["luma", "blend"]);

        let by_file = namespace.functions_by_file();
        assert_eq!(by_file.keys().copied().collect::<Vec<_>>(), vec!["builtins", "lib.glsl"]);
        assert_eq!(by_file["lib.glsl"], vec!["blend"]);
    }

    #[test]
    fn test_function_label() {
        let mut labelled = Signature::new("do_thing");
        labelled.meta.insert("label", "Thing");
        let plain = Signature::new("soft_light");
        let namespace = Namespace::merge(None, Some(&library(vec![labelled, plain])));
        assert_eq!(namespace.function_label("do_thing").as_deref(), Some("Thing"));
        assert_eq!(namespace.function_label("soft_light").as_deref(), Some("soft light"));
        assert_eq!(namespace.function_label("missing"), None);
    }
}
