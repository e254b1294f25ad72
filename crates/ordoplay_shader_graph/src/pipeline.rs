// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pipeline graph definitions: the per-stage contracts a graph compiles against.
//!
//! A pipeline definition is supplied by the render pipeline and is read-only
//! to the compiler. It names each stage's fixed entry point signature, the
//! types users may pick for custom stage parameters, and the built-in
//! functions and structures every graph of this type can use.

use crate::signature::{Signature, StructDefinition};
use crate::transpiler::{GlslTranspiler, PythonTranspiler, Transpiler};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Target language of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// OpenGL shading language
    #[default]
    Glsl,
    /// Python (CPU-side procedural graphs)
    Python,
}

static GLSL: GlslTranspiler = GlslTranspiler;
static PYTHON: PythonTranspiler = PythonTranspiler;

impl Language {
    /// Transpiler for this language
    pub fn transpiler(self) -> &'static dyn Transpiler {
        match self {
            Self::Glsl => &GLSL,
            Self::Python => &PYTHON,
        }
    }
}

/// Contract of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Fixed entry point signature
    pub signature: Signature,
    /// Types allowed for custom input parameters
    #[serde(default)]
    pub dynamic_input_types: IndexSet<String>,
    /// Types allowed for custom output parameters
    #[serde(default)]
    pub dynamic_output_types: IndexSet<String>,
    /// Extension of generated files for this stage
    #[serde(default)]
    pub file_extension: String,
    /// First output slot for custom outputs
    #[serde(default)]
    pub custom_output_start_index: Option<u32>,
    /// Preprocessor guard for custom output declarations
    #[serde(default)]
    pub shader_type: Option<String>,
}

impl StageDefinition {
    /// Create a stage with no custom parameter support
    pub fn new(signature: Signature, file_extension: impl Into<String>) -> Self {
        Self {
            signature,
            dynamic_input_types: IndexSet::new(),
            dynamic_output_types: IndexSet::new(),
            file_extension: file_extension.into(),
            custom_output_start_index: None,
            shader_type: None,
        }
    }

    /// Allow custom input parameters of these types
    pub fn with_dynamic_inputs<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dynamic_input_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Allow custom output parameters of these types
    pub fn with_dynamic_outputs<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dynamic_output_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Permissible custom parameter types for one side of the stage
    pub fn dynamic_types(&self, is_output: bool) -> &IndexSet<String> {
        if is_output {
            &self.dynamic_output_types
        } else {
            &self.dynamic_input_types
        }
    }
}

/// A pipeline's full set of stage contracts and built-ins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineGraphDefinition {
    /// Graph type name (e.g. "Mesh", "Screen")
    pub name: String,
    /// Target language
    #[serde(default)]
    pub language: Language,
    /// Stages by name, in declaration order
    pub stages: IndexMap<String, StageDefinition>,
    /// Built-in functions
    #[serde(default)]
    pub functions: IndexMap<String, Signature>,
    /// Built-in structures
    #[serde(default)]
    pub structs: IndexMap<String, StructDefinition>,
    /// File this definition was loaded from
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl PipelineGraphDefinition {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>, language: Language) -> Self {
        Self {
            name: name.into(),
            language,
            stages: IndexMap::new(),
            functions: IndexMap::new(),
            structs: IndexMap::new(),
            source_path: None,
        }
    }

    /// Add a stage
    pub fn with_stage(mut self, name: impl Into<String>, stage: StageDefinition) -> Self {
        self.stages.insert(name.into(), stage);
        self
    }

    /// Add a built-in function keyed by its name
    pub fn with_function(mut self, signature: Signature) -> Self {
        self.functions.insert(signature.name.clone(), signature);
        self
    }

    /// Add a built-in structure
    pub fn with_struct(mut self, definition: StructDefinition) -> Self {
        self.structs.insert(definition.name.clone(), definition);
        self
    }

    /// Get a stage by name
    pub fn stage(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.get(name)
    }

    /// Transpiler for this pipeline's language
    pub fn transpiler(&self) -> &'static dyn Transpiler {
        self.language.transpiler()
    }

    /// Parse a definition from RON text
    pub fn from_ron(source: &str) -> Result<Self, PipelineError> {
        ron::from_str(source).map_err(|source| PipelineError::Parse { path: None, source })
    }

    /// Load a definition from a RON file
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut definition: Self = ron::from_str(&content).map_err(|source| PipelineError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        definition.source_path = Some(path.to_path_buf());
        Ok(definition)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        ron::ser::to_string_pretty(self, config)
    }
}

/// Error loading a pipeline definition
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// File could not be read
    #[error("Failed to read pipeline {path:?}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid definition
    #[error("Invalid pipeline definition {path:?}: {source}")]
    Parse {
        /// File path, if loaded from disk
        path: Option<PathBuf>,
        /// Underlying error
        #[source]
        source: ron::error::SpannedError,
    },

    /// Pipeline has no backing file to reload from
    #[error("Pipeline {0:?} was not loaded from a file")]
    NotReloadable(String),

    /// No pipeline with this name
    #[error("Unknown pipeline {0:?}")]
    Unknown(String),
}

/// Registered pipeline definitions by graph type name
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: IndexMap<String, PipelineGraphDefinition>,
}

impl PipelineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any with the same name
    pub fn register(&mut self, definition: PipelineGraphDefinition) -> Option<PipelineGraphDefinition> {
        self.pipelines.insert(definition.name.clone(), definition)
    }

    /// Load and register a definition from a RON file
    pub fn load(&mut self, path: &Path) -> Result<String, PipelineError> {
        let definition = PipelineGraphDefinition::load(path)?;
        let name = definition.name.clone();
        tracing::info!("Loaded pipeline {name:?} from {path:?}");
        self.register(definition);
        Ok(name)
    }

    /// Get a definition by name
    pub fn get(&self, name: &str) -> Option<&PipelineGraphDefinition> {
        self.pipelines.get(name)
    }

    /// Registered names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    /// Whether the definition's source file changed after `checkpoint`
    pub fn needs_reload(&self, name: &str, checkpoint: SystemTime) -> bool {
        self.pipelines
            .get(name)
            .and_then(|p| p.source_path.as_deref())
            .and_then(|path| std::fs::metadata(path).and_then(|m| m.modified()).ok())
            .is_some_and(|modified| modified > checkpoint)
    }

    /// Re-read a definition from its source file
    pub fn reload(&mut self, name: &str) -> Result<(), PipelineError> {
        let path = self
            .pipelines
            .get(name)
            .ok_or_else(|| PipelineError::Unknown(name.to_string()))?
            .source_path
            .clone()
            .ok_or_else(|| PipelineError::NotReloadable(name.to_string()))?;
        let mut definition = PipelineGraphDefinition::load(&path)?;
        // The registry key is authoritative even if the file renamed the pipeline
        definition.name = name.to_string();
        tracing::info!("Reloaded pipeline {name:?}");
        self.pipelines.insert(name.to_string(), definition);
        Ok(())
    }

    /// Remove every definition
    pub fn clear(&mut self) {
        self.pipelines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Parameter, ParameterDirection};

    const MESH_PIPELINE: &str = r#"
PipelineGraphDefinition(
    name: "Mesh",
    language: Glsl,
    stages: {
        "PIXEL": (
            signature: (
                name: "PIXEL_SHADER",
                parameters: [
                    (name: "S", type: "Surface"),
                    (name: "color", type: "vec4", direction: Out),
                ],
            ),
            dynamic_output_types: ["float", "vec4"],
            file_extension: ".mesh.glsl",
            custom_output_start_index: Some(1),
        ),
    },
    structs: {
        "Surface": (name: "Surface", members: [(name: "normal", type: "vec3")]),
    },
)
"#;

    #[test]
    fn test_parse_pipeline() {
        let pipeline = PipelineGraphDefinition::from_ron(MESH_PIPELINE).unwrap();
        assert_eq!(pipeline.name, "Mesh");
        assert_eq!(pipeline.language, Language::Glsl);

        let pixel = pipeline.stage("PIXEL").unwrap();
        assert_eq!(pixel.signature.parameters.len(), 2);
        assert_eq!(pixel.signature.parameters[1].direction, ParameterDirection::Out);
        assert!(pixel.dynamic_types(true).contains("vec4"));
        assert!(pixel.dynamic_types(false).is_empty());
        assert_eq!(pixel.custom_output_start_index, Some(1));
        assert!(pipeline.structs.contains_key("Surface"));
    }

    #[test]
    fn test_ron_roundtrip_keeps_stages() {
        let pipeline = PipelineGraphDefinition::new("Screen", Language::Python).with_stage(
            "MAIN",
            StageDefinition::new(
                Signature::new("main").param(Parameter::new("uv", "vec2")),
                ".py",
            ),
        );
        let text = pipeline.to_ron().unwrap();
        let loaded = PipelineGraphDefinition::from_ron(&text).unwrap();
        assert_eq!(loaded, pipeline);
    }

    #[test]
    fn test_reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.ron");
        std::fs::write(&path, MESH_PIPELINE).unwrap();

        let mut registry = PipelineRegistry::new();
        let name = registry.load(&path).unwrap();
        assert_eq!(name, "Mesh");
        assert!(!registry.needs_reload("Mesh", SystemTime::now() + std::time::Duration::from_secs(3600)));
        assert!(registry.needs_reload("Mesh", SystemTime::UNIX_EPOCH));

        std::fs::write(&path, MESH_PIPELINE.replace(".mesh.glsl", ".glsl")).unwrap();
        registry.reload("Mesh").unwrap();
        assert_eq!(registry.get("Mesh").unwrap().stage("PIXEL").unwrap().file_extension, ".glsl");
    }

    #[test]
    fn test_reload_without_file_fails() {
        let mut registry = PipelineRegistry::new();
        registry.register(PipelineGraphDefinition::new("Inline", Language::Glsl));
        assert!(matches!(registry.reload("Inline"), Err(PipelineError::NotReloadable(_))));
        assert!(matches!(registry.reload("Missing"), Err(PipelineError::Unknown(_))));
    }
}
