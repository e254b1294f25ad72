// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader graph compiler for `OrdoPlay` Editor.
//!
//! Typed node graphs are compiled into shading source, one fragment per
//! render pipeline stage.
//!
//! ## Architecture
//!
//! - Libraries of user shading code are reflected into function and
//!   structure signatures
//! - Pipelines define each stage's entry point and built-ins
//! - Graph nodes call functions, build structures, run inline code or mark
//!   stage inputs and outputs
//! - The compiler walks a stage's dependencies from its output terminal and
//!   lowers each node through a language [`Transpiler`]
//! - A [`ChangeTracker`] polls source files and recompiles affected graphs

pub mod compiler;
pub mod document;
pub mod graph;
pub mod library;
pub mod link;
pub mod namespace;
pub mod node;
pub mod nodes;
pub mod pipeline;
pub mod reflection;
pub mod signature;
pub mod socket;
pub mod tracker;
pub mod transpiler;
pub mod workspace;

pub use compiler::{compile_all, compile_stage, CodegenContext, CompileError, StageSource};
pub use document::{DocumentError, GraphDocument};
pub use graph::{ConnectionError, Graph, GraphId, NodeError};
pub use library::{Library, LibraryRegistry};
pub use link::{Link, LinkId};
pub use namespace::Namespace;
pub use node::{Node, NodeBehavior, NodeId, NodeKind, SetupContext};
pub use pipeline::{Language, PipelineError, PipelineGraphDefinition, PipelineRegistry, StageDefinition};
pub use reflection::{Reflection, ReflectionError};
pub use signature::{Parameter, ParameterDirection, Signature, StructDefinition, StructMember};
pub use socket::{Socket, SocketDirection};
pub use tracker::{ChangeTracker, Clock, ManualClock, SystemClock, TickReport, TrackerError};
pub use transpiler::{GlslTranspiler, PythonTranspiler, Transpiler};
pub use workspace::{SourceSink, Workspace, WorkspaceError};
