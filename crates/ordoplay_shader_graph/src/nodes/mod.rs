// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node variants.

pub mod function;
pub mod inline;
pub mod io;
pub mod structure;

pub use function::FunctionNode;
pub use inline::{InlineInput, InlineNode};
pub use io::{CustomParameter, CustomParameterError, IoNode};
pub use structure::StructNode;
