// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function and structure signatures reflected from shading source.
//!
//! Signatures are parsed once, when a library or pipeline is loaded, and are
//! copied into nodes at creation time. They are never re-parsed on access.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Direction of a function parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParameterDirection {
    /// Read-only parameter
    #[default]
    In,
    /// Write-only parameter
    Out,
    /// Read-write parameter
    InOut,
}

impl ParameterDirection {
    /// Whether the parameter is read by the function
    pub fn is_input(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    /// Whether the parameter is written by the function
    pub fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }

    /// Source keyword for this direction
    pub fn keyword(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::InOut => "inout",
        }
    }
}

/// Free-form annotations attached to a declaration (`/* META ... */`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta(pub IndexMap<String, String>);

impl Meta {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a metadata value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set a metadata value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Whether a flag is present and not explicitly false
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v != "false" && v != "0")
    }

    /// Declarations marked internal are hidden from node creation menus
    pub fn is_internal(&self) -> bool {
        self.flag("internal")
    }

    /// Whether there is no metadata
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type
    #[serde(rename = "type")]
    pub ty: String,
    /// Parameter direction
    #[serde(default)]
    pub direction: ParameterDirection,
    /// Array size (0 for scalars)
    #[serde(default)]
    pub array_size: u32,
    /// Parameter annotations
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Parameter {
    /// Create an `in` parameter
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            direction: ParameterDirection::In,
            array_size: 0,
            meta: Meta::new(),
        }
    }

    /// Set the direction
    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Set the array size
    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }
}

/// A reflected function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Function name
    pub name: String,
    /// Return type (`None` for void)
    #[serde(default)]
    pub return_type: Option<String>,
    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// File the function was declared in
    #[serde(default)]
    pub file: String,
    /// Function annotations
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Signature {
    /// Create a void function with no parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: None,
            parameters: Vec::new(),
            file: String::new(),
            meta: Meta::new(),
        }
    }

    /// Set the return type
    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    /// Append a parameter
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set the provenance file
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Get a parameter by name
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Whether the function returns a value
    pub fn has_result(&self) -> bool {
        self.return_type.is_some()
    }

    /// Human readable declaration, used to key overloads
    ///
    /// `vec3 mix(in vec3 a, in vec3 b, in float t)` becomes
    /// `mix(in vec3 a, in vec3 b, in float t)`.
    pub fn declaration(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let array = if p.array_size > 0 {
                    format!("[{}]", p.array_size)
                } else {
                    String::new()
                };
                format!("{} {} {}{}", p.direction.keyword(), p.ty, p.name, array)
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    /// Whether this is a cast function from `from` (`<to>_from_<from>`, one parameter)
    pub fn is_cast(&self, from: &str, to: &str) -> bool {
        self.name == cast_function_name(from, to)
            && self.parameters.len() == 1
            && self.parameters[0].ty == from
    }
}

/// Name a cast function from `from` to `to` must have
pub fn cast_function_name(from: &str, to: &str) -> String {
    format!("{to}_from_{from}")
}

/// A structure member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructMember {
    /// Member name
    pub name: String,
    /// Member type
    #[serde(rename = "type")]
    pub ty: String,
    /// Array size (0 for scalars)
    #[serde(default)]
    pub array_size: u32,
    /// Member annotations
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl StructMember {
    /// Create a scalar member
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            array_size: 0,
            meta: Meta::new(),
        }
    }
}

/// A reflected structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDefinition {
    /// Structure name
    pub name: String,
    /// Members in declaration order
    #[serde(default)]
    pub members: Vec<StructMember>,
    /// File the structure was declared in
    #[serde(default)]
    pub file: String,
    /// Structure annotations
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl StructDefinition {
    /// Create an empty structure
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            file: String::new(),
            meta: Meta::new(),
        }
    }

    /// Append a member
    pub fn member(mut self, member: StructMember) -> Self {
        self.members.push(member);
        self
    }

    /// Set the provenance file
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_string() {
        let sig = Signature::new("mix")
            .returns("vec3")
            .param(Parameter::new("a", "vec3"))
            .param(Parameter::new("weights", "float").with_array_size(4))
            .param(Parameter::new("o", "float").with_direction(ParameterDirection::Out));
        assert_eq!(
            sig.declaration(),
            "mix(in vec3 a, in float weights[4], out float o)"
        );
    }

    #[test]
    fn test_cast_detection() {
        let cast = Signature::new("float_from_vec3")
            .returns("float")
            .param(Parameter::new("v", "vec3"));
        assert!(cast.is_cast("vec3", "float"));
        assert!(!cast.is_cast("vec4", "float"));

        let two_params = cast.clone().param(Parameter::new("w", "float"));
        assert!(!two_params.is_cast("vec3", "float"));
    }

    #[test]
    fn test_meta_flags() {
        let mut meta = Meta::new();
        assert!(!meta.is_internal());
        meta.insert("internal", "true");
        assert!(meta.is_internal());
        meta.insert("internal", "false");
        assert!(!meta.is_internal());
    }
}
