// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed node sockets.
//!
//! Sockets are addressed by owning node and name. Their type is a type name
//! from the graph's namespace, never a fixed enum, so library structures
//! become socket types as soon as they are reflected.

use crate::namespace::Namespace;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketDirection {
    /// Consumes a value
    Input,
    /// Produces a value
    Output,
}

/// A typed input or output on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socket {
    /// Owning node
    pub node: NodeId,
    /// Name, unique per direction on a node
    pub name: String,
    /// Type name
    pub data_type: String,
    /// Array size (0 for scalars)
    pub array_size: u32,
    /// Direction
    pub direction: SocketDirection,
    /// Whether this socket backs a custom stage parameter
    pub custom: bool,
}

impl Socket {
    /// Create an input socket
    pub fn input(node: NodeId, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::new(node, name, data_type, SocketDirection::Input)
    }

    /// Create an output socket
    pub fn output(node: NodeId, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self::new(node, name, data_type, SocketDirection::Output)
    }

    fn new(
        node: NodeId,
        name: impl Into<String>,
        data_type: impl Into<String>,
        direction: SocketDirection,
    ) -> Self {
        Self {
            node,
            name: name.into(),
            data_type: data_type.into(),
            array_size: 0,
            direction,
            custom: false,
        }
    }

    /// Set the array size
    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    /// Mark as backing a custom stage parameter
    pub fn into_custom(mut self) -> Self {
        self.custom = true;
        self
    }

    /// Whether the socket carries a structure type
    pub fn is_struct(&self, namespace: &Namespace) -> bool {
        namespace.struct_definition(&self.data_type).is_some()
    }

    /// Whether a value from `self` may flow into `to`.
    ///
    /// Array sizes must match. Types must match or a cast function from the
    /// source type to the destination type must be visible.
    pub fn can_link_to(&self, to: &Socket, namespace: &Namespace) -> bool {
        if self.direction != SocketDirection::Output || to.direction != SocketDirection::Input {
            return false;
        }
        if self.array_size != to.array_size {
            return false;
        }
        self.data_type == to.data_type || namespace.cast(&self.data_type, &to.data_type).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Parameter, Signature};

    fn namespace_with_cast() -> Namespace {
        let mut namespace = Namespace::new();
        namespace.insert_function(
            Signature::new("float_from_vec3")
                .returns("float")
                .param(Parameter::new("v", "vec3")),
        );
        namespace
    }

    #[test]
    fn test_same_type_links() {
        let a = NodeId::new();
        let b = NodeId::new();
        let from = Socket::output(a, "result", "vec3");
        let to = Socket::input(b, "color", "vec3");
        assert!(from.can_link_to(&to, &Namespace::new()));
        // Direction matters
        assert!(!to.can_link_to(&from, &Namespace::new()));
    }

    #[test]
    fn test_cast_allows_link() {
        let from = Socket::output(NodeId::new(), "result", "vec3");
        let to = Socket::input(NodeId::new(), "t", "float");
        assert!(!from.can_link_to(&to, &Namespace::new()));
        assert!(from.can_link_to(&to, &namespace_with_cast()));
    }

    #[test]
    fn test_array_size_mismatch() {
        let from = Socket::output(NodeId::new(), "w", "float").with_array_size(4);
        let to = Socket::input(NodeId::new(), "w", "float");
        assert!(!from.can_link_to(&to, &Namespace::new()));
    }
}
