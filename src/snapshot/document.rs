//! Snapshot Document Tree
//!
//! A `Node` is a named element with string-keyed scalar attributes and an
//! ordered list of child nodes. Scalars and fixed arrays live in attributes
//! (integer arrays as a single space-delimited attribute), repeated
//! structures such as move histories become ordered children.
//!
//! Uses BTreeMap so attribute order is stable across encodes.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Alias for a snapshot root. A document is just a node tree; the root's
/// name identifies the game model that produced it.
pub type Document = Node;

/// Errors raised while decoding a snapshot document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// A required attribute was absent.
    #[error("snapshot node `{node}` is missing attribute `{attr}`")]
    MissingAttribute {
        /// Name of the node that was being decoded.
        node: String,
        /// Name of the absent attribute.
        attr: String,
    },

    /// An attribute was present but could not be parsed.
    #[error("snapshot node `{node}` attribute `{attr}` has invalid value `{value}`")]
    InvalidAttribute {
        /// Name of the node that was being decoded.
        node: String,
        /// Name of the offending attribute.
        attr: String,
        /// The raw attribute text.
        value: String,
    },

    /// The document root names a different model than expected.
    #[error("snapshot root is `{found}`, expected `{expected}`")]
    WrongRoot {
        /// Root name the decoder expected.
        expected: String,
        /// Root name actually found.
        found: String,
    },
}

/// One element of a snapshot document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Node>,
}

impl Node {
    /// Create an empty node with the given element name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fail unless this node's name matches `expected`.
    pub fn expect_name(&self, expected: &str) -> Result<(), SnapshotError> {
        if self.name == expected {
            Ok(())
        } else {
            Err(SnapshotError::WrongRoot {
                expected: expected.to_string(),
                found: self.name.clone(),
            })
        }
    }

    /// Set a scalar attribute from anything displayable.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Display) {
        self.attrs.insert(key.into(), value.to_string());
    }

    /// Encode an integer array as a single space-delimited attribute.
    ///
    /// A zero-length array becomes an empty string, which decodes back to
    /// a zero-length array; the attribute is always present.
    pub fn set_int_array(&mut self, key: impl Into<String>, values: &[i64]) {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.attrs.insert(key.into(), joined);
    }

    /// Raw attribute text, or `MissingAttribute`.
    pub fn attr(&self, key: &str) -> Result<&str, SnapshotError> {
        self.attrs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| SnapshotError::MissingAttribute {
                node: self.name.clone(),
                attr: key.to_string(),
            })
    }

    /// Raw attribute text if present.
    pub fn attr_opt(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Attribute parsed as a signed integer.
    pub fn attr_int(&self, key: &str) -> Result<i64, SnapshotError> {
        let raw = self.attr(key)?;
        raw.parse()
            .map_err(|_| SnapshotError::InvalidAttribute {
                node: self.name.clone(),
                attr: key.to_string(),
                value: raw.to_string(),
            })
    }

    /// Attribute decoded as an integer array (inverse of [`set_int_array`]).
    ///
    /// [`set_int_array`]: Node::set_int_array
    pub fn attr_int_array(&self, key: &str) -> Result<Vec<i64>, SnapshotError> {
        let raw = self.attr(key)?;
        raw.split_whitespace()
            .map(|tok| {
                tok.parse().map_err(|_| SnapshotError::InvalidAttribute {
                    node: self.name.clone(),
                    attr: key.to_string(),
                    value: raw.to_string(),
                })
            })
            .collect()
    }

    /// Append a child node, preserving insertion order.
    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// All children in document order.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Children with the given element name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_attrs() {
        let mut node = Node::new("board");
        node.set_attr("size", 19);
        node.set_attr("komi", "6.5");

        assert_eq!(node.attr_int("size").unwrap(), 19);
        assert_eq!(node.attr("komi").unwrap(), "6.5");
    }

    #[test]
    fn test_missing_attribute_names_the_field() {
        let node = Node::new("board");
        let err = node.attr("size").unwrap_err();
        assert_eq!(
            err,
            SnapshotError::MissingAttribute {
                node: "board".to_string(),
                attr: "size".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_int() {
        let mut node = Node::new("board");
        node.set_attr("size", "nineteen");
        assert!(matches!(
            node.attr_int("size"),
            Err(SnapshotError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_int_array_roundtrip() {
        let mut node = Node::new("history");
        node.set_int_array("moves", &[0, -3, 42, 7]);
        assert_eq!(node.attr_int_array("moves").unwrap(), vec![0, -3, 42, 7]);
    }

    #[test]
    fn test_empty_int_array_is_length_preserving() {
        let mut node = Node::new("history");
        node.set_int_array("moves", &[]);
        assert_eq!(node.attr_int_array("moves").unwrap(), Vec::<i64>::new());
        // The attribute exists; an absent attribute is a different error.
        assert!(node.attr("moves").is_ok());
    }

    #[test]
    fn test_children_preserve_order() {
        let mut root = Node::new("game");
        for i in 0..5 {
            let mut step = Node::new("step");
            step.set_attr("n", i);
            root.push_child(step);
        }
        let order: Vec<i64> = root
            .children_named("step")
            .map(|c| c.attr_int("n").unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_wrong_root() {
        let node = Node::new("chess");
        let err = node.expect_name("checkers").unwrap_err();
        assert!(matches!(err, SnapshotError::WrongRoot { .. }));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut root = Node::new("game");
        root.set_attr("turn", 3);
        root.set_int_array("cells", &[1, 0, -1]);
        let mut child = Node::new("move");
        child.set_attr("x", 4);
        root.push_child(child);

        let json = serde_json::to_string(&root).unwrap();
        let parsed: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, root);
    }
}
