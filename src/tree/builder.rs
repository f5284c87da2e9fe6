//! Builds a typed node tree from a nested description.
//!
//! The description format mirrors the external collaborator shape: a node has
//! a `name`, and either a `value` mapping (leaf) or an `operation` name plus
//! `childs` (interior node). Operation names are resolved through an
//! [`OperationRegistry`].

use super::types::{ConfigError, Pk, Scalar};
use super::{NodeId, Tree};
use crate::ops::OperationRegistry;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Nested, serializable description of a tree.
///
/// The `childs` field name is kept from the wire format this engine consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDesc {
    pub name: String,
    #[serde(default)]
    pub value: Option<BTreeMap<Pk, Scalar>>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub childs: Vec<NodeDesc>,
}

impl NodeDesc {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Recursively builds `desc` into `tree`, children first, and returns the id
/// of the node described by `desc` itself.
pub(super) fn build_into(
    tree: &mut Tree,
    desc: &NodeDesc,
    ops: &OperationRegistry,
) -> Result<NodeId, ConfigError> {
    match (&desc.value, &desc.operation) {
        (Some(_), Some(_)) => Err(ConfigError::BothValueAndOperation { node: desc.name.clone() }),
        (None, None) => Err(ConfigError::MissingValueOrOperation { node: desc.name.clone() }),
        (Some(values), None) => {
            // A leaf with children would silently orphan the subtree.
            if !desc.childs.is_empty() {
                return Err(ConfigError::ValueNodeWithChildren { node: desc.name.clone() });
            }
            tree.add_value(&desc.name, values.clone())
        }
        (None, Some(op_name)) => {
            let op = ops.get(op_name).ok_or_else(|| ConfigError::UnknownOperation {
                node: desc.name.clone(),
                operation: op_name.clone(),
            })?;
            let children = desc
                .childs
                .iter()
                .map(|child| build_into(tree, child, ops))
                .collect::<Result<Vec<_>, _>>()?;
            tree.add_operation(&desc.name, op, &children)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{Inputs, OpError};
    use crate::tree::NodeKind;
    use std::sync::Arc;

    fn registry() -> OperationRegistry {
        let mut reg = OperationRegistry::new();
        reg.register(
            "sum",
            Arc::new(|inputs: &Inputs| -> Result<Scalar, OpError> {
                Ok(Scalar::Float(inputs.values().filter_map(Scalar::as_f64).sum()))
            }),
        );
        reg
    }

    fn leaf_json(name: &str) -> String {
        format!(r#"{{"name": "{}", "value": {{"pk1": 1}}, "childs": []}}"#, name)
    }

    #[test]
    fn test_build_from_json() {
        let json = format!(
            r#"{{"name": "total", "operation": "sum", "childs": [{}, {}]}}"#,
            leaf_json("a"),
            leaf_json("b"),
        );
        let desc = NodeDesc::from_json(&json).unwrap();
        let (tree, root) = Tree::from_desc(&desc, &registry()).unwrap();

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.name(root), "total");
        assert_eq!(tree.children(root).len(), 2);
        assert!(matches!(tree.kind(root), NodeKind::Operation(_)));
        for &child in tree.children(root) {
            assert_eq!(tree.parent(child), Some(root));
            assert!(matches!(tree.kind(child), NodeKind::Value(_)));
        }
    }

    #[test]
    fn test_both_value_and_operation_rejected() {
        let desc = NodeDesc {
            name: "bad".into(),
            value: Some(BTreeMap::from([("pk1".to_string(), Scalar::Int(1))])),
            operation: Some("sum".into()),
            childs: vec![],
        };
        let err = Tree::from_desc(&desc, &registry()).unwrap_err();
        assert_eq!(err, ConfigError::BothValueAndOperation { node: "bad".into() });
    }

    #[test]
    fn test_neither_value_nor_operation_rejected() {
        let desc = NodeDesc { name: "bad".into(), value: None, operation: None, childs: vec![] };
        let err = Tree::from_desc(&desc, &registry()).unwrap_err();
        assert_eq!(err, ConfigError::MissingValueOrOperation { node: "bad".into() });
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let json = format!(
            r#"{{"name": "n", "operation": "frobnicate", "childs": [{}]}}"#,
            leaf_json("a"),
        );
        let desc = NodeDesc::from_json(&json).unwrap();
        let err = Tree::from_desc(&desc, &registry()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownOperation { node: "n".into(), operation: "frobnicate".into() }
        );
    }

    #[test]
    fn test_value_leaf_with_children_rejected() {
        let json = format!(
            r#"{{"name": "leaf", "value": {{"pk1": true}}, "childs": [{}]}}"#,
            leaf_json("a"),
        );
        let desc = NodeDesc::from_json(&json).unwrap();
        let err = Tree::from_desc(&desc, &registry()).unwrap_err();
        assert_eq!(err, ConfigError::ValueNodeWithChildren { node: "leaf".into() });
    }

    #[test]
    fn test_scalar_domain_deserializes_untagged() {
        let json = r#"{"name": "leaf", "value": {"a": null, "b": true, "c": 3, "d": 2.5, "e": "s"}}"#;
        let desc = NodeDesc::from_json(json).unwrap();
        let values = desc.value.unwrap();
        assert_eq!(values["a"], Scalar::Null);
        assert_eq!(values["b"], Scalar::Bool(true));
        assert_eq!(values["c"], Scalar::Int(3));
        assert_eq!(values["d"], Scalar::Float(2.5));
        assert_eq!(values["e"], Scalar::Str("s".into()));
    }
}
