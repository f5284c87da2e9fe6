use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A unique, stable identifier for a node within one tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// Primary key identifying one entity among the many sharing a tree shape.
pub type Pk = String;

/// The scalar domain carried by leaves and produced by operations.
///
/// `untagged` so that JSON descriptions map directly: `null`, `true`,
/// `3`, `2.5` and `"s"` all deserialize without an explicit tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn as_bool(&self) -> Option<bool> {
        match self { Scalar::Bool(b) => Some(*b), _ => None }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self { Scalar::Int(i) => Some(*i), _ => None }
    }

    /// Numeric view: integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self { Scalar::Bool(b) }
}
impl From<i64> for Scalar {
    fn from(i: i64) -> Self { Scalar::Int(i) }
}
impl From<f64> for Scalar {
    fn from(v: f64) -> Self { Scalar::Float(v) }
}
impl From<&str> for Scalar {
    fn from(s: &str) -> Self { Scalar::Str(s.to_string()) }
}
impl From<String> for Scalar {
    fn from(s: String) -> Self { Scalar::Str(s) }
}

/// Malformed tree structure or description. Raised at build time only;
/// a tree that constructed successfully never hits these during evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("node '{node}' declares both a value and an operation")]
    BothValueAndOperation { node: String },
    #[error("node '{node}' declares neither a value nor an operation")]
    MissingValueOrOperation { node: String },
    #[error("value node '{node}' has an empty value mapping")]
    EmptyValues { node: String },
    #[error("value node '{node}' must not have children")]
    ValueNodeWithChildren { node: String },
    #[error("operation node '{node}' has no children")]
    NoChildren { node: String },
    #[error("node '{node}' has two children named '{child}'")]
    DuplicateChildName { node: String, child: String },
    #[error("node '{child}' is already attached to a parent")]
    ChildAlreadyAttached { child: String },
    #[error("node '{node}' references unknown operation '{operation}'")]
    UnknownOperation { node: String, operation: String },
}
