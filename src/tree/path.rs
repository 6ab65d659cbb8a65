use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use unicode_normalization::UnicodeNormalization;

use crate::error::{AclError, AclResult};

/// Normalize a UTF-8 string to NFC.
pub fn normalize_nfc(input: &str) -> String {
    input.nfc().collect::<String>()
}

/// Validate an absolute node path:
/// - must start with '/'; "/" alone is the root
/// - NUL ("\u{0000}") not allowed
/// - no trailing '/' (except the root) and no empty segments ('//')
/// - segments '.' and '..' are not allowed
pub fn validate_node_path(path: &str) -> AclResult<()> {
    if path.is_empty() {
        return Err(AclError::input("invalid_path", "node path cannot be empty"));
    }
    if path.chars().any(|c| c == '\u{0000}') {
        return Err(AclError::input("invalid_path", "node path cannot contain NUL characters"));
    }
    if !path.starts_with('/') {
        return Err(AclError::input("invalid_path", "node path must be absolute"));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(AclError::input("invalid_path", "trailing '/' is not allowed in node paths"));
    }
    for seg in path[1..].split('/') {
        if seg.is_empty() {
            return Err(AclError::input("invalid_path", "empty segments ('//') are not allowed in node paths"));
        }
        if seg == "." || seg == ".." {
            return Err(AclError::input("invalid_path", "segments '.' and '..' are not allowed"));
        }
    }
    Ok(())
}

/// Validate a single node name (one path segment): non-empty, no '/', no NUL,
/// and neither '.' nor '..'.
pub fn validate_node_name(name: &str) -> AclResult<()> {
    if name.is_empty() {
        return Err(AclError::input("invalid_name", "node name cannot be empty"));
    }
    if name.contains('/') {
        return Err(AclError::input("invalid_name", format!("node name '{}' must be a single segment", name)));
    }
    if name.contains('\u{0000}') {
        return Err(AclError::input("invalid_name", "node name cannot contain NUL characters"));
    }
    if name == "." || name == ".." {
        return Err(AclError::input("invalid_name", "node names '.' and '..' are reserved"));
    }
    Ok(())
}

/// Absolute, validated and NFC-normalized path of a node in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(String);

impl NodePath {
    pub fn root() -> Self { NodePath("/".to_string()) }

    pub fn parse(path: &str) -> AclResult<Self> {
        validate_node_path(path)?;
        Ok(NodePath(normalize_nfc(path)))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn is_root(&self) -> bool { self.0 == "/" }

    /// Parent path; `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() { return None; }
        match self.0.rfind('/') {
            Some(0) => Some(NodePath::root()),
            Some(idx) => Some(NodePath(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Last segment; empty for the root.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn join(&self, name: &str) -> AclResult<NodePath> {
        validate_node_name(name)?;
        let joined = if self.is_root() { format!("/{}", name) } else { format!("{}/{}", self.0, name) };
        NodePath::parse(&joined)
    }

    /// This path followed by each ancestor up to and including the root.
    pub fn ancestors_inclusive(&self) -> impl Iterator<Item = NodePath> {
        std::iter::successors(Some(self.clone()), |p| p.parent())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl std::str::FromStr for NodePath {
    type Err = AclError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { NodePath::parse(s) }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(&self.0) }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        NodePath::parse(&raw).map_err(serde::de::Error::custom)
    }
}
