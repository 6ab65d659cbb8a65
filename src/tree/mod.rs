//! Tree storage seam: the capability set the role engine needs from a
//! hierarchical node store, plus an arena-backed in-memory implementation.
//! Keep the trait small; anything beyond navigation, markers and properties
//! belongs to the concrete store.

pub mod path;
pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AclResult;

pub use path::{normalize_nfc, validate_node_name, validate_node_path, NodePath};
pub use memory::{Fault, MemoryRepository, MemorySession, NodeSnapshot};

/// Handle of a node inside one store. Only meaningful for the store (and
/// session) that produced it. The generation tells a reused slot apart from
/// the node that held it before, so a stale handle reads as not-found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub const fn new(index: usize, generation: u32) -> Self { Self { index, generation } }

    pub fn index(self) -> usize { self.index }

    pub fn generation(self) -> u32 { self.generation }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Property values the role engine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Str(String),
    Strs(Vec<String>),
}

/// One unit of work against a tree store.
///
/// Lookups that find nothing return `Ok(None)` where absence is ordinary
/// (children, properties) and `Err(AclError::NotFound)` where the caller asked
/// for something that must exist (a path, a node's parent link). Any other
/// failure is `AclError::Storage`.
pub trait TreeSession {
    fn root(&self) -> AclResult<NodeId>;

    /// Node at an absolute path; `NotFound` if no such node.
    fn node(&self, path: &NodePath) -> AclResult<NodeId>;

    fn path(&self, node: NodeId) -> AclResult<NodePath>;

    /// Parent of `node`; `Ok(None)` only for the root. A node whose parent
    /// link cannot be followed reports `NotFound`.
    fn parent(&self, node: NodeId) -> AclResult<Option<NodeId>>;

    /// First content child carrying `name`. Assignment containers are never
    /// returned here.
    fn child(&self, node: NodeId, name: &str) -> AclResult<Option<NodeId>>;

    fn children(&self, node: NodeId) -> AclResult<Vec<NodeId>>;

    fn add_child(&mut self, node: NodeId, name: &str) -> AclResult<NodeId>;

    /// Remove `node` and its whole subtree.
    fn remove(&mut self, node: NodeId) -> AclResult<()>;

    /// The "access-control-bearing" structural marker.
    fn is_acl_bearing(&self, node: NodeId) -> AclResult<bool>;

    fn set_acl_bearing(&mut self, node: NodeId, bearing: bool) -> AclResult<()>;

    /// Assignment container of `node`. Containers live outside the content
    /// namespace: `node`, `child` and `children` of the owner never see them.
    fn acl_container(&self, node: NodeId) -> AclResult<Option<NodeId>>;

    /// Attach an empty assignment container called `name` to `node`; fails
    /// if the node already has one.
    fn add_acl_container(&mut self, node: NodeId, name: &str) -> AclResult<NodeId>;

    /// Drop the assignment container of `node` with all its records. No-op
    /// when there is none.
    fn remove_acl_container(&mut self, node: NodeId) -> AclResult<()>;

    fn property(&self, node: NodeId, name: &str) -> AclResult<Option<PropertyValue>>;

    fn set_property(&mut self, node: NodeId, name: &str, value: PropertyValue) -> AclResult<()>;

    /// Persist the work done in this session.
    fn save(&mut self) -> AclResult<()>;
}
