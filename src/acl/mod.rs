//! Role-based access control over a node tree.
//!
//! Each node may carry its own assignment container (principal -> roles).
//! `resolve` computes the roles governing a node, `replace` / `delete_all`
//! manage a node's own assignments, and `locate` maps a path that may not exist
//! yet onto the closest existing node. All operations run inside one
//! caller-owned `TreeSession` and never commit it.

pub mod model;
pub mod resolve;
pub mod assign;
pub mod locate;

use std::sync::Arc;

use crate::config::AclConfig;
use crate::error::AclResult;
use crate::tree::{NodeId, NodePath, TreeSession};

pub use assign::{delete_all, replace, validate_assignments};
pub use locate::{locate, resolve_by_path};
pub use model::{AssignmentRecord, NormalizedAssignment, RoleMap};
pub use resolve::{governing_ancestor, read_assignments, resolve};

/// Configured entry point to the role engine. Cheap to clone; the config
/// (including the default roles) is fixed at construction.
#[derive(Debug, Clone)]
pub struct AccessRoles {
    config: Arc<AclConfig>,
}

impl Default for AccessRoles {
    fn default() -> Self {
        Self { config: Arc::new(AclConfig::default()) }
    }
}

impl AccessRoles {
    pub fn new(config: AclConfig) -> AclResult<Self> {
        config.validate()?;
        Ok(Self { config: Arc::new(config) })
    }

    pub fn config(&self) -> &AclConfig { &self.config }

    pub fn default_roles(&self) -> &RoleMap { &self.config.default_roles }

    pub fn resolve<S: TreeSession + ?Sized>(&self, session: &S, node: NodeId, effective: bool) -> AclResult<Option<RoleMap>> {
        resolve::resolve(session, node, effective, &self.config)
    }

    pub fn replace<S: TreeSession + ?Sized>(&self, session: &mut S, node: NodeId, assignments: &RoleMap) -> AclResult<()> {
        assign::replace(session, node, assignments, &self.config)
    }

    pub fn delete_all<S: TreeSession + ?Sized>(&self, session: &mut S, node: NodeId) -> AclResult<()> {
        assign::delete_all(session, node, &self.config)
    }

    pub fn locate<S: TreeSession + ?Sized>(&self, session: &S, path: &NodePath) -> AclResult<NodeId> {
        locate::locate(session, path)
    }

    pub fn resolve_by_path<S: TreeSession + ?Sized>(&self, session: &S, path: &NodePath) -> AclResult<Option<RoleMap>> {
        locate::resolve_by_path(session, path, &self.config)
    }
}
