//! Unit-of-work boundary around the role engine.
//!
//! Every call opens its own session on the repository, runs one engine
//! operation and saves only on success; a failed call drops the session and
//! with it any partial change. Role maps cross this boundary as JSON objects
//! (principal -> array of role names).

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::acl::{validate_assignments, AccessRoles, RoleMap};
use crate::error::{AclError, AclResult};
use crate::tree::{MemoryRepository, NodePath, TreeSession};

/// Source of sessions for the service.
pub trait Repository {
    type Session: TreeSession;
    fn open(&self) -> AclResult<Self::Session>;
}

impl Repository for MemoryRepository {
    type Session = crate::tree::MemorySession;
    fn open(&self) -> AclResult<Self::Session> { Ok(self.session()) }
}

pub struct AccessRolesService<R: Repository> {
    repo: R,
    roles: AccessRoles,
}

impl<R: Repository> AccessRolesService<R> {
    pub fn new(repo: R, roles: AccessRoles) -> Self { Self { repo, roles } }

    pub fn repository(&self) -> &R { &self.repo }

    pub fn access_roles(&self) -> &AccessRoles { &self.roles }

    /// Roles of the node at `path`, which must exist. `None` means no data.
    pub fn get(&self, path: &NodePath, effective: bool) -> AclResult<Option<RoleMap>> {
        let session = self.repo.open()?;
        let node = session.node(path)?;
        let out = self.roles.resolve(&session, node, effective)?;
        debug!(target: "treeacl::service", "get path={} effective={} found={}", path, effective, out.is_some());
        Ok(out)
    }

    /// Effective roles for `path`, which may not exist yet.
    pub fn get_effective_for(&self, path: &NodePath) -> AclResult<Option<RoleMap>> {
        let session = self.repo.open()?;
        self.roles.resolve_by_path(&session, path)
    }

    /// Replace the assignments of the node at `path` and commit.
    pub fn post(&self, path: &NodePath, assignments: &RoleMap) -> AclResult<()> {
        validate_assignments(assignments)?;
        let mut session = self.repo.open()?;
        let node = session.node(path)?;
        self.roles.replace(&mut session, node, assignments)?;
        session.save()?;
        debug!(target: "treeacl::service", "post path={} principals={}", path, assignments.len());
        Ok(())
    }

    /// Remove all assignments from the node at `path` and commit.
    pub fn delete(&self, path: &NodePath) -> AclResult<()> {
        let mut session = self.repo.open()?;
        let node = session.node(path)?;
        self.roles.delete_all(&mut session, node)?;
        session.save()?;
        debug!(target: "treeacl::service", "delete path={}", path);
        Ok(())
    }
}

/// Render a role map as a JSON object of principal -> sorted role array.
pub fn role_map_to_json(map: &RoleMap) -> Value {
    let mut obj = Map::new();
    for (principal, roles) in map.iter() {
        obj.insert(principal.clone(), Value::Array(roles.iter().map(|r| Value::String(r.clone())).collect()));
    }
    Value::Object(obj)
}

/// Parse and validate a JSON assignment object. Every rule of
/// `validate_assignments` applies, plus: the document must be an object and
/// role lists must be arrays of strings. A `null` role list counts as empty.
pub fn parse_assignments(raw: &str) -> AclResult<RoleMap> {
    let v: Value = serde_json::from_str(raw)
        .map_err(|e| AclError::input("invalid_json", format!("assignments are not valid JSON: {}", e)))?;
    let Value::Object(obj) = v else {
        return Err(AclError::input("invalid_json", "assignments must be a JSON object"));
    };
    let mut out = RoleMap::new();
    for (principal, roles) in obj.into_iter() {
        let items = match roles {
            Value::Array(items) => items,
            Value::Null => {
                return Err(AclError::input("empty_role_set", format!("no roles supplied for principal '{}'", principal)));
            }
            _ => {
                warn!(target: "treeacl::service", "rejecting assignments: roles for '{}' are not an array", principal);
                return Err(AclError::input("invalid_role", format!("roles for principal '{}' must be an array of strings", principal)));
            }
        };
        let entry = out.entry(principal.clone()).or_default();
        for item in items {
            match item {
                Value::String(s) => { entry.insert(s); }
                _ => return Err(AclError::input("invalid_role", format!("non-string role for principal '{}'", principal))),
            }
        }
    }
    validate_assignments(&out)?;
    Ok(out)
}
