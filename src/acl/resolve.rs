//! Effective role resolution.
//!
//! A node with the access-control marker is authoritative for itself. A node
//! without it has no roles of its own (direct lookup) or inherits the roles of
//! the nearest marked ancestor (effective lookup). When the ancestor walk runs
//! off the top of the tree, or the parent chain breaks, the configured default
//! roles apply.

use tracing::{debug, info, warn};

use super::model::{merge_into, AssignmentRecord, RoleMap};
use crate::config::AclConfig;
use crate::error::{AclError, AclResult};
use crate::tree::{NodeId, TreeSession};

/// Path of `node` for diagnostics; never fails.
pub(crate) fn node_label<S: TreeSession + ?Sized>(session: &S, node: NodeId) -> String {
    match session.path(node) {
        Ok(p) => p.to_string(),
        Err(e) => {
            debug!(target: "treeacl::resolve", "Unable to get path of node {}: {}", node, e);
            node.to_string()
        }
    }
}

/// Roles governing `node`; `None` means "no data" (only possible when
/// `effective` is false and the node carries no ACL of its own).
pub fn resolve<S: TreeSession + ?Sized>(
    session: &S,
    node: NodeId,
    effective: bool,
    cfg: &AclConfig,
) -> AclResult<Option<RoleMap>> {
    debug!(target: "treeacl::resolve", "Finding roles for: {}, effective={}", node_label(session, node), effective);

    if session.is_acl_bearing(node)? {
        return read_assignments(session, node, cfg).map(Some);
    }
    if !effective {
        return Ok(None);
    }

    match governing_ancestor(session, node)? {
        Some(gov) => {
            debug!(target: "treeacl::resolve", "effective roles are assigned at node: {}", node_label(session, gov));
            let roles = read_assignments(session, gov, cfg)?;
            for (principal, r) in roles.iter() {
                debug!(target: "treeacl::resolve", "{} has role(s) {:?}", principal, r);
            }
            Ok(Some(roles))
        }
        None => Ok(Some(cfg.default_roles.clone())),
    }
}

/// Nearest strict ancestor of `node` carrying the marker. `None` when the walk
/// passes the root or the chain cannot be followed (not-found). Other failures
/// are returned unchanged.
pub fn governing_ancestor<S: TreeSession + ?Sized>(session: &S, node: NodeId) -> AclResult<Option<NodeId>> {
    let mut cur = node;
    loop {
        let parent = match session.parent(cur) {
            Ok(Some(p)) => p,
            Ok(None) => {
                debug!(target: "treeacl::resolve", "No access-control node up to the root, using default access roles");
                return Ok(None);
            }
            Err(e) if e.is_not_found() => {
                debug!(target: "treeacl::resolve", "Subject not found, using default access roles: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        match session.is_acl_bearing(parent) {
            Ok(true) => return Ok(Some(parent)),
            Ok(false) => cur = parent,
            Err(e) if e.is_not_found() => {
                debug!(target: "treeacl::resolve", "Ancestor vanished, using default access roles: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Merge every well-formed record under the node's container. A marked node
/// without a container reads as an empty ACL; malformed records are skipped.
pub fn read_assignments<S: TreeSession + ?Sized>(session: &S, node: NodeId, cfg: &AclConfig) -> AclResult<RoleMap> {
    let mut data = RoleMap::new();
    let label = node_label(session, node);

    let container = match session.acl_container(node) {
        Ok(Some(c)) => c,
        Ok(None) => {
            info!(target: "treeacl::resolve", "Found access-control marker without a corresponding container at {}", label);
            return Ok(data);
        }
        Err(e) if e.is_not_found() => {
            info!(target: "treeacl::resolve", "Found access-control marker without a corresponding container at {}", label);
            return Ok(data);
        }
        Err(e) => return Err(AclError::inconsistent(label, format!("container lookup failed: {}", e))),
    };
    let records = match session.children(container) {
        Ok(r) => r,
        Err(e) if e.is_not_found() => return Ok(data),
        Err(e) => return Err(AclError::inconsistent(label, format!("container unreadable: {}", e))),
    };

    for rec in records {
        let raw = match AssignmentRecord::read(session, rec, cfg) {
            Ok(r) => r,
            Err(e) if e.is_not_found() => {
                debug!(target: "treeacl::resolve", "Assignment record vanished under {}: {}", label, e);
                continue;
            }
            Err(AclError::Malformed { reason, .. }) => {
                warn!(target: "treeacl::resolve", "skipping assignment record on node {}: {}", label, reason);
                continue;
            }
            Err(e) => return Err(e),
        };
        match raw.normalize(&label) {
            Ok(n) => {
                if n.blank_roles > 0 {
                    warn!(target: "treeacl::resolve", "found {} empty role name(s) on node {}", n.blank_roles, label);
                }
                merge_into(&mut data, n.principal, n.roles);
            }
            Err(e) => warn!(target: "treeacl::resolve", "skipping assignment record: {}", e),
        }
    }
    Ok(data)
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod resolve_tests;
