//! Replace-all writes and removal of per-node role assignments.
//! Nothing here commits; the caller's session save is the transaction boundary.

use std::collections::BTreeSet;

use tracing::debug;

use super::model::RoleMap;
use super::resolve::node_label;
use crate::config::AclConfig;
use crate::error::{AclError, AclResult};
use crate::tree::{NodeId, PropertyValue, TreeSession};

/// Reject assignment maps a boundary layer must never pass on: empty map,
/// blank principal, empty role set, blank role name.
pub fn validate_assignments(assignments: &RoleMap) -> AclResult<()> {
    if assignments.is_empty() {
        return Err(AclError::input("empty_assignments", "no role assignments supplied"));
    }
    for (principal, roles) in assignments.iter() {
        if principal.trim().is_empty() {
            return Err(AclError::input("empty_principal", "principal name cannot be blank"));
        }
        if roles.is_empty() {
            return Err(AclError::input("empty_role_set", format!("no roles supplied for principal '{}'", principal)));
        }
        if roles.iter().any(|r| r.trim().is_empty()) {
            return Err(AclError::input("empty_role", format!("blank role name for principal '{}'", principal)));
        }
    }
    Ok(())
}

/// Replace every assignment on `node` with `assignments`. Invalid input is
/// rejected before the session is touched.
pub fn replace<S: TreeSession + ?Sized>(
    session: &mut S,
    node: NodeId,
    assignments: &RoleMap,
    cfg: &AclConfig,
) -> AclResult<()> {
    validate_assignments(assignments)?;

    if !session.is_acl_bearing(node)? {
        session.set_acl_bearing(node, true)?;
        debug!(target: "treeacl::assign", "added access-control marker to {}", node_label(&*session, node));
    }

    let container = match session.acl_container(node)? {
        Some(c) => {
            let old = session.children(c)?;
            debug!(target: "treeacl::assign", "discarding {} existing assignment record(s)", old.len());
            for rec in old {
                session.remove(rec)?;
            }
            c
        }
        None => session.add_acl_container(node, &cfg.container_name)?,
    };

    for (principal, roles) in assignments.iter() {
        let principal = principal.trim();
        let roles: BTreeSet<&str> = roles.iter().map(|r| r.trim()).filter(|r| !r.is_empty()).collect();
        if principal.is_empty() || roles.is_empty() {
            continue;
        }
        let rec = session.add_child(container, &cfg.record_name)?;
        session.set_property(rec, &cfg.principal_field, PropertyValue::Str(principal.to_string()))?;
        session.set_property(rec, &cfg.role_field, PropertyValue::Strs(roles.iter().map(|r| r.to_string()).collect()))?;
    }
    debug!(target: "treeacl::assign", "wrote {} principal assignment(s) to {}", assignments.len(), node_label(&*session, node));
    Ok(())
}

/// Drop the container and the marker. A node without the marker is left
/// untouched.
pub fn delete_all<S: TreeSession + ?Sized>(session: &mut S, node: NodeId, cfg: &AclConfig) -> AclResult<()> {
    if !session.is_acl_bearing(node)? {
        return Ok(());
    }
    match session.acl_container(node) {
        Ok(Some(_)) => session.remove_acl_container(node)?,
        Ok(None) => debug!(target: "treeacl::assign", "Cannot find container on {}", node_label(&*session, node)),
        Err(e) if e.is_not_found() => debug!(target: "treeacl::assign", "Cannot find container on {}: {}", node_label(&*session, node), e),
        Err(e) => return Err(e),
    }
    session.set_acl_bearing(node, false)?;
    debug!(target: "treeacl::assign", "removed access-control marker and '{}' container from {}", cfg.container_name, node_label(&*session, node));
    Ok(())
}
