use std::collections::{BTreeMap, BTreeSet};

use crate::config::AclConfig;
use crate::error::{AclError, AclResult};
use crate::tree::{NodeId, PropertyValue, TreeSession};

/// Principal name -> set of role names.
pub type RoleMap = BTreeMap<String, BTreeSet<String>>;

/// One stored assignment record, exactly as read from the tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentRecord {
    pub principal: String,
    pub roles: Vec<String>,
}

/// A record after trimming, with blank role entries dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAssignment {
    pub principal: String,
    pub roles: BTreeSet<String>,
    /// Number of role entries dropped for being blank.
    pub blank_roles: usize,
}

impl AssignmentRecord {
    pub fn new<P: Into<String>>(principal: P, roles: &[&str]) -> Self {
        Self { principal: principal.into(), roles: roles.iter().map(|r| r.to_string()).collect() }
    }

    /// Read the record stored at `record`. Absent properties read as blank;
    /// a single-string role property reads as a one-element list.
    pub fn read<S: TreeSession + ?Sized>(session: &S, record: NodeId, cfg: &AclConfig) -> AclResult<Self> {
        let principal = match session.property(record, &cfg.principal_field)? {
            Some(PropertyValue::Str(s)) => s,
            Some(PropertyValue::Strs(v)) if v.len() == 1 => v.into_iter().next().unwrap_or_default(),
            Some(PropertyValue::Strs(_)) => {
                return Err(AclError::malformed(format!("node {}", record), "principal is a multi-valued property"));
            }
            None => String::new(),
        };
        let roles = match session.property(record, &cfg.role_field)? {
            Some(PropertyValue::Strs(v)) => v,
            Some(PropertyValue::Str(s)) => vec![s],
            None => Vec::new(),
        };
        Ok(Self { principal, roles })
    }

    /// Trim the principal and every role. Fails with `Malformed` when the
    /// principal is blank or no role survives trimming.
    pub fn normalize(&self, node: &str) -> AclResult<NormalizedAssignment> {
        let principal = self.principal.trim();
        if principal.is_empty() {
            return Err(AclError::malformed(node, "found empty principal name"));
        }
        let mut roles = BTreeSet::new();
        let mut blank_roles = 0usize;
        for r in self.roles.iter() {
            let t = r.trim();
            if t.is_empty() { blank_roles += 1; } else { roles.insert(t.to_string()); }
        }
        if roles.is_empty() {
            return Err(AclError::malformed(node, format!("no usable role names for principal '{}'", principal)));
        }
        Ok(NormalizedAssignment { principal: principal.to_string(), roles, blank_roles })
    }
}

/// Union `roles` into the entry for `principal`, creating it if absent.
pub fn merge_into(map: &mut RoleMap, principal: String, roles: BTreeSet<String>) {
    map.entry(principal).or_default().extend(roles);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_dedups() {
        let rec = AssignmentRecord::new(" alice ", &["writer", " writer", "reader ", " "]);
        let n = rec.normalize("/a").unwrap();
        assert_eq!(n.principal, "alice");
        assert_eq!(n.roles.iter().cloned().collect::<Vec<_>>(), vec!["reader", "writer"]);
        assert_eq!(n.blank_roles, 1);
    }

    #[test]
    fn test_normalize_rejects_blank_principal() {
        let err = AssignmentRecord::new("  ", &["writer"]).normalize("/a").unwrap_err();
        assert_eq!(err.code_str(), "malformed_record");
    }

    #[test]
    fn test_normalize_rejects_all_blank_roles() {
        let err = AssignmentRecord::new("bob", &["", "  "]).normalize("/a").unwrap_err();
        assert!(matches!(err, AclError::Malformed { .. }));
        assert!(AssignmentRecord::new("bob", &[]).normalize("/a").is_err());
    }

    #[test]
    fn test_merge_unions_per_principal() {
        let mut m = crate::role_map! { "alice" => ["writer"] };
        merge_into(&mut m, "alice".into(), ["reader".to_string(), "writer".to_string()].into_iter().collect());
        merge_into(&mut m, "bob".into(), ["reader".to_string()].into_iter().collect());
        assert_eq!(m, crate::role_map! { "alice" => ["reader", "writer"], "bob" => ["reader"] });
    }
}
