use tracing::trace;

use super::model::RoleMap;
use super::resolve::resolve;
use crate::config::AclConfig;
use crate::error::AclResult;
use crate::tree::{NodeId, NodePath, TreeSession};

/// Closest existing node at or above `path`. The root is always assumed to
/// exist; failing to read it, or any non-not-found failure on the way up, is
/// returned to the caller.
pub fn locate<S: TreeSession + ?Sized>(session: &S, path: &NodePath) -> AclResult<NodeId> {
    for p in path.ancestors_inclusive() {
        if p.is_root() {
            break;
        }
        match session.node(&p) {
            Ok(n) => return Ok(n),
            Err(e) if e.is_not_found() => trace!(target: "treeacl::locate", "Cannot find node: {}, trying parent.", p),
            Err(e) => return Err(e),
        }
    }
    session.root()
}

/// Effective roles for `path`, starting from the closest existing node.
pub fn resolve_by_path<S: TreeSession + ?Sized>(session: &S, path: &NodePath, cfg: &AclConfig) -> AclResult<Option<RoleMap>> {
    let node = locate(session, path)?;
    resolve(session, node, true, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Fault, MemoryRepository};

    fn p(s: &str) -> NodePath { NodePath::parse(s).unwrap() }

    #[test]
    fn test_locate_exact_and_missing_descendants() {
        let repo = MemoryRepository::new();
        let mut s = repo.session();
        let b = s.ensure_path(&p("/a/b")).unwrap();
        assert_eq!(locate(&s, &p("/a/b")).unwrap(), b);
        assert_eq!(locate(&s, &p("/a/b/not/yet")).unwrap(), b);
        assert_eq!(locate(&s, &p("/zzz")).unwrap(), s.root().unwrap());
        assert_eq!(locate(&s, &NodePath::root()).unwrap(), s.root().unwrap());
    }

    #[test]
    fn test_locate_propagates_storage_failures() {
        let repo = MemoryRepository::new();
        let mut s = repo.session();
        let a = s.ensure_path(&p("/a")).unwrap();
        s.ensure_path(&p("/a/b")).unwrap();
        s.set_fault(a, Some(Fault::Unreadable)).unwrap();
        assert!(locate(&s, &p("/a/b/c")).unwrap_err().is_storage_failure());
        let root = s.root().unwrap();
        s.set_fault(a, None).unwrap();
        s.set_fault(root, Some(Fault::Unreadable)).unwrap();
        assert!(locate(&s, &p("/q")).unwrap_err().is_storage_failure());
    }

    #[test]
    fn test_resolve_by_path_inherits_for_nonexistent_child() {
        let repo = MemoryRepository::new();
        let mut s = repo.session();
        let cfg = AclConfig::default();
        let a = s.ensure_path(&p("/a")).unwrap();
        crate::acl::assign::replace(&mut s, a, &crate::role_map! { "alice" => ["writer"] }, &cfg).unwrap();
        let got = resolve_by_path(&s, &p("/a/new/child"), &cfg).unwrap();
        assert_eq!(got, Some(crate::role_map! { "alice" => ["writer"] }));
        let fallback = resolve_by_path(&s, &p("/other"), &cfg).unwrap();
        assert_eq!(fallback, Some(cfg.default_roles.clone()));
    }
}
