//! Role engine integration tests: locality, inheritance, replace-all writes and
//! deletion, exercised against the in-memory tree store.

use anyhow::Result;

use treeacl::acl::RoleMap;
use treeacl::service::parse_assignments;
use treeacl::tree::{Fault, MemoryRepository, MemorySession, NodeId, NodePath, PropertyValue};
use treeacl::{role_map, AccessRoles, TreeSession};

fn p(s: &str) -> NodePath { NodePath::parse(s).expect("valid path") }

fn fixture(paths: &[&str]) -> Result<(MemorySession, Vec<NodeId>)> {
    let repo = MemoryRepository::new();
    let mut s = repo.session();
    let mut ids = Vec::new();
    for path in paths {
        ids.push(s.ensure_path(&p(path))?);
    }
    Ok((s, ids))
}

#[test]
fn local_acl_is_authoritative_for_both_lookup_modes() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a", "/a/n"])?;
    roles.replace(&mut s, ids[0], &role_map! { "alice" => ["writer"] })?;
    roles.replace(&mut s, ids[1], &role_map! { "nina" => ["reader"] })?;
    let own = Some(role_map! { "nina" => ["reader"] });
    assert_eq!(roles.resolve(&s, ids[1], true)?, own);
    assert_eq!(roles.resolve(&s, ids[1], false)?, own);

    // an explicit but empty ACL also stops inheritance
    let (mut s, ids) = fixture(&["/a", "/a/n"])?;
    roles.replace(&mut s, ids[0], &role_map! { "alice" => ["writer"] })?;
    s.set_acl_bearing(ids[1], true)?;
    assert_eq!(roles.resolve(&s, ids[1], true)?, Some(RoleMap::new()));
    Ok(())
}

#[test]
fn direct_lookup_never_inherits() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a", "/a/b", "/a/b/c"])?;
    let root = s.root()?;
    roles.replace(&mut s, root, &role_map! { "admin" => ["admin"] })?;
    roles.replace(&mut s, ids[0], &role_map! { "alice" => ["writer"] })?;
    assert_eq!(roles.resolve(&s, ids[1], false)?, None);
    assert_eq!(roles.resolve(&s, ids[2], false)?, None);
    Ok(())
}

#[test]
fn no_governing_node_yields_default_roles() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a", "/a/b"])?;
    assert_eq!(roles.resolve(&s, ids[1], true)?, Some(roles.default_roles().clone()));
    assert_eq!(roles.default_roles(), &role_map! { "EVERYONE" => ["admin"] });

    // broken chain below a marked ancestor still falls back to the defaults
    roles.replace(&mut s, ids[0], &role_map! { "alice" => ["writer"] })?;
    s.set_fault(ids[1], Some(Fault::Detached))?;
    let c = s.ensure_path(&p("/a/b/c"))?;
    assert_eq!(roles.resolve(&s, c, true)?, Some(roles.default_roles().clone()));
    Ok(())
}

#[test]
fn nearest_marked_ancestor_wins() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a", "/a/b", "/a/b/c"])?;
    let (a, b, c) = (ids[0], ids[1], ids[2]);
    let root = s.root()?;
    roles.replace(&mut s, root, &role_map! { "root" => ["admin"] })?;
    roles.replace(&mut s, a, &role_map! { "alice" => ["writer"] })?;
    roles.replace(&mut s, c, &role_map! { "carol" => ["reader"] })?;
    assert_eq!(roles.resolve(&s, c, true)?, Some(role_map! { "carol" => ["reader"] }));
    assert_eq!(roles.resolve(&s, b, true)?, Some(role_map! { "alice" => ["writer"] }));
    assert_eq!(roles.resolve(&s, a, true)?, Some(role_map! { "alice" => ["writer"] }));
    Ok(())
}

#[test]
fn replace_leaves_no_residue() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a"])?;
    let a = ids[0];
    roles.replace(&mut s, a, &role_map! { "alice" => ["writer", "reader"], "bob" => ["reader"] })?;
    roles.replace(&mut s, a, &role_map! { "carol" => ["admin"], "dave" => ["reader", "auditor"] })?;
    let got = roles.resolve(&s, a, false)?.expect("local acl");
    assert_eq!(got, role_map! { "carol" => ["admin"], "dave" => ["auditor", "reader"] });
    assert!(!got.contains_key("alice") && !got.contains_key("bob"));
    let container = s.acl_container(a)?.expect("container");
    assert_eq!(s.children(container)?.len(), 2);
    Ok(())
}

/// (principal, roles) of every stored record, in storage order.
fn stored_records(s: &MemorySession, node: NodeId) -> Result<Vec<(PropertyValue, PropertyValue)>> {
    let container = s.acl_container(node)?.expect("container");
    let mut out = Vec::new();
    for rec in s.children(container)? {
        out.push((s.property(rec, "principal")?.expect("principal"), s.property(rec, "role")?.expect("role")));
    }
    Ok(out)
}

#[test]
fn replace_layout_ignores_input_order_and_prior_state() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/x", "/y"])?;
    let (x, y) = (ids[0], ids[1]);
    roles.replace(&mut s, y, &role_map! { "zed" => ["old"], "p2" => ["stale"], "aaa" => ["gone"] })?;

    let forward = parse_assignments(r#"{"p1":["r1","r2"],"p2":["r2"],"p3":[" r3 ","r1"]}"#)?;
    let backward = parse_assignments(r#"{"p3":["r1","r3"],"p2":["r2","r2"],"p1":["r2","r1"]}"#)?;
    roles.replace(&mut s, x, &forward)?;
    roles.replace(&mut s, y, &backward)?;

    let got = stored_records(&s, x)?;
    assert_eq!(got, stored_records(&s, y)?);
    let strs = |v: &[&str]| PropertyValue::Strs(v.iter().map(|r| r.to_string()).collect());
    assert_eq!(
        got,
        vec![
            (PropertyValue::Str("p1".into()), strs(&["r1", "r2"])),
            (PropertyValue::Str("p2".into()), strs(&["r2"])),
            (PropertyValue::Str("p3".into()), strs(&["r1", "r3"])),
        ]
    );
    Ok(())
}

#[test]
fn delete_all_is_idempotent() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a", "/a/b"])?;
    let (a, b) = (ids[0], ids[1]);
    roles.delete_all(&mut s, b)?;
    roles.replace(&mut s, a, &role_map! { "alice" => ["writer"] })?;
    roles.delete_all(&mut s, a)?;
    roles.delete_all(&mut s, a)?;
    assert!(!s.is_acl_bearing(a)?);
    assert_eq!(roles.resolve(&s, a, false)?, None);
    assert_eq!(roles.resolve(&s, b, true)?, Some(roles.default_roles().clone()));
    Ok(())
}

#[test]
fn scenario_inherit_from_parent() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a", "/a/b"])?;
    roles.replace(&mut s, ids[0], &role_map! { "alice" => ["writer"] })?;
    assert_eq!(roles.resolve(&s, ids[1], true)?, Some(role_map! { "alice" => ["writer"] }));
    assert_eq!(roles.resolve(&s, ids[1], false)?, None);
    Ok(())
}

#[test]
fn scenario_local_assignment_shadows_parent() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a", "/a/b"])?;
    roles.replace(&mut s, ids[0], &role_map! { "alice" => ["writer"] })?;
    roles.replace(&mut s, ids[1], &role_map! { "bob" => ["reader"] })?;
    assert_eq!(roles.resolve(&s, ids[1], true)?, Some(role_map! { "bob" => ["reader"] }));
    Ok(())
}

#[test]
fn scenario_second_replace_wins() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a"])?;
    roles.replace(&mut s, ids[0], &role_map! { "alice" => ["writer", "reader"] })?;
    roles.replace(&mut s, ids[0], &role_map! { "carol" => ["admin"] })?;
    assert_eq!(roles.resolve(&s, ids[0], false)?, Some(role_map! { "carol" => ["admin"] }));
    Ok(())
}

#[test]
fn resolve_by_path_starts_from_closest_existing_node() -> Result<()> {
    let roles = AccessRoles::default();
    let (mut s, ids) = fixture(&["/a", "/a/b"])?;
    roles.replace(&mut s, ids[1], &role_map! { "bob" => ["reader"] })?;
    assert_eq!(roles.locate(&s, &p("/a/b/c/d"))?, ids[1]);
    assert_eq!(roles.resolve_by_path(&s, &p("/a/b/c/d"))?, Some(role_map! { "bob" => ["reader"] }));
    assert_eq!(roles.resolve_by_path(&s, &p("/a/zz"))?, Some(roles.default_roles().clone()));
    Ok(())
}
