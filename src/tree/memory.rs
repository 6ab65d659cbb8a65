//! In-memory tree store.
//!
//! Nodes live in a slot arena indexed by `NodeId`; each node keeps the index
//! of its parent so ancestor walks are plain index hops. Removed slots go on a
//! free list and are reused, with a generation bump so old handles stop
//! resolving. A node's assignment container hangs off its own slot on the
//! owner rather than among the content children, so no content path reaches
//! it. A `MemoryRepository` holds the committed arena; every `MemorySession`
//! works on a private copy and publishes it atomically on `save()`, so readers
//! only ever observe committed state. Saves are optimistic: a session that
//! opened before another session's commit fails with `Conflict` instead of
//! overwriting it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{normalize_nfc, validate_node_name, NodeId, NodePath, PropertyValue, TreeSession};
use crate::error::{AclError, AclResult};

/// Simulated storage faults, attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Every read of the node fails with a storage error.
    Unreadable,
    /// The node's parent link cannot be followed (`NotFound`).
    Detached,
}

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    acl_bearing: bool,
    acl_container: Option<NodeId>,
    /// Container nodes and everything below them.
    structural: bool,
    props: BTreeMap<String, PropertyValue>,
    fault: Option<Fault>,
}

impl NodeData {
    fn new(name: &str, parent: Option<NodeId>, structural: bool) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            acl_bearing: false,
            acl_container: None,
            structural,
            props: BTreeMap::new(),
            fault: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Debug, Clone)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    version: u64,
}

const ROOT: NodeId = NodeId::new(0, 0);

fn not_addressable(id: NodeId) -> AclError {
    AclError::input("not_addressable", format!("node {} belongs to an assignment container", id))
}

impl Arena {
    fn new() -> Self {
        Self { slots: vec![Slot { generation: 0, node: Some(NodeData::new("", None, false)) }], free: Vec::new(), version: 0 }
    }

    /// Structural access, ignoring simulated faults.
    fn raw(&self, id: NodeId) -> AclResult<&NodeData> {
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.node.as_ref())
            .ok_or_else(|| AclError::not_found(format!("node {}", id)))
    }

    fn raw_mut(&mut self, id: NodeId) -> AclResult<&mut NodeData> {
        match self.slots.get_mut(id.index()) {
            Some(s) if s.generation == id.generation() => s.node.as_mut(),
            _ => None,
        }
        .ok_or_else(|| AclError::not_found(format!("node {}", id)))
    }

    /// Read access honouring `Fault::Unreadable`.
    fn get(&self, id: NodeId) -> AclResult<&NodeData> {
        let n = self.raw(id)?;
        if n.fault == Some(Fault::Unreadable) {
            return Err(AclError::storage(format!("node {} is unreadable", self.path_of(id))));
        }
        Ok(n)
    }

    fn get_mut(&mut self, id: NodeId) -> AclResult<&mut NodeData> {
        if self.raw(id)?.fault == Some(Fault::Unreadable) {
            return Err(AclError::storage(format!("node {} is unreadable", self.path_of(id))));
        }
        self.raw_mut(id)
    }

    fn live_nodes(&self) -> usize { self.slots.len() - self.free.len() }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(data);
                NodeId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(data) });
                NodeId::new(self.slots.len() - 1, 0)
            }
        }
    }

    /// Free `id` and everything below it, container included.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(slot) = self.slots.get_mut(cur.index()) else { continue };
            if slot.generation != cur.generation() { continue; }
            if let Some(n) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                stack.extend(n.children);
                stack.extend(n.acl_container);
                self.free.push(cur.index());
            }
        }
    }

    fn path_of(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.raw(c) {
                Ok(n) => {
                    if n.parent.is_some() { names.push(n.name.as_str()); }
                    cur = n.parent;
                }
                Err(_) => break,
            }
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    fn child_named(&self, id: NodeId, name: &str) -> AclResult<Option<NodeId>> {
        let n = self.get(id)?;
        for c in n.children.iter() {
            if self.raw(*c)?.name == name { return Ok(Some(*c)); }
        }
        Ok(None)
    }

    fn add_child(&mut self, parent: NodeId, name: &str) -> AclResult<NodeId> {
        let name = normalize_nfc(name);
        validate_node_name(&name)?;
        let structural = self.get(parent)?.structural;
        let id = self.alloc(NodeData::new(&name, Some(parent), structural));
        self.raw_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn add_container(&mut self, owner: NodeId, name: &str) -> AclResult<NodeId> {
        let name = normalize_nfc(name);
        validate_node_name(&name)?;
        let o = self.get(owner)?;
        if o.structural {
            return Err(not_addressable(owner));
        }
        if o.acl_container.is_some() {
            return Err(AclError::input("container_exists", format!("{} already has an assignment container", self.path_of(owner))));
        }
        let id = self.alloc(NodeData::new(&name, Some(owner), true));
        self.raw_mut(owner)?.acl_container = Some(id);
        Ok(id)
    }

    fn remove(&mut self, id: NodeId) -> AclResult<()> {
        if id == ROOT {
            return Err(AclError::input("invalid_remove", "the root node cannot be removed"));
        }
        let parent = self.get(id)?.parent;
        if let Some(p) = parent {
            let pn = self.raw_mut(p)?;
            pn.children.retain(|c| *c != id);
            if pn.acl_container == Some(id) { pn.acl_container = None; }
        }
        self.release(id);
        Ok(())
    }

    fn remove_container(&mut self, owner: NodeId) -> AclResult<()> {
        let container = self.get(owner)?.acl_container;
        if let Some(c) = container {
            self.raw_mut(owner)?.acl_container = None;
            self.release(c);
        }
        Ok(())
    }

    fn to_snapshot(&self, id: NodeId) -> AclResult<NodeSnapshot> {
        let n = self.raw(id)?;
        let acl = match n.acl_container {
            Some(c) => Some(Box::new(self.to_snapshot(c)?)),
            None => None,
        };
        let mut children = Vec::with_capacity(n.children.len());
        for c in n.children.iter() { children.push(self.to_snapshot(*c)?); }
        Ok(NodeSnapshot { name: n.name.clone(), acl_bearing: n.acl_bearing, properties: n.props.clone(), acl, children })
    }

    fn load_node(&mut self, id: NodeId, snap: &NodeSnapshot) -> AclResult<()> {
        {
            let n = self.raw_mut(id)?;
            if snap.acl_bearing && n.structural {
                return Err(not_addressable(id));
            }
            n.acl_bearing = snap.acl_bearing;
            n.props = snap.properties.clone();
        }
        if let Some(acl) = snap.acl.as_deref() {
            let c = self.add_container(id, &acl.name)?;
            self.load_node(c, acl)?;
        }
        for child in snap.children.iter() {
            let c = self.add_child(id, &child.name)?;
            self.load_node(c, child)?;
        }
        Ok(())
    }
}

/// Serializable form of a (sub)tree, used for JSON snapshots and fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub acl_bearing: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
    /// Assignment container and its records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<Box<NodeSnapshot>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

/// Committed tree shared by all sessions.
#[derive(Clone)]
pub struct MemoryRepository {
    state: Arc<RwLock<Arena>>,
}

impl Default for MemoryRepository {
    fn default() -> Self { Self::new() }
}

impl MemoryRepository {
    /// Empty repository holding only the root node.
    pub fn new() -> Self {
        Self { state: Arc::new(RwLock::new(Arena::new())) }
    }

    pub fn session(&self) -> MemorySession {
        let work = self.state.read().clone();
        let s = MemorySession { id: Uuid::new_v4(), repo: self.clone(), base_version: work.version, work, dirty: false };
        debug!(target: "treeacl::store", "session.open sid={} version={}", s.id, s.base_version);
        s
    }

    /// Committed version; bumped by every successful save.
    pub fn version(&self) -> u64 { self.state.read().version }

    pub fn snapshot(&self) -> AclResult<NodeSnapshot> {
        self.state.read().to_snapshot(ROOT)
    }

    /// Build a repository from a snapshot. Names follow the same rules as
    /// `NodePath` segments and are stored NFC-normalized.
    pub fn from_snapshot(root: &NodeSnapshot) -> AclResult<Self> {
        let mut arena = Arena::new();
        arena.load_node(ROOT, root)?;
        Ok(Self { state: Arc::new(RwLock::new(arena)) })
    }

    /// Write the committed tree as pretty JSON (temp file, then rename).
    pub fn save_snapshot(&self, path: &Path) -> AclResult<()> {
        let snap = self.snapshot()?;
        let bytes = serde_json::to_vec_pretty(&snap)?;
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() { std::fs::create_dir_all(dir)?; }
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        debug!(target: "treeacl::store", "snapshot.save path='{}'", path.display());
        Ok(())
    }

    /// Load a repository from a JSON snapshot; a missing file yields an empty tree.
    pub fn load_snapshot(path: &Path) -> AclResult<Self> {
        if !path.exists() { return Ok(Self::new()); }
        let bytes = std::fs::read(path)?;
        let snap: NodeSnapshot = serde_json::from_slice(&bytes)?;
        debug!(target: "treeacl::store", "snapshot.load path='{}'", path.display());
        Self::from_snapshot(&snap)
    }
}

/// Private working copy of the repository; changes are discarded on drop
/// unless `save()` succeeds.
pub struct MemorySession {
    id: Uuid,
    repo: MemoryRepository,
    work: Arena,
    base_version: u64,
    dirty: bool,
}

impl MemorySession {
    pub fn id(&self) -> Uuid { self.id }

    pub fn is_dirty(&self) -> bool { self.dirty }

    /// Node at `path`, creating any missing nodes along the way.
    pub fn ensure_path(&mut self, path: &NodePath) -> AclResult<NodeId> {
        let mut cur = ROOT;
        for seg in path.segments() {
            cur = match self.work.child_named(cur, seg)? {
                Some(c) => c,
                None => {
                    self.dirty = true;
                    self.work.add_child(cur, seg)?
                }
            };
        }
        Ok(cur)
    }

    /// Nodes currently held by the working copy, assignment records included.
    pub fn live_nodes(&self) -> usize { self.work.live_nodes() }

    pub fn set_fault(&mut self, node: NodeId, fault: Option<Fault>) -> AclResult<()> {
        self.work.raw_mut(node)?.fault = fault;
        self.dirty = true;
        Ok(())
    }
}

impl TreeSession for MemorySession {
    fn root(&self) -> AclResult<NodeId> {
        self.work.get(ROOT)?;
        Ok(ROOT)
    }

    fn node(&self, path: &NodePath) -> AclResult<NodeId> {
        let mut cur = self.root()?;
        for seg in path.segments() {
            cur = self.work.child_named(cur, seg)?.ok_or_else(|| AclError::not_found(path.to_string()))?;
        }
        self.work.get(cur)?;
        Ok(cur)
    }

    fn path(&self, node: NodeId) -> AclResult<NodePath> {
        if self.work.raw(node)?.structural {
            return Err(not_addressable(node));
        }
        NodePath::parse(&self.work.path_of(node))
    }

    fn parent(&self, node: NodeId) -> AclResult<Option<NodeId>> {
        let n = self.work.get(node)?;
        if n.fault == Some(Fault::Detached) {
            return Err(AclError::not_found(format!("parent of {}", self.work.path_of(node))));
        }
        Ok(n.parent)
    }

    fn child(&self, node: NodeId, name: &str) -> AclResult<Option<NodeId>> {
        self.work.child_named(node, name)
    }

    fn children(&self, node: NodeId) -> AclResult<Vec<NodeId>> {
        Ok(self.work.get(node)?.children.clone())
    }

    fn add_child(&mut self, node: NodeId, name: &str) -> AclResult<NodeId> {
        let id = self.work.add_child(node, name)?;
        self.dirty = true;
        Ok(id)
    }

    fn remove(&mut self, node: NodeId) -> AclResult<()> {
        self.work.remove(node)?;
        self.dirty = true;
        Ok(())
    }

    fn is_acl_bearing(&self, node: NodeId) -> AclResult<bool> {
        Ok(self.work.get(node)?.acl_bearing)
    }

    fn set_acl_bearing(&mut self, node: NodeId, bearing: bool) -> AclResult<()> {
        let n = self.work.get_mut(node)?;
        if n.structural {
            return Err(not_addressable(node));
        }
        n.acl_bearing = bearing;
        self.dirty = true;
        Ok(())
    }

    fn acl_container(&self, node: NodeId) -> AclResult<Option<NodeId>> {
        Ok(self.work.get(node)?.acl_container)
    }

    fn add_acl_container(&mut self, node: NodeId, name: &str) -> AclResult<NodeId> {
        let id = self.work.add_container(node, name)?;
        self.dirty = true;
        Ok(id)
    }

    fn remove_acl_container(&mut self, node: NodeId) -> AclResult<()> {
        self.work.remove_container(node)?;
        self.dirty = true;
        Ok(())
    }

    fn property(&self, node: NodeId, name: &str) -> AclResult<Option<PropertyValue>> {
        Ok(self.work.get(node)?.props.get(name).cloned())
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: PropertyValue) -> AclResult<()> {
        self.work.get_mut(node)?.props.insert(name.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    fn save(&mut self) -> AclResult<()> {
        if !self.dirty { return Ok(()); }
        let mut committed = self.repo.state.write();
        if committed.version != self.base_version {
            return Err(AclError::conflict(format!(
                "session {} opened at version {} but repository is at {}",
                self.id, self.base_version, committed.version
            )));
        }
        self.work.version = committed.version + 1;
        *committed = self.work.clone();
        self.base_version = self.work.version;
        self.dirty = false;
        debug!(target: "treeacl::store", "session.save sid={} version={}", self.id, self.base_version);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
