//! Id-addressed transform hierarchy.
//!
//! [`SceneGraph`] owns every node's transform data, keyed by the
//! [`GameObjectId`] of the object it belongs to. Top-level nodes hang off the
//! synthetic [`VIRTUAL_ROOT_ID`].
//!
//! # Dirty propagation
//!
//! Writing a local transform marks the node and its whole subtree dirty. A
//! node's cached world matrix is only trusted when neither it nor any ancestor
//! is dirty; [`SceneGraph::world_matrix`] composes along the ancestor chain
//! otherwise, and [`SceneGraph::update_world_transforms`] refreshes every cache.
//!
//! # Activity
//!
//! `hierarchy_active = parent.hierarchy_active && self_enabled`, maintained
//! eagerly on enable changes and reparenting.

use glam::{Mat4, Quat, Vec3};
use lumen_core::ids::{GameObjectId, VIRTUAL_ROOT_ID};
use lumen_core::logging::targets;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::node::{NodeMut, NodeRef};
use crate::transform::{LocalTransform, rotation_of, scale_of};

pub type ChildList = SmallVec<[GameObjectId; 4]>;

#[derive(Clone, Debug)]
pub struct NodeRecord {
    pub(crate) parent: GameObjectId,
    pub(crate) children: ChildList,
    pub(crate) local: LocalTransform,
    pub(crate) world_matrix: Mat4,
    pub(crate) dirty: bool,
    pub(crate) self_enabled: bool,
    pub(crate) hierarchy_active: bool,
}

impl NodeRecord {
    fn new(parent: GameObjectId, parent_active: bool) -> Self {
        Self {
            parent,
            children: ChildList::new(),
            local: LocalTransform::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            dirty: true,
            self_enabled: true,
            hierarchy_active: parent_active,
        }
    }

    #[must_use]
    pub fn parent(&self) -> GameObjectId {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[GameObjectId] {
        &self.children
    }

    #[must_use]
    pub fn local(&self) -> &LocalTransform {
        &self.local
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn self_enabled(&self) -> bool {
        self.self_enabled
    }

    #[must_use]
    pub fn hierarchy_active(&self) -> bool {
        self.hierarchy_active
    }
}

/// Serialized form of one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: GameObjectId,
    pub parent: GameObjectId,
    pub children: Vec<GameObjectId>,
    pub local: LocalTransform,
    pub self_enabled: bool,
}

/// Serialized form of a whole graph. Nodes are sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneGraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub root_children: Vec<GameObjectId>,
}

#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    nodes: FxHashMap<GameObjectId, NodeRecord>,
    root_children: ChildList,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Adds a top-level node with identity transform. Fails for the invalid id
    /// and for ids already registered.
    pub fn register_node(&mut self, id: GameObjectId) -> bool {
        if !id.is_valid() || self.nodes.contains_key(&id) {
            log::warn!(target: targets::SCENE_GRAPH, "register_node rejected id {id}");
            return false;
        }
        self.nodes.insert(id, NodeRecord::new(VIRTUAL_ROOT_ID, true));
        self.root_children.push(id);
        true
    }

    #[must_use]
    pub fn has_node(&self, id: GameObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn record(&self, id: GameObjectId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn node(&self, id: GameObjectId) -> Option<NodeRef<'_>> {
        self.nodes.contains_key(&id).then(|| NodeRef::new(self, id))
    }

    pub fn node_mut(&mut self, id: GameObjectId) -> Option<NodeMut<'_>> {
        if self.nodes.contains_key(&id) {
            Some(NodeMut::new(self, id))
        } else {
            None
        }
    }

    #[must_use]
    pub fn parent(&self, id: GameObjectId) -> Option<GameObjectId> {
        self.nodes.get(&id).map(|node| node.parent)
    }

    /// Children of `id`; [`VIRTUAL_ROOT_ID`] yields the top-level nodes.
    #[must_use]
    pub fn children(&self, id: GameObjectId) -> Option<&[GameObjectId]> {
        if id == VIRTUAL_ROOT_ID {
            return Some(&self.root_children);
        }
        self.nodes.get(&id).map(|node| node.children.as_slice())
    }

    #[must_use]
    pub fn root_children(&self) -> &[GameObjectId] {
        &self.root_children
    }

    /// Post-order ids of the subtree rooted at `id` (children before parents).
    #[must_use]
    pub fn collect_subtree_postorder(&self, id: GameObjectId) -> Vec<GameObjectId> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(&id) {
            return out;
        }
        let mut stack: Vec<(GameObjectId, bool)> = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                out.push(current);
                continue;
            }
            stack.push((current, true));
            if let Some(node) = self.nodes.get(&current) {
                for &child in node.children.iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        out
    }

    /// Erases `root_id` and its descendants. Returns the removed ids in post-order.
    pub fn unregister_subtree(&mut self, root_id: GameObjectId) -> Vec<GameObjectId> {
        let victims = self.collect_subtree_postorder(root_id);
        if victims.is_empty() {
            return victims;
        }
        if let Some(parent) = self.parent(root_id) {
            self.detach_from_parent(root_id, parent);
        }
        for id in &victims {
            self.nodes.remove(id);
        }
        log::debug!(target: targets::SCENE_GRAPH, "Unregistered subtree of {root_id} ({} nodes)", victims.len());
        victims
    }

    fn detach_from_parent(&mut self, child: GameObjectId, parent: GameObjectId) {
        let siblings = if parent == VIRTUAL_ROOT_ID {
            Some(&mut self.root_children)
        } else {
            self.nodes.get_mut(&parent).map(|node| &mut node.children)
        };
        if let Some(siblings) = siblings {
            siblings.retain(|sibling| *sibling != child);
        }
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    fn is_ancestor_or_self(&self, candidate: GameObjectId, mut id: GameObjectId) -> bool {
        while id != VIRTUAL_ROOT_ID {
            if id == candidate {
                return true;
            }
            match self.nodes.get(&id) {
                Some(node) => id = node.parent,
                None => return false,
            }
        }
        false
    }

    /// Moves `child` under `new_parent` ([`VIRTUAL_ROOT_ID`] for top level).
    ///
    /// Returns `false` and leaves the graph untouched for unknown nodes,
    /// self-parenting and cycles. With `world_position_stays`, the child's world
    /// position, rotation and scale are preserved.
    pub fn set_parent(&mut self, child: GameObjectId, new_parent: GameObjectId, world_position_stays: bool) -> bool {
        let Some(old_parent) = self.parent(child) else {
            log::warn!(target: targets::SCENE_GRAPH, "set_parent: unknown child {child}");
            return false;
        };
        if new_parent != VIRTUAL_ROOT_ID && !self.nodes.contains_key(&new_parent) {
            log::warn!(target: targets::SCENE_GRAPH, "set_parent: unknown parent {new_parent}");
            return false;
        }
        if child == new_parent {
            log::warn!(target: targets::SCENE_GRAPH, "set_parent: {child} cannot parent itself");
            return false;
        }
        if self.is_ancestor_or_self(child, new_parent) {
            log::warn!(target: targets::SCENE_GRAPH, "set_parent: {new_parent} is a descendant of {child}");
            return false;
        }
        if old_parent == new_parent {
            return true;
        }

        let world = world_position_stays.then(|| {
            let matrix = self.world_matrix(child).unwrap_or(Mat4::IDENTITY);
            (matrix.w_axis.truncate(), rotation_of(&matrix), scale_of(&matrix))
        });

        self.detach_from_parent(child, old_parent);
        if new_parent == VIRTUAL_ROOT_ID {
            self.root_children.push(child);
        } else if let Some(parent) = self.nodes.get_mut(&new_parent) {
            parent.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = new_parent;
        }
        self.mark_subtree_dirty(child);
        self.refresh_hierarchy_active(child);

        if let Some((position, rotation, scale)) = world {
            self.set_world_position(child, position);
            self.set_world_rotation(child, rotation);
            self.set_world_scale(child, scale);
        }
        true
    }

    pub fn clear_parent(&mut self, child: GameObjectId, world_position_stays: bool) -> bool {
        self.set_parent(child, VIRTUAL_ROOT_ID, world_position_stays)
    }

    // ========================================================================
    // Enable state
    // ========================================================================

    fn parent_active(&self, id: GameObjectId) -> bool {
        match self.nodes.get(&id).map(|node| node.parent) {
            Some(VIRTUAL_ROOT_ID) | None => true,
            Some(parent) => self.nodes.get(&parent).is_some_and(|node| node.hierarchy_active),
        }
    }

    fn refresh_hierarchy_active(&mut self, id: GameObjectId) {
        let mut stack = vec![(id, self.parent_active(id))];
        while let Some((current, parent_active)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            node.hierarchy_active = parent_active && node.self_enabled;
            let active = node.hierarchy_active;
            stack.extend(node.children.iter().map(|&child| (child, active)));
        }
    }

    pub fn set_enabled(&mut self, id: GameObjectId, enabled: bool) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        if node.self_enabled != enabled {
            node.self_enabled = enabled;
            self.refresh_hierarchy_active(id);
        }
        true
    }

    /// The node's own flag, regardless of its ancestors.
    #[must_use]
    pub fn is_enabled(&self, id: GameObjectId) -> bool {
        self.nodes.get(&id).is_some_and(|node| node.self_enabled)
    }

    #[must_use]
    pub fn is_active_in_hierarchy(&self, id: GameObjectId) -> bool {
        self.nodes.get(&id).is_some_and(|node| node.hierarchy_active)
    }

    /// Ids with `hierarchy_active == true`, in depth-first traversal order.
    #[must_use]
    pub fn active_nodes(&self) -> Vec<GameObjectId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<GameObjectId> = self.root_children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.hierarchy_active {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    fn mark_subtree_dirty(&mut self, id: GameObjectId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&current) {
                node.dirty = true;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    #[must_use]
    pub fn local_transform(&self, id: GameObjectId) -> Option<LocalTransform> {
        self.nodes.get(&id).map(|node| node.local)
    }

    fn write_local(&mut self, id: GameObjectId, write: impl FnOnce(&mut LocalTransform)) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        write(&mut node.local);
        self.mark_subtree_dirty(id);
        true
    }

    pub fn set_local_position(&mut self, id: GameObjectId, position: Vec3) -> bool {
        self.write_local(id, |local| local.position = position)
    }

    pub fn set_local_rotation(&mut self, id: GameObjectId, rotation: Quat) -> bool {
        self.write_local(id, |local| local.rotation = rotation.normalize())
    }

    pub fn set_local_scale(&mut self, id: GameObjectId, scale: Vec3) -> bool {
        self.write_local(id, |local| local.scale = scale)
    }

    pub fn set_local_transform(&mut self, id: GameObjectId, transform: LocalTransform) -> bool {
        self.write_local(id, |local| {
            *local = LocalTransform {
                rotation: transform.rotation.normalize(),
                ..transform
            };
        })
    }

    /// Decomposes `matrix` into the node's local TRS.
    pub fn set_local_model_matrix(&mut self, id: GameObjectId, matrix: &Mat4) -> bool {
        self.set_local_transform(id, LocalTransform::from_matrix(matrix))
    }

    /// World matrix of `id`, composed along the ancestor chain when any link is dirty.
    #[must_use]
    pub fn world_matrix(&self, id: GameObjectId) -> Option<Mat4> {
        let mut chain: SmallVec<[&NodeRecord; 16]> = SmallVec::new();
        let mut current = id;
        let mut any_dirty = false;
        while current != VIRTUAL_ROOT_ID {
            let node = self.nodes.get(&current)?;
            any_dirty |= node.dirty;
            chain.push(node);
            current = node.parent;
        }
        let first = chain.first()?;
        if !any_dirty {
            return Some(first.world_matrix);
        }
        Some(
            chain
                .iter()
                .rev()
                .fold(Mat4::IDENTITY, |parent, node| parent * node.local.to_matrix()),
        )
    }

    fn parent_world_matrix(&self, id: GameObjectId) -> Mat4 {
        match self.parent(id) {
            Some(parent) if parent != VIRTUAL_ROOT_ID => self.world_matrix(parent).unwrap_or(Mat4::IDENTITY),
            _ => Mat4::IDENTITY,
        }
    }

    pub fn set_world_position(&mut self, id: GameObjectId, position: Vec3) -> bool {
        let parent = self.parent_world_matrix(id);
        let local = parent.inverse().transform_point3(position);
        self.set_local_position(id, local)
    }

    pub fn set_world_rotation(&mut self, id: GameObjectId, rotation: Quat) -> bool {
        let parent = rotation_of(&self.parent_world_matrix(id));
        self.set_local_rotation(id, (parent.inverse() * rotation).normalize())
    }

    pub fn set_world_scale(&mut self, id: GameObjectId, scale: Vec3) -> bool {
        let parent = scale_of(&self.parent_world_matrix(id));
        let safe = |value: f32| if value.abs() > f32::EPSILON { value } else { 1.0 };
        let local = Vec3::new(scale.x / safe(parent.x), scale.y / safe(parent.y), scale.z / safe(parent.z));
        self.set_local_scale(id, local)
    }

    /// Recomputes every cached world matrix whose node or ancestor was dirty.
    pub fn update_world_transforms(&mut self) {
        let mut stack: Vec<(GameObjectId, Mat4, bool)> = self
            .root_children
            .iter()
            .rev()
            .map(|&id| (id, Mat4::IDENTITY, false))
            .collect();
        while let Some((id, parent_world, parent_changed)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            let changed = node.dirty || parent_changed;
            if changed {
                node.world_matrix = parent_world * node.local.to_matrix();
                node.dirty = false;
            }
            let world = node.world_matrix;
            stack.extend(node.children.iter().rev().map(|&child| (child, world, changed)));
        }
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    #[must_use]
    pub fn to_snapshot(&self) -> SceneGraphSnapshot {
        let mut ids: Vec<GameObjectId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        let nodes = ids
            .into_iter()
            .filter_map(|id| {
                self.nodes.get(&id).map(|node| NodeSnapshot {
                    id,
                    parent: node.parent,
                    children: node.children.to_vec(),
                    local: node.local,
                    self_enabled: node.self_enabled,
                })
            })
            .collect();
        SceneGraphSnapshot {
            nodes,
            root_children: self.root_children.to_vec(),
        }
    }

    /// Rebuilds a graph from `snapshot`; `None` if the snapshot is inconsistent.
    #[must_use]
    pub fn from_snapshot(snapshot: &SceneGraphSnapshot) -> Option<Self> {
        let mut graph = Self::default();
        for node in &snapshot.nodes {
            if !node.id.is_valid() || graph.nodes.contains_key(&node.id) {
                return None;
            }
            let mut record = NodeRecord::new(node.parent, true);
            record.children = node.children.iter().copied().collect();
            record.local = node.local;
            record.self_enabled = node.self_enabled;
            graph.nodes.insert(node.id, record);
        }
        graph.root_children = snapshot.root_children.iter().copied().collect();

        // Every node must be reached exactly once from the root, through a
        // parent whose child list names it.
        let mut seen: FxHashSet<GameObjectId> = FxHashSet::default();
        let mut stack: Vec<(GameObjectId, GameObjectId)> =
            graph.root_children.iter().map(|&id| (id, VIRTUAL_ROOT_ID)).collect();
        while let Some((id, expected_parent)) = stack.pop() {
            let node = graph.nodes.get(&id)?;
            if node.parent != expected_parent || !seen.insert(id) {
                return None;
            }
            stack.extend(node.children.iter().map(|&child| (child, id)));
        }
        if seen.len() != graph.nodes.len() {
            return None;
        }

        let roots: Vec<GameObjectId> = graph.root_children.to_vec();
        for id in roots {
            graph.refresh_hierarchy_active(id);
        }
        graph.update_world_transforms();
        Some(graph)
    }
}
