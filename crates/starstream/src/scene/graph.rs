//! SceneGraph - arena owning every node plus the octree branches.
//!
//! Nodes are stored in a [`SlotMap`] and linked through [`NodeId`]s. The
//! graph always has exactly one root, created with the graph. Octree-backed
//! nodes keep their index and streaming cache in a side table so the update
//! pass can borrow nodes and branches independently.

use std::collections::{HashMap, HashSet};

use slotmap::SlotMap;
use tracing::debug;

use super::node::{NodeId, SceneNode};
use crate::error::SceneError;
use crate::precision::DdVec3;
use crate::streaming::OctreeBranch;

pub const ROOT_NAME: &str = "Universe";

pub struct SceneGraph {
  pub(crate) nodes: SlotMap<NodeId, SceneNode>,
  pub(crate) octrees: HashMap<NodeId, OctreeBranch>,
  names: HashMap<String, NodeId>,
  root: NodeId,
}

impl Default for SceneGraph {
  fn default() -> Self {
    Self::new()
  }
}

impl SceneGraph {
  /// Create a graph holding only the root group node.
  pub fn new() -> Self {
    let mut nodes = SlotMap::with_key();
    let root = nodes.insert_with_key(|id| {
      let mut node = SceneNode::group(ROOT_NAME);
      node.id = id;
      node.opacity = 1.0;
      node
    });
    let mut names = HashMap::new();
    names.insert(ROOT_NAME.to_lowercase(), root);
    Self {
      nodes,
      octrees: HashMap::new(),
      names,
      root,
    }
  }

  #[inline]
  pub fn root(&self) -> NodeId {
    self.root
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  /// Always false: the root cannot be removed.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  #[inline]
  pub fn contains(&self, id: NodeId) -> bool {
    self.nodes.contains_key(id)
  }

  #[inline]
  pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
    self.nodes.get(id)
  }

  #[inline]
  pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
    self.nodes.get_mut(id)
  }

  pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
    self.nodes.iter()
  }

  /// Static children of `id`. Empty for unknown ids.
  pub fn children(&self, id: NodeId) -> &[NodeId] {
    self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
  }

  pub fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.nodes.get(id).and_then(|n| n.parent)
  }

  /// Insert `node` under `parent` and register its names.
  pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> Result<NodeId, SceneError> {
    if !self.nodes.contains_key(parent) {
      return Err(SceneError::NodeNotFound(parent));
    }
    Ok(self.insert_under(parent, node))
  }

  /// Insert a top-level node directly under the root.
  pub fn add_root(&mut self, node: SceneNode) -> NodeId {
    self.insert_under(self.root, node)
  }

  fn insert_under(&mut self, parent: NodeId, mut node: SceneNode) -> NodeId {
    node.parent = Some(parent);
    node.children.clear();
    node.coordinates_pending = node.coordinates.is_some();
    let names: Vec<String> = node.names.iter().map(|n| n.to_lowercase()).collect();

    let id = self.nodes.insert_with_key(|id| {
      node.id = id;
      node
    });
    if let Some(p) = self.nodes.get_mut(parent) {
      p.children.push(id);
    }
    for name in names {
      self.names.insert(name, id);
    }
    id
  }

  /// Remove `id` and its whole subtree, including any octree branches.
  ///
  /// Returns the number of nodes removed. The root cannot be removed.
  pub fn remove(&mut self, id: NodeId) -> Result<usize, SceneError> {
    if id == self.root {
      return Err(SceneError::RootRemoval);
    }
    let parent = self
      .nodes
      .get(id)
      .ok_or(SceneError::NodeNotFound(id))?
      .parent;

    if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p)) {
      parent.children.retain(|c| *c != id);
    }

    Ok(self.drop_subtrees(vec![id]))
  }

  /// Remove several subtrees at once, unlinking each parent only once.
  /// Unknown ids and the root are skipped. Returns the number of nodes
  /// removed.
  pub fn remove_batch(&mut self, ids: &[NodeId]) -> usize {
    let doomed: HashSet<NodeId> = ids
      .iter()
      .copied()
      .filter(|id| *id != self.root && self.nodes.contains_key(*id))
      .collect();
    let parents: HashSet<NodeId> = doomed
      .iter()
      .filter_map(|id| self.nodes.get(*id)?.parent)
      .collect();
    for parent in parents {
      if let Some(node) = self.nodes.get_mut(parent) {
        node.children.retain(|c| !doomed.contains(c));
      }
    }
    self.drop_subtrees(doomed.into_iter().collect())
  }

  /// Delete already-unlinked subtrees.
  fn drop_subtrees(&mut self, mut stack: Vec<NodeId>) -> usize {
    let mut removed = 0;
    while let Some(current) = stack.pop() {
      let Some(node) = self.nodes.remove(current) else {
        continue;
      };
      removed += 1;
      for name in &node.names {
        let key = name.to_lowercase();
        if self.names.get(&key) == Some(&current) {
          self.names.remove(&key);
        }
      }
      if self.octrees.remove(&current).is_some() {
        debug!(node = ?current, "dropped octree branch with removed node");
      }
      stack.extend(node.children);
    }
    removed
  }

  /// Case-insensitive lookup by any of the node's names.
  pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
    let id = *self.names.get(&name.to_lowercase())?;
    self.nodes.contains_key(id).then_some(id)
  }

  /// Absolute position of `id`: the sum of local positions up to the root.
  pub fn absolute_position(&self, id: NodeId) -> Result<DdVec3, SceneError> {
    let mut node = self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))?;
    let mut position = node.position;
    while let Some(parent) = node.parent.and_then(|p| self.nodes.get(p)) {
      position += parent.position;
      node = parent;
    }
    Ok(position)
  }

  /// Absolute position of the node registered under `name`.
  pub fn get_position(&self, name: &str) -> Result<DdVec3, SceneError> {
    let id = self
      .find_by_name(name)
      .ok_or_else(|| SceneError::NameNotFound(name.to_string()))?;
    self.absolute_position(id)
  }

  /// Make `id` octree-backed: its children come from `branch`.
  pub fn attach_octree(&mut self, id: NodeId, branch: OctreeBranch) -> Result<(), SceneError> {
    let node = self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))?;
    if !node.kind.has_octree_children() {
      return Err(SceneError::NotOctreeBranch(id));
    }
    if self.octrees.contains_key(&id) {
      return Err(SceneError::OctreeAlreadyAttached(id));
    }
    self.octrees.insert(id, branch);
    Ok(())
  }

  pub fn octree(&self, id: NodeId) -> Option<&OctreeBranch> {
    self.octrees.get(&id)
  }

  pub fn octree_mut(&mut self, id: NodeId) -> Option<&mut OctreeBranch> {
    self.octrees.get_mut(&id)
  }

  pub fn octree_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
    self.octrees.keys().copied()
  }

  /// Node ids in depth-first pre-order from the root.
  pub fn depth_first(&self) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(self.nodes.len());
    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      let Some(node) = self.nodes.get(id) else {
        continue;
      };
      order.push(id);
      stack.extend(node.children.iter().rev().copied());
    }
    order
  }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;
