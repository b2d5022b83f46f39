/*!

[`NodeStore`] is the append-only arena backing a [`crate::graph::Graph`]: a flat `Vec<Node>`
indexed by 32-bit id, plus the dimension boundaries (`kstart`, `ostart`, `estart`, `nstart`) that
partition the id space into reserved / entry / internal regions.

*/

use crate::error::{CapacityError, Result};
use crate::node::{Node, IBIT};

/// How close to `maxNodes` the store is allowed to get before `alloc` starts failing. Mirrors the
/// reference engine's practice of refusing to run right up to the wire, since a handful of
/// in-flight recursive normaliser calls may each want to allocate one more node before the caller
/// observes the error.
pub const SAFETY_MARGIN: u32 = 10;

/// Dimensions fixed at construction time and never mutated afterwards (aside from `ncount`,
/// which `NodeStore` itself tracks as the arena grows, and which `rewind` resets).
#[derive(Copy, Clone, Debug)]
pub struct Dimensions {
  /// First input key id. Ids below this are reserved (e.g. an error sentinel at id 1).
  pub kstart: u32,
  /// First output key id.
  pub ostart: u32,
  /// First external/extended key id.
  pub estart: u32,
  /// Id of the first internal node; also the number of entry nodes, `[0, nstart)`.
  pub nstart: u32,
  /// Hard ceiling on `ncount`.
  pub max_nodes: u32,
}

pub struct NodeStore {
  pub dims: Dimensions,
  nodes:    Vec<Node>,
}

impl NodeStore {
  /// Builds a store with `nstart` entry nodes pre-populated as `(0, IBIT, id)` self-references,
  /// per the entry-node invariant in §3.
  pub fn new(dims: Dimensions) -> Self {
    let mut nodes = Vec::with_capacity(dims.max_nodes as usize);
    nodes.push(Node::new(0, 0, 0)); // id 0: constant false, never read as Q/T/F of anything live
    for id in 1..dims.nstart {
      nodes.push(Node::new(0, IBIT, id));
    }
    NodeStore { dims, nodes }
  }

  #[inline]
  pub fn ncount(&self) -> u32 {
    self.nodes.len() as u32
  }

  #[inline]
  pub fn get(&self, id: u32) -> Node {
    self.nodes[id as usize]
  }

  #[inline]
  pub fn is_entry(&self, id: u32) -> bool {
    id < self.dims.nstart
  }

  #[inline]
  pub fn is_internal(&self, id: u32) -> bool {
    id >= self.dims.nstart
  }

  /// Appends a new node, returning its freshly assigned id. Does not consult or update the index;
  /// callers go through `Graph::add_basic_node` for that.
  pub fn alloc(&mut self, node: Node) -> Result<u32> {
    if self.ncount() + SAFETY_MARGIN >= self.dims.max_nodes {
      return Err(CapacityError::Nodes { max_nodes: self.dims.max_nodes }.into());
    }
    let id = self.ncount();
    self.nodes.push(node);
    Ok(id)
  }

  /// Drops every node beyond `nstart`. Entries are untouched.
  pub fn rewind(&mut self) {
    self.nodes.truncate(self.dims.nstart as usize);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dims() -> Dimensions {
    Dimensions { kstart: 1, ostart: 1, estart: 4, nstart: 4, max_nodes: 64 }
  }

  #[test]
  fn entries_are_self_referencing() {
    let store = NodeStore::new(dims());
    for id in 1..4 {
      let node = store.get(id);
      assert_eq!(node, Node::new(0, IBIT, id));
    }
  }

  #[test]
  fn alloc_assigns_monotonic_ids() {
    let mut store = NodeStore::new(dims());
    let first = store.alloc(Node::new(1, 2, 3)).unwrap();
    let second = store.alloc(Node::new(1, 2, 3)).unwrap();
    assert_eq!(first, 4);
    assert_eq!(second, 5);
  }

  #[test]
  fn alloc_fails_within_safety_margin_of_capacity() {
    let mut store = NodeStore::new(Dimensions { max_nodes: 5, ..dims() });
    let err = store.alloc(Node::new(1, 2, 3));
    assert!(err.is_err());
  }

  #[test]
  fn rewind_truncates_to_nstart() {
    let mut store = NodeStore::new(dims());
    store.alloc(Node::new(1, 2, 3)).unwrap();
    assert_eq!(store.ncount(), 5);
    store.rewind();
    assert_eq!(store.ncount(), 4);
  }
}
