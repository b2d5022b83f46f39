/*!

[`Graph`] is the top-level object: a `NodeStore` plus `NodeIndex`, named entries and roots, an
optional `system` root, a history log, and the flags that gate which stages of the normaliser
pipeline run. Everything in [`crate::normalize`], [`crate::reorder`], [`crate::rewrite`] and
[`crate::compare`] operates on a `&mut Graph` (or `&Graph` for read-only comparison).

*/

use crate::compare::{compare, Cascade};
use crate::context::Context;
use crate::error::{CapacityError, Error, Result};
use crate::flags::Flags;
use crate::index::NodeIndex;
use crate::node::{Node, NodeId, IBIT};
use crate::normalize;
use crate::persist;
use crate::rewrite::RewriteCounters;
use crate::store::{Dimensions, NodeStore};
use qdag_abs::MapPool;

pub struct Graph {
  pub(crate) store:   NodeStore,
  pub(crate) index:   NodeIndex,
  pub(crate) pool:    MapPool,
  pub(crate) ctx:     Context,
  pub flags:           Flags,
  pub roots:           Vec<u32>,
  pub entry_names:     Vec<String>,
  pub root_names:      Vec<String>,
  pub history:         Vec<u32>,
  pub system:          Option<u32>,
  pub rewrite_counters: RewriteCounters,
}

impl Graph {
  pub fn new(dims: Dimensions, num_roots: u32, flags: Flags, ctx: Context) -> Result<Self> {
    let store = NodeStore::new(dims);
    let index = NodeIndex::new(2 * dims.max_nodes as usize);
    let pool = MapPool::new(dims.max_nodes as usize);
    let entry_names = (0..dims.nstart).map(|i| format!("e{i}")).collect();
    let root_names = (0..num_roots).map(|i| format!("o{i}")).collect();
    Ok(Graph {
      store,
      index,
      pool,
      ctx,
      flags,
      roots: vec![0; num_roots as usize],
      entry_names,
      root_names,
      history: Vec::new(),
      system: None,
      rewrite_counters: RewriteCounters::default(),
    })
  }

  #[inline]
  pub fn dims(&self) -> &Dimensions {
    &self.store.dims
  }

  #[inline]
  pub fn ncount(&self) -> u32 {
    self.store.ncount()
  }

  #[inline]
  pub fn is_entry(&self, id: u32) -> bool {
    self.store.is_entry(id)
  }

  #[inline]
  pub fn node(&self, id: u32) -> Node {
    self.store.get(id)
  }

  #[inline]
  pub fn context(&self) -> &Context {
    &self.ctx
  }

  #[inline]
  pub fn pool(&self) -> &MapPool {
    &self.pool
  }

  /// The only place a node may be intern: looks up `(q, t, f)` in the index, appending a fresh
  /// node on a miss. Callers must have already brought `(q, t, f)` into canonical, invariant-
  /// satisfying form; this step performs no transformation of its own.
  pub fn add_basic_node(&mut self, q: u32, t: u32, f: u32) -> Result<u32> {
    let lookup_fn = |id: u32| {
      let n = self.store.get(id);
      (n.q, n.t, n.f)
    };
    let (slot, found) = self.index.lookup(q, t, f, &lookup_fn);
    if found != 0 {
      return Ok(found);
    }
    let id = self.store.alloc(Node::new(q, t, f))?;
    self.ctx.metrics().record_alloc();
    self.index.install(slot, id);
    Ok(id)
  }

  /// The main entry point: canonicalises `(q, t, f)` and returns the id of the resulting node
  /// (possibly carrying `IBIT`). See [`crate::normalize::add_normalise_node`].
  pub fn add_normalise_node(&mut self, q: u32, t: u32, f: u32) -> Result<NodeId> {
    normalize::add_normalise_node(self, q, t, f)
  }

  pub fn compare(&self, lhs: u32, rhs_graph: &Graph, rhs: u32, cascade: Cascade) -> std::cmp::Ordering {
    compare(self, lhs, rhs_graph, rhs, cascade)
  }

  pub fn set_root(&mut self, index: usize, reference: NodeId) -> Result<()> {
    self
      .roots
      .get_mut(index)
      .map(|slot| *slot = reference.raw())
      .ok_or_else(|| Error::NotFoundOrMismatch(format!("root index {index} out of range")))
  }

  pub fn get_root(&self, index: usize) -> Result<NodeId> {
    self
      .roots
      .get(index)
      .map(|&raw| NodeId::new(raw))
      .ok_or_else(|| Error::NotFoundOrMismatch(format!("root index {index} out of range")))
  }

  pub fn name_for_root(&self, index: usize) -> Option<&str> {
    self.root_names.get(index).map(String::as_str)
  }

  pub fn name_for_entry(&self, index: usize) -> Option<&str> {
    self.entry_names.get(index).map(String::as_str)
  }

  /// Drops every node beyond `nstart` and invalidates the index. Entries, names, and roots
  /// survive — callers normally re-`set_root` afterwards.
  pub fn rewind(&mut self) {
    let dropped = self.store.ncount().saturating_sub(self.dims().nstart) as u64;
    self.store.rewind();
    self.index.invalidate();
    self.ctx.metrics().record_rewind(dropped);
  }

  /// Appends an id to the history log, used by tools that want an audit trail of insertion
  /// order distinct from the id sequence itself (ids alone already reflect insertion order, but
  /// history may additionally record external, pre-rewrite ids for diagnostics).
  pub fn push_history(&mut self, id: u32) {
    self.history.push(id);
  }

  pub fn recursion_depth_guard(depth: u32) -> Result<()> {
    const LIMIT: u32 = 240;
    if depth > LIMIT {
      return Err(CapacityError::RecursionDepth { limit: LIMIT }.into());
    }
    Ok(())
  }

  /// Writes this graph to `path` in the `BaseTreeFile` binary format (§4.9).
  pub fn save(&self, path: &std::path::Path) -> Result<()> {
    persist::save_file(self, path)
  }

  /// Reads a graph previously written by [`Graph::save`]. Nodes are replayed through
  /// `add_basic_node` in their original (monotonically increasing) id order, which reproduces
  /// the exact same ids since the source file is already canonical and duplicate-free.
  pub fn open(path: &std::path::Path, shared: bool, max_nodes: u32, ctx: Context) -> Result<Self> {
    let loaded = persist::load_file(path, shared)?;
    let header = loaded.header;
    let dims = Dimensions {
      kstart: header.kstart,
      ostart: header.ostart,
      estart: header.estart,
      nstart: header.nstart,
      max_nodes: max_nodes.max(header.ncount + crate::store::SAFETY_MARGIN + 1),
    };
    let flags = Flags::from_bits_truncate(header.flags);
    let mut graph = Graph::new(dims, loaded.roots.len() as u32, flags, ctx)?;
    graph.entry_names = loaded.entry_names;
    graph.root_names = loaded.root_names;
    for &(q, t, f) in loaded.nodes.iter().skip(header.nstart as usize) {
      graph.add_basic_node(q, t, f)?;
    }
    graph.roots = loaded.roots;
    graph.history = loaded.history;
    Ok(graph)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::flags::default_flags;

  fn dims() -> Dimensions {
    Dimensions { kstart: 1, ostart: 1, estart: 4, nstart: 4, max_nodes: 64 }
  }

  #[test]
  fn fresh_graph_has_self_referencing_entries() {
    let g = Graph::new(dims(), 1, default_flags(), Context::default()).unwrap();
    assert_eq!(g.ncount(), 4);
    assert!(g.is_entry(1));
  }

  #[test]
  fn add_basic_node_is_idempotent() {
    let mut g = Graph::new(dims(), 1, default_flags(), Context::default()).unwrap();
    let a = g.add_basic_node(1, 2, 3).unwrap();
    let b = g.add_basic_node(1, 2, 3).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn rewind_drops_internal_nodes_and_keeps_entries() {
    let mut g = Graph::new(dims(), 1, default_flags(), Context::default()).unwrap();
    g.add_basic_node(1, 2, 3).unwrap();
    assert_eq!(g.ncount(), 5);
    g.rewind();
    assert_eq!(g.ncount(), 4);
  }

  #[test]
  fn set_and_get_root_roundtrip() {
    let mut g = Graph::new(dims(), 1, default_flags(), Context::default()).unwrap();
    g.set_root(0, NodeId::new(2 | IBIT)).unwrap();
    assert_eq!(g.get_root(0).unwrap(), NodeId::new(2 | IBIT));
  }

  #[test]
  fn save_then_open_reproduces_roots_and_shape() {
    let mut g = Graph::new(dims(), 1, default_flags(), Context::default()).unwrap();
    let or_ref = g.add_normalise_node(1, IBIT, 2).unwrap();
    g.set_root(0, or_ref).unwrap();

    let path = std::env::temp_dir().join(format!("qdag-graph-test-{}.btf", std::process::id()));
    g.save(&path).unwrap();
    let reopened = Graph::open(&path, false, 64, Context::default()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(reopened.ncount(), g.ncount());
    assert_eq!(reopened.get_root(0).unwrap(), g.get_root(0).unwrap());
    let reopened_node = reopened.node(reopened.get_root(0).unwrap().index());
    let original_node = g.node(g.get_root(0).unwrap().index());
    assert_eq!((reopened_node.q, reopened_node.t, reopened_node.f), (original_node.q, original_node.t, original_node.f));
  }
}
