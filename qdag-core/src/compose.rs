/*!

Composition operations (§4.10): building a new graph out of an existing one, re-issuing each
reachable node through the destination's own normaliser (or `add_basic_node` when the source is
already known-canonical and no transformation is needed).

*/

use std::collections::HashMap;

use crate::error::Result;
use crate::graph::Graph;
use crate::node::IBIT;

/// Translates a source-graph id into a destination-graph id the first time it is seen, caching
/// the mapping so repeated references to the same shared subtree are not re-interned.
struct Importer<'a> {
  source: &'a Graph,
  seen:   HashMap<u32, u32>,
}

impl<'a> Importer<'a> {
  fn new(source: &'a Graph) -> Self {
    Importer { source, seen: HashMap::new() }
  }

  /// Copies the node reachable at `reference` (in `source`) into `dest`, returning the
  /// corresponding reference in `dest`. Entries map id-for-id (both graphs share the same entry
  /// numbering by convention); internal nodes are re-issued through `add_basic_node` since the
  /// source is assumed already canonical.
  fn import(&mut self, dest: &mut Graph, reference: u32) -> Result<u32> {
    let index = reference & !IBIT;
    let sign = reference & IBIT;
    if index == 0 {
      return Ok(sign);
    }
    if self.source.is_entry(index) {
      return Ok(index | sign);
    }
    if let Some(&mapped) = self.seen.get(&index) {
      return Ok(mapped | sign);
    }

    let node = self.source.node(index);
    let q = self.import(dest, node.q)?;
    let t = self.import(dest, node.t)?;
    let f = self.import(dest, node.f)?;
    let id = dest.add_basic_node(q, t, f)?;
    self.seen.insert(index, id);
    Ok(id | sign)
  }
}

/// Copies every node reachable from `source`'s roots (and its `system` root, if any) into
/// `dest`, preserving root order.
pub fn import_active(dest: &mut Graph, source: &Graph) -> Result<()> {
  let mut importer = Importer::new(source);
  let mut new_roots = Vec::with_capacity(source.roots.len());
  for &root in &source.roots {
    new_roots.push(importer.import(dest, root)?);
  }
  if let Some(system) = source.system {
    dest.system = Some(importer.import(dest, system)?);
  }
  dest.roots = new_roots;
  Ok(())
}

/// Copies only the sub-graph reachable from a single reference, returning its translated id in
/// `dest`.
pub fn import_nodes(dest: &mut Graph, source: &Graph, node_id: u32) -> Result<u32> {
  let mut importer = Importer::new(source);
  importer.import(dest, node_id)
}

/// Builds a new graph in which each of `source`'s roots is rewritten as `fold_entry ? set : clr`
/// — a Shannon expansion along `fold_entry` — where `set` substitutes the constant true for
/// `fold_entry` and `clr` substitutes constant false. Both variants go through the full
/// normaliser, so any simplification the substitution enables (the entry disappearing from a
/// subtree entirely) is realised in the result.
pub fn import_fold(dest: &mut Graph, source: &Graph, fold_entry: u32) -> Result<()> {
  let mut set_importer = FoldImporter::new(source, fold_entry, true);
  let mut clr_importer = FoldImporter::new(source, fold_entry, false);

  let mut new_roots = Vec::with_capacity(source.roots.len());
  for &root in &source.roots {
    let set = set_importer.import(dest, root)?;
    let clr = clr_importer.import(dest, root)?;
    let folded = dest.add_normalise_node(fold_entry, set, clr)?;
    new_roots.push(folded.raw());
  }
  dest.roots = new_roots;
  Ok(())
}

struct FoldImporter<'a> {
  source:     &'a Graph,
  fold_entry: u32,
  substitute: bool,
  seen:       HashMap<u32, u32>,
}

impl<'a> FoldImporter<'a> {
  fn new(source: &'a Graph, fold_entry: u32, substitute: bool) -> Self {
    FoldImporter { source, fold_entry, substitute, seen: HashMap::new() }
  }

  fn import(&mut self, dest: &mut Graph, reference: u32) -> Result<u32> {
    let index = reference & !IBIT;
    let sign = reference & IBIT;
    if index == 0 {
      return Ok(sign);
    }
    if index == self.fold_entry {
      let value = if self.substitute { 0 ^ IBIT } else { 0 };
      return Ok(value ^ sign);
    }
    if self.source.is_entry(index) {
      return Ok(index | sign);
    }
    if let Some(&mapped) = self.seen.get(&index) {
      return Ok(mapped | sign);
    }

    let node = self.source.node(index);
    let q = self.import(dest, node.q)?;
    let t = self.import(dest, node.t)?;
    let f = self.import(dest, node.f)?;
    let id = dest.add_normalise_node(q, t, f)?.raw();
    self.seen.insert(index, id);
    Ok(id ^ sign)
  }
}

/// Counts nodes reachable from every root and the `system` root, without materialising them
/// anywhere — used as the fitness metric `bfold` minimises.
pub fn count_active(graph: &Graph) -> u32 {
  let mut seen = vec![false; graph.ncount() as usize];
  let mut stack: Vec<u32> = graph.roots.iter().map(|&r| r & !IBIT).collect();
  if let Some(system) = graph.system {
    stack.push(system & !IBIT);
  }
  let mut count = 0u32;
  while let Some(id) = stack.pop() {
    if id == 0 || graph.is_entry(id) || seen[id as usize] {
      continue;
    }
    seen[id as usize] = true;
    count += 1;
    let node = graph.node(id);
    stack.push(node.q & !IBIT);
    stack.push(node.t & !IBIT);
    stack.push(node.f & !IBIT);
  }
  count
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::Context;
  use crate::flags::default_flags;
  use crate::store::Dimensions;

  fn dims() -> Dimensions {
    Dimensions { kstart: 1, ostart: 1, estart: 4, nstart: 4, max_nodes: 64 }
  }

  #[test]
  fn import_active_preserves_root_count_and_function() {
    let mut source = Graph::new(dims(), 1, default_flags(), Context::default()).unwrap();
    let or_ref = source.add_normalise_node(1, IBIT, 2).unwrap();
    source.set_root(0, or_ref).unwrap();

    let mut dest = Graph::new(dims(), 1, default_flags(), Context::default()).unwrap();
    import_active(&mut dest, &source).unwrap();

    assert_eq!(dest.roots.len(), 1);
    let imported = dest.node(dest.roots[0] & !IBIT);
    assert_eq!((imported.q, imported.t, imported.f), (1, IBIT, 2));
  }

  #[test]
  fn count_active_counts_only_reachable_internal_nodes() {
    let mut source = Graph::new(dims(), 1, default_flags(), Context::default()).unwrap();
    let or_ref = source.add_normalise_node(1, IBIT, 2).unwrap();
    source.set_root(0, or_ref).unwrap();
    assert_eq!(count_active(&source), 1);
  }
}
