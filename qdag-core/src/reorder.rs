/*!

The cascade reorderer (`cascadeQTF`): given a top-level `(Q, T, F)` already known to be an
instance of OR, NE, or AND, flattens any same-operator children into a flat operand list,
removes duplicate-term collapses, sorts the distinct operands under the cascade-aware comparator,
and rebuilds a left-leaning chain.

The reference engine hand-unrolls this into six shape-specific cases (neither child cascades,
left only, right only, both, with sub-cases for 2–4 total leaves) because its comparator and node
layout make flattening awkward to do generically. Once flattening is expressed as "collect every
leaf of the chain into a `Vec`", the six-shape case analysis collapses into: flatten, dedupe,
sort, fold right-to-left through `add_basic_node`. We keep that generic shape rather than port the
case table, per the allowance in the design notes that recursive/iterative restructuring is fine
as long as the observable behaviour — canonical left-leaning ordering, duplicate-collapse — is
preserved.

*/

use qdag_abs::SmallVec;

use crate::compare::{compare, Cascade};
use crate::error::Result;
use crate::graph::Graph;
use crate::node::{classify, Variant, IBIT};

/// Cascades are overwhelmingly 2-4 leaves wide (see the spec's comment on `rebuild`'s shape
/// cases); `SmallVec` keeps that common case off the heap without giving up the unbounded case.
type Leaves = SmallVec<[u32; 4]>;

/// Flattens the chain rooted at `(q, t, f)` — which must already be of variant `cascade` — into
/// its leaf operands, in left-to-right (Q-then-new-term) order. Leaves that are themselves the
/// same operator are expanded recursively; everything else is a leaf.
fn flatten(graph: &Graph, cascade: Cascade, q: u32, t: u32, f: u32) -> Leaves {
  let (left, right) = match cascade {
    Cascade::Or | Cascade::Ne => (q, f),
    Cascade::And => (q, t & !IBIT),
    _ => unreachable!("flatten called with non-cascade tag"),
  };
  let mut leaves = Leaves::new();
  flatten_into(graph, cascade, left, &mut leaves);
  flatten_into(graph, cascade, right, &mut leaves);
  leaves
}

fn flatten_into(graph: &Graph, cascade: Cascade, id: u32, out: &mut Leaves) {
  if id == 0 || graph.is_entry(id) {
    out.push(id);
    return;
  }
  let node = graph.node(id);
  let variant = classify(node.t, node.f);
  let same = matches!(
    (cascade, variant),
    (Cascade::Or, Variant::Or) | (Cascade::Ne, Variant::Ne) | (Cascade::And, Variant::And)
  );
  if same {
    let (left, right) = match cascade {
      Cascade::Or | Cascade::Ne => (node.q, node.f),
      Cascade::And => (node.q, node.t & !IBIT),
      _ => unreachable!(),
    };
    flatten_into(graph, cascade, left, out);
    flatten_into(graph, cascade, right, out);
  } else {
    out.push(id);
  }
}

/// Rebuilds a sorted, duplicate-free leaf list into a left-leaning chain of `cascade`-operator
/// nodes via `add_normalise_node_impl`, folding left to right so each intermediate node's left
/// child is the accumulated prefix. Returns the final `(q, t, f)` triple for the top-level node.
/// `depth` is the caller's recursion depth; every node built here re-enters normalisation one
/// level deeper so the guard in [`crate::normalize`] still bounds a cascade-spanning cycle.
fn rebuild(graph: &mut Graph, cascade: Cascade, leaves: &[u32], depth: u32) -> Result<(u32, u32, u32)> {
  debug_assert!(!leaves.is_empty());
  if leaves.len() == 1 {
    let leaf = leaves[0];
    return Ok(match cascade {
      Cascade::Or => (leaf, IBIT, 0),
      Cascade::Ne => (leaf, IBIT, 0),
      Cascade::And => (leaf, 0, 0),
      _ => unreachable!(),
    });
  }
  let mut acc = leaves[0];
  for &leaf in &leaves[1..leaves.len() - 1] {
    let (q, t, f) = pair_triple(cascade, acc, leaf);
    acc = crate::normalize::add_normalise_node_impl(graph, q, t, f, depth + 1)?.raw() & !IBIT;
  }
  let last = leaves[leaves.len() - 1];
  Ok(pair_triple(cascade, acc, last))
}

fn pair_triple(cascade: Cascade, left: u32, right: u32) -> (u32, u32, u32) {
  match cascade {
    Cascade::Or => (left, IBIT, right),
    Cascade::Ne => (left, IBIT, right),
    Cascade::And => (left, right, 0),
    _ => unreachable!(),
  }
}

/// Top-level entry point used by the normaliser. `(q, t, f)` must already be classified as OR,
/// NE, or AND. Detects the operator, flattens, removes trivial duplicate-term collapses, sorts,
/// and rebuilds. Returns `(q, t, f, changed)`. A collapse is signalled by `q == t == f`. `depth`
/// is the caller's recursion depth, threaded through to `rebuild` so the intermediate nodes built
/// here count against the same recursion-depth guard as any other re-entry.
pub fn cascade_qtf(graph: &mut Graph, q: u32, t: u32, f: u32, depth: u32) -> Result<(u32, u32, u32, bool)> {
  let variant = classify(t, f);
  let cascade = match variant {
    Variant::Or => Cascade::Or,
    Variant::Ne => Cascade::Ne,
    Variant::And => Cascade::And,
    _ => return Ok((q, t, f, false)),
  };

  let mut leaves = flatten(graph, cascade, q, t, f);

  // XOR cascades cancel pairwise: duplicate leaves annihilate (a ^ a == 0). OR/AND cascades
  // dedupe via absorption (a | a == a, a & a == a).
  leaves.sort_by(|&a, &b| compare(graph, a, graph, b, cascade));

  if cascade == Cascade::Ne {
    let mut deduped = Leaves::with_capacity(leaves.len());
    let mut i = 0;
    while i < leaves.len() {
      if i + 1 < leaves.len() && leaves[i] == leaves[i + 1] {
        i += 2;
      } else {
        deduped.push(leaves[i]);
        i += 1;
      }
    }
    leaves = deduped;
  } else {
    leaves.dedup();
  }

  if leaves.is_empty() {
    // Every operand cancelled: XOR of an even number of identical terms is 0.
    return Ok((0, 0, 0, true));
  }

  let (nq, nt, nf) = rebuild(graph, cascade, &leaves, depth)?;
  let changed = (nq, nt, nf) != (q, t, f);
  Ok((nq, nt, nf, changed))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::Context;
  use crate::flags::default_flags;
  use crate::store::Dimensions;

  fn small_graph() -> Graph {
    let dims = Dimensions { kstart: 1, ostart: 1, estart: 4, nstart: 4, max_nodes: 64 };
    Graph::new(dims, 1, default_flags(), Context::default()).unwrap()
  }

  #[test]
  fn or_of_two_entries_in_either_order_reorders_to_same_triple() {
    let mut g = small_graph();
    let (q1, t1, f1, _) = cascade_qtf(&mut g, 2, IBIT, 1, 0).unwrap();
    let (q2, t2, f2, _) = cascade_qtf(&mut g, 1, IBIT, 2, 0).unwrap();
    assert_eq!((q1, t1, f1), (q2, t2, f2));
    assert_eq!((q1, t1, f1), (1, IBIT, 2));
  }

  #[test]
  fn xor_of_identical_entries_collapses_to_zero() {
    let mut g = small_graph();
    let (q, t, f, changed) = cascade_qtf(&mut g, 1, IBIT | 1, 1, 0).unwrap();
    assert!(changed);
    assert_eq!((q, t, f), (0, 0, 0));
  }

  #[test]
  fn and_of_two_entries_orders_by_comparator() {
    let mut g = small_graph();
    let (q, t, f, _) = cascade_qtf(&mut g, 2, 1, 0, 0).unwrap();
    assert_eq!((q, t, f), (1, 2, 0));
  }
}
