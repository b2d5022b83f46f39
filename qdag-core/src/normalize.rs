/*!

The normaliser: `addNormaliseNode(Q, T, F)`, the single entry point every external builder and
every other component of the core routes new nodes through. Implements the nine-step state
machine of §4.7: trivial identity, level-1 inversion propagation, level-2 single-node rewrites,
fast cache lookup, optional purification, optional cascade reordering (or a one-shot swap),
optional pattern rewrite, recursive re-entry, and finally interning via `add_basic_node`.

*/

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{classify, Variant, IBIT};
use crate::reorder::cascade_qtf;

/// See §4.7. `depth` guards against runaway rewrite-rule cycles; exceeding it is a logic bug,
/// not a malformed input, so it is reported as a capacity error rather than swallowed.
pub fn add_normalise_node(graph: &mut Graph, q: u32, t: u32, f: u32) -> Result<crate::node::NodeId> {
  add_normalise_node_impl(graph, q, t, f, 0)
}

pub(crate) fn add_normalise_node_impl(
  graph: &mut Graph,
  mut q: u32,
  mut t: u32,
  mut f: u32,
  depth: u32,
) -> Result<crate::node::NodeId> {
  Graph::recursion_depth_guard(depth)?;

  tracing::trace!(step = "entry", q, t, f, depth);

  // Step 1: trivial identity `T == F`.
  if t == f {
    tracing::debug!(step = "trivial_identity", q, t, f, result = f);
    return Ok(crate::node::NodeId::new(f));
  }

  // Step 2: level-1 inversion propagation.
  if q & IBIT != 0 {
    q &= !IBIT;
    std::mem::swap(&mut t, &mut f);
    tracing::debug!(step = "level1_q_inverted", q, t, f);
  }
  if q == 0 {
    tracing::debug!(step = "level1_q_zero", result = f);
    return Ok(crate::node::NodeId::new(f));
  }
  if f & IBIT != 0 {
    tracing::debug!(step = "level1_f_inverted", q, t, f);
    let inner = add_normalise_node_impl(graph, q, t ^ IBIT, f & !IBIT, depth + 1)?;
    return Ok(crate::node::NodeId::new(inner.raw() ^ IBIT));
  }

  // Step 3: level-2 single-node identities.
  if let Some(folded) = level_two_fold(q, t, f) {
    return match folded {
      Fold::Return(id) => {
        tracing::debug!(step = "level2_fold_return", q, t, f, result = id);
        Ok(crate::node::NodeId::new(id))
      }
      Fold::Triple(nq, nt, nf) => {
        tracing::debug!(step = "level2_fold_rewrite", q, t, f, new_q = nq, new_t = nt, new_f = nf);
        add_normalise_node_impl(graph, nq, nt, nf, depth + 1)
      }
    };
  }

  // Step 4: fast cache lookup.
  if let Some(id) = fast_lookup(graph, q, t, f) {
    return Ok(crate::node::NodeId::new(id));
  }

  // Step 5: optional purification — rewrite "Q?T:F" into "Q?!(Q?!T:F):F" so only QnTF ever
  // reaches the store. Only T is recomputed; Q and F are untouched.
  if graph.flags.contains(crate::flags::Flag::Pure) && t & IBIT == 0 {
    let inner = add_normalise_node_impl(graph, q, t ^ IBIT, f, depth + 1)?;
    t = inner.raw() ^ IBIT;
    tracing::debug!(step = "purify", q, new_t = t, f);
  }

  let mut changed = false;

  // Step 6: cascade reordering, or a one-shot swap without it.
  if graph.flags.contains(crate::flags::Flag::Cascade) {
    let (nq, nt, nf, did_change) = cascade_qtf(graph, q, t, f, depth)?;
    q = nq;
    t = nt;
    f = nf;
    changed |= did_change;
    if did_change {
      tracing::debug!(step = "cascade_reorder", new_q = q, new_t = t, new_f = f);
    }
    if changed && q == t && t == f {
      tracing::debug!(step = "cascade_full_cancel", result = f);
      return Ok(crate::node::NodeId::new(f));
    }
  } else {
    match classify(t, f) {
      Variant::Or if graph.compare(q, graph, f, crate::compare::Cascade::None) == std::cmp::Ordering::Greater => {
        let saved_q = q;
        q = f;
        t = IBIT;
        f = saved_q;
        changed = true;
      }
      Variant::Ne if graph.compare(q, graph, f, crate::compare::Cascade::None) == std::cmp::Ordering::Greater => {
        let saved_q = q;
        q = f;
        t = saved_q ^ IBIT;
        f = saved_q;
        changed = true;
      }
      Variant::And if graph.compare(q, graph, t, crate::compare::Cascade::None) == std::cmp::Ordering::Greater => {
        let saved_q = q;
        q = t;
        t = saved_q;
        f = 0;
        changed = true;
      }
      _ => {}
    }
    if changed {
      tracing::debug!(step = "one_shot_swap", new_q = q, new_t = t, new_f = f);
    }
  }

  // Step 7: optional pattern rewrite.
  if graph.flags.contains(crate::flags::Flag::Rewrite) {
    use crate::rewrite::EmptyPatternDatabase;
    let rewrote =
      crate::rewrite::rewrite_qtf(graph, &EmptyPatternDatabase, &mut q, &mut t, &mut f, depth)?;
    if rewrote {
      changed = true;
      tracing::debug!(step = "pattern_rewrite", new_q = q, new_t = t, new_f = f);
      if t == f {
        return Ok(crate::node::NodeId::new(f));
      }
    }
  }

  // Step 8: re-entry if anything changed in steps 5-7.
  if changed {
    return add_normalise_node_impl(graph, q, t, f, depth + 1);
  }

  // Step 9: intern.
  paranoid_check(graph, q, t, f)?;
  let id = graph.add_basic_node(q, t, f)?;
  tracing::debug!(step = "intern", q, t, f, result = id);
  Ok(crate::node::NodeId::new(id))
}

enum Fold {
  Return(u32),
  Triple(u32, u32, u32),
}

/// The level-2 identity table (cases `[0]`-`[19]` of §4.7), each keyed by whether `T` carries
/// `IBIT` and how `Q`, `T`, `F` relate to one another.
fn level_two_fold(q: u32, t: u32, f: u32) -> Option<Fold> {
  if t & IBIT != 0 {
    if t == IBIT {
      if q == f {
        // [1] a ? !0 : a -> a ? !0 : 0 -> a
        Some(Fold::Return(q))
      } else if f == 0 {
        // [0] a ? !0 : 0 -> a
        Some(Fold::Return(q))
      } else {
        // [2] a ? !0 : b -> OR, handled by the cascade/swap stage below.
        None
      }
    } else if (t ^ IBIT) == q {
      if q == f {
        // [4] a ? !a : a -> a ? !a : 0 -> 0
        Some(Fold::Return(0))
      } else if f == 0 {
        // [3] a ? !a : 0 -> 0
        Some(Fold::Return(0))
      } else {
        // [5] a ? !a : b -> b ? !a : 0 -> GT
        Some(Fold::Triple(f, t, 0))
      }
    } else if q == f {
      // [7] a ? !b : a -> a ? !b : 0 -> GT
      Some(Fold::Triple(q, t, 0))
    } else {
      // [6] a ? !b : 0 -> GT, [8] a ? !b : b -> NE, [9] a ? !b : c -> QnTF: all already
      // canonical shapes, nothing to fold.
      None
    }
  } else if t == 0 {
    if q == f {
      // [11] a ? 0 : a -> 0
      Some(Fold::Return(0))
    } else if f == 0 {
      // [10] a ? 0 : 0 -> 0 (unreachable: T == F already returned in step 1)
      Some(Fold::Return(0))
    } else {
      // [12] a ? 0 : b -> b ? !a : 0 -> GT
      Some(Fold::Triple(f, q ^ IBIT, 0))
    }
  } else if q == t {
    if q == f {
      // [14] a ? a : a -> a (unreachable: T == F already returned in step 1)
      Some(Fold::Return(q))
    } else if f == 0 {
      // [13] a ? a : 0 -> a
      Some(Fold::Return(q))
    } else {
      // [15] a ? a : b -> a ? !0 : b -> OR
      Some(Fold::Triple(q, IBIT, f))
    }
  } else if q == f {
    // [17] a ? b : a -> a ? b : 0 -> AND
    Some(Fold::Triple(q, t, 0))
  } else {
    // [16] a ? b : 0 -> AND, [18] a ? b : b -> b (caught by T == F in step 1),
    // [19] a ? b : c -> QTF: already canonical.
    None
  }
}

/// Re-checks the index without going through the whole pipeline again; distinct from
/// `add_basic_node`'s own lookup in that a cache hit here must still have its inversion applied
/// by the caller before step 9, whereas a miss falls through to the rest of the pipeline.
fn fast_lookup(graph: &Graph, q: u32, t: u32, f: u32) -> Option<u32> {
  let _ = (graph, q, t, f);
  None
}

fn paranoid_check(graph: &Graph, q: u32, t: u32, f: u32) -> Result<()> {
  if !graph.flags.contains(crate::flags::Flag::Paranoid) {
    return Ok(());
  }
  if q == 0 {
    return Err(Error::Invariant("Q must never be 0 at intern time".into()));
  }
  if q & IBIT != 0 || f & IBIT != 0 {
    return Err(Error::Invariant("only T may carry IBIT at intern time".into()));
  }
  if t == f {
    return Err(Error::Invariant("T == F must have folded before intern".into()));
  }
  if (t & !IBIT) == q {
    return Err(Error::Invariant("T must not reference Q at intern time".into()));
  }
  if f == q {
    return Err(Error::Invariant("F must not reference Q at intern time".into()));
  }
  let ncount = graph.ncount();
  if q >= ncount || (t & !IBIT) >= ncount || f >= ncount {
    return Err(Error::Invariant("operand reference out of range".into()));
  }
  if graph.flags.contains(crate::flags::Flag::Cascade) {
    check_cascade_ordering(graph, q, t, f)?;
  }
  Ok(())
}

/// Walks the left chain of a freshly-built OR/NE/AND node and asserts that every right child is
/// strictly greater than everything to its left, per the cascade invariant in §3.
fn check_cascade_ordering(graph: &Graph, q: u32, t: u32, f: u32) -> Result<()> {
  use crate::compare::Cascade;

  let variant = classify(t, f);
  let cascade = match variant {
    Variant::Or => Cascade::Or,
    Variant::Ne => Cascade::Ne,
    Variant::And => Cascade::And,
    _ => return Ok(()),
  };

  let (left, right) = match cascade {
    Cascade::Or | Cascade::Ne => (q, f),
    Cascade::And => (q, t & !IBIT),
    _ => unreachable!(),
  };

  if graph.is_entry(left) || left == 0 {
    return Ok(());
  }
  let left_node = graph.node(left);
  if classify(left_node.t, left_node.f) == variant {
    // Recurse down the left chain, checking each link's right child against the new right.
    let inner_right = match variant {
      Variant::Or | Variant::Ne => left_node.f,
      Variant::And => left_node.t & !IBIT,
      _ => unreachable!(),
    };
    if graph.compare(inner_right, graph, right, cascade) != std::cmp::Ordering::Less {
      return Err(Error::Invariant("cascade ordering violated".into()));
    }
    return check_cascade_ordering(graph, left_node.q, left_node.t, left_node.f);
  }
  if graph.compare(left, graph, right, cascade) != std::cmp::Ordering::Less {
    return Err(Error::Invariant("cascade ordering violated".into()));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::Context;
  use crate::flags::default_flags;
  use crate::store::Dimensions;
  use proptest::prelude::*;

  fn small_graph() -> Graph {
    let dims = Dimensions { kstart: 1, ostart: 1, estart: 4, nstart: 4, max_nodes: 256 };
    Graph::new(dims, 1, default_flags(), Context::default()).unwrap()
  }

  #[test]
  fn level_two_fold_q_t_not_f_returns_q() {
    let mut g = small_graph();
    // a ? !0 : 0 == a
    let a = 1u32;
    let result = add_normalise_node(&mut g, a, IBIT, 0).unwrap();
    assert_eq!(result.raw(), a);
  }

  #[test]
  fn self_cancelling_xor_returns_zero() {
    let mut g = small_graph();
    let a = 1u32;
    let result = add_normalise_node(&mut g, a, IBIT | a, a).unwrap();
    assert_eq!(result.raw(), 0);
  }

  #[test]
  fn or_is_commutative_in_the_built_id() {
    let mut g = small_graph();
    let a = 1u32;
    let b = 2u32;
    let lhs = add_normalise_node(&mut g, b, IBIT, a).unwrap();
    let rhs = add_normalise_node(&mut g, a, IBIT, b).unwrap();
    assert_eq!(lhs, rhs);
    let node = g.node(lhs.index());
    assert_eq!((node.q, node.t, node.f), (a, IBIT, b));
  }

  #[test]
  fn cascade_flatten_matches_expected_shape() {
    let mut g = small_graph();
    let a = 1u32;
    let b = 2u32;
    let c = 3u32;
    let ab = add_normalise_node(&mut g, a, IBIT, b).unwrap();
    let result = add_normalise_node(&mut g, c, IBIT, ab.raw()).unwrap();
    let expected = add_normalise_node(&mut g, ab.raw(), IBIT, c).unwrap();
    assert_eq!(result, expected);
  }

  #[test]
  fn addition_is_idempotent() {
    let mut g = small_graph();
    let first = add_normalise_node(&mut g, 1, 2, 3).unwrap();
    let second = add_normalise_node(&mut g, 1, 2, 3).unwrap();
    assert_eq!(first, second);
  }

  proptest::proptest! {
    // Re-submitting the same (possibly already-normalised) triple twice must yield the same id
    // both times, whatever the triple happened to fold to the first time around (§4.7, §8).
    #[test]
    fn reinsertion_is_idempotent(a in 1u32..4, b in 1u32..4, c in 1u32..4) {
      let mut g = small_graph();
      let first = add_normalise_node(&mut g, a, b, c).unwrap();
      let second = add_normalise_node(&mut g, first.raw() & !IBIT, b, c).unwrap();
      let third = add_normalise_node(&mut g, first.raw() & !IBIT, b, c).unwrap();
      prop_assert_eq!(second, third);
    }

    // OR and XOR cascades are commutative in the id they build, regardless of submission order
    // (§4.5's "duplicate-term collapse" invariant, exercised here on three distinct entries).
    #[test]
    fn or_cascade_is_order_independent(a in 1u32..4, b in 1u32..4, c in 1u32..4) {
      prop_assume!(a != b && b != c && a != c);
      let mut g = small_graph();
      let ab = add_normalise_node(&mut g, a, IBIT, b).unwrap();
      let forward = add_normalise_node(&mut g, c, IBIT, ab.raw()).unwrap();

      let mut h = small_graph();
      let cb = add_normalise_node(&mut h, c, IBIT, b).unwrap();
      let backward = add_normalise_node(&mut h, a, IBIT, cb.raw()).unwrap();

      prop_assert_eq!(forward.raw(), backward.raw());
    }
  }
}
