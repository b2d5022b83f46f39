/*!

The structural comparator: a total order over references, within one graph or across two, that
stays stable under cascade rotation (`compare(a, OR(b, c)) == compare(a, OR(c, b))`).

The reference engine walks both DAGs in lock-step with two explicit stacks and a pair of
versioned "been-here" maps. We keep that shape — explicit stacks rather than recursion, since
stack depth must scale with graph size rather than call-stack size — but exploit a property the
reference engine's iterative memoisation only approximates: because every node is hash-consed,
two subtrees compare equal if and only if they share the same id (equal ids ⇒ identical triples
all the way down, by structural induction on interning order). That makes the per-pair memo an
exact cache rather than a heuristic one, so we key it on `(id_l, id_r)` directly rather than on
stack position.

*/

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::graph::Graph;
use crate::node::{classify, Variant, IBIT};

/// Tags the cascade chain a stack frame was pushed under. `Sync` is a barrier a chain's own
/// descent pushes in front of itself so that unwinding one side's cascade can't be mistaken for
/// the two sides disagreeing about chain membership.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Cascade {
  None,
  Or,
  Ne,
  And,
  Sync,
}

impl Cascade {
  fn matches_variant(self, variant: Variant) -> bool {
    match (self, variant) {
      (Cascade::Or, Variant::Or) => true,
      (Cascade::Ne, Variant::Ne) => true,
      (Cascade::And, Variant::And) => true,
      _ => false,
    }
  }

  fn of_variant(variant: Variant) -> Cascade {
    match variant {
      Variant::Or => Cascade::Or,
      Variant::Ne => Cascade::Ne,
      Variant::And => Cascade::And,
      _ => Cascade::None,
    }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
struct Frame {
  cascade: Cascade,
  id:      u32,
}

/// `compare(lhs, rhs_graph, rhs, top_cascade)` per §4.4. `lhs` is always interpreted in `this`
/// graph; `rhs` in `rhs_graph`, which may be the same graph.
pub fn compare(this: &Graph, lhs: u32, rhs_graph: &Graph, rhs: u32, top_cascade: Cascade) -> Ordering {
  let mut stack_l = vec![Frame { cascade: top_cascade, id: lhs }];
  let mut stack_r = vec![Frame { cascade: top_cascade, id: rhs }];
  let mut been_here: HashMap<(u32, u32), Ordering> = HashMap::new();

  loop {
    unwind_cascade(this, &mut stack_l);
    unwind_cascade(rhs_graph, &mut stack_r);

    let (Some(frame_l), Some(frame_r)) = (stack_l.last().copied(), stack_r.last().copied()) else {
      return match (stack_l.is_empty(), stack_r.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => unreachable!(),
      };
    };

    if frame_l.cascade != frame_r.cascade {
      let l_exhausted = frame_l.cascade == Cascade::Sync;
      let r_exhausted = frame_r.cascade == Cascade::Sync;
      return match (l_exhausted, r_exhausted) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
      };
    }

    stack_l.pop();
    stack_r.pop();

    if frame_l.cascade == Cascade::Sync {
      // Both sides agreed on Sync (checked above), so this is a checkpoint marker rather than
      // a real node to compare; both sides move past it in lock-step.
      continue;
    }

    if std::ptr::eq(this, rhs_graph) && frame_l.id == frame_r.id {
      continue;
    }

    if let Some(&cached) = been_here.get(&(frame_l.id, frame_r.id)) {
      if cached != Ordering::Equal {
        return cached;
      }
      continue;
    }

    let l_entry = this.is_entry(frame_l.id);
    let r_entry = rhs_graph.is_entry(frame_r.id);

    let ordering = match (l_entry, r_entry) {
      (true, false) => Ordering::Less,
      (false, true) => Ordering::Greater,
      (true, true) => frame_l.id.cmp(&frame_r.id),
      (false, false) => {
        let node_l = this.node(frame_l.id);
        let node_r = rhs_graph.node(frame_r.id);
        let variant_l = classify(node_l.t, node_l.f);
        let variant_r = classify(node_r.t, node_r.f);
        match variant_l.rank().cmp(&variant_r.rank()) {
          Ordering::Equal => {
            let starts_cascade_l = Cascade::of_variant(variant_l) != Cascade::None
              && Cascade::of_variant(variant_l) != frame_l.cascade;
            let starts_cascade_r = Cascade::of_variant(variant_r) != Cascade::None
              && Cascade::of_variant(variant_r) != frame_r.cascade;
            if starts_cascade_l || starts_cascade_r {
              stack_l.push(Frame { cascade: Cascade::Sync, id: u32::MAX });
              stack_r.push(Frame { cascade: Cascade::Sync, id: u32::MAX });
            }
            let child_cascade = Cascade::of_variant(variant_l);
            push_operand(&mut stack_l, node_l.q, node_l.t, node_l.f, child_cascade);
            push_operand(&mut stack_r, node_r.q, node_r.t, node_r.f, child_cascade);
            been_here.insert((frame_l.id, frame_r.id), Ordering::Equal);
            continue;
          }
          other => other,
        }
      }
    };

    been_here.insert((frame_l.id, frame_r.id), ordering);
    if ordering != Ordering::Equal {
      return ordering;
    }
  }
}

/// While the frame on top of `stack` is an internal node whose inferred variant matches the
/// frame's own cascade tag, replace it with its two operands (right pushed first, so the left
/// is processed first), flattening the chain in place.
fn unwind_cascade(graph: &Graph, stack: &mut Vec<Frame>) {
  while let Some(frame) = stack.last().copied() {
    if frame.cascade == Cascade::Sync || frame.id == u32::MAX || graph.is_entry(frame.id) {
      return;
    }
    let node = graph.node(frame.id);
    let variant = classify(node.t, node.f);
    if !frame.cascade.matches_variant(variant) {
      return;
    }
    stack.pop();
    // Right operand is whichever side is not the nested cascade; per the left-leaning
    // convention the left child is Q's chain continuation and F/T-other is the new term.
    let (left, right) = cascade_children(variant, node.q, node.t, node.f);
    stack.push(Frame { cascade: frame.cascade, id: right });
    stack.push(Frame { cascade: frame.cascade, id: left });
  }
}

/// Splits an OR/NE/AND node into its left-leaning `(continuation, new_term)` children.
fn cascade_children(variant: Variant, q: u32, t: u32, f: u32) -> (u32, u32) {
  match variant {
    Variant::Or => (q, f),
    Variant::Ne => (q, f),
    Variant::And => (q, t),
    _ => unreachable!("cascade_children called on non-cascade variant"),
  }
}

/// Descends into F, then T, then Q (per §4.4 step 6), skipping degenerate operands, tagging each
/// with `cascade`. Since a single generic node only has three operand slots and the comparator
/// processes one frame per loop iteration, we push all live operands at once in reverse order so
/// that F is popped (and thus compared) first.
fn push_operand(stack: &mut Vec<Frame>, q: u32, t: u32, f: u32, cascade: Cascade) {
  // Order of interest: F, T, Q. Push Q first so it is deepest, then T, then F on top.
  if q != 0 {
    stack.push(Frame { cascade, id: q });
  }
  let t_index = t & !IBIT;
  if t_index != 0 {
    stack.push(Frame { cascade, id: t_index });
  }
  if f != 0 {
    stack.push(Frame { cascade, id: f });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::Context;
  use crate::flags::default_flags;
  use crate::graph::Graph;
  use crate::store::Dimensions;
  use proptest::prelude::*;

  fn small_graph() -> Graph {
    let dims = Dimensions { kstart: 1, ostart: 1, estart: 4, nstart: 4, max_nodes: 64 };
    Graph::new(dims, 2, default_flags(), Context::default()).unwrap()
  }

  #[test]
  fn entries_compare_by_id() {
    let g = small_graph();
    assert_eq!(compare(&g, 1, &g, 2, Cascade::None), Ordering::Less);
    assert_eq!(compare(&g, 2, &g, 1, Cascade::None), Ordering::Greater);
    assert_eq!(compare(&g, 1, &g, 1, Cascade::None), Ordering::Equal);
  }

  #[test]
  fn identical_ids_are_equal_even_across_graph_handles() {
    let g = small_graph();
    assert_eq!(compare(&g, 1, &g, 1, Cascade::None), Ordering::Equal);
  }

  #[test]
  fn entry_is_always_less_than_internal_node() {
    let mut g = small_graph();
    let or_node = g.add_normalise_node(1, IBIT, 2).unwrap();
    assert_eq!(compare(&g, 1, &g, or_node.index(), Cascade::None), Ordering::Less);
  }

  proptest::proptest! {
    // A total order is antisymmetric: swapping the operands must reverse (or preserve, for
    // equal operands) the verdict (§4.4, §8).
    #[test]
    fn compare_is_antisymmetric(a in 1u32..4, b in 1u32..4) {
      let g = small_graph();
      prop_assert_eq!(compare(&g, a, &g, b, Cascade::None), compare(&g, b, &g, a, Cascade::None).reverse());
    }

    // And transitive over the three available entries.
    #[test]
    fn compare_is_transitive(a in 1u32..4, b in 1u32..4, c in 1u32..4) {
      let g = small_graph();
      let ab = compare(&g, a, &g, b, Cascade::None);
      let bc = compare(&g, b, &g, c, Cascade::None);
      if ab != Ordering::Greater && bc != Ordering::Greater {
        prop_assert_ne!(compare(&g, a, &g, c, Cascade::None), Ordering::Greater);
      }
    }
  }
}
