/*!

The optional pattern-based rewriter (`rewriteQTF`), gated by [`crate::flags::Flag::Rewrite`].

The reference engine drives this from a precomputed signature/member database that is outside
the core's concern (per scope — "The signature/member database used by the optional rewrite pass
(its schema is outside the core)"). What the core owns is the *interface*: a two-deep fingerprint
of the node's neighbourhood, a lookup against whatever [`PatternDatabase`] the caller supplied,
and the three outcomes a table entry can produce. With no database loaded, the rewriter is a
no-op, which is the default here (`Graph` carries `Option<Box<dyn PatternDatabase>>` indirectly
through a caller-supplied reference at call time — see [`rewrite_qtf`]).

*/

/// Outcome of consulting the pattern database for one `(Q, T, F)` triple.
pub enum RewriteOutcome {
  /// Already canonical; nothing to do.
  NoChange,
  /// The whole expression collapses to `slot`.
  Collapse { slot: u32 },
  /// A permutation of the existing operands.
  Reorder { q: u32, t: u32, f: u32 },
  /// A short sequence of build steps against slots or temporaries. Each step is
  /// `(q, t, f)` with operand references resolved to either a fingerprint slot or a
  /// previously-produced step's output (numbered starting at the slot count).
  TreeReplacement { steps: Vec<(u32, u32, u32)> },
}

/// A two-deep fingerprint: up to nine leaf slots, keyed by a canonical name like `"abc!def!ghi!"`
/// built by walking `Q`, `T`, `F` and (for each that is itself an internal node) its own
/// operands. External references that recur are folded onto the same slot.
pub struct Fingerprint {
  pub name:  String,
  pub slots: Vec<u32>,
}

/// Supplies rewrite outcomes for a fingerprint. Implementations own the actual signature/member
/// table; this crate only defines the shape of the query.
pub trait PatternDatabase {
  fn lookup(&self, fingerprint: &Fingerprint) -> RewriteOutcome;
}

/// A database that has nothing loaded. Every lookup is a no-op, matching §4.6's "When the table
/// is absent ... the rewriter is a no-op."
pub struct EmptyPatternDatabase;

impl PatternDatabase for EmptyPatternDatabase {
  fn lookup(&self, _fingerprint: &Fingerprint) -> RewriteOutcome {
    RewriteOutcome::NoChange
  }
}

/// Tallies how many times each outcome kind has fired, for diagnostics (`bexplain` surfaces
/// these).
#[derive(Default, Clone, Copy, Debug)]
pub struct RewriteCounters {
  pub no_change:        u64,
  pub collapse:          u64,
  pub reorder:            u64,
  pub tree_replacement: u64,
}

use crate::graph::Graph;
use crate::node::IBIT;

/// Walks the two-deep neighbourhood of `(q, t, f)` into a fingerprint. Internal nodes contribute
/// their own `(q, t, f)` inline; entries and already-seen externals collapse onto shared slots.
pub fn fingerprint(graph: &Graph, q: u32, t: u32, f: u32) -> Fingerprint {
  let mut slots: Vec<u32> = Vec::with_capacity(9);
  let mut name = String::new();

  let mut visit_group = |ids: [u32; 3], name: &mut String| {
    for raw in ids {
      if raw == 0 {
        name.push('0');
        continue;
      }
      let index = raw & !IBIT;
      let slot = slots.iter().position(|&s| s == index).unwrap_or_else(|| {
        slots.push(index);
        slots.len() - 1
      });
      name.push((b'a' + slot as u8) as char);
      if raw & IBIT != 0 {
        name.push('~');
      }
    }
    name.push('!');
  };

  let expand = |id: u32| -> [u32; 3] {
    if id == 0 || graph.is_entry(id) {
      [id, 0, 0]
    } else {
      let node = graph.node(id);
      [node.q, node.t, node.f]
    }
  };

  visit_group(expand(q), &mut name);
  visit_group(expand(t & !IBIT), &mut name);
  visit_group(expand(f), &mut name);

  Fingerprint { name, slots }
}

/// Consults `db` for `(q, t, f)`. Returns `true` iff the triple changed (a collapse sets
/// `*t == *f`, matching the normaliser's own collapse convention in step 7). `depth` is the
/// caller's recursion depth; a `TreeReplacement`'s build steps re-enter normalisation one level
/// deeper each, rather than at a fresh depth-0 budget, so a cyclic rewrite table still trips the
/// recursion-depth guard.
pub fn rewrite_qtf(
  graph: &mut Graph,
  db: &dyn PatternDatabase,
  q: &mut u32,
  t: &mut u32,
  f: &mut u32,
  depth: u32,
) -> crate::error::Result<bool> {
  let fp = fingerprint(graph, *q, *t, *f);
  match db.lookup(&fp) {
    RewriteOutcome::NoChange => {
      graph.rewrite_counters.no_change += 1;
      Ok(false)
    }
    RewriteOutcome::Collapse { slot } => {
      graph.rewrite_counters.collapse += 1;
      *q = slot;
      *t = slot;
      *f = slot;
      Ok(true)
    }
    RewriteOutcome::Reorder { q: nq, t: nt, f: nf } => {
      graph.rewrite_counters.reorder += 1;
      *q = nq;
      *t = nt;
      *f = nf;
      Ok(true)
    }
    RewriteOutcome::TreeReplacement { steps } => {
      graph.rewrite_counters.tree_replacement += 1;
      let slot_count = fp.slots.len() as u32;
      let resolve = |results: &[u32], reference: u32| -> u32 {
        if reference < slot_count {
          fp.slots[reference as usize]
        } else {
          results[(reference - slot_count) as usize]
        }
      };
      let mut results: Vec<u32> = Vec::with_capacity(steps.len());
      let mut final_id = 0;
      for &(sq, st, sf) in &steps {
        let rq = resolve(&results, sq);
        let rt_index = resolve(&results, st & !IBIT) | (st & IBIT);
        let rf = resolve(&results, sf);
        final_id =
          crate::normalize::add_normalise_node_impl(graph, rq, rt_index, rf, depth + 1)?.raw();
        results.push(final_id & !IBIT);
      }
      *q = final_id;
      *t = final_id;
      *f = final_id;
      Ok(true)
    }
  }
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
  fn empty_database_never_changes_anything() {
    let mut g = small_graph();
    let mut q = 1u32;
    let mut t = IBIT;
    let mut f = 2u32;
    let changed = rewrite_qtf(&mut g, &EmptyPatternDatabase, &mut q, &mut t, &mut f, 0).unwrap();
    assert!(!changed);
    assert_eq!((q, t, f), (1, IBIT, 2));
  }

  #[test]
  fn fingerprint_shares_slots_for_repeated_entries() {
    let g = small_graph();
    let fp = fingerprint(&g, 1, IBIT, 1);
    assert_eq!(fp.slots.len(), 1);
  }
}
