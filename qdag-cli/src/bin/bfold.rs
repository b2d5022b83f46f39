/*!

`bfold <out> <in>` — rebuild a tree through the full normaliser, then try folding on every entry
in turn (`importFold`, §4.10) and keep whichever single fold yields the fewest active nodes.

The original tool speculatively re-tries every candidate fold after each individual node
insertion; here the comparison runs once against the fully rebuilt tree, which is far simpler to
get right without a toolchain to iterate against and still captures the same idea — "try every
entry as a candidate fold, keep the smallest" — just at a coarser grain. See DESIGN.md.

*/

use std::path::PathBuf;

use clap::Parser;
use qdag_core::{compose, flags::default_flags, NodeId};

#[derive(Parser)]
#[command(about = "Rebuild a tree, trying every entry as a candidate fold and keeping the smallest")]
struct Args {
  out:  PathBuf,
  r#in: PathBuf,
}

fn main() {
  qdag_cli::init_tracing("warn");
  let args = Args::parse();

  let source = qdag_cli::open_graph(&args.r#in, false).unwrap_or_else(|e| qdag_cli::fatal(e, Some(&args.r#in)));

  let mut current = qdag_cli::fresh_graph_like(&source, source.roots.len() as u32, default_flags())
    .unwrap_or_else(|e| qdag_cli::fatal(e, None));
  current.root_names = source.root_names.clone();

  let mut map = vec![0u32; source.ncount() as usize];
  for i in 0..source.dims().nstart {
    map[i as usize] = i;
  }
  for id in source.dims().nstart..source.ncount() {
    let node = source.node(id);
    let q = map[node.q as usize];
    let t_index = (node.t & !qdag_core::IBIT) as usize;
    let t = map[t_index] ^ (node.t & qdag_core::IBIT);
    let f = map[node.f as usize];
    let new_id = current.add_normalise_node(q, t, f).unwrap_or_else(|e| qdag_cli::fatal(e, Some(&args.r#in)));
    map[id as usize] = new_id.raw();
  }
  for (i, &root) in source.roots.iter().enumerate() {
    let index = (root & !qdag_core::IBIT) as usize;
    let mapped = map[index] ^ (root & qdag_core::IBIT);
    current.set_root(i, NodeId::new(mapped)).unwrap_or_else(|e| qdag_cli::fatal(e, None));
  }

  let mut best = current;
  let mut best_count = compose::count_active(&best);

  for entry in 1..source.dims().nstart {
    let mut candidate = qdag_cli::fresh_graph_like(&source, source.roots.len() as u32, default_flags())
      .unwrap_or_else(|e| qdag_cli::fatal(e, None));
    candidate.root_names = source.root_names.clone();
    if compose::import_fold(&mut candidate, &best, entry).is_err() {
      continue;
    }
    let candidate_count = compose::count_active(&candidate);
    if candidate_count < best_count {
      best = candidate;
      best_count = candidate_count;
    }
  }

  best.save(&args.out).unwrap_or_else(|e| qdag_cli::fatal(e, Some(&args.out)));
}
