/*!

`bjoin <out> <in>...` — concatenate several graphs into one, matching entries across inputs by
name (so two inputs that share an entry name share a single dest entry) and concatenating their
roots in input order.

*/

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use qdag_core::error::Error;
use qdag_core::flags::default_flags;
use qdag_core::node::IBIT;
use qdag_core::Graph;

#[derive(Parser)]
#[command(about = "Concatenate several graphs, matching entry and root names across inputs")]
struct Args {
  out: PathBuf,
  #[arg(required = true)]
  r#in: Vec<PathBuf>,
}

/// Re-issues every node reachable from `reference` (in `source`) into `dest`, remapping entries
/// through `entry_map` instead of assuming identical numbering the way `compose::Importer` does
/// — two inputs being joined rarely share an entry layout even when they share entry names.
struct JoinImporter<'a> {
  source:    &'a Graph,
  entry_map: &'a HashMap<u32, u32>,
  seen:      HashMap<u32, u32>,
}

impl<'a> JoinImporter<'a> {
  fn import(&mut self, dest: &mut Graph, reference: u32) -> qdag_core::Result<u32> {
    let index = reference & !IBIT;
    let sign = reference & IBIT;
    if index == 0 {
      return Ok(sign);
    }
    if self.source.is_entry(index) {
      let mapped = *self.entry_map.get(&index).expect("every source entry has a dest mapping");
      return Ok(mapped | sign);
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

fn main() {
  qdag_cli::init_tracing("warn");
  let args = Args::parse();

  let sources: Vec<Graph> = args
    .r#in
    .iter()
    .map(|path| qdag_cli::open_graph(path, false).unwrap_or_else(|e| qdag_cli::fatal(e, Some(path))))
    .collect();

  // Build the union entry table: each distinct entry name across all inputs gets one dest id,
  // in first-seen order. Id 0 (the constant) is shared implicitly and never remapped.
  let mut name_to_dest: HashMap<String, u32> = HashMap::new();
  let mut dest_entry_names: Vec<String> = vec![String::new()];
  for source in &sources {
    for i in 1..source.entry_names.len() {
      let name = &source.entry_names[i];
      if !name_to_dest.contains_key(name) {
        let dest_id = dest_entry_names.len() as u32;
        name_to_dest.insert(name.clone(), dest_id);
        dest_entry_names.push(name.clone());
      }
    }
  }

  let total_roots: usize = sources.iter().map(|g| g.roots.len()).sum();
  let mut seen_root_names: HashMap<String, usize> = HashMap::new();
  for source in &sources {
    for name in &source.root_names {
      let count = seen_root_names.entry(name.clone()).or_insert(0);
      *count += 1;
    }
  }
  if let Some((name, _)) = seen_root_names.iter().find(|(_, &count)| count > 1) {
    qdag_cli::fatal(
      Error::NotFoundOrMismatch(format!("root name {name:?} is bound in more than one input")),
      None,
    );
  }

  let dims = qdag_core::Dimensions {
    kstart: 1,
    ostart: 1,
    estart: dest_entry_names.len() as u32,
    nstart: dest_entry_names.len() as u32,
    max_nodes: qdag_cli::DEFAULT_MAX_NODES,
  };
  let mut dest = Graph::new(dims, total_roots.max(1) as u32, default_flags(), qdag_core::Context::default())
    .unwrap_or_else(|e| qdag_cli::fatal(e, None));
  dest.entry_names = dest_entry_names;

  let mut root_index = 0usize;
  for (source, path) in sources.iter().zip(&args.r#in) {
    let entry_map: HashMap<u32, u32> = (1..source.entry_names.len() as u32)
      .map(|i| (i, name_to_dest[&source.entry_names[i as usize]]))
      .collect();
    let mut importer = JoinImporter { source, entry_map: &entry_map, seen: HashMap::new() };
    for (i, &root) in source.roots.iter().enumerate() {
      let imported = importer.import(&mut dest, root).unwrap_or_else(|e| qdag_cli::fatal(e, Some(path)));
      dest.set_root(root_index, qdag_core::NodeId::new(imported)).unwrap_or_else(|e| qdag_cli::fatal(e, None));
      dest.root_names[root_index] = source.root_names[i].clone();
      root_index += 1;
    }
  }

  dest.save(&args.out).unwrap_or_else(|e| qdag_cli::fatal(e, Some(&args.out)));
}
