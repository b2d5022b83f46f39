/*!

`bextract <out> <in> <name>` — remove a single entry from a balanced system, producing a tree
whose sole root equals that entry's definition.

*/

use std::path::PathBuf;

use clap::Parser;
use qdag_core::error::Error;

#[derive(Parser)]
#[command(about = "Extract a single named entry out of a balanced system as its own tree")]
struct Args {
  out:  PathBuf,
  r#in: PathBuf,
  name: String,
}

fn main() {
  qdag_cli::init_tracing("warn");
  let args = Args::parse();

  let source = qdag_cli::open_graph(&args.r#in, false).unwrap_or_else(|e| qdag_cli::fatal(e, Some(&args.r#in)));

  let reference = qdag_cli::resolve_name(&source, &args.name).unwrap_or_else(|| {
    qdag_cli::fatal(Error::NotFoundOrMismatch(format!("no root or entry named {:?}", args.name)), Some(&args.r#in))
  });

  let mut dest =
    qdag_cli::fresh_graph_like(&source, 1, source.flags).unwrap_or_else(|e| qdag_cli::fatal(e, None));
  let imported = qdag_core::compose::import_nodes(&mut dest, &source, reference)
    .unwrap_or_else(|e| qdag_cli::fatal(e, Some(&args.r#in)));
  dest
    .set_root(0, qdag_core::NodeId::new(imported))
    .unwrap_or_else(|e| qdag_cli::fatal(e, None));
  dest.root_names[0] = args.name.clone();

  dest.save(&args.out).unwrap_or_else(|e| qdag_cli::fatal(e, Some(&args.out)));
}
