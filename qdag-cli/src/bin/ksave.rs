/*!

`ksave <out> <in>` — dump a tree as JSON (the default) or as C source code, roots-first.

*/

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use qdag_core::walk;

#[derive(Copy, Clone, ValueEnum)]
enum Format {
  Json,
  C,
}

#[derive(Parser)]
#[command(about = "Dump a tree's roots as JSON or as C source, roots-first")]
struct Args {
  out:  PathBuf,
  r#in: PathBuf,

  #[arg(long, value_enum, default_value = "json")]
  format: Format,
}

fn main() {
  qdag_cli::init_tracing("warn");
  let args = Args::parse();

  let graph = qdag_cli::open_graph(&args.r#in, true).unwrap_or_else(|e| qdag_cli::fatal(e, Some(&args.r#in)));

  let text = match args.format {
    Format::Json => {
      qdag_core::persist::Metadata::from_graph(&graph).to_json().unwrap_or_else(|e| qdag_cli::fatal(e, Some(&args.r#in)))
    }
    Format::C => dump_c(&graph),
  };

  std::fs::write(&args.out, text).unwrap_or_else(|e| qdag_cli::fatal(e.into(), Some(&args.out)));
}

/// A minimal but genuine C rendition: one `static const char *` initialiser per root, holding the
/// postfix textual form, in root order — no header/build-system assumptions, just the data a
/// C caller would need to `loadStringSafe` it back.
fn dump_c(graph: &qdag_core::Graph) -> String {
  let mut out = String::new();
  writeln!(out, "/* generated by ksave */").unwrap();
  writeln!(out, "#include <stddef.h>").unwrap();
  writeln!(out).unwrap();
  writeln!(out, "unsigned qdagNumRoots = {};", graph.roots.len()).unwrap();
  writeln!(out, "const char *qdagRootNames[] = {{").unwrap();
  for i in 0..graph.roots.len() {
    writeln!(out, "  \"{}\",", graph.name_for_root(i).unwrap_or("")).unwrap();
  }
  writeln!(out, "}};").unwrap();
  writeln!(out).unwrap();
  writeln!(out, "const char *qdagRoots[] = {{").unwrap();
  for &root in &graph.roots {
    let text = walk::save_string(graph, root);
    writeln!(out, "  \"{text}\",").unwrap();
  }
  writeln!(out, "}};").unwrap();

  out
}
