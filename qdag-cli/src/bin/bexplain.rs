/*!

`bexplain <pattern>...` — load each pattern through the full normaliser and trace every
normalisation step as a JSON object on stdout (`qdag_core::normalize` emits one `tracing` event
per step; this driver just wires a JSON-formatted subscriber at `DEBUG` to it).

*/

use clap::Parser;
use qdag_core::{flags::default_flags, walk};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Trace normalisation steps for one or more boolean patterns, as JSON")]
struct Args {
  #[arg(required = true)]
  patterns: Vec<String>,
}

fn main() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qdag_core::normalize=debug"));
  tracing_subscriber::fmt().json().with_env_filter(filter).with_writer(std::io::stdout).init();

  let args = Args::parse();
  let mut graph =
    qdag_cli::fresh_graph(args.patterns.len() as u32, default_flags()).unwrap_or_else(|e| qdag_cli::fatal(e, None));

  for (i, pattern) in args.patterns.iter().enumerate() {
    let reference = walk::load_string_safe(&mut graph, pattern).unwrap_or_else(|e| qdag_cli::fatal(e, None));
    graph
      .set_root(i, qdag_core::NodeId::new(reference))
      .unwrap_or_else(|e| qdag_cli::fatal(e, None));
  }
}
