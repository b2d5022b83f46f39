/*!

`beval <pattern>...` — load each pattern as a root's textual form, evaluate its truth table over
every assignment of the entries it references, and print a CRC-32C of the table per root.

*/

use clap::Parser;
use qdag_abs::crc32::crc32c;
use qdag_core::{eval, flags::default_flags, walk};

#[derive(Parser)]
#[command(about = "Evaluate the truth table of one or more boolean patterns")]
struct Args {
  /// Patterns in postfix notation, one per root (see §4.8).
  #[arg(required = true)]
  patterns: Vec<String>,
}

/// Highest 0-based entry index referenced in `text`, or `None` if it references no entries.
/// Mirrors the base-26 run parsing `qdag_core::walk` uses internally, since the CLI needs to know
/// how many input columns to evaluate without borrowing the core's private parser.
fn max_entry_index(text: &str) -> Option<u32> {
  let mut chars = text.chars().peekable();
  let mut best: Option<u32> = None;
  while let Some(&c) = chars.peek() {
    if c.is_ascii_alphabetic() {
      let mut value = 0u32;
      loop {
        match chars.peek() {
          Some(&c) if c.is_ascii_uppercase() => {
            value = value * 26 + (c as u32 - 'A' as u32) + 1;
            chars.next();
          }
          Some(&c) if c.is_ascii_lowercase() => {
            value = value * 26 + (c as u32 - 'a' as u32);
            chars.next();
            break;
          }
          _ => break,
        }
      }
      best = Some(best.map_or(value, |b: u32| b.max(value)));
    } else {
      chars.next();
    }
  }
  best
}

fn main() {
  qdag_cli::init_tracing("warn");
  let args = Args::parse();

  let mut num_entries = 0u32;
  for pattern in &args.patterns {
    if let Some(max_index) = max_entry_index(pattern) {
      num_entries = num_entries.max(max_index + 1);
    }
  }

  let mut graph = qdag_cli::fresh_graph(args.patterns.len() as u32, default_flags())
    .unwrap_or_else(|e| qdag_cli::fatal(e, None));

  for (i, pattern) in args.patterns.iter().enumerate() {
    let reference = walk::load_string_safe(&mut graph, pattern).unwrap_or_else(|e| qdag_cli::fatal(e, None));
    graph
      .set_root(i, qdag_core::NodeId::new(reference))
      .unwrap_or_else(|e| qdag_cli::fatal(e, None));
  }

  let tables = eval::truth_table(&graph, 1..num_entries + 1);
  for (i, table) in tables.iter().enumerate() {
    let bytes: Vec<u8> = table.iter().map(|&bit| bit as u8).collect();
    let crc = crc32c(&bytes);
    println!("{}\t{:08x}", graph.name_for_root(i).unwrap_or("?"), crc);
  }
}
