/*!

Shared plumbing for the command-line drivers (§6): a compact JSON error diagnostic, default
graph dimensions for tools that build a tree from scratch, and tracing setup.

Each binary under `src/bin/` is a thin argument parser; all of the actual work happens in
`qdag-core`. None of these tools invoke the toolchain's panic machinery on bad input — every
fallible step returns a `qdag_core::Error`, which [`fatal`] turns into the one-line stderr
diagnostic and exit code the spec requires.

*/

use std::path::Path;

use qdag_core::error::{CapacityError, Error, FormatError};
use qdag_core::{Context, Dimensions, Flags};

/// Default capacity for tools that build a fresh graph from text input rather than loading one.
/// Generous enough for interactive use; large batch jobs should go through `loadFile` instead.
pub const DEFAULT_MAX_NODES: u32 = 1 << 20;
pub const DEFAULT_MAX_ROOTS: u32 = 64;
pub const DEFAULT_NSTART: u32 = 1 + 26 * 26; // kstart=1 plus two letters' worth of entries

pub fn default_dimensions() -> Dimensions {
  Dimensions { kstart: 1, ostart: 1, estart: DEFAULT_NSTART, nstart: DEFAULT_NSTART, max_nodes: DEFAULT_MAX_NODES }
}

/// Initialises a `tracing` subscriber from `RUST_LOG`, falling back to the given default filter.
/// Every driver calls this once at the top of `main`.
pub fn init_tracing(default_filter: &str) {
  use tracing_subscriber::EnvFilter;
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
  let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// The one-line JSON diagnostic §7 mandates for fatal errors: an `error` string, an optional
/// `filename`, and whatever context-specific fields the call site adds.
#[derive(serde::Serialize)]
pub struct Diagnostic {
  pub error:    String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub filename: Option<String>,
  #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
  pub context:  serde_json::Map<String, serde_json::Value>,
}

impl Diagnostic {
  pub fn new(error: impl Into<String>) -> Self {
    Diagnostic { error: error.into(), filename: None, context: serde_json::Map::new() }
  }

  pub fn with_filename(mut self, path: &Path) -> Self {
    self.filename = Some(path.display().to_string());
    self
  }

  pub fn print_and_exit(&self) -> ! {
    let line = serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"error\":{:?}}}", self.error));
    eprintln!("{line}");
    std::process::exit(1)
  }
}

/// Classifies a core error the way §7 groups them, then prints the diagnostic and exits. Every
/// driver's `main` ends its fallible path in `.unwrap_or_else(|e| qdag_cli::fatal(e, None))`.
pub fn fatal(err: Error, filename: Option<&Path>) -> ! {
  let category = match &err {
    Error::Capacity(inner) => match inner {
      CapacityError::Nodes { .. } => "capacity_nodes",
      CapacityError::Entries { .. } => "capacity_entries",
      CapacityError::Roots { .. } => "capacity_roots",
      CapacityError::RecursionDepth { .. } => "capacity_recursion",
    },
    Error::Format(inner) => match inner {
      FormatError::BadMagic { .. } => "bad_magic",
      FormatError::ChecksumMismatch { .. } => "bad_checksum",
      FormatError::Truncated { .. } => "truncated",
      FormatError::Metadata(_) => "bad_metadata",
      FormatError::Token { .. } => "bad_token",
    },
    Error::Invariant(_) => "invariant_violation",
    Error::Resource(_) => "io_error",
    Error::NotFoundOrMismatch(_) => "not_found_or_mismatch",
  };
  let mut diagnostic = Diagnostic::new(format!("{category}: {err}"));
  if let Some(path) = filename {
    diagnostic = diagnostic.with_filename(path);
  }
  diagnostic.print_and_exit()
}

/// Builds a fresh graph sized for text-driven tools (`beval`, `bexplain`), with the given number
/// of roots and default flags plus whatever extra flags the caller asks for (e.g. `Flag::Pure`
/// via `--pure`).
pub fn fresh_graph(num_roots: u32, flags: Flags) -> qdag_core::Result<qdag_core::Graph> {
  qdag_core::Graph::new(default_dimensions(), num_roots.max(1), flags, Context::default())
}

/// Opens a saved graph from disk, sized with enough headroom for the tools (`bextract`,
/// `bjoin`, `bfold`) that build a new, typically smaller or similarly-sized, graph out of it.
pub fn open_graph(path: &Path, shared: bool) -> qdag_core::Result<qdag_core::Graph> {
  qdag_core::Graph::open(path, shared, DEFAULT_MAX_NODES, Context::default())
}

/// Builds a fresh graph whose entry numbering matches `source`'s exactly (same `kstart`/`ostart`/
/// `estart`/`nstart`), sized generously for composition tools that re-issue `source`'s nodes
/// through `import_nodes`/`import_active`/`import_fold` and need the entry ids to line up.
pub fn fresh_graph_like(source: &qdag_core::Graph, num_roots: u32, flags: Flags) -> qdag_core::Result<qdag_core::Graph> {
  let dims = Dimensions { max_nodes: DEFAULT_MAX_NODES.max(source.ncount() * 4), ..*source.dims() };
  let mut dest = qdag_core::Graph::new(dims, num_roots.max(1), flags, Context::default())?;
  dest.entry_names = source.entry_names.clone();
  Ok(dest)
}

/// Resolves `name` against a loaded graph's roots first, then its entries, the way the reference
/// tools do when a name could plausibly be either (an entry bound into a balanced system is
/// often also reachable as a root under the same name).
pub fn resolve_name(graph: &qdag_core::Graph, name: &str) -> Option<u32> {
  for i in 0..graph.roots.len() {
    if graph.name_for_root(i) == Some(name) {
      return graph.get_root(i).ok().map(|id| id.raw());
    }
  }
  for i in 0..graph.entry_names.len() {
    if graph.name_for_entry(i) == Some(name) {
      return Some(i as u32);
    }
  }
  None
}
