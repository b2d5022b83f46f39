/*!

The engine's error taxonomy. Every fallible entry point returns [`Result<T>`]; there are no
panics on the happy path, and the only panics left anywhere (e.g. `MapPool`'s free-list overflow)
are for states that indicate a bug in this crate itself rather than a bad input.

*/

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  /// A graph has run out of room for more nodes, entries, or roots.
  #[error("capacity exceeded: {0}")]
  Capacity(#[from] CapacityError),

  /// A saved file failed to parse, or parsed but failed its checksum / magic-number check.
  #[error("format error: {0}")]
  Format(#[from] FormatError),

  /// An internal invariant the normaliser or comparator depends on did not hold. Only raised
  /// when the `paranoid` feature (or [`crate::flags::Flag::Paranoid`]) is active.
  #[error("invariant violated: {0}")]
  Invariant(String),

  /// A requested resource (memory map, scratch pool, backing file) could not be obtained.
  #[error("resource error: {0}")]
  Resource(#[from] std::io::Error),

  /// A lookup failed, or two things that were expected to agree did not.
  #[error("{0}")]
  NotFoundOrMismatch(String),
}

#[derive(Error, Debug)]
pub enum CapacityError {
  #[error("node store exhausted: requested id would exceed maxNodes ({max_nodes})")]
  Nodes { max_nodes: u32 },

  #[error("entry table exhausted: at most {max_entries} named entries are supported")]
  Entries { max_entries: u32 },

  #[error("root table exhausted: at most {max_roots} roots are supported")]
  Roots { max_roots: u32 },

  #[error("recursion depth exceeded while normalising (limit {limit})")]
  RecursionDepth { limit: u32 },
}

#[derive(Error, Debug)]
pub enum FormatError {
  #[error("bad magic number: expected {expected:#010x}, found {found:#010x}")]
  BadMagic { expected: u32, found: u32 },

  #[error("checksum mismatch: header says {expected:#010x}, computed {computed:#010x}")]
  ChecksumMismatch { expected: u32, computed: u32 },

  #[error("truncated file: expected at least {expected} bytes, found {found}")]
  Truncated { expected: usize, found: usize },

  #[error("malformed metadata: {0}")]
  Metadata(#[from] serde_json::Error),

  #[error("malformed notation at byte offset {offset}: {detail}")]
  Token { offset: usize, detail: &'static str },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn capacity_error_converts_into_error() {
    let err: Error = CapacityError::Nodes { max_nodes: 1024 }.into();
    assert!(matches!(err, Error::Capacity(CapacityError::Nodes { max_nodes: 1024 })));
  }

  #[test]
  fn format_error_converts_into_error() {
    let err: Error = FormatError::BadMagic { expected: 0x20210613, found: 0 }.into();
    assert!(format!("{err}").contains("bad magic number"));
  }
}
