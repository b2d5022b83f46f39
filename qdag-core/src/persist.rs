/*!

The on-disk `BaseTreeFile` binary format (§4.9) and its companion JSON metadata document.

Layout, all multi-byte fields little-endian, each section 16-byte aligned:

```text
0         Header (fixed size, see Header::SIZE)
offNames  entry names, each zero-terminated, then root names, then a trailing zero
offNodes  ncount records of (Q, T, F) as three u32 each
offRoots  numRoots u32 references
offHistory  numHistory u32 ids (optional, length may be zero)
```

*/

use std::io::Write as _;

use qdag_abs::crc32::crc32c;

use crate::error::{FormatError, Result};
use crate::graph::Graph;

pub const MAGIC: u32 = 0x2021_0613;

#[derive(Copy, Clone, Debug)]
pub struct Header {
  pub magic:        u32,
  pub flags:        u32,
  pub kstart:       u32,
  pub ostart:       u32,
  pub estart:       u32,
  pub nstart:       u32,
  pub ncount:       u32,
  pub num_roots:    u32,
  pub num_history:  u32,
  pub crc:          u32,
  pub off_names:    u64,
  pub off_nodes:    u64,
  pub off_roots:    u64,
  pub off_history:  u64,
  pub file_size:    u64,
}

impl Header {
  pub const SIZE: usize = 4 * 9 + 8 * 5;

  /// `SIZE` padded up to the 16-byte section alignment every offset in the file is measured
  /// against — `to_bytes` pads its output to this length, so `off_names` must start here, not at
  /// the unpadded `SIZE`.
  const PADDED_SIZE: usize = {
    const ALIGN: usize = 16;
    Header::SIZE + (ALIGN - (Header::SIZE % ALIGN)) % ALIGN
  };

  fn to_bytes(self) -> Vec<u8> {
    let mut buf = Vec::with_capacity(Self::SIZE);
    buf.extend_from_slice(&self.magic.to_le_bytes());
    buf.extend_from_slice(&self.flags.to_le_bytes());
    buf.extend_from_slice(&self.kstart.to_le_bytes());
    buf.extend_from_slice(&self.ostart.to_le_bytes());
    buf.extend_from_slice(&self.estart.to_le_bytes());
    buf.extend_from_slice(&self.nstart.to_le_bytes());
    buf.extend_from_slice(&self.ncount.to_le_bytes());
    buf.extend_from_slice(&self.num_roots.to_le_bytes());
    buf.extend_from_slice(&self.num_history.to_le_bytes());
    buf.extend_from_slice(&self.crc.to_le_bytes());
    buf.extend_from_slice(&self.off_names.to_le_bytes());
    buf.extend_from_slice(&self.off_nodes.to_le_bytes());
    buf.extend_from_slice(&self.off_roots.to_le_bytes());
    buf.extend_from_slice(&self.off_history.to_le_bytes());
    buf.extend_from_slice(&self.file_size.to_le_bytes());
    pad_to_alignment(&mut buf);
    buf
  }

  fn from_bytes(bytes: &[u8]) -> Result<Self> {
    if bytes.len() < Self::SIZE {
      return Err(FormatError::Truncated { expected: Self::SIZE, found: bytes.len() }.into());
    }
    let mut cursor = 0usize;
    let mut next_u32 = || {
      let v = u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap());
      cursor += 4;
      v
    };
    let magic = next_u32();
    let flags = next_u32();
    let kstart = next_u32();
    let ostart = next_u32();
    let estart = next_u32();
    let nstart = next_u32();
    let ncount = next_u32();
    let num_roots = next_u32();
    let num_history = next_u32();
    let crc = next_u32();
    let mut next_u64 = || {
      let v = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
      cursor += 8;
      v
    };
    let off_names = next_u64();
    let off_nodes = next_u64();
    let off_roots = next_u64();
    let off_history = next_u64();
    let file_size = next_u64();

    if magic != MAGIC {
      return Err(FormatError::BadMagic { expected: MAGIC, found: magic }.into());
    }

    Ok(Header {
      magic,
      flags,
      kstart,
      ostart,
      estart,
      nstart,
      ncount,
      num_roots,
      num_history,
      crc,
      off_names,
      off_nodes,
      off_roots,
      off_history,
      file_size,
    })
  }
}

fn pad_to_alignment(buf: &mut Vec<u8>) {
  const ALIGN: usize = 16;
  let padding = (ALIGN - (buf.len() % ALIGN)) % ALIGN;
  buf.resize(buf.len() + padding, 0);
}

/// Serialises `graph` to `path`. Nodes are written in the order they already occupy the arena,
/// which the ordering guarantee in §5 ("node ids are strictly monotonically increasing; a
/// child's id is always strictly less than its parent's") already puts in DFS-compatible order
/// from any set of roots.
pub fn save_file(graph: &Graph, path: &std::path::Path) -> Result<()> {
  let dims = graph.dims();
  let ncount = graph.ncount();

  let mut names = Vec::new();
  for i in 0..dims.nstart as usize {
    names.extend_from_slice(graph.name_for_entry(i).unwrap_or("").as_bytes());
    names.push(0);
  }
  for i in 0..graph.roots.len() {
    names.extend_from_slice(graph.name_for_root(i).unwrap_or("").as_bytes());
    names.push(0);
  }
  names.push(0);

  let mut nodes_section = Vec::with_capacity(ncount as usize * 12);
  for id in 0..ncount {
    let node = graph.node(id);
    nodes_section.extend_from_slice(&node.q.to_le_bytes());
    nodes_section.extend_from_slice(&node.t.to_le_bytes());
    nodes_section.extend_from_slice(&node.f.to_le_bytes());
  }

  let mut roots_section = Vec::with_capacity(graph.roots.len() * 4);
  for &root in &graph.roots {
    roots_section.extend_from_slice(&root.to_le_bytes());
  }

  let mut history_section = Vec::with_capacity(graph.history.len() * 4);
  for &id in &graph.history {
    history_section.extend_from_slice(&id.to_le_bytes());
  }

  let crc = {
    let mut hasher_input = Vec::with_capacity(nodes_section.len() + roots_section.len());
    hasher_input.extend_from_slice(&nodes_section);
    hasher_input.extend_from_slice(&roots_section);
    crc32c(&hasher_input)
  };

  let off_names = Header::PADDED_SIZE as u64;
  let mut names_padded = names.clone();
  pad_to_alignment(&mut names_padded);
  let off_nodes = off_names + names_padded.len() as u64;
  let mut nodes_padded = nodes_section.clone();
  pad_to_alignment(&mut nodes_padded);
  let off_roots = off_nodes + nodes_padded.len() as u64;
  let mut roots_padded = roots_section.clone();
  pad_to_alignment(&mut roots_padded);
  let off_history = off_roots + roots_padded.len() as u64;
  let mut history_padded = history_section.clone();
  pad_to_alignment(&mut history_padded);
  let file_size = off_history + history_padded.len() as u64;

  let header = Header {
    magic: MAGIC,
    flags: graph.flags.bits(),
    kstart: dims.kstart,
    ostart: dims.ostart,
    estart: dims.estart,
    nstart: dims.nstart,
    ncount,
    num_roots: graph.roots.len() as u32,
    num_history: graph.history.len() as u32,
    crc,
    off_names,
    off_nodes,
    off_roots,
    off_history,
    file_size,
  };

  let mut file = std::fs::File::create(path)?;
  file.write_all(&header.to_bytes())?;
  file.write_all(&names_padded)?;
  file.write_all(&nodes_padded)?;
  file.write_all(&roots_padded)?;
  file.write_all(&history_padded)?;
  Ok(())
}

/// A loaded file, either an owned buffer or an mmap. `shared` requests the mmap path.
pub enum LoadedFile {
  Owned(Vec<u8>),
  Mapped(memmap2::Mmap),
}

impl LoadedFile {
  fn bytes(&self) -> &[u8] {
    match self {
      LoadedFile::Owned(buf) => buf,
      LoadedFile::Mapped(map) => map,
    }
  }
}

pub struct LoadedGraph {
  pub header:      Header,
  pub entry_names: Vec<String>,
  pub root_names:  Vec<String>,
  pub nodes:       Vec<(u32, u32, u32)>,
  pub roots:       Vec<u32>,
  pub history:     Vec<u32>,
  #[allow(dead_code)]
  backing: LoadedFile,
}

#[allow(unsafe_code)]
pub fn load_file(path: &std::path::Path, shared: bool) -> Result<LoadedGraph> {
  let backing = if shared {
    let file = std::fs::File::open(path)?;
    // SAFETY: the mapped region is only ever read, never written, for the lifetime of
    // `LoadedGraph`; concurrent external mutation of the file is the caller's risk to manage,
    // same as it would be for any other mmap-backed reader.
    let map = unsafe { memmap2::Mmap::map(&file)? };
    LoadedFile::Mapped(map)
  } else {
    LoadedFile::Owned(std::fs::read(path)?)
  };

  let bytes = backing.bytes();
  let header = Header::from_bytes(bytes)?;

  if (header.file_size as usize) > bytes.len() {
    return Err(FormatError::Truncated { expected: header.file_size as usize, found: bytes.len() }.into());
  }

  let names_start = header.off_names as usize;
  let names_end = header.off_nodes as usize;
  let names = bytes[names_start..names_end]
    .split(|&b| b == 0)
    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
    .collect::<Vec<_>>();
  if names.len() < header.nstart as usize + header.num_roots as usize {
    return Err(FormatError::Truncated { expected: header.nstart as usize + header.num_roots as usize, found: names.len() }.into());
  }
  let entry_names: Vec<String> = names[..header.nstart as usize].to_vec();
  let root_names: Vec<String> =
    names[header.nstart as usize..header.nstart as usize + header.num_roots as usize].to_vec();

  let nodes_start = header.off_nodes as usize;
  let mut nodes = Vec::with_capacity(header.ncount as usize);
  for i in 0..header.ncount as usize {
    let base = nodes_start + i * 12;
    let q = u32::from_le_bytes(bytes[base..base + 4].try_into().unwrap());
    let t = u32::from_le_bytes(bytes[base + 4..base + 8].try_into().unwrap());
    let f = u32::from_le_bytes(bytes[base + 8..base + 12].try_into().unwrap());
    nodes.push((q, t, f));
  }

  let roots_start = header.off_roots as usize;
  let mut roots = Vec::with_capacity(header.num_roots as usize);
  for i in 0..header.num_roots as usize {
    let base = roots_start + i * 4;
    roots.push(u32::from_le_bytes(bytes[base..base + 4].try_into().unwrap()));
  }

  let history_start = header.off_history as usize;
  let mut history = Vec::with_capacity(header.num_history as usize);
  for i in 0..header.num_history as usize {
    let base = history_start + i * 4;
    history.push(u32::from_le_bytes(bytes[base..base + 4].try_into().unwrap()));
  }

  let nodes_bytes = &bytes[nodes_start..nodes_start + header.ncount as usize * 12];
  let roots_bytes = &bytes[roots_start..roots_start + header.num_roots as usize * 4];
  let mut checked = Vec::with_capacity(nodes_bytes.len() + roots_bytes.len());
  checked.extend_from_slice(nodes_bytes);
  checked.extend_from_slice(roots_bytes);
  let computed = crc32c(&checked);
  if computed != header.crc {
    return Err(FormatError::ChecksumMismatch { expected: header.crc, computed }.into());
  }

  Ok(LoadedGraph { header, entry_names, root_names, nodes, roots, history, backing })
}

/// JSON sidecar metadata: header fields plus named maps and a textual dump, for tools (`ksave`)
/// that want a human-diffable representation alongside the binary file.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Metadata {
  pub kstart:      u32,
  pub ostart:      u32,
  pub estart:      u32,
  pub nstart:      u32,
  pub ncount:      u32,
  pub flags:       u32,
  pub entry_names: Vec<String>,
  pub root_names:  Vec<String>,
  pub roots:       Vec<u32>,
  pub history:     Vec<u32>,
}

impl Metadata {
  pub fn from_graph(graph: &Graph) -> Self {
    let dims = graph.dims();
    Metadata {
      kstart: dims.kstart,
      ostart: dims.ostart,
      estart: dims.estart,
      nstart: dims.nstart,
      ncount: graph.ncount(),
      flags: graph.flags.bits(),
      entry_names: graph.entry_names.clone(),
      root_names: graph.root_names.clone(),
      roots: graph.roots.clone(),
      history: graph.history.clone(),
    }
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self).map_err(FormatError::from)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::Context;
  use crate::flags::default_flags;
  use crate::node::IBIT;
  use crate::store::Dimensions;

  fn small_graph() -> Graph {
    let dims = Dimensions { kstart: 1, ostart: 1, estart: 4, nstart: 4, max_nodes: 64 };
    let mut g = Graph::new(dims, 1, default_flags(), Context::default()).unwrap();
    let or_ref = g.add_normalise_node(1, IBIT, 2).unwrap();
    g.set_root(0, or_ref).unwrap();
    g
  }

  #[test]
  fn save_then_load_round_trips_header_and_nodes() {
    let g = small_graph();
    let dir = std::env::temp_dir();
    let path = dir.join(format!("qdag-test-{}.btf", std::process::id()));
    save_file(&g, &path).unwrap();
    let loaded = load_file(&path, false).unwrap();
    assert_eq!(loaded.header.magic, MAGIC);
    assert_eq!(loaded.header.ncount, g.ncount());
    assert_eq!(loaded.nodes.len(), g.ncount() as usize);
    assert_eq!(loaded.roots.len(), g.roots.len());
    assert_eq!(loaded.entry_names, g.entry_names);
    assert_eq!(loaded.root_names, g.root_names);
    std::fs::remove_file(&path).ok();
  }

  #[test]
  fn metadata_serialises_to_json() {
    let g = small_graph();
    let metadata = Metadata::from_graph(&g);
    let json = metadata.to_json().unwrap();
    assert!(json.contains("\"ncount\""));
  }
}
