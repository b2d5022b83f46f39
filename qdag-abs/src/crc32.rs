/*!

A small table-driven CRC-32C (Castagnoli) implementation.

The reference implementation computes its node hash with the `crc32l` instruction, which is
Intel's hardware implementation of CRC-32C (polynomial `0x1EDC6F41`, reflected). We use the same
polynomial here in software so that the two uses in this crate — hashing `(Q, T, F)` triples for
the node index, and checksumming a saved file's nodes and roots — agree with the original's
choice of algorithm even though we don't have the instruction available portably.

*/

const POLY: u32 = 0x82f6_3b78; // bit-reflected 0x1EDC6F41

fn make_table() -> [u32; 256] {
  let mut table = [0u32; 256];
  let mut i = 0;
  while i < 256 {
    let mut crc = i as u32;
    let mut j = 0;
    while j < 8 {
      crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
      j += 1;
    }
    table[i] = crc;
    i += 1;
  }
  table
}

/// Incremental CRC-32C accumulator. Starts at the conventional seed `0xFFFF_FFFF` and the final
/// value is obtained by inverting the accumulated bits, matching the usual CRC-32 convention.
#[derive(Copy, Clone)]
pub struct Crc32 {
  state: u32,
}

impl Default for Crc32 {
  fn default() -> Self {
    Crc32 { state: 0xFFFF_FFFF }
  }
}

impl Crc32 {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
    static TABLE: once_table::OnceTable = once_table::OnceTable::new();
    let table = TABLE.get();
    for &byte in bytes {
      let index = ((self.state ^ byte as u32) & 0xff) as usize;
      self.state = table[index] ^ (self.state >> 8);
    }
    self
  }

  pub fn update_u32(&mut self, value: u32) -> &mut Self {
    self.update(&value.to_le_bytes())
  }

  pub fn finish(&self) -> u32 {
    self.state ^ 0xFFFF_FFFF
  }
}

/// One-shot convenience wrapper.
pub fn crc32c(bytes: &[u8]) -> u32 {
  Crc32::new().update(bytes).finish()
}

/// Thin lazily-initialised table, avoiding a dependency on `once_cell` for this tiny leaf crate.
mod once_table {
  use super::make_table;
  use std::sync::OnceLock;

  pub struct OnceTable(OnceLock<[u32; 256]>);

  impl OnceTable {
    pub const fn new() -> Self {
      OnceTable(OnceLock::new())
    }

    pub fn get(&self) -> &[u32; 256] {
      self.0.get_or_init(make_table)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_input_is_zero() {
    assert_eq!(crc32c(&[]), 0);
  }

  #[test]
  fn known_vector_123456789() {
    // Standard CRC-32C check value for the ASCII string "123456789".
    assert_eq!(crc32c(b"123456789"), 0xE306_9283);
  }

  #[test]
  fn incremental_matches_one_shot() {
    let whole = crc32c(b"hello, world");
    let mut incremental = Crc32::new();
    incremental.update(b"hello, ").update(b"world");
    assert_eq!(incremental.finish(), whole);
  }

  #[test]
  fn update_u32_is_little_endian() {
    let mut a = Crc32::new();
    a.update_u32(0x0102_0304);
    let mut b = Crc32::new();
    b.update(&[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(a.finish(), b.finish());
  }
}
