/*!

Runtime feature flags, persisted in a saved graph's file header so that a tree built with one
set of engine behaviours can be loaded back and know what it was built with.

*/

use enumflags2::{bitflags, BitFlags};

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Flag {
  /// Run the normaliser's exhaustive self-checks (duplicate cascade operands, dangling
  /// references, etc.) after every node addition.
  Paranoid = 1 << 0,
  /// Reject any addition that would not already be in canonical form, instead of canonicalising
  /// it. Used by tools that are meant to operate only on already-normalised trees.
  Pure = 1 << 1,
  /// Apply the pattern-database rewriter during normalisation.
  Rewrite = 1 << 2,
  /// Apply cascade reordering during normalisation.
  Cascade = 1 << 3,
  /// Recognise and fold `system` structures (multi-bit buses) during import/export.
  System = 1 << 4,
}

pub type Flags = BitFlags<Flag>;

/// The flag set a freshly constructed [`crate::graph::Graph`] starts with.
pub fn default_flags() -> Flags {
  Flag::Paranoid | Flag::Cascade
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_flags_are_paranoid_and_cascade_only() {
    let flags = default_flags();
    assert!(flags.contains(Flag::Paranoid));
    assert!(flags.contains(Flag::Cascade));
    assert!(!flags.contains(Flag::Pure));
    assert!(!flags.contains(Flag::Rewrite));
    assert!(!flags.contains(Flag::System));
  }

  #[test]
  fn flags_roundtrip_through_bits() {
    let flags = Flag::Pure | Flag::Rewrite;
    let bits = flags.bits();
    let back = Flags::from_bits(bits).expect("valid bitflags");
    assert_eq!(flags, back);
  }
}
