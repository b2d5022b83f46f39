/*!

The node model: a 32-bit [`NodeId`] reference that may carry an inversion bit, and the
[`Node`] triple `(Q, T, F)` it refers to.

A node's "polymorphism" — whether it behaves as an `OR`, `GT`, `NE`, `AND`, `QNTF` or `QTF` — is
never stored explicitly. It is always inferred from the shape of `(T, F)`. See [`Variant`].

*/

use std::fmt::Write as _;

use crate::format::{impl_display_debug_for_formattable, FormatStyle, Formattable};

/// High bit of a reference: "invert the referenced node's output."
pub const IBIT: u32 = 0x8000_0000;

/// A reference to a node, possibly inverted. Value semantics; carries no graph identity of its
/// own, so the same `NodeId` means different things in different graphs.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
  pub const ZERO: NodeId = NodeId(0);

  #[inline]
  pub fn new(raw: u32) -> Self {
    NodeId(raw)
  }

  /// The underlying node index, with any inversion bit stripped.
  #[inline]
  pub fn index(self) -> u32 {
    self.0 & !IBIT
  }

  #[inline]
  pub fn is_inverted(self) -> bool {
    self.0 & IBIT != 0
  }

  #[inline]
  pub fn inverted(self) -> NodeId {
    NodeId(self.0 ^ IBIT)
  }

  #[inline]
  pub fn with_inversion(self, invert: bool) -> NodeId {
    if invert {
      self.inverted()
    } else {
      self
    }
  }

  #[inline]
  pub fn raw(self) -> u32 {
    self.0
  }
}

impl From<u32> for NodeId {
  fn from(raw: u32) -> Self {
    NodeId(raw)
  }
}

impl Formattable for NodeId {
  fn repr(&self, out: &mut dyn std::fmt::Write, _style: FormatStyle) -> std::fmt::Result {
    if self.is_inverted() {
      write!(out, "!{}", self.index())
    } else {
      write!(out, "{}", self.index())
    }
  }
}
impl_display_debug_for_formattable!(NodeId);

/// The `(Q, T, F)` triple stored for one interned node.
///
/// Invariants enforced by the normaliser before a node is ever allocated:
///   - `q` never carries [`IBIT`] (a question is never itself inverted).
///   - `f` never carries [`IBIT`].
///   - `t` may carry [`IBIT`] — it is the only slot inversion is ever attached to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Node {
  pub q: u32,
  pub t: u32,
  pub f: u32,
}

impl Node {
  #[inline]
  pub fn new(q: u32, t: u32, f: u32) -> Self {
    debug_assert_eq!(q & IBIT, 0, "Q must never carry IBIT");
    debug_assert_eq!(f & IBIT, 0, "F must never carry IBIT");
    Node { q, t, f }
  }
}

/// The inferred operator shape of a node, computed from `(T, F)` alone. See §3 of the design
/// for the exact classification rules.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Variant {
  /// `id == 0`.
  Const0,
  /// `id < nstart`: a self-referencing input variable.
  Entry,
  /// `T == IBIT`: `Q OR F`.
  Or,
  /// `T & IBIT != 0 && F == 0`: `Q > T'` (greater-than, a.k.a. `Q AND NOT T'`).
  Gt,
  /// `(T ^ IBIT) == F && F != 0`: `Q XOR F`.
  Ne,
  /// `T & IBIT == 0 && F == 0`: `Q AND T`.
  And,
  /// General ternary choice with `T` inverted.
  QnTF,
  /// General ternary choice with `T` not inverted.
  QTF,
}

impl Variant {
  /// Total order used by the comparator to rank node shapes:
  /// `OR < GT < NE < AND < QNTF < QTF`.
  pub fn rank(self) -> u8 {
    match self {
      Variant::Const0 => 0,
      Variant::Entry  => 0,
      Variant::Or     => 0,
      Variant::Gt     => 1,
      Variant::Ne      => 2,
      Variant::And    => 3,
      Variant::QnTF   => 4,
      Variant::QTF    => 5,
    }
  }

  /// Whether this variant participates in cascade flattening (OR/NE/AND chains).
  pub fn is_cascade(self) -> bool {
    matches!(self, Variant::Or | Variant::Ne | Variant::And)
  }
}

/// Classify a node from its raw `(T, F)` fields. Does not know about `nstart`; callers must
/// check `id < nstart` (and `id == 0`) themselves before calling this.
#[inline]
pub fn classify(t: u32, f: u32) -> Variant {
  if t == IBIT {
    Variant::Or
  } else if (t & IBIT != 0) && f == 0 {
    Variant::Gt
  } else if (t ^ IBIT) == f && f != 0 {
    Variant::Ne
  } else if (t & IBIT == 0) && f == 0 {
    Variant::And
  } else if t & IBIT != 0 {
    Variant::QnTF
  } else {
    Variant::QTF
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn node_id_inversion_roundtrips() {
    let id = NodeId::new(42);
    assert!(!id.is_inverted());
    let inv = id.inverted();
    assert!(inv.is_inverted());
    assert_eq!(inv.index(), 42);
    assert_eq!(inv.inverted(), id);
  }

  #[test]
  fn classify_or() {
    assert_eq!(classify(IBIT, 7), Variant::Or);
  }

  #[test]
  fn classify_gt() {
    assert_eq!(classify(5 | IBIT, 0), Variant::Gt);
  }

  #[test]
  fn classify_ne() {
    assert_eq!(classify(5 | IBIT, 5), Variant::Ne);
  }

  #[test]
  fn classify_and() {
    assert_eq!(classify(5, 0), Variant::And);
  }

  #[test]
  fn classify_qntf_and_qtf() {
    assert_eq!(classify(5 | IBIT, 9), Variant::QnTF);
    assert_eq!(classify(5, 9), Variant::QTF);
  }

  #[test]
  fn variant_rank_order() {
    assert!(Variant::Or.rank() < Variant::Gt.rank());
    assert!(Variant::Gt.rank() < Variant::Ne.rank());
    assert!(Variant::Ne.rank() < Variant::And.rank());
    assert!(Variant::And.rank() < Variant::QnTF.rank());
    assert!(Variant::QnTF.rank() < Variant::QTF.rank());
  }
}
