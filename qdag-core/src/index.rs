/*!

[`NodeIndex`] is the content-addressed hash table mapping a canonical `(Q, T, F)` triple to the
id of the node that was interned for it. Slots are validated against a generation counter rather
than cleared, so `invalidate()` (used by `rewind`) is O(1).

*/

use qdag_abs::crc32::Crc32;

/// A slot is live iff `generations[slot] == current_generation`. `ids[slot]` is otherwise stale
/// garbage and must not be read.
pub struct NodeIndex {
  ids:         Vec<u32>,
  generations: Vec<u32>,
  current:     u32,
  mask_prime:  usize,
}

/// Smallest prime at or above `n`, used to size the table so the non-zero probe step (derived
/// from the hash) can't degenerate into a short cycle through a shared factor.
fn next_prime(n: usize) -> usize {
  fn is_prime(n: usize) -> bool {
    if n < 2 {
      return false;
    }
    let mut i = 2;
    while i * i <= n {
      if n % i == 0 {
        return false;
      }
      i += 1;
    }
    true
  }
  let mut candidate = n.max(2);
  while !is_prime(candidate) {
    candidate += 1;
  }
  candidate
}

#[inline]
fn hash_triple(q: u32, t: u32, f: u32) -> u32 {
  Crc32::new().update_u32(q).update_u32(t).update_u32(f).finish()
}

impl NodeIndex {
  /// `capacity` should be comfortably larger than the expected node count; a common choice is
  /// `2 * max_nodes` to keep load factor under 50%.
  pub fn new(capacity: usize) -> Self {
    let size = next_prime(capacity.max(3));
    NodeIndex {
      ids:         vec![0; size],
      generations: vec![0; size],
      current:     1,
      mask_prime:  size,
    }
  }

  #[inline]
  fn table_len_minus_one(&self) -> usize {
    self.mask_prime - 1
  }

  #[inline]
  fn is_live(&self, slot: usize) -> bool {
    self.generations[slot] == self.current
  }

  /// Looks up `(q, t, f)`, returning the probe slot it landed on (for a follow-up `install`) and
  /// the id found there, or `0` if the slot was empty/stale.
  pub fn lookup(&self, q: u32, t: u32, f: u32, nodes: &dyn Fn(u32) -> (u32, u32, u32)) -> (usize, u32) {
    let hash = hash_triple(q, t, f);
    let step = self.probe_step_for(hash);
    let mut slot = hash as usize % self.mask_prime;
    loop {
      if !self.is_live(slot) {
        return (slot, 0);
      }
      let id = self.ids[slot];
      if nodes(id) == (q, t, f) {
        return (slot, id);
      }
      slot = (slot + step) % self.mask_prime;
    }
  }

  #[inline]
  fn probe_step_for(&self, hash: u32) -> usize {
    1 + (hash as usize % self.table_len_minus_one())
  }

  /// Records `id` at `slot`, stamping it with the current generation. `slot` must be the slot
  /// returned by a preceding `lookup` on the same triple.
  pub fn install(&mut self, slot: usize, id: u32) {
    self.ids[slot] = id;
    self.generations[slot] = self.current;
  }

  /// Bumps the generation counter, making every previously-installed slot invisible in O(1). On
  /// overflow, falls back to a full clear and resets to generation 1.
  pub fn invalidate(&mut self) {
    if self.current == u32::MAX {
      self.generations.iter_mut().for_each(|g| *g = 0);
      self.current = 1;
    } else {
      self.current += 1;
    }
  }

  pub fn len(&self) -> usize {
    self.mask_prime
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::collections::HashMap;

  struct FakeStore {
    map: RefCell<HashMap<u32, (u32, u32, u32)>>,
  }

  impl FakeStore {
    fn new() -> Self {
      FakeStore { map: RefCell::new(HashMap::new()) }
    }

    fn insert(&self, id: u32, triple: (u32, u32, u32)) {
      self.map.borrow_mut().insert(id, triple);
    }

    fn lookup_fn(&self) -> impl Fn(u32) -> (u32, u32, u32) + '_ {
      move |id| *self.map.borrow().get(&id).unwrap_or(&(u32::MAX, u32::MAX, u32::MAX))
    }
  }

  #[test]
  fn install_then_lookup_finds_id() {
    let mut index = NodeIndex::new(16);
    let store = FakeStore::new();
    store.insert(7, (1, 2, 3));
    let (slot, found) = index.lookup(1, 2, 3, &store.lookup_fn());
    assert_eq!(found, 0);
    index.install(slot, 7);
    let (_, found) = index.lookup(1, 2, 3, &store.lookup_fn());
    assert_eq!(found, 7);
  }

  #[test]
  fn invalidate_hides_previous_installs() {
    let mut index = NodeIndex::new(16);
    let store = FakeStore::new();
    store.insert(9, (4, 5, 6));
    let (slot, _) = index.lookup(4, 5, 6, &store.lookup_fn());
    index.install(slot, 9);
    index.invalidate();
    let (_, found) = index.lookup(4, 5, 6, &store.lookup_fn());
    assert_eq!(found, 0);
  }

  #[test]
  fn distinct_triples_do_not_collide_in_value() {
    let mut index = NodeIndex::new(32);
    let store = FakeStore::new();
    store.insert(1, (1, 2, 3));
    store.insert(2, (4, 5, 6));
    let (s1, _) = index.lookup(1, 2, 3, &store.lookup_fn());
    index.install(s1, 1);
    let (s2, _) = index.lookup(4, 5, 6, &store.lookup_fn());
    index.install(s2, 2);
    assert_eq!(index.lookup(1, 2, 3, &store.lookup_fn()).1, 1);
    assert_eq!(index.lookup(4, 5, 6, &store.lookup_fn()).1, 2);
  }

  #[test]
  fn table_size_is_prime() {
    let index = NodeIndex::new(100);
    assert!(super::next_prime(index.len()) == index.len());
  }
}
