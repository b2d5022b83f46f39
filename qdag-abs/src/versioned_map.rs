/*!

A `VersionedMap` is a scratch array of `maxNodes` slots that can be invalidated in O(1) by
bumping a generation counter instead of zeroing the backing storage.

Every consumer that needs "have I seen id `i` already, and if so what did I record for it"
semantics during a single top-level operation (the comparator's been-here memory, the walker's
visited/output-slot table, the node index's slot generations) wants exactly this shape. Rather
than `memset` a `u32[maxNodes]` array before every use, we stamp each slot with the generation it
was last written under; a slot is live iff its stamp equals the map's current generation.

On `u32` wraparound of the generation counter we pay for one real clear. This is rare enough
(4 billion invalidations) that it is not worth a larger counter.

*/

pub struct VersionedMap<T> {
  values:  Vec<T>,
  stamps:  Vec<u32>,
  current: u32,
}

impl<T: Copy + Default> VersionedMap<T> {
  pub fn new(capacity: usize) -> Self {
    VersionedMap {
      values:  vec![T::default(); capacity],
      stamps:  vec![0; capacity],
      current: 1,
    }
  }

  pub fn capacity(&self) -> usize {
    self.values.len()
  }

  /// Invalidates every slot in O(1). On generation overflow, falls back to a real clear.
  pub fn clear(&mut self) {
    if self.current == u32::MAX {
      self.stamps.iter_mut().for_each(|s| *s = 0);
      self.current = 1;
    } else {
      self.current += 1;
    }
  }

  #[inline]
  pub fn get(&self, index: usize) -> Option<T> {
    if self.stamps[index] == self.current {
      Some(self.values[index])
    } else {
      None
    }
  }

  #[inline]
  pub fn contains(&self, index: usize) -> bool {
    self.stamps[index] == self.current
  }

  #[inline]
  pub fn set(&mut self, index: usize, value: T) {
    self.values[index] = value;
    self.stamps[index] = self.current;
  }

  /// Grows the backing storage to at least `capacity`, without touching validity: freshly added
  /// slots start out invalid (their stamp is `0`, which can never equal a live generation since
  /// `current` starts at `1` and only increases).
  pub fn reserve(&mut self, capacity: usize) {
    if capacity > self.values.len() {
      self.values.resize(capacity, T::default());
      self.stamps.resize(capacity, 0);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fresh_map_has_no_entries() {
    let map: VersionedMap<u32> = VersionedMap::new(8);
    for i in 0..8 {
      assert_eq!(map.get(i), None);
    }
  }

  #[test]
  fn set_then_get() {
    let mut map: VersionedMap<u32> = VersionedMap::new(4);
    map.set(2, 99);
    assert_eq!(map.get(2), Some(99));
    assert_eq!(map.get(1), None);
  }

  #[test]
  fn clear_invalidates_in_one_call() {
    let mut map: VersionedMap<u32> = VersionedMap::new(4);
    map.set(0, 1);
    map.set(1, 2);
    map.clear();
    assert_eq!(map.get(0), None);
    assert_eq!(map.get(1), None);
    map.set(0, 5);
    assert_eq!(map.get(0), Some(5));
  }

  #[test]
  fn wraparound_forces_real_clear() {
    let mut map: VersionedMap<u32> = VersionedMap::new(2);
    map.current = u32::MAX;
    map.set(0, 7);
    assert_eq!(map.get(0), Some(7));
    map.clear();
    assert_eq!(map.current, 1);
    assert_eq!(map.get(0), None);
  }

  #[test]
  fn reserve_grows_without_making_old_slots_valid() {
    let mut map: VersionedMap<u32> = VersionedMap::new(2);
    map.set(0, 3);
    map.reserve(6);
    assert_eq!(map.capacity(), 6);
    assert_eq!(map.get(0), Some(3));
    assert_eq!(map.get(5), None);
  }
}
