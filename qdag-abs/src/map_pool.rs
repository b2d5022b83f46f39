/*!

`MapPool` hands out reusable `u32[maxNodes]` scratch buffers to operations that need a
transient node-id map without paying for a fresh allocation (and a fresh `memset`) on every call.

There are two flavors of scratch buffer:

  - a plain node-id map (`Vec<u32>`), whose entries the caller must clear or otherwise version
    itself before trusting them;
  - a [`VersionedMap`](crate::VersionedMap), which carries its own generation stamps so the
    caller gets O(1) invalidation for free.

Each flavor has its own free-list, bounded by [`MAXPOOLARRAY`]. Acquiring and releasing must be
strictly nested (stack discipline): the comparator may acquire a map, call into the cascade
reorderer which acquires its own, and so on. A `MapPool` is therefore shared via `Rc<RefCell<_>>`
so that several `Acquired*` guards can be outstanding at once within one thread; acquiring past
the free-list bound is a configuration error (the caller is leaking scratch maps rather than
returning them), and is therefore fatal rather than something we try to recover from.

*/

use std::cell::RefCell;
use std::rc::Rc;

use crate::versioned_map::VersionedMap;

/// Bound on the number of outstanding buffers of one flavor. Chosen generously: legitimate
/// nesting of scratch-map use (comparator inside cascade inside normaliser) is a handful of
/// frames deep, not hundreds.
pub const MAXPOOLARRAY: usize = 128;

struct Pool<T> {
  free:     Vec<T>,
  capacity: usize,
  make:     fn(usize) -> T,
}

impl<T> Pool<T> {
  fn new(capacity: usize, make: fn(usize) -> T) -> Self {
    Pool { free: Vec::new(), capacity, make }
  }

  fn acquire(&mut self) -> T {
    self.free.pop().unwrap_or_else(|| (self.make)(self.capacity))
  }

  fn release(&mut self, item: T) {
    if self.free.len() >= MAXPOOLARRAY {
      panic!(
        "MapPool: free-list overflow (MAXPOOLARRAY = {MAXPOOLARRAY} too small); \
         this indicates a scratch-map leak"
      );
    }
    self.free.push(item);
  }
}

struct PoolInner {
  node_maps:      Pool<Vec<u32>>,
  versioned_maps: Pool<VersionedMap<u32>>,
}

#[derive(Clone)]
pub struct MapPool {
  inner: Rc<RefCell<PoolInner>>,
}

/// An acquired plain node-id map. Returned to the pool on drop.
pub struct NodeMap {
  pool:   MapPool,
  buffer: Option<Vec<u32>>,
}

impl std::ops::Deref for NodeMap {
  type Target = Vec<u32>;
  fn deref(&self) -> &Vec<u32> {
    self.buffer.as_ref().expect("buffer taken")
  }
}

impl std::ops::DerefMut for NodeMap {
  fn deref_mut(&mut self) -> &mut Vec<u32> {
    self.buffer.as_mut().expect("buffer taken")
  }
}

impl Drop for NodeMap {
  fn drop(&mut self) {
    if let Some(buffer) = self.buffer.take() {
      self.pool.inner.borrow_mut().node_maps.release(buffer);
    }
  }
}

/// An acquired versioned map. Returned to the pool, invalidated, on drop.
pub struct ScratchVersionedMap {
  pool:   MapPool,
  buffer: Option<VersionedMap<u32>>,
}

impl std::ops::Deref for ScratchVersionedMap {
  type Target = VersionedMap<u32>;
  fn deref(&self) -> &VersionedMap<u32> {
    self.buffer.as_ref().expect("buffer taken")
  }
}

impl std::ops::DerefMut for ScratchVersionedMap {
  fn deref_mut(&mut self) -> &mut VersionedMap<u32> {
    self.buffer.as_mut().expect("buffer taken")
  }
}

impl Drop for ScratchVersionedMap {
  fn drop(&mut self) {
    if let Some(mut buffer) = self.buffer.take() {
      buffer.clear();
      self.pool.inner.borrow_mut().versioned_maps.release(buffer);
    }
  }
}

impl MapPool {
  pub fn new(max_nodes: usize) -> Self {
    MapPool {
      inner: Rc::new(RefCell::new(PoolInner {
        node_maps:      Pool::new(max_nodes, |cap| vec![0u32; cap]),
        versioned_maps: Pool::new(max_nodes, VersionedMap::new),
      })),
    }
  }

  /// Acquire a plain node-id map. Contents are whatever the previous borrower left behind; the
  /// caller must clear the slots it intends to read before reading them.
  pub fn acquire_node_map(&self) -> NodeMap {
    let buffer = self.inner.borrow_mut().node_maps.acquire();
    NodeMap { pool: self.clone(), buffer: Some(buffer) }
  }

  /// Acquire a versioned map, freshly invalidated.
  pub fn acquire_versioned_map(&self) -> ScratchVersionedMap {
    let buffer = self.inner.borrow_mut().versioned_maps.acquire();
    ScratchVersionedMap { pool: self.clone(), buffer: Some(buffer) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn acquire_then_release_reuses_buffer() {
    let pool = MapPool::new(16);
    {
      let mut map = pool.acquire_node_map();
      map[0] = 42;
    }
    let map = pool.acquire_node_map();
    // Same underlying buffer came back (pool had exactly one to give out).
    assert_eq!(map[0], 42);
  }

  #[test]
  fn versioned_map_comes_back_cleared() {
    let pool = MapPool::new(16);
    {
      let mut vm = pool.acquire_versioned_map();
      vm.set(3, 7);
      assert_eq!(vm.get(3), Some(7));
    }
    let vm = pool.acquire_versioned_map();
    assert_eq!(vm.get(3), None);
  }

  #[test]
  fn nested_acquisition_is_supported() {
    let pool = MapPool::new(8);
    let mut outer = pool.acquire_node_map();
    outer[0] = 1;
    {
      let mut inner = pool.acquire_node_map();
      inner[0] = 2;
      assert_eq!(outer[0], 1);
      assert_eq!(inner[0], 2);
    }
    assert_eq!(outer[0], 1);
  }

  #[test]
  #[should_panic(expected = "free-list overflow")]
  fn overflow_of_free_list_is_fatal() {
    let pool = MapPool::new(4);
    let mut held = Vec::new();
    for _ in 0..=MAXPOOLARRAY {
      held.push(pool.acquire_node_map());
    }
    drop(held);
  }
}
