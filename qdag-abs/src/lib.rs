/*!

Generic scratch-memory and bit-twiddling abstractions used by `qdag-core`.

Nothing in this crate knows about choice nodes, cascades, or the boolean algebra; it only
provides the reusable machinery the engine builds on:

  - [`VersionedMap`] — an O(1)-invalidated scratch array.
  - [`MapPool`] — free-lists of reusable scratch buffers, acquired/released in stack discipline.
  - [`crc32`] — the CRC-32C implementation used both for node hashing and file checksums.

*/

mod memory;
mod versioned_map;
mod map_pool;
pub mod crc32;

pub use memory::{as_bytes, as_bytes_mut};
pub use versioned_map::VersionedMap;
pub use map_pool::{MapPool, NodeMap, ScratchVersionedMap, MAXPOOLARRAY};

pub use smallvec::{smallvec, SmallVec};
pub use tracing;
