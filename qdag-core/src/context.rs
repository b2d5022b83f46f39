/*!

A [`Context`] replaces the handful of process-global knobs the original engine kept as mutable
globals (debug level, verbosity, a "tick" flag set by a signal handler for progress reporting).
Bundling them into a value that call sites thread through explicitly makes the engine safe to
embed more than once in the same process, and keeps construction of a [`crate::graph::Graph`]
free of hidden dependence on ambient state.

*/

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Verbosity level for diagnostic logging, coarser-grained than `tracing`'s levels but mapped
/// onto them at the call site (see [`Context::log_level`]).
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Debug, Default)]
pub enum Verbosity {
  #[default]
  Quiet,
  Normal,
  Verbose,
  Debug,
}

/// Allocation counters updated by the engine as it runs, surfaced to callers that want to report
/// memory pressure without instrumenting every call site themselves.
#[derive(Default)]
pub struct AllocatorMetrics {
  pub nodes_allocated:  std::sync::atomic::AtomicU64,
  pub nodes_rewound:    std::sync::atomic::AtomicU64,
  pub index_collisions: std::sync::atomic::AtomicU64,
}

impl AllocatorMetrics {
  pub fn record_alloc(&self) {
    self.nodes_allocated.fetch_add(1, AtomicOrdering::Relaxed);
  }

  pub fn record_rewind(&self, count: u64) {
    self.nodes_rewound.fetch_add(count, AtomicOrdering::Relaxed);
  }

  pub fn record_collision(&self) {
    self.index_collisions.fetch_add(1, AtomicOrdering::Relaxed);
  }
}

/// Shared, cheaply-cloneable handle to a graph's ambient settings. A `Context` is created once
/// by the caller and passed to [`crate::graph::Graph::new`]; it carries no per-graph state of its
/// own (that lives in the `Graph`), only the knobs that would otherwise be globals.
#[derive(Clone)]
pub struct Context {
  verbosity: Verbosity,
  tick:      Arc<AtomicBool>,
  metrics:   Arc<AllocatorMetrics>,
}

impl Default for Context {
  fn default() -> Self {
    Context {
      verbosity: Verbosity::default(),
      tick:      Arc::new(AtomicBool::new(false)),
      metrics:   Arc::new(AllocatorMetrics::default()),
    }
  }
}

impl Context {
  pub fn new(verbosity: Verbosity) -> Self {
    Context { verbosity, ..Context::default() }
  }

  pub fn verbosity(&self) -> Verbosity {
    self.verbosity
  }

  /// Maps [`Verbosity`] onto a `tracing` level for call sites that want to gate a `tracing::event!`
  /// on the context rather than on the global subscriber filter.
  pub fn log_level(&self) -> tracing::Level {
    match self.verbosity {
      Verbosity::Quiet   => tracing::Level::WARN,
      Verbosity::Normal  => tracing::Level::INFO,
      Verbosity::Verbose => tracing::Level::DEBUG,
      Verbosity::Debug   => tracing::Level::TRACE,
    }
  }

  /// Set by a caller (e.g. a signal handler in a CLI binary) to ask a long-running normalisation
  /// to report progress at its next safe checkpoint.
  pub fn request_tick(&self) {
    self.tick.store(true, AtomicOrdering::Relaxed);
  }

  /// Consume a pending tick request, if any.
  pub fn take_tick(&self) -> bool {
    self.tick.swap(false, AtomicOrdering::Relaxed)
  }

  pub fn metrics(&self) -> &AllocatorMetrics {
    &self.metrics
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tick_is_one_shot() {
    let ctx = Context::default();
    assert!(!ctx.take_tick());
    ctx.request_tick();
    assert!(ctx.take_tick());
    assert!(!ctx.take_tick());
  }

  #[test]
  fn verbosity_maps_to_increasing_log_levels() {
    let quiet = Context::new(Verbosity::Quiet);
    let debug = Context::new(Verbosity::Debug);
    assert!(quiet.log_level() < debug.log_level());
  }

  #[test]
  fn metrics_accumulate() {
    let ctx = Context::default();
    ctx.metrics().record_alloc();
    ctx.metrics().record_alloc();
    assert_eq!(ctx.metrics().nodes_allocated.load(AtomicOrdering::Relaxed), 2);
  }
}
