use serde::Deserialize;

use crate::error::{Error, Result};
use crate::row::Row;

// ════════════════════════════════════════════════════════════════
//  Items
// ════════════════════════════════════════════════════════════════

/// A value travelling from a source to a sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Row(Row),
    /// Synchronization no-op. Sinks accept and ignore it.
    Sync,
}

/// Result of pulling one position from a [`Stream`].
#[derive(Debug)]
pub enum Next {
    /// An item and its logical index in the final ordered result.
    Item(Item, usize),
    /// End of stream, carrying the terminal error if any.
    End(Option<Error>),
}

// ════════════════════════════════════════════════════════════════
//  Options
// ════════════════════════════════════════════════════════════════

/// Read-ahead policy of the driving engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prefetch {
    /// Workers pull from the stream directly.
    #[default]
    None,
    /// A producer pulls ahead into a bounded buffer of this size.
    Buffered(usize),
}

/// Options a source is opened with and a drain is driven with.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StreamOptions {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub prefetch: Prefetch,
}

fn default_workers() -> usize {
    1
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self { workers: default_workers(), prefetch: Prefetch::None }
    }
}

impl StreamOptions {
    pub fn workers(workers: usize) -> Self {
        Self { workers, ..Self::default() }
    }

    pub fn with_prefetch(mut self, prefetch: Prefetch) -> Self {
        self.prefetch = prefetch;
        self
    }
}

// ════════════════════════════════════════════════════════════════
//  Contracts
// ════════════════════════════════════════════════════════════════

/// Pull-style stream produced by a [`Source`].
///
/// Streams are not shared: the engine serializes `next` calls.
pub trait Stream: Send {
    /// Advance one position.
    fn next(&mut self) -> Next;

    /// Release every resource. Idempotent; also called after `End`.
    fn close(&mut self) -> Result<()>;
}

/// Factory of pull-style streams.
pub trait Source: Send + Sync {
    fn open(&self, options: &StreamOptions) -> Result<Box<dyn Stream>>;
}

/// Push-style ingestion endpoint.
///
/// `put` may be called concurrently from several workers with distinct
/// logical indices in any order. `finish` is called exactly once, after
/// every `put` has returned, with the terminal error if the drain failed.
pub trait Sink: Send + Sync {
    fn put(&self, item: Item, index: usize) -> Result<()>;

    fn finish(&self, terminal: Option<&Error>) -> Result<()>;
}
