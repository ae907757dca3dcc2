//! Edgegrid: out-of-core edge grid preprocessor
//!
//! Turns a raw binary edge list into the 2-D grid layout a streaming graph
//! engine consumes:
//!
//! - Pass 1: Degree scan - per-vertex in/out degrees via a reader thread,
//!   a bounded task queue, and lock-free atomic accumulation
//! - Partitioning: degree-balanced 1-D maps for the source and target axes
//! - Pass 2: Grid shuffle - bucket-sort each I/O buffer into P x P block
//!   files with per-cell locks and small-write coalescing
//! - Concatenation: row-major and column-major streams with offset indexes
//!   plus a `meta` record
//!
//! Key principle: memory stays bounded regardless of edge count. The edge
//! file is only ever streamed through a fixed pool of page-aligned buffers,
//! so graphs far larger than RAM preprocess in two sequential reads.

pub mod cli;
pub mod concat;
pub mod config;
pub mod convert;
pub mod degree;
pub mod formats;
pub mod partition;
pub mod preprocess;
pub mod progress;
pub mod ring;
pub mod shuffle;
pub mod stats;
pub mod validate;

pub use config::{EdgeType, GridConfig, Hardware};
pub use formats::GridMeta;
