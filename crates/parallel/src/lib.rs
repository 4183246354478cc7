//! # rastermath parallel
//!
//! Parallel processing strategies for raster passes.
//!
//! This crate provides:
//! - Row-strip and tile partitioning of an output region
//! - Sequential or rayon-backed execution of one task per sub-region
//! - Cooperative cancellation between sub-regions

pub mod partition;
pub mod strategy;

pub use partition::{Region, TileIterator};
pub use strategy::{CancelToken, ParallelStrategy, ProcessingMode, num_cpus};
