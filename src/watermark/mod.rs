//! Watermark persistence
//!
//! The engine reads the last sync timestamp once at run start and writes it
//! once at run end through the [`WatermarkStore`] trait.
//! [`FileWatermarkStore`] keeps it in a small JSON file guarded by a run lease.

pub mod file;
pub mod traits;

pub use file::{FileWatermarkStore, RunLease};
pub use traits::WatermarkStore;

#[cfg(test)]
pub use traits::MockWatermarkStore;
