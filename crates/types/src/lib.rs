//! Core data model for the erascore scoring pipeline.
//!
//! Snapshots are the externally sourced, append-only inputs; everything
//! else (era intervals, per-era score series) is derived and recomputed
//! from scratch on every scoring run.

pub mod era;
pub mod series;
pub mod snapshot;

pub use era::{Era, EraInterval, EraPoints, EraStart};
pub use series::EraScoreSeries;
pub use snapshot::{FieldValue, Snapshot, StashAddress};
