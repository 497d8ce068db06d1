//! Data storage and dataset assembly
//!
//! The in-memory game store, SQLite persistence and the chronological
//! training-set builder.

pub mod database;
pub mod dataset;
pub mod store;

pub use database::Database;
pub use dataset::{DatasetAssembler, DatasetFilter, TrainingSet};
pub use store::{GameStore, TeamTimeline};
