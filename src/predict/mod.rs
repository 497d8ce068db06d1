//! Serving-side feature generation
//!
//! Live feature rows for unplayed games and the parity audit that checks
//! them against training rows.

pub mod audit;
pub mod live;

pub use audit::{ParityAudit, ParityMismatch, ParityReport};
pub use live::LivePredictor;
