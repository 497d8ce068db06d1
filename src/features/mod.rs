//! Feature extraction
//!
//! Point-in-time team form, ratings and schedule context, combined into
//! matchup feature vectors.

pub mod elo;
pub mod matchup;
pub mod registry;
pub mod rolling;
pub mod schedule;
pub mod venue;

pub use elo::{HomeAdvantage, RatingConfig, RatingEngine, RatingUpdate};
pub use matchup::{Matchup, MatchupFeatureBuilder, MatchupFeatureVector};
pub use registry::{FeatureId, FeaturePolicyConfig, FeatureRegistry, FeatureSchema};
pub use rolling::{Metric, RollingConfig, RollingWindowSnapshot, TemporalAggregator, VenuePolicy};
pub use schedule::{ScheduleComputer, ScheduleConfig, ScheduleContext};
pub use venue::{GeoPoint, TeamDirectory};
