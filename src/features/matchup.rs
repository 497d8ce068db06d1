//! Matchup feature construction
//!
//! Combines both teams' as-of state into one vector of home-minus-away
//! differentials plus rating and scheduling context.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::data::store::GameStore;
use crate::features::elo::RatingEngine;
use crate::features::registry::{FeatureRegistry, FeatureSchema, RegisteredFeature};
use crate::features::rolling::{RollingWindowSnapshot, TemporalAggregator, VenuePolicy};
use crate::features::schedule::{ScheduleComputer, ScheduleContext};
use crate::features::venue::TeamDirectory;
use crate::{Config, GameKey, GameResult, Result, SeasonId, TeamId, Venue};

/// Rating-derived columns, in emission order
pub const RATING_FEATURES: [&str; 4] = [
    "rating_diff_pre",
    "win_expectation_home",
    "home_rating_pre",
    "away_rating_pre",
];

/// A scheduled or historical game to build features for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Matchup {
    pub home: TeamId,
    pub away: TeamId,
    pub date: NaiveDate,
    pub season: SeasonId,
}

impl Matchup {
    pub fn new(home: TeamId, away: TeamId, date: NaiveDate, season: SeasonId) -> Self {
        Matchup {
            home,
            away,
            date,
            season,
        }
    }

    pub fn from_game(game: &GameResult) -> Self {
        Matchup::new(game.home_team, game.away_team, game.date, game.season)
    }

    /// Same date and season with the venues swapped
    pub fn swapped(&self) -> Self {
        Matchup::new(self.away, self.home, self.date, self.season)
    }

    /// Cutoff for every as-of query made for this matchup
    pub fn cutoff(&self) -> GameKey {
        GameKey::start_of_day(self.date)
    }
}

/// Named feature values in schema order. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupFeatureVector {
    pub matchup: Matchup,
    schema: FeatureSchema,
    values: Vec<f64>,
}

impl MatchupFeatureVector {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.position(name).map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.schema
            .names()
            .iter()
            .map(|n| n.as_str())
            .zip(self.values.iter().copied())
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl Serialize for MatchupFeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Builds matchup vectors from a frozen store.
///
/// Ratings are passed per call so the caller keeps sole ownership of the
/// fold that produces them.
#[derive(Debug, Clone)]
pub struct MatchupFeatureBuilder<'a> {
    store: &'a GameStore,
    directory: &'a TeamDirectory,
    config: &'a Config,
    registry: FeatureRegistry,
    schema: FeatureSchema,
}

impl<'a> MatchupFeatureBuilder<'a> {
    pub fn new(
        store: &'a GameStore,
        directory: &'a TeamDirectory,
        config: &'a Config,
    ) -> Result<Self> {
        config.validate()?;
        let registry = FeatureRegistry::from_config(&config.rolling, &config.features);

        let mut names: Vec<String> = registry.features().iter().map(|f| f.name.clone()).collect();
        names.extend(RATING_FEATURES.iter().map(|n| n.to_string()));
        names.extend(ScheduleContext::NAMES.iter().map(|n| n.to_string()));

        Ok(MatchupFeatureBuilder {
            store,
            directory,
            config,
            registry,
            schema: FeatureSchema::new(names),
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn store(&self) -> &'a GameStore {
        self.store
    }

    /// The one snapshot function used for both sides of every differential
    pub fn side_snapshot(
        &self,
        matchup: &Matchup,
        side: Venue,
        policy: VenuePolicy,
    ) -> RollingWindowSnapshot {
        let team = match side {
            Venue::Home => matchup.home,
            Venue::Away => matchup.away,
        };
        TemporalAggregator::new(self.store, &self.config.rolling).snapshot_for(
            team,
            matchup.date,
            matchup.season,
            policy,
            side,
        )
    }

    /// One side's value of one form feature
    pub fn side_value(&self, feature: &RegisteredFeature, matchup: &Matchup, side: Venue) -> f64 {
        feature.extract(&self.side_snapshot(matchup, side, feature.policy))
    }

    pub fn schedule(&self, matchup: &Matchup) -> ScheduleContext {
        ScheduleComputer::new(self.store, self.directory, &self.config.schedule).compute(
            matchup.home,
            matchup.away,
            matchup.date,
        )
    }

    /// Build the full vector. `ratings` may hold games on or after the
    /// matchup date; only state before the date is read.
    pub fn build(&self, matchup: &Matchup, ratings: &RatingEngine) -> MatchupFeatureVector {
        // Each policy yields one (home, away) snapshot pair shared by every
        // feature under it
        let mut snapshots: HashMap<VenuePolicy, (RollingWindowSnapshot, RollingWindowSnapshot)> =
            HashMap::new();
        let mut values = Vec::with_capacity(self.schema.len());
        for feature in self.registry.features() {
            let (home, away) = snapshots.entry(feature.policy).or_insert_with(|| {
                (
                    self.side_snapshot(matchup, Venue::Home, feature.policy),
                    self.side_snapshot(matchup, Venue::Away, feature.policy),
                )
            });
            values.push(feature.extract(home) - feature.extract(away));
        }

        let cutoff = matchup.cutoff();
        let home_rating = ratings.pre_game_rating(matchup.home, matchup.season, cutoff);
        let away_rating = ratings.pre_game_rating(matchup.away, matchup.season, cutoff);
        values.push(home_rating - away_rating);
        values.push(ratings.win_expectation(matchup.home, matchup.away, matchup.season, cutoff));
        values.push(home_rating);
        values.push(away_rating);

        values.extend(self.schedule(matchup).to_vec());

        MatchupFeatureVector {
            matchup: *matchup,
            schema: self.schema.clone(),
            values,
        }
    }
}
