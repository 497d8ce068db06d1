//! Chronological training-set assembly
//!
//! Walks the store one game date at a time: features for every game on a
//! date are built first, and only then are that date's results folded into
//! the ratings.

use chrono::NaiveDate;
use serde_json::json;

use crate::data::store::GameStore;
use crate::features::elo::RatingEngine;
use crate::features::matchup::{Matchup, MatchupFeatureBuilder, MatchupFeatureVector};
use crate::features::registry::FeatureSchema;
use crate::features::venue::TeamDirectory;
use crate::predict::live::LivePredictor;
use crate::{Config, GameKey, GameResult, Result, SeasonId, TeamId};

/// Which games become training rows. All games still feed the ratings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetFilter {
    pub seasons: Option<Vec<SeasonId>>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DatasetFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn seasons(seasons: Vec<SeasonId>) -> Self {
        DatasetFilter {
            seasons: Some(seasons),
            ..Default::default()
        }
    }

    /// Games dated within `[start, end]`
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        DatasetFilter {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    pub fn matches(&self, game: &GameResult) -> bool {
        self.seasons
            .as_ref()
            .map_or(true, |s| s.contains(&game.season))
            && self.start.map_or(true, |d| game.date >= d)
            && self.end.map_or(true, |d| game.date <= d)
    }
}

/// Feature matrix with labels, one row per game in chronological order
#[derive(Debug, Clone)]
pub struct TrainingSet {
    schema: FeatureSchema,
    rows: Vec<MatchupFeatureVector>,
    labels: Vec<u8>,
    keys: Vec<GameKey>,
}

impl TrainingSet {
    fn empty(schema: FeatureSchema) -> Self {
        TrainingSet {
            schema,
            rows: Vec::new(),
            labels: Vec::new(),
            keys: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[MatchupFeatureVector] {
        &self.rows
    }

    /// Home win = 1
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn keys(&self) -> &[GameKey] {
        &self.keys
    }

    /// Plain row-major matrix in schema column order
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.values().to_vec()).collect()
    }

    /// Fraction of rows won by the home side
    pub fn home_win_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().map(|&l| l as f64).sum::<f64>() / self.labels.len() as f64
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "features": self.schema.names(),
            "games": self.keys,
            "rows": self.matrix(),
            "labels": self.labels,
        })
    }
}

/// Drives the feature pipeline over a store
pub struct DatasetAssembler<'a> {
    store: &'a GameStore,
    directory: &'a TeamDirectory,
    config: &'a Config,
    builder: MatchupFeatureBuilder<'a>,
}

impl<'a> DatasetAssembler<'a> {
    /// Fails on an invalid configuration before any game is read
    pub fn new(
        store: &'a GameStore,
        directory: &'a TeamDirectory,
        config: &'a Config,
    ) -> Result<Self> {
        let builder = MatchupFeatureBuilder::new(store, directory, config)?;
        Ok(DatasetAssembler {
            store,
            directory,
            config,
            builder,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.builder.schema()
    }

    pub fn builder(&self) -> &MatchupFeatureBuilder<'a> {
        &self.builder
    }

    /// Build training rows for the games selected by `filter`
    pub fn build(&self, filter: &DatasetFilter) -> Result<TrainingSet> {
        let games: Vec<GameResult> = self.store.games().collect();
        let mut set = TrainingSet::empty(self.schema().clone());
        let mut engine = RatingEngine::new(self.config.rating.clone())?;

        let mut start = 0;
        while start < games.len() {
            let date = games[start].date;
            let end = start + games[start..].iter().take_while(|g| g.date == date).count();
            let day = &games[start..end];

            for game in day.iter().filter(|g| filter.matches(g)) {
                let matchup = Matchup::from_game(game);
                debug_assert!(
                    engine.last_processed().map_or(true, |k| k < matchup.cutoff()),
                    "ratings already include games on {}",
                    date
                );
                set.rows.push(self.builder.build(&matchup, &engine));
                set.labels.push(game.home_won() as u8);
                set.keys.push(game.key());
            }

            // Only now may this date's results move the ratings
            for game in day {
                engine.process(game)?;
            }
            start = end;
        }

        log::info!(
            "Built {} rows x {} features from {} games",
            set.len(),
            set.schema.len(),
            games.len()
        );
        if !set.is_empty() {
            log::debug!("Home win rate in training rows: {:.3}", set.home_win_rate());
        }
        Ok(set)
    }

    /// Frozen live-prediction state over the whole store
    pub fn live(&self) -> Result<LivePredictor<'a>> {
        LivePredictor::new(self.store, self.directory, self.config)
    }

    /// One feature row for an unplayed game, from everything in the store
    /// before `date`. Unknown teams get cold-start values.
    pub fn build_live_features(
        &self,
        home: TeamId,
        away: TeamId,
        date: NaiveDate,
    ) -> Result<MatchupFeatureVector> {
        Ok(self.live()?.build_live_features(home, away, date))
    }
}
