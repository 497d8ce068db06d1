//! Live prediction features
//!
//! Replays the whole store once into a rating engine, then serves feature
//! rows for unplayed games against that frozen state.

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::data::store::GameStore;
use crate::features::elo::RatingEngine;
use crate::features::matchup::{Matchup, MatchupFeatureBuilder, MatchupFeatureVector};
use crate::features::registry::FeatureSchema;
use crate::features::venue::TeamDirectory;
use crate::{Config, Result, SeasonId, TeamId};

/// Read-only feature server over a frozen store and rating fold
pub struct LivePredictor<'a> {
    builder: MatchupFeatureBuilder<'a>,
    ratings: RatingEngine,
    season_start_month: u32,
}

impl<'a> LivePredictor<'a> {
    pub fn new(
        store: &'a GameStore,
        directory: &'a TeamDirectory,
        config: &'a Config,
    ) -> Result<Self> {
        let builder = MatchupFeatureBuilder::new(store, directory, config)?;
        let ratings = RatingEngine::replay(config.rating.clone(), store.games())?;
        log::info!(
            "Live state frozen after {} games (last {:?})",
            ratings.updates().len(),
            ratings.last_processed().map(|k| k.date)
        );
        Ok(LivePredictor {
            builder,
            ratings,
            season_start_month: config.schedule.season_start_month,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.builder.schema()
    }

    pub fn ratings(&self) -> &RatingEngine {
        &self.ratings
    }

    pub fn builder(&self) -> &MatchupFeatureBuilder<'a> {
        &self.builder
    }

    pub fn season_for(&self, date: NaiveDate) -> SeasonId {
        SeasonId::for_date(date, self.season_start_month)
    }

    /// Features for `home` hosting `away` on `date`. Never fails: unknown
    /// teams get cold-start values.
    pub fn build_live_features(
        &self,
        home: TeamId,
        away: TeamId,
        date: NaiveDate,
    ) -> MatchupFeatureVector {
        let matchup = Matchup::new(home, away, date, self.season_for(date));
        self.build_matchup(&matchup)
    }

    pub fn build_matchup(&self, matchup: &Matchup) -> MatchupFeatureVector {
        self.builder.build(matchup, &self.ratings)
    }

    /// A day's slate, computed in parallel over the frozen state. Output
    /// order follows `games`.
    pub fn build_slate(
        &self,
        games: &[(TeamId, TeamId)],
        date: NaiveDate,
    ) -> Vec<MatchupFeatureVector> {
        games
            .par_iter()
            .map(|&(home, away)| self.build_live_features(home, away, date))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdvancedStats, GameId, GameResult};

    fn make_game(id: i64, date: NaiveDate, home: i64, away: i64, hg: u16, ag: u16) -> GameResult {
        GameResult {
            game_id: GameId(id),
            season: SeasonId::for_date(date, 9),
            date,
            home_team: TeamId(home),
            away_team: TeamId(away),
            home_goals: hg,
            away_goals: ag,
            home_shots: 31,
            away_shots: 27,
            home_advanced: AdvancedStats::default(),
        }
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn make_store() -> GameStore {
        GameStore::from_results(&[
            make_game(1, day(1, 5), 1, 2, 4, 1),
            make_game(2, day(1, 7), 3, 1, 2, 3),
            make_game(3, day(1, 9), 2, 3, 1, 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_unknown_team_is_cold_start() {
        let store = make_store();
        let directory = TeamDirectory::new();
        let config = Config::default();
        let live = LivePredictor::new(&store, &directory, &config).unwrap();
        let vector = live.build_live_features(TeamId(1), TeamId(404), day(1, 12));

        assert_eq!(vector.len(), live.schema().len());
        assert_eq!(vector.get("rolling_win_pct_3_diff"), Some(0.5));
        assert_eq!(vector.get("away_rating_pre"), Some(1500.0));
        assert_eq!(vector.matchup.season, SeasonId(20232024));
    }

    #[test]
    fn test_slate_matches_single_rows() {
        let store = make_store();
        let directory = TeamDirectory::new();
        let config = Config::default();
        let live = LivePredictor::new(&store, &directory, &config).unwrap();
        let slate = [(TeamId(1), TeamId(2)), (TeamId(3), TeamId(4)), (TeamId(2), TeamId(1))];
        let rows = live.build_slate(&slate, day(1, 12));

        assert_eq!(rows.len(), slate.len());
        for (row, &(home, away)) in rows.iter().zip(&slate) {
            assert_eq!(row, &live.build_live_features(home, away, day(1, 12)));
        }
    }

    #[test]
    fn test_live_row_ignores_games_on_or_after_date() {
        let store = make_store();
        let directory = TeamDirectory::new();
        let config = Config::default();
        let live = LivePredictor::new(&store, &directory, &config).unwrap();

        // Asking about a date inside the history sees only earlier games
        let early = live.build_live_features(TeamId(1), TeamId(2), day(1, 5));
        assert_eq!(early.get("rating_diff_pre"), Some(0.0));
        assert_eq!(early.get("rolling_win_pct_3_diff"), Some(0.0));
    }
}
