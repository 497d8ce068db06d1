//! Elo rating system for team strength estimation
//!
//! Ratings are a strict left-to-right fold over completed games. Every
//! update is logged, so the pre-game rating of any team can be answered for
//! any earlier point in time without a replay.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{GameKey, GameResult, HockeyError, Result, SeasonId, TeamId};

/// How the home side's edge is expressed in rating points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HomeAdvantage {
    /// Constant bonus
    Fixed { points: f64 },
    /// Implied by the league-wide home win rate over the trailing `window`
    /// games, scaled and clamped to `[min, max]`. `fallback` applies until
    /// `window` games have been played.
    Dynamic {
        window: usize,
        scale: f64,
        min: f64,
        max: f64,
        fallback: f64,
    },
}

impl Default for HomeAdvantage {
    fn default() -> Self {
        HomeAdvantage::Fixed { points: 35.0 }
    }
}

/// Elo rating configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Starting rating for new teams and the carryover anchor
    pub initial_rating: f64,
    /// K-factor: how much ratings change per game
    pub k_factor: f64,
    /// Fraction of a rating's deviation from neutral kept across seasons
    pub carryover: f64,
    /// How quickly the update shrinks as the winner's rating edge grows
    pub gap_dampening: f64,
    pub home_advantage: HomeAdvantage,
}

impl Default for RatingConfig {
    fn default() -> Self {
        RatingConfig {
            initial_rating: 1500.0,
            k_factor: 8.0,
            carryover: 0.5,
            gap_dampening: 0.001,
            home_advantage: HomeAdvantage::default(),
        }
    }
}

impl RatingConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.initial_rating.is_finite() {
            return Err(HockeyError::Config("initial rating must be finite".into()));
        }
        if !self.k_factor.is_finite() || self.k_factor < 0.0 {
            return Err(HockeyError::Config(format!(
                "k-factor must be non-negative, got {}",
                self.k_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.carryover) {
            return Err(HockeyError::Config(format!(
                "carryover fraction must be within [0, 1], got {}",
                self.carryover
            )));
        }
        if !self.gap_dampening.is_finite() || self.gap_dampening < 0.0 {
            return Err(HockeyError::Config("gap dampening must be non-negative".into()));
        }
        match self.home_advantage {
            HomeAdvantage::Fixed { points } if !points.is_finite() => Err(HockeyError::Config(
                "home advantage points must be finite".into(),
            )),
            HomeAdvantage::Dynamic {
                window,
                scale,
                min,
                max,
                fallback,
            } => {
                if window == 0 {
                    return Err(HockeyError::Config(
                        "dynamic home advantage window must be positive".into(),
                    ));
                }
                if ![scale, min, max, fallback].iter().all(|v| v.is_finite()) || min > max {
                    return Err(HockeyError::Config(format!(
                        "invalid dynamic home advantage range [{}, {}]",
                        min, max
                    )));
                }
                Ok(())
            }
            HomeAdvantage::Fixed { .. } => Ok(()),
        }
    }
}

/// Win expectation for the home side
pub fn expected_score(home_rating: f64, away_rating: f64, home_advantage: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((away_rating - (home_rating + home_advantage)) / 400.0))
}

/// Record of one processed game
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingUpdate {
    pub key: GameKey,
    pub season: SeasonId,
    pub home: TeamId,
    pub away: TeamId,
    /// Pre-game ratings, after any season carryover
    pub home_pre: f64,
    pub away_pre: f64,
    pub home_advantage: f64,
    pub expected_home: f64,
    pub actual_home: f64,
    /// Points moved from away to home
    pub delta: f64,
    pub home_carryover: bool,
    pub away_carryover: bool,
}

impl RatingUpdate {
    pub fn home_delta(&self) -> f64 {
        self.delta
    }

    pub fn away_delta(&self) -> f64 {
        -self.delta
    }

    pub fn home_post(&self) -> f64 {
        self.home_pre + self.delta
    }

    pub fn away_post(&self) -> f64 {
        self.away_pre - self.delta
    }
}

#[derive(Debug, Clone, Copy)]
struct TeamState {
    rating: f64,
    season: SeasonId,
}

#[derive(Debug, Clone, Copy)]
struct RatingPoint {
    key: GameKey,
    season: SeasonId,
    /// Rating after this game
    rating: f64,
}

/// Sequential Elo fold with a timeline of intermediate states
#[derive(Debug, Clone)]
pub struct RatingEngine {
    config: RatingConfig,
    current: HashMap<TeamId, TeamState>,
    history: HashMap<TeamId, Vec<RatingPoint>>,
    /// League-wide home outcomes, for the dynamic home advantage
    home_outcomes: Vec<(GameKey, f64)>,
    updates: Vec<RatingUpdate>,
    last: Option<GameKey>,
}

impl Default for RatingEngine {
    fn default() -> Self {
        Self::with_valid_config(RatingConfig::default())
    }
}

impl RatingEngine {
    pub fn new(config: RatingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: RatingConfig) -> Self {
        RatingEngine {
            config,
            current: HashMap::new(),
            history: HashMap::new(),
            home_outcomes: Vec::new(),
            updates: Vec::new(),
            last: None,
        }
    }

    /// Fold a chronological game sequence into a fresh engine
    pub fn replay(
        config: RatingConfig,
        games: impl IntoIterator<Item = GameResult>,
    ) -> Result<Self> {
        let mut engine = Self::new(config)?;
        for game in games {
            engine.process(&game)?;
        }
        Ok(engine)
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    /// Key of the most recently processed game
    pub fn last_processed(&self) -> Option<GameKey> {
        self.last
    }

    pub fn updates(&self) -> &[RatingUpdate] {
        &self.updates
    }

    /// Pull a carried-in rating toward neutral
    pub fn carryover(&self, rating: f64) -> f64 {
        self.config.initial_rating + self.config.carryover * (rating - self.config.initial_rating)
    }

    /// Latest rating with no season adjustment (initial if unknown)
    pub fn current_rating(&self, team: TeamId) -> f64 {
        self.current
            .get(&team)
            .map(|s| s.rating)
            .unwrap_or(self.config.initial_rating)
    }

    /// Latest ratings for all seen teams, sorted by team id
    pub fn ratings(&self) -> Vec<(TeamId, f64)> {
        let mut ratings: Vec<(TeamId, f64)> =
            self.current.iter().map(|(t, s)| (*t, s.rating)).collect();
        ratings.sort_by_key(|(t, _)| *t);
        ratings
    }

    /// Rating a team carries into a game in `season`, using only games
    /// strictly before `cutoff`
    pub fn pre_game_rating(&self, team: TeamId, season: SeasonId, cutoff: GameKey) -> f64 {
        let Some(points) = self.history.get(&team) else {
            return self.config.initial_rating;
        };
        let end = points.partition_point(|p| p.key < cutoff);
        match end.checked_sub(1).map(|i| points[i]) {
            None => self.config.initial_rating,
            Some(point) if point.season == season => point.rating,
            Some(point) => self.carryover(point.rating),
        }
    }

    /// Home advantage in effect for games after `cutoff`
    pub fn home_advantage(&self, cutoff: GameKey) -> f64 {
        match self.config.home_advantage {
            HomeAdvantage::Fixed { points } => points,
            HomeAdvantage::Dynamic {
                window,
                scale,
                min,
                max,
                fallback,
            } => {
                let end = self.home_outcomes.partition_point(|(k, _)| *k < cutoff);
                if end < window {
                    return fallback;
                }
                let recent = &self.home_outcomes[end - window..end];
                let rate = recent.iter().map(|(_, o)| o).sum::<f64>() / window as f64;
                let rate = rate.clamp(0.05, 0.95);
                (scale * 400.0 * (rate / (1.0 - rate)).log10()).clamp(min, max)
            }
        }
    }

    /// Home win expectation for a matchup, from state strictly before `cutoff`
    pub fn win_expectation(
        &self,
        home: TeamId,
        away: TeamId,
        season: SeasonId,
        cutoff: GameKey,
    ) -> f64 {
        expected_score(
            self.pre_game_rating(home, season, cutoff),
            self.pre_game_rating(away, season, cutoff),
            self.home_advantage(cutoff),
        )
    }

    /// Update ratings with a completed game.
    ///
    /// Games must arrive in strictly increasing `(date, game id)` order;
    /// anything else is a causality violation and aborts the fold.
    pub fn process(&mut self, game: &GameResult) -> Result<RatingUpdate> {
        let key = game.key();
        if let Some(last) = self.last {
            if key <= last {
                return Err(HockeyError::CausalityViolation { game: key, last });
            }
        }

        let (home_pre, home_carryover) = self.enter_season(game.home_team, game.season);
        let (away_pre, away_carryover) = self.enter_season(game.away_team, game.season);

        // Same-day games never inform each other
        let home_advantage = self.home_advantage(GameKey::start_of_day(game.date));
        let expected_home = expected_score(home_pre, away_pre, home_advantage);
        let actual_home = match game.home_goals.cmp(&game.away_goals) {
            std::cmp::Ordering::Greater => 1.0,
            std::cmp::Ordering::Equal => 0.5,
            std::cmp::Ordering::Less => 0.0,
        };

        let margin = game.margin().unsigned_abs() as f64;
        let winner_gap = match game.margin().signum() {
            1 => home_pre + home_advantage - away_pre,
            -1 => away_pre - (home_pre + home_advantage),
            _ => 0.0,
        };
        let dampening = 2.2 / (winner_gap * self.config.gap_dampening + 2.2).max(1.0);
        let multiplier = (margin + 1.0).ln() * dampening;
        let delta = self.config.k_factor * multiplier * (actual_home - expected_home);

        let update = RatingUpdate {
            key,
            season: game.season,
            home: game.home_team,
            away: game.away_team,
            home_pre,
            away_pre,
            home_advantage,
            expected_home,
            actual_home,
            delta,
            home_carryover,
            away_carryover,
        };

        self.record(game.home_team, game.season, key, update.home_post());
        self.record(game.away_team, game.season, key, update.away_post());
        self.home_outcomes.push((key, actual_home));
        self.updates.push(update);
        self.last = Some(key);

        Ok(update)
    }

    /// Rating a team brings into its next game in `season`. The carryover
    /// pull happens here and only here, once per season transition.
    fn enter_season(&mut self, team: TeamId, season: SeasonId) -> (f64, bool) {
        let initial = self.config.initial_rating;
        match self.current.get(&team).copied() {
            None => {
                self.current.insert(team, TeamState { rating: initial, season });
                (initial, false)
            }
            Some(state) if state.season == season => (state.rating, false),
            Some(state) => {
                let pulled = self.carryover(state.rating);
                log::debug!(
                    "{} enters season {}: {:.1} -> {:.1}",
                    team,
                    season,
                    state.rating,
                    pulled
                );
                self.current.insert(team, TeamState { rating: pulled, season });
                (pulled, true)
            }
        }
    }

    fn record(&mut self, team: TeamId, season: SeasonId, key: GameKey, rating: f64) {
        self.current.insert(team, TeamState { rating, season });
        self.history
            .entry(team)
            .or_default()
            .push(RatingPoint { key, season, rating });
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{AdvancedStats, GameId};

    fn make_game(id: i64, date: NaiveDate, home: i64, away: i64, hg: u16, ag: u16) -> GameResult {
        GameResult {
            game_id: GameId(id),
            season: SeasonId::for_date(date, 9),
            date,
            home_team: TeamId(home),
            away_team: TeamId(away),
            home_goals: hg,
            away_goals: ag,
            home_shots: 30,
            away_shots: 30,
            home_advanced: AdvancedStats::default(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn no_home_edge() -> RatingConfig {
        RatingConfig {
            home_advantage: HomeAdvantage::Fixed { points: 0.0 },
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_ratings() {
        let engine = RatingEngine::default();
        assert_eq!(engine.current_rating(TeamId(1)), 1500.0);
        let cutoff = GameKey::start_of_day(day(2023, 10, 1));
        assert_eq!(engine.pre_game_rating(TeamId(999), SeasonId(20232024), cutoff), 1500.0);
    }

    #[test]
    fn test_expected_score() {
        let engine = RatingEngine::default();
        let cutoff = GameKey::start_of_day(day(2023, 10, 1));
        // Equal teams, home advantage gives a little over 50%
        let expected = engine.win_expectation(TeamId(1), TeamId(2), SeasonId(20232024), cutoff);
        assert!(expected > 0.5 && expected < 0.6);
        assert_eq!(expected_score(1500.0, 1500.0, 0.0), 0.5);
    }

    #[test]
    fn test_update_is_zero_sum() {
        let mut engine = RatingEngine::default();
        let update = engine.process(&make_game(1, day(2023, 10, 10), 1, 2, 4, 1)).unwrap();

        assert_eq!(update.home_delta(), -update.away_delta());
        assert!(engine.current_rating(TeamId(1)) > 1500.0);
        assert!(engine.current_rating(TeamId(2)) < 1500.0);
        let total = engine.current_rating(TeamId(1)) + engine.current_rating(TeamId(2));
        assert!((total - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_margin_leaves_ratings() {
        let mut engine = RatingEngine::new(no_home_edge()).unwrap();
        let update = engine.process(&make_game(1, day(2023, 10, 10), 1, 2, 2, 2)).unwrap();
        assert_eq!(update.delta, 0.0);
    }

    /// Team 2 blows out team 3 sixty times, leaving it far above a fresh
    /// team 1
    fn upset_engine() -> RatingEngine {
        let mut engine = RatingEngine::default();
        let start = day(2023, 10, 1);
        for i in 0..60 {
            let date = start + chrono::Duration::days(i);
            engine.process(&make_game(i, date, 2, 3, 7, 0)).unwrap();
        }
        engine
    }

    #[test]
    fn test_upset_fixture_is_lopsided() {
        let base = upset_engine();
        assert_eq!(base.current_rating(TeamId(1)), 1500.0);
        assert!(base.current_rating(TeamId(2)) > 1500.0 + 150.0);
    }

    #[test]
    fn test_upset_margin_sensitivity() {
        let base = upset_engine();
        let date = day(2024, 1, 10);
        assert!(base.current_rating(TeamId(2)) > base.current_rating(TeamId(1)) + 150.0);

        let mut one_goal = base.clone();
        let narrow = one_goal.process(&make_game(100, date, 1, 2, 3, 2)).unwrap();
        let mut five_goal = base.clone();
        let wide = five_goal.process(&make_game(100, date, 1, 2, 6, 1)).unwrap();

        assert!(narrow.home_delta() > 0.0);
        assert_eq!(narrow.home_delta(), -narrow.away_delta());
        assert_eq!(wide.home_delta(), -wide.away_delta());
        assert!(wide.home_delta() > narrow.home_delta());
    }

    #[test]
    fn test_gap_dampening_favourite_win() {
        let base = upset_engine();
        let date = day(2024, 1, 10);

        // Favourite winning on the road moves ratings less than the upset
        let mut favourite = base.clone();
        let expected_win = favourite.process(&make_game(100, date, 1, 2, 2, 3)).unwrap();
        let mut underdog = base.clone();
        let upset = underdog.process(&make_game(100, date, 1, 2, 3, 2)).unwrap();
        assert!(expected_win.delta.abs() < upset.delta.abs());
    }

    #[test]
    fn test_carryover_applied_once_per_season() {
        let mut engine = RatingEngine::new(no_home_edge()).unwrap();
        engine.process(&make_game(1, day(2023, 3, 1), 1, 2, 5, 0)).unwrap();
        let end_of_season = engine.current_rating(TeamId(1));

        let first = engine.process(&make_game(2, day(2023, 10, 10), 1, 3, 2, 2)).unwrap();
        let second = engine.process(&make_game(3, day(2023, 10, 12), 1, 4, 2, 2)).unwrap();

        assert!(first.home_carryover);
        assert!(!second.home_carryover);
        let pulled = 1500.0 + 0.5 * (end_of_season - 1500.0);
        assert!((first.home_pre - pulled).abs() < 1e-9);
        // Drawn games move nothing, so a second pull would show up here
        assert!((second.home_pre - pulled).abs() < 1e-9);

        let pulls = engine
            .updates()
            .iter()
            .filter(|u| (u.home == TeamId(1) && u.home_carryover) || (u.away == TeamId(1) && u.away_carryover))
            .count();
        assert_eq!(pulls, 1);
    }

    #[test]
    fn test_pre_game_rating_matches_fold() {
        let games = vec![
            make_game(1, day(2023, 3, 1), 1, 2, 5, 0),
            make_game(2, day(2023, 3, 5), 2, 1, 3, 2),
            make_game(3, day(2023, 10, 10), 1, 2, 1, 4),
            make_game(4, day(2023, 10, 15), 2, 1, 2, 3),
        ];
        let engine = RatingEngine::replay(RatingConfig::default(), games.clone()).unwrap();

        for (game, update) in games.iter().zip(engine.updates()) {
            let cutoff = GameKey::start_of_day(game.date);
            assert_eq!(engine.pre_game_rating(game.home_team, game.season, cutoff), update.home_pre);
            assert_eq!(engine.pre_game_rating(game.away_team, game.season, cutoff), update.away_pre);
        }
    }

    #[test]
    fn test_out_of_order_game_is_causality_violation() {
        let mut engine = RatingEngine::default();
        engine.process(&make_game(2, day(2023, 10, 12), 1, 2, 3, 1)).unwrap();
        let err = engine.process(&make_game(1, day(2023, 10, 10), 3, 4, 3, 1)).unwrap_err();
        assert!(matches!(err, HockeyError::CausalityViolation { .. }));
        // Replaying the same game is rejected too
        assert!(engine.process(&make_game(2, day(2023, 10, 12), 1, 2, 3, 1)).is_err());
    }

    #[test]
    fn test_dynamic_home_advantage() {
        let config = RatingConfig {
            home_advantage: HomeAdvantage::Dynamic {
                window: 4,
                scale: 1.0,
                min: 0.0,
                max: 100.0,
                fallback: 30.0,
            },
            ..Default::default()
        };
        let mut engine = RatingEngine::new(config).unwrap();
        let cutoff = GameKey::start_of_day(day(2023, 11, 1));
        assert_eq!(engine.home_advantage(cutoff), 30.0);

        // Home sides win every game: implied edge saturates at the cap
        for i in 0..4 {
            engine
                .process(&make_game(i, day(2023, 10, 1 + i as u32), 1 + i, 10 + i, 3, 1))
                .unwrap();
        }
        assert_eq!(engine.home_advantage(cutoff), 100.0);
        // Before those games were played the fallback still applies
        assert_eq!(engine.home_advantage(GameKey::start_of_day(day(2023, 10, 4))), 30.0);
    }

    #[test]
    fn test_dynamic_home_advantage_floor() {
        let config = RatingConfig {
            home_advantage: HomeAdvantage::Dynamic {
                window: 2,
                scale: 1.0,
                min: -20.0,
                max: 100.0,
                fallback: 30.0,
            },
            ..Default::default()
        };
        let mut engine = RatingEngine::new(config).unwrap();
        engine.process(&make_game(1, day(2023, 10, 1), 1, 2, 1, 3)).unwrap();
        engine.process(&make_game(2, day(2023, 10, 2), 3, 4, 0, 2)).unwrap();
        assert_eq!(engine.home_advantage(GameKey::start_of_day(day(2023, 10, 3))), -20.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(RatingConfig::default().validate().is_ok());
        let negative_k = RatingConfig {
            k_factor: -1.0,
            ..Default::default()
        };
        assert!(RatingEngine::new(negative_k).is_err());
        let bad_carryover = RatingConfig {
            carryover: 1.5,
            ..Default::default()
        };
        assert!(bad_carryover.validate().is_err());
        let inverted = RatingConfig {
            home_advantage: HomeAdvantage::Dynamic {
                window: 10,
                scale: 1.0,
                min: 50.0,
                max: 10.0,
                fallback: 30.0,
            },
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }
}
