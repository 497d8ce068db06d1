//! Rolling team form
//!
//! Windowed, season-to-date and momentum-weighted aggregates of a team's
//! games played strictly before an as-of date.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::store::GameStore;
use crate::{GameKey, GameRecord, HockeyError, Result, SeasonId, TeamId, Venue};

/// Longest supported window (one full regular season)
pub const MAX_WINDOW: usize = 82;

/// Base per-game quantity tracked by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    WinPct,
    GoalDiff,
    GoalsFor,
    GoalsAgainst,
    ShotsFor,
    ShotsAgainst,
    ExpectedGoalsFor,
    ExpectedGoalsAgainst,
    HighDangerFor,
    HighDangerAgainst,
    CorsiPct,
    SavePct,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::WinPct,
        Metric::GoalDiff,
        Metric::GoalsFor,
        Metric::GoalsAgainst,
        Metric::ShotsFor,
        Metric::ShotsAgainst,
        Metric::ExpectedGoalsFor,
        Metric::ExpectedGoalsAgainst,
        Metric::HighDangerFor,
        Metric::HighDangerAgainst,
        Metric::CorsiPct,
        Metric::SavePct,
    ];

    /// Stable snake_case name used in feature columns
    pub fn name(&self) -> &'static str {
        match self {
            Metric::WinPct => "win_pct",
            Metric::GoalDiff => "goal_diff",
            Metric::GoalsFor => "goals_for",
            Metric::GoalsAgainst => "goals_against",
            Metric::ShotsFor => "shots_for",
            Metric::ShotsAgainst => "shots_against",
            Metric::ExpectedGoalsFor => "xg_for",
            Metric::ExpectedGoalsAgainst => "xg_against",
            Metric::HighDangerFor => "high_danger_for",
            Metric::HighDangerAgainst => "high_danger_against",
            Metric::CorsiPct => "corsi_pct",
            Metric::SavePct => "save_pct",
        }
    }

    /// Value for one game, or None when the source did not report it.
    ///
    /// Advanced quantities whose for/against pair is all zero are treated as
    /// unreported.
    pub fn value(&self, record: &GameRecord) -> Option<f64> {
        let adv = &record.advanced;
        match self {
            Metric::WinPct => Some(match record.goals_for.cmp(&record.goals_against) {
                std::cmp::Ordering::Greater => 1.0,
                std::cmp::Ordering::Equal => 0.5,
                std::cmp::Ordering::Less => 0.0,
            }),
            Metric::GoalDiff => Some(record.goal_diff() as f64),
            Metric::GoalsFor => Some(record.goals_for as f64),
            Metric::GoalsAgainst => Some(record.goals_against as f64),
            Metric::ShotsFor => Some(record.shots_for as f64),
            Metric::ShotsAgainst => Some(record.shots_against as f64),
            Metric::ExpectedGoalsFor => reported(adv.xg_for, adv.xg_against, adv.xg_for),
            Metric::ExpectedGoalsAgainst => reported(adv.xg_for, adv.xg_against, adv.xg_against),
            Metric::HighDangerFor => reported(
                adv.high_danger_for,
                adv.high_danger_against,
                adv.high_danger_for,
            ),
            Metric::HighDangerAgainst => reported(
                adv.high_danger_for,
                adv.high_danger_against,
                adv.high_danger_against,
            ),
            Metric::CorsiPct => {
                let total = adv.corsi_for + adv.corsi_against;
                (total > 0.0).then(|| adv.corsi_for / total)
            }
            Metric::SavePct => record.save_pct(),
        }
    }

    /// League-average stand-in used when a team has no qualifying history
    pub fn neutral(&self) -> f64 {
        match self {
            Metric::WinPct => 0.5,
            Metric::GoalDiff => 0.0,
            Metric::GoalsFor | Metric::GoalsAgainst => 3.0,
            Metric::ShotsFor | Metric::ShotsAgainst => 30.0,
            Metric::ExpectedGoalsFor | Metric::ExpectedGoalsAgainst => 2.8,
            Metric::HighDangerFor | Metric::HighDangerAgainst => 10.0,
            Metric::CorsiPct => 0.5,
            Metric::SavePct => 0.900,
        }
    }
}

fn reported(a: f64, b: f64, value: f64) -> Option<f64> {
    (a != 0.0 || b != 0.0).then_some(value)
}

/// Which of a team's games a rolling statistic pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenuePolicy {
    /// Every game regardless of venue
    #[default]
    AnyVenue,
    /// Only games at the venue the team occupies in the matchup being built
    MatchingVenue,
}

impl VenuePolicy {
    /// Resolve the venue filter for the side being queried
    pub fn filter(self, side: Venue) -> Option<Venue> {
        match self {
            VenuePolicy::AnyVenue => None,
            VenuePolicy::MatchingVenue => Some(side),
        }
    }
}

/// Rolling aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingConfig {
    /// Trailing window sizes in games
    pub windows: Vec<usize>,
    /// Momentum weights, most recent game first
    pub momentum_weights: Vec<f64>,
    /// Fewer prior games than this yields the neutral snapshot
    pub min_history: usize,
    /// Let windows and momentum reach into the previous season
    pub cross_season_windows: bool,
    /// Metrics to aggregate
    pub metrics: Vec<Metric>,
}

impl Default for RollingConfig {
    fn default() -> Self {
        RollingConfig {
            windows: vec![3, 5, 10],
            momentum_weights: vec![0.4, 0.3, 0.2, 0.1],
            min_history: 0,
            cross_season_windows: false,
            metrics: Metric::ALL.to_vec(),
        }
    }
}

impl RollingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.windows.is_empty() {
            return Err(HockeyError::Config("at least one rolling window is required".into()));
        }
        for (i, &w) in self.windows.iter().enumerate() {
            if w == 0 || w > MAX_WINDOW {
                return Err(HockeyError::Config(format!(
                    "unsupported window size {} (expected 1..={})",
                    w, MAX_WINDOW
                )));
            }
            if self.windows[..i].contains(&w) {
                return Err(HockeyError::Config(format!("duplicate window size {}", w)));
            }
        }
        if self.momentum_weights.is_empty() {
            return Err(HockeyError::Config("momentum weights must not be empty".into()));
        }
        if self
            .momentum_weights
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(HockeyError::Config(
                "momentum weights must be finite and non-negative".into(),
            ));
        }
        if self.metrics.is_empty() {
            return Err(HockeyError::Config("no rolling metrics selected".into()));
        }
        Ok(())
    }

    fn depth(&self) -> usize {
        let widest = self.windows.iter().copied().max().unwrap_or(0);
        widest.max(self.momentum_weights.len())
    }
}

/// A team's form as of a date. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingWindowSnapshot {
    pub team: TeamId,
    pub as_of: NaiveDate,
    pub season: SeasonId,
    /// Venue filter applied, None = any venue
    pub venue: Option<Venue>,
    /// Qualifying games this season before the as-of date
    pub season_games: usize,
    /// Games available to the trailing windows
    pub window_games: usize,
    windowed: BTreeMap<Metric, BTreeMap<usize, f64>>,
    season_to_date: BTreeMap<Metric, f64>,
    momentum: BTreeMap<Metric, f64>,
}

impl RollingWindowSnapshot {
    /// True when no qualifying history contributed to this snapshot
    pub fn is_cold_start(&self) -> bool {
        self.window_games == 0
    }

    /// Trailing-window average; neutral for untracked metrics or windows
    pub fn window(&self, metric: Metric, size: usize) -> f64 {
        self.windowed
            .get(&metric)
            .and_then(|w| w.get(&size))
            .copied()
            .unwrap_or_else(|| metric.neutral())
    }

    pub fn season_to_date(&self, metric: Metric) -> f64 {
        self.season_to_date
            .get(&metric)
            .copied()
            .unwrap_or_else(|| metric.neutral())
    }

    /// Recency-weighted sum; zero when nothing contributed
    pub fn momentum(&self, metric: Metric) -> f64 {
        self.momentum.get(&metric).copied().unwrap_or(0.0)
    }

    /// Window table for one metric (window size -> value)
    pub fn windows(&self, metric: Metric) -> Option<&BTreeMap<usize, f64>> {
        self.windowed.get(&metric)
    }
}

/// Computes rolling snapshots from a frozen store
#[derive(Debug, Clone, Copy)]
pub struct TemporalAggregator<'a> {
    store: &'a GameStore,
    config: &'a RollingConfig,
}

impl<'a> TemporalAggregator<'a> {
    pub fn new(store: &'a GameStore, config: &'a RollingConfig) -> Self {
        TemporalAggregator { store, config }
    }

    pub fn config(&self) -> &RollingConfig {
        self.config
    }

    /// Snapshot under a side-awareness policy for the given matchup side
    pub fn snapshot_for(
        &self,
        team: TeamId,
        as_of: NaiveDate,
        season: SeasonId,
        policy: VenuePolicy,
        side: Venue,
    ) -> RollingWindowSnapshot {
        self.snapshot(team, as_of, season, policy.filter(side))
    }

    /// Snapshot from games strictly before `as_of`, optionally restricted to
    /// one venue
    pub fn snapshot(
        &self,
        team: TeamId,
        as_of: NaiveDate,
        season: SeasonId,
        venue: Option<Venue>,
    ) -> RollingWindowSnapshot {
        let cutoff = GameKey::start_of_day(as_of);
        let matches_venue = |r: &&GameRecord| venue.map_or(true, |v| r.venue() == v);

        let timeline = self.store.timeline(team, season);
        let season_games: Vec<&GameRecord> =
            timeline.before(cutoff).filter(matches_venue).collect();

        // Most recent first, deep enough for the widest window and momentum
        let depth = self.config.depth();
        let mut recent: Vec<&GameRecord> =
            season_games.iter().rev().take(depth).copied().collect();
        if self.config.cross_season_windows {
            let mut previous = timeline.previous();
            while recent.len() < depth {
                let Some(prev) = previous else { break };
                let needed = depth - recent.len();
                recent.extend(prev.before(cutoff).rev().filter(matches_venue).take(needed));
                previous = prev.previous();
            }
        }

        if recent.len() < self.config.min_history.max(1) {
            return self.neutral(team, as_of, season, venue, season_games.len());
        }

        let mut windowed = BTreeMap::new();
        let mut season_to_date = BTreeMap::new();
        let mut momentum = BTreeMap::new();

        for &metric in &self.config.metrics {
            let table: BTreeMap<usize, f64> = self
                .config
                .windows
                .iter()
                .map(|&w| (w, mean_or_neutral(metric, recent.iter().take(w).copied())))
                .collect();
            windowed.insert(metric, table);
            season_to_date.insert(metric, mean_or_neutral(metric, season_games.iter().copied()));
            momentum.insert(metric, weighted(metric, &recent, &self.config.momentum_weights));
        }

        RollingWindowSnapshot {
            team,
            as_of,
            season,
            venue,
            season_games: season_games.len(),
            window_games: recent.len(),
            windowed,
            season_to_date,
            momentum,
        }
    }

    /// Cold-start snapshot: neutral levels, zero momentum
    fn neutral(
        &self,
        team: TeamId,
        as_of: NaiveDate,
        season: SeasonId,
        venue: Option<Venue>,
        season_games: usize,
    ) -> RollingWindowSnapshot {
        let windowed = self
            .config
            .metrics
            .iter()
            .map(|&m| {
                let table = self.config.windows.iter().map(|&w| (w, m.neutral())).collect();
                (m, table)
            })
            .collect();
        let season_to_date = self.config.metrics.iter().map(|&m| (m, m.neutral())).collect();
        let momentum = self.config.metrics.iter().map(|&m| (m, 0.0)).collect();

        RollingWindowSnapshot {
            team,
            as_of,
            season,
            venue,
            season_games,
            window_games: 0,
            windowed,
            season_to_date,
            momentum,
        }
    }
}

/// Plain mean over games that report the metric
fn mean_or_neutral<'r>(metric: Metric, games: impl Iterator<Item = &'r GameRecord>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for value in games.filter_map(|g| metric.value(g)) {
        sum += value;
        n += 1;
    }
    if n == 0 {
        metric.neutral()
    } else {
        sum / n as f64
    }
}

/// Recency-weighted sum; missing games and unreported values contribute zero
fn weighted(metric: Metric, recent: &[&GameRecord], weights: &[f64]) -> f64 {
    weights
        .iter()
        .zip(recent.iter())
        .map(|(w, g)| w * metric.value(g).unwrap_or(0.0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdvancedStats, GameId, GameResult};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

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
            away_shots: 25,
            home_advanced: AdvancedStats::default(),
        }
    }

    fn season() -> SeasonId {
        SeasonId(20232024)
    }

    #[test]
    fn test_three_straight_wins() {
        let store = GameStore::from_results(&[
            make_game(1, day(2023, 10, 10), 1, 2, 4, 2),
            make_game(2, day(2023, 10, 12), 3, 1, 1, 3),
            make_game(3, day(2023, 10, 14), 1, 4, 5, 3),
        ])
        .unwrap();
        let config = RollingConfig::default();
        let agg = TemporalAggregator::new(&store, &config);

        let snap = agg.snapshot(TeamId(1), day(2023, 10, 20), season(), None);
        assert_eq!(snap.window(Metric::WinPct, 3), 1.0);
        assert_eq!(snap.window(Metric::GoalDiff, 3), 2.0);
        assert_eq!(snap.season_to_date(Metric::WinPct), 1.0);
        assert_eq!(snap.season_games, 3);
        assert!(!snap.is_cold_start());
    }

    #[test]
    fn test_window_larger_than_history_averages_available() {
        let store = GameStore::from_results(&[
            make_game(1, day(2023, 10, 10), 1, 2, 4, 2),
            make_game(2, day(2023, 10, 12), 1, 3, 1, 3),
        ])
        .unwrap();
        let config = RollingConfig::default();
        let agg = TemporalAggregator::new(&store, &config);

        let snap = agg.snapshot(TeamId(1), day(2023, 10, 20), season(), None);
        // Two games, one win: 10-game window averages the two that exist
        assert_eq!(snap.window(Metric::WinPct, 10), 0.5);
        assert_eq!(snap.window(Metric::GoalsFor, 10), 2.5);
    }

    #[test]
    fn test_same_day_games_excluded() {
        let store = GameStore::from_results(&[
            make_game(1, day(2023, 10, 10), 1, 2, 4, 2),
            make_game(2, day(2023, 10, 12), 1, 3, 0, 3),
        ])
        .unwrap();
        let config = RollingConfig::default();
        let agg = TemporalAggregator::new(&store, &config);

        let snap = agg.snapshot(TeamId(1), day(2023, 10, 12), season(), None);
        assert_eq!(snap.window_games, 1);
        assert_eq!(snap.window(Metric::WinPct, 3), 1.0);
    }

    #[test]
    fn test_cold_start_is_neutral_and_repeatable() {
        let store = GameStore::new();
        let config = RollingConfig::default();
        let agg = TemporalAggregator::new(&store, &config);

        let first = agg.snapshot(TeamId(9), day(2023, 10, 20), season(), None);
        let second = agg.snapshot(TeamId(9), day(2023, 10, 20), season(), None);
        assert_eq!(first, second);
        assert!(first.is_cold_start());
        assert_eq!(first.window(Metric::WinPct, 3), 0.5);
        assert_eq!(first.season_to_date(Metric::SavePct), 0.900);
        assert_eq!(first.momentum(Metric::WinPct), 0.0);
    }

    #[test]
    fn test_season_to_date_resets() {
        let store = GameStore::from_results(&[
            make_game(1, day(2023, 3, 10), 1, 2, 0, 2),
            make_game(2, day(2023, 10, 12), 1, 3, 3, 1),
        ])
        .unwrap();
        let config = RollingConfig::default();
        let agg = TemporalAggregator::new(&store, &config);

        let snap = agg.snapshot(TeamId(1), day(2023, 10, 20), season(), None);
        assert_eq!(snap.season_games, 1);
        assert_eq!(snap.season_to_date(Metric::WinPct), 1.0);
        assert_eq!(snap.window(Metric::WinPct, 5), 1.0);
    }

    #[test]
    fn test_cross_season_windows_follow_previous_timeline() {
        let store = GameStore::from_results(&[
            make_game(1, day(2023, 3, 10), 1, 2, 0, 2),
            make_game(2, day(2023, 10, 12), 1, 3, 3, 1),
        ])
        .unwrap();
        let config = RollingConfig {
            cross_season_windows: true,
            ..Default::default()
        };
        let agg = TemporalAggregator::new(&store, &config);

        let snap = agg.snapshot(TeamId(1), day(2023, 10, 20), season(), None);
        assert_eq!(snap.window_games, 2);
        assert_eq!(snap.window(Metric::WinPct, 5), 0.5);
        // Season-to-date never crosses the boundary
        assert_eq!(snap.season_to_date(Metric::WinPct), 1.0);
    }

    #[test]
    fn test_momentum_weights_and_zero_padding() {
        let store = GameStore::from_results(&[
            make_game(1, day(2023, 10, 10), 1, 2, 1, 2),
            make_game(2, day(2023, 10, 12), 1, 3, 3, 1),
        ])
        .unwrap();
        let config = RollingConfig::default();
        let agg = TemporalAggregator::new(&store, &config);

        let snap = agg.snapshot(TeamId(1), day(2023, 10, 20), season(), None);
        // Most recent (win) weighted 0.4, older loss 0.3, two missing games pad with zero
        assert!((snap.momentum(Metric::WinPct) - 0.4).abs() < 1e-12);
        assert!((snap.momentum(Metric::GoalDiff) - (0.4 * 2.0 + 0.3 * -1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_venue_filter() {
        let store = GameStore::from_results(&[
            make_game(1, day(2023, 10, 10), 1, 2, 5, 2),
            make_game(2, day(2023, 10, 12), 3, 1, 4, 1),
        ])
        .unwrap();
        let config = RollingConfig::default();
        let agg = TemporalAggregator::new(&store, &config);
        let as_of = day(2023, 10, 20);

        let any = agg.snapshot_for(TeamId(1), as_of, season(), VenuePolicy::AnyVenue, Venue::Home);
        let home = agg.snapshot_for(TeamId(1), as_of, season(), VenuePolicy::MatchingVenue, Venue::Home);
        let away = agg.snapshot_for(TeamId(1), as_of, season(), VenuePolicy::MatchingVenue, Venue::Away);

        assert_eq!(any.window(Metric::WinPct, 3), 0.5);
        assert_eq!(home.window(Metric::WinPct, 3), 1.0);
        assert_eq!(away.window(Metric::WinPct, 3), 0.0);
        assert_eq!(home.venue, Some(Venue::Home));
    }

    #[test]
    fn test_min_history_substitutes_neutral() {
        let store = GameStore::from_results(&[
            make_game(1, day(2023, 10, 10), 1, 2, 5, 2),
            make_game(2, day(2023, 10, 12), 1, 3, 4, 1),
        ])
        .unwrap();
        let config = RollingConfig {
            min_history: 3,
            ..Default::default()
        };
        let agg = TemporalAggregator::new(&store, &config);

        let snap = agg.snapshot(TeamId(1), day(2023, 10, 20), season(), None);
        assert!(snap.is_cold_start());
        assert_eq!(snap.season_games, 2);
        assert_eq!(snap.window(Metric::WinPct, 3), 0.5);
    }

    #[test]
    fn test_unreported_advanced_stats_fall_back() {
        let store = GameStore::from_results(&[make_game(1, day(2023, 10, 10), 1, 2, 5, 2)]).unwrap();
        let config = RollingConfig::default();
        let agg = TemporalAggregator::new(&store, &config);

        let snap = agg.snapshot(TeamId(1), day(2023, 10, 20), season(), None);
        assert_eq!(snap.window(Metric::ExpectedGoalsFor, 3), Metric::ExpectedGoalsFor.neutral());
        assert_eq!(snap.window(Metric::CorsiPct, 3), 0.5);
        // Save pct derives from shots: 25 against, 2 allowed
        assert!((snap.window(Metric::SavePct, 3) - 0.92).abs() < 1e-12);
    }

    #[test]
    fn test_config_validation() {
        assert!(RollingConfig::default().validate().is_ok());

        let bad_window = RollingConfig {
            windows: vec![3, 0],
            ..Default::default()
        };
        assert!(bad_window.validate().is_err());

        let too_wide = RollingConfig {
            windows: vec![MAX_WINDOW + 1],
            ..Default::default()
        };
        assert!(too_wide.validate().is_err());

        let duplicate = RollingConfig {
            windows: vec![5, 5],
            ..Default::default()
        };
        assert!(duplicate.validate().is_err());

        let negative_weight = RollingConfig {
            momentum_weights: vec![0.5, -0.1],
            ..Default::default()
        };
        assert!(negative_weight.validate().is_err());
    }
}
