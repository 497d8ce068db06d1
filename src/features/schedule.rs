//! Scheduling context features
//!
//! Rest, back-to-backs, short-window game density, travel and divisional
//! flag. These come straight from the schedule, not from rolling form, and
//! only look at games played before the matchup date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::store::GameStore;
use crate::features::venue::TeamDirectory;
use crate::{GameKey, GameRecord, HockeyError, Result, TeamId};

/// Calendar settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// First month of a new season (9 = September)
    pub season_start_month: u32,
    /// Rest is capped here; a team with no previous game gets the cap
    pub max_rest_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            season_start_month: 9,
            max_rest_days: 7,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.season_start_month) {
            return Err(HockeyError::Config(format!(
                "season start month must be 1..=12, got {}",
                self.season_start_month
            )));
        }
        if self.max_rest_days == 0 {
            return Err(HockeyError::Config("max rest days must be positive".into()));
        }
        Ok(())
    }
}

/// Schedule facts for one side of a matchup
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SideSchedule {
    /// Full days off since the previous game (0 = back-to-back), capped
    pub rest_days: u32,
    pub back_to_back: bool,
    /// Games in the 3 days before the matchup
    pub games_last_3d: u32,
    /// Games in the 6 days before the matchup
    pub games_last_6d: u32,
    /// Arena-to-arena distance from the previous game's venue
    pub travel_km: f64,
    /// First game after 4 or more days off
    pub rested_4plus: bool,
}

/// Schedule context for a whole matchup
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduleContext {
    pub home: SideSchedule,
    pub away: SideSchedule,
    pub same_division: bool,
}

impl ScheduleContext {
    pub const DIM: usize = 15;

    pub const NAMES: [&'static str; Self::DIM] = [
        "home_rest_days",
        "away_rest_days",
        "rest_days_diff",
        "home_back_to_back",
        "away_back_to_back",
        "home_games_last_3d",
        "away_games_last_3d",
        "home_games_last_6d",
        "away_games_last_6d",
        "home_travel_km",
        "away_travel_km",
        "travel_km_diff",
        "same_division",
        "home_rested_4plus",
        "away_rested_4plus",
    ];

    /// Values in `NAMES` order
    pub fn to_vec(&self) -> Vec<f64> {
        let (h, a) = (&self.home, &self.away);
        vec![
            h.rest_days as f64,
            a.rest_days as f64,
            h.rest_days as f64 - a.rest_days as f64,
            flag(h.back_to_back),
            flag(a.back_to_back),
            h.games_last_3d as f64,
            a.games_last_3d as f64,
            h.games_last_6d as f64,
            a.games_last_6d as f64,
            h.travel_km,
            a.travel_km,
            h.travel_km - a.travel_km,
            flag(self.same_division),
            flag(h.rested_4plus),
            flag(a.rested_4plus),
        ]
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Computes schedule context from a frozen store
#[derive(Debug, Clone, Copy)]
pub struct ScheduleComputer<'a> {
    store: &'a GameStore,
    directory: &'a TeamDirectory,
    config: &'a ScheduleConfig,
}

impl<'a> ScheduleComputer<'a> {
    pub fn new(
        store: &'a GameStore,
        directory: &'a TeamDirectory,
        config: &'a ScheduleConfig,
    ) -> Self {
        ScheduleComputer {
            store,
            directory,
            config,
        }
    }

    /// Context for `home` hosting `away` on `date`
    pub fn compute(&self, home: TeamId, away: TeamId, date: NaiveDate) -> ScheduleContext {
        ScheduleContext {
            home: self.side(home, home, date),
            away: self.side(away, home, date),
            same_division: self.directory.same_division(home, away),
        }
    }

    /// One side's schedule. Both sides go through here with the same host.
    pub fn side(&self, team: TeamId, host: TeamId, date: NaiveDate) -> SideSchedule {
        let cutoff = GameKey::start_of_day(date);
        let max_rest = self.config.max_rest_days;

        let mut games_last_3d = 0;
        let mut games_last_6d = 0;
        let mut previous: Option<&GameRecord> = None;
        for record in self.store.team_games_before(team, cutoff) {
            if previous.is_none() {
                previous = Some(record);
            }
            let days = (date - record.date).num_days();
            if days > 6 {
                break;
            }
            if days <= 3 {
                games_last_3d += 1;
            }
            games_last_6d += 1;
        }

        let Some(previous) = previous else {
            return SideSchedule {
                rest_days: max_rest,
                back_to_back: false,
                games_last_3d: 0,
                games_last_6d: 0,
                travel_km: 0.0,
                rested_4plus: max_rest >= 4,
            };
        };

        let days_off = ((date - previous.date).num_days() - 1).max(0) as u32;
        let rest_days = days_off.min(max_rest);
        let previous_host = if previous.is_home {
            previous.team
        } else {
            previous.opponent
        };
        let travel_km = self
            .directory
            .arena_distance_km(previous_host, host)
            .unwrap_or(0.0);

        SideSchedule {
            rest_days,
            back_to_back: days_off == 0,
            games_last_3d,
            games_last_6d,
            travel_km,
            rested_4plus: days_off >= 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::venue::GeoPoint;
    use crate::{AdvancedStats, GameId, GameResult, SeasonId, TeamInfo};

    fn make_game(id: i64, date: NaiveDate, home: i64, away: i64) -> GameResult {
        GameResult {
            game_id: GameId(id),
            season: SeasonId::for_date(date, 9),
            date,
            home_team: TeamId(home),
            away_team: TeamId(away),
            home_goals: 3,
            away_goals: 2,
            home_shots: 30,
            away_shots: 30,
            home_advanced: AdvancedStats::default(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 10, d).unwrap()
    }

    fn make_team(id: i64, division: &str, lat: f64, lon: f64) -> TeamInfo {
        TeamInfo {
            id: TeamId(id),
            name: format!("Team {}", id),
            abbreviation: None,
            conference: None,
            division: Some(division.to_string()),
            arena: Some(GeoPoint::new(lat, lon)),
        }
    }

    fn make_directory() -> TeamDirectory {
        TeamDirectory::from_teams(vec![
            make_team(1, "Atlantic", 42.37, -71.06),
            make_team(2, "Atlantic", 43.64, -79.38),
            make_team(3, "Pacific", 49.28, -123.11),
        ])
    }

    #[test]
    fn test_no_previous_game() {
        let store = GameStore::new();
        let dir = make_directory();
        let config = ScheduleConfig::default();
        let ctx = ScheduleComputer::new(&store, &dir, &config).compute(TeamId(1), TeamId(2), day(10));

        assert_eq!(ctx.home.rest_days, 7);
        assert!(!ctx.home.back_to_back);
        assert_eq!(ctx.home.travel_km, 0.0);
        assert!(ctx.same_division);
        assert_eq!(ctx.to_vec().len(), ScheduleContext::DIM);
    }

    #[test]
    fn test_back_to_back_and_density() {
        // Team 1 plays on the 5th, 7th and 9th, then hosts on the 10th
        let store = GameStore::from_results(&[
            make_game(1, day(5), 1, 3),
            make_game(2, day(7), 1, 3),
            make_game(3, day(9), 2, 1),
        ])
        .unwrap();
        let dir = make_directory();
        let config = ScheduleConfig::default();
        let computer = ScheduleComputer::new(&store, &dir, &config);
        let ctx = computer.compute(TeamId(1), TeamId(3), day(10));

        assert_eq!(ctx.home.rest_days, 0);
        assert!(ctx.home.back_to_back);
        assert_eq!(ctx.home.games_last_3d, 2);
        assert_eq!(ctx.home.games_last_6d, 3);
        // Travelled home from Toronto
        assert!(ctx.home.travel_km > 600.0);
        assert!(!ctx.same_division);

        // Team 3 last played on the 7th in Boston and stays there
        assert_eq!(ctx.away.rest_days, 2);
        assert_eq!(ctx.away.travel_km, 0.0);
    }

    #[test]
    fn test_same_day_games_ignored() {
        let store = GameStore::from_results(&[make_game(1, day(10), 1, 2)]).unwrap();
        let dir = make_directory();
        let config = ScheduleConfig::default();
        let side = ScheduleComputer::new(&store, &dir, &config).side(TeamId(1), TeamId(1), day(10));
        assert_eq!(side.games_last_3d, 0);
        assert_eq!(side.rest_days, 7);
    }

    #[test]
    fn test_long_rest_capped() {
        let store = GameStore::from_results(&[make_game(1, day(1), 1, 2)]).unwrap();
        let dir = make_directory();
        let config = ScheduleConfig::default();
        let side = ScheduleComputer::new(&store, &dir, &config).side(TeamId(1), TeamId(1), day(20));
        assert_eq!(side.rest_days, 7);
        assert!(side.rested_4plus);
        assert_eq!(side.games_last_6d, 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(ScheduleConfig::default().validate().is_ok());
        let bad = ScheduleConfig {
            season_start_month: 13,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
