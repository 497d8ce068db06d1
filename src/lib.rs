//! Hockey match prediction features
//!
//! Turns an ordered log of completed team-games into point-in-time-correct
//! matchup features: rolling team form, Elo-style ratings and scheduling
//! context, assembled chronologically so no game ever sees its own result.

pub mod data;
pub mod features;
pub mod predict;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::features::elo::RatingConfig;
use crate::features::registry::FeaturePolicyConfig;
use crate::features::rolling::RollingConfig;
use crate::features::schedule::ScheduleConfig;
use crate::features::venue::GeoPoint;

/// Unique identifier for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Unique identifier for a game, shared by both team-records of that game
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub i64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Game({})", self.0)
    }
}

/// Season identifier in the `20232024` form (start year followed by end year)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeasonId(pub u32);

impl SeasonId {
    /// Season starting in the given calendar year
    pub fn starting(year: i32) -> Self {
        SeasonId((year as u32) * 10_000 + (year as u32 + 1))
    }

    /// Resolve the season a date belongs to.
    ///
    /// Dates in or after `start_month` belong to the season starting that
    /// year; earlier dates belong to the season that started the year before.
    pub fn for_date(date: NaiveDate, start_month: u32) -> Self {
        if date.month() >= start_month {
            Self::starting(date.year())
        } else {
            Self::starting(date.year() - 1)
        }
    }
}

impl fmt::Display for SeasonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Total chronological order over games: date first, then game id.
///
/// Every as-of query in the crate is expressed as a `GameKey` cutoff and
/// reads strictly-smaller keys only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameKey {
    pub date: NaiveDate,
    pub game_id: GameId,
}

impl GameKey {
    pub fn new(date: NaiveDate, game_id: GameId) -> Self {
        GameKey { date, game_id }
    }

    /// Cutoff that sorts before every game played on `date`
    pub fn start_of_day(date: NaiveDate) -> Self {
        GameKey {
            date,
            game_id: GameId(i64::MIN),
        }
    }
}

/// Which side of a matchup a team is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Home,
    Away,
}

impl Venue {
    pub fn flip(self) -> Venue {
        match self {
            Venue::Home => Venue::Away,
            Venue::Away => Venue::Home,
        }
    }

    pub fn is_home(self) -> bool {
        self == Venue::Home
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Home => write!(f, "home"),
            Venue::Away => write!(f, "away"),
        }
    }
}

/// Advanced per-game quantities, from one team's perspective
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedStats {
    /// Expected goals for
    pub xg_for: f64,
    /// Expected goals against
    pub xg_against: f64,
    /// High-danger shot attempts for
    pub high_danger_for: f64,
    /// High-danger shot attempts against
    pub high_danger_against: f64,
    /// All shot attempts for (Corsi)
    pub corsi_for: f64,
    /// All shot attempts against (Corsi)
    pub corsi_against: f64,
    /// Save percentage when reported directly by the source
    pub save_pct: Option<f64>,
}

impl AdvancedStats {
    /// The same game seen from the opponent's side.
    ///
    /// A reported save percentage belongs to this team's goaltending and is
    /// not carried over.
    pub fn mirrored(&self) -> AdvancedStats {
        AdvancedStats {
            xg_for: self.xg_against,
            xg_against: self.xg_for,
            high_danger_for: self.high_danger_against,
            high_danger_against: self.high_danger_for,
            corsi_for: self.corsi_against,
            corsi_against: self.corsi_for,
            save_pct: None,
        }
    }
}

/// One team's view of one completed game. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub season: SeasonId,
    pub date: NaiveDate,
    pub team: TeamId,
    pub opponent: TeamId,
    pub is_home: bool,
    pub goals_for: u16,
    pub goals_against: u16,
    pub shots_for: u16,
    pub shots_against: u16,
    #[serde(default)]
    pub advanced: AdvancedStats,
}

impl GameRecord {
    /// True when this team scored more goals (shootout winners are credited
    /// the deciding goal by every supported source)
    pub fn won(&self) -> bool {
        self.goals_for > self.goals_against
    }

    pub fn key(&self) -> GameKey {
        GameKey::new(self.date, self.game_id)
    }

    pub fn venue(&self) -> Venue {
        if self.is_home {
            Venue::Home
        } else {
            Venue::Away
        }
    }

    /// Goal differential (positive = win)
    pub fn goal_diff(&self) -> i32 {
        self.goals_for as i32 - self.goals_against as i32
    }

    /// Save percentage, derived from shots when not reported directly
    pub fn save_pct(&self) -> Option<f64> {
        self.advanced.save_pct.or_else(|| {
            if self.shots_against == 0 {
                None
            } else {
                Some(1.0 - self.goals_against as f64 / self.shots_against as f64)
            }
        })
    }

    /// Check the mirror invariant against the other record of the same game
    pub fn check_mirror(&self, other: &GameRecord) -> std::result::Result<(), String> {
        if self.game_id != other.game_id {
            return Err(format!("game ids differ ({} vs {})", self.game_id, other.game_id));
        }
        if self.team != other.opponent || self.opponent != other.team {
            return Err("team/opponent are not mirror images".to_string());
        }
        if self.goals_for != other.goals_against || self.goals_against != other.goals_for {
            return Err("goals for/against are not swapped".to_string());
        }
        if self.shots_for != other.shots_against || self.shots_against != other.shots_for {
            return Err("shots for/against are not swapped".to_string());
        }
        if self.is_home == other.is_home {
            return Err("both records claim the same venue".to_string());
        }
        if self.date != other.date || self.season != other.season {
            return Err("date or season differ".to_string());
        }
        Ok(())
    }
}

/// A completed game seen from the home side, one row per game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub game_id: GameId,
    pub season: SeasonId,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_goals: u16,
    pub away_goals: u16,
    pub home_shots: u16,
    pub away_shots: u16,
    /// Advanced stats from the home team's perspective
    #[serde(default)]
    pub home_advanced: AdvancedStats,
}

impl GameResult {
    pub fn key(&self) -> GameKey {
        GameKey::new(self.date, self.game_id)
    }

    pub fn home_won(&self) -> bool {
        self.home_goals > self.away_goals
    }

    /// Goal margin (positive = home win)
    pub fn margin(&self) -> i32 {
        self.home_goals as i32 - self.away_goals as i32
    }

    /// Returns the winning team, or None when goals are level
    pub fn winner(&self) -> Option<TeamId> {
        match self.home_goals.cmp(&self.away_goals) {
            std::cmp::Ordering::Greater => Some(self.home_team),
            std::cmp::Ordering::Less => Some(self.away_team),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Split into the mirrored pair of team-records `[home, away]`
    pub fn to_records(&self) -> [GameRecord; 2] {
        let home = GameRecord {
            game_id: self.game_id,
            season: self.season,
            date: self.date,
            team: self.home_team,
            opponent: self.away_team,
            is_home: true,
            goals_for: self.home_goals,
            goals_against: self.away_goals,
            shots_for: self.home_shots,
            shots_against: self.away_shots,
            advanced: self.home_advanced,
        };
        let away = GameRecord {
            game_id: self.game_id,
            season: self.season,
            date: self.date,
            team: self.away_team,
            opponent: self.home_team,
            is_home: false,
            goals_for: self.away_goals,
            goals_against: self.home_goals,
            shots_for: self.away_shots,
            shots_against: self.home_shots,
            advanced: self.home_advanced.mirrored(),
        };
        [home, away]
    }

    /// Rebuild a game row from its validated home record
    pub fn from_home_record(home: &GameRecord) -> Self {
        GameResult {
            game_id: home.game_id,
            season: home.season,
            date: home.date,
            home_team: home.team,
            away_team: home.opponent,
            home_goals: home.goals_for,
            away_goals: home.goals_against,
            home_shots: home.shots_for,
            away_shots: home.shots_against,
            home_advanced: home.advanced,
        }
    }
}

/// A team and the static facts the scheduling features need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub conference: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub arena: Option<GeoPoint>,
}

impl TeamInfo {
    pub fn matches_name(&self, name: &str) -> bool {
        let name_lower = name.to_lowercase();
        self.name.to_lowercase() == name_lower
            || self
                .abbreviation
                .as_deref()
                .is_some_and(|a| a.to_lowercase() == name_lower)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HockeyError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Records for {game_id} are not mirror images: {reason}")]
    MirrorMismatch { game_id: GameId, reason: String },

    #[error("{0} has {1} team-records, expected 2")]
    UnpairedGame(GameId, usize),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Causality violation: {game:?} processed after {last:?}")]
    CausalityViolation { game: GameKey, last: GameKey },

    #[error("Training and live features disagree on {0} columns")]
    ParityMismatch(usize),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, HockeyError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rolling: RollingConfig,
    pub rating: RatingConfig,
    pub features: FeaturePolicyConfig,
    pub schedule: ScheduleConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/hockey.db".to_string(),
        }
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HockeyError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| HockeyError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HockeyError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject unsupported settings before any game is processed
    pub fn validate(&self) -> Result<()> {
        self.rolling.validate()?;
        self.rating.validate()?;
        self.schedule.validate()?;
        Ok(())
    }
}
