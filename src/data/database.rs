//! SQLite database management for teams and team-game records

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::data::store::GameStore;
use crate::features::venue::{GeoPoint, TeamDirectory};
use crate::{AdvancedStats, GameId, GameRecord, GameResult, Result, SeasonId, TeamId, TeamInfo};

const DATE_FORMAT: &str = "%Y-%m-%d";

const RECORD_COLUMNS: &str = "game_id, season, date, team_id, opponent_id, is_home,
    goals_for, goals_against, shots_for, shots_against,
    xg_for, xg_against, high_danger_for, high_danger_against,
    corsi_for, corsi_against, save_pct";

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                abbreviation TEXT,
                conference TEXT,
                division TEXT,
                latitude REAL,
                longitude REAL
            );

            CREATE TABLE IF NOT EXISTS team_games (
                game_id INTEGER NOT NULL,
                season INTEGER NOT NULL,
                date TEXT NOT NULL,
                team_id INTEGER NOT NULL,
                opponent_id INTEGER NOT NULL,
                is_home INTEGER NOT NULL,
                goals_for INTEGER NOT NULL,
                goals_against INTEGER NOT NULL,
                shots_for INTEGER NOT NULL,
                shots_against INTEGER NOT NULL,
                xg_for REAL NOT NULL DEFAULT 0,
                xg_against REAL NOT NULL DEFAULT 0,
                high_danger_for REAL NOT NULL DEFAULT 0,
                high_danger_against REAL NOT NULL DEFAULT 0,
                corsi_for REAL NOT NULL DEFAULT 0,
                corsi_against REAL NOT NULL DEFAULT 0,
                save_pct REAL,
                PRIMARY KEY (game_id, team_id)
            );

            CREATE INDEX IF NOT EXISTS idx_team_games_date ON team_games(date);
            CREATE INDEX IF NOT EXISTS idx_team_games_team ON team_games(team_id, season);
            "#,
        )?;
        Ok(())
    }

    // ==================== Team Operations ====================

    /// Insert or replace a team
    pub fn upsert_team(&self, team: &TeamInfo) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO teams (id, name, abbreviation, conference, division, latitude, longitude)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                abbreviation = COALESCE(excluded.abbreviation, abbreviation),
                conference = COALESCE(excluded.conference, conference),
                division = COALESCE(excluded.division, division),
                latitude = COALESCE(excluded.latitude, latitude),
                longitude = COALESCE(excluded.longitude, longitude)
            "#,
            params![
                team.id.0,
                team.name,
                team.abbreviation,
                team.conference,
                team.division,
                team.arena.map(|a| a.latitude),
                team.arena.map(|a| a.longitude),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_teams(&self, teams: &[TeamInfo]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for team in teams {
            self.upsert_team(team)?;
        }
        tx.commit()?;
        Ok(teams.len())
    }

    /// Get team by ID
    pub fn get_team(&self, id: TeamId) -> Result<Option<TeamInfo>> {
        let team = self
            .conn
            .query_row(
                "SELECT id, name, abbreviation, conference, division, latitude, longitude
                 FROM teams WHERE id = ?1",
                params![id.0],
                Self::row_to_team,
            )
            .optional()?;
        Ok(team)
    }

    /// Get all teams
    pub fn get_all_teams(&self) -> Result<Vec<TeamInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, abbreviation, conference, division, latitude, longitude
             FROM teams ORDER BY id",
        )?;
        let teams = stmt
            .query_map([], Self::row_to_team)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(teams)
    }

    pub fn load_directory(&self) -> Result<TeamDirectory> {
        Ok(TeamDirectory::from_teams(self.get_all_teams()?))
    }

    fn row_to_team(row: &rusqlite::Row) -> rusqlite::Result<TeamInfo> {
        let latitude: Option<f64> = row.get(5)?;
        let longitude: Option<f64> = row.get(6)?;
        Ok(TeamInfo {
            id: TeamId(row.get(0)?),
            name: row.get(1)?,
            abbreviation: row.get(2)?,
            conference: row.get(3)?,
            division: row.get(4)?,
            arena: latitude.zip(longitude).map(|(lat, lon)| GeoPoint::new(lat, lon)),
        })
    }

    // ==================== Game Operations ====================

    /// Insert or update one team-game record
    pub fn upsert_record(&self, record: &GameRecord) -> Result<()> {
        let adv = &record.advanced;
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO team_games ({}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                RECORD_COLUMNS
            ),
            params![
                record.game_id.0,
                record.season.0,
                record.date.format(DATE_FORMAT).to_string(),
                record.team.0,
                record.opponent.0,
                record.is_home,
                record.goals_for,
                record.goals_against,
                record.shots_for,
                record.shots_against,
                adv.xg_for,
                adv.xg_against,
                adv.high_danger_for,
                adv.high_danger_against,
                adv.corsi_for,
                adv.corsi_against,
                adv.save_pct,
            ],
        )?;
        Ok(())
    }

    /// Insert many records in one transaction
    pub fn upsert_records(&self, records: &[GameRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for record in records {
            self.upsert_record(record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Store both team-records of each game
    pub fn upsert_results(&self, results: &[GameResult]) -> Result<usize> {
        let records: Vec<GameRecord> = results.iter().flat_map(|r| r.to_records()).collect();
        self.upsert_records(&records)?;
        Ok(results.len())
    }

    /// Get all records in chronological order
    pub fn get_all_records(&self) -> Result<Vec<GameRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM team_games ORDER BY date, game_id, is_home DESC",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Get records of games played strictly before a date
    pub fn get_records_before(&self, date: NaiveDate) -> Result<Vec<GameRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM team_games WHERE date < ?1 ORDER BY date, game_id, is_home DESC",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Load every record into a validated store
    pub fn load_store(&self) -> Result<GameStore> {
        let store = GameStore::from_records(self.get_all_records()?)?;
        log::info!(
            "Loaded {} games ({} team-records) from database",
            store.game_count(),
            store.len()
        );
        Ok(store)
    }

    /// Load only games played before `date`, e.g. for a live row on that date
    pub fn load_store_before(&self, date: NaiveDate) -> Result<GameStore> {
        let store = GameStore::from_records(self.get_records_before(date)?)?;
        log::debug!("Loaded {} games before {}", store.game_count(), date);
        Ok(store)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<GameRecord> {
        let date_str: String = row.get(2)?;
        let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

        Ok(GameRecord {
            game_id: GameId(row.get(0)?),
            season: SeasonId(row.get(1)?),
            date,
            team: TeamId(row.get(3)?),
            opponent: TeamId(row.get(4)?),
            is_home: row.get(5)?,
            goals_for: row.get(6)?,
            goals_against: row.get(7)?,
            shots_for: row.get(8)?,
            shots_against: row.get(9)?,
            advanced: AdvancedStats {
                xg_for: row.get(10)?,
                xg_against: row.get(11)?,
                high_danger_for: row.get(12)?,
                high_danger_against: row.get(13)?,
                corsi_for: row.get(14)?,
                corsi_against: row.get(15)?,
                save_pct: row.get(16)?,
            },
        })
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let team_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))?;

        let record_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM team_games", [], |row| row.get(0))?;

        let game_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT game_id) FROM team_games",
            [],
            |row| row.get(0),
        )?;

        let season_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT season) FROM team_games",
            [],
            |row| row.get(0),
        )?;

        let min_date: Option<String> = self
            .conn
            .query_row("SELECT MIN(date) FROM team_games", [], |row| row.get(0))
            .optional()?
            .flatten();

        let max_date: Option<String> = self
            .conn
            .query_row("SELECT MAX(date) FROM team_games", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            team_count: team_count as usize,
            game_count: game_count as usize,
            record_count: record_count as usize,
            season_count: season_count as usize,
            earliest_game: min_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            latest_game: max_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub game_count: usize,
    pub record_count: usize,
    pub season_count: usize,
    pub earliest_game: Option<NaiveDate>,
    pub latest_game: Option<NaiveDate>,
}

// ==================== JSON Import ====================

/// Read a JSON array of teams
pub fn read_teams_json<P: AsRef<Path>>(path: P) -> Result<Vec<TeamInfo>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Read a JSON array of team-game records
pub fn read_records_json<P: AsRef<Path>>(path: P) -> Result<Vec<GameRecord>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
