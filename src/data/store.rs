//! In-memory store of completed team-games
//!
//! The store is the sole owner of historical truth. Everything else in the
//! crate is a derived view over it.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::{GameId, GameKey, GameRecord, GameResult, HockeyError, Result, SeasonId, TeamId};

/// Ordered, validated collection of team-game records (two per game)
#[derive(Debug, Clone, Default)]
pub struct GameStore {
    /// All records sorted by (date, game id), home record first
    records: Vec<GameRecord>,
    /// Index of each game's home record, in chronological order
    games: Vec<usize>,
    /// Record indices per team, chronological, across all seasons
    by_team: HashMap<TeamId, Vec<usize>>,
    /// Record indices per (team, season), chronological
    by_team_season: HashMap<(TeamId, SeasonId), Vec<usize>>,
    /// Seasons each team appears in, ascending
    team_seasons: HashMap<TeamId, Vec<SeasonId>>,
}

impl GameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from team-records, validating that every game has
    /// exactly two mirrored records
    pub fn from_records(records: Vec<GameRecord>) -> Result<Self> {
        let mut by_game: BTreeMap<GameId, Vec<GameRecord>> = BTreeMap::new();
        for record in records {
            by_game.entry(record.game_id).or_default().push(record);
        }

        let mut ordered = Vec::with_capacity(by_game.len() * 2);
        for (game_id, mut pair) in by_game {
            if pair.len() != 2 {
                return Err(HockeyError::UnpairedGame(game_id, pair.len()));
            }
            pair[0]
                .check_mirror(&pair[1])
                .map_err(|reason| HockeyError::MirrorMismatch { game_id, reason })?;
            if !pair[0].is_home {
                pair.swap(0, 1);
            }
            ordered.extend(pair);
        }

        // Stable sort keeps each home record directly ahead of its away record
        ordered.sort_by_key(|r| r.key());

        let mut store = GameStore {
            records: ordered,
            ..Default::default()
        };
        store.index();
        log::debug!(
            "Indexed {} games across {} teams",
            store.games.len(),
            store.by_team.len()
        );
        Ok(store)
    }

    /// Build a store from one-row-per-game results
    pub fn from_results(results: &[GameResult]) -> Result<Self> {
        let records = results.iter().flat_map(|r| r.to_records()).collect();
        Self::from_records(records)
    }

    /// Append newly completed games, revalidating and reindexing
    pub fn extend(&mut self, records: Vec<GameRecord>) -> Result<()> {
        let mut all = self.records.clone();
        all.extend(records);
        *self = Self::from_records(all)?;
        Ok(())
    }

    fn from_records_unchecked(records: Vec<GameRecord>) -> Self {
        let mut store = GameStore {
            records,
            ..Default::default()
        };
        store.index();
        store
    }

    fn index(&mut self) {
        self.games.clear();
        self.by_team.clear();
        self.by_team_season.clear();
        self.team_seasons.clear();

        for (idx, record) in self.records.iter().enumerate() {
            if record.is_home {
                self.games.push(idx);
            }
            self.by_team.entry(record.team).or_default().push(idx);
            self.by_team_season
                .entry((record.team, record.season))
                .or_default()
                .push(idx);
            let seasons = self.team_seasons.entry(record.team).or_default();
            if !seasons.contains(&record.season) {
                seasons.push(record.season);
            }
        }

        for seasons in self.team_seasons.values_mut() {
            seasons.sort();
        }
    }

    /// Number of team-records (two per game)
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of games
    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn records(&self) -> &[GameRecord] {
        &self.records
    }

    /// Home records of every game, chronological
    pub fn home_records(&self) -> impl Iterator<Item = &GameRecord> + '_ {
        self.games.iter().map(move |&idx| &self.records[idx])
    }

    /// Every game as a home-perspective result, chronological
    pub fn games(&self) -> impl Iterator<Item = GameResult> + '_ {
        self.home_records().map(GameResult::from_home_record)
    }

    /// All seasons present, ascending
    pub fn seasons(&self) -> Vec<SeasonId> {
        let mut seasons: Vec<SeasonId> = self.records.iter().map(|r| r.season).collect();
        seasons.sort();
        seasons.dedup();
        seasons
    }

    /// All teams present, ascending by id
    pub fn teams(&self) -> Vec<TeamId> {
        let mut teams: Vec<TeamId> = self.by_team.keys().copied().collect();
        teams.sort();
        teams
    }

    pub fn earliest_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// Season timeline for one team. Unknown teams get an empty timeline.
    pub fn timeline(&self, team: TeamId, season: SeasonId) -> TeamTimeline<'_> {
        let indices = self
            .by_team_season
            .get(&(team, season))
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        TeamTimeline {
            store: self,
            team,
            season,
            indices,
        }
    }

    /// The season a team played immediately before `season`, if any
    pub fn previous_season(&self, team: TeamId, season: SeasonId) -> Option<SeasonId> {
        self.team_seasons
            .get(&team)?
            .iter()
            .rev()
            .find(|s| **s < season)
            .copied()
    }

    /// All of a team's games strictly before the cutoff, any season,
    /// most recent first
    pub fn team_games_before(
        &self,
        team: TeamId,
        cutoff: GameKey,
    ) -> impl Iterator<Item = &GameRecord> + '_ {
        let indices = self.by_team.get(&team).map(|v| v.as_slice()).unwrap_or(&[]);
        let end = indices.partition_point(|&i| self.records[i].key() < cutoff);
        indices[..end].iter().rev().map(move |&i| &self.records[i])
    }

    /// A copy holding only games played strictly before `date`
    pub fn truncated_before(&self, date: NaiveDate) -> GameStore {
        let records = self
            .records
            .iter()
            .filter(|r| r.date < date)
            .cloned()
            .collect();
        Self::from_records_unchecked(records)
    }
}

/// One team's games within one season, in chronological order.
///
/// A borrowed view into the store; the previous season is reachable through
/// [`TeamTimeline::previous`].
#[derive(Debug, Clone, Copy)]
pub struct TeamTimeline<'a> {
    store: &'a GameStore,
    team: TeamId,
    season: SeasonId,
    indices: &'a [usize],
}

impl<'a> TeamTimeline<'a> {
    pub fn team(&self) -> TeamId {
        self.team
    }

    pub fn season(&self) -> SeasonId {
        self.season
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'a GameRecord> + 'a {
        let records: &'a [GameRecord] = &self.store.records;
        let indices: &'a [usize] = self.indices;
        indices.iter().map(move |&i| &records[i])
    }

    /// Games strictly before the cutoff, chronological
    pub fn before(&self, cutoff: GameKey) -> impl DoubleEndedIterator<Item = &'a GameRecord> + 'a {
        let records: &'a [GameRecord] = &self.store.records;
        let indices: &'a [usize] = self.indices;
        let end = indices.partition_point(|&i| records[i].key() < cutoff);
        indices[..end].iter().map(move |&i| &records[i])
    }

    /// Number of games strictly before the cutoff
    pub fn count_before(&self, cutoff: GameKey) -> usize {
        let records = &self.store.records;
        self.indices.partition_point(|&i| records[i].key() < cutoff)
    }

    /// Timeline of the season this team played before this one
    pub fn previous(&self) -> Option<TeamTimeline<'a>> {
        let season = self.store.previous_season(self.team, self.season)?;
        Some(self.store.timeline(self.team, season))
    }
}
