//! Arena geography and team directory
//!
//! Static per-team facts used by the scheduling features: division for the
//! divisional flag and arena coordinates for travel distance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{HockeyError, Result, TeamId, TeamInfo};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance (haversine)
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

/// Lookup of team metadata by id
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    teams: HashMap<TeamId, TeamInfo>,
}

impl TeamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_teams(teams: impl IntoIterator<Item = TeamInfo>) -> Self {
        TeamDirectory {
            teams: teams.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn insert(&mut self, team: TeamInfo) {
        self.teams.insert(team.id, team);
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn get(&self, team: TeamId) -> Option<&TeamInfo> {
        self.teams.get(&team)
    }

    /// Home arena of a team, if known
    pub fn arena(&self, team: TeamId) -> Option<GeoPoint> {
        self.teams.get(&team).and_then(|t| t.arena)
    }

    /// True only when both teams have a known and equal division
    pub fn same_division(&self, a: TeamId, b: TeamId) -> bool {
        let division = |t: TeamId| self.teams.get(&t).and_then(|i| i.division.as_deref());
        match (division(a), division(b)) {
            (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
            _ => false,
        }
    }

    /// Distance between two teams' arenas; None when either is unknown
    pub fn arena_distance_km(&self, from: TeamId, to: TeamId) -> Option<f64> {
        Some(self.arena(from)?.distance_km(&self.arena(to)?))
    }

    /// Resolve a team by full name or abbreviation, case-insensitive
    pub fn find_by_name(&self, name: &str) -> Option<&TeamInfo> {
        self.teams.values().find(|t| t.matches_name(name))
    }

    /// Resolve a CLI-style team reference: numeric id or name
    pub fn resolve(&self, reference: &str) -> Result<TeamId> {
        if let Ok(id) = reference.parse::<i64>() {
            return Ok(TeamId(id));
        }
        self.find_by_name(reference)
            .map(|t| t.id)
            .ok_or_else(|| HockeyError::UnknownTeam(reference.to_string()))
    }

    /// All teams sorted by id
    pub fn teams(&self) -> Vec<&TeamInfo> {
        let mut teams: Vec<&TeamInfo> = self.teams.values().collect();
        teams.sort_by_key(|t| t.id);
        teams
    }
}
