#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use hockey::features::venue::{GeoPoint, TeamDirectory};
use hockey::{AdvancedStats, GameId, GameResult, SeasonId, TeamId, TeamInfo};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const TEAMS: i64 = 8;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_game(id: i64, date: NaiveDate, home: i64, away: i64, hg: u16, ag: u16) -> GameResult {
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

/// Random but reproducible league: game nights every other day from October
/// to March for each listed season, a random subset of teams playing each
/// night, sometimes two games on the same night.
pub fn make_league(seed: u64, seasons: &[i32]) -> Vec<GameResult> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut games = Vec::new();
    let mut next_id = 1000;

    for &year in seasons {
        let mut night = date(year, 10, 5);
        let end = date(year + 1, 3, 31);
        while night <= end {
            let mut teams: Vec<i64> = (1..=TEAMS).collect();
            teams.shuffle(&mut rng);
            let pairs = rng.gen_range(1..=TEAMS as usize / 2);
            for pair in teams.chunks(2).take(pairs) {
                let home_goals: u16 = rng.gen_range(0..=6);
                let away_goals: u16 = rng.gen_range(0..=6);
                let corsi_for = rng.gen_range(35.0..75.0);
                let corsi_against = rng.gen_range(35.0..75.0);
                let reported_save = rng.gen_bool(0.5).then(|| rng.gen_range(0.85..0.97));
                games.push(GameResult {
                    game_id: GameId(next_id),
                    season: SeasonId::starting(year),
                    date: night,
                    home_team: TeamId(pair[0]),
                    away_team: TeamId(pair[1]),
                    home_goals,
                    away_goals,
                    home_shots: rng.gen_range(20..=42),
                    away_shots: rng.gen_range(20..=42),
                    home_advanced: AdvancedStats {
                        xg_for: rng.gen_range(1.0..4.5),
                        xg_against: rng.gen_range(1.0..4.5),
                        high_danger_for: rng.gen_range(4.0..16.0),
                        high_danger_against: rng.gen_range(4.0..16.0),
                        corsi_for,
                        corsi_against,
                        save_pct: reported_save,
                    },
                });
                next_id += 1;
            }
            night += Duration::days(2);
        }
    }
    games
}

pub fn make_directory() -> TeamDirectory {
    let arenas = [
        (42.37, -71.06),
        (43.64, -79.38),
        (40.75, -73.99),
        (45.50, -73.57),
        (41.88, -87.67),
        (39.75, -104.99),
        (49.28, -123.11),
        (34.04, -118.27),
    ];
    TeamDirectory::from_teams(arenas.iter().enumerate().map(|(i, &(lat, lon))| TeamInfo {
        id: TeamId(i as i64 + 1),
        name: format!("Team {}", i + 1),
        abbreviation: Some(format!("T{}", i + 1)),
        conference: Some(if i < 4 { "East" } else { "West" }.to_string()),
        division: Some(format!("Division {}", i / 2)),
        arena: Some(GeoPoint::new(lat, lon)),
    }))
}
