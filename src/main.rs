//! Hockey feature pipeline CLI
//!
//! Imports game records, builds leakage-free training matrices and serves
//! live feature rows for upcoming games.

use clap::{Parser, Subcommand};
use hockey::{Config, Result};

#[derive(Parser)]
#[command(name = "hockey")]
#[command(about = "Point-in-time feature pipeline for hockey match prediction", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Build the training matrix
    Dataset {
        /// Only emit rows for these seasons (e.g. 20232024)
        #[arg(long)]
        season: Vec<u32>,
        /// First game date to emit (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Last game date to emit (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Feature row for an upcoming game
    Features {
        /// Home team name, abbreviation or id
        home: String,
        /// Away team name, abbreviation or id
        away: String,
        /// Game date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Check that training rows and live rows agree
    Audit {
        /// Allowed absolute difference per feature
        #[arg(long, default_value = "0")]
        tolerance: f64,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import teams and team-game records from JSON files
    Import {
        /// JSON array of teams
        #[arg(long)]
        teams: Option<String>,
        /// JSON array of team-game records (two per game)
        #[arg(long)]
        games: Option<String>,
    },
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Import { teams, games } => commands::data_import(&config, teams, games),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Dataset {
            season,
            from,
            to,
            format,
        } => commands::dataset(&config, season, from, to, format),
        Commands::Features {
            home,
            away,
            date,
            format,
        } => commands::features(&config, &home, &away, date, format),
        Commands::Audit { tolerance } => commands::audit(&config, tolerance),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use chrono::NaiveDate;
    use hockey::data::database::{read_records_json, read_teams_json};
    use hockey::data::{DatasetAssembler, DatasetFilter, Database};
    use hockey::features::RatingEngine;
    use hockey::predict::ParityAudit;
    use hockey::{HockeyError, SeasonId, TeamId};

    fn parse_date(s: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| HockeyError::Parse(format!("invalid date '{}': {}", s, e)))
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        println!("Created data/ directory");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'hockey data import --teams teams.json --games games.json'");
        println!("  3. Run 'hockey dataset --format csv > train.csv' to build training rows");
        println!("  4. Run 'hockey features \"BOS\" \"TOR\"' for an upcoming game");

        Ok(())
    }

    pub fn data_import(
        config: &Config,
        teams: Option<String>,
        games: Option<String>,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;

        if teams.is_none() && games.is_none() {
            println!("Nothing to import. Pass --teams and/or --games.");
            return Ok(());
        }

        if let Some(path) = teams {
            let teams = read_teams_json(&path)?;
            let count = db.upsert_teams(&teams)?;
            println!("Stored {} teams from {}", count, path);
        }

        if let Some(path) = games {
            let records = read_records_json(&path)?;
            // Reject unpaired or inconsistent games before anything is written
            let store = hockey::data::GameStore::from_records(records.clone())?;
            let count = db.upsert_records(&records)?;
            println!(
                "Stored {} team-records ({} games) from {}",
                count,
                store.game_count(),
                path
            );
        }

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.database_path);
        println!("  Teams:    {}", stats.team_count);
        println!("  Games:    {}", stats.game_count);
        println!("  Records:  {}", stats.record_count);
        println!("  Seasons:  {}", stats.season_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_game, stats.latest_game) {
            println!("  Range:    {} to {}", earliest, latest);
        }

        if stats.game_count > 0 {
            let store = db.load_store()?;
            let directory = db.load_directory()?;
            let engine = RatingEngine::replay(config.rating.clone(), store.games())?;

            let mut ratings = engine.ratings();
            ratings.sort_by(|a, b| b.1.total_cmp(&a.1));
            println!("\nCurrent Ratings");
            println!("───────────────────────────────");
            for (rank, (team, rating)) in ratings.iter().enumerate() {
                let name = directory
                    .get(*team)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| team.to_string());
                println!("  {:>3}. {:<28} {:>7.1}", rank + 1, name, rating);
            }
        }

        Ok(())
    }

    pub fn dataset(
        config: &Config,
        season: Vec<u32>,
        from: Option<String>,
        to: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let store = db.load_store()?;
        let directory = db.load_directory()?;
        let assembler = DatasetAssembler::new(&store, &directory, config)?;

        let filter = DatasetFilter {
            seasons: (!season.is_empty()).then(|| season.into_iter().map(SeasonId).collect()),
            start: from.as_deref().map(parse_date).transpose()?,
            end: to.as_deref().map(parse_date).transpose()?,
        };
        let set = assembler.build(&filter)?;

        match format {
            OutputFormat::Table => {
                println!("Training Set");
                println!("───────────────────────────────");
                println!("  Rows:           {}", set.len());
                println!("  Features:       {}", set.schema().len());
                println!("  Home win rate:  {:.3}", set.home_win_rate());
                if let (Some(first), Some(last)) = (set.keys().first(), set.keys().last()) {
                    println!("  Range:          {} to {}", first.date, last.date);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&set.to_json())?);
            }
            OutputFormat::Csv => {
                println!("date,game_id,{},home_win", set.schema().names().join(","));
                for ((row, key), label) in set.rows().iter().zip(set.keys()).zip(set.labels()) {
                    let values: Vec<String> = row.values().iter().map(|v| v.to_string()).collect();
                    println!("{},{},{},{}", key.date, key.game_id.0, values.join(","), label);
                }
            }
        }

        Ok(())
    }

    pub fn features(
        config: &Config,
        home: &str,
        away: &str,
        date: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let directory = db.load_directory()?;

        let home = directory.resolve(home)?;
        let away = directory.resolve(away)?;
        let date = match date {
            Some(d) => parse_date(&d)?,
            None => chrono::Local::now().date_naive(),
        };
        let store = db.load_store_before(date)?;

        let assembler = DatasetAssembler::new(&store, &directory, config)?;
        let vector = assembler.build_live_features(home, away, date)?;

        let name = |team: TeamId| {
            directory
                .get(team)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| team.to_string())
        };

        match format {
            OutputFormat::Table => {
                println!(
                    "{} vs {} on {} (season {})",
                    name(home),
                    name(away),
                    date,
                    vector.matchup.season
                );
                println!("───────────────────────────────");
                for (feature, value) in vector.iter() {
                    println!("  {:<36} {:>10.4}", feature, value);
                }
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "home": name(home),
                    "away": name(away),
                    "date": date,
                    "season": vector.matchup.season,
                    "features": vector,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Csv => {
                println!("feature,value");
                for (feature, value) in vector.iter() {
                    println!("{},{}", feature, value);
                }
            }
        }

        Ok(())
    }

    pub fn audit(config: &Config, tolerance: f64) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let store = db.load_store()?;
        let directory = db.load_directory()?;

        let assembler = DatasetAssembler::new(&store, &directory, config)?;
        let set = assembler.build(&DatasetFilter::all())?;
        let live = assembler.live()?;
        let report = ParityAudit::new(&live).with_tolerance(tolerance).run(&set);

        println!("Parity Audit");
        println!("───────────────────────────────");
        println!("  Rows checked:  {}", report.rows_checked);
        println!("  Mismatches:    {}", report.mismatches.len());
        for feature in report.features() {
            println!("    {}", feature);
        }
        for m in report.mismatches.iter().take(10) {
            println!(
                "  {} {}: training {:.6} live {:.6}",
                m.game.date, m.feature, m.training, m.live
            );
        }

        if report.is_clean() {
            Ok(())
        } else {
            Err(HockeyError::ParityMismatch(report.features().len()))
        }
    }
}
