//! Training/serving parity audit
//!
//! Rebuilds every training row through the live path and reports each
//! feature whose two values disagree.

use rayon::prelude::*;
use serde::Serialize;

use crate::data::dataset::TrainingSet;
use crate::predict::live::LivePredictor;
use crate::GameKey;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParityMismatch {
    pub game: GameKey,
    pub feature: String,
    pub training: f64,
    pub live: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParityReport {
    pub rows_checked: usize,
    pub mismatches: Vec<ParityMismatch>,
}

impl ParityReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Distinct feature names that disagreed at least once
    pub fn features(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.mismatches.iter().map(|m| m.feature.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Compares training rows against the live path
pub struct ParityAudit<'p, 'a> {
    live: &'p LivePredictor<'a>,
    tolerance: f64,
}

impl<'p, 'a> ParityAudit<'p, 'a> {
    /// Exact comparison
    pub fn new(live: &'p LivePredictor<'a>) -> Self {
        ParityAudit {
            live,
            tolerance: 0.0,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn run(&self, set: &TrainingSet) -> ParityReport {
        let mismatches: Vec<ParityMismatch> = set
            .rows()
            .par_iter()
            .zip(set.keys().par_iter())
            .flat_map_iter(|(row, &game)| {
                let live = self.live.build_matchup(&row.matchup);
                row.iter()
                    .zip(live.values())
                    .filter(|&((_, training), &live)| differs(training, live, self.tolerance))
                    .map(|((name, training), &live)| ParityMismatch {
                        game,
                        feature: name.to_string(),
                        training,
                        live,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        if mismatches.is_empty() {
            log::info!("Parity audit clean over {} rows", set.len());
        } else {
            log::warn!(
                "Parity audit found {} mismatching values over {} rows",
                mismatches.len(),
                set.len()
            );
        }

        ParityReport {
            rows_checked: set.len(),
            mismatches,
        }
    }
}

fn differs(a: f64, b: f64, tolerance: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() != b.is_nan();
    }
    (a - b).abs() > tolerance
}
