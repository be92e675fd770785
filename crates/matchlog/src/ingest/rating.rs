//! Per-match player rating
//!
//! A match performance score compares each per-round rate with a baseline:
//! `score = Σ wᵢ · (rateᵢ / baselineᵢ) / Σ wᵢ`, so an average match scores 1.0.
//! The rating then moves by `k_factor · (score - 1)` and never drops below 0.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::context::MatchTally;

#[derive(Debug, Error, PartialEq)]
pub enum RatingError {
    #[error("{0} must be finite and non-negative")]
    Negative(&'static str),

    #[error("weights must not all be zero")]
    NoWeight,
}

/// Relative importance of each performance component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingWeights {
    pub kills: f64,
    pub survival: f64,
    pub damage: f64,
    pub assists: f64,
    pub headshots: f64,
    pub clutches: f64,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            kills: 0.35,
            survival: 0.20,
            damage: 0.25,
            assists: 0.10,
            headshots: 0.05,
            clutches: 0.05,
        }
    }
}

/// Per-round rates an average player reaches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingBaselines {
    pub kills_per_round: f64,
    pub survival_rate: f64,
    pub assists_per_round: f64,
    pub damage_per_round: f64,
    pub headshots_per_round: f64,
    pub clutches_per_round: f64,
}

impl Default for RatingBaselines {
    fn default() -> Self {
        Self {
            kills_per_round: 0.70,
            survival_rate: 0.32,
            assists_per_round: 0.15,
            damage_per_round: 80.0,
            headshots_per_round: 0.21,
            clutches_per_round: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Rating given to a player on their first archived match
    pub initial_rating: f64,
    pub k_factor: f64,
    pub weights: RatingWeights,
    pub baselines: RatingBaselines,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1000.0,
            k_factor: 25.0,
            weights: RatingWeights::default(),
            baselines: RatingBaselines::default(),
        }
    }
}

impl RatingConfig {
    pub fn validate(&self) -> Result<(), RatingError> {
        let w = &self.weights;
        let b = &self.baselines;
        let fields = [
            ("initial_rating", self.initial_rating),
            ("k_factor", self.k_factor),
            ("weights.kills", w.kills),
            ("weights.survival", w.survival),
            ("weights.damage", w.damage),
            ("weights.assists", w.assists),
            ("weights.headshots", w.headshots),
            ("weights.clutches", w.clutches),
            ("baselines.kills_per_round", b.kills_per_round),
            ("baselines.survival_rate", b.survival_rate),
            ("baselines.assists_per_round", b.assists_per_round),
            ("baselines.damage_per_round", b.damage_per_round),
            ("baselines.headshots_per_round", b.headshots_per_round),
            ("baselines.clutches_per_round", b.clutches_per_round),
        ];

        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(RatingError::Negative(name));
            }
        }

        if self.total_weight() == 0.0 {
            return Err(RatingError::NoWeight);
        }
        Ok(())
    }

    fn total_weight(&self) -> f64 {
        let w = &self.weights;
        w.kills + w.survival + w.damage + w.assists + w.headshots + w.clutches
    }
}

fn relative(rate: f64, baseline: f64) -> f64 {
    if baseline > 0.0 {
        rate / baseline
    } else {
        0.0
    }
}

/// Weighted match performance, 1.0 being an average match
///
/// Returns `None` when the player played no rounds.
pub fn performance(tally: &MatchTally, config: &RatingConfig) -> Option<f64> {
    if tally.rounds_played == 0 {
        return None;
    }

    let rounds = f64::from(tally.rounds_played);
    let survived = f64::from(tally.rounds_played.saturating_sub(tally.deaths));

    let w = &config.weights;
    let b = &config.baselines;
    let weighted = w.kills * relative(f64::from(tally.kills) / rounds, b.kills_per_round)
        + w.survival * relative(survived / rounds, b.survival_rate)
        + w.damage * relative(tally.damage_dealt as f64 / rounds, b.damage_per_round)
        + w.assists * relative(f64::from(tally.assists) / rounds, b.assists_per_round)
        + w.headshots * relative(f64::from(tally.headshot_kills) / rounds, b.headshots_per_round)
        + w.clutches * relative(f64::from(tally.clutches_won) / rounds, b.clutches_per_round);

    let total = config.total_weight();
    (total > 0.0).then(|| weighted / total)
}

/// Rating after one match
pub fn rate(previous: f64, tally: &MatchTally, config: &RatingConfig) -> f64 {
    match performance(tally, config) {
        Some(score) => (previous + config.k_factor * (score - 1.0)).max(0.0),
        None => previous,
    }
}
