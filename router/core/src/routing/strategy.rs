//! Strategy Builder
//!
//! Turns raw model evaluation results into a `SelectionPolicy`.
//!
//! Each model's mean latency, similarity and cost are min-max normalized
//! across models and blended into four scores:
//!
//! | Score                 | Blend                              |
//! |-----------------------|------------------------------------|
//! | `performance_score`   | 0.8 latency + 0.2 similarity       |
//! | `accuracy_score`      | 0.2 latency + 0.8 similarity       |
//! | `overall_score`       | 0.5 latency + 0.5 similarity       |
//! | `cost_score_weighted` | 0.7 cost + 0.3 similarity          |
//!
//! The best overall model becomes the primary, the rest become fallbacks in
//! overall order, and each score's winner is mapped to a use case.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::policy::{ModelScore, SelectionPolicy};

/// Use case mapped to the best `performance_score`
pub const PERFORMANCE_OPTIMIZED: &str = "performance_optimized";
/// Use case mapped to the best `accuracy_score`
pub const ACCURACY_OPTIMIZED: &str = "accuracy_optimized";
/// Use case mapped to the best `overall_score`
pub const BALANCED: &str = "balanced";
/// Use case mapped to the best `cost_score_weighted`
pub const COST_OPTIMIZED: &str = "cost_optimized";

/// One evaluation of one model against one test case
///
/// Failed evaluations carry an `error` and no metrics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationRecord {
    /// Create a successful evaluation
    pub fn new(model_id: impl Into<String>, latency: f64, similarity_score: f64, cost: f64) -> Self {
        Self {
            model_id: model_id.into(),
            latency: Some(latency),
            similarity_score: Some(similarity_score),
            cost: Some(cost),
            ..Default::default()
        }
    }

    /// Create a failed evaluation
    pub fn failed(model_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn metrics(&self) -> Option<(f64, f64, f64)> {
        if self.error.is_some() {
            return None;
        }
        Some((self.latency?, self.similarity_score?, self.cost?))
    }
}

/// Strategy builder errors
#[derive(Debug, Error, PartialEq)]
pub enum StrategyError {
    /// Nothing to rank
    #[error("No usable evaluation records")]
    NoEvaluations,

    /// A metric was NaN or infinite
    #[error("Non-finite {metric} for model {model_id}")]
    NonFiniteMetric { model_id: String, metric: &'static str },
}

/// Running per-model sums
struct Accumulator {
    model_id: String,
    latency: f64,
    similarity: f64,
    cost: f64,
    count: u32,
}

/// Min-max range of one metric
#[derive(Clone, Copy)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Self {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |r, v| Self {
                min: r.min.min(v),
                max: r.max.max(v),
            },
        )
    }

    /// Higher raw value scores higher
    fn ascending(self, x: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            1.0
        } else {
            (x - self.min) / span
        }
    }

    /// Lower raw value scores higher
    fn descending(self, x: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            1.0
        } else {
            (self.max - x) / span
        }
    }
}

fn check_finite(model_id: &str, metric: &'static str, value: f64) -> Result<(), StrategyError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StrategyError::NonFiniteMetric {
            model_id: model_id.to_string(),
            metric,
        })
    }
}

/// First model (in slice order) with the strictly greatest score
fn argmax(scores: &[ModelScore], score: impl Fn(&ModelScore) -> f64) -> &str {
    let mut best: Option<&ModelScore> = None;
    for candidate in scores {
        if best.map_or(true, |b| score(candidate) > score(b)) {
            best = Some(candidate);
        }
    }
    best.map_or("", |b| b.model_id.as_str())
}

/// Build a selection policy from evaluation results
///
/// # Errors
///
/// Returns `StrategyError::NoEvaluations` if no record carries metrics, or
/// `StrategyError::NonFiniteMetric` if a metric is NaN or infinite.
pub fn build_policy(records: &[EvaluationRecord]) -> Result<SelectionPolicy, StrategyError> {
    let mut accumulators: Vec<Accumulator> = Vec::new();

    for record in records {
        if record.model_id.trim().is_empty() {
            debug!("Skipping evaluation without a model id");
            continue;
        }
        let Some((latency, similarity, cost)) = record.metrics() else {
            debug!(model = %record.model_id, "Skipping evaluation without metrics");
            continue;
        };
        check_finite(&record.model_id, "latency", latency)?;
        check_finite(&record.model_id, "similarity_score", similarity)?;
        check_finite(&record.model_id, "cost", cost)?;

        match accumulators.iter_mut().find(|a| a.model_id == record.model_id) {
            Some(acc) => {
                acc.latency += latency;
                acc.similarity += similarity;
                acc.cost += cost;
                acc.count += 1;
            }
            None => accumulators.push(Accumulator {
                model_id: record.model_id.clone(),
                latency,
                similarity,
                cost,
                count: 1,
            }),
        }
    }

    if accumulators.is_empty() {
        return Err(StrategyError::NoEvaluations);
    }

    // Models enter ranking by id so equal scores break alphabetically
    accumulators.sort_by(|a, b| a.model_id.cmp(&b.model_id));

    let means: Vec<(String, f64, f64, f64)> = accumulators
        .into_iter()
        .map(|a| {
            let n = f64::from(a.count);
            (a.model_id, a.latency / n, a.similarity / n, a.cost / n)
        })
        .collect();

    let latency_range = Range::of(means.iter().map(|m| m.1));
    let similarity_range = Range::of(means.iter().map(|m| m.2));
    let cost_range = Range::of(means.iter().map(|m| m.3));

    let mut scores: Vec<ModelScore> = means
        .into_iter()
        .map(|(model_id, latency, similarity_score, cost)| {
            let latency_score = latency_range.descending(latency);
            let similarity_score_normalized = similarity_range.ascending(similarity_score);
            let cost_score = cost_range.descending(cost);

            ModelScore {
                model_id,
                latency,
                similarity_score,
                cost,
                latency_score,
                similarity_score_normalized,
                cost_score,
                performance_score: 0.8 * latency_score + 0.2 * similarity_score_normalized,
                accuracy_score: 0.2 * latency_score + 0.8 * similarity_score_normalized,
                overall_score: 0.5 * latency_score + 0.5 * similarity_score_normalized,
                cost_score_weighted: 0.7 * cost_score + 0.3 * similarity_score_normalized,
            }
        })
        .collect();

    // Stable sort keeps id order among ties
    scores.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));

    let primary = scores[0].model_id.clone();
    let fallbacks: Vec<String> = scores[1..].iter().map(|s| s.model_id.clone()).collect();

    let policy = SelectionPolicy::new(primary.clone())
        .with_fallbacks(fallbacks)
        .with_use_case(PERFORMANCE_OPTIMIZED, argmax(&scores, |s| s.performance_score))
        .with_use_case(ACCURACY_OPTIMIZED, argmax(&scores, |s| s.accuracy_score))
        .with_use_case(BALANCED, primary)
        .with_use_case(COST_OPTIMIZED, argmax(&scores, |s| s.cost_score_weighted));

    Ok(SelectionPolicy {
        model_scores: scores,
        ..policy
    })
}
