//! Aggregation of analyzer signals into one verdict.
//!
//! [`aggregate`] is a pure function of the signal slice and the scoring
//! configuration: the same inputs always give the same verdict and
//! confidence, which is what makes cached signals safe to reuse.

use athlethia_core::{AnalyzerKind, ScoringConfig, SignalResult, Verdict};
use serde::{Deserialize, Serialize};

/// Verdict and confidence for a set of signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Three-tier classification
    pub verdict: Verdict,
    /// Aggregated scam likelihood in [0, 1]
    pub confidence: f64,
}

/// Combine signals into a verdict.
///
/// Only `Completed` signals contribute. The confidence is their weighted mean,
/// renormalized by the weights actually present, so missing analyzers do not
/// dilute the result. A confirmed scam record lifts the confidence to at least
/// `confirmed_floor`. A known-scam lookup that found nothing carries the
/// smaller `known_scam_miss` weight. With no completed signal the verdict is `Suspicious`
/// at `insufficient_data_confidence`.
#[must_use]
pub fn aggregate(signals: &[SignalResult], scoring: &ScoringConfig) -> Assessment {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut confirmed = false;

    for signal in signals.iter().filter(|s| s.is_completed()) {
        confirmed |= signal.confirmed_scam;

        let weight = weight_of(signal, scoring);
        if weight > 0.0 && weight.is_finite() {
            weighted_sum += weight * signal.score.clamp(0.0, 1.0);
            total_weight += weight;
        }
    }

    if total_weight <= 0.0 && !confirmed {
        return Assessment {
            verdict: Verdict::Suspicious,
            confidence: scoring.insufficient_data_confidence,
        };
    }

    let mut confidence = if total_weight > 0.0 {
        (weighted_sum / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    if confirmed {
        confidence = confidence.max(scoring.confirmed_floor);
    }

    Assessment {
        verdict: Verdict::from_confidence(
            confidence,
            scoring.low_threshold,
            scoring.high_threshold,
        ),
        confidence,
    }
}

fn weight_of(signal: &SignalResult, scoring: &ScoringConfig) -> f64 {
    let missed = signal.analyzer == AnalyzerKind::KnownScamLookup
        && !signal.confirmed_scam
        && signal.score <= f64::EPSILON;
    if missed {
        scoring.weights.known_scam_miss
    } else {
        scoring.weights.get(signal.analyzer)
    }
}
