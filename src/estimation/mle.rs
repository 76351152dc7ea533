//! Maximum likelihood scoring (Newton-Raphson in Fisher-scoring form)
//!
//! Per step, over all responses:
//!
//! - L1 = Σ (u - P) P' / (P(1 - P))      (Σ a(u - P) for 2PL)
//! - L2 = -Σ P'² / (P(1 - P))            (information form, always ≤ 0)
//! - θ ← θ - L1 / L2
//!
//! init → iterate → {converged | diverged | max-iterations}. Divergence
//! (|L2| < ε) is an error; the iteration cap returns the last iterate flagged
//! `NonConverged`. All-correct and all-incorrect histories never reach the
//! loop because their likelihood has no finite maximum.

use crate::config::{EstimatorConfig, ExtremePatternFallback};
use crate::error::{IrtError, Result};
use crate::estimation::eap;
use crate::irt::response_curve;
use crate::quadrature::QuadratureRule;
use crate::sanitize::{clamp_probability, sanitize_theta};
use crate::types::{EstimateStatus, EstimationMethod, ItemParameter, Response, ThetaEstimate};

/// Where the iteration ended
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MleOutcome {
    Converged { theta: f64, iterations: u32 },
    MaxIterations { theta: f64, iterations: u32 },
}

/// Gradient and information-form curvature of the log-likelihood at θ
pub fn score_and_curvature(
    theta: f64,
    responses: &[Response],
    items: &[ItemParameter],
) -> (f64, f64) {
    let mut l1 = 0.0;
    let mut l2 = 0.0;
    for (item, correct) in responses
        .iter()
        .filter_map(|r| items.get(r.item).map(|item| (item, r.score())))
    {
        let curve = response_curve(theta, item);
        let p = clamp_probability(curve.p);
        let pq = p * (1.0 - p);
        l1 += (correct - p) * curve.dp / pq;
        l2 -= curve.dp * curve.dp / pq;
    }
    (l1, l2)
}

/// True when every response has the same outcome
pub fn is_extreme_pattern(responses: &[Response]) -> bool {
    match responses.first() {
        Some(first) => responses.iter().all(|r| r.correct == first.correct),
        None => false,
    }
}

/// Run the Newton-Raphson state machine from the prior mean
pub fn newton_raphson(
    responses: &[Response],
    items: &[ItemParameter],
    config: &EstimatorConfig,
) -> Result<MleOutcome> {
    let mut theta = sanitize_theta(config.prior_mean);

    for iteration in 1..=config.mle_max_iterations {
        let (l1, l2) = score_and_curvature(theta, responses, items);
        if !l2.is_finite() || l2.abs() < config.curvature_epsilon {
            tracing::warn!(iteration, theta, curvature = l2, "MLE curvature collapsed");
            return Err(IrtError::Divergence {
                iteration,
                theta,
                curvature: l2,
            });
        }

        let step = (l1 / l2).clamp(-config.max_newton_step, config.max_newton_step);
        let next = sanitize_theta(theta - step);
        let delta = next - theta;
        theta = next;
        tracing::trace!(iteration, theta, delta, "MLE step");

        if delta.abs() < config.mle_tolerance {
            return Ok(MleOutcome::Converged { theta, iterations: iteration });
        }
    }

    Ok(MleOutcome::MaxIterations {
        theta,
        iterations: config.mle_max_iterations,
    })
}

/// MLE estimate with the extreme-pattern fallback applied
pub fn estimate(
    responses: &[Response],
    items: &[ItemParameter],
    rule: &QuadratureRule,
    config: &EstimatorConfig,
) -> Result<ThetaEstimate> {
    if responses.is_empty() {
        return Ok(ThetaEstimate {
            theta: config.prior_mean,
            se: config.prior_sd,
            method: EstimationMethod::Mle,
            status: EstimateStatus::PriorOnly,
            iterations: 0,
        });
    }

    if is_extreme_pattern(responses) {
        tracing::debug!(
            responses = responses.len(),
            all_correct = responses[0].correct,
            "extreme response pattern, MLE skipped"
        );
        let fallback = match config.extreme_pattern_fallback {
            ExtremePatternFallback::PriorMean => ThetaEstimate {
                theta: config.prior_mean,
                se: config.prior_sd,
                method: EstimationMethod::Mle,
                status: EstimateStatus::ExtremePattern,
                iterations: 0,
            },
            ExtremePatternFallback::Eap => ThetaEstimate {
                status: EstimateStatus::ExtremePattern,
                ..eap::estimate(responses, items, rule, config)
            },
        };
        return Ok(fallback);
    }

    let (theta, iterations, status) = match newton_raphson(responses, items, config)? {
        MleOutcome::Converged { theta, iterations } => {
            (theta, iterations, EstimateStatus::Estimated)
        }
        MleOutcome::MaxIterations { theta, iterations } => {
            tracing::warn!(theta, iterations, "MLE reached its iteration cap");
            (theta, iterations, EstimateStatus::NonConverged)
        }
    };

    let (_, l2) = score_and_curvature(theta, responses, items);
    let information = (-l2).max(config.curvature_epsilon);
    Ok(ThetaEstimate {
        theta,
        se: 1.0 / information.sqrt(),
        method: EstimationMethod::Mle,
        status,
        iterations,
    })
}
