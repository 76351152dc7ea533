//! Expected A Posteriori scoring
//!
//! The posterior over the rule's ability grid is
//!
//!   π(θᵢ | u) ∝ prior(θᵢ) · Π_j P_j(θᵢ)^{u_j} (1 - P_j(θᵢ))^{1 - u_j}
//!
//! accumulated in log space and normalised with a max shift. The estimate is
//! the posterior mean, its standard error the posterior SD. Bounded by
//! construction, so this path never fails numerically.

use serde::{Deserialize, Serialize};

use crate::config::EstimatorConfig;
use crate::irt::response_log_likelihood;
use crate::quadrature::QuadratureRule;
use crate::sanitize::sanitize_theta;
use crate::types::{EstimateStatus, EstimationMethod, ItemParameter, Response, ThetaEstimate};

/// Normalised posterior mass over an ability grid
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    pub nodes: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Posterior {
    pub fn mean(&self) -> f64 {
        self.nodes
            .iter()
            .zip(self.weights.iter())
            .map(|(t, w)| t * w)
            .sum()
    }

    pub fn sd(&self) -> f64 {
        let mean = self.mean();
        let var: f64 = self
            .nodes
            .iter()
            .zip(self.weights.iter())
            .map(|(t, w)| w * (t - mean) * (t - mean))
            .sum();
        var.max(0.0).sqrt()
    }
}

/// Posterior over the rule's grid given a response history
pub fn posterior(
    responses: &[Response],
    items: &[ItemParameter],
    rule: &QuadratureRule,
    prior_mean: f64,
    prior_sd: f64,
) -> Posterior {
    let grid = rule.prior_grid(prior_mean, prior_sd);
    let log_post: Vec<f64> = grid
        .iter()
        .map(|&(theta, prior)| {
            let ll: f64 = responses
                .iter()
                .filter_map(|r| items.get(r.item).map(|item| (item, r.correct)))
                .map(|(item, correct)| response_log_likelihood(theta, item, correct))
                .sum();
            prior.ln() + ll
        })
        .collect();

    let weights = normalize_log_weights(&log_post);
    Posterior {
        nodes: grid.into_iter().map(|(theta, _)| theta).collect(),
        weights,
    }
}

/// exp-normalise a vector of log masses
pub(crate) fn normalize_log_weights(log_w: &[f64]) -> Vec<f64> {
    let max = log_w
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        let n = log_w.len().max(1) as f64;
        return vec![1.0 / n; log_w.len()];
    }
    let unnorm: Vec<f64> = log_w.iter().map(|&lw| (lw - max).exp()).collect();
    let total: f64 = unnorm.iter().sum();
    unnorm.into_iter().map(|w| w / total).collect()
}

/// EAP estimate; an empty history returns the prior itself
pub fn estimate(
    responses: &[Response],
    items: &[ItemParameter],
    rule: &QuadratureRule,
    config: &EstimatorConfig,
) -> ThetaEstimate {
    if responses.is_empty() {
        return ThetaEstimate {
            theta: config.prior_mean,
            se: config.prior_sd,
            method: EstimationMethod::Eap,
            status: EstimateStatus::PriorOnly,
            iterations: 0,
        };
    }

    let post = posterior(responses, items, rule, config.prior_mean, config.prior_sd);
    ThetaEstimate {
        theta: sanitize_theta(post.mean()),
        se: post.sd(),
        method: EstimationMethod::Eap,
        status: EstimateStatus::Estimated,
        iterations: 0,
    }
}
