//! Theta Estimators
//!
//! Ability estimation from a response history against known item parameters.
//!
//! - `Mle`: Newton-Raphson on the log-likelihood, see [`mle`]
//! - `Eap`: posterior mean over a quadrature grid, see [`eap`]
//! - `Auto`: MLE once enough mixed responses exist, EAP otherwise or when
//!   MLE fails to settle
//!
//! Estimates are recomputed from the full history on every call.

pub mod eap;
pub mod mle;

use rayon::prelude::*;

use crate::config::EstimatorConfig;
use crate::error::{IrtError, Result};
use crate::quadrature::{gauss_hermite_rule, QuadratureRule};
use crate::sanitize::validate_item_parameter;
use crate::types::{EstimateStatus, EstimationMethod, ItemParameter, Response, ThetaEstimate};

pub use eap::{posterior as expected_a_posteriori_posterior, Posterior};

/// Reject responses pointing outside the pool and invalid referenced items
fn validate_inputs(responses: &[Response], items: &[ItemParameter]) -> Result<()> {
    for response in responses {
        let item = items.get(response.item).ok_or(IrtError::UnknownItem {
            index: response.item,
            pool_size: items.len(),
        })?;
        validate_item_parameter(item)?;
    }
    Ok(())
}

/// True when the history is long and varied enough for MLE to have a maximum
fn mle_is_viable(responses: &[Response], config: &EstimatorConfig) -> bool {
    responses.len() >= config.min_mle_responses && !mle::is_extreme_pattern(responses)
}

/// Estimate one learner's ability
///
/// `rule` defaults to the Gauss-Hermite rule of `config.quadrature_points`.
pub fn estimate_theta(
    responses: &[Response],
    items: &[ItemParameter],
    method: EstimationMethod,
    rule: Option<&QuadratureRule>,
    config: &EstimatorConfig,
) -> Result<ThetaEstimate> {
    config.validate()?;
    validate_inputs(responses, items)?;
    let rule = match rule {
        Some(rule) => rule,
        None => gauss_hermite_rule(config.quadrature_points)?,
    };

    match method {
        EstimationMethod::Eap => Ok(eap::estimate(responses, items, rule, config)),
        EstimationMethod::Mle => mle::estimate(responses, items, rule, config),
        EstimationMethod::Auto => {
            if !mle_is_viable(responses, config) {
                return Ok(eap::estimate(responses, items, rule, config));
            }
            match mle::estimate(responses, items, rule, config) {
                Ok(est) if est.status == EstimateStatus::Estimated => Ok(est),
                Ok(est) => {
                    tracing::debug!(
                        status = ?est.status,
                        theta = est.theta,
                        "MLE unsettled, using EAP"
                    );
                    Ok(eap::estimate(responses, items, rule, config))
                }
                Err(IrtError::Divergence { iteration, theta, .. }) => {
                    tracing::warn!(iteration, theta, "MLE diverged, using EAP");
                    Ok(eap::estimate(responses, items, rule, config))
                }
                Err(err) => Err(err),
            }
        }
    }
}

/// Estimate many learners against one pool, in parallel
///
/// Results come back in the order of `histories`; the first failing history
/// fails the batch.
pub fn estimate_theta_batch(
    histories: &[Vec<Response>],
    items: &[ItemParameter],
    method: EstimationMethod,
    rule: Option<&QuadratureRule>,
    config: &EstimatorConfig,
) -> Result<Vec<ThetaEstimate>> {
    config.validate()?;
    let rule = match rule {
        Some(rule) => rule,
        None => gauss_hermite_rule(config.quadrature_points)?,
    };
    histories
        .par_iter()
        .map(|responses| estimate_theta(responses, items, method, Some(rule), config))
        .collect()
}
