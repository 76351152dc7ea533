//! Item Calibrator (Bock-Aitkin EM)
//!
//! Re-estimates item parameters from a respondents × items response matrix,
//! integrating abilities out over a N(0, 1) quadrature grid.
//!
//! - E-step: each respondent's posterior over the grid under the current
//!   parameters, aggregated into expected counts per item and node
//!   (n_k = expected respondents, r_k = expected correct)
//! - M-step: per item, Fisher scoring on the expected complete-data
//!   log-likelihood
//!
//!   Q_j = Σ_k r_k ln P_j(θ_k) + (n_k - r_k) ln(1 - P_j(θ_k))
//!
//!   over (a, b), or b alone for 1PL. Guessing stays fixed. Every accepted
//!   step raises Q_j, so the marginal log-likelihood trace never decreases.
//!
//! The loop state lives in [`EmState`] and is advanced by [`step`]. Sparse
//! data never fails: parameters come back unchanged with `low_data` set.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::error::{IrtError, Result};
use crate::estimation::eap::normalize_log_weights;
use crate::irt::{probability, response_curve, response_log_likelihood};
use crate::matrix::solve_ridged;
use crate::quadrature::{gauss_hermite_rule, QuadratureRule};
use crate::sanitize::{clamp_probability, sanitize_theta, validate_item_pool};
use crate::types::{
    CalibrationResult, IrtModel, ItemParameter, ResponseMatrix, A_MAX, A_MIN, B_MAX, B_MIN,
};

/// Step halvings tried before an item's update is abandoned
const MAX_BACKTRACKS: u32 = 12;

/// Newton steps smaller than this end an item's M-step
const M_STEP_TOLERANCE: f64 = 1e-6;

/// Expected counts for one item across the grid
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpectedCounts {
    /// Expected number of respondents at each node
    pub n: Vec<f64>,
    /// Expected number of correct responses at each node
    pub r: Vec<f64>,
}

/// Output of one E-step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EStep {
    pub nodes: Vec<f64>,
    pub counts: Vec<ExpectedCounts>,
    /// Marginal log-likelihood of the matrix under the current parameters
    pub log_likelihood: f64,
    /// Posterior mean ability per respondent
    pub thetas: Vec<f64>,
}

/// EM loop state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmState {
    pub iteration: u32,
    pub params: Vec<ItemParameter>,
    pub log_likelihood_trace: Vec<f64>,
    pub converged: bool,
}

impl EmState {
    pub fn new(params: Vec<ItemParameter>) -> Self {
        Self {
            iteration: 0,
            params,
            log_likelihood_trace: Vec::new(),
            converged: false,
        }
    }
}

/// Full calibration output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub items: Vec<CalibrationResult>,
    /// EAP ability per respondent under the final parameters
    pub thetas: Vec<f64>,
    pub log_likelihood_trace: Vec<f64>,
    pub iterations: u32,
    pub converged: bool,
    /// The whole matrix was too sparse to calibrate
    pub low_data: bool,
}

/// Posterior over the grid for every respondent, then expected counts per item
pub fn e_step(matrix: &ResponseMatrix, params: &[ItemParameter], rule: &QuadratureRule) -> EStep {
    let grid = rule.prior_grid(0.0, 1.0);
    let nodes: Vec<f64> = grid.iter().map(|(theta, _)| *theta).collect();
    let log_prior: Vec<f64> = grid.iter().map(|(_, w)| w.ln()).collect();

    let per_respondent: Vec<(Vec<f64>, f64)> = matrix
        .rows()
        .par_iter()
        .map(|row| {
            let log_joint: Vec<f64> = nodes
                .iter()
                .zip(log_prior.iter())
                .map(|(&theta, &lp)| {
                    let ll: f64 = row
                        .iter()
                        .zip(params.iter())
                        .filter_map(|(cell, item)| cell.map(|correct| (item, correct)))
                        .map(|(item, correct)| response_log_likelihood(theta, item, correct))
                        .sum();
                    lp + ll
                })
                .collect();
            let max = log_joint.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let log_marginal =
                max + log_joint.iter().map(|lj| (lj - max).exp()).sum::<f64>().ln();
            (normalize_log_weights(&log_joint), log_marginal)
        })
        .collect();

    let counts: Vec<ExpectedCounts> = (0..matrix.n_items())
        .into_par_iter()
        .map(|j| {
            let mut n = vec![0.0; nodes.len()];
            let mut r = vec![0.0; nodes.len()];
            for (row, (posterior, _)) in matrix.rows().iter().zip(per_respondent.iter()) {
                let Some(correct) = row.get(j).copied().flatten() else {
                    continue;
                };
                for (k, w) in posterior.iter().enumerate() {
                    n[k] += w;
                    if correct {
                        r[k] += w;
                    }
                }
            }
            ExpectedCounts { n, r }
        })
        .collect();

    let log_likelihood = per_respondent.iter().map(|(_, lm)| lm).sum();
    let thetas = per_respondent
        .iter()
        .map(|(posterior, _)| {
            sanitize_theta(nodes.iter().zip(posterior.iter()).map(|(t, w)| t * w).sum())
        })
        .collect();

    EStep {
        nodes,
        counts,
        log_likelihood,
        thetas,
    }
}

/// Expected complete-data log-likelihood of one item
pub fn expected_log_likelihood(item: &ItemParameter, nodes: &[f64], counts: &ExpectedCounts) -> f64 {
    nodes
        .iter()
        .zip(counts.n.iter().zip(counts.r.iter()))
        .map(|(&theta, (&n, &r))| {
            let p = clamp_probability(probability(theta, item));
            r * p.ln() + (n - r) * (1.0 - p).ln()
        })
        .sum()
}

/// Gradient and information matrix of Q_j over the free parameters
///
/// Free parameters are (a, b) for 2PL/3PL and b alone for 1PL.
fn item_score(item: &ItemParameter, nodes: &[f64], counts: &ExpectedCounts) -> (Vec<f64>, Vec<f64>) {
    let free = free_parameter_count(item);
    let mut grad = vec![0.0; free];
    let mut info = vec![0.0; free * free];
    let a = item.discrimination();
    let b = item.difficulty();

    for (&theta, (&n, &r)) in nodes.iter().zip(counts.n.iter().zip(counts.r.iter())) {
        if n <= 0.0 {
            continue;
        }
        let curve = response_curve(theta, item);
        let p = clamp_probability(curve.p);
        let pq = p * (1.0 - p);
        // dP/dθ = a·s with s = (1 - c)P*(1 - P*); dP/da = (θ - b)·s, dP/db = -a·s
        let s = curve.dp / a;
        let dp = match free {
            1 => [-a * s, 0.0],
            _ => [(theta - b) * s, -a * s],
        };
        let residual = (r - n * p) / pq;
        for x in 0..free {
            grad[x] += residual * dp[x];
            for y in 0..free {
                info[x * free + y] += n * dp[x] * dp[y] / pq;
            }
        }
    }
    (grad, info)
}

fn free_parameter_count(item: &ItemParameter) -> usize {
    match item.model {
        IrtModel::OnePl => 1,
        IrtModel::TwoPl | IrtModel::ThreePl => 2,
    }
}

fn apply_step(item: &ItemParameter, delta: &[f64], scale: f64) -> ItemParameter {
    let mut next = *item;
    match delta {
        [db] => next.b = (item.b + scale * db).clamp(B_MIN, B_MAX),
        [da, db, ..] => {
            next.a = (item.a + scale * da).clamp(A_MIN, A_MAX);
            next.b = (item.b + scale * db).clamp(B_MIN, B_MAX);
        }
        [] => {}
    }
    next
}

/// Bounded Fisher scoring with backtracking for one item
fn maximize_item(
    item: &ItemParameter,
    nodes: &[f64],
    counts: &ExpectedCounts,
    config: &CalibrationConfig,
) -> ItemParameter {
    let mut current = *item;
    let mut q_current = expected_log_likelihood(&current, nodes, counts);

    for _ in 0..config.m_step_iterations {
        let (grad, info) = item_score(&current, nodes, counts);
        let Some(delta) = solve_ridged(&info, &grad, grad.len(), config.ridge) else {
            break;
        };

        let mut accepted = None;
        let mut scale = 1.0;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = apply_step(&current, &delta, scale);
            let q_candidate = expected_log_likelihood(&candidate, nodes, counts);
            if q_candidate >= q_current {
                accepted = Some((candidate, q_candidate));
                break;
            }
            scale *= 0.5;
        }

        let Some((candidate, q_candidate)) = accepted else {
            break;
        };
        let moved = (candidate.a - current.a).abs().max((candidate.b - current.b).abs());
        current = candidate;
        q_current = q_candidate;
        if moved < M_STEP_TOLERANCE {
            break;
        }
    }
    current
}

/// New parameters for every item; items marked `fixed` are passed through
pub fn m_step(
    params: &[ItemParameter],
    e: &EStep,
    fixed: &[bool],
    config: &CalibrationConfig,
) -> Vec<ItemParameter> {
    params
        .par_iter()
        .zip(e.counts.par_iter())
        .enumerate()
        .map(|(j, (item, counts))| {
            if fixed.get(j).copied().unwrap_or(false) {
                *item
            } else {
                maximize_item(item, &e.nodes, counts, config)
            }
        })
        .collect()
}

/// One EM iteration: evaluate, test convergence, then update
pub fn step(
    mut state: EmState,
    matrix: &ResponseMatrix,
    rule: &QuadratureRule,
    fixed: &[bool],
    config: &CalibrationConfig,
) -> EmState {
    let e = e_step(matrix, &state.params, rule);
    let previous = state.log_likelihood_trace.last().copied();
    state.log_likelihood_trace.push(e.log_likelihood);
    state.iteration += 1;

    tracing::debug!(
        iteration = state.iteration,
        log_likelihood = e.log_likelihood,
        "EM iteration"
    );

    if let Some(prev) = previous {
        if (e.log_likelihood - prev).abs() < config.tolerance {
            state.converged = true;
            return state;
        }
    }

    state.params = m_step(&state.params, &e, fixed, config);
    state
}

fn low_data_result(item: &ItemParameter) -> CalibrationResult {
    CalibrationResult {
        item: *item,
        log_likelihood_trace: Vec::new(),
        iterations: 0,
        converged: false,
        low_data: true,
    }
}

/// Run EM to convergence or the iteration cap
pub fn calibrate(
    matrix: &ResponseMatrix,
    initial: &[ItemParameter],
    config: &CalibrationConfig,
) -> Result<CalibrationReport> {
    if initial.len() != matrix.n_items() {
        return Err(IrtError::DimensionMismatch {
            what: "initial item parameters",
            expected: matrix.n_items(),
            found: initial.len(),
        });
    }
    validate_item_pool(initial)?;
    config.validate()?;
    let rule = gauss_hermite_rule(config.quadrature_points)?;

    if matrix.n_items() < config.min_items || matrix.n_respondents() < config.min_respondents {
        tracing::warn!(
            items = matrix.n_items(),
            respondents = matrix.n_respondents(),
            min_items = config.min_items,
            min_respondents = config.min_respondents,
            "response matrix too sparse, parameters left unchanged"
        );
        let thetas = e_step(matrix, initial, rule).thetas;
        return Ok(CalibrationReport {
            items: initial.iter().map(low_data_result).collect(),
            thetas,
            log_likelihood_trace: Vec::new(),
            iterations: 0,
            converged: false,
            low_data: true,
        });
    }

    let fixed: Vec<bool> = (0..matrix.n_items())
        .map(|j| matrix.item_response_count(j) < config.min_responses_per_item)
        .collect();
    let sparse_items = fixed.iter().filter(|f| **f).count();
    if sparse_items > 0 {
        tracing::warn!(
            sparse_items,
            min_responses = config.min_responses_per_item,
            "items below the response threshold are held fixed"
        );
    }

    let mut state = EmState::new(initial.to_vec());
    while !state.converged && state.iteration < config.max_iterations {
        state = step(state, matrix, rule, &fixed, config);
    }

    let thetas = e_step(matrix, &state.params, rule).thetas;
    tracing::info!(
        iterations = state.iteration,
        converged = state.converged,
        log_likelihood = state.log_likelihood_trace.last().copied().unwrap_or(f64::NAN),
        "calibration finished"
    );

    let items = state
        .params
        .iter()
        .zip(fixed.iter())
        .map(|(item, &low_data)| CalibrationResult {
            item: *item,
            log_likelihood_trace: state.log_likelihood_trace.clone(),
            iterations: state.iteration,
            converged: state.converged,
            low_data,
        })
        .collect();

    Ok(CalibrationReport {
        items,
        thetas,
        log_likelihood_trace: state.log_likelihood_trace,
        iterations: state.iteration,
        converged: state.converged,
        low_data: false,
    })
}

/// Per-item calibration results
pub fn calibrate_items(
    matrix: &ResponseMatrix,
    initial: &[ItemParameter],
    config: &CalibrationConfig,
) -> Result<Vec<CalibrationResult>> {
    Ok(calibrate(matrix, initial, config)?.items)
}
