//! Item Selector
//!
//! Ranks candidate items for the next presentation in an adaptive session.
//!
//! - Fisher: item information P'² / (P(1 - P)) at the point estimate
//! - KL: Chang-Ying Kullback-Leibler index averaged over N(θ̂, se²), or over
//!   an EAP posterior when the caller has one
//! - Auto: KL while the estimate is still vague (se above threshold), Fisher
//!   once it has settled
//!
//! Ranking is pure: usage counts come in with the candidates and nothing is
//! recorded here. Scores within the tie tolerance are ordered by lower usage
//! count, then by lower index. Candidates, estimates and posteriors are
//! validated before anything is scored.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SelectorConfig;
use crate::error::{IrtError, Result};
use crate::estimation::Posterior;
use crate::irt::{item_information, probability};
use crate::quadrature::{gauss_hermite_rule, integrate_normal, QuadratureRule};
use crate::sanitize::{
    clamp_probability, has_invalid_values, validate_item_parameter, validate_theta,
};
use crate::types::{ItemCandidate, ItemParameter, ThetaEstimate};

/// Narrowest and widest spread used for the KL average
const MIN_KL_SPREAD: f64 = 1e-3;
const MAX_KL_SPREAD: f64 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionStrategy {
    Fisher,
    Kl,
    Auto,
}

/// One candidate's position in a ranking
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub index: usize,
    pub item_id: String,
    pub score: f64,
    pub usage_count: u32,
}

/// Selection result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSelection {
    pub selected_index: usize,
    pub item_id: String,
    pub score: f64,
    /// Strategy actually applied (never `Auto`)
    pub strategy: SelectionStrategy,
    /// Score of every candidate, in candidate order
    pub all_scores: Vec<f64>,
}

/// Concrete strategy for an estimate
pub fn resolve_strategy(
    strategy: SelectionStrategy,
    estimate: &ThetaEstimate,
    config: &SelectorConfig,
) -> SelectionStrategy {
    match strategy {
        SelectionStrategy::Auto => {
            if !estimate.se.is_finite() || estimate.se > config.kl_se_threshold {
                SelectionStrategy::Kl
            } else {
                SelectionStrategy::Fisher
            }
        }
        other => other,
    }
}

/// KL divergence of the response distribution at θ̂ from the one at θ
#[inline]
fn kl_divergence(p_hat: f64, theta: f64, item: &ItemParameter) -> f64 {
    let q_hat = 1.0 - p_hat;
    let p = clamp_probability(probability(theta, item));
    p_hat * (p_hat / p).ln() + q_hat * (q_hat / (1.0 - p)).ln()
}

/// KL index of one item averaged over N(θ̂, se²)
pub fn kl_index(theta_hat: f64, se: f64, item: &ItemParameter, rule: &QuadratureRule) -> f64 {
    let spread = if se.is_finite() {
        se.clamp(MIN_KL_SPREAD, MAX_KL_SPREAD)
    } else {
        MAX_KL_SPREAD
    };
    let p_hat = clamp_probability(probability(theta_hat, item));
    integrate_normal(|theta| kl_divergence(p_hat, theta, item), theta_hat, spread, rule)
}

/// KL index of one item averaged over a posterior, centred on its mean
///
/// Weights are read relative to their total, so an unnormalised posterior
/// gives the same index.
pub fn kl_index_posterior(posterior: &Posterior, item: &ItemParameter) -> f64 {
    let total: f64 = posterior.weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    let theta_hat = posterior.mean() / total;
    let p_hat = clamp_probability(probability(theta_hat, item));
    posterior
        .nodes
        .iter()
        .zip(posterior.weights.iter())
        .map(|(&theta, &w)| w * kl_divergence(p_hat, theta, item))
        .sum::<f64>()
        / total
}

fn validate_candidates(candidates: &[ItemCandidate]) -> Result<()> {
    candidates
        .iter()
        .try_for_each(|candidate| validate_item_parameter(&candidate.params))
}

fn validate_estimate(estimate: &ThetaEstimate) -> Result<()> {
    validate_theta(estimate.theta)?;
    // An infinite se is legal (no information yet); NaN or negative is not
    if estimate.se.is_nan() || estimate.se < 0.0 {
        return Err(IrtError::invalid(
            "se",
            estimate.se,
            "standard error must be non-negative",
        ));
    }
    Ok(())
}

fn validate_posterior(posterior: &Posterior) -> Result<()> {
    if posterior.nodes.len() != posterior.weights.len() {
        return Err(IrtError::DimensionMismatch {
            what: "posterior weights",
            expected: posterior.nodes.len(),
            found: posterior.weights.len(),
        });
    }
    if posterior.nodes.is_empty() {
        return Err(IrtError::invalid(
            "posterior",
            0.0,
            "posterior needs at least one node",
        ));
    }
    if has_invalid_values(&posterior.nodes) || has_invalid_values(&posterior.weights) {
        return Err(IrtError::invalid(
            "posterior",
            f64::NAN,
            "posterior nodes and weights must be finite",
        ));
    }
    if let Some(&w) = posterior.weights.iter().find(|&&w| w < 0.0) {
        return Err(IrtError::invalid(
            "posterior",
            w,
            "posterior weights must be non-negative",
        ));
    }
    let total: f64 = posterior.weights.iter().sum();
    if total <= 0.0 {
        return Err(IrtError::invalid(
            "posterior",
            total,
            "posterior must carry positive mass",
        ));
    }
    Ok(())
}

fn score_items(
    estimate: &ThetaEstimate,
    candidates: &[ItemCandidate],
    strategy: SelectionStrategy,
    rule: &QuadratureRule,
) -> Vec<f64> {
    candidates
        .par_iter()
        .map(|candidate| match strategy {
            SelectionStrategy::Kl => kl_index(estimate.theta, estimate.se, &candidate.params, rule),
            SelectionStrategy::Fisher | SelectionStrategy::Auto => {
                item_information(estimate.theta, &candidate.params)
            }
        })
        .map(finite_or_zero)
        .collect()
}

fn score_items_posterior(posterior: &Posterior, candidates: &[ItemCandidate]) -> Vec<f64> {
    candidates
        .par_iter()
        .map(|candidate| kl_index_posterior(posterior, &candidate.params))
        .map(finite_or_zero)
        .collect()
}

#[inline]
fn finite_or_zero(score: f64) -> f64 {
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Order ranked items best first, honouring the tie tolerance
fn order_ranking(ranked: &mut [RankedItem], tolerance: f64) {
    ranked.sort_by(|x, y| y.score.total_cmp(&x.score).then(x.index.cmp(&y.index)));

    // Runs of near-equal scores are reordered by exposure
    let mut start = 0;
    while start < ranked.len() {
        let mut end = start + 1;
        while end < ranked.len() && (ranked[end - 1].score - ranked[end].score).abs() <= tolerance {
            end += 1;
        }
        ranked[start..end]
            .sort_by(|x, y| x.usage_count.cmp(&y.usage_count).then(x.index.cmp(&y.index)));
        start = end;
    }
}

fn rank_scores(candidates: &[ItemCandidate], scores: &[f64], tolerance: f64) -> Vec<RankedItem> {
    let mut ranked: Vec<RankedItem> = candidates
        .iter()
        .zip(scores.iter())
        .enumerate()
        .map(|(index, (candidate, &score))| RankedItem {
            index,
            item_id: candidate.id.clone(),
            score,
            usage_count: candidate.usage_count,
        })
        .collect();
    order_ranking(&mut ranked, tolerance);
    ranked
}

fn rank_with_scores(
    estimate: &ThetaEstimate,
    candidates: &[ItemCandidate],
    strategy: SelectionStrategy,
    config: &SelectorConfig,
) -> Result<(SelectionStrategy, Vec<f64>, Vec<RankedItem>)> {
    config.validate()?;
    validate_estimate(estimate)?;
    validate_candidates(candidates)?;
    let rule = gauss_hermite_rule(config.quadrature_points)?;
    let used = resolve_strategy(strategy, estimate, config);
    let scores = score_items(estimate, candidates, used, rule);
    let ranked = rank_scores(candidates, &scores, config.tie_tolerance);
    Ok((used, scores, ranked))
}

fn rank_posterior_with_scores(
    posterior: &Posterior,
    candidates: &[ItemCandidate],
    config: &SelectorConfig,
) -> Result<(Vec<f64>, Vec<RankedItem>)> {
    config.validate()?;
    validate_posterior(posterior)?;
    validate_candidates(candidates)?;
    let scores = score_items_posterior(posterior, candidates);
    let ranked = rank_scores(candidates, &scores, config.tie_tolerance);
    Ok((scores, ranked))
}

fn into_selection(
    used: SelectionStrategy,
    all_scores: Vec<f64>,
    ranked: Vec<RankedItem>,
) -> Option<ItemSelection> {
    let best = ranked.into_iter().next()?;
    tracing::debug!(
        index = best.index,
        item_id = %best.item_id,
        score = best.score,
        strategy = ?used,
        "item selected"
    );
    Some(ItemSelection {
        selected_index: best.index,
        item_id: best.item_id,
        score: best.score,
        strategy: used,
        all_scores,
    })
}

/// All candidates, best first
pub fn rank_items(
    estimate: &ThetaEstimate,
    candidates: &[ItemCandidate],
    strategy: SelectionStrategy,
    config: &SelectorConfig,
) -> Result<Vec<RankedItem>> {
    Ok(rank_with_scores(estimate, candidates, strategy, config)?.2)
}

/// Best next item, or `None` for an empty pool
pub fn select_next_item(
    estimate: &ThetaEstimate,
    candidates: &[ItemCandidate],
    strategy: SelectionStrategy,
    config: &SelectorConfig,
) -> Result<Option<ItemSelection>> {
    let (used, all_scores, ranked) = rank_with_scores(estimate, candidates, strategy, config)?;
    Ok(into_selection(used, all_scores, ranked))
}

/// All candidates ranked by posterior-weighted KL, best first
pub fn rank_items_from_posterior(
    posterior: &Posterior,
    candidates: &[ItemCandidate],
    config: &SelectorConfig,
) -> Result<Vec<RankedItem>> {
    Ok(rank_posterior_with_scores(posterior, candidates, config)?.1)
}

/// Best next item by KL averaged over the full posterior
///
/// Use this with the output of `expected_a_posteriori_posterior` when the
/// posterior is visibly non-normal (early in a session, after a run of
/// correct answers); the reported strategy is always `Kl`.
pub fn select_next_item_from_posterior(
    posterior: &Posterior,
    candidates: &[ItemCandidate],
    config: &SelectorConfig,
) -> Result<Option<ItemSelection>> {
    let (all_scores, ranked) = rank_posterior_with_scores(posterior, candidates, config)?;
    Ok(into_selection(SelectionStrategy::Kl, all_scores, ranked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::expected_a_posteriori_posterior;
    use crate::quadrature::default_rule;
    use crate::types::{EstimateStatus, EstimationMethod, Response};

    fn estimate(theta: f64, se: f64) -> ThetaEstimate {
        ThetaEstimate {
            theta,
            se,
            method: EstimationMethod::Eap,
            status: EstimateStatus::Estimated,
            iterations: 0,
        }
    }

    fn candidate(id: &str, a: f64, b: f64, usage: u32) -> ItemCandidate {
        ItemCandidate::new(id, ItemParameter::two_pl(a, b).unwrap(), usage)
    }

    #[test]
    fn test_fisher_prefers_matched_difficulty() {
        let pool = vec![
            candidate("far", 1.0, 2.5, 0),
            candidate("matched", 1.0, 0.5, 0),
            candidate("below", 1.0, -1.5, 0),
        ];
        let sel = select_next_item(
            &estimate(0.5, 0.3),
            &pool,
            SelectionStrategy::Fisher,
            &SelectorConfig::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(sel.item_id, "matched");
        assert_eq!(sel.strategy, SelectionStrategy::Fisher);
        assert_eq!(sel.all_scores.len(), 3);
    }

    #[test]
    fn test_tie_broken_by_usage_then_index() {
        let pool = vec![
            candidate("a", 1.0, 0.0, 4),
            candidate("b", 1.0, 0.0, 1),
            candidate("c", 1.0, 0.0, 1),
        ];
        let ranked = rank_items(
            &estimate(0.0, 0.2),
            &pool,
            SelectionStrategy::Fisher,
            &SelectorConfig::default(),
        )
        .unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_auto_switches_on_standard_error() {
        let config = SelectorConfig::default();
        assert_eq!(
            resolve_strategy(SelectionStrategy::Auto, &estimate(0.0, 0.9), &config),
            SelectionStrategy::Kl
        );
        assert_eq!(
            resolve_strategy(SelectionStrategy::Auto, &estimate(0.0, 0.3), &config),
            SelectionStrategy::Fisher
        );
        assert_eq!(
            resolve_strategy(SelectionStrategy::Auto, &estimate(0.0, f64::INFINITY), &config),
            SelectionStrategy::Kl
        );
        assert_eq!(
            resolve_strategy(SelectionStrategy::Fisher, &estimate(0.0, 0.9), &config),
            SelectionStrategy::Fisher
        );
    }

    #[test]
    fn test_kl_index_properties() {
        let rule = default_rule();
        let sharp = ItemParameter::two_pl(2.0, 0.0).unwrap();
        let flat = ItemParameter::two_pl(0.5, 0.0).unwrap();
        let wide_sharp = kl_index(0.0, 1.0, &sharp, rule);
        let wide_flat = kl_index(0.0, 1.0, &flat, rule);
        assert!(wide_sharp > 0.0);
        assert!(wide_sharp > wide_flat);
        // Shrinking uncertainty shrinks the divergence
        assert!(kl_index(0.0, 0.1, &sharp, rule) < wide_sharp);
    }

    #[test]
    fn test_kl_selection_reports_strategy() {
        let pool = vec![candidate("flat", 0.5, 0.0, 0), candidate("sharp", 2.0, 0.0, 0)];
        let sel = select_next_item(
            &estimate(0.0, 1.0),
            &pool,
            SelectionStrategy::Auto,
            &SelectorConfig::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(sel.strategy, SelectionStrategy::Kl);
        assert_eq!(sel.item_id, "sharp");
        assert_eq!(sel.selected_index, 1);
    }

    #[test]
    fn test_empty_pool() {
        assert!(select_next_item(
            &estimate(0.0, 1.0),
            &[],
            SelectionStrategy::Fisher,
            &SelectorConfig::default()
        )
        .unwrap()
        .is_none());
    }

    #[test]
    fn test_selection_serializes() {
        let pool = vec![candidate("x", 1.0, 0.0, 0)];
        let sel = select_next_item(
            &estimate(0.0, 0.2),
            &pool,
            SelectionStrategy::Fisher,
            &SelectorConfig::default(),
        )
        .unwrap()
        .unwrap();
        let json = serde_json::to_string(&sel).unwrap();
        let restored: ItemSelection = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, sel);
    }

    #[test]
    fn test_rejects_malformed_candidates_and_estimate() {
        let config = SelectorConfig::default();
        let mut broken = ItemParameter::two_pl(1.0, 0.0).unwrap();
        broken.a = 50.0;
        broken.b = f64::NAN;
        let pool = vec![
            ItemCandidate::new("broken", broken, 0),
            candidate("fine", 1.0, 0.0, 0),
        ];

        for strategy in [
            SelectionStrategy::Fisher,
            SelectionStrategy::Kl,
            SelectionStrategy::Auto,
        ] {
            let err =
                select_next_item(&estimate(f64::NAN, 1.0), &pool, strategy, &config).unwrap_err();
            assert!(matches!(err, IrtError::InvalidParameter { field: "theta", .. }));
            let err =
                select_next_item(&estimate(0.0, 1.0), &pool, strategy, &config).unwrap_err();
            assert!(matches!(err, IrtError::InvalidParameter { field: "a", .. }));
            assert!(rank_items(&estimate(0.0, 1.0), &pool, strategy, &config).is_err());
        }

        let clean = vec![candidate("fine", 1.0, 0.0, 0)];
        let fisher = SelectionStrategy::Fisher;
        let nan_se = select_next_item(&estimate(0.0, f64::NAN), &clean, fisher, &config);
        assert!(matches!(nan_se, Err(IrtError::InvalidParameter { field: "se", .. })));
        let negative_se = rank_items(&estimate(0.0, -0.5), &clean, SelectionStrategy::Kl, &config);
        assert!(matches!(negative_se, Err(IrtError::InvalidParameter { field: "se", .. })));
        assert!(select_next_item(&estimate(f64::INFINITY, 0.3), &clean, fisher, &config).is_err());

        // No information yet is a legal state
        let auto = SelectionStrategy::Auto;
        let fresh = select_next_item(&estimate(0.0, f64::INFINITY), &clean, auto, &config)
            .unwrap()
            .unwrap();
        assert_eq!(fresh.strategy, SelectionStrategy::Kl);
    }

    #[test]
    fn test_rejects_invalid_selector_config() {
        let pool = vec![candidate("x", 1.0, 0.0, 0)];
        let config = SelectorConfig {
            quadrature_points: 7,
            ..SelectorConfig::default()
        };
        let err = select_next_item(&estimate(0.0, 0.5), &pool, SelectionStrategy::Kl, &config)
            .unwrap_err();
        assert!(matches!(err, IrtError::InvalidConfig(_)));
    }

    #[test]
    fn test_posterior_kl_matches_weighted_sum() {
        // Skewed three-point posterior, deliberately unnormalised
        let posterior = Posterior {
            nodes: vec![-1.0, 0.0, 2.5],
            weights: vec![1.0, 6.0, 3.0],
        };
        let item = ItemParameter::two_pl(1.5, 0.5).unwrap();
        let theta_hat = (-1.0 * 1.0 + 0.0 * 6.0 + 2.5 * 3.0) / 10.0;
        let p_hat = probability(theta_hat, &item);
        let manual: f64 = posterior
            .nodes
            .iter()
            .zip(posterior.weights.iter())
            .map(|(&t, &w)| {
                let p = probability(t, &item);
                w / 10.0
                    * (p_hat * (p_hat / p).ln() + (1.0 - p_hat) * ((1.0 - p_hat) / (1.0 - p)).ln())
            })
            .sum();
        let index = kl_index_posterior(&posterior, &item);
        assert!((index - manual).abs() < 1e-12);
        assert!(index > 0.0);

        let point_mass = Posterior {
            nodes: vec![0.3],
            weights: vec![1.0],
        };
        assert!(kl_index_posterior(&point_mass, &item).abs() < 1e-12);
    }

    #[test]
    fn test_posterior_selection_follows_skew() {
        // Two separated modes; the item between them splits them best even
        // though neither mode sits at its difficulty
        let posterior = Posterior {
            nodes: vec![-2.0, -1.0, 0.0, 1.0, 2.0],
            weights: vec![0.0, 0.0, 0.5, 0.0, 0.5],
        };
        let pool = vec![
            candidate("low", 2.0, -1.5, 0),
            candidate("between", 2.0, 1.0, 0),
            candidate("high", 2.0, 3.5, 0),
        ];
        let sel = select_next_item_from_posterior(&posterior, &pool, &SelectorConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(sel.strategy, SelectionStrategy::Kl);
        assert_eq!(sel.item_id, "between");
        assert_eq!(sel.all_scores.len(), 3);

        let ranked =
            rank_items_from_posterior(&posterior, &pool, &SelectorConfig::default()).unwrap();
        assert_eq!(ranked[0].item_id, "between");
    }

    #[test]
    fn test_posterior_selection_after_correct_run() {
        let items: Vec<ItemParameter> = (0..5)
            .map(|i| ItemParameter::two_pl(1.2, -2.0 + i as f64).unwrap())
            .collect();
        let history: Vec<Response> = (0..4).map(|i| Response::new(i, true)).collect();
        let posterior =
            expected_a_posteriori_posterior(&history, &items, default_rule(), 0.0, 1.0);
        let pool: Vec<ItemCandidate> = items
            .iter()
            .enumerate()
            .map(|(i, item)| ItemCandidate::new(format!("b{i}"), *item, 0))
            .collect();
        let sel = select_next_item_from_posterior(&posterior, &pool, &SelectorConfig::default())
            .unwrap()
            .unwrap();
        assert!(matches!(sel.item_id.as_str(), "b3" | "b4"), "{}", sel.item_id);
    }

    #[test]
    fn test_rejects_malformed_posterior() {
        let pool = vec![candidate("x", 1.0, 0.0, 0)];
        let config = SelectorConfig::default();
        let ragged = Posterior {
            nodes: vec![0.0, 1.0],
            weights: vec![1.0],
        };
        assert!(matches!(
            select_next_item_from_posterior(&ragged, &pool, &config),
            Err(IrtError::DimensionMismatch { .. })
        ));
        let empty = Posterior {
            nodes: vec![],
            weights: vec![],
        };
        assert!(select_next_item_from_posterior(&empty, &pool, &config).is_err());
        let nan = Posterior {
            nodes: vec![0.0, f64::NAN],
            weights: vec![0.5, 0.5],
        };
        assert!(select_next_item_from_posterior(&nan, &pool, &config).is_err());
        let massless = Posterior {
            nodes: vec![0.0, 1.0],
            weights: vec![0.0, 0.0],
        };
        assert!(rank_items_from_posterior(&massless, &pool, &config).is_err());
    }
}
