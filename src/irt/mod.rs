//! IRT Probability Models
//!
//! Response probabilities for the logistic item families:
//!
//! - 1PL: P = 1 / (1 + exp(-(θ - b)))
//! - 2PL: P = 1 / (1 + exp(-a(θ - b)))
//! - 3PL: P = c + (1 - c) / (1 + exp(-a(θ - b)))
//!
//! With P* the logistic part, the θ-derivatives are
//!
//! - P'  = a(1 - c) P*(1 - P*)
//! - P'' = a²(1 - c) P*(1 - P*)(1 - 2P*)
//!
//! Parameters are clamped to their declared ranges and the exponent to
//! [-35, 35] before evaluation, so every value returned here is finite.

use crate::sanitize::{clamp_exponent, clamp_probability};
use crate::types::{ItemParameter, Response};

/// Probability and its first two θ-derivatives at one ability level
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResponseCurve {
    pub p: f64,
    pub dp: f64,
    pub d2p: f64,
}

/// Numerically safe logistic function
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let z = clamp_exponent(x);
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// P(correct | θ) for any item family
#[inline]
pub fn probability(theta: f64, item: &ItemParameter) -> f64 {
    let a = item.discrimination();
    let c = item.guessing();
    let p_star = sigmoid(a * (theta - item.difficulty()));
    c + (1.0 - c) * p_star
}

/// Probability with analytic first and second derivatives
pub fn response_curve(theta: f64, item: &ItemParameter) -> ResponseCurve {
    let a = item.discrimination();
    let c = item.guessing();
    let p_star = sigmoid(a * (theta - item.difficulty()));
    let slope = p_star * (1.0 - p_star);
    ResponseCurve {
        p: c + (1.0 - c) * p_star,
        dp: a * (1.0 - c) * slope,
        d2p: a * a * (1.0 - c) * slope * (1.0 - 2.0 * p_star),
    }
}

/// Fisher information of one item: P'² / (P(1 - P))
///
/// Reduces to a²P(1 - P) for 1PL/2PL items.
pub fn item_information(theta: f64, item: &ItemParameter) -> f64 {
    let curve = response_curve(theta, item);
    let pq = curve.p * (1.0 - curve.p);
    if pq <= 0.0 {
        return 0.0;
    }
    curve.dp * curve.dp / pq
}

/// Sum of item informations over a pool
pub fn test_information(theta: f64, items: &[ItemParameter]) -> f64 {
    items.iter().map(|item| item_information(theta, item)).sum()
}

/// Asymptotic standard error 1/√I(θ); infinite when the pool carries no information
pub fn standard_error(theta: f64, items: &[ItemParameter]) -> f64 {
    let info = test_information(theta, items);
    if info > 0.0 {
        1.0 / info.sqrt()
    } else {
        f64::INFINITY
    }
}

/// Log-probability of one observed response
#[inline]
pub fn response_log_likelihood(theta: f64, item: &ItemParameter, correct: bool) -> f64 {
    let p = clamp_probability(probability(theta, item));
    if correct {
        p.ln()
    } else {
        (1.0 - p).ln()
    }
}

/// Log-likelihood of a response history at θ
///
/// Responses pointing outside `items` contribute nothing; callers validate
/// indices at the boundary.
pub fn log_likelihood(theta: f64, responses: &[Response], items: &[ItemParameter]) -> f64 {
    responses
        .iter()
        .filter_map(|r| items.get(r.item).map(|item| (item, r.correct)))
        .map(|(item, correct)| response_log_likelihood(theta, item, correct))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IrtModel, A_MAX, A_MIN, C_MAX};

    fn item(model: IrtModel, a: f64, b: f64, c: f64) -> ItemParameter {
        ItemParameter { model, a, b, c }
    }

    #[test]
    fn test_probability_at_difficulty_is_half() {
        let it = ItemParameter::two_pl(1.5, 0.0).unwrap();
        assert_eq!(probability(0.0, &it), 0.5);
    }

    #[test]
    fn test_one_pl_ignores_discrimination() {
        let rasch = item(IrtModel::OnePl, 2.5, 0.0, 0.0);
        let expected = 1.0 / (1.0 + (-1.0f64).exp());
        assert!((probability(1.0, &rasch) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_three_pl_lower_asymptote() {
        let it = item(IrtModel::ThreePl, 1.0, 0.0, 0.25);
        let p_low = probability(-4.0, &it);
        assert!(p_low > 0.25);
        assert!(p_low < 0.27);
        assert!((probability(0.0, &it) - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_probability_range() {
        for theta in [-4.0, -1.0, 0.0, 1.0, 4.0] {
            for b in [-4.0, -1.0, 0.0, 1.0, 4.0] {
                for a in [A_MIN, 1.0, A_MAX] {
                    for c in [0.0, 0.2, C_MAX] {
                        let it = item(IrtModel::ThreePl, a, b, c);
                        let p = probability(theta, &it);
                        assert!(p > c && p < 1.0, "p={p} theta={theta} a={a} b={b} c={c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_extreme_exponent_stays_finite() {
        let it = item(IrtModel::TwoPl, 1e6, 0.0, 0.0);
        let curve = response_curve(1e6, &it);
        assert!(curve.p.is_finite() && curve.dp.is_finite() && curve.d2p.is_finite());
        assert!(response_log_likelihood(1e6, &it, false).is_finite());
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let h = 1e-5;
        for it in [
            item(IrtModel::OnePl, 1.0, 0.3, 0.0),
            item(IrtModel::TwoPl, 1.7, -0.5, 0.0),
            item(IrtModel::ThreePl, 1.2, 0.8, 0.2),
        ] {
            for theta in [-2.0, -0.3, 0.0, 1.1, 2.5] {
                let curve = response_curve(theta, &it);
                let fd1 = (probability(theta + h, &it) - probability(theta - h, &it)) / (2.0 * h);
                let fd2 = (response_curve(theta + h, &it).dp - response_curve(theta - h, &it).dp)
                    / (2.0 * h);
                assert!((curve.dp - fd1).abs() < 1e-7, "dp {} vs {}", curve.dp, fd1);
                assert!((curve.d2p - fd2).abs() < 1e-6, "d2p {} vs {}", curve.d2p, fd2);
            }
        }
    }

    #[test]
    fn test_two_pl_information_formula() {
        let it = ItemParameter::two_pl(1.5, 0.5).unwrap();
        let p = probability(0.2, &it);
        let expected = 1.5 * 1.5 * p * (1.0 - p);
        assert!((item_information(0.2, &it) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_information_peaks_near_difficulty() {
        let it = ItemParameter::two_pl(1.0, 1.0).unwrap();
        assert!(item_information(1.0, &it) > item_information(-1.0, &it));
        assert!(item_information(1.0, &it) > item_information(3.0, &it));
    }

    #[test]
    fn test_standard_error_shrinks_with_more_items() {
        let one = vec![ItemParameter::two_pl(1.0, 0.0).unwrap()];
        let many = vec![ItemParameter::two_pl(1.0, 0.0).unwrap(); 10];
        assert!(standard_error(0.0, &many) < standard_error(0.0, &one));
        assert!(standard_error(0.0, &[]).is_infinite());
    }

    #[test]
    fn test_log_likelihood_prefers_consistent_theta() {
        let items = vec![
            ItemParameter::two_pl(1.0, -1.0).unwrap(),
            ItemParameter::two_pl(1.0, 1.0).unwrap(),
        ];
        let responses = vec![Response::new(0, true), Response::new(1, false)];
        let at_zero = log_likelihood(0.0, &responses, &items);
        let far = log_likelihood(3.5, &responses, &items);
        assert!(at_zero > far);
    }
}
