//! Common Types and Constants
//!
//! Shared data structures used across all psychometric modules.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IrtError, Result};
use crate::sanitize;

// ==================== Constants ====================

/// Discrimination bounds
pub const A_MIN: f64 = 0.2;
pub const A_MAX: f64 = 3.0;

/// Difficulty bounds
pub const B_MIN: f64 = -4.0;
pub const B_MAX: f64 = 4.0;

/// Guessing bounds (3PL only)
pub const C_MIN: f64 = 0.0;
pub const C_MAX: f64 = 0.5;

/// Hard bound on single-dimension ability estimates
pub const THETA_MIN: f64 = -4.0;
pub const THETA_MAX: f64 = 4.0;

/// Soft bound used for reporting and for component profiles
pub const THETA_REPORT_BOUND: f64 = 3.0;

/// Logistic exponent clamp, keeps exp() finite
pub const EXPONENT_CLAMP: f64 = 35.0;

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

/// Number of linguistic ability components tracked per learner
pub const COMPONENT_COUNT: usize = 5;

/// Tolerance for a Q-matrix row summing to one
pub const Q_SUM_TOLERANCE: f64 = 1e-6;

/// Legacy Elo scale anchors (1200 = average word, 400 Elo per logit)
pub const ELO_CENTER: f64 = 1200.0;
pub const ELO_PER_LOGIT: f64 = 400.0;

// ==================== Item Types ====================

/// Response model family, fixed once per item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrtModel {
    /// Rasch: discrimination fixed at 1, no guessing
    OnePl,
    /// Discrimination and difficulty
    TwoPl,
    /// Discrimination, difficulty and a lower asymptote
    ThreePl,
}

/// A test item's psychometric profile
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemParameter {
    pub model: IrtModel,
    /// Discrimination a ∈ [0.2, 3.0]
    pub a: f64,
    /// Difficulty b ∈ [-4, 4]
    pub b: f64,
    /// Guessing c ∈ [0, 0.5]
    pub c: f64,
}

impl ItemParameter {
    /// Validated constructor; out-of-range values are rejected, not clamped
    pub fn new(model: IrtModel, a: f64, b: f64, c: f64) -> Result<Self> {
        let item = Self { model, a, b, c };
        item.validate()?;
        Ok(item)
    }

    pub fn one_pl(b: f64) -> Result<Self> {
        Self::new(IrtModel::OnePl, 1.0, b, 0.0)
    }

    pub fn two_pl(a: f64, b: f64) -> Result<Self> {
        Self::new(IrtModel::TwoPl, a, b, 0.0)
    }

    pub fn three_pl(a: f64, b: f64, c: f64) -> Result<Self> {
        Self::new(IrtModel::ThreePl, a, b, c)
    }

    pub fn validate(&self) -> Result<()> {
        sanitize::validate_item_parameter(self)
    }

    /// Discrimination actually used by the model
    #[inline]
    pub fn discrimination(&self) -> f64 {
        match self.model {
            IrtModel::OnePl => 1.0,
            IrtModel::TwoPl | IrtModel::ThreePl => self.a.clamp(A_MIN, A_MAX),
        }
    }

    #[inline]
    pub fn difficulty(&self) -> f64 {
        self.b.clamp(B_MIN, B_MAX)
    }

    /// Lower asymptote actually used by the model
    #[inline]
    pub fn guessing(&self) -> f64 {
        match self.model {
            IrtModel::ThreePl => self.c.clamp(C_MIN, C_MAX),
            IrtModel::OnePl | IrtModel::TwoPl => 0.0,
        }
    }

    /// Provisional 2PL item from a legacy Elo difficulty rating
    pub fn from_elo(difficulty_elo: f64) -> Self {
        let b = if difficulty_elo.is_finite() {
            ((difficulty_elo - ELO_CENTER) / ELO_PER_LOGIT).clamp(B_MIN, B_MAX)
        } else {
            0.0
        };
        Self {
            model: IrtModel::TwoPl,
            a: 1.0,
            b,
            c: 0.0,
        }
    }

    /// Provisional 2PL item from a corpus proportion-correct
    ///
    /// An item answered correctly by a fraction `p` of learners with average
    /// ability sits at `b = -logit(p)`.
    pub fn from_p_value(p: f64) -> Self {
        let p = if p.is_finite() { p.clamp(0.01, 0.99) } else { 0.5 };
        let b = (-(p / (1.0 - p)).ln()).clamp(B_MIN, B_MAX);
        Self {
            model: IrtModel::TwoPl,
            a: 1.0,
            b,
            c: 0.0,
        }
    }
}

/// A selectable item with its externally tracked exposure count
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemCandidate {
    pub id: String,
    pub params: ItemParameter,
    /// How often this item has been shown (tie-breaker, lower wins)
    pub usage_count: u32,
}

impl ItemCandidate {
    pub fn new(id: impl Into<String>, params: ItemParameter, usage_count: u32) -> Self {
        Self {
            id: id.into(),
            params,
            usage_count,
        }
    }
}

// ==================== Response Types ====================

/// One recorded answer, referring to an item by its index in the item pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub item: usize,
    pub correct: bool,
}

impl Response {
    pub fn new(item: usize, correct: bool) -> Self {
        Self { item, correct }
    }

    #[inline]
    pub fn score(&self) -> f64 {
        if self.correct {
            1.0
        } else {
            0.0
        }
    }
}

/// Respondents × items matrix of dichotomous responses (None = not administered)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseMatrix {
    n_items: usize,
    rows: Vec<Vec<Option<bool>>>,
}

impl ResponseMatrix {
    pub fn new(n_items: usize, rows: Vec<Vec<Option<bool>>>) -> Result<Self> {
        for row in &rows {
            if row.len() != n_items {
                return Err(IrtError::DimensionMismatch {
                    what: "response matrix row",
                    expected: n_items,
                    found: row.len(),
                });
            }
        }
        Ok(Self { n_items, rows })
    }

    /// Rows already known to be `n_items` wide
    pub(crate) fn from_rows_unchecked(n_items: usize, rows: Vec<Vec<Option<bool>>>) -> Self {
        Self { n_items, rows }
    }

    /// Build from a fully observed boolean grid
    pub fn from_complete(rows: Vec<Vec<bool>>) -> Result<Self> {
        let n_items = rows.first().map(|r| r.len()).unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Some).collect())
            .collect();
        Self::new(n_items, rows)
    }

    pub fn n_respondents(&self) -> usize {
        self.rows.len()
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    #[inline]
    pub fn get(&self, respondent: usize, item: usize) -> Option<bool> {
        self.rows
            .get(respondent)
            .and_then(|row| row.get(item))
            .copied()
            .flatten()
    }

    pub fn rows(&self) -> &[Vec<Option<bool>>] {
        &self.rows
    }

    /// A respondent's observed answers as a response history
    pub fn responses_for(&self, respondent: usize) -> Vec<Response> {
        self.rows
            .get(respondent)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter_map(|(item, cell)| cell.map(|correct| Response::new(item, correct)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of observed responses for an item
    pub fn item_response_count(&self, item: usize) -> usize {
        self.rows
            .iter()
            .filter(|row| row.get(item).copied().flatten().is_some())
            .count()
    }
}

// ==================== Estimate Types ====================

/// Ability estimation algorithm
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimationMethod {
    /// Maximum likelihood via Newton-Raphson
    Mle,
    /// Expected a posteriori via quadrature
    Eap,
    /// MLE when the history supports it, EAP otherwise
    Auto,
}

/// Outcome flag attached to every estimate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimateStatus {
    /// Regular estimate
    Estimated,
    /// MLE hit its iteration cap; last iterate returned
    NonConverged,
    /// All-correct or all-incorrect history; fallback substituted
    ExtremePattern,
    /// No responses yet; prior returned
    PriorOnly,
}

/// A learner's ability on one dimension
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThetaEstimate {
    pub theta: f64,
    pub se: f64,
    /// Method that actually produced the value
    pub method: EstimationMethod,
    pub status: EstimateStatus,
    pub iterations: u32,
}

impl ThetaEstimate {
    /// Theta clamped to the reporting range [-3, 3]
    pub fn reporting_theta(&self) -> f64 {
        self.theta.clamp(-THETA_REPORT_BOUND, THETA_REPORT_BOUND)
    }

    pub fn is_extreme_pattern(&self) -> bool {
        self.status == EstimateStatus::ExtremePattern
    }

    /// Confidence in [0, 1), grows as the standard error shrinks
    pub fn confidence(&self) -> f64 {
        1.0 / (1.0 + self.se.max(0.0))
    }
}

// ==================== Multidimensional Types ====================

/// Linguistic ability components
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Lexical,
    Syntactic,
    Morphological,
    Phonological,
    Pragmatic,
}

impl Component {
    pub const ALL: [Component; COMPONENT_COUNT] = [
        Component::Lexical,
        Component::Syntactic,
        Component::Morphological,
        Component::Phonological,
        Component::Pragmatic,
    ];

    pub fn to_index(&self) -> usize {
        match self {
            Component::Lexical => 0,
            Component::Syntactic => 1,
            Component::Morphological => 2,
            Component::Phonological => 3,
            Component::Pragmatic => 4,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Component::Lexical => "LEX",
            Component::Syntactic => "SYNT",
            Component::Morphological => "MORPH",
            Component::Phonological => "PHON",
            Component::Pragmatic => "PRAG",
        }
    }
}

/// Accepts the short code or the full name, case-insensitively
impl FromStr for Component {
    type Err = IrtError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "LEX" | "LEXICAL" => Ok(Component::Lexical),
            "SYNT" | "SYNTACTIC" => Ok(Component::Syntactic),
            "MORPH" | "MORPHOLOGICAL" => Ok(Component::Morphological),
            "PHON" | "PHONOLOGICAL" => Ok(Component::Phonological),
            "PRAG" | "PRAGMATIC" => Ok(Component::Pragmatic),
            _ => Err(IrtError::UnknownComponent(s.to_string())),
        }
    }
}

/// One task's distribution of credit across components
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QMatrixRow {
    weights: [f64; COMPONENT_COUNT],
    primary: Option<Component>,
}

impl QMatrixRow {
    /// Weights must be finite, non-negative and sum to 1.0
    pub fn new(weights: [f64; COMPONENT_COUNT]) -> Result<Self> {
        sanitize::validate_q_weights(&weights)?;
        Ok(Self {
            weights,
            primary: None,
        })
    }

    /// Same as [`QMatrixRow::new`], additionally requiring the task's main
    /// component to carry at least half of the weight
    pub fn with_primary(weights: [f64; COMPONENT_COUNT], primary: Component) -> Result<Self> {
        let row = Self {
            weights,
            primary: Some(primary),
        };
        row.validate()?;
        Ok(row)
    }

    /// Re-check a row that may have arrived through deserialization
    pub fn validate(&self) -> Result<()> {
        sanitize::validate_q_weights(&self.weights)?;
        if let Some(primary) = self.primary {
            if self.weights[primary.to_index()] + Q_SUM_TOLERANCE < 0.5 {
                return Err(IrtError::InvalidQMatrix {
                    sum: self.weights.iter().sum(),
                    reason: "primary component carries less than half of the weight",
                });
            }
        }
        Ok(())
    }

    /// Build from `(component code, weight)` pairs, unnamed components get 0
    pub fn from_pairs(pairs: &[(Component, f64)]) -> Result<Self> {
        let mut weights = [0.0; COMPONENT_COUNT];
        for (component, w) in pairs {
            weights[component.to_index()] += *w;
        }
        Self::new(weights)
    }

    pub fn weights(&self) -> &[f64; COMPONENT_COUNT] {
        &self.weights
    }

    pub fn weight(&self, component: Component) -> f64 {
        self.weights[component.to_index()]
    }

    pub fn primary(&self) -> Option<Component> {
        self.primary
    }

    /// Components with non-zero weight
    pub fn active(&self) -> impl Iterator<Item = usize> + '_ {
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .map(|(i, _)| i)
    }
}

/// Five-component ability vector, each theta in [-3, 3]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentThetaProfile {
    pub thetas: [f64; COMPONENT_COUNT],
}

impl Default for ComponentThetaProfile {
    fn default() -> Self {
        Self {
            thetas: [0.0; COMPONENT_COUNT],
        }
    }
}

impl ComponentThetaProfile {
    pub fn new(thetas: [f64; COMPONENT_COUNT]) -> Result<Self> {
        for (i, &t) in thetas.iter().enumerate() {
            if !t.is_finite() || t.abs() > THETA_REPORT_BOUND {
                return Err(IrtError::InvalidParameter {
                    field: Component::ALL[i].code(),
                    value: t,
                    reason: "component theta must lie in [-3, 3]",
                });
            }
        }
        Ok(Self { thetas })
    }

    pub fn theta(&self, component: Component) -> f64 {
        self.thetas[component.to_index()]
    }

    /// Scalar summary of the profile as seen by one task
    pub fn weighted_theta(&self, q_row: &QMatrixRow) -> f64 {
        self.thetas
            .iter()
            .zip(q_row.weights().iter())
            .map(|(t, w)| t * w)
            .sum()
    }
}

/// Partial-credit scores per component, each in [0, 1]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    scores: [f64; COMPONENT_COUNT],
}

impl ComponentScores {
    pub fn new(scores: [f64; COMPONENT_COUNT]) -> Result<Self> {
        for (i, &s) in scores.iter().enumerate() {
            if !s.is_finite() || !(0.0..=1.0).contains(&s) {
                return Err(IrtError::InvalidScore {
                    component: Component::ALL[i].code(),
                    value: s,
                });
            }
        }
        Ok(Self { scores })
    }

    /// Same score on every component
    pub fn uniform(score: f64) -> Result<Self> {
        Self::new([score; COMPONENT_COUNT])
    }

    pub fn scores(&self) -> &[f64; COMPONENT_COUNT] {
        &self.scores
    }
}

// ==================== Calibration Types ====================

/// EM output for one item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub item: ItemParameter,
    /// Joint marginal log-likelihood after each EM iteration
    pub log_likelihood_trace: Vec<f64>,
    pub iterations: u32,
    pub converged: bool,
    /// Parameters returned unchanged because the data was too sparse
    pub low_data: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_constructors_reject_out_of_range() {
        assert!(ItemParameter::two_pl(1.0, 0.0).is_ok());
        assert!(ItemParameter::two_pl(0.1, 0.0).is_err());
        assert!(ItemParameter::two_pl(1.0, 4.5).is_err());
        assert!(ItemParameter::three_pl(1.0, 0.0, 0.6).is_err());
        assert!(ItemParameter::three_pl(1.0, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_effective_parameters_follow_model() {
        let rasch = ItemParameter::one_pl(0.5).unwrap();
        assert_eq!(rasch.discrimination(), 1.0);
        assert_eq!(rasch.guessing(), 0.0);

        let item = ItemParameter {
            model: IrtModel::TwoPl,
            a: 1.5,
            b: 0.0,
            c: 0.3,
        };
        assert_eq!(item.guessing(), 0.0);
    }

    #[test]
    fn test_from_elo_conversion() {
        let item = ItemParameter::from_elo(1200.0);
        assert!((item.b - 0.0).abs() < 1e-10);
        let hard = ItemParameter::from_elo(1600.0);
        assert!((hard.b - 1.0).abs() < 1e-10);
        let absurd = ItemParameter::from_elo(10_000.0);
        assert_eq!(absurd.b, B_MAX);
    }

    #[test]
    fn test_from_p_value() {
        assert!(ItemParameter::from_p_value(0.5).b.abs() < 1e-12);
        assert!(ItemParameter::from_p_value(0.9).b < 0.0);
        assert!(ItemParameter::from_p_value(0.1).b > 0.0);
    }

    #[test]
    fn test_response_matrix_shape_checked() {
        let bad = ResponseMatrix::new(3, vec![vec![Some(true), None]]);
        assert!(matches!(bad, Err(IrtError::DimensionMismatch { .. })));

        let m = ResponseMatrix::new(2, vec![vec![Some(true), None], vec![Some(false), Some(true)]])
            .unwrap();
        assert_eq!(m.n_respondents(), 2);
        assert_eq!(m.item_response_count(1), 1);
        assert_eq!(m.responses_for(0), vec![Response::new(0, true)]);
    }

    #[test]
    fn test_q_matrix_row_validation() {
        assert!(QMatrixRow::new([0.5, 0.3, 0.2, 0.0, 0.0]).is_ok());
        assert!(QMatrixRow::new([0.5, 0.3, 0.3, 0.0, 0.0]).is_err());
        assert!(QMatrixRow::new([1.2, -0.2, 0.0, 0.0, 0.0]).is_err());
        assert!(QMatrixRow::with_primary([0.4, 0.3, 0.3, 0.0, 0.0], Component::Lexical).is_err());
        assert!(QMatrixRow::with_primary([0.6, 0.4, 0.0, 0.0, 0.0], Component::Lexical).is_ok());
    }

    #[test]
    fn test_component_codes_roundtrip() {
        for c in Component::ALL {
            assert_eq!(c.code().parse::<Component>().unwrap(), c);
            assert_eq!(c.code().to_lowercase().parse::<Component>().unwrap(), c);
        }
        assert_eq!("Pragmatic".parse::<Component>().unwrap(), Component::Pragmatic);
        let err = "unknown".parse::<Component>().unwrap_err();
        assert!(matches!(err, IrtError::UnknownComponent(ref name) if name == "unknown"));
    }

    #[test]
    fn test_scores_bounded() {
        assert!(ComponentScores::uniform(1.0).is_ok());
        assert!(ComponentScores::new([0.5, 1.1, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_profile_rejects_out_of_range() {
        assert!(ComponentThetaProfile::new([0.0, 3.0, -3.0, 1.0, 0.0]).is_ok());
        assert!(ComponentThetaProfile::new([0.0, 3.5, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_estimate_serialization_roundtrip() {
        let est = ThetaEstimate {
            theta: 1.25,
            se: 0.4,
            method: EstimationMethod::Eap,
            status: EstimateStatus::Estimated,
            iterations: 0,
        };
        let json = serde_json::to_value(est).unwrap();
        let restored: ThetaEstimate = serde_json::from_value(json).unwrap();
        assert_eq!(est, restored);
    }
}
