//! Tunable parameters
//!
//! Every component takes its own config struct; `IrtConfig` bundles them so a
//! host can load the whole set from one JSON document. Missing fields fall
//! back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{IrtError, Result};
use crate::quadrature::{DEFAULT_GAUSS_HERMITE_POINTS, SUPPORTED_GAUSS_HERMITE_SIZES};

/// What MLE returns for an all-correct / all-incorrect history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtremePatternFallback {
    /// Prior mean with the prior SD
    PriorMean,
    /// A full EAP estimate
    Eap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub prior_mean: f64,
    pub prior_sd: f64,
    /// Gauss-Hermite size used when no rule is passed in
    pub quadrature_points: usize,
    pub mle_max_iterations: u32,
    /// Convergence threshold on |Δθ|
    pub mle_tolerance: f64,
    /// |L2| below this aborts Newton-Raphson
    pub curvature_epsilon: f64,
    /// Largest single Newton step in logits
    pub max_newton_step: f64,
    /// Mixed-outcome responses required before `Auto` picks MLE
    pub min_mle_responses: usize,
    pub extreme_pattern_fallback: ExtremePatternFallback,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            prior_mean: 0.0,
            prior_sd: 1.0,
            quadrature_points: DEFAULT_GAUSS_HERMITE_POINTS,
            mle_max_iterations: 50,
            mle_tolerance: 0.001,
            curvature_epsilon: 1e-8,
            max_newton_step: 1.0,
            min_mle_responses: 5,
            extreme_pattern_fallback: ExtremePatternFallback::PriorMean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// `Auto` switches from KL to Fisher once se drops to this value
    pub kl_se_threshold: f64,
    pub quadrature_points: usize,
    /// Scores closer than this are treated as ties
    pub tie_tolerance: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            kl_se_threshold: 0.5,
            quadrature_points: DEFAULT_GAUSS_HERMITE_POINTS,
            tie_tolerance: 1e-12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub max_iterations: u32,
    /// Stop once the joint log-likelihood moves less than this
    pub tolerance: f64,
    pub quadrature_points: usize,
    pub min_responses_per_item: usize,
    pub min_items: usize,
    pub min_respondents: usize,
    /// Fisher-scoring steps per item per M-step
    pub m_step_iterations: u32,
    /// Ridge added to the item information matrix
    pub ridge: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-4,
            quadrature_points: DEFAULT_GAUSS_HERMITE_POINTS,
            min_responses_per_item: 5,
            min_items: 10,
            min_respondents: 10,
            m_step_iterations: 10,
            ridge: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirtConfig {
    /// Elo-style step size K
    pub k_factor: f64,
}

impl Default for MirtConfig {
    fn default() -> Self {
        Self { k_factor: 0.3 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrtConfig {
    pub estimator: EstimatorConfig,
    pub selector: SelectorConfig,
    pub calibration: CalibrationConfig,
    pub mirt: MirtConfig,
}

impl IrtConfig {
    /// Parse and validate a (possibly partial) JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: IrtConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.estimator.validate()?;
        self.selector.validate()?;
        self.calibration.validate()?;
        self.mirt.validate()
    }
}

fn check_rule_size(field: &str, n: usize) -> Result<()> {
    if SUPPORTED_GAUSS_HERMITE_SIZES.contains(&n) {
        Ok(())
    } else {
        Err(IrtError::InvalidConfig(format!(
            "{field} must be one of {SUPPORTED_GAUSS_HERMITE_SIZES:?}, got {n}"
        )))
    }
}

fn check_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(IrtError::InvalidConfig(format!(
            "{field} must be positive and finite, got {value}"
        )))
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.prior_mean.is_finite() {
            return Err(IrtError::InvalidConfig(format!(
                "prior_mean must be finite, got {}",
                self.prior_mean
            )));
        }
        check_positive("prior_sd", self.prior_sd)?;
        check_rule_size("estimator.quadrature_points", self.quadrature_points)?;
        check_positive("mle_tolerance", self.mle_tolerance)?;
        check_positive("curvature_epsilon", self.curvature_epsilon)?;
        check_positive("max_newton_step", self.max_newton_step)?;
        if self.mle_max_iterations == 0 {
            return Err(IrtError::InvalidConfig(
                "mle_max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> Result<()> {
        check_positive("kl_se_threshold", self.kl_se_threshold)?;
        check_rule_size("selector.quadrature_points", self.quadrature_points)?;
        if !self.tie_tolerance.is_finite() || self.tie_tolerance < 0.0 {
            return Err(IrtError::InvalidConfig(format!(
                "tie_tolerance must be non-negative, got {}",
                self.tie_tolerance
            )));
        }
        Ok(())
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        check_positive("calibration.tolerance", self.tolerance)?;
        check_rule_size("calibration.quadrature_points", self.quadrature_points)?;
        if self.max_iterations == 0 || self.m_step_iterations == 0 {
            return Err(IrtError::InvalidConfig(
                "calibration iteration caps must be at least 1".to_string(),
            ));
        }
        if !self.ridge.is_finite() || self.ridge < 0.0 {
            return Err(IrtError::InvalidConfig(format!(
                "ridge must be non-negative, got {}",
                self.ridge
            )));
        }
        Ok(())
    }
}

impl MirtConfig {
    /// K is capped at 3 so a single update can never step past the ±3 bound
    pub fn validate(&self) -> Result<()> {
        if !self.k_factor.is_finite() || self.k_factor <= 0.0 || self.k_factor > 3.0 {
            return Err(IrtError::InvalidConfig(format!(
                "k_factor must lie in (0, 3], got {}",
                self.k_factor
            )));
        }
        Ok(())
    }
}
