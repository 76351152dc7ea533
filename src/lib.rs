//! # danci-irt - psychometric core for adaptive vocabulary learning
//!
//! Pure Rust implementations of the measurement side of an adaptive learner:
//!
//! - **IRT models** - 1PL / 2PL / 3PL response probabilities and derivatives
//! - **Quadrature** - Gauss-Hermite rules (5/11/21/41 points) and a uniform grid
//! - **Ability estimation** - MLE (Newton-Raphson) and EAP, with automatic choice
//! - **Item selection** - Fisher information and KL index ranking for CAT
//! - **Calibration** - Bock-Aitkin EM re-estimation of item parameters
//! - **Multidimensional updates** - five-component ability profile driven by a Q-matrix
//!
//! ## Modules
//!
//! - [`irt`] - probability models, information, log-likelihood
//! - [`quadrature`] - integration rules over normal priors
//! - [`estimation`] - MLE / EAP / Auto theta estimation
//! - [`selection`] - next-item ranking from a point estimate or a full posterior
//! - [`calibration`] - EM item calibration
//! - [`mirt`] - compensatory / conjunctive / disjunctive component updates
//! - [`simulation`] - seeded response generation
//! - [`config`] - tunable parameters, JSON loading
//! - [`matrix`] - small dense solves for the M-step
//! - [`sanitize`] - numeric guards and validation
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use danci_irt::{
//!     estimate_theta, select_next_item, EstimationMethod, EstimatorConfig, ItemCandidate,
//!     ItemParameter, Response, SelectionStrategy, SelectorConfig,
//! };
//!
//! let items: Vec<ItemParameter> = (0..5)
//!     .map(|i| ItemParameter::two_pl(1.0, -1.0 + 0.5 * i as f64).unwrap())
//!     .collect();
//! let history = vec![Response::new(0, true), Response::new(4, false)];
//! let estimate = estimate_theta(
//!     &history,
//!     &items,
//!     EstimationMethod::Eap,
//!     None,
//!     &EstimatorConfig::default(),
//! )
//! .unwrap();
//!
//! let pool: Vec<ItemCandidate> = items[1..4]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, item)| ItemCandidate::new(format!("word-{i}"), *item, 0))
//!     .collect();
//! let config = SelectorConfig::default();
//! let next = select_next_item(&estimate, &pool, SelectionStrategy::Auto, &config).unwrap();
//! assert!(next.is_some());
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod error;
pub mod types;
pub mod sanitize;
pub mod matrix;
pub mod config;
pub mod irt;
pub mod quadrature;
pub mod estimation;
pub mod selection;
pub mod calibration;
pub mod mirt;
pub mod simulation;

// ============================================================================
// Re-exports
// ============================================================================

/// Shared types and constants
pub use types::*;

pub use error::{IrtError, Result};

pub use config::{
    CalibrationConfig, EstimatorConfig, ExtremePatternFallback, IrtConfig, MirtConfig,
    SelectorConfig,
};

pub use irt::{
    item_information, log_likelihood, probability, response_curve, standard_error,
    test_information, ResponseCurve,
};

pub use quadrature::{
    default_rule, gauss_hermite_rule, integrate_normal, uniform_rule, QuadraturePrecision,
    QuadratureRule, RuleKind,
};

pub use estimation::{
    estimate_theta, estimate_theta_batch, expected_a_posteriori_posterior, Posterior,
};

pub use selection::{
    kl_index, kl_index_posterior, rank_items, rank_items_from_posterior, select_next_item,
    select_next_item_from_posterior, ItemSelection, RankedItem, SelectionStrategy,
};

pub use calibration::{calibrate, calibrate_items, CalibrationReport, EmState};

pub use mirt::{
    boundary_decay, expected_task_probability, update_component_theta, ComponentUpdate,
    InteractionModel, MirtTask,
};

pub use simulation::{sample_abilities, simulate_responses};
