//! Multidimensional component updater
//!
//! Tracks five linguistic abilities (LEX, SYNT, MORPH, PHON, PRAG) and moves
//! them after each task in proportion to the task's Q-matrix row:
//!
//!   Δθᵢ = K · Qᵢ · (observed - expected) · max(0, 1 - |θᵢ|/3)
//!
//! followed by a clamp to [-3, 3]. How the per-component abilities combine
//! into an expected outcome, and how partial scores combine into an observed
//! credit, depends on the interaction model:
//!
//! - Compensatory: P = c + (1 - c)·σ(Σ Qᵢaᵢθᵢ + d), d = -Σ Qᵢaᵢbᵢ;
//!   observed = Σ Qᵢsᵢ
//! - Conjunctive: P = Π Pᵢ over active components; observed = min sᵢ
//! - Disjunctive: P = 1 - Π (1 - Pᵢ); observed = max sᵢ
//!
//! Pᵢ is the component's own 2PL/3PL probability at θᵢ. The conjunctive and
//! disjunctive forms are plain products of those probabilities: there is no
//! mastery cut-off, Q weights do not enter the expectation, and every active
//! component counts fully. The weights only split the residual across
//! components in the update.

use serde::{Deserialize, Serialize};

use crate::config::MirtConfig;
use crate::error::{IrtError, Result};
use crate::irt::{probability, sigmoid};
use crate::sanitize::validate_item_parameter;
use crate::types::{
    ComponentScores, ComponentThetaProfile, IrtModel, ItemParameter, QMatrixRow, COMPONENT_COUNT,
    C_MAX, C_MIN, THETA_REPORT_BOUND,
};

/// How component abilities combine within one task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionModel {
    /// Strength on one component offsets weakness on another
    Compensatory,
    /// Every active component is required
    Conjunctive,
    /// Any one active component suffices
    Disjunctive,
}

/// A task with its Q-matrix row and per-component item parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MirtTask {
    pub q_row: QMatrixRow,
    pub discrimination: [f64; COMPONENT_COUNT],
    pub difficulty: [f64; COMPONENT_COUNT],
    pub guessing: f64,
}

impl MirtTask {
    pub fn new(
        q_row: QMatrixRow,
        discrimination: [f64; COMPONENT_COUNT],
        difficulty: [f64; COMPONENT_COUNT],
        guessing: f64,
    ) -> Result<Self> {
        let task = Self {
            q_row,
            discrimination,
            difficulty,
            guessing,
        };
        task.validate()?;
        Ok(task)
    }

    /// Unit discrimination and zero difficulty on every component
    pub fn neutral(q_row: QMatrixRow) -> Self {
        Self {
            q_row,
            discrimination: [1.0; COMPONENT_COUNT],
            difficulty: [0.0; COMPONENT_COUNT],
            guessing: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.q_row.validate()?;
        if !self.guessing.is_finite() || self.guessing < C_MIN || self.guessing > C_MAX {
            return Err(IrtError::invalid(
                "guessing",
                self.guessing,
                "guessing must lie in [0.0, 0.5]",
            ));
        }
        (0..COMPONENT_COUNT).try_for_each(|i| validate_item_parameter(&self.component_item(i)))
    }

    /// The unidimensional item seen by component `i`
    pub fn component_item(&self, i: usize) -> ItemParameter {
        ItemParameter {
            model: if self.guessing > 0.0 {
                IrtModel::ThreePl
            } else {
                IrtModel::TwoPl
            },
            a: self.discrimination[i],
            b: self.difficulty[i],
            c: self.guessing,
        }
    }
}

/// Result of one component update
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentUpdate {
    pub profile: ComponentThetaProfile,
    /// Applied change per component, after clamping
    pub deltas: [f64; COMPONENT_COUNT],
    pub expected: f64,
    pub observed: f64,
}

/// Shrinks updates to zero as θ approaches ±3
#[inline]
pub fn boundary_decay(theta: f64) -> f64 {
    (1.0 - theta.abs() / THETA_REPORT_BOUND).max(0.0)
}

/// Probability of success on a task without updating anything
pub fn expected_task_probability(
    profile: &ComponentThetaProfile,
    task: &MirtTask,
    model: InteractionModel,
) -> f64 {
    let weights = task.q_row.weights();
    match model {
        InteractionModel::Compensatory => {
            let (slope, intercept) = task.q_row.active().fold((0.0, 0.0), |(s, d), i| {
                let qa = weights[i] * task.component_item(i).discrimination();
                (
                    s + qa * profile.thetas[i],
                    d - qa * task.component_item(i).difficulty(),
                )
            });
            let c = task.guessing.clamp(C_MIN, C_MAX);
            c + (1.0 - c) * sigmoid(slope + intercept)
        }
        InteractionModel::Conjunctive => task
            .q_row
            .active()
            .map(|i| probability(profile.thetas[i], &task.component_item(i)))
            .product(),
        InteractionModel::Disjunctive => {
            1.0 - task
                .q_row
                .active()
                .map(|i| 1.0 - probability(profile.thetas[i], &task.component_item(i)))
                .product::<f64>()
        }
    }
}

/// Observed credit for a task given per-component partial scores
pub fn observed_credit(scores: &ComponentScores, q_row: &QMatrixRow, model: InteractionModel) -> f64 {
    let s = scores.scores();
    match model {
        InteractionModel::Compensatory => q_row.active().map(|i| q_row.weights()[i] * s[i]).sum(),
        InteractionModel::Conjunctive => q_row.active().map(|i| s[i]).fold(1.0, f64::min),
        InteractionModel::Disjunctive => q_row.active().map(|i| s[i]).fold(0.0, f64::max),
    }
}

/// Move each component toward the evidence of one task
pub fn update_component_theta(
    profile: &ComponentThetaProfile,
    task: &MirtTask,
    scores: &ComponentScores,
    model: InteractionModel,
    config: &MirtConfig,
) -> Result<ComponentUpdate> {
    config.validate()?;
    task.validate()?;
    ComponentThetaProfile::new(profile.thetas)?;
    ComponentScores::new(*scores.scores())?;

    let expected = expected_task_probability(profile, task, model);
    let observed = observed_credit(scores, &task.q_row, model);
    let residual = observed - expected;

    let mut thetas = profile.thetas;
    let mut deltas = [0.0; COMPONENT_COUNT];
    for i in task.q_row.active() {
        let raw = config.k_factor * task.q_row.weights()[i] * residual * boundary_decay(thetas[i]);
        let next = (thetas[i] + raw).clamp(-THETA_REPORT_BOUND, THETA_REPORT_BOUND);
        deltas[i] = next - thetas[i];
        thetas[i] = next;
    }

    tracing::debug!(
        model = ?model,
        expected,
        observed,
        deltas = ?deltas,
        "component thetas updated"
    );

    Ok(ComponentUpdate {
        profile: ComponentThetaProfile { thetas },
        deltas,
        expected,
        observed,
    })
}
