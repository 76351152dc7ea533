//! Numeric guards and boundary validation
//!
//! Validation functions reject malformed inputs so upstream data-quality bugs
//! stay visible. Clamping helpers keep internal evaluations finite.

use crate::error::{IrtError, Result};
use crate::types::{
    ItemParameter, A_MAX, A_MIN, B_MAX, B_MIN, COMPONENT_COUNT, C_MAX, C_MIN, EPSILON,
    EXPONENT_CLAMP, Q_SUM_TOLERANCE, THETA_MAX, THETA_MIN,
};

/// True when any value is NaN or infinite
pub fn has_invalid_values(arr: &[f64]) -> bool {
    arr.iter().any(|&x| x.is_nan() || x.is_infinite())
}

/// Reject item parameters outside their declared ranges
pub fn validate_item_parameter(item: &ItemParameter) -> Result<()> {
    if !item.a.is_finite() || item.a < A_MIN || item.a > A_MAX {
        return Err(IrtError::invalid(
            "a",
            item.a,
            "discrimination must lie in [0.2, 3.0]",
        ));
    }
    if !item.b.is_finite() || item.b < B_MIN || item.b > B_MAX {
        return Err(IrtError::invalid(
            "b",
            item.b,
            "difficulty must lie in [-4.0, 4.0]",
        ));
    }
    if !item.c.is_finite() || item.c < C_MIN || item.c > C_MAX {
        return Err(IrtError::invalid(
            "c",
            item.c,
            "guessing must lie in [0.0, 0.5]",
        ));
    }
    Ok(())
}

/// Validate every item in a pool
pub fn validate_item_pool(items: &[ItemParameter]) -> Result<()> {
    items.iter().try_for_each(validate_item_parameter)
}

/// Q-matrix weights: finite, non-negative, summing to one
pub fn validate_q_weights(weights: &[f64; COMPONENT_COUNT]) -> Result<()> {
    let sum: f64 = weights.iter().sum();
    if has_invalid_values(weights) {
        return Err(IrtError::InvalidQMatrix {
            sum,
            reason: "weights must be finite",
        });
    }
    if weights.iter().any(|&w| w < 0.0) {
        return Err(IrtError::InvalidQMatrix {
            sum,
            reason: "weights must be non-negative",
        });
    }
    if (sum - 1.0).abs() > Q_SUM_TOLERANCE {
        return Err(IrtError::InvalidQMatrix {
            sum,
            reason: "weights must sum to 1.0",
        });
    }
    Ok(())
}

/// Ensure a theta argument is a usable number
pub fn validate_theta(theta: f64) -> Result<()> {
    if theta.is_finite() {
        Ok(())
    } else {
        Err(IrtError::invalid("theta", theta, "theta must be finite"))
    }
}

/// Clamp a logistic exponent to [-35, 35]
#[inline]
pub fn clamp_exponent(z: f64) -> f64 {
    if z.is_nan() {
        0.0
    } else {
        z.clamp(-EXPONENT_CLAMP, EXPONENT_CLAMP)
    }
}

/// Keep a probability away from 0 and 1 before taking logs
#[inline]
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.5
    } else {
        p.clamp(EPSILON, 1.0 - EPSILON)
    }
}

/// Map a theta onto the hard estimation range, NaN collapses to the centre
#[inline]
pub fn sanitize_theta(theta: f64) -> f64 {
    if theta.is_nan() {
        0.0
    } else {
        theta.clamp(THETA_MIN, THETA_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IrtModel;

    #[test]
    fn test_has_invalid_values() {
        assert!(!has_invalid_values(&[1.0, 2.0, 3.0]));
        assert!(has_invalid_values(&[1.0, f64::NAN, 3.0]));
        assert!(has_invalid_values(&[1.0, f64::INFINITY, 3.0]));
    }

    #[test]
    fn test_validate_item_parameter_bounds() {
        let ok = ItemParameter {
            model: IrtModel::ThreePl,
            a: 3.0,
            b: -4.0,
            c: 0.5,
        };
        assert!(validate_item_parameter(&ok).is_ok());

        let bad_a = ItemParameter { a: 0.0, ..ok };
        assert!(validate_item_parameter(&bad_a).is_err());

        let bad_c = ItemParameter { c: 1.0, ..ok };
        assert!(validate_item_parameter(&bad_c).is_err());
    }

    #[test]
    fn test_validate_q_weights() {
        assert!(validate_q_weights(&[0.2; 5]).is_ok());
        assert!(validate_q_weights(&[0.25; 5]).is_err());
        assert!(validate_q_weights(&[f64::NAN, 1.0, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_exponent(100.0), EXPONENT_CLAMP);
        assert_eq!(clamp_exponent(-100.0), -EXPONENT_CLAMP);
        assert_eq!(clamp_exponent(f64::NAN), 0.0);
        assert!(clamp_probability(0.0) > 0.0);
        assert!(clamp_probability(1.0) < 1.0);
        assert_eq!(sanitize_theta(f64::NAN), 0.0);
        assert_eq!(sanitize_theta(9.0), THETA_MAX);
    }
}
