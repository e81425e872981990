//! Activation functions applied to a layer's whole output vector.
//!
//! Activations operate on the full vector of raw node outputs because some
//! of them (softmax) couple the nodes together. Derivatives are expressed in
//! terms of the activated outputs, so back-propagation never needs the raw
//! pre-activation values.

use crate::analysis::vector;
use crate::config::ActivationKind;

/// Stateless activation function shared by every node of a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    /// `0.5 * (1 + tanh(alpha * x / 2))`, applied elementwise
    Logistic { alpha: f64 },
    /// Overflow-safe softmax; a single-output layer falls back to logistic
    SoftMax { alpha: f64 },
}

impl Activation {
    pub fn logistic(alpha: f64) -> Self {
        Activation::Logistic { alpha }
    }

    pub fn softmax(alpha: f64) -> Self {
        Activation::SoftMax { alpha }
    }

    pub fn from_kind(kind: ActivationKind, alpha: f64) -> Self {
        match kind {
            ActivationKind::Logistic => Activation::logistic(alpha),
            ActivationKind::SoftMax => Activation::softmax(alpha),
        }
    }

    /// Activate the whole raw output vector
    pub fn y(&self, outputs: &[f64]) -> Vec<f64> {
        match *self {
            Activation::Logistic { alpha } => logistic(outputs, alpha),
            Activation::SoftMax { alpha } if outputs.len() == 1 => logistic(outputs, alpha),
            Activation::SoftMax { alpha } => {
                let Some(max) = vector::max(outputs) else {
                    return Vec::new();
                };
                let exps: Vec<f64> = outputs
                    .iter()
                    .map(|x| (alpha * (x - max)).exp())
                    .collect();
                let z: f64 = exps.iter().sum();
                exps.into_iter().map(|e| e / z).collect()
            }
        }
    }

    /// Component `i` of the activated vector
    pub fn y_at(&self, outputs: &[f64], i: usize) -> f64 {
        match *self {
            Activation::Logistic { alpha } => logistic_scalar(outputs[i], alpha),
            Activation::SoftMax { .. } => self.y(outputs)[i],
        }
    }

    /// Derivative of activated output `k` with respect to each raw input,
    /// given the activated `outputs`
    pub fn dydk(&self, k: usize, outputs: &[f64]) -> Vec<f64> {
        (0..outputs.len())
            .map(|i| self.dydk_at(k, outputs, i))
            .collect()
    }

    /// Component `i` of [`Activation::dydk`]
    pub fn dydk_at(&self, k: usize, outputs: &[f64], i: usize) -> f64 {
        match *self {
            Activation::SoftMax { .. } if outputs.len() > 1 => {
                let kronecker = if i == k { 1.0 } else { 0.0 };
                (kronecker - outputs[i]) * outputs[k]
            }
            _ => (1.0 - outputs[i]) * outputs[k],
        }
    }
}

fn logistic_scalar(x: f64, alpha: f64) -> f64 {
    0.5 * (1.0 + (alpha * 0.5 * x).tanh())
}

fn logistic(outputs: &[f64], alpha: f64) -> Vec<f64> {
    outputs.iter().map(|&x| logistic_scalar(x, alpha)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logistic_is_elementwise() {
        let logistic = Activation::logistic(1.0);
        let y = logistic.y(&[0.0, 2.0, -2.0]);
        assert_eq!(y[0], 0.5);
        assert!((y[1] - 1.0 / (1.0 + (-2f64).exp())).abs() < 1e-12);
        assert!((y[1] + y[2] - 1.0).abs() < 1e-12);
        assert_eq!(logistic.y_at(&[0.0, 2.0, -2.0], 1), y[1]);
    }

    #[test]
    fn test_single_output_softmax_matches_logistic() {
        let softmax = Activation::softmax(1.0);
        let logistic = Activation::logistic(1.0);
        for x in [-10.0, -1.0, 0.0, 1.0, 10.0] {
            assert_eq!(softmax.y(&[x]), logistic.y(&[x]));
            let y = softmax.y(&[x]);
            assert_eq!(softmax.dydk_at(0, &y, 0), logistic.dydk_at(0, &y, 0));
        }
    }

    #[test]
    fn test_softmax_sums_to_one_without_overflow() {
        let softmax = Activation::softmax(1.0);
        let y = softmax.y(&[1000.0, 1001.0, 999.0]);
        assert!(y.iter().all(|v| v.is_finite()));
        assert!((y.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(y[1] > y[0] && y[0] > y[2]);
    }

    #[test]
    fn test_softmax_jacobian() {
        let softmax = Activation::softmax(1.0);
        let y = softmax.y(&[1.0, 2.0, 3.0]);
        let d = softmax.dydk(0, &y);
        assert!((d[0] - (1.0 - y[0]) * y[0]).abs() < 1e-12);
        assert!((d[1] + y[1] * y[0]).abs() < 1e-12);
        // Rows of the softmax Jacobian sum to zero
        assert!(d.iter().sum::<f64>().abs() < 1e-12);
    }

    #[test]
    fn test_logistic_derivative_at_half() {
        let logistic = Activation::logistic(1.0);
        assert_eq!(logistic.dydk_at(0, &[0.5], 0), 0.25);
    }

    #[test]
    fn test_from_kind() {
        assert_eq!(
            Activation::from_kind(ActivationKind::SoftMax, 2.0),
            Activation::SoftMax { alpha: 2.0 }
        );
    }
}
