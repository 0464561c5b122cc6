use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{LinearizationError, Result};
use crate::variable::StepPolicy;

/// Finite-difference stencil used for every Jacobian column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifferenceScheme {
    /// `(f(x+h) - f(x-h)) / 2h`, two evaluations per column.
    Central,
    /// `(8·(f(x+h) - f(x-h)) - (f(x+2h) - f(x-2h))) / 12h`, four evaluations per column.
    FourthOrderCentral,
}

impl DifferenceScheme {
    /// Multiples of the step at which the model is probed on each side.
    pub fn multiples(self) -> &'static [f64] {
        match self {
            DifferenceScheme::Central => &[1.0],
            DifferenceScheme::FourthOrderCentral => &[1.0, 2.0],
        }
    }

    pub fn evaluations_per_column(self) -> usize {
        2 * self.multiples().len()
    }

    /// Combines symmetric differences `f(x+kh) - f(x-kh)`, one per multiple `k`.
    pub fn combine(self, differences: &[DVector<f64>], step: f64) -> DVector<f64> {
        match self {
            DifferenceScheme::Central => &differences[0] / (2.0 * step),
            DifferenceScheme::FourthOrderCentral => {
                (&differences[0] * 8.0 - &differences[1]) / (12.0 * step)
            }
        }
    }
}

impl Default for DifferenceScheme {
    fn default() -> Self {
        DifferenceScheme::Central
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearizationSettings {
    /// Step policy for variables whose own policy is `StepPolicy::Default`.
    pub default_step: StepPolicy,
    pub scheme: DifferenceScheme,
    /// Wrap differences of angular outputs into half a turn.
    pub wrap_angles: bool,
    /// Allowed `max |C - I|` before a state feedback run logs a warning.
    pub identity_tolerance: f64,
    /// Columns per worker in parallel runs. `None` spreads columns evenly.
    pub parallel_chunk_size: Option<usize>,
}

impl Default for LinearizationSettings {
    fn default() -> Self {
        Self {
            default_step: StepPolicy::default_relative(),
            scheme: DifferenceScheme::Central,
            wrap_angles: true,
            identity_tolerance: 1e-6,
            parallel_chunk_size: None,
        }
    }
}

impl LinearizationSettings {
    pub fn with_step(mut self, step: StepPolicy) -> Self {
        self.default_step = step;
        self
    }

    pub fn with_scheme(mut self, scheme: DifferenceScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.default_step.is_valid() {
            return Err(LinearizationError::InvalidSettings {
                reason: "default_step must be finite with a positive floor",
            });
        }
        if !(self.identity_tolerance.is_finite() && self.identity_tolerance > 0.0) {
            return Err(LinearizationError::InvalidSettings {
                reason: "identity_tolerance must be positive",
            });
        }
        if self.parallel_chunk_size == Some(0) {
            return Err(LinearizationError::InvalidSettings {
                reason: "parallel_chunk_size must be greater than zero",
            });
        }
        Ok(())
    }
}
