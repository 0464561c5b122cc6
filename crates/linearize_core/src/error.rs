//! Error types for linearize_core.

use std::fmt;

use thiserror::Error;

use crate::variable_set::Role;

/// Which evaluation of the model an error refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// The unperturbed evaluation at the operating point.
    Baseline,
    /// An evaluation with one variable offset from its operating value.
    Perturbed {
        role: Role,
        name: String,
        index: usize,
        offset: f64,
    },
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Baseline => write!(f, "baseline"),
            Probe::Perturbed {
                role,
                name,
                index,
                offset,
            } => write!(
                f,
                "{role} `{name}` (index {index}) offset by {offset:e}"
            ),
        }
    }
}

/// The kind of model response that was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    StateDerivative,
    Output,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::StateDerivative => write!(f, "state derivative"),
            Response::Output => write!(f, "output"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LinearizationError {
    #[error("duplicate {role} variable `{name}`")]
    DuplicateName { role: Role, name: String },

    #[error("{role} vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        role: Role,
        expected: usize,
        actual: usize,
    },

    #[error("{role} variable `{name}` (index {index}) is not bound to the model")]
    UnboundVariable {
        role: Role,
        name: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("non-finite {response} `{name}` (row {row}) = {value} at {probe}")]
    NonFiniteResult {
        probe: Probe,
        response: Response,
        name: String,
        row: usize,
        value: f64,
    },

    #[error("model evaluation failed at {probe}")]
    Evaluation {
        probe: Probe,
        #[source]
        source: anyhow::Error,
    },

    #[error("{role} variable `{name}` (index {index}) resolves to unusable step {step}")]
    InvalidStep {
        role: Role,
        name: String,
        index: usize,
        step: f64,
    },

    #[error("invalid settings: {reason}")]
    InvalidSettings { reason: &'static str },
}

pub type Result<T> = std::result::Result<T, LinearizationError>;
