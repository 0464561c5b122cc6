//! The narrow contract between the linearizer and the nonlinear model.

use nalgebra::DVector;

use crate::error::{LinearizationError, Probe, Response, Result};
use crate::traits::DerivativeModel;
use crate::variable_set::VariableSet;

/// Model response at the currently bound state and input values.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state_derivative: DVector<f64>,
    pub outputs: DVector<f64>,
}

impl Evaluation {
    /// First non-finite entry, derivatives before outputs.
    pub fn first_non_finite(&self) -> Option<(Response, usize, f64)> {
        let find = |values: &DVector<f64>| {
            values
                .iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite())
                .map(|(i, v)| (i, *v))
        };
        find(&self.state_derivative)
            .map(|(i, v)| (Response::StateDerivative, i, v))
            .or_else(|| find(&self.outputs).map(|(i, v)| (Response::Output, i, v)))
    }
}

/// Refreshes the model and reads the state derivative and output vectors.
///
/// A pure function of the bound values: no time advance happens between
/// back-to-back calls.
pub fn evaluate_derivative<M: DerivativeModel>(
    model: &mut M,
    states: &VariableSet<M>,
    outputs: &VariableSet<M>,
) -> Result<Evaluation> {
    evaluate_at(model, states, outputs, &Probe::Baseline)
}

pub(crate) fn evaluate_at<M: DerivativeModel>(
    model: &mut M,
    states: &VariableSet<M>,
    outputs: &VariableSet<M>,
    probe: &Probe,
) -> Result<Evaluation> {
    model
        .refresh()
        .map_err(|source| LinearizationError::Evaluation {
            probe: probe.clone(),
            source,
        })?;

    let evaluation = Evaluation {
        state_derivative: states.derivatives(model)?,
        outputs: outputs.snapshot(model)?,
    };

    if let Some((response, row, value)) = evaluation.first_non_finite() {
        let set = match response {
            Response::StateDerivative => states,
            Response::Output => outputs,
        };
        let name = set
            .get(row)
            .map(|v| v.name().into_owned())
            .unwrap_or_default();
        return Err(LinearizationError::NonFiniteResult {
            probe: probe.clone(),
            response,
            name,
            row,
            value,
        });
    }

    Ok(evaluation)
}
