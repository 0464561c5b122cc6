//! Central-difference linearization of a nonlinear model about an operating point.
//!
//! For a model with state `x`, input `u` and output `y`, `linearize` returns
//! the Jacobians
//!
//! ```text
//! A = ∂ẋ/∂x   B = ∂ẋ/∂u   C = ∂y/∂x   D = ∂y/∂u
//! ```
//!
//! one column at a time: variable `i` is offset by `±δ_i` with everything
//! else held at the operating point, the model is re-evaluated, and the
//! difference of the responses is scaled by the stencil of the selected
//! `DifferenceScheme`. The operating point is re-applied exactly between
//! columns, and the model is returned to its pre-run values on every exit path.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::adapter::{evaluate_at, Evaluation};
use crate::error::{Probe, Result};
use crate::guard::ModelGuard;
use crate::settings::LinearizationSettings;
use crate::traits::DerivativeModel;
use crate::variable::Unit;
use crate::variable_set::{Role, VariableSet};

/// Values of the state, input and output vectors around which to linearize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub x0: DVector<f64>,
    pub u0: DVector<f64>,
    pub y0: DVector<f64>,
}

impl OperatingPoint {
    pub fn new(x0: Vec<f64>, u0: Vec<f64>, y0: Vec<f64>) -> Self {
        Self {
            x0: DVector::from_vec(x0),
            u0: DVector::from_vec(u0),
            y0: DVector::from_vec(y0),
        }
    }

    /// Reads the operating point from the model's current values.
    pub fn capture<M>(
        model: &M,
        states: &VariableSet<M>,
        inputs: &VariableSet<M>,
        outputs: &VariableSet<M>,
    ) -> Result<Self> {
        Ok(Self {
            x0: states.snapshot(model)?,
            u0: inputs.snapshot(model)?,
            y0: outputs.snapshot(model)?,
        })
    }

    pub fn check<M>(
        &self,
        states: &VariableSet<M>,
        inputs: &VariableSet<M>,
        outputs: &VariableSet<M>,
    ) -> Result<()> {
        states.check_len(self.x0.len())?;
        inputs.check_len(self.u0.len())?;
        outputs.check_len(self.y0.len())
    }
}

/// Name and unit of one row/column of a `LinearModel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    pub unit: Unit,
}

fn describe<M>(set: &VariableSet<M>) -> Vec<VariableInfo> {
    set.iter()
        .map(|v| VariableInfo {
            name: v.name().into_owned(),
            unit: v.unit(),
        })
        .collect()
}

/// The linear model `ẋ = Ax + Bu`, `y = Cx + Du` in deviation variables
/// about `operating_point`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
    pub c: DMatrix<f64>,
    pub d: DMatrix<f64>,
    pub operating_point: OperatingPoint,
    pub states: Vec<VariableInfo>,
    pub inputs: Vec<VariableInfo>,
    pub outputs: Vec<VariableInfo>,
}

impl LinearModel {
    /// `(|x|, |u|, |y|)`.
    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.states.len(), self.inputs.len(), self.outputs.len())
    }

    /// `max |C - I|` when `C` is square. Under full state feedback this
    /// should be ~0; a larger value points at the model, not the linearizer.
    pub fn state_feedback_deviation(&self) -> Option<f64> {
        if !self.c.is_square() {
            return None;
        }
        let identity = DMatrix::<f64>::identity(self.c.nrows(), self.c.ncols());
        Some((&self.c - identity).amax())
    }

    /// Open-loop eigenvalues of `A`.
    pub fn eigenvalues(&self) -> Vec<Complex<f64>> {
        if self.a.nrows() == 0 {
            return Vec::new();
        }
        self.a.complex_eigenvalues().iter().copied().collect()
    }
}

/// State, input and output sets describing one linearization request.
pub struct StateSpace<M> {
    pub states: VariableSet<M>,
    pub inputs: VariableSet<M>,
    pub outputs: VariableSet<M>,
}

impl<M> Clone for StateSpace<M> {
    fn clone(&self) -> Self {
        Self {
            states: self.states.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

impl<M: DerivativeModel> StateSpace<M> {
    /// Output set equal to the state set (full state feedback).
    pub fn state_feedback(states: VariableSet<M>, inputs: VariableSet<M>) -> Self {
        let outputs = states.with_role(Role::Output);
        Self {
            states,
            inputs,
            outputs,
        }
    }

    pub fn operating_point(&self, model: &M) -> Result<OperatingPoint> {
        OperatingPoint::capture(model, &self.states, &self.inputs, &self.outputs)
    }

    /// Reads every variable once so unresolvable bindings fail before any
    /// value is written.
    pub fn check_bound(&self, model: &M) -> Result<()> {
        self.operating_point(model).map(|_| ())
    }

    pub fn linearize(
        &self,
        model: &mut M,
        point: &OperatingPoint,
        settings: &LinearizationSettings,
    ) -> Result<LinearModel> {
        linearize(
            model,
            &self.states,
            &self.inputs,
            &self.outputs,
            point,
            settings,
        )
    }
}

/// One Jacobian column: response of the state derivative and of the outputs.
struct Column {
    derivative: DVector<f64>,
    output: DVector<f64>,
}

struct Jacobians {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DMatrix<f64>,
    d: DMatrix<f64>,
    evaluations: usize,
}

/// Linearizes `model` about `point`.
///
/// `model` is borrowed exclusively for the run. Its state and input
/// variables hold their pre-run values again when this returns, whether it
/// succeeds or not.
pub fn linearize<M: DerivativeModel>(
    model: &mut M,
    states: &VariableSet<M>,
    inputs: &VariableSet<M>,
    outputs: &VariableSet<M>,
    point: &OperatingPoint,
    settings: &LinearizationSettings,
) -> Result<LinearModel> {
    settings.validate()?;
    point.check(states, inputs, outputs)?;
    states.check_steps(&point.x0, settings.default_step)?;
    inputs.check_steps(&point.u0, settings.default_step)?;

    let started = Instant::now();
    log::info!(
        "linearizing {} states, {} inputs, {} outputs ({:?})",
        states.len(),
        inputs.len(),
        outputs.len(),
        settings.scheme
    );

    let mut guard = ModelGuard::acquire(model, states, inputs)?;
    let outcome = run_sequential(&mut *guard, states, inputs, outputs, point, settings);
    let restored = guard.release();

    let jacobians = match (outcome, restored) {
        (Ok(jacobians), Ok(())) => jacobians,
        (Err(err), restored) => {
            if let Err(restore_err) = restored {
                log::error!("failed to restore model after error: {restore_err}");
            }
            return Err(err);
        }
        (Ok(_), Err(err)) => return Err(err),
    };

    log::info!(
        "linearization finished: {} evaluations in {:.3} s",
        jacobians.evaluations,
        started.elapsed().as_secs_f64()
    );
    Ok(finish(jacobians, states, inputs, outputs, point, settings))
}

/// Linearizes on deep copies of `model`, one per worker.
///
/// Columns are split into disjoint chunks; each chunk is evaluated on its
/// own clone positioned at the operating point. The caller's model is only
/// read. Results match `linearize` exactly for deterministic models.
pub fn linearize_parallel<M>(
    model: &M,
    states: &VariableSet<M>,
    inputs: &VariableSet<M>,
    outputs: &VariableSet<M>,
    point: &OperatingPoint,
    settings: &LinearizationSettings,
) -> Result<LinearModel>
where
    M: DerivativeModel + Clone + Send + Sync,
{
    settings.validate()?;
    point.check(states, inputs, outputs)?;
    states.check_steps(&point.x0, settings.default_step)?;
    inputs.check_steps(&point.u0, settings.default_step)?;

    let started = Instant::now();
    let nx = states.len();
    let nu = inputs.len();
    let ny = outputs.len();

    let positioned = || -> Result<M> {
        let mut copy = model.clone();
        states.apply(&mut copy, &point.x0)?;
        inputs.apply(&mut copy, &point.u0)?;
        Ok(copy)
    };

    let mut baseline_model = positioned()?;
    evaluate_at(&mut baseline_model, states, outputs, &Probe::Baseline)?;
    drop(baseline_model);

    let jobs: Vec<(Role, usize)> = (0..nx)
        .map(|i| (Role::State, i))
        .chain((0..nu).map(|j| (Role::Input, j)))
        .collect();
    let chunk_size = settings
        .parallel_chunk_size
        .unwrap_or_else(|| jobs.len().div_ceil(rayon::current_num_threads()).max(1));

    log::info!(
        "linearizing {} columns in parallel ({} per worker, {} threads)",
        jobs.len(),
        chunk_size,
        rayon::current_num_threads()
    );

    let chunks: Vec<Vec<(Role, usize, Column)>> = jobs
        .par_chunks(chunk_size)
        .map(|chunk| -> Result<Vec<(Role, usize, Column)>> {
            let mut local = positioned()?;
            let mut evaluations = 0;
            chunk
                .iter()
                .map(|&(role, index)| {
                    let (perturbed, baseline) = match role {
                        Role::State => (states, &point.x0),
                        _ => (inputs, &point.u0),
                    };
                    probe_column(
                        &mut local,
                        perturbed,
                        baseline,
                        index,
                        states,
                        outputs,
                        settings,
                        &mut evaluations,
                    )
                    .map(|column| (role, index, column))
                })
                .collect()
        })
        .collect::<Result<_>>()?;

    let mut jacobians = Jacobians {
        a: DMatrix::zeros(nx, nx),
        b: DMatrix::zeros(nx, nu),
        c: DMatrix::zeros(ny, nx),
        d: DMatrix::zeros(ny, nu),
        evaluations: 1 + jobs.len() * settings.scheme.evaluations_per_column(),
    };
    for (role, index, column) in chunks.into_iter().flatten() {
        match role {
            Role::State => {
                jacobians.a.set_column(index, &column.derivative);
                jacobians.c.set_column(index, &column.output);
            }
            _ => {
                jacobians.b.set_column(index, &column.derivative);
                jacobians.d.set_column(index, &column.output);
            }
        }
    }

    log::info!(
        "parallel linearization finished: {} evaluations in {:.3} s",
        jacobians.evaluations,
        started.elapsed().as_secs_f64()
    );
    Ok(finish(jacobians, states, inputs, outputs, point, settings))
}

fn run_sequential<M: DerivativeModel>(
    model: &mut M,
    states: &VariableSet<M>,
    inputs: &VariableSet<M>,
    outputs: &VariableSet<M>,
    point: &OperatingPoint,
    settings: &LinearizationSettings,
) -> Result<Jacobians> {
    let nx = states.len();
    let nu = inputs.len();
    let ny = outputs.len();

    states.apply(model, &point.x0)?;
    inputs.apply(model, &point.u0)?;
    evaluate_at(model, states, outputs, &Probe::Baseline)?;
    let mut evaluations = 1;

    let mut a = DMatrix::zeros(nx, nx);
    let mut c = DMatrix::zeros(ny, nx);
    for i in 0..nx {
        let column = probe_column(
            model,
            states,
            &point.x0,
            i,
            states,
            outputs,
            settings,
            &mut evaluations,
        )?;
        a.set_column(i, &column.derivative);
        c.set_column(i, &column.output);
    }

    let mut b = DMatrix::zeros(nx, nu);
    let mut d = DMatrix::zeros(ny, nu);
    for j in 0..nu {
        let column = probe_column(
            model,
            inputs,
            &point.u0,
            j,
            states,
            outputs,
            settings,
            &mut evaluations,
        )?;
        b.set_column(j, &column.derivative);
        d.set_column(j, &column.output);
    }

    Ok(Jacobians {
        a,
        b,
        c,
        d,
        evaluations,
    })
}

/// Differentiates the model response with respect to variable `index` of
/// `perturbed`, whose operating values are `baseline`. The model must already
/// sit at the operating point and is put back there before returning `Ok`.
#[allow(clippy::too_many_arguments)]
fn probe_column<M: DerivativeModel>(
    model: &mut M,
    perturbed: &VariableSet<M>,
    baseline: &DVector<f64>,
    index: usize,
    states: &VariableSet<M>,
    outputs: &VariableSet<M>,
    settings: &LinearizationSettings,
    evaluations: &mut usize,
) -> Result<Column> {
    let step = perturbed
        .perturbation_step(index, baseline[index], settings.default_step)
        .unwrap_or(crate::variable::DEFAULT_STEP_FLOOR);
    let name = perturbed
        .get(index)
        .map(|v| v.name().into_owned())
        .unwrap_or_default();
    log::debug!(
        "{} `{}` (index {}): step {:e}",
        perturbed.role(),
        name,
        index,
        step
    );

    let mut evaluate = |offset: f64| -> Result<Evaluation> {
        let mut values = baseline.clone();
        values[index] += offset;
        perturbed.apply(model, &values)?;
        *evaluations += 1;
        let probe = Probe::Perturbed {
            role: perturbed.role(),
            name: name.clone(),
            index,
            offset,
        };
        evaluate_at(model, states, outputs, &probe)
    };

    let multiples = settings.scheme.multiples();
    let mut derivative_differences = Vec::with_capacity(multiples.len());
    let mut output_differences = Vec::with_capacity(multiples.len());
    for &k in multiples {
        let plus = evaluate(k * step)?;
        let minus = evaluate(-k * step)?;
        derivative_differences.push(plus.state_derivative - minus.state_derivative);
        let mut output_difference = plus.outputs - minus.outputs;
        if settings.wrap_angles {
            wrap_angular_rows(&mut output_difference, outputs);
        }
        output_differences.push(output_difference);
    }

    perturbed.apply(model, baseline)?;

    Ok(Column {
        derivative: settings.scheme.combine(&derivative_differences, step),
        output: settings.scheme.combine(&output_differences, step),
    })
}

/// Maps differences of angular quantities into half a turn either side of zero.
fn wrap_angular_rows<M>(differences: &mut DVector<f64>, set: &VariableSet<M>) {
    for (row, variable) in set.iter().enumerate() {
        if let Some(period) = variable.unit().angular_period() {
            differences[row] = wrap_difference(differences[row], period);
        }
    }
}

fn wrap_difference(difference: f64, period: f64) -> f64 {
    difference - period * (difference / period).round()
}

fn finish<M>(
    jacobians: Jacobians,
    states: &VariableSet<M>,
    inputs: &VariableSet<M>,
    outputs: &VariableSet<M>,
    point: &OperatingPoint,
    settings: &LinearizationSettings,
) -> LinearModel {
    let model = LinearModel {
        a: jacobians.a,
        b: jacobians.b,
        c: jacobians.c,
        d: jacobians.d,
        operating_point: point.clone(),
        states: describe(states),
        inputs: describe(inputs),
        outputs: describe(outputs),
    };

    if outputs.shares_bindings_with(states) {
        if let Some(deviation) = model.state_feedback_deviation() {
            if deviation > settings.identity_tolerance {
                log::warn!(
                    "C deviates from identity by {deviation:e} under state feedback; \
                     this indicates a problem with the model"
                );
            }
        }
    }
    model
}
