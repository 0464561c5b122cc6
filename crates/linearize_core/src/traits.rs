use std::borrow::Cow;

use anyhow::{bail, Result};

use crate::variable::{StepPolicy, Unit};

/// A named scalar degree of freedom of a model `M`.
///
/// Implementations are live channels into the model: `read` right after
/// `write(v)` must return `v`. Quantities never cache values themselves.
pub trait Quantity<M: ?Sized>: Send + Sync {
    /// Name used for error context, report tables and duplicate detection.
    fn name(&self) -> Cow<'_, str>;

    /// Unit of the quantity's value (not of its derivative).
    fn unit(&self) -> Unit;

    /// Perturbation step policy. `StepPolicy::Default` defers to the run settings.
    fn step_policy(&self) -> StepPolicy {
        StepPolicy::Default
    }

    /// Reads the current value from the model.
    fn read(&self, model: &M) -> Result<f64>;

    /// Writes a value into the model.
    fn write(&self, model: &mut M, value: f64) -> Result<()>;

    /// Reads the instantaneous time derivative of the quantity.
    /// Only state variables need to provide one.
    fn derivative(&self, _model: &M) -> Result<f64> {
        bail!("`{}` has no time derivative", self.name())
    }
}

/// A nonlinear model whose derived quantities can be recomputed in place.
pub trait DerivativeModel {
    /// Recomputes every derived quantity (state derivatives, outputs) from the
    /// currently bound values.
    /// Must not advance simulation time or fire discrete events: calling it
    /// twice back-to-back with unchanged inputs yields identical results.
    fn refresh(&mut self) -> Result<()>;
}
