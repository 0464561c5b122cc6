use std::ops::{Deref, DerefMut};

use nalgebra::DVector;

use crate::error::{LinearizationError, Probe, Result};
use crate::traits::DerivativeModel;
use crate::variable_set::VariableSet;

/// Exclusive borrow of a model that puts its state and input variables back
/// to the values they held at acquisition.
///
/// `release` restores and reports failures. If the guard is dropped without
/// being released (early return, unwinding panic) the restoration still runs
/// and failures are logged.
pub struct ModelGuard<'a, M: DerivativeModel> {
    model: &'a mut M,
    states: &'a VariableSet<M>,
    inputs: &'a VariableSet<M>,
    saved_states: DVector<f64>,
    saved_inputs: DVector<f64>,
    released: bool,
}

impl<'a, M: DerivativeModel> ModelGuard<'a, M> {
    /// Snapshots the current state and input values. Nothing is written.
    pub fn acquire(
        model: &'a mut M,
        states: &'a VariableSet<M>,
        inputs: &'a VariableSet<M>,
    ) -> Result<Self> {
        let saved_states = states.snapshot(model)?;
        let saved_inputs = inputs.snapshot(model)?;
        Ok(Self {
            model,
            states,
            inputs,
            saved_states,
            saved_inputs,
            released: false,
        })
    }

    pub fn saved_states(&self) -> &DVector<f64> {
        &self.saved_states
    }

    pub fn saved_inputs(&self) -> &DVector<f64> {
        &self.saved_inputs
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        let states = self.states.restore(self.model, &self.saved_states);
        let inputs = self.inputs.restore(self.model, &self.saved_inputs);
        states?;
        inputs?;
        self.model
            .refresh()
            .map_err(|source| LinearizationError::Evaluation {
                probe: Probe::Baseline,
                source,
            })
    }
}

impl<M: DerivativeModel> Deref for ModelGuard<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<M: DerivativeModel> DerefMut for ModelGuard<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.model
    }
}

impl<M: DerivativeModel> Drop for ModelGuard<'_, M> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.restore() {
            log::error!("failed to restore model after linearization: {err}");
        }
    }
}
