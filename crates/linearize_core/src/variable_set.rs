use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{LinearizationError, Result};
use crate::traits::Quantity;
use crate::variable::{StepPolicy, Unit};

/// Which vector of the state-space model a set describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    State,
    Input,
    Output,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::State => write!(f, "state"),
            Role::Input => write!(f, "input"),
            Role::Output => write!(f, "output"),
        }
    }
}

/// Ordered collection of quantities bound to a model `M`.
///
/// Insertion order is the vector index of each variable (and the row/column
/// of the resulting matrices). Variables can be appended but never reordered
/// or removed.
pub struct VariableSet<M> {
    role: Role,
    variables: Vec<Arc<dyn Quantity<M>>>,
}

impl<M> Clone for VariableSet<M> {
    fn clone(&self) -> Self {
        Self {
            role: self.role,
            variables: self.variables.clone(),
        }
    }
}

impl<M> fmt::Debug for VariableSet<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableSet")
            .field("role", &self.role)
            .field("names", &self.names())
            .finish()
    }
}

impl<M: 'static> VariableSet<M> {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            variables: Vec::new(),
        }
    }

    /// Appends a quantity. Fails if a variable with the same name exists.
    pub fn add(&mut self, quantity: impl Quantity<M> + 'static) -> Result<()> {
        self.add_shared(Arc::new(quantity))
    }

    pub fn add_shared(&mut self, quantity: Arc<dyn Quantity<M>>) -> Result<()> {
        let name = quantity.name();
        if self.variables.iter().any(|v| v.name() == name) {
            return Err(LinearizationError::DuplicateName {
                role: self.role,
                name: name.into_owned(),
            });
        }
        self.variables.push(quantity);
        Ok(())
    }
}

impl<M> VariableSet<M> {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Same bindings, different role. Used for full state feedback (`y = x`).
    pub fn with_role(&self, role: Role) -> Self {
        Self {
            role,
            variables: self.variables.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Quantity<M>> {
        self.variables.get(index).map(|v| v.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Quantity<M>> {
        self.variables.iter().map(|v| v.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|v| v.name().into_owned()).collect()
    }

    pub fn units(&self) -> Vec<Unit> {
        self.iter().map(|v| v.unit()).collect()
    }

    /// True when both sets hold the very same bindings in the same order.
    pub fn shares_bindings_with(&self, other: &VariableSet<M>) -> bool {
        self.variables.len() == other.variables.len()
            && self
                .variables
                .iter()
                .zip(&other.variables)
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }

    /// Reads every variable in order.
    pub fn snapshot(&self, model: &M) -> Result<DVector<f64>> {
        let mut values = DVector::zeros(self.len());
        for (index, variable) in self.variables.iter().enumerate() {
            values[index] = variable
                .read(model)
                .map_err(|source| self.unbound(index, source))?;
        }
        Ok(values)
    }

    /// Writes `values` into the model in order.
    pub fn apply(&self, model: &mut M, values: &DVector<f64>) -> Result<()> {
        self.check_len(values.len())?;
        for (index, variable) in self.variables.iter().enumerate() {
            variable
                .write(model, values[index])
                .map_err(|source| self.unbound(index, source))?;
        }
        Ok(())
    }

    /// Reads the time derivative of every variable in order.
    pub fn derivatives(&self, model: &M) -> Result<DVector<f64>> {
        let mut values = DVector::zeros(self.len());
        for (index, variable) in self.variables.iter().enumerate() {
            values[index] = variable
                .derivative(model)
                .map_err(|source| self.unbound(index, source))?;
        }
        Ok(values)
    }

    /// Writes `saved` back, skipping variables that already hold their saved
    /// value. Every variable is attempted; the first failure is returned.
    pub fn restore(&self, model: &mut M, saved: &DVector<f64>) -> Result<()> {
        self.check_len(saved.len())?;
        let mut first_error = None;
        for (index, variable) in self.variables.iter().enumerate() {
            let target = saved[index];
            match variable.read(model) {
                Ok(current) if current.to_bits() == target.to_bits() => continue,
                _ => {}
            }
            if let Err(source) = variable.write(model, target) {
                first_error.get_or_insert_with(|| self.unbound(index, source));
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Perturbation step of variable `index` around `baseline`.
    ///
    /// The variable's own policy is used first, then `fallback`, then the
    /// crate default (`1e-4 · |baseline|`, floored at `1e-4`).
    pub fn perturbation_step(
        &self,
        index: usize,
        baseline: f64,
        fallback: StepPolicy,
    ) -> Option<f64> {
        self.variables
            .get(index)
            .map(|v| v.step_policy().resolve(baseline, fallback))
    }

    /// Resolves every variable's step around `baseline`. Each must be finite
    /// and positive.
    pub fn check_steps(&self, baseline: &DVector<f64>, fallback: StepPolicy) -> Result<()> {
        self.check_len(baseline.len())?;
        for (index, variable) in self.variables.iter().enumerate() {
            let step = variable.step_policy().resolve(baseline[index], fallback);
            if !(step.is_finite() && step > 0.0) {
                return Err(LinearizationError::InvalidStep {
                    role: self.role,
                    name: variable.name().into_owned(),
                    index,
                    step,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn check_len(&self, actual: usize) -> Result<()> {
        if actual != self.len() {
            return Err(LinearizationError::DimensionMismatch {
                role: self.role,
                expected: self.len(),
                actual,
            });
        }
        Ok(())
    }

    pub(crate) fn unbound(&self, index: usize, source: anyhow::Error) -> LinearizationError {
        LinearizationError::UnboundVariable {
            role: self.role,
            name: self.variables[index].name().into_owned(),
            index,
            source,
        }
    }
}
