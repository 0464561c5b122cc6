//! Flight-dynamics variable catalogue and the state-space builder.
//!
//! The flight model itself lives outside this crate; it only has to expose
//! each catalogued variable through `FlightModel`. Which variables go into
//! the state, input and output sets is decided once, from the airframe's
//! configuration, before any linearization starts.

use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::{anyhow, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::linearization::StateSpace;
use crate::traits::{DerivativeModel, Quantity};
use crate::variable::{StepPolicy, Unit};
use crate::variable_set::{Role, VariableSet};

/// Engines whose speed is added to the standard state vector.
pub const MAX_LINEARIZED_ENGINES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrusterKind {
    Propeller,
    Rocket,
    Nozzle,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftConfiguration {
    pub engine_count: usize,
    pub thruster: ThrusterKind,
}

/// Scalar quantities of a flight model that can be linearized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AircraftVariable {
    /// True airspeed.
    Vt,
    Alpha,
    Theta,
    /// Pitch rate.
    Q,
    Beta,
    Phi,
    /// Roll rate.
    P,
    Psi,
    /// Yaw rate.
    R,
    Latitude,
    Longitude,
    /// Altitude above sea level.
    Alt,
    /// Propeller speed of an engine.
    Rpm(usize),
    /// Blade pitch of a variable-pitch propeller.
    PropPitch(usize),
    ThrottleCmd,
    /// Aileron command.
    DaCmd,
    /// Elevator command.
    DeCmd,
    /// Rudder command.
    DrCmd,
}

impl AircraftVariable {
    pub fn name(self) -> Cow<'static, str> {
        match self {
            AircraftVariable::Vt => "Vt".into(),
            AircraftVariable::Alpha => "Alpha".into(),
            AircraftVariable::Theta => "Theta".into(),
            AircraftVariable::Q => "Q".into(),
            AircraftVariable::Beta => "Beta".into(),
            AircraftVariable::Phi => "Phi".into(),
            AircraftVariable::P => "P".into(),
            AircraftVariable::Psi => "Psi".into(),
            AircraftVariable::R => "R".into(),
            AircraftVariable::Latitude => "Latitude".into(),
            AircraftVariable::Longitude => "Longitude".into(),
            AircraftVariable::Alt => "Alt".into(),
            AircraftVariable::Rpm(engine) => format!("Rpm{engine}").into(),
            AircraftVariable::PropPitch(engine) => format!("PropPitch{engine}").into(),
            AircraftVariable::ThrottleCmd => "ThrottleCmd".into(),
            AircraftVariable::DaCmd => "DaCmd".into(),
            AircraftVariable::DeCmd => "DeCmd".into(),
            AircraftVariable::DrCmd => "DrCmd".into(),
        }
    }

    pub fn unit(self) -> Unit {
        match self {
            AircraftVariable::Vt => Unit::FeetPerSecond,
            AircraftVariable::Alpha
            | AircraftVariable::Theta
            | AircraftVariable::Beta
            | AircraftVariable::Phi
            | AircraftVariable::Psi
            | AircraftVariable::Latitude
            | AircraftVariable::Longitude => Unit::Radians,
            AircraftVariable::Q | AircraftVariable::P | AircraftVariable::R => {
                Unit::RadiansPerSecond
            }
            AircraftVariable::Alt => Unit::Feet,
            AircraftVariable::Rpm(_) => Unit::Rpm,
            AircraftVariable::PropPitch(_) => Unit::Degrees,
            AircraftVariable::ThrottleCmd
            | AircraftVariable::DaCmd
            | AircraftVariable::DeCmd
            | AircraftVariable::DrCmd => Unit::Normalized,
        }
    }

    /// Per-kind perturbation step.
    pub fn default_step(self) -> StepPolicy {
        match self {
            AircraftVariable::Vt => StepPolicy::Relative {
                fraction: 1e-4,
                floor: 1e-3,
            },
            AircraftVariable::Latitude | AircraftVariable::Longitude => {
                StepPolicy::Absolute(1e-7)
            }
            AircraftVariable::Alt => StepPolicy::Absolute(0.1),
            AircraftVariable::Rpm(_) => StepPolicy::Relative {
                fraction: 1e-4,
                floor: 0.1,
            },
            AircraftVariable::PropPitch(_) => StepPolicy::Absolute(1e-2),
            _ => StepPolicy::Absolute(1e-4),
        }
    }
}

/// Access to the catalogued variables of a flight model.
///
/// `None` (or `false` from `set_value`) means the airframe has no such
/// variable, e.g. a propeller speed on a jet.
pub trait FlightModel: DerivativeModel {
    fn configuration(&self) -> AircraftConfiguration;

    fn value(&self, variable: AircraftVariable) -> Option<f64>;

    fn set_value(&mut self, variable: AircraftVariable, value: f64) -> bool;

    /// Time derivative computed by the last `refresh`.
    fn rate(&self, variable: AircraftVariable) -> Option<f64>;
}

/// An `AircraftVariable` with its perturbation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AircraftQuantity {
    pub variable: AircraftVariable,
    pub step: StepPolicy,
}

impl From<AircraftVariable> for AircraftQuantity {
    fn from(variable: AircraftVariable) -> Self {
        Self {
            variable,
            step: variable.default_step(),
        }
    }
}

impl AircraftQuantity {
    fn missing(&self) -> anyhow::Error {
        anyhow!("{} is not available on this airframe", self.variable.name())
    }
}

impl<M: FlightModel> Quantity<M> for AircraftQuantity {
    fn name(&self) -> Cow<'_, str> {
        self.variable.name()
    }

    fn unit(&self) -> Unit {
        self.variable.unit()
    }

    fn step_policy(&self) -> StepPolicy {
        self.step
    }

    fn read(&self, model: &M) -> AnyResult<f64> {
        model.value(self.variable).ok_or_else(|| self.missing())
    }

    fn write(&self, model: &mut M, value: f64) -> AnyResult<()> {
        if model.set_value(self.variable, value) {
            Ok(())
        } else {
            Err(self.missing())
        }
    }

    fn derivative(&self, model: &M) -> AnyResult<f64> {
        model.rate(self.variable).ok_or_else(|| {
            anyhow!(
                "{} has no time derivative on this airframe",
                self.variable.name()
            )
        })
    }
}

/// Builds fixed, order-stable variable sets for one airframe.
#[derive(Debug, Clone)]
pub struct StateSpaceBuilder {
    configuration: AircraftConfiguration,
    states: Vec<AircraftVariable>,
    inputs: Vec<AircraftVariable>,
    outputs: Option<Vec<AircraftVariable>>,
    steps: HashMap<AircraftVariable, StepPolicy>,
}

impl StateSpaceBuilder {
    pub fn new(configuration: AircraftConfiguration) -> Self {
        Self {
            configuration,
            states: Vec::new(),
            inputs: Vec::new(),
            outputs: None,
            steps: HashMap::new(),
        }
    }

    /// Queries the model's configuration once.
    pub fn for_model<M: FlightModel>(model: &M) -> Self {
        Self::new(model.configuration())
    }

    pub fn configuration(&self) -> AircraftConfiguration {
        self.configuration
    }

    /// Full six-degree-of-freedom state with propeller speeds, the four
    /// primary commands as inputs, and full state feedback.
    pub fn standard(mut self) -> Self {
        use AircraftVariable::*;

        let mut states = vec![Vt, Alpha, Theta, Q];
        if self.configuration.thruster == ThrusterKind::Propeller {
            let engines = self.configuration.engine_count;
            if engines > MAX_LINEARIZED_ENGINES {
                log::warn!(
                    "{engines} engines configured; only the first {MAX_LINEARIZED_ENGINES} \
                     are linearized"
                );
            }
            states.extend((0..engines.min(MAX_LINEARIZED_ENGINES)).map(Rpm));
        }
        states.extend([Beta, Phi, P, Psi, R, Latitude, Longitude, Alt]);

        self.states = states;
        self.inputs = vec![ThrottleCmd, DaCmd, DeCmd, DrCmd];
        self.outputs = None;
        self
    }

    pub fn states(mut self, variables: &[AircraftVariable]) -> Self {
        self.states = variables.to_vec();
        self
    }

    pub fn inputs(mut self, variables: &[AircraftVariable]) -> Self {
        self.inputs = variables.to_vec();
        self
    }

    /// Explicit outputs. Without this the output set is the state set.
    pub fn outputs(mut self, variables: &[AircraftVariable]) -> Self {
        self.outputs = Some(variables.to_vec());
        self
    }

    /// Overrides the step policy of one variable.
    pub fn step(mut self, variable: AircraftVariable, step: StepPolicy) -> Self {
        self.steps.insert(variable, step);
        self
    }

    pub fn state_variables(&self) -> &[AircraftVariable] {
        &self.states
    }

    pub fn input_variables(&self) -> &[AircraftVariable] {
        &self.inputs
    }

    pub fn build<M: FlightModel + 'static>(&self) -> Result<StateSpace<M>> {
        let states = self.set(Role::State, &self.states)?;
        let inputs = self.set(Role::Input, &self.inputs)?;
        match &self.outputs {
            None => Ok(StateSpace::state_feedback(states, inputs)),
            Some(outputs) => Ok(StateSpace {
                outputs: self.set(Role::Output, outputs)?,
                states,
                inputs,
            }),
        }
    }

    fn set<M: FlightModel + 'static>(
        &self,
        role: Role,
        variables: &[AircraftVariable],
    ) -> Result<VariableSet<M>> {
        let mut set = VariableSet::new(role);
        for &variable in variables {
            let mut quantity = AircraftQuantity::from(variable);
            if let Some(&step) = self.steps.get(&variable) {
                quantity.step = step;
            }
            set.add(quantity)?;
        }
        Ok(set)
    }
}
