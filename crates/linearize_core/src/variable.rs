//! Variable bindings: units, perturbation step policies and the closure-based
//! `Binding` quantity.

use std::borrow::Cow;
use std::f64::consts::TAU;
use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::traits::Quantity;

/// Relative step fraction used when neither the variable nor the settings
/// configure one.
pub const DEFAULT_RELATIVE_FRACTION: f64 = 1e-4;

/// Smallest step produced by the default relative policy.
pub const DEFAULT_STEP_FLOOR: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    FeetPerSecond,
    Radians,
    RadiansPerSecond,
    Degrees,
    Feet,
    Rpm,
    Normalized,
    Dimensionless,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::FeetPerSecond => "ft/s",
            Unit::Radians => "rad",
            Unit::RadiansPerSecond => "rad/s",
            Unit::Degrees => "deg",
            Unit::Feet => "ft",
            Unit::Rpm => "rpm",
            Unit::Normalized => "norm",
            Unit::Dimensionless => "",
        }
    }

    /// Full turn for angular units, `None` otherwise.
    pub fn angular_period(self) -> Option<f64> {
        match self {
            Unit::Radians => Some(TAU),
            Unit::Degrees => Some(360.0),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How large a perturbation to apply to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StepPolicy {
    /// Defer to the fallback policy (normally the run settings).
    Default,
    /// Fixed step in the variable's unit. A zero step defers like `Default`.
    Absolute(f64),
    /// `fraction · |baseline|`, never smaller than `floor`.
    Relative { fraction: f64, floor: f64 },
}

impl StepPolicy {
    pub const fn default_relative() -> Self {
        StepPolicy::Relative {
            fraction: DEFAULT_RELATIVE_FRACTION,
            floor: DEFAULT_STEP_FLOOR,
        }
    }

    /// Step for a variable whose operating value is `baseline`.
    pub fn resolve(self, baseline: f64, fallback: StepPolicy) -> f64 {
        self.explicit(baseline)
            .or_else(|| fallback.explicit(baseline))
            .or_else(|| Self::default_relative().explicit(baseline))
            .unwrap_or(DEFAULT_STEP_FLOOR)
    }

    fn explicit(self, baseline: f64) -> Option<f64> {
        match self {
            StepPolicy::Absolute(step) if step != 0.0 => Some(step.abs()),
            StepPolicy::Relative { fraction, floor } => {
                Some((fraction.abs() * baseline.abs()).max(floor.abs()))
            }
            _ => None,
        }
    }

    pub(crate) fn is_valid(self) -> bool {
        match self {
            StepPolicy::Default => true,
            StepPolicy::Absolute(step) => step.is_finite(),
            StepPolicy::Relative { fraction, floor } => {
                fraction.is_finite() && fraction >= 0.0 && floor.is_finite() && floor > 0.0
            }
        }
    }
}

impl Default for StepPolicy {
    fn default() -> Self {
        StepPolicy::Default
    }
}

type Reader<M> = Box<dyn Fn(&M) -> Result<f64> + Send + Sync>;
type Writer<M> = Box<dyn Fn(&mut M, f64) -> Result<()> + Send + Sync>;

/// A quantity bound to a model through getter/setter closures.
///
/// ```ignore
/// let vt = Binding::new("Vt", Unit::FeetPerSecond, |m: &Plane| Ok(m.vt))
///     .with_writer(|m, v| {
///         m.vt = v;
///         Ok(())
///     })
///     .with_derivative(|m| Ok(m.vt_dot));
/// ```
pub struct Binding<M> {
    name: String,
    unit: Unit,
    step: StepPolicy,
    reader: Reader<M>,
    writer: Option<Writer<M>>,
    derivative: Option<Reader<M>>,
}

impl<M> Binding<M> {
    pub fn new<F>(name: impl Into<String>, unit: Unit, reader: F) -> Self
    where
        F: Fn(&M) -> Result<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            unit,
            step: StepPolicy::Default,
            reader: Box::new(reader),
            writer: None,
            derivative: None,
        }
    }

    pub fn with_writer<F>(mut self, writer: F) -> Self
    where
        F: Fn(&mut M, f64) -> Result<()> + Send + Sync + 'static,
    {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn with_derivative<F>(mut self, derivative: F) -> Self
    where
        F: Fn(&M) -> Result<f64> + Send + Sync + 'static,
    {
        self.derivative = Some(Box::new(derivative));
        self
    }

    pub fn with_step(mut self, step: StepPolicy) -> Self {
        self.step = step;
        self
    }
}

impl<M> fmt::Debug for Binding<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("step", &self.step)
            .field("writable", &self.writer.is_some())
            .field("has_derivative", &self.derivative.is_some())
            .finish()
    }
}

impl<M> Quantity<M> for Binding<M> {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn unit(&self) -> Unit {
        self.unit
    }

    fn step_policy(&self) -> StepPolicy {
        self.step
    }

    fn read(&self, model: &M) -> Result<f64> {
        (self.reader)(model)
    }

    fn write(&self, model: &mut M, value: f64) -> Result<()> {
        match &self.writer {
            Some(writer) => writer(model, value),
            None => Err(anyhow!("`{}` is read-only", self.name)),
        }
    }

    fn derivative(&self, model: &M) -> Result<f64> {
        match &self.derivative {
            Some(derivative) => derivative(model),
            None => Err(anyhow!("`{}` has no time derivative", self.name)),
        }
    }
}
