pub mod adapter;
pub mod aircraft;
pub mod error;
pub mod guard;
pub mod linearization;
pub mod report;
pub mod settings;
pub mod variable;
pub mod variable_set;
/// The `linearize_core` crate extracts linear state-space models
/// (`ẋ = Ax + Bu`, `y = Cx + Du`) from nonlinear simulation models by
/// central finite differences.
///
/// Key components:
/// - **Traits**: `Quantity` (a named scalar bound to a model) and `DerivativeModel` (the model contract).
/// - **Variable sets**: ordered state/input/output vectors with snapshot/apply.
/// - **Linearization**: sequential and parallel Jacobian extraction with guaranteed model restoration.
/// - **Aircraft**: flight-dynamics variable catalogue and configuration-driven set builder.
/// - **Report**: human-readable summary and Scilab/Scicos script output.
pub mod traits;

pub use adapter::{evaluate_derivative, Evaluation};
pub use aircraft::{
    AircraftConfiguration, AircraftQuantity, AircraftVariable, FlightModel, StateSpaceBuilder,
    ThrusterKind,
};
pub use error::{LinearizationError, Probe, Response, Result};
pub use guard::ModelGuard;
pub use linearization::{
    linearize, linearize_parallel, LinearModel, OperatingPoint, StateSpace, VariableInfo,
};
pub use settings::{DifferenceScheme, LinearizationSettings};
pub use traits::{DerivativeModel, Quantity};
pub use variable::{Binding, StepPolicy, Unit};
pub use variable_set::{Role, VariableSet};
