//! A small nonlinear flight model used by the integration tests.
//!
//! Longitudinal point-mass dynamics with a linear lift curve and parabolic
//! drag polar, plus loosely coupled lateral-directional dynamics and
//! first-order engine speed lags. Derivatives are recomputed on `refresh`
//! only, like a real flight model's derivative pass.

#![allow(dead_code)]

use std::collections::HashMap;

use anyhow::{bail, Result};
use linearize_core::{
    AircraftConfiguration, AircraftVariable, DerivativeModel, FlightModel, ThrusterKind,
};

const G: f64 = 32.174;
const RHO: f64 = 0.0023769;
const WING_AREA: f64 = 174.0;
const CHORD: f64 = 4.9;
const MASS: f64 = 2450.0 / G;
const IYY: f64 = 1346.0;
const MAX_THRUST: f64 = 600.0;
const MAX_RPM: f64 = 2700.0;
const RPM_LAG: f64 = 0.5;
const EARTH_RADIUS: f64 = 20_925_646.0;

#[derive(Debug, Clone)]
pub struct ToyAircraft {
    pub configuration: AircraftConfiguration,
    pub vt: f64,
    pub alpha: f64,
    pub theta: f64,
    pub q: f64,
    pub beta: f64,
    pub phi: f64,
    pub p: f64,
    pub psi: f64,
    pub r: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub alt: f64,
    pub rpm: Vec<f64>,
    pub throttle: f64,
    pub aileron: f64,
    pub elevator: f64,
    pub rudder: f64,
    pub refreshes: usize,
    rates: HashMap<AircraftVariable, f64>,
}

impl ToyAircraft {
    pub fn new(engine_count: usize, thruster: ThrusterKind) -> Self {
        let rpm = match thruster {
            ThrusterKind::Propeller => vec![0.7 * MAX_RPM; engine_count],
            _ => Vec::new(),
        };
        Self {
            configuration: AircraftConfiguration {
                engine_count,
                thruster,
            },
            vt: 120.0,
            alpha: 0.05,
            theta: 0.02,
            q: 0.0,
            beta: 0.0,
            phi: 0.0,
            p: 0.0,
            psi: 0.5,
            r: 0.0,
            latitude: 0.65,
            longitude: -2.1,
            alt: 1000.0,
            rpm,
            throttle: 0.7,
            aileron: 0.0,
            elevator: 0.0,
            rudder: 0.0,
            refreshes: 0,
            rates: HashMap::new(),
        }
    }

    pub fn jet() -> Self {
        Self::new(1, ThrusterKind::Nozzle)
    }

    pub fn twin_propeller() -> Self {
        Self::new(2, ThrusterKind::Propeller)
    }

    fn thrust(&self) -> f64 {
        match self.configuration.thruster {
            ThrusterKind::Propeller if !self.rpm.is_empty() => {
                let mean = self.rpm.iter().sum::<f64>() / self.rpm.len() as f64;
                MAX_THRUST * mean / MAX_RPM
            }
            _ => MAX_THRUST * self.throttle,
        }
    }

    fn field(&self, variable: AircraftVariable) -> Option<f64> {
        use linearize_core::AircraftVariable::*;
        Some(match variable {
            Vt => self.vt,
            Alpha => self.alpha,
            Theta => self.theta,
            Q => self.q,
            Beta => self.beta,
            Phi => self.phi,
            P => self.p,
            Psi => self.psi,
            R => self.r,
            Latitude => self.latitude,
            Longitude => self.longitude,
            Alt => self.alt,
            Rpm(engine) => return self.rpm.get(engine).copied(),
            PropPitch(_) => return None,
            ThrottleCmd => self.throttle,
            DaCmd => self.aileron,
            DeCmd => self.elevator,
            DrCmd => self.rudder,
        })
    }

    fn field_mut(&mut self, variable: AircraftVariable) -> Option<&mut f64> {
        use linearize_core::AircraftVariable::*;
        Some(match variable {
            Vt => &mut self.vt,
            Alpha => &mut self.alpha,
            Theta => &mut self.theta,
            Q => &mut self.q,
            Beta => &mut self.beta,
            Phi => &mut self.phi,
            P => &mut self.p,
            Psi => &mut self.psi,
            R => &mut self.r,
            Latitude => &mut self.latitude,
            Longitude => &mut self.longitude,
            Alt => &mut self.alt,
            Rpm(engine) => return self.rpm.get_mut(engine),
            PropPitch(_) => return None,
            ThrottleCmd => &mut self.throttle,
            DaCmd => &mut self.aileron,
            DeCmd => &mut self.elevator,
            DrCmd => &mut self.rudder,
        })
    }
}

impl DerivativeModel for ToyAircraft {
    fn refresh(&mut self) -> Result<()> {
        use linearize_core::AircraftVariable::*;

        if self.vt <= 0.0 {
            bail!("airspeed must be positive, got {}", self.vt);
        }

        let qbar = 0.5 * RHO * self.vt * self.vt;
        let cl = 0.3 + 5.0 * self.alpha;
        let cd = 0.03 + 0.05 * cl * cl;
        let lift = qbar * WING_AREA * cl;
        let drag = qbar * WING_AREA * cd;
        let thrust = self.thrust();
        let gamma = self.theta - self.alpha;
        let cm = 0.02 - 0.8 * self.alpha - 12.0 * self.q * CHORD / (2.0 * self.vt)
            - 1.1 * self.elevator;
        let (sin_phi, cos_phi) = self.phi.sin_cos();

        let mut rates = HashMap::new();
        rates.insert(
            Vt,
            (thrust * self.alpha.cos() - drag) / MASS - G * gamma.sin(),
        );
        rates.insert(
            Alpha,
            self.q - (lift + thrust * self.alpha.sin()) / (MASS * self.vt)
                + G * gamma.cos() / self.vt,
        );
        rates.insert(Theta, self.q * cos_phi - self.r * sin_phi);
        rates.insert(Q, qbar * WING_AREA * CHORD * cm / IYY);
        rates.insert(
            Beta,
            -0.5 * self.beta - self.r + G / self.vt * sin_phi * self.theta.cos()
                + 0.05 * self.rudder,
        );
        rates.insert(
            Phi,
            self.p + self.theta.tan() * (self.q * sin_phi + self.r * cos_phi),
        );
        rates.insert(
            P,
            -8.0 * self.beta - 5.0 * self.p + 1.2 * self.r + 20.0 * self.aileron,
        );
        rates.insert(
            Psi,
            (self.q * sin_phi + self.r * cos_phi) / self.theta.cos(),
        );
        rates.insert(
            R,
            3.0 * self.beta - 0.3 * self.p - 0.8 * self.r - 4.0 * self.rudder,
        );
        let radius = EARTH_RADIUS + self.alt;
        rates.insert(
            Latitude,
            self.vt * gamma.cos() * self.psi.cos() / radius,
        );
        rates.insert(
            Longitude,
            self.vt * gamma.cos() * self.psi.sin() / (radius * self.latitude.cos()),
        );
        rates.insert(Alt, self.vt * gamma.sin());
        for (engine, rpm) in self.rpm.iter().enumerate() {
            rates.insert(Rpm(engine), (MAX_RPM * self.throttle - rpm) / RPM_LAG);
        }

        self.rates = rates;
        self.refreshes += 1;
        Ok(())
    }
}

impl FlightModel for ToyAircraft {
    fn configuration(&self) -> AircraftConfiguration {
        self.configuration
    }

    fn value(&self, variable: AircraftVariable) -> Option<f64> {
        self.field(variable)
    }

    fn set_value(&mut self, variable: AircraftVariable, value: f64) -> bool {
        match self.field_mut(variable) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn rate(&self, variable: AircraftVariable) -> Option<f64> {
        self.rates.get(&variable).copied()
    }
}
