//! Test problems and utilities useful for benchmarking, debugging and smoke
//! testing.
//!
//! The right-hand sides are autonomous first order systems _y' = f(y)_ with
//! analytic Jacobians. Time-dependent problems carry the time as the last
//! state component (with _t' = 1_), so every stepper can integrate them
//! unchanged.

#![allow(unused)]

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};

use crate::core::Function;
use crate::derivatives::Jacobian;
use crate::stepper::{StepError, TimeStepper};

/// Harmonic oscillator _x'' = -ω² x_ with state _(x, v)_.
///
/// For _x(0) = 1, v(0) = 0_ the solution is _x(t) = cos(ωt)_ and the energy
/// _(ω² x² + v²) / 2_ is conserved.
#[derive(Debug, Clone, Copy)]
pub struct HarmonicOscillator {
    omega: f64,
}

impl HarmonicOscillator {
    /// Initializes the oscillator with given angular frequency.
    pub fn new(omega: f64) -> Self {
        assert!(omega > 0.0, "omega must be greater than zero");
        Self { omega }
    }

    /// Exact solution for _x(0) = 1, v(0) = 0_.
    pub fn exact(&self, t: f64) -> DVector<f64> {
        DVector::from_vec(vec![
            (self.omega * t).cos(),
            -self.omega * (self.omega * t).sin(),
        ])
    }

    /// Energy of the state.
    pub fn energy(&self, y: &DVector<f64>) -> f64 {
        0.5 * (self.omega.powi(2) * y[0].powi(2) + y[1].powi(2))
    }
}

impl Default for HarmonicOscillator {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Function for HarmonicOscillator {
    fn dim_x(&self) -> usize {
        2
    }

    fn dim_f(&self) -> usize {
        2
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        fx[0] = x[1];
        fx[1] = -self.omega.powi(2) * x[0];
    }

    fn eval_deriv(&self, _x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        jac.fill(0.0);
        jac[(0, 1)] = 1.0;
        jac[(1, 0)] = -self.omega.powi(2);
    }
}

/// Mathematical pendulum _θ'' = -(g / l) sin θ_ with state _(θ, ω)_.
#[derive(Debug, Clone, Copy)]
pub struct Pendulum {
    length: f64,
    gravity: f64,
}

impl Pendulum {
    /// Initializes the pendulum with given length and standard gravity.
    pub fn new(length: f64) -> Self {
        Self::with_gravity(length, 9.81)
    }

    /// Initializes the pendulum with given length and gravitational
    /// acceleration.
    pub fn with_gravity(length: f64, gravity: f64) -> Self {
        assert!(length > 0.0, "length must be greater than zero");
        Self { length, gravity }
    }
}

impl Function for Pendulum {
    fn dim_x(&self) -> usize {
        2
    }

    fn dim_f(&self) -> usize {
        2
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        fx[0] = x[1];
        fx[1] = -self.gravity / self.length * x[0].sin();
    }

    fn eval_deriv(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        jac.fill(0.0);
        jac[(0, 1)] = 1.0;
        jac[(1, 0)] = -self.gravity / self.length * x[0].cos();
    }
}

/// RC circuit driven by _cos(100πt)_ with state _(U<sub>C</sub>, t)_.
///
/// The capacitor voltage follows _U<sub>C</sub>' = (cos(100πt) -
/// U<sub>C</sub>) / (RC)_. For small _RC_ the problem is stiff.
#[derive(Debug, Clone, Copy)]
pub struct RcCircuit {
    resistance: f64,
    capacitance: f64,
}

impl RcCircuit {
    const OMEGA: f64 = 100.0 * PI;

    /// Initializes the circuit with given resistance and capacitance.
    pub fn new(resistance: f64, capacitance: f64) -> Self {
        assert!(
            resistance > 0.0 && capacitance > 0.0,
            "resistance and capacitance must be greater than zero"
        );
        Self {
            resistance,
            capacitance,
        }
    }

    fn rc(&self) -> f64 {
        self.resistance * self.capacitance
    }
}

impl Function for RcCircuit {
    fn dim_x(&self) -> usize {
        2
    }

    fn dim_f(&self) -> usize {
        2
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        fx[0] = ((Self::OMEGA * x[1]).cos() - x[0]) / self.rc();
        fx[1] = 1.0;
    }

    fn eval_deriv(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        jac.fill(0.0);
        jac[(0, 0)] = -1.0 / self.rc();
        jac[(0, 1)] = -Self::OMEGA / self.rc() * (Self::OMEGA * x[1]).sin();
    }
}

/// _x² - 2 = 0_, a scalar equation with a simple root in _√2_ and a singular
/// Jacobian in zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqrt2;

impl Function for Sqrt2 {
    fn dim_x(&self) -> usize {
        1
    }

    fn dim_f(&self) -> usize {
        1
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        fx[0] = x[0] * x[0] - 2.0;
    }

    fn eval_deriv(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        jac[(0, 0)] = 2.0 * x[0];
    }
}

/// Largest absolute difference between the analytic Jacobian of `f` and its
/// central difference approximation in `x`.
pub fn jacobian_error<F: Function + ?Sized>(f: &F, x: &DVector<f64>) -> f64 {
    let mut analytic = DMatrix::zeros(f.dim_f(), f.dim_x());
    f.eval_deriv(x, &mut analytic);

    let mut x = x.clone();
    let numeric = Jacobian::new(f, &mut x);

    (&analytic - &*numeric).abs().max()
}

/// Integrates `steps` steps of size `tau` from `y0` and returns the largest
/// distance to `exact` over all visited time points.
pub fn max_error<S, E>(
    stepper: &mut S,
    tau: f64,
    steps: usize,
    y0: &DVector<f64>,
    exact: E,
) -> Result<f64, StepError>
where
    S: TimeStepper,
    E: Fn(f64) -> DVector<f64>,
{
    let mut y = y0.clone();
    let mut error: f64 = 0.0;

    for i in 1..=steps {
        stepper.do_step(tau, &mut y)?;
        let t = i as f64 * tau;
        error = error.max((&y - exact(t)).norm());
    }

    Ok(error)
}
