//! Implicit Euler and Crank–Nicolson methods.
//!
//! Both are built as residual expressions in the unknown new state:
//!
//! ```text
//! implicit Euler:  unew - uold - τ f(unew)                    = 0
//! Crank–Nicolson:  unew - uold - (τ/2) f(unew) - (τ/2) f(uold) = 0
//! ```

use nalgebra::DVector;

use super::{check_state, euler::check_square, StepError, TimeStepper};
use crate::core::{ConfigError, Constant, Expr, Function, Parameter};
use crate::newton::{Newton, NewtonOptions};

/// _y<sub>n+1</sub> = y<sub>n</sub> + τ f(y<sub>n+1</sub>)_. First order, L-stable.
#[derive(Debug)]
pub struct ImplicitEuler<'a> {
    equ: Expr<'a>,
    y_old: Constant,
    tau: Parameter,
    newton: Newton,
}

impl<'a> ImplicitEuler<'a> {
    /// Initializes the method for given right-hand side with default Newton
    /// options.
    pub fn new<F: Function + 'a>(f: F) -> Result<Self, ConfigError> {
        Self::with_newton(f, NewtonOptions::default())
    }

    /// Initializes the method for given right-hand side and Newton options.
    pub fn with_newton<F: Function + 'a>(
        f: F,
        options: NewtonOptions,
    ) -> Result<Self, ConfigError> {
        check_square("implicit euler", &f)?;
        let n = f.dim_x();

        let y_old = Constant::zeros(n);
        let tau = Parameter::default();

        let y_new = Expr::identity(n);
        let rhs = Expr::function(f);
        let equ = Expr::sub(
            &Expr::sub(&y_new, &Expr::constant(&y_old))?,
            &Expr::scale(&tau, &rhs),
        )?;

        Ok(Self {
            equ,
            y_old,
            tau,
            newton: Newton::with_options(options),
        })
    }

    /// Returns the residual solved in every step.
    pub fn equation(&self) -> &Expr<'a> {
        &self.equ
    }
}

impl TimeStepper for ImplicitEuler<'_> {
    const NAME: &'static str = "implicit Euler";

    fn dim(&self) -> usize {
        self.y_old.dim()
    }

    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), StepError> {
        check_state(self.dim(), y)?;

        self.y_old.set(y);
        self.tau.set(tau);
        self.newton.solve(&self.equ, y)?;

        Ok(())
    }
}

/// Trapezoidal rule. Second order, A-stable and conserving quadratic
/// invariants of linear problems.
#[derive(Debug)]
pub struct CrankNicolson<'a> {
    equ: Expr<'a>,
    y_old: Constant,
    half_tau: Parameter,
    newton: Newton,
}

impl<'a> CrankNicolson<'a> {
    /// Initializes the method for given right-hand side with default Newton
    /// options.
    pub fn new<F: Function + 'a>(f: F) -> Result<Self, ConfigError> {
        Self::with_newton(f, NewtonOptions::default())
    }

    /// Initializes the method for given right-hand side and Newton options.
    pub fn with_newton<F: Function + 'a>(
        f: F,
        options: NewtonOptions,
    ) -> Result<Self, ConfigError> {
        check_square("crank nicolson", &f)?;
        let n = f.dim_x();

        let y_old = Constant::zeros(n);
        let half_tau = Parameter::default();

        let y_new = Expr::identity(n);
        let old = Expr::constant(&y_old);
        let rhs = Expr::function(f);
        let rhs_old = Expr::compose(&rhs, &old)?;

        let equ = Expr::sub(
            &Expr::sub(
                &Expr::sub(&y_new, &old)?,
                &Expr::scale(&half_tau, &rhs),
            )?,
            &Expr::scale(&half_tau, &rhs_old),
        )?;

        Ok(Self {
            equ,
            y_old,
            half_tau,
            newton: Newton::with_options(options),
        })
    }

    /// Returns the residual solved in every step.
    pub fn equation(&self) -> &Expr<'a> {
        &self.equ
    }
}

impl TimeStepper for CrankNicolson<'_> {
    const NAME: &'static str = "Crank-Nicolson";

    fn dim(&self) -> usize {
        self.y_old.dim()
    }

    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), StepError> {
        check_state(self.dim(), y)?;

        self.y_old.set(y);
        self.half_tau.set(0.5 * tau);
        self.newton.solve(&self.equ, y)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::newton::NewtonError;
    use crate::testing::{jacobian_error, max_error, HarmonicOscillator, Pendulum, RcCircuit};

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    #[test]
    fn implicit_euler_decays_energy() {
        let f = HarmonicOscillator::default();
        let mut stepper = ImplicitEuler::new(f).unwrap();
        let mut y = dvector![1.0, 0.0];
        let mut energy = f.energy(&y);

        for _ in 0..100 {
            stepper.do_step(0.5, &mut y).unwrap();
            let next = f.energy(&y);
            assert!(next <= energy);
            energy = next;
        }

        assert!(energy < 1e-3);
    }

    #[test]
    fn crank_nicolson_conserves_energy() {
        let f = HarmonicOscillator::default();
        let mut stepper = CrankNicolson::new(f).unwrap();
        let mut y = dvector![1.0, 0.0];

        for _ in 0..100 {
            stepper.do_step(0.5, &mut y).unwrap();
        }

        assert_abs_diff_eq!(f.energy(&y), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn crank_nicolson_is_second_order() {
        let f = HarmonicOscillator::default();
        let y0 = dvector![1.0, 0.0];

        let mut coarse = CrankNicolson::new(f).unwrap();
        let mut fine = CrankNicolson::new(f).unwrap();
        let e1 = max_error(&mut coarse, 0.02, 50, &y0, |t| f.exact(t)).unwrap();
        let e2 = max_error(&mut fine, 0.01, 100, &y0, |t| f.exact(t)).unwrap();

        let ratio = e1 / e2;
        assert!(ratio > 3.5 && ratio < 4.5, "ratio = {}", ratio);
    }

    #[test]
    fn residual_jacobian() {
        let mut stepper = CrankNicolson::new(Pendulum::new(1.0)).unwrap();
        let mut y = dvector![0.3, 0.0];
        stepper.do_step(0.1, &mut y).unwrap();

        assert!(jacobian_error(stepper.equation(), &dvector![0.2, -0.4]) < 1e-7);
    }

    #[test]
    fn stiff_rc_circuit() {
        // Time constant 1e-4 s; explicit methods need tau well below that.
        let f = RcCircuit::new(100.0, 1e-6);
        let mut stepper = ImplicitEuler::new(f).unwrap();
        let mut y = dvector![0.0, 0.0];

        for _ in 0..100 {
            stepper.do_step(1e-3, &mut y).unwrap();
        }

        // The voltage follows the source closely.
        assert_abs_diff_eq!(y[1], 0.1, epsilon = 1e-12);
        assert!(y[0].abs() <= 1.0);
        assert_abs_diff_eq!(y[0], (100.0 * std::f64::consts::PI * y[1]).cos(), epsilon = 0.2);
    }

    #[test]
    fn newton_failure_is_reported() {
        let f = HarmonicOscillator::default();
        let mut stepper = ImplicitEuler::with_newton(f, NewtonOptions::new(1e-10, 0)).unwrap();
        let mut y = dvector![1.0, 0.0];

        assert!(matches!(
            stepper.do_step(0.1, &mut y),
            Err(StepError::Newton(NewtonError::Convergence { iters: 0, .. }))
        ));
    }
}
