//! Generalized-alpha method for second order systems
//!
//! ```text
//! M(x'') = F(x)
//! ```
//!
//! where the mass operator _M_ may be singular. Rows with zero mass are
//! algebraic equations, which is how constrained mechanical systems with
//! Lagrange multipliers are integrated.
//!
//! The new position _x<sub>n+1</sub>_ is the unknown. The new acceleration
//! follows from the Newmark relation
//!
//! ```text
//! a(n+1) = (x(n+1) - x(n)) / (βτ²) - v(n) / (βτ) - (1 / (2β) - 1) a(n)
//! ```
//!
//! and the equation of motion is enforced at shifted points,
//!
//! ```text
//! M((1 - αm) a(n+1) + αm a(n)) - F((1 - αf) x(n+1) + αf x(n)) = 0.
//! ```
//!
//! After the solve, _v<sub>n+1</sub> = v<sub>n</sub> + τ((1 - γ) a<sub>n</sub>
//! + γ a<sub>n+1</sub>)_.
//!
//! # References
//!
//! \[1\] [A Time Integration Algorithm for Structural Dynamics With Improved
//! Numerical Dissipation: The Generalized-α
//! Method](https://doi.org/10.1115/1.2900803)

use getset::CopyGetters;
use log::debug;
use nalgebra::DVector;

use super::{check_state, StepError};
use crate::core::{ConfigError, Constant, Expr, Function, Parameter};
use crate::newton::{Newton, NewtonOptions};

/// Coefficients of [`GeneralizedAlpha`].
///
/// They are derived from the spectral radius at infinity _ρ<sub>∞</sub>_,
/// which controls how much high-frequency response is damped: `1.0` means no
/// damping, `0.0` annihilates it in one step. Default: `0.8`.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct AlphaOptions {
    /// Spectral radius at infinity. `None` for [`AlphaOptions::newmark`].
    rho_inf: Option<f64>,
    /// Shift of the acceleration.
    alpha_m: f64,
    /// Shift of the position.
    alpha_f: f64,
    /// Newmark parameter for velocity update.
    gamma: f64,
    /// Newmark parameter for position update.
    beta: f64,
}

impl AlphaOptions {
    /// Derives the coefficients from the spectral radius at infinity.
    ///
    /// Fails unless `0 <= rho_inf <= 1`.
    pub fn with_rho_inf(rho_inf: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&rho_inf) {
            return Err(ConfigError::InvalidParameter {
                name: "rho_inf",
                value: rho_inf,
            });
        }

        let alpha_m = (2.0 * rho_inf - 1.0) / (rho_inf + 1.0);
        let alpha_f = rho_inf / (rho_inf + 1.0);
        let gamma = 0.5 - alpha_m + alpha_f;
        let beta = 0.25 * (1.0 - alpha_m + alpha_f).powi(2);

        Ok(Self {
            rho_inf: Some(rho_inf),
            alpha_m,
            alpha_f,
            gamma,
            beta,
        })
    }

    /// Classical Newmark average acceleration method (trapezoidal rule) with
    /// no numerical damping.
    pub fn newmark() -> Self {
        Self {
            rho_inf: None,
            alpha_m: 0.0,
            alpha_f: 0.0,
            gamma: 0.5,
            beta: 0.25,
        }
    }
}

impl Default for AlphaOptions {
    fn default() -> Self {
        let rho_inf: f64 = 0.8;
        let alpha_m = (2.0 * rho_inf - 1.0) / (rho_inf + 1.0);
        let alpha_f = rho_inf / (rho_inf + 1.0);

        Self {
            rho_inf: Some(rho_inf),
            alpha_m,
            alpha_f,
            gamma: 0.5 - alpha_m + alpha_f,
            beta: 0.25 * (1.0 - alpha_m + alpha_f).powi(2),
        }
    }
}

/// Generalized-alpha integrator. See [module](self) documentation for more
/// details.
#[derive(Debug)]
pub struct GeneralizedAlpha<'a> {
    options: AlphaOptions,
    equ: Expr<'a>,
    a_new: Expr<'a>,
    x_old: Constant,
    v_old: Constant,
    a_old: Constant,
    pos_factor: Parameter,
    vel_factor: Parameter,
    a_buf: DVector<f64>,
    newton: Newton,
}

impl<'a> GeneralizedAlpha<'a> {
    /// Initializes the integrator for given mass operator and force with
    /// [default Newton options](GeneralizedAlpha::default_newton).
    pub fn new<M, F>(mass: M, force: F, options: AlphaOptions) -> Result<Self, ConfigError>
    where
        M: Function + 'a,
        F: Function + 'a,
    {
        Self::with_newton(mass, force, options, Self::default_newton())
    }

    /// Newton options suited to the residual of the method: tolerance `1e-8`,
    /// at most `20` iterations and relative step tolerance `1e-6`.
    ///
    /// The residual scales with _1/(βτ²)_, so for small steps roundoff alone
    /// exceeds any fixed absolute tolerance. The step criterion still stops the
    /// iteration there.
    pub fn default_newton() -> NewtonOptions {
        NewtonOptions::new(1e-8, 20).with_step_tolerance(1e-6)
    }

    /// Initializes the integrator for given mass operator, force and Newton
    /// options.
    pub fn with_newton<M, F>(
        mass: M,
        force: F,
        options: AlphaOptions,
        newton: NewtonOptions,
    ) -> Result<Self, ConfigError>
    where
        M: Function + 'a,
        F: Function + 'a,
    {
        let n = force.dim_x();
        let mass = Expr::function(mass);
        let force = Expr::function(force);

        let x_old = Constant::zeros(n);
        let v_old = Constant::zeros(n);
        let a_old = Constant::zeros(n);
        let pos_factor = Parameter::default();
        let vel_factor = Parameter::default();

        let AlphaOptions {
            alpha_m,
            alpha_f,
            beta,
            ..
        } = options;

        let x = Expr::identity(n);
        let xo = Expr::constant(&x_old);
        let vo = Expr::constant(&v_old);
        let ao = Expr::constant(&a_old);

        let a_new = Expr::sub(
            &Expr::sub(
                &Expr::scale(&pos_factor, &Expr::sub(&x, &xo)?),
                &Expr::scale(&vel_factor, &vo),
            )?,
            &Expr::scale(1.0 / (2.0 * beta) - 1.0, &ao),
        )?;

        let a_shifted = Expr::sum(
            &Expr::scale(1.0 - alpha_m, &a_new),
            &Expr::scale(alpha_m, &ao),
        )?;
        let x_shifted = Expr::sum(&Expr::scale(1.0 - alpha_f, &x), &Expr::scale(alpha_f, &xo))?;

        let equ = Expr::sub(
            &Expr::compose(&mass, &a_shifted)?,
            &Expr::compose(&force, &x_shifted)?,
        )?;

        Ok(Self {
            options,
            equ,
            a_new,
            x_old,
            v_old,
            a_old,
            pos_factor,
            vel_factor,
            a_buf: DVector::zeros(n),
            newton: Newton::with_options(newton),
        })
    }

    /// Returns the coefficients of the method.
    pub fn options(&self) -> &AlphaOptions {
        &self.options
    }

    /// Returns the residual in the new position solved in every step.
    pub fn equation(&self) -> &Expr<'a> {
        &self.equ
    }

    /// Dimension of the state.
    pub fn dim(&self) -> usize {
        self.x_old.dim()
    }

    /// Advances position `x`, velocity `v` and acceleration `a` by one step of
    /// size `tau`.
    pub fn do_step(
        &mut self,
        tau: f64,
        x: &mut DVector<f64>,
        v: &mut DVector<f64>,
        a: &mut DVector<f64>,
    ) -> Result<(), StepError> {
        let n = self.dim();
        check_state(n, x)?;
        check_state(n, v)?;
        check_state(n, a)?;

        let AlphaOptions { gamma, beta, .. } = self.options;

        self.x_old.set(x);
        self.v_old.set(v);
        self.a_old.set(a);
        self.pos_factor.set(1.0 / (beta * tau * tau));
        self.vel_factor.set(1.0 / (beta * tau));

        self.newton.solve(&self.equ, x)?;

        self.a_new.eval(x, &mut self.a_buf);
        v.axpy(tau * (1.0 - gamma), a, 1.0);
        v.axpy(tau * gamma, &self.a_buf, 1.0);
        a.copy_from(&self.a_buf);

        Ok(())
    }

    /// Integrates over _[0, t_end]_ in `steps` equal steps, calling `observer`
    /// with the time and the position after every step.
    pub fn integrate<O>(
        &mut self,
        t_end: f64,
        steps: usize,
        x: &mut DVector<f64>,
        v: &mut DVector<f64>,
        a: &mut DVector<f64>,
        mut observer: O,
    ) -> Result<(), StepError>
    where
        O: FnMut(f64, &DVector<f64>),
    {
        let tau = t_end / steps as f64;

        for i in 1..=steps {
            self.do_step(tau, x, v, a)?;

            let t = i as f64 * tau;
            debug!("generalized alpha: t = {}", t);
            observer(t, x);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::jacobian_error;

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    fn oscillator(
        omega: f64,
        options: AlphaOptions,
    ) -> GeneralizedAlpha<'static> {
        let mass = Expr::identity(1);
        let force = Expr::scale(-omega * omega, &Expr::identity(1));
        GeneralizedAlpha::new(mass, force, options).unwrap()
    }

    #[test]
    fn coefficients() {
        let options = AlphaOptions::default();
        assert_eq!(options, AlphaOptions::with_rho_inf(0.8).unwrap());
        assert_abs_diff_eq!(options.alpha_m(), 1.0 / 3.0, epsilon = 1e-15);
        assert_abs_diff_eq!(options.alpha_f(), 4.0 / 9.0, epsilon = 1e-15);
        assert_abs_diff_eq!(options.gamma(), 11.0 / 18.0, epsilon = 1e-15);
        assert_abs_diff_eq!(options.beta(), 25.0 / 81.0, epsilon = 1e-15);

        let undamped = AlphaOptions::with_rho_inf(1.0).unwrap();
        assert_abs_diff_eq!(undamped.alpha_m(), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(undamped.alpha_f(), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(undamped.gamma(), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(undamped.beta(), 0.25, epsilon = 1e-15);

        assert_eq!(options.rho_inf(), Some(0.8));
        assert_eq!(AlphaOptions::newmark().rho_inf(), None);
        assert_eq!(AlphaOptions::newmark(), AlphaOptions::newmark());

        assert_eq!(
            AlphaOptions::with_rho_inf(1.5),
            Err(ConfigError::InvalidParameter {
                name: "rho_inf",
                value: 1.5
            })
        );
    }

    #[test]
    fn newmark_accuracy() {
        let mut alpha = oscillator(1.0, AlphaOptions::newmark());
        let (mut x, mut v, mut a) = (dvector![1.0], dvector![0.0], dvector![-1.0]);
        let mut error: f64 = 0.0;

        let t_end = 2.0 * std::f64::consts::PI;
        alpha
            .integrate(t_end, 628, &mut x, &mut v, &mut a, |t, x| {
                error = error.max((x[0] - t.cos()).abs());
            })
            .unwrap();

        assert!(error < 1e-3, "error = {}", error);
    }

    #[test]
    fn generalized_alpha_accuracy() {
        let mut alpha = oscillator(1.0, AlphaOptions::default());
        let (mut x, mut v, mut a) = (dvector![1.0], dvector![0.0], dvector![-1.0]);
        let mut error: f64 = 0.0;

        alpha
            .integrate(2.0 * std::f64::consts::PI, 628, &mut x, &mut v, &mut a, |t, x| {
                error = error.max((x[0] - t.cos()).abs());
            })
            .unwrap();

        assert!(error < 1e-3, "error = {}", error);
    }

    #[test]
    fn high_frequencies_are_damped() {
        let omega = 100.0;
        let amplitude = |x: &DVector<f64>, v: &DVector<f64>| (x[0].powi(2) + (v[0] / omega).powi(2)).sqrt();

        let mut damped = oscillator(omega, AlphaOptions::with_rho_inf(0.5).unwrap());
        let (mut x, mut v, mut a) = (dvector![1.0], dvector![0.0], dvector![-omega * omega]);
        for _ in 0..40 {
            damped.do_step(0.1, &mut x, &mut v, &mut a).unwrap();
        }
        assert!(amplitude(&x, &v) < 1e-4);

        let mut newmark = oscillator(omega, AlphaOptions::newmark());
        let (mut x, mut v, mut a) = (dvector![1.0], dvector![0.0], dvector![-omega * omega]);
        for _ in 0..40 {
            newmark.do_step(0.1, &mut x, &mut v, &mut a).unwrap();
            assert!(amplitude(&x, &v) < 1.0 + 1e-9);
        }
        assert!(amplitude(&x, &v) > 1.0 - 1e-9);
    }

    #[test]
    fn residual_jacobian() {
        let mut alpha = oscillator(3.0, AlphaOptions::default());
        let (mut x, mut v, mut a) = (dvector![1.0], dvector![0.5], dvector![-9.0]);
        alpha.do_step(0.05, &mut x, &mut v, &mut a).unwrap();

        assert!(jacobian_error(alpha.equation(), &dvector![0.7]) < 1e-6);
    }

    #[test]
    fn invalid_state() {
        let mut alpha = oscillator(1.0, AlphaOptions::default());
        let (mut x, mut v, mut a) = (dvector![1.0], dvector![0.0, 1.0], dvector![0.0]);

        assert_eq!(
            alpha.do_step(0.1, &mut x, &mut v, &mut a),
            Err(StepError::InvalidDimensionality {
                expected: 1,
                found: 2
            })
        );
    }
}
