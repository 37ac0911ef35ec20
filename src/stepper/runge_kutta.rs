//! Runge–Kutta methods for arbitrary Butcher tableaus.
//!
//! Explicit tableaus are evaluated stage by stage. Implicit ones solve for all
//! stage derivatives _K = (k<sub>1</sub>, …, k<sub>s</sub>)_ at once with
//! Newton, using the residual
//!
//! ```text
//! K - F(Y + τ (A ⊗ I) K) = 0,
//! ```
//!
//! where _Y_ is the old state repeated _s_ times and _F_ applies _f_ to each
//! block of its argument.

use nalgebra::{DMatrix, DVector};

use super::{check_state, euler::check_square, ButcherTableau, StepError, TimeStepper};
use crate::core::{ConfigError, Constant, Expr, Function, Parameter};
use crate::newton::{Newton, NewtonOptions};

/// Explicit Runge–Kutta method.
#[derive(Debug)]
pub struct ExplicitRungeKutta<F> {
    f: F,
    tableau: ButcherTableau,
    k: Vec<DVector<f64>>,
    y_stage: DVector<f64>,
}

impl<F: Function> ExplicitRungeKutta<F> {
    /// Initializes the method for given right-hand side and tableau.
    ///
    /// Fails if the tableau is not explicit.
    pub fn new(f: F, tableau: ButcherTableau) -> Result<Self, ConfigError> {
        check_square("explicit runge kutta", &f)?;

        if !tableau.is_explicit() {
            return Err(ConfigError::InvalidTableau(
                "explicit method requires strictly lower triangular A".to_string(),
            ));
        }

        let n = f.dim_x();
        Ok(Self {
            k: vec![DVector::zeros(n); tableau.stages()],
            y_stage: DVector::zeros(n),
            f,
            tableau,
        })
    }

    /// The classical four-stage method.
    pub fn rk4(f: F) -> Result<Self, ConfigError> {
        Self::new(f, ButcherTableau::rk4())
    }
}

impl<F: Function> TimeStepper for ExplicitRungeKutta<F> {
    const NAME: &'static str = "explicit Runge-Kutta";

    fn dim(&self) -> usize {
        self.f.dim_x()
    }

    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), StepError> {
        check_state(self.dim(), y)?;

        let a = self.tableau.a();

        for j in 0..self.tableau.stages() {
            self.y_stage.copy_from(y);
            for l in 0..j {
                self.y_stage.axpy(tau * a[(j, l)], &self.k[l], 1.0);
            }
            self.f.eval(&self.y_stage, &mut self.k[j]);
        }

        for (bj, kj) in self.tableau.b().iter().zip(self.k.iter()) {
            y.axpy(tau * bj, kj, 1.0);
        }

        Ok(())
    }
}

/// _F(Y) = (f(y<sub>1</sub>), …, f(y<sub>s</sub>))_ with block diagonal
/// Jacobian.
struct Stages<'a> {
    f: Expr<'a>,
    stages: usize,
}

impl Function for Stages<'_> {
    fn dim_x(&self) -> usize {
        self.stages * self.f.dim_x()
    }

    fn dim_f(&self) -> usize {
        self.stages * self.f.dim_f()
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        let n = self.f.dim_x();
        let mut fy = DVector::zeros(n);

        for j in 0..self.stages {
            let y = x.rows(j * n, n).clone_owned();
            self.f.eval(&y, &mut fy);
            fx.rows_mut(j * n, n).copy_from(&fy);
        }
    }

    fn eval_deriv(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        let n = self.f.dim_x();
        let mut block = DMatrix::zeros(n, n);

        jac.fill(0.0);
        for j in 0..self.stages {
            let y = x.rows(j * n, n).clone_owned();
            self.f.eval_deriv(&y, &mut block);
            jac.view_mut((j * n, j * n), (n, n)).copy_from(&block);
        }
    }
}

/// Linear map _K ↦ (A ⊗ I) K_.
struct TableauOperator {
    matrix: DMatrix<f64>,
}

impl TableauOperator {
    fn new(a: &DMatrix<f64>, n: usize) -> Self {
        Self {
            matrix: a.kronecker(&DMatrix::identity(n, n)),
        }
    }
}

impl Function for TableauOperator {
    fn dim_x(&self) -> usize {
        self.matrix.ncols()
    }

    fn dim_f(&self) -> usize {
        self.matrix.nrows()
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        self.matrix.mul_to(x, fx);
    }

    fn eval_deriv(&self, _x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        jac.copy_from(&self.matrix);
    }
}

/// Implicit Runge–Kutta method solving all stages simultaneously.
#[derive(Debug)]
pub struct ImplicitRungeKutta<'a> {
    rhs: Expr<'a>,
    tableau: ButcherTableau,
    equ: Expr<'a>,
    y_old: Constant,
    tau: Parameter,
    k: DVector<f64>,
    fy: DVector<f64>,
    newton: Newton,
}

impl<'a> ImplicitRungeKutta<'a> {
    /// Initializes the method for given right-hand side and tableau with
    /// default Newton options.
    pub fn new<F: Function + 'a>(f: F, tableau: ButcherTableau) -> Result<Self, ConfigError> {
        Self::with_newton(f, tableau, NewtonOptions::default())
    }

    /// Initializes the method for given right-hand side, tableau and Newton
    /// options.
    pub fn with_newton<F: Function + 'a>(
        f: F,
        tableau: ButcherTableau,
        options: NewtonOptions,
    ) -> Result<Self, ConfigError> {
        check_square("implicit runge kutta", &f)?;

        let n = f.dim_x();
        let s = tableau.stages();

        let rhs = Expr::function(f);
        let y_old = Constant::zeros(s * n);
        let tau = Parameter::default();

        let stages = Expr::function(Stages {
            f: rhs.clone(),
            stages: s,
        });
        let combination = Expr::function(TableauOperator::new(tableau.a(), n));
        let arg = Expr::sum(&Expr::constant(&y_old), &Expr::scale(&tau, &combination))?;
        let equ = Expr::sub(&Expr::identity(s * n), &Expr::compose(&stages, &arg)?)?;

        Ok(Self {
            rhs,
            tableau,
            equ,
            y_old,
            tau,
            k: DVector::zeros(s * n),
            fy: DVector::zeros(n),
            newton: Newton::with_options(options),
        })
    }

    /// Two-stage Gauss–Legendre method.
    pub fn gauss_legendre2<F: Function + 'a>(f: F) -> Result<Self, ConfigError> {
        Self::new(f, ButcherTableau::gauss_legendre2())
    }

    /// Returns the residual in the stage derivatives solved in every step.
    pub fn equation(&self) -> &Expr<'a> {
        &self.equ
    }

    /// Returns the tableau of the method.
    pub fn tableau(&self) -> &ButcherTableau {
        &self.tableau
    }
}

impl TimeStepper for ImplicitRungeKutta<'_> {
    const NAME: &'static str = "implicit Runge-Kutta";

    fn dim(&self) -> usize {
        self.rhs.dim_x()
    }

    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), StepError> {
        let n = self.dim();
        let s = self.tableau.stages();
        check_state(n, y)?;

        let y_tiled = DVector::from_fn(s * n, |i, _| y[i % n]);
        self.y_old.set(&y_tiled);
        self.tau.set(tau);

        // All stages start from the derivative in the old state.
        self.rhs.eval(y, &mut self.fy);
        for j in 0..s {
            self.k.rows_mut(j * n, n).copy_from(&self.fy);
        }

        self.newton.solve(&self.equ, &mut self.k)?;

        for (j, bj) in self.tableau.b().iter().enumerate() {
            y.axpy(tau * bj, &self.k.rows(j * n, n), 1.0);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::stepper::ImplicitEuler;
    use crate::testing::{jacobian_error, max_error, HarmonicOscillator, Pendulum, RcCircuit};

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn rk4_is_fourth_order() {
        let f = HarmonicOscillator::default();
        let y0 = dvector![1.0, 0.0];

        let mut coarse = ExplicitRungeKutta::rk4(f).unwrap();
        let mut fine = ExplicitRungeKutta::rk4(f).unwrap();
        let e1 = max_error(&mut coarse, 0.1, 10, &y0, |t| f.exact(t)).unwrap();
        let e2 = max_error(&mut fine, 0.05, 20, &y0, |t| f.exact(t)).unwrap();

        let ratio = e1 / e2;
        assert!(ratio > 14.0 && ratio < 18.0, "ratio = {}", ratio);
    }

    #[test]
    fn explicit_tableaus_agree_with_euler_methods() {
        let f = HarmonicOscillator::default();
        let mut rk = ExplicitRungeKutta::new(f, ButcherTableau::midpoint()).unwrap();
        let mut improved = crate::stepper::ImprovedEuler::new(f).unwrap();

        let mut y1 = dvector![1.0, 0.0];
        let mut y2 = y1.clone();
        for _ in 0..10 {
            rk.do_step(0.1, &mut y1).unwrap();
            improved.do_step(0.1, &mut y2).unwrap();
        }

        assert_abs_diff_eq!(y1, y2, epsilon = 1e-14);
    }

    #[test]
    fn explicit_requires_explicit_tableau() {
        assert!(matches!(
            ExplicitRungeKutta::new(HarmonicOscillator::default(), ButcherTableau::gauss_legendre2()),
            Err(ConfigError::InvalidTableau(_))
        ));
    }

    #[test]
    fn gauss_legendre2_is_fourth_order() {
        let f = HarmonicOscillator::default();
        let y0 = dvector![1.0, 0.0];

        let mut coarse = ImplicitRungeKutta::gauss_legendre2(f).unwrap();
        let mut fine = ImplicitRungeKutta::gauss_legendre2(f).unwrap();
        let e1 = max_error(&mut coarse, 0.2, 10, &y0, |t| f.exact(t)).unwrap();
        let e2 = max_error(&mut fine, 0.1, 20, &y0, |t| f.exact(t)).unwrap();

        let ratio = e1 / e2;
        assert!(ratio > 14.0 && ratio < 18.0, "ratio = {}", ratio);
    }

    #[test]
    fn gauss_legendre_conserves_energy() {
        let f = HarmonicOscillator::default();
        let mut stepper = ImplicitRungeKutta::new(f, ButcherTableau::gauss_legendre3()).unwrap();
        let mut y = dvector![1.0, 0.0];

        for _ in 0..50 {
            stepper.do_step(0.5, &mut y).unwrap();
        }

        assert_abs_diff_eq!(f.energy(&y), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn one_stage_tableau_is_implicit_euler() {
        let f = Pendulum::new(1.0);
        let mut irk = ImplicitRungeKutta::new(f, ButcherTableau::implicit_euler()).unwrap();
        let mut ie = ImplicitEuler::new(f).unwrap();

        let mut y1 = dvector![1.0, 0.0];
        let mut y2 = y1.clone();
        for _ in 0..20 {
            irk.do_step(0.05, &mut y1).unwrap();
            ie.do_step(0.05, &mut y2).unwrap();
        }

        assert_abs_diff_eq!(y1, y2, epsilon = 1e-9);
    }

    #[test]
    fn stage_residual_jacobian() {
        let mut stepper = ImplicitRungeKutta::new(Pendulum::new(2.0), ButcherTableau::radau_iia2()).unwrap();
        let mut y = dvector![0.5, 0.1];
        stepper.do_step(0.1, &mut y).unwrap();

        let k = dvector![0.1, -2.0, 0.2, -1.9];
        assert!(jacobian_error(stepper.equation(), &k) < 1e-7);
    }

    #[test]
    fn tableau_operator() {
        let op = TableauOperator::new(&dmatrix![1.0, 2.0; 3.0, 4.0], 2);
        let mut fx = DVector::zeros(4);
        op.eval(&dvector![1.0, 0.0, 0.0, 1.0], &mut fx);
        assert_eq!(fx, dvector![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn radau_on_stiff_circuit() {
        let f = RcCircuit::new(100.0, 1e-6);
        let mut stepper = ImplicitRungeKutta::new(f, ButcherTableau::radau_iia2()).unwrap();
        let mut y = dvector![0.0, 0.0];

        for _ in 0..100 {
            stepper.do_step(1e-3, &mut y).unwrap();
        }

        assert_abs_diff_eq!(y[1], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(y[0], 1.0, epsilon = 0.05);
    }
}
