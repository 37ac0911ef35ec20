//! Explicit Euler methods.

use nalgebra::DVector;

use super::{check_state, StepError, TimeStepper};
use crate::core::{ConfigError, Function};

pub(crate) fn check_square<F: Function + ?Sized>(
    op: &'static str,
    f: &F,
) -> Result<(), ConfigError> {
    if f.dim_x() != f.dim_f() {
        return Err(ConfigError::DimensionMismatch {
            op,
            expected: f.dim_x(),
            found: f.dim_f(),
        });
    }

    Ok(())
}

/// _y ← y + τ f(y)_. First order.
#[derive(Debug)]
pub struct ExplicitEuler<F> {
    f: F,
    fy: DVector<f64>,
}

impl<F: Function> ExplicitEuler<F> {
    /// Initializes the method for given right-hand side.
    pub fn new(f: F) -> Result<Self, ConfigError> {
        check_square("explicit euler", &f)?;
        let fy = DVector::zeros(f.dim_f());
        Ok(Self { f, fy })
    }
}

impl<F: Function> TimeStepper for ExplicitEuler<F> {
    const NAME: &'static str = "explicit Euler";

    fn dim(&self) -> usize {
        self.f.dim_x()
    }

    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), StepError> {
        check_state(self.dim(), y)?;

        self.f.eval(y, &mut self.fy);
        y.axpy(tau, &self.fy, 1.0);

        Ok(())
    }
}

/// Explicit midpoint rule: the right-hand side is evaluated at the half step
/// _ŷ = y + (τ/2) f(y)_ and then _y ← y + τ f(ŷ)_. Second order.
#[derive(Debug)]
pub struct ImprovedEuler<F> {
    f: F,
    fy: DVector<f64>,
    y_half: DVector<f64>,
}

impl<F: Function> ImprovedEuler<F> {
    /// Initializes the method for given right-hand side.
    pub fn new(f: F) -> Result<Self, ConfigError> {
        check_square("improved euler", &f)?;
        let n = f.dim_x();
        Ok(Self {
            f,
            fy: DVector::zeros(n),
            y_half: DVector::zeros(n),
        })
    }
}

impl<F: Function> TimeStepper for ImprovedEuler<F> {
    const NAME: &'static str = "improved Euler";

    fn dim(&self) -> usize {
        self.f.dim_x()
    }

    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), StepError> {
        check_state(self.dim(), y)?;

        // Predictor.
        self.f.eval(y, &mut self.fy);
        self.y_half.copy_from(y);
        self.y_half.axpy(0.5 * tau, &self.fy, 1.0);

        // Corrector.
        self.f.eval(&self.y_half, &mut self.fy);
        y.axpy(tau, &self.fy, 1.0);

        Ok(())
    }
}
