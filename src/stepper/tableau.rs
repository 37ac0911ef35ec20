use nalgebra::{dmatrix, dvector, DMatrix, DVector};

use crate::core::ConfigError;

/// Coefficients _(A, b, c)_ of an _s_-stage Runge–Kutta method.
///
/// ```text
/// c | A
/// --+----
///   | bᵀ
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ButcherTableau {
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: DVector<f64>,
}

impl ButcherTableau {
    /// Creates a tableau from given coefficients.
    ///
    /// The number of stages is given by the length of `c`. Fails if `a` is not
    /// square with that size or if `b` has a different length.
    pub fn new(a: DMatrix<f64>, b: DVector<f64>, c: DVector<f64>) -> Result<Self, ConfigError> {
        let s = c.len();

        if s == 0 {
            return Err(ConfigError::InvalidTableau(
                "at least one stage is required".to_string(),
            ));
        }

        if a.nrows() != s || a.ncols() != s {
            return Err(ConfigError::InvalidTableau(format!(
                "A must be {s}x{s}, found {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }

        if b.len() != s {
            return Err(ConfigError::InvalidTableau(format!(
                "b must have {s} weights, found {}",
                b.len()
            )));
        }

        Ok(Self { a, b, c })
    }

    /// Number of stages.
    pub fn stages(&self) -> usize {
        self.c.len()
    }

    /// Coefficient matrix.
    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// Weights.
    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    /// Nodes.
    pub fn c(&self) -> &DVector<f64> {
        &self.c
    }

    /// Returns true if _A_ is strictly lower triangular, so the stages can be
    /// computed one after another without solving equations.
    pub fn is_explicit(&self) -> bool {
        let s = self.stages();
        (0..s).all(|i| (i..s).all(|j| self.a[(i, j)] == 0.0))
    }

    /// Forward Euler.
    pub fn euler() -> Self {
        Self {
            a: dmatrix![0.0],
            b: dvector![1.0],
            c: dvector![0.0],
        }
    }

    /// Explicit midpoint rule, order 2.
    pub fn midpoint() -> Self {
        Self {
            a: dmatrix![
                0.0, 0.0;
                0.5, 0.0
            ],
            b: dvector![0.0, 1.0],
            c: dvector![0.0, 0.5],
        }
    }

    /// Heun's method, order 2.
    pub fn heun() -> Self {
        Self {
            a: dmatrix![
                0.0, 0.0;
                1.0, 0.0
            ],
            b: dvector![0.5, 0.5],
            c: dvector![0.0, 1.0],
        }
    }

    /// The classical Runge–Kutta method, order 4.
    pub fn rk4() -> Self {
        Self {
            a: dmatrix![
                0.0, 0.0, 0.0, 0.0;
                0.5, 0.0, 0.0, 0.0;
                0.0, 0.5, 0.0, 0.0;
                0.0, 0.0, 1.0, 0.0
            ],
            b: dvector![1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
            c: dvector![0.0, 0.5, 0.5, 1.0],
        }
    }

    /// Backward Euler as a one-stage implicit method.
    pub fn implicit_euler() -> Self {
        Self {
            a: dmatrix![1.0],
            b: dvector![1.0],
            c: dvector![1.0],
        }
    }

    /// Two-stage Gauss–Legendre collocation, order 4.
    pub fn gauss_legendre2() -> Self {
        let r = 3f64.sqrt() / 6.0;
        Self {
            a: dmatrix![
                0.25, 0.25 - r;
                0.25 + r, 0.25
            ],
            b: dvector![0.5, 0.5],
            c: dvector![0.5 - r, 0.5 + r],
        }
    }

    /// Three-stage Gauss–Legendre collocation, order 6.
    pub fn gauss_legendre3() -> Self {
        let r = 15f64.sqrt();
        Self {
            a: dmatrix![
                5.0 / 36.0, 2.0 / 9.0 - r / 15.0, 5.0 / 36.0 - r / 30.0;
                5.0 / 36.0 + r / 24.0, 2.0 / 9.0, 5.0 / 36.0 - r / 24.0;
                5.0 / 36.0 + r / 30.0, 2.0 / 9.0 + r / 15.0, 5.0 / 36.0
            ],
            b: dvector![5.0 / 18.0, 4.0 / 9.0, 5.0 / 18.0],
            c: dvector![0.5 - r / 10.0, 0.5, 0.5 + r / 10.0],
        }
    }

    /// Two-stage Radau IIA, order 3 and L-stable.
    pub fn radau_iia2() -> Self {
        Self {
            a: dmatrix![
                5.0 / 12.0, -1.0 / 12.0;
                0.75, 0.25
            ],
            b: dvector![0.75, 0.25],
            c: dvector![1.0 / 3.0, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    fn presets() -> Vec<ButcherTableau> {
        vec![
            ButcherTableau::euler(),
            ButcherTableau::midpoint(),
            ButcherTableau::heun(),
            ButcherTableau::rk4(),
            ButcherTableau::implicit_euler(),
            ButcherTableau::gauss_legendre2(),
            ButcherTableau::gauss_legendre3(),
            ButcherTableau::radau_iia2(),
        ]
    }

    #[test]
    fn presets_are_consistent() {
        for tableau in presets() {
            assert_abs_diff_eq!(tableau.b().sum(), 1.0, epsilon = 1e-14);

            // Row sums of A are the nodes.
            for i in 0..tableau.stages() {
                assert_abs_diff_eq!(tableau.a().row(i).sum(), tableau.c()[i], epsilon = 1e-14);
            }

            // Second order condition, satisfied by all presets but Euler.
            if tableau.stages() > 1 {
                assert_abs_diff_eq!(tableau.b().dot(tableau.c()), 0.5, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn explicitness() {
        assert!(ButcherTableau::euler().is_explicit());
        assert!(ButcherTableau::rk4().is_explicit());
        assert!(!ButcherTableau::implicit_euler().is_explicit());
        assert!(!ButcherTableau::gauss_legendre2().is_explicit());
        assert!(!ButcherTableau::radau_iia2().is_explicit());
    }

    #[test]
    fn shape_validation() {
        assert!(ButcherTableau::new(dmatrix![0.0, 0.0; 1.0, 0.0], dvector![0.5, 0.5], dvector![0.0, 1.0]).is_ok());

        assert!(matches!(
            ButcherTableau::new(dmatrix![0.0, 0.0], dvector![0.5, 0.5], dvector![0.0, 1.0]),
            Err(ConfigError::InvalidTableau(_))
        ));
        assert!(matches!(
            ButcherTableau::new(dmatrix![0.0, 0.0; 1.0, 0.0], dvector![1.0], dvector![0.0, 1.0]),
            Err(ConfigError::InvalidTableau(_))
        ));
        assert!(matches!(
            ButcherTableau::new(DMatrix::zeros(0, 0), DVector::zeros(0), DVector::zeros(0)),
            Err(ConfigError::InvalidTableau(_))
        ));
    }
}
