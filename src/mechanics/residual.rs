use log::trace;
use nalgebra::{DMatrix, DVector, SMatrix, SVector};

use super::{Connector, ConstraintFormulation, MassSpringSystem, DEGENERATE_LENGTH};
use crate::core::Function;

/// Unit direction from `p1` to `p2` and the distance, or `None` for
/// coincident points.
fn direction<const D: usize>(
    p1: &SVector<f64, D>,
    p2: &SVector<f64, D>,
) -> Option<(SVector<f64, D>, f64)> {
    let d = p2 - p1;
    let length = d.norm();

    if length < DEGENERATE_LENGTH {
        None
    } else {
        Some((d / length, length))
    }
}

/// Offset of a connector in the state vector. Fixes have none.
fn offset<const D: usize>(connector: Connector) -> Option<usize> {
    match connector {
        Connector::Mass(index) => Some(D * index),
        Connector::Fix(_) => None,
    }
}

fn add_rows<const D: usize>(fx: &mut DVector<f64>, connector: Connector, value: &SVector<f64, D>) {
    if let Some(row) = offset::<D>(connector) {
        let mut rows = fx.fixed_rows_mut::<D>(row);
        rows += value;
    }
}

fn add_block<const D: usize>(
    jac: &mut DMatrix<f64>,
    row: Connector,
    col: Connector,
    block: &SMatrix<f64, D, D>,
) {
    if let (Some(r), Some(c)) = (offset::<D>(row), offset::<D>(col)) {
        let mut view = jac.fixed_view_mut::<D, D>(r, c);
        view += block;
    }
}

/// Adds the stiffness `k` of a two-point element into the Jacobian: `-k` on
/// the diagonal blocks, `+k` on the off-diagonal ones.
fn add_stiffness<const D: usize>(
    jac: &mut DMatrix<f64>,
    [c1, c2]: [Connector; 2],
    k: &SMatrix<f64, D, D>,
) {
    let neg = -k;
    add_block(jac, c1, c1, &neg);
    add_block(jac, c1, c2, k);
    add_block(jac, c2, c2, &neg);
    add_block(jac, c2, c1, k);
}

/// Forces acting on the masses, and constraint residuals in the multiplier
/// rows.
///
/// For the state _x = (p, λ)_ it evaluates to
///
/// ```text
/// F(x) = (m g + spring forces + constraint forces, L0 - ‖p1 - p2‖ for every constraint)
/// ```
///
/// The sign of the constraint rows makes the Jacobian a symmetric saddle-point
/// matrix: the multiplier column and the constraint row hold the same
/// gradient.
///
/// With the penalty formulation there are no multiplier rows and the
/// constraints are stiff springs.
#[derive(Debug, Clone, Copy)]
pub struct ForceResidual<'a, const D: usize> {
    system: &'a MassSpringSystem<D>,
    formulation: ConstraintFormulation,
}

impl<'a, const D: usize> ForceResidual<'a, D> {
    /// Creates the residual for given system and constraint formulation.
    pub fn new(system: &'a MassSpringSystem<D>, formulation: ConstraintFormulation) -> Self {
        Self {
            system,
            formulation,
        }
    }

    /// Spring law `k (L - L0)` along the connecting direction. Returns false
    /// if the element is degenerate.
    fn eval_spring(
        &self,
        x: &DVector<f64>,
        fx: &mut DVector<f64>,
        connectors: [Connector; 2],
        rest_length: f64,
        stiffness: f64,
    ) -> bool {
        let [c1, c2] = connectors;
        let p1 = self.system.pos_in(x, c1);
        let p2 = self.system.pos_in(x, c2);

        match direction(&p1, &p2) {
            Some((n, length)) => {
                let force = n * (stiffness * (length - rest_length));
                add_rows(fx, c1, &force);
                add_rows(fx, c2, &-force);
                true
            }
            None => false,
        }
    }

    fn eval_spring_deriv(
        &self,
        x: &DVector<f64>,
        jac: &mut DMatrix<f64>,
        connectors: [Connector; 2],
        rest_length: f64,
        stiffness: f64,
    ) {
        let [c1, c2] = connectors;
        let p1 = self.system.pos_in(x, c1);
        let p2 = self.system.pos_in(x, c2);

        if let Some((n, length)) = direction(&p1, &p2) {
            let force = stiffness * (length - rest_length);
            let nnt = n * n.transpose();
            let k = nnt * stiffness + (SMatrix::<f64, D, D>::identity() - nnt) * (force / length);
            add_stiffness(jac, connectors, &k);
        }
    }
}

impl<const D: usize> Function for ForceResidual<'_, D> {
    fn dim_x(&self) -> usize {
        self.system.dim(self.formulation)
    }

    fn dim_f(&self) -> usize {
        self.system.dim(self.formulation)
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        let system = self.system;
        let dof = system.dof();
        let gravity = system.gravity();

        fx.fill(0.0);

        for (i, mass) in system.masses().iter().enumerate() {
            let weight = gravity * mass.mass;
            add_rows(fx, Connector::Mass(i), &weight);
        }

        for (i, spring) in system.springs().iter().enumerate() {
            if !self.eval_spring(x, fx, spring.connectors, spring.rest_length, spring.stiffness) {
                trace!("skipping degenerate spring {}", i);
            }
        }

        for (i, constraint) in system.constraints().iter().enumerate() {
            match self.formulation {
                ConstraintFormulation::Lagrange => {
                    let [c1, c2] = constraint.connectors;
                    let p1 = system.pos_in(x, c1);
                    let p2 = system.pos_in(x, c2);
                    let lambda = x[dof + i];

                    fx[dof + i] = constraint.rest_length - (p2 - p1).norm();

                    match direction(&p1, &p2) {
                        Some((n, _)) => {
                            let force = n * lambda;
                            add_rows(fx, c1, &force);
                            add_rows(fx, c2, &-force);
                        }
                        None => trace!("skipping degenerate constraint {}", i),
                    }
                }
                ConstraintFormulation::Penalty { stiffness } => {
                    if !self.eval_spring(
                        x,
                        fx,
                        constraint.connectors,
                        constraint.rest_length,
                        stiffness,
                    ) {
                        trace!("skipping degenerate constraint {}", i);
                    }
                }
            }
        }
    }

    fn eval_deriv(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        let system = self.system;
        let dof = system.dof();

        jac.fill(0.0);

        for spring in system.springs() {
            self.eval_spring_deriv(x, jac, spring.connectors, spring.rest_length, spring.stiffness);
        }

        for (i, constraint) in system.constraints().iter().enumerate() {
            match self.formulation {
                ConstraintFormulation::Lagrange => {
                    let [c1, c2] = constraint.connectors;
                    let p1 = system.pos_in(x, c1);
                    let p2 = system.pos_in(x, c2);
                    let lambda = x[dof + i];
                    let row = dof + i;

                    let Some((n, length)) = direction(&p1, &p2) else {
                        continue;
                    };

                    // Geometric stiffness of the constraint force.
                    let g = (SMatrix::<f64, D, D>::identity() - n * n.transpose()) * (lambda / length);
                    add_stiffness(jac, constraint.connectors, &g);

                    // Coupling between the multiplier and the positions.
                    if let Some(r) = offset::<D>(c1) {
                        let mut col = jac.fixed_view_mut::<D, 1>(r, row);
                        col += n;
                        let mut grad = jac.fixed_view_mut::<1, D>(row, r);
                        grad += n.transpose();
                    }
                    if let Some(r) = offset::<D>(c2) {
                        let mut col = jac.fixed_view_mut::<D, 1>(r, row);
                        col -= n;
                        let mut grad = jac.fixed_view_mut::<1, D>(row, r);
                        grad -= n.transpose();
                    }
                }
                ConstraintFormulation::Penalty { stiffness } => {
                    self.eval_spring_deriv(
                        x,
                        jac,
                        constraint.connectors,
                        constraint.rest_length,
                        stiffness,
                    );
                }
            }
        }
    }
}

/// Mass operator _M(a) = (m a, 0)_: each mass scales its own acceleration
/// components, multiplier rows are zero.
#[derive(Debug, Clone, Copy)]
pub struct MassOperator<'a, const D: usize> {
    system: &'a MassSpringSystem<D>,
    formulation: ConstraintFormulation,
}

impl<'a, const D: usize> MassOperator<'a, D> {
    /// Creates the mass operator for given system and constraint
    /// formulation.
    pub fn new(system: &'a MassSpringSystem<D>, formulation: ConstraintFormulation) -> Self {
        Self {
            system,
            formulation,
        }
    }
}

impl<const D: usize> Function for MassOperator<'_, D> {
    fn dim_x(&self) -> usize {
        self.system.dim(self.formulation)
    }

    fn dim_f(&self) -> usize {
        self.system.dim(self.formulation)
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        fx.fill(0.0);
        for (i, mass) in self.system.masses().iter().enumerate() {
            for k in 0..D {
                fx[D * i + k] = mass.mass * x[D * i + k];
            }
        }
    }

    fn eval_deriv(&self, _x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        jac.fill(0.0);
        for (i, mass) in self.system.masses().iter().enumerate() {
            for k in 0..D {
                jac[(D * i + k, D * i + k)] = mass.mass;
            }
        }
    }
}
