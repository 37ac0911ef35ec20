use std::fmt;

use log::debug;
use nalgebra::{DVector, SVector};

use super::{
    Connector, ConstraintFormulation, DistanceConstraint, Fix, Mass, MechanicsError,
    SimulationOptions, Spring,
};
use super::{ForceResidual, MassOperator};
use crate::stepper::GeneralizedAlpha;

/// Fixes, masses, springs and distance constraints in _D_ dimensions.
///
/// Entities can only be added, so [`Connector`]s handed out by
/// [`add_fix`](MassSpringSystem::add_fix) and
/// [`add_mass`](MassSpringSystem::add_mass) stay valid for the lifetime of the
/// system.
#[derive(Debug, Clone)]
pub struct MassSpringSystem<const D: usize> {
    fixes: Vec<Fix<D>>,
    masses: Vec<Mass<D>>,
    springs: Vec<Spring>,
    constraints: Vec<DistanceConstraint>,
    gravity: SVector<f64, D>,
}

impl<const D: usize> MassSpringSystem<D> {
    /// Creates an empty system without gravity.
    pub fn new() -> Self {
        Self {
            fixes: Vec::new(),
            masses: Vec::new(),
            springs: Vec::new(),
            constraints: Vec::new(),
            gravity: SVector::zeros(),
        }
    }

    /// Gravitational acceleration.
    pub fn gravity(&self) -> SVector<f64, D> {
        self.gravity
    }

    /// Sets the gravitational acceleration.
    pub fn set_gravity(&mut self, gravity: [f64; D]) {
        self.gravity = SVector::from(gravity);
    }

    /// Adds a fix in given position.
    pub fn add_fix(&mut self, pos: [f64; D]) -> Connector {
        self.fixes.push(Fix::new(pos));
        Connector::Fix(self.fixes.len() - 1)
    }

    /// Adds a mass.
    pub fn add_mass(&mut self, mass: Mass<D>) -> Connector {
        self.masses.push(mass);
        Connector::Mass(self.masses.len() - 1)
    }

    /// Adds a spring and returns its index.
    pub fn add_spring(&mut self, spring: Spring) -> Result<usize, MechanicsError> {
        self.check_connectors(spring.connectors)?;
        self.springs.push(spring);
        Ok(self.springs.len() - 1)
    }

    /// Adds a distance constraint and returns its index.
    pub fn add_distance_constraint(
        &mut self,
        constraint: DistanceConstraint,
    ) -> Result<usize, MechanicsError> {
        self.check_connectors(constraint.connectors)?;
        self.constraints.push(constraint);
        Ok(self.constraints.len() - 1)
    }

    fn check_connectors(&self, connectors: [Connector; 2]) -> Result<(), MechanicsError> {
        for connector in connectors {
            let valid = match connector {
                Connector::Fix(index) => index < self.fixes.len(),
                Connector::Mass(index) => index < self.masses.len(),
            };

            if !valid {
                return Err(MechanicsError::UnknownConnector(connector));
            }
        }

        Ok(())
    }

    /// Fixes.
    pub fn fixes(&self) -> &[Fix<D>] {
        &self.fixes
    }

    /// Masses.
    pub fn masses(&self) -> &[Mass<D>] {
        &self.masses
    }

    /// Masses with mutable state. The number of masses cannot change.
    pub fn masses_mut(&mut self) -> &mut [Mass<D>] {
        &mut self.masses
    }

    /// Springs.
    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    /// Distance constraints.
    pub fn constraints(&self) -> &[DistanceConstraint] {
        &self.constraints
    }

    /// Number of position components of all masses.
    pub fn dof(&self) -> usize {
        D * self.masses.len()
    }

    /// Dimension of the state vector in given formulation, including
    /// multipliers.
    pub fn dim(&self, formulation: ConstraintFormulation) -> usize {
        match formulation {
            ConstraintFormulation::Lagrange => self.dof() + self.constraints.len(),
            ConstraintFormulation::Penalty { .. } => self.dof(),
        }
    }

    fn check_len(&self, len: usize) -> Result<(), MechanicsError> {
        if len < self.dof() {
            return Err(MechanicsError::InvalidDimensionality {
                expected: self.dof(),
                found: len,
            });
        }

        Ok(())
    }

    /// Copies positions, velocities and accelerations of the masses into the
    /// leading components of given vectors. Remaining components are left
    /// untouched.
    pub fn get_state(
        &self,
        x: &mut DVector<f64>,
        v: &mut DVector<f64>,
        a: &mut DVector<f64>,
    ) -> Result<(), MechanicsError> {
        self.check_len(x.len().min(v.len()).min(a.len()))?;

        for (i, mass) in self.masses.iter().enumerate() {
            x.fixed_rows_mut::<D>(D * i).copy_from(&mass.pos);
            v.fixed_rows_mut::<D>(D * i).copy_from(&mass.vel);
            a.fixed_rows_mut::<D>(D * i).copy_from(&mass.acc);
        }

        Ok(())
    }

    /// Copies the leading components of given vectors into positions,
    /// velocities and accelerations of the masses.
    pub fn set_state(
        &mut self,
        x: &DVector<f64>,
        v: &DVector<f64>,
        a: &DVector<f64>,
    ) -> Result<(), MechanicsError> {
        self.check_len(x.len().min(v.len()).min(a.len()))?;

        for (i, mass) in self.masses.iter_mut().enumerate() {
            mass.pos.copy_from(&x.fixed_rows::<D>(D * i));
            mass.vel.copy_from(&v.fixed_rows::<D>(D * i));
            mass.acc.copy_from(&a.fixed_rows::<D>(D * i));
        }

        Ok(())
    }

    /// Positions, velocities and accelerations of the masses as newly
    /// allocated vectors of dimension [`dof`](MassSpringSystem::dof).
    pub fn state(&self) -> (DVector<f64>, DVector<f64>, DVector<f64>) {
        let n = self.dof();
        let (mut x, mut v, mut a) = (DVector::zeros(n), DVector::zeros(n), DVector::zeros(n));

        for (i, mass) in self.masses.iter().enumerate() {
            x.fixed_rows_mut::<D>(D * i).copy_from(&mass.pos);
            v.fixed_rows_mut::<D>(D * i).copy_from(&mass.vel);
            a.fixed_rows_mut::<D>(D * i).copy_from(&mass.acc);
        }

        (x, v, a)
    }

    /// Current position of a connector.
    pub fn position(&self, connector: Connector) -> Result<SVector<f64, D>, MechanicsError> {
        match connector {
            Connector::Fix(index) => self.fixes.get(index).map(|fix| fix.pos),
            Connector::Mass(index) => self.masses.get(index).map(|mass| mass.pos),
        }
        .ok_or(MechanicsError::UnknownConnector(connector))
    }

    /// Position of a connector as stored in a state vector.
    pub fn position_in(
        &self,
        x: &DVector<f64>,
        connector: Connector,
    ) -> Result<SVector<f64, D>, MechanicsError> {
        let valid = match connector {
            Connector::Fix(index) => index < self.fixes.len(),
            Connector::Mass(index) => D * (index + 1) <= x.len().min(self.dof()),
        };

        if !valid {
            return Err(MechanicsError::UnknownConnector(connector));
        }

        Ok(self.pos_in(x, connector))
    }

    /// Unchecked variant of [`position_in`](MassSpringSystem::position_in) for
    /// connectors validated on insertion.
    pub(crate) fn pos_in(&self, x: &DVector<f64>, connector: Connector) -> SVector<f64, D> {
        match connector {
            Connector::Fix(index) => self.fixes[index].pos,
            Connector::Mass(index) => SVector::from_fn(|k, _| x[D * index + k]),
        }
    }

    /// Largest deviation of a constrained distance from its rest length in the
    /// current positions.
    pub fn constraint_violation(&self) -> f64 {
        let (x, _, _) = self.state();
        self.violation_in(&x)
    }

    fn violation_in(&self, x: &DVector<f64>) -> f64 {
        self.constraints
            .iter()
            .map(|constraint| {
                let [c1, c2] = constraint.connectors;
                let length = (self.pos_in(x, c2) - self.pos_in(x, c1)).norm();
                (length - constraint.rest_length).abs()
            })
            .fold(0.0, f64::max)
    }

    /// Integrates the system over _[0, t_end]_ in `steps` equal steps with
    /// default options, and writes the final state back into the masses.
    pub fn simulate(&mut self, t_end: f64, steps: usize) -> Result<(), MechanicsError> {
        self.simulate_with(t_end, steps, &SimulationOptions::default(), |_| {})
            .map(|_| ())
    }

    /// Integrates the system over _[0, t_end]_ in `steps` equal steps, calling
    /// `observer` after every step. The final state is written back into the
    /// masses and the final multipliers (empty for the penalty formulation)
    /// are returned.
    ///
    /// If a step fails, the masses keep their state from before the call.
    pub fn simulate_with<O>(
        &mut self,
        t_end: f64,
        steps: usize,
        options: &SimulationOptions,
        mut observer: O,
    ) -> Result<DVector<f64>, MechanicsError>
    where
        O: FnMut(&Snapshot<'_, D>),
    {
        if steps == 0 || !t_end.is_finite() || t_end <= 0.0 {
            return Err(MechanicsError::InvalidSteps { t_end, steps });
        }

        let formulation = options.formulation();
        let n = self.dim(formulation);
        let dof = self.dof();

        // Multipliers start from zero.
        let mut x = DVector::zeros(n);
        let mut v = DVector::zeros(n);
        let mut a = DVector::zeros(n);
        self.get_state(&mut x, &mut v, &mut a)?;

        debug!(
            "simulating {} masses with {} constraints ({:?}), {} unknowns",
            self.masses.len(),
            self.constraints.len(),
            formulation,
            n
        );

        {
            let system = &*self;
            let mass = MassOperator::new(system, formulation);
            let force = ForceResidual::new(system, formulation);

            let mut alpha =
                GeneralizedAlpha::with_newton(mass, force, options.alpha(), options.newton())?;
            alpha.integrate(t_end, steps, &mut x, &mut v, &mut a, |t, x| {
                observer(&Snapshot { system, t, x })
            })?;
        }

        self.set_state(&x, &v, &a)?;
        Ok(x.rows(dof, n - dof).clone_owned())
    }
}

impl<const D: usize> Default for MassSpringSystem<D> {
    fn default() -> Self {
        Self::new()
    }
}

fn fmt_vector<const D: usize>(f: &mut fmt::Formatter<'_>, v: &SVector<f64, D>) -> fmt::Result {
    write!(f, "(")?;
    for (k, value) in v.iter().enumerate() {
        if k > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{value}")?;
    }
    write!(f, ")")
}

impl<const D: usize> fmt::Display for MassSpringSystem<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fixes: {}", self.fixes.len())?;
        for (i, fix) in self.fixes.iter().enumerate() {
            write!(f, "  f{i}: pos = ")?;
            fmt_vector(f, &fix.pos)?;
            writeln!(f)?;
        }

        writeln!(f, "masses: {}", self.masses.len())?;
        for (i, mass) in self.masses.iter().enumerate() {
            write!(f, "  m{i}: mass = {}, pos = ", mass.mass)?;
            fmt_vector(f, &mass.pos)?;
            write!(f, ", vel = ")?;
            fmt_vector(f, &mass.vel)?;
            writeln!(f)?;
        }

        writeln!(f, "springs: {}", self.springs.len())?;
        for (i, spring) in self.springs.iter().enumerate() {
            let [c1, c2] = spring.connectors;
            writeln!(
                f,
                "  s{i}: {c1} -- {c2}, rest length = {}, stiffness = {}",
                spring.rest_length, spring.stiffness
            )?;
        }

        writeln!(f, "constraints: {}", self.constraints.len())?;
        for (i, constraint) in self.constraints.iter().enumerate() {
            let [c1, c2] = constraint.connectors;
            writeln!(f, "  c{i}: {c1} -- {c2}, rest length = {}", constraint.rest_length)?;
        }

        Ok(())
    }
}

/// State of a running simulation passed to the observer of
/// [`MassSpringSystem::simulate_with`].
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a, const D: usize> {
    system: &'a MassSpringSystem<D>,
    t: f64,
    x: &'a DVector<f64>,
}

impl<'a, const D: usize> Snapshot<'a, D> {
    /// Time.
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Full state vector, including multipliers.
    pub fn state(&self) -> &'a DVector<f64> {
        self.x
    }

    /// Position of a connector.
    pub fn position(&self, connector: Connector) -> Result<SVector<f64, D>, MechanicsError> {
        self.system.position_in(self.x, connector)
    }

    /// Lagrange multipliers. Empty for the penalty formulation.
    pub fn multipliers(&self) -> DVector<f64> {
        let dof = self.system.dof();
        self.x.rows(dof, self.x.len() - dof).clone_owned()
    }

    /// Largest deviation of a constrained distance from its rest length.
    pub fn constraint_violation(&self) -> f64 {
        self.system.violation_in(self.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dvector, Vector3};

    fn two_masses() -> (MassSpringSystem<3>, Connector, Connector) {
        let mut system = MassSpringSystem::new();
        let m0 = system.add_mass(Mass::new(1.0, [1.0, 0.0, 0.0]));
        let m1 = system.add_mass(Mass::new(1.0, [2.2, 0.0, 0.0]));
        system.add_spring(Spring::new(1.0, 10000.0, [m0, m1])).unwrap();
        system
            .add_distance_constraint(DistanceConstraint::new([m0, m1], 1.0))
            .unwrap();
        (system, m0, m1)
    }

    #[test]
    fn state_round_trip() {
        let (mut system, _, _) = two_masses();
        system.masses_mut()[1].vel = Vector3::new(0.5, -1.0, 2.0);
        system.masses_mut()[0].acc = Vector3::new(0.0, 3.0, 0.0);
        let before = system.masses().to_vec();

        let mut x = DVector::zeros(7);
        let mut v = DVector::zeros(7);
        let mut a = DVector::zeros(7);
        system.get_state(&mut x, &mut v, &mut a).unwrap();
        system.set_state(&x, &v, &a).unwrap();

        assert_eq!(system.masses(), &before[..]);
        assert_eq!(x, dvector![1.0, 0.0, 0.0, 2.2, 0.0, 0.0, 0.0]);
        assert_eq!(v.rows(3, 3), dvector![0.5, -1.0, 2.0]);
    }

    #[test]
    fn short_state_vectors() {
        let (mut system, _, _) = two_masses();
        let short = DVector::zeros(5);
        let full = DVector::zeros(6);

        assert_eq!(
            system.set_state(&full, &short, &full),
            Err(MechanicsError::InvalidDimensionality {
                expected: 6,
                found: 5
            })
        );
    }

    #[test]
    fn unknown_connector() {
        let mut system = MassSpringSystem::<2>::new();
        let fix = system.add_fix([0.0, 0.0]);

        assert_eq!(
            system.add_spring(Spring::new(1.0, 1.0, [fix, Connector::Mass(0)])),
            Err(MechanicsError::UnknownConnector(Connector::Mass(0)))
        );
        assert_eq!(
            system.add_distance_constraint(DistanceConstraint::new([Connector::Fix(3), fix], 1.0)),
            Err(MechanicsError::UnknownConnector(Connector::Fix(3)))
        );
        assert!(system.springs().is_empty());
        assert!(system.constraints().is_empty());
    }

    #[test]
    fn dimensions() {
        let (system, m0, m1) = two_masses();

        assert_eq!(system.dof(), 6);
        assert_eq!(system.dim(ConstraintFormulation::Lagrange), 7);
        assert_eq!(
            system.dim(ConstraintFormulation::Penalty { stiffness: 1e6 }),
            6
        );

        let x = dvector![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(system.position_in(&x, m1).unwrap(), Vector3::new(3.0, 4.0, 5.0));
        assert_eq!(system.position(m0).unwrap(), Vector3::new(1.0, 0.0, 0.0));
        assert!(system.position_in(&x, Connector::Mass(2)).is_err());
    }

    #[test]
    fn distance_converges_to_constraint() {
        let (mut system, m0, m1) = two_masses();
        let mut distances = Vec::new();

        let multipliers = system
            .simulate_with(5.0, 200, &SimulationOptions::default(), |snapshot| {
                let p0 = snapshot.position(m0).unwrap();
                let p1 = snapshot.position(m1).unwrap();
                distances.push((p1 - p0).norm());
            })
            .unwrap();

        assert_eq!(distances.len(), 200);
        assert_eq!(multipliers.len(), 1);
        assert_abs_diff_eq!(distances[199], 1.0, epsilon = 1e-6);
        assert!(system.constraint_violation() < 1e-6);

        // Violation is reduced in every step.
        assert!((distances[10] - 1.0).abs() < (distances[0] - 1.0).abs());

        // No external forces, so the center of mass stays where it was.
        let center = (system.position(m0).unwrap() + system.position(m1).unwrap()) / 2.0;
        assert_abs_diff_eq!(center, Vector3::new(1.6, 0.0, 0.0), epsilon = 1e-6);
    }

    fn pendulum() -> (MassSpringSystem<2>, Connector) {
        let mut system = MassSpringSystem::new();
        system.set_gravity([0.0, -9.81]);
        let fix = system.add_fix([0.0, 0.0]);
        let bob = system.add_mass(Mass::new(1.0, [1.0, 0.0]));
        system
            .add_distance_constraint(DistanceConstraint::new([fix, bob], 1.0))
            .unwrap();
        (system, bob)
    }

    #[test]
    fn pendulum_stays_on_circle() {
        let (mut system, bob) = pendulum();
        let mut violation: f64 = 0.0;

        system
            .simulate_with(1.0, 100, &SimulationOptions::default(), |snapshot| {
                violation = violation.max(snapshot.constraint_violation());
            })
            .unwrap();

        assert!(violation < 1e-3, "violation = {}", violation);

        // The bob swung down and is moving.
        let p = system.position(bob).unwrap();
        assert!(p[1] < -0.1);
        assert!(system.masses()[0].vel.norm() > 1.0);
    }

    #[test]
    fn pendulum_with_fine_steps() {
        let (mut coarse, bob) = pendulum();
        coarse.simulate(1.0, 1000).unwrap();

        let (mut fine, _) = pendulum();
        let mut violation: f64 = 0.0;
        fine.simulate_with(1.0, 10_000, &SimulationOptions::default(), |snapshot| {
            violation = violation.max(snapshot.constraint_violation());
        })
        .unwrap();

        assert!(violation < 1e-5, "violation = {}", violation);
        assert_abs_diff_eq!(
            fine.position(bob).unwrap(),
            coarse.position(bob).unwrap(),
            epsilon = 1e-3
        );
    }

    #[test]
    fn penalty_formulation() {
        let (mut system, bob) = pendulum();
        let mut options = SimulationOptions::default();
        options.set_formulation(ConstraintFormulation::Penalty { stiffness: 1e6 });

        let mut violation: f64 = 0.0;
        let multipliers = system
            .simulate_with(1.0, 100, &options, |snapshot| {
                assert_eq!(snapshot.state().len(), 2);
                violation = violation.max(snapshot.constraint_violation());
            })
            .unwrap();

        assert_eq!(multipliers.len(), 0);
        assert!(violation < 1e-3, "violation = {}", violation);
        assert!(system.position(bob).unwrap()[1] < -0.1);
    }

    #[test]
    fn free_fall() {
        let mut system = MassSpringSystem::<3>::new();
        system.set_gravity([0.0, 0.0, -10.0]);
        let m = system.add_mass(Mass::new(3.0, [0.0, 0.0, 0.0]).with_velocity([1.0, 0.0, 0.0]));

        let mut options = SimulationOptions::default();
        options.set_alpha(crate::stepper::AlphaOptions::newmark());
        let mut same = SimulationOptions::default();
        same.set_alpha(crate::stepper::AlphaOptions::newmark());
        assert_eq!(options, same);
        system.simulate_with(1.0, 10, &options, |_| {}).unwrap();

        // Newmark is exact for constant acceleration once it is consistent.
        let p = system.position(m).unwrap();
        assert_abs_diff_eq!(p[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(system.masses()[0].acc[2], -10.0, epsilon = 1e-6);
    }

    #[test]
    fn invalid_steps() {
        let (mut system, _) = pendulum();
        assert_eq!(
            system.simulate(1.0, 0),
            Err(MechanicsError::InvalidSteps {
                t_end: 1.0,
                steps: 0
            })
        );
        assert!(system.simulate(-1.0, 10).is_err());
    }

    #[test]
    fn summary() {
        let (system, _, _) = two_masses();
        let summary = system.to_string();

        assert!(summary.contains("masses: 2"));
        assert!(summary.contains("m0: mass = 1, pos = (1, 0, 0)"));
        assert!(summary.contains("s0: m0 -- m1, rest length = 1, stiffness = 10000"));
        assert!(summary.contains("c0: m0 -- m1, rest length = 1"));
    }
}
