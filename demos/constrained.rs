//! Two free masses joined by a stiff spring and a rigid bar of the same rest
//! length. The masses start too far apart and the integrator pulls them
//! together to the constrained distance.

use odeon::mechanics::{DistanceConstraint, Mass, MassSpringSystem, SimulationOptions, Spring};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut system = MassSpringSystem::<3>::new();

    let m0 = system.add_mass(Mass::new(1.0, [1.0, 0.0, 0.0]));
    let m1 = system.add_mass(Mass::new(1.0, [2.2, 0.0, 0.0]));
    system.add_spring(Spring::new(1.0, 10000.0, [m0, m1]))?;
    system.add_distance_constraint(DistanceConstraint::new([m0, m1], 1.0))?;

    print!("{}", system);

    let multipliers = system.simulate_with(5.0, 200, &SimulationOptions::default(), |snapshot| {
        if let (Ok(p0), Ok(p1)) = (snapshot.position(m0), snapshot.position(m1)) {
            println!(
                "t = {:.3}\tdistance = {:.9}\tviolation = {:.3e}\tlambda = {:+.6}",
                snapshot.t(),
                (p1 - p0).norm(),
                snapshot.constraint_violation(),
                snapshot.multipliers()[0]
            );
        }
    })?;

    println!("final multipliers: {}", multipliers.transpose());
    println!("final positions:");
    for mass in system.masses() {
        println!("  {}", mass.pos.transpose());
    }

    Ok(())
}
