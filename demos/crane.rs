//! A spring-truss crane: a tower of cubes standing on fixed ground nodes, a
//! horizontal arm attached to its top floor and a heavy load hanging from the
//! tip of the arm on two cables.

use std::f64::consts::SQRT_2;

use odeon::mechanics::{
    Connector, Mass, MassSpringSystem, MechanicsError, SimulationOptions, Spring,
};

const MASS: f64 = 1.0;
const STIFFNESS: f64 = 2000.0;
const L: f64 = 1.0;
const FLOORS: usize = 10;
const ARM_LENGTH: usize = 8;
const LOAD_MASS: f64 = 20.0;

/// Connects two square faces `prev` and `next` by edges, the square of `next`
/// and crossed diagonals.
fn connect_faces(
    system: &mut MassSpringSystem<3>,
    prev: &[Connector; 4],
    next: &[Connector; 4],
) -> Result<(), MechanicsError> {
    for k in 0..4 {
        let k1 = (k + 1) % 4;
        system.add_spring(Spring::new(L, STIFFNESS, [prev[k], next[k]]))?;
        system.add_spring(Spring::new(L, STIFFNESS, [next[k], next[k1]]))?;
        system.add_spring(Spring::new(SQRT_2 * L, STIFFNESS, [prev[k], next[k1]]))?;
        system.add_spring(Spring::new(SQRT_2 * L, STIFFNESS, [prev[k1], next[k]]))?;
    }

    Ok(())
}

fn build_crane() -> Result<(MassSpringSystem<3>, Connector), MechanicsError> {
    let mut system = MassSpringSystem::new();
    system.set_gravity([0.0, 0.0, -9.81]);

    // Tower.
    let mut floors = Vec::with_capacity(FLOORS + 1);
    for i in 0..=FLOORS {
        let z = i as f64 * L;
        let corners = [[0.0, 0.0, z], [L, 0.0, z], [L, L, z], [0.0, L, z]];
        let face = corners.map(|pos| {
            if i == 0 {
                system.add_fix(pos)
            } else {
                system.add_mass(Mass::new(MASS, pos))
            }
        });
        floors.push(face);
    }

    for i in 0..FLOORS {
        connect_faces(&mut system, &floors[i], &floors[i + 1])?;
    }

    // Arm, growing from the side of the top cube in the x direction.
    let z_bot = (FLOORS - 1) as f64 * L;
    let z_top = FLOORS as f64 * L;
    let mut prev = [
        floors[FLOORS - 1][1],
        floors[FLOORS - 1][2],
        floors[FLOORS][2],
        floors[FLOORS][1],
    ];

    for j in 1..=ARM_LENGTH {
        let x = L + j as f64 * L;
        let corners = [[x, 0.0, z_bot], [x, L, z_bot], [x, L, z_top], [x, 0.0, z_top]];
        let face = corners.map(|pos| system.add_mass(Mass::new(MASS, pos)));
        connect_faces(&mut system, &prev, &face)?;
        prev = face;
    }

    // Load on two softer cables.
    let tip = L + ARM_LENGTH as f64 * L;
    let load = system.add_mass(Mass::new(LOAD_MASS, [tip, L / 2.0, z_bot - 1.0]));
    let cable = ((L / 2.0).powi(2) + 1.0).sqrt();
    system.add_spring(Spring::new(cable, STIFFNESS / 2.0, [prev[0], load]))?;
    system.add_spring(Spring::new(cable, STIFFNESS / 2.0, [prev[1], load]))?;

    Ok((system, load))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (mut system, load) = build_crane()?;

    println!(
        "crane: {} fixes, {} masses, {} springs",
        system.fixes().len(),
        system.masses().len(),
        system.springs().len()
    );

    let initial = system.position(load)?;

    system.simulate_with(0.1, 100, &SimulationOptions::default(), |snapshot| {
        if let Ok(p) = snapshot.position(load) {
            println!("t = {:.3}\tload = {}", snapshot.t(), p.transpose());
        }
    })?;

    let last = system.position(load)?;
    println!("load moved by {}", (last - initial).transpose());

    Ok(())
}
