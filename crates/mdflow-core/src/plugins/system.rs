use crate::core::geometry::PeriodicCell;
use crate::core::io::lammps::{DumpMetadata, LammpsDumpFile};
use crate::core::io::traits::TrajectoryFile;
use crate::core::snapshot::Snapshot;
use crate::engine::args::ArgBundle;
use crate::engine::context::RunContext;
use crate::engine::error::EngineError;
use crate::engine::registry::EntryTable;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;
use tracing::info;

/// Boltzmann constant in amu * angstrom^2 / (ps^2 * K).
pub const KB_AMU_A2_PS2: f64 = 0.831446;

/// Lattice atoms are type 1, gas atoms type 2.
pub const LATTICE_TYPE: u32 = 1;
pub const GAS_TYPE: u32 = 2;

/// Initial-configuration generator: BCC lattice with a gas bubble.
pub fn entry_table() -> EntryTable {
    EntryTable::new().register("create", create)
}

fn bcc_lattice(cells: u64, lattice_constant: f64) -> (Vec<Point3<f64>>, PeriodicCell) {
    let mut sites = Vec::with_capacity((2 * cells * cells * cells) as usize);
    for i in 0..cells {
        for j in 0..cells {
            for k in 0..cells {
                let corner = Vector3::new(i as f64, j as f64, k as f64) * lattice_constant;
                sites.push(Point3::from(corner));
                sites.push(Point3::from(
                    corner + Vector3::repeat(lattice_constant / 2.0),
                ));
            }
        }
    }
    let cell = PeriodicCell::cubic(cells as f64 * lattice_constant);
    (sites, cell)
}

fn thermal_velocities(
    types: &[u32],
    masses: &HashMap<u32, f64>,
    temperature: f64,
    rng: &mut StdRng,
) -> Result<Vec<Vector3<f64>>, EngineError> {
    let mut velocities = Vec::with_capacity(types.len());
    for particle_type in types {
        let mass = masses.get(particle_type).ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "no mass declared for particle type {}",
                particle_type
            ))
        })?;
        let sigma = (KB_AMU_A2_PS2 * temperature / mass).sqrt();
        let component = Normal::new(0.0, sigma)
            .map_err(|e| EngineError::InvalidConfig(format!("bad thermal distribution: {}", e)))?;
        velocities.push(Vector3::new(
            component.sample(rng),
            component.sample(rng),
            component.sample(rng),
        ));
    }
    Ok(velocities)
}

/// `system.create`: generates the BCC reference lattice, exports it, carves
/// a spherical bubble at the box center, fills a seeded random fraction
/// (`occupancy`) of the carved sites with gas atoms, draws Maxwell-Boltzmann
/// velocities at `temperature`, and exports the initial configuration.
fn create(_ctx: &mut RunContext, args: &ArgBundle) -> Result<(), EngineError> {
    let cells = args.u64("cells")?;
    let lattice_constant = args.f64("lattice_constant")?;
    let reference_path = args.path("reference")?;
    let output_path = args.path("output")?;
    let radius = args.f64("bubble_radius")?;
    let occupancy = args.f64_or("occupancy", 1.0)?;
    let temperature = args.f64("temperature")?;
    let masses = args.f64_by_type("masses")?;
    let seed = args.u64_or("seed", 0)?;

    if cells == 0 || lattice_constant <= 0.0 {
        return Err(EngineError::InvalidConfig(
            "lattice needs cells >= 1 and a positive lattice constant".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&occupancy) {
        return Err(EngineError::InvalidConfig(format!(
            "occupancy {} outside [0, 1]",
            occupancy
        )));
    }
    if temperature < 0.0 {
        return Err(EngineError::InvalidConfig(format!(
            "negative temperature {}",
            temperature
        )));
    }

    let (sites, cell) = bcc_lattice(cells, lattice_constant);
    let reference = Snapshot::new(
        sites.clone(),
        vec![Vector3::zeros(); sites.len()],
        vec![LATTICE_TYPE; sites.len()],
        cell,
    )?;
    LammpsDumpFile::write_to_path(&reference, &DumpMetadata::default(), &reference_path)?;

    let center = cell.center();
    let (carved, kept): (Vec<Point3<f64>>, Vec<Point3<f64>>) = sites
        .into_iter()
        .partition(|site| cell.distance(site, &center) < radius);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut gas_sites = carved;
    gas_sites.shuffle(&mut rng);
    let gas_count = ((occupancy * gas_sites.len() as f64).round() as usize).min(gas_sites.len());
    gas_sites.truncate(gas_count);

    let mut positions = kept;
    let mut types = vec![LATTICE_TYPE; positions.len()];
    positions.extend(gas_sites);
    types.resize(positions.len(), GAS_TYPE);

    let velocities = thermal_velocities(&types, &masses, temperature, &mut rng)?;
    let configuration = Snapshot::new(positions, velocities, types, cell)?;
    LammpsDumpFile::write_to_path(&configuration, &DumpMetadata::default(), &output_path)?;

    info!(
        sites = reference.len(),
        atoms = configuration.len(),
        gas = gas_count,
        "System configuration generated"
    );
    Ok(())
}
