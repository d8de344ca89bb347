use std::collections::HashSet;
use std::time::Instant;

use pregen_backend::{MemorySink, SimCall, SimTerrain, TerrainBackend};
use pregen_grid::{Extent, GridCoord};
use pregen_runtime::{
    JobOptions, LightingPolicy, QueueDepth, RegionJob, RuntimeConfig, SpeedProfile, StepOutcome,
};
use proptest::prelude::*;

fn arb_speed() -> impl Strategy<Value = SpeedProfile> {
    prop::sample::select(SpeedProfile::ALL.to_vec())
}

fn arb_lighting() -> impl Strategy<Value = LightingPolicy> {
    prop_oneof![
        Just(LightingPolicy::None),
        Just(LightingPolicy::Normal),
        Just(LightingPolicy::NormalExisting),
        Just(LightingPolicy::Extreme),
        Just(LightingPolicy::ExtremeExisting),
    ]
}

fn arb_extent() -> impl Strategy<Value = Extent> {
    prop_oneof![
        (-300i32..300, -300i32..300, 1i32..500, 1i32..500)
            .prop_map(|(x, z, w, h)| Extent::square(x, z, x + w, z + h)),
        (-300i32..300, -300i32..300, 1i32..300).prop_map(|(x, z, r)| Extent::circle(x, z, r)),
    ]
}

fn run(job: &mut RegionJob, sim: &mut SimTerrain) -> usize {
    let mut sink = MemorySink::new();
    let now = Instant::now();
    let mut steps = 0;
    while job.step(sim, &mut sink, QueueDepth::Pending(0), now) != StepOutcome::Complete {
        steps += 1;
        assert!(steps < 1_000_000);
    }
    steps
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // Every realized cell is loaded, nothing outside the extent is, and nothing stays resident
    #[test]
    fn jobs_cover_extent_and_release_everything(
        extent in arb_extent(),
        speed in arb_speed(),
        lighting in arb_lighting(),
        force_regenerate in any::<bool>(),
    ) {
        let grid = extent.to_grid();
        let mut sim = SimTerrain::new(1 << 16);
        let mut job = RegionJob::new(
            extent,
            JobOptions { speed, lighting, force_regenerate, ..JobOptions::default() },
            &RuntimeConfig::default(),
        ).unwrap();
        run(&mut job, &mut sim);

        let loaded: HashSet<GridCoord> = sim.calls.log.iter().filter_map(|c| match c {
            SimCall::Load { cell, .. } => Some(*cell),
            _ => None,
        }).collect();
        prop_assert!(loaded.iter().all(|c| grid.contains(*c)));
        for z in grid.z1..=grid.z2 {
            for x in grid.x1..=grid.x2 {
                let c = GridCoord::new(x, z);
                prop_assert_eq!(loaded.contains(&c), grid.contains(c));
            }
        }
        prop_assert_eq!(sim.resident_count(), 0);
        prop_assert_eq!(job.progress(), 1.0);
    }

    // Relights only ever hit cells whose eight neighbors were resident at the time
    #[test]
    fn relit_cells_lie_strictly_inside_the_extent(
        extent in arb_extent(),
        lighting in arb_lighting(),
    ) {
        let grid = extent.to_grid();
        let mut sim = SimTerrain::new(1 << 16);
        let mut job = RegionJob::new(
            extent,
            JobOptions { lighting, ..JobOptions::default() },
            &RuntimeConfig::default(),
        ).unwrap();
        run(&mut job, &mut sim);
        for call in &sim.calls.log {
            if let SimCall::Relight(cell, _) = call {
                prop_assert!(cell.neighbors8().iter().all(|n| grid.contains(*n)));
            }
        }
    }
}
