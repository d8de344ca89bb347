use std::time::{Duration, Instant};

use fastnoise_lite::{FastNoiseLite, NoiseType};
use pregen_backend::{OccupantId, ProgressSink, Recipient, SimTerrain, TerrainBackend};
use pregen_grid::{GridCoord, GridExtent};
use pregen_runtime::{Scheduler, TickOutcome};

use crate::config::SimConfig;
use crate::sink::StatusRouter;

/// How the host loop behaves besides ticking the scheduler.
#[derive(Clone, Copy, Debug)]
pub struct HostPlan {
    pub ticks_per_second: u32,
    pub realtime: bool,
    /// Host tick at which every job is cancelled.
    pub cancel_after: Option<u64>,
    /// Host tick at which all occupants log off.
    pub occupants_leave_after: Option<u64>,
    pub max_ticks: u64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HostSummary {
    pub host_ticks: u64,
    pub worked: u64,
    pub throttled: u64,
    pub jobs_finished: u64,
    pub shutdown_requested: bool,
    /// Host time covered by the run at the configured tick rate.
    pub simulated: Duration,
}

/// Cells that already exist in storage before any job runs, picked by thresholded
/// OpenSimplex2 noise over the grid extent.
pub fn existing_cells(sim: &SimConfig, grid: &GridExtent) -> Vec<GridCoord> {
    let mut noise = FastNoiseLite::with_seed(sim.seed);
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(sim.existing_frequency));
    let mut out = Vec::new();
    for z in grid.z1..=grid.z2 {
        for x in grid.x1..=grid.x2 {
            if noise.get_noise_2d(x as f32, z as f32) > sim.existing_threshold {
                out.push(GridCoord::new(x, z));
            }
        }
    }
    out
}

/// Reference host for one run: noise-seeded storage plus `occupants` standing near the
/// center of the extent (their cells resident, as a host keeps them).
pub fn build_backend(sim: &SimConfig, grid: &GridExtent, occupants: usize) -> SimTerrain {
    let existing = existing_cells(sim, grid);
    log::info!(
        target: "pregen::host",
        "{} of {} cells already exist (seed {})",
        existing.len(),
        grid.cell_count(),
        sim.seed
    );
    let mut terrain = SimTerrain::new(sim.capacity)
        .with_existing(existing)
        .with_lighting_supported(sim.lighting_supported);
    let cx = (grid.x1 + grid.x2).div_euclid(2);
    let cz = (grid.z1 + grid.z2).div_euclid(2);
    for i in 0..occupants {
        let cell = GridCoord::new(cx + (i % 3) as i32 - 1, cz + (i / 3 % 3) as i32 - 1);
        terrain.preload(cell);
        terrain.place_occupant(OccupantId(i as u64 + 1), cell);
    }
    terrain
}

/// Drives the scheduler one host tick at a time until it idles, asks for shutdown or
/// `max_ticks` runs out. Status messages are routed after every tick.
pub fn run<S: ProgressSink>(
    sched: &mut Scheduler<SimTerrain, S>,
    router: &mut StatusRouter,
    plan: &HostPlan,
) -> HostSummary {
    let tick = Duration::from_secs_f64(1.0 / f64::from(plan.ticks_per_second.max(1)));
    let start = Instant::now();
    let mut summary = HostSummary::default();

    while summary.host_ticks < plan.max_ticks {
        summary.host_ticks += 1;
        let n = summary.host_ticks;

        if plan.occupants_leave_after == Some(n) {
            let ids = sched.backend().occupant_ids();
            for id in &ids {
                sched.backend_mut().evacuate(*id, "logged off");
            }
            log::info!(target: "pregen::host", "{} occupants logged off", ids.len());
        }
        if plan.cancel_after == Some(n) {
            sched.cancel_all(Recipient::Console);
        }

        let now = if plan.realtime {
            Instant::now()
        } else {
            start + tick.mul_f64(n as f64)
        };
        let outcome = sched.on_host_tick(now);
        router.pump();
        match outcome {
            TickOutcome::Idle => break,
            TickOutcome::Waiting => {}
            TickOutcome::Throttled => summary.throttled += 1,
            TickOutcome::Worked => summary.worked += 1,
            TickOutcome::JobFinished => summary.jobs_finished += 1,
            TickOutcome::ShutdownRequested => {
                summary.jobs_finished += 1;
                summary.shutdown_requested = true;
                break;
            }
        }
        if plan.realtime {
            std::thread::sleep(tick);
        }
    }

    if !sched.is_idle() {
        log::warn!(target: "pregen::host", "tick limit {} reached with work left", plan.max_ticks);
    }
    // host unload
    sched.shutdown();
    router.pump();
    summary.simulated = tick.mul_f64(summary.host_ticks as f64);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use crossbeam_channel::unbounded;
    use pregen_grid::Extent;
    use pregen_runtime::{JobOptions, JobRequest, LightingPolicy, RuntimeConfig, SpeedProfile};

    fn plan() -> HostPlan {
        HostPlan {
            ticks_per_second: 20,
            realtime: false,
            cancel_after: None,
            occupants_leave_after: None,
            max_ticks: 1_000_000,
        }
    }

    fn setup(
        extent: Extent,
        occupants: usize,
    ) -> (Scheduler<SimTerrain, ChannelSink>, StatusRouter) {
        let (tx, rx) = unbounded();
        let backend = build_backend(&SimConfig::default(), &extent.to_grid(), occupants);
        let sched = Scheduler::new(backend, ChannelSink::new(tx), RuntimeConfig::default());
        (sched, StatusRouter::new(rx, false))
    }

    #[test]
    fn existing_cells_are_deterministic_and_inside_the_extent() {
        let grid = GridExtent::new(-20, -20, 40, 40);
        let cfg = SimConfig::default();
        let a = existing_cells(&cfg, &grid);
        let b = existing_cells(&cfg, &grid);
        assert_eq!(a, b);
        assert!(a.iter().all(|c| grid.contains(*c)));
        assert!((a.len() as u64) < grid.cell_count());
    }

    #[test]
    fn quit_after_run_ends_in_shutdown() {
        let extent = Extent::square(0, 0, 400, 400);
        let (mut sched, mut router) = setup(extent, 0);
        let mut request = JobRequest::new(
            extent,
            JobOptions {
                speed: SpeedProfile::VeryFast,
                ..JobOptions::default()
            },
        );
        request.quit_after_completion = true;
        sched.submit_request(request).unwrap();

        let summary = run(&mut sched, &mut router, &plan());
        assert!(summary.shutdown_requested);
        assert_eq!(summary.jobs_finished, 1);
        assert!(summary.worked > 0);
        assert_eq!(sched.backend().resident_count(), 0);
        assert!(
            router
                .console()
                .iter()
                .any(|l| l.starts_with("Generation complete in"))
        );
    }

    #[test]
    fn occupants_hold_a_paused_job_until_they_leave() {
        let extent = Extent::square(0, 0, 300, 300);
        let (mut sched, mut router) = setup(extent, 2);
        router.subscribe(1);
        router.subscribe(2);
        sched
            .submit_request(JobRequest::new(
                extent,
                JobOptions {
                    speed: SpeedProfile::AllAtOnce,
                    lighting: LightingPolicy::None,
                    pause_when_occupied: true,
                    ..JobOptions::default()
                },
            ))
            .unwrap();

        let summary = run(
            &mut sched,
            &mut router,
            &HostPlan {
                occupants_leave_after: Some(40),
                ..plan()
            },
        );
        assert!(summary.throttled > 0);
        assert_eq!(summary.jobs_finished, 1);
        assert!(!summary.shutdown_requested);
        let paused = "[0.00%] Paused while occupants are present";
        assert_eq!(router.inbox(1).first().map(String::as_str), Some(paused));
        assert_eq!(router.inbox(2).iter().filter(|m| *m == paused).count(), 1);
        assert!(sched.backend().occupant_ids().is_empty());
    }

    #[test]
    fn cancel_after_stops_the_queue() {
        let extent = Extent::square(0, 0, 2000, 2000);
        let (mut sched, mut router) = setup(extent, 0);
        sched.submit_request(JobRequest::new(extent, JobOptions::default())).unwrap();
        sched.submit_request(JobRequest::new(extent, JobOptions::default())).unwrap();

        let summary = run(
            &mut sched,
            &mut router,
            &HostPlan {
                cancel_after: Some(100),
                ..plan()
            },
        );
        assert_eq!(summary.jobs_finished, 1);
        assert!(sched.is_idle());
        assert_eq!(sched.backend().resident_count(), 0);
        assert!(
            router
                .console()
                .iter()
                .any(|l| l.starts_with("Generation cancelled after"))
        );
    }
}
