mod config;
mod host;
mod logging;
mod sink;

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crossbeam_channel::unbounded;
use hashbrown::HashSet;
use pregen_backend::{Recipient, TerrainBackend};
use pregen_grid::{Extent, TILE_OVERLAP, decompose};
use pregen_runtime::{
    JobOptions, JobRequest, LightingPolicy, Scheduler, SpeedProfile, format_elapsed,
};

use crate::config::AppConfig;
use crate::host::HostPlan;
use crate::sink::{ChannelSink, StatusRouter};

#[derive(Parser, Debug)]
#[command(name = "pregen", about = "Tick-driven region pre-generation against a simulated host")]
struct Cli {
    /// TOML file with [runtime] and [sim] tables
    #[arg(long)]
    config: Option<PathBuf>,
    /// Also write debug-level logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a box given by two world-space corners
    Region {
        #[command(flatten)]
        corners: Corners,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Generate a disc around a world-space center
    Circle {
        #[command(flatten)]
        disc: Disc,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Print the tile decomposition without generating anything
    Plan {
        #[arg(long, default_value = "normal")]
        speed: SpeedProfile,
        #[command(subcommand)]
        shape: Shape,
    },
}

#[derive(Subcommand, Debug)]
enum Shape {
    Region {
        #[command(flatten)]
        corners: Corners,
    },
    Circle {
        #[command(flatten)]
        disc: Disc,
    },
}

#[derive(Args, Debug)]
struct Corners {
    #[arg(allow_hyphen_values = true)]
    x_start: i32,
    #[arg(allow_hyphen_values = true)]
    z_start: i32,
    #[arg(allow_hyphen_values = true)]
    x_end: i32,
    #[arg(allow_hyphen_values = true)]
    z_end: i32,
}

#[derive(Args, Debug)]
struct Disc {
    #[arg(allow_hyphen_values = true)]
    x_center: i32,
    #[arg(allow_hyphen_values = true)]
    z_center: i32,
    radius: i32,
}

#[derive(Args, Debug)]
struct JobArgs {
    /// all-at-once | very-fast | fast | normal | slow | very-slow
    #[arg(long, default_value = "normal")]
    speed: SpeedProfile,
    /// none | normal | normal+existing | extreme | extreme+existing
    #[arg(long, default_value = "normal")]
    lighting: LightingPolicy,
    /// Evacuate, destroy and regenerate cells that already exist
    #[arg(long)]
    force_regenerate: bool,
    /// Pause while any occupant is online
    #[arg(long)]
    only_when_empty: bool,
    #[arg(long)]
    debug: bool,
    /// Ask the host to shut down once the queue is empty
    #[arg(long)]
    quit_after: bool,
    /// Cancel everything after this many host ticks
    #[arg(long, value_name = "TICKS")]
    cancel_after: Option<u64>,
    /// Occupants standing at the center of the region
    #[arg(long, default_value_t = 0)]
    occupants: usize,
    /// Host tick at which the occupants log off
    #[arg(long, value_name = "TICKS")]
    occupants_leave_after: Option<u64>,
    #[arg(long, default_value_t = 10_000_000)]
    max_ticks: u64,
}

impl JobArgs {
    fn options(&self) -> JobOptions {
        JobOptions {
            speed: self.speed,
            lighting: self.lighting,
            force_regenerate: self.force_regenerate,
            pause_when_occupied: self.only_when_empty,
            debug: self.debug,
        }
    }
}

impl Corners {
    fn extent(&self) -> Extent {
        Extent::square(self.x_start, self.z_start, self.x_end, self.z_end)
    }
}

impl Disc {
    fn extent(&self) -> Extent {
        Extent::circle(self.x_center, self.z_center, self.radius)
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.log_file.as_deref()) {
        eprintln!("could not initialize logging: {}", err);
    }
    let cfg = match &cli.config {
        Some(path) => match AppConfig::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("failed to load {}: {}", path.display(), err);
                std::process::exit(2);
            }
        },
        None => AppConfig::default(),
    };

    let result = match &cli.command {
        Command::Region { corners, job } => generate(corners.extent(), job, &cfg),
        Command::Circle { disc, job } => generate(disc.extent(), job, &cfg),
        Command::Plan { speed, shape } => {
            let extent = match shape {
                Shape::Region { corners } => corners.extent(),
                Shape::Circle { disc } => disc.extent(),
            };
            plan(extent, *speed, &cfg)
        }
    };
    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn generate(extent: Extent, job: &JobArgs, cfg: &AppConfig) -> Result<(), Box<dyn Error>> {
    let grid = extent.to_grid();
    let (tx, rx) = unbounded();
    let backend = host::build_backend(&cfg.sim, &grid, job.occupants);
    let mut sched = Scheduler::new(backend, ChannelSink::new(tx), cfg.runtime.clone());
    let mut router = StatusRouter::new(rx, true);
    for id in 1..=job.occupants as u64 {
        router.subscribe(id);
    }

    let submitted = sched.submit_request(JobRequest {
        extent,
        options: job.options(),
        quit_after_completion: job.quit_after,
        requester: Recipient::Console,
    });
    router.pump();
    submitted?;

    let summary = host::run(
        &mut sched,
        &mut router,
        &HostPlan {
            ticks_per_second: cfg.sim.host_ticks_per_second,
            realtime: cfg.sim.realtime,
            cancel_after: job.cancel_after,
            occupants_leave_after: job.occupants_leave_after,
            max_ticks: job.max_ticks,
        },
    );

    let (terrain, _) = sched.into_parts();
    let delivered: usize = (1..=job.occupants as u64)
        .map(|id| router.inbox(id).len())
        .sum();
    println!(
        "{} host ticks ({} host time): {} steps, {} throttled, {} jobs finished{}",
        summary.host_ticks,
        format_elapsed(summary.simulated),
        summary.worked,
        summary.throttled,
        summary.jobs_finished,
        if summary.shutdown_requested {
            ", host shutdown requested"
        } else {
            ""
        }
    );
    println!(
        "{} cells stored, {} resident, {} relit, {} messages to {} occupants",
        terrain.stored_count(),
        terrain.resident_count(),
        terrain.calls.relights(),
        delivered,
        router.subscribers()
    );
    Ok(())
}

fn plan(extent: Extent, speed: SpeedProfile, cfg: &AppConfig) -> Result<(), Box<dyn Error>> {
    extent.validate()?;
    let grid = extent.to_grid();
    let tuning = cfg.runtime.tuning(speed);
    let tiles = decompose(&grid, tuning.region_size, TILE_OVERLAP);
    println!(
        "{} sections of up to {}x{} cells ({} speed, every {} host ticks), {} cells in bounding box",
        tiles.len(),
        tuning.region_size,
        tuning.region_size,
        speed.name(),
        tuning.tick_period,
        grid.cell_count()
    );
    let mut realized = HashSet::new();
    for (i, tile) in tiles.iter().enumerate() {
        let cells = tile.cells();
        println!(
            "  {:>4}: x {}..={} z {}..={} ({} cells)",
            i + 1,
            tile.x1,
            tile.x2,
            tile.z1,
            tile.z2,
            cells.len()
        );
        realized.extend(cells);
    }
    println!("{} distinct cells", realized.len());
    Ok(())
}
