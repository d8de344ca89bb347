//! Region generation engine: tick-driven jobs that materialize, relight and evict grid cells
//! in bounded batches.
#![forbid(unsafe_code)]

mod config;
mod job;
mod options;
mod report;
mod scheduler;
mod unit;

pub use config::{JobLimits, ProfileOverride, RuntimeConfig};
pub use job::{JobPhase, QueueDepth, RegionJob, RequestError, StepOutcome};
pub use options::{
    JobOptions, LightingPolicy, ParseLightingError, ParseSpeedError, ProfileTuning, SpeedProfile,
};
pub use report::{format_elapsed, progress_prefix};
pub use scheduler::{JobRequest, Scheduler, TickOutcome, TickTimer};
pub use unit::{ChunkUnit, EvictProgress, RelightOutcome, UnitState};
