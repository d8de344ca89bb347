use std::collections::VecDeque;
use std::time::{Duration, Instant};

use hashbrown::HashSet;
use pregen_backend::{BackendError, ProgressSink, TerrainBackend};
use pregen_grid::{Extent, ExtentError, GridCoord, GridExtent, TILE_OVERLAP, Tile, decompose};

use crate::config::{JobLimits, RuntimeConfig};
use crate::options::{JobOptions, LightingPolicy, ProfileTuning, SpeedProfile};
use crate::report::{format_elapsed, progress_prefix};
use crate::unit::{ChunkUnit, RelightOutcome};

const REGENERATE_REASON: &str = "The region you are in was regenerated. Please rejoin";

/// Jobs still waiting behind the active one, as shown in status lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueDepth {
    Pending(usize),
    /// Nothing queued and the host shuts down once this job completes.
    ShutdownScheduled,
}

impl std::fmt::Display for QueueDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueDepth::Pending(0) => Ok(()),
            QueueDepth::Pending(n) => write!(f, " {{{} generations in queue}}", n),
            QueueDepth::ShutdownScheduled => write!(f, " {{shutdown scheduled}}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Backpressure or the occupancy gate held the step; no cell was touched.
    Throttled,
    Progressed,
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobPhase {
    Running,
    /// Every tile is done; only stubborn evictions remain.
    Draining,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    InvalidExtent(ExtentError),
    NoTiles,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Relighting,
    Evicting,
    Loading,
    Preparing,
    Draining,
    Complete,
}

#[derive(Debug)]
struct ActiveTile {
    tile: Tile,
    cells: usize,
    to_load: Vec<ChunkUnit>,
    to_relight: VecDeque<ChunkUnit>,
    to_evict: Vec<ChunkUnit>,
}

impl ActiveTile {
    fn is_drained(&self) -> bool {
        self.to_load.is_empty() && self.to_relight.is_empty() && self.to_evict.is_empty()
    }
}

/// One requested region, worked through tile by tile in bounded steps.
#[derive(Debug)]
pub struct RegionJob {
    extent: Extent,
    grid: GridExtent,
    options: JobOptions,
    lighting: LightingPolicy,
    tuning: ProfileTuning,
    limits: JobLimits,
    // consumed from the back
    tiles: Vec<Tile>,
    total_tiles: usize,
    active: Option<ActiveTile>,
    backlog: Vec<ChunkUnit>,
    // cells this job generated that a still-pending overlapping tile will load again;
    // dropped once that tile has loaded them
    created_overlap: HashSet<GridCoord>,
    started: Option<Instant>,
    last_nag: Option<Instant>,
    memory_waiting: bool,
    cancelled: bool,
    finished: bool,
}

impl RegionJob {
    pub fn new(
        extent: Extent,
        options: JobOptions,
        config: &RuntimeConfig,
    ) -> Result<Self, RequestError> {
        extent.validate().map_err(RequestError::InvalidExtent)?;
        let grid = extent.to_grid();
        let tuning = config.tuning(options.speed);
        let tiles = decompose(&grid, tuning.region_size, TILE_OVERLAP);
        if tiles.is_empty() {
            return Err(RequestError::NoTiles);
        }
        Ok(Self {
            extent,
            grid,
            options,
            lighting: options.lighting,
            tuning,
            limits: config.limits(),
            total_tiles: tiles.len(),
            tiles,
            active: None,
            backlog: Vec::new(),
            created_overlap: HashSet::new(),
            started: None,
            last_nag: None,
            memory_waiting: false,
            cancelled: false,
            finished: false,
        })
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[inline]
    pub fn grid(&self) -> GridExtent {
        self.grid
    }

    #[inline]
    pub fn options(&self) -> JobOptions {
        self.options
    }

    #[inline]
    pub fn speed(&self) -> SpeedProfile {
        self.options.speed
    }

    /// Lighting currently in force; drops to `None` if the host cannot relight.
    #[inline]
    pub fn lighting(&self) -> LightingPolicy {
        self.lighting
    }

    #[inline]
    pub fn tuning(&self) -> ProfileTuning {
        self.tuning
    }

    #[inline]
    pub fn tick_period(&self) -> u32 {
        self.tuning.tick_period
    }

    #[inline]
    pub fn total_tiles(&self) -> usize {
        self.total_tiles
    }

    #[inline]
    pub fn pending_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Cells in the job's bounding box.
    #[inline]
    pub fn bounding_cells(&self) -> u64 {
        self.grid.cell_count()
    }

    #[inline]
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Overlap cells remembered as created until their pending neighbor tile loads them.
    #[inline]
    pub fn remembered_overlap(&self) -> usize {
        self.created_overlap.len()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn phase(&self) -> JobPhase {
        if self.finished {
            JobPhase::Complete
        } else if self.tiles.is_empty()
            && self.active.as_ref().is_none_or(ActiveTile::is_drained)
            && !self.backlog.is_empty()
        {
            JobPhase::Draining
        } else {
            JobPhase::Running
        }
    }

    /// Fraction done: `1 - (pending tiles + relight weight * unrelit share of the active tile) / total`.
    pub fn progress(&self) -> f64 {
        if self.finished {
            return 1.0;
        }
        let total = self.total_tiles.max(1) as f64;
        let relight_fraction = self
            .active
            .as_ref()
            .filter(|a| a.cells > 0)
            .map(|a| a.to_relight.len() as f64 / a.cells as f64)
            .unwrap_or(0.0);
        let pending = self.tiles.len() as f64 + f64::from(self.limits.relight_weight) * relight_fraction;
        (1.0 - pending / total).clamp(0.0, 1.0)
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or_default()
    }

    /// Drops every tile not yet started. The active tile keeps draining so no cell is
    /// left resident behind the job's back.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.tiles.clear();
        self.created_overlap.clear();
    }

    /// Host is going away: cancel, ask every in-flight cell to evict once without waiting
    /// for confirmation, and mark the job finished. Returns the number of cells asked.
    pub fn abort<B: TerrainBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        self.cancel();
        let mut asked = 0;
        let in_flight = self
            .active
            .take()
            .map(|a| a.to_relight.into_iter().chain(a.to_evict).collect::<Vec<_>>())
            .unwrap_or_default();
        for mut unit in in_flight.into_iter().chain(self.backlog.drain(..)) {
            if backend.is_resident(unit.coord()) {
                unit.request_evict(backend, u32::MAX);
                asked += 1;
            }
        }
        self.finished = true;
        asked
    }

    /// One bounded unit of work. `queue` only feeds status text.
    pub fn step<B, S>(
        &mut self,
        backend: &mut B,
        sink: &mut S,
        queue: QueueDepth,
        now: Instant,
    ) -> StepOutcome
    where
        B: TerrainBackend + ?Sized,
        S: ProgressSink + ?Sized,
    {
        if self.finished {
            return StepOutcome::Complete;
        }
        let started = *self.started.get_or_insert(now);
        let backlog_probe = self.probe_backlog(backend, sink);

        if let Some(reason) = self.throttle_reason(backend) {
            let due = self
                .last_nag
                .is_none_or(|at| now.saturating_duration_since(at) >= self.limits.nag_cooldown);
            if due {
                self.last_nag = Some(now);
                sink.broadcast(&format!(
                    "{}{}{}",
                    progress_prefix(self.progress()),
                    reason,
                    queue
                ));
            }
            return StepOutcome::Throttled;
        }
        self.last_nag = None;

        let work_start = Instant::now();
        self.retry_backlog(backend);
        let phase = self.next_phase();
        match phase {
            Phase::Relighting => self.relight_batch(backend, sink),
            Phase::Evicting => self.evict_active(backend),
            Phase::Loading => self.load_active(backend),
            Phase::Preparing => {
                if self.prepare_next(sink, queue) {
                    self.load_active(backend);
                }
            }
            Phase::Draining => {}
            Phase::Complete => {
                self.finish(sink, queue, now.saturating_duration_since(started));
                return StepOutcome::Complete;
            }
        }

        let took = work_start.elapsed();
        log::trace!(
            target: "pregen::job",
            "{:?} step took {:.2}ms, {} tiles left, backlog {}",
            phase,
            took.as_secs_f64() * 1000.0,
            self.tiles.len(),
            self.backlog.len()
        );
        if self.options.debug {
            let probe = match backlog_probe {
                Some(depth) => format!("backlog at {} entries", depth),
                None => "no backlog probe".to_string(),
            };
            sink.broadcast(&format!(
                "-- {:.2}ms elapsed. {} cells now resident - {:.2}% memory in use - {}",
                took.as_secs_f64() * 1000.0,
                backend.resident_count(),
                backend.memory_pressure() * 100.0,
                probe
            ));
        }
        StepOutcome::Progressed
    }

    fn next_phase(&mut self) -> Phase {
        if let Some(active) = &self.active {
            if !active.to_relight.is_empty() {
                return Phase::Relighting;
            }
            if !active.to_evict.is_empty() {
                return Phase::Evicting;
            }
            if !active.to_load.is_empty() {
                return Phase::Loading;
            }
        }
        self.active = None;
        if !self.tiles.is_empty() {
            Phase::Preparing
        } else if !self.backlog.is_empty() {
            Phase::Draining
        } else {
            Phase::Complete
        }
    }

    fn probe_backlog<B, S>(&mut self, backend: &mut B, sink: &mut S) -> Option<usize>
    where
        B: TerrainBackend + ?Sized,
        S: ProgressSink + ?Sized,
    {
        let depth = backend.backlog_depth()?;
        if depth > self.limits.backlog_drain_threshold {
            if self.options.debug {
                sink.broadcast(&format!(
                    "-- Detected runaway host backlog ({} entries). Draining.",
                    depth
                ));
            }
            if let Err(err) = backend.force_drain_backlog() {
                log::debug!(target: "pregen::job", "backlog drain failed: {}", err);
                if self.options.debug {
                    sink.broadcast("-- ... Drain failed. Expect very high memory usage.");
                }
            }
        }
        Some(depth)
    }

    fn throttle_reason<B: TerrainBackend + ?Sized>(&mut self, backend: &mut B) -> Option<String> {
        let pressure = backend.memory_pressure();
        let over = pressure > self.limits.high_water
            || (self.memory_waiting && pressure > self.limits.low_water);
        self.memory_waiting = over;
        let mut reason = None;
        if over {
            if self.options.speed.runs_all_at_once() {
                backend.reclaim_memory();
            }
            reason = Some(format!(
                "Memory {:.0}% in use -- taking a break to let the host catch up",
                pressure * 100.0
            ));
        }
        if self.options.pause_when_occupied && backend.online_occupant_count() > 0 {
            reason = Some("Paused while occupants are present".to_string());
        }
        reason
    }

    fn retry_backlog<B: TerrainBackend + ?Sized>(&mut self, backend: &mut B) {
        let ceiling = self.limits.evict_retry_ceiling;
        self.backlog
            .retain_mut(|unit| !unit.request_evict(backend, ceiling).is_done());
    }

    fn prepare_next<S: ProgressSink + ?Sized>(&mut self, sink: &mut S, queue: QueueDepth) -> bool {
        let prefix = progress_prefix(self.progress());
        while let Some(tile) = self.tiles.pop() {
            let cells = tile.cells();
            if cells.is_empty() {
                continue;
            }
            // the new tile owns these cells now
            self.backlog.retain(|u| !tile.contains(u.coord()));
            let section = self.total_tiles - self.tiles.len();
            sink.broadcast(&format!(
                "{}Section {}/{}{}",
                prefix, section, self.total_tiles, queue
            ));
            self.active = Some(ActiveTile {
                tile,
                cells: cells.len(),
                to_load: cells.into_iter().map(ChunkUnit::new).collect(),
                to_relight: VecDeque::new(),
                to_evict: Vec::new(),
            });
            return true;
        }
        false
    }

    fn load_active<B: TerrainBackend + ?Sized>(&mut self, backend: &mut B) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let mut units = std::mem::take(&mut active.to_load);

        if self.options.force_regenerate {
            // Clear the whole tile first so regenerated cells only see fresh neighbors.
            for unit in units.iter_mut() {
                // Already regenerated by an earlier tile of this job; destroying it again
                // would only repeat that work.
                if self.created_overlap.contains(&unit.coord()) {
                    continue;
                }
                unit.kick_occupants(backend, REGENERATE_REASON);
                unit.force_evict(backend);
            }
        }

        let relight = self.lighting.intensity().is_some();
        for mut unit in units {
            unit.materialize(backend);
            if self.created_overlap.contains(&unit.coord()) {
                unit.mark_created();
            }
            if self.options.force_regenerate {
                unit.force_regenerate(backend, REGENERATE_REASON);
            }
            if unit.was_created() && in_pending_strip(&active.tile, &self.grid, unit.coord()) {
                self.created_overlap.insert(unit.coord());
            } else {
                self.created_overlap.remove(&unit.coord());
            }
            if relight {
                active.to_relight.push_back(unit);
            } else {
                active.to_evict.push(unit);
            }
        }
    }

    fn relight_batch<B, S>(&mut self, backend: &mut B, sink: &mut S)
    where
        B: TerrainBackend + ?Sized,
        S: ProgressSink + ?Sized,
    {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(intensity) = self.lighting.intensity() else {
            active.to_evict.extend(active.to_relight.drain(..));
            return;
        };
        let budget = self.tuning.chunks_per_tick(intensity);
        let mut processed = 0usize;
        while processed < budget {
            let Some(mut unit) = active.to_relight.pop_front() else {
                break;
            };
            processed += 1;
            if !unit.was_created() && !self.lighting.relights_existing() {
                active.to_evict.push(unit);
                continue;
            }
            match unit.relight(backend, intensity) {
                Ok(RelightOutcome::Relit) => {}
                Ok(outcome) => {
                    log::trace!(target: "pregen::job", "relight skipped {}: {:?}", unit.coord(), outcome);
                }
                Err(err) => {
                    log::warn!(target: "pregen::job", "disabling lighting for this generation: {}", err);
                    let msg = match err {
                        BackendError::Unsupported(_) => {
                            "Error: this host does not support relighting. Disabling lighting for this generation."
                        }
                        BackendError::Failed(_) => {
                            "Error: the host failed while relighting. Disabling lighting for this generation."
                        }
                    };
                    sink.broadcast(msg);
                    self.lighting = LightingPolicy::None;
                    active.to_evict.push(unit);
                    active.to_evict.extend(active.to_relight.drain(..));
                    return;
                }
            }
            active.to_evict.push(unit);
        }
    }

    fn evict_active<B: TerrainBackend + ?Sized>(&mut self, backend: &mut B) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let ceiling = self.limits.evict_retry_ceiling;
        for mut unit in active.to_evict.drain(..) {
            if !unit.request_evict(backend, ceiling).is_done() {
                self.backlog.push(unit);
            }
        }
    }

    fn finish<S: ProgressSink + ?Sized>(&mut self, sink: &mut S, queue: QueueDepth, elapsed: Duration) {
        self.finished = true;
        let took = format_elapsed(elapsed);
        let next = match queue {
            QueueDepth::Pending(n) if n > 0 => "Loading next generation job",
            _ => "Have a nice day!",
        };
        let msg = if self.cancelled {
            format!("Generation cancelled after {}. {}{}", took, next, queue)
        } else {
            format!("Generation complete in {}. {}{}", took, next, queue)
        };
        sink.broadcast(&msg);
    }
}

/// True for cells this tile shares with a tile that has not run yet.
///
/// Tiles are consumed from the back of the row-major raster, so the only pending
/// neighbors are the tile to the left and the row above.
fn in_pending_strip(tile: &Tile, grid: &GridExtent, c: GridCoord) -> bool {
    let reach = TILE_OVERLAP - 1;
    (tile.x1 > grid.x1 && c.x <= tile.x1 + reach) || (tile.z1 > grid.z1 && c.z <= tile.z1 + reach)
}

impl From<ExtentError> for RequestError {
    fn from(value: ExtentError) -> Self {
        RequestError::InvalidExtent(value)
    }
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::InvalidExtent(e) => write!(f, "{}", e),
            RequestError::NoTiles => write!(
                f,
                "specified region contains no loadable cells (did you mix up positive/negatives?)"
            ),
        }
    }
}

impl std::error::Error for RequestError {}
