use std::collections::VecDeque;
use std::time::Instant;

use pregen_backend::{ProgressSink, Recipient, TerrainBackend};
use pregen_grid::Extent;

use crate::config::RuntimeConfig;
use crate::job::{QueueDepth, RegionJob, RequestError, StepOutcome};
use crate::options::JobOptions;

/// Counts host ticks down to the next scheduler tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickTimer {
    period: u32,
    countdown: u32,
}

impl TickTimer {
    /// A fresh timer fires on the first host tick, then every `period` ticks.
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1),
            countdown: 1,
        }
    }

    #[inline]
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Advances one host tick; true when the scheduler should run.
    pub fn advance(&mut self) -> bool {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.countdown = self.period;
            true
        } else {
            false
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No active job.
    Idle,
    /// Between scheduler ticks.
    Waiting,
    /// The active job held off for memory or occupants.
    Throttled,
    Worked,
    /// A job completed and the scheduler promoted the next one or went idle.
    JobFinished,
    /// The last job completed with quit-after set; the host should shut down.
    ShutdownRequested,
}

/// A region request as it arrives from a command surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JobRequest {
    pub extent: Extent,
    pub options: JobOptions,
    pub quit_after_completion: bool,
    pub requester: Recipient,
}

impl JobRequest {
    pub fn new(extent: Extent, options: JobOptions) -> Self {
        Self {
            extent,
            options,
            quit_after_completion: false,
            requester: Recipient::Console,
        }
    }
}

/// Owns the active job and the FIFO of pending ones; the host drives it with
/// [`Scheduler::on_host_tick`].
pub struct Scheduler<B: TerrainBackend, S: ProgressSink> {
    backend: B,
    sink: S,
    config: RuntimeConfig,
    active: Option<RegionJob>,
    pending: VecDeque<RegionJob>,
    timer: Option<TickTimer>,
    quit_after: bool,
}

impl<B: TerrainBackend, S: ProgressSink> Scheduler<B, S> {
    pub fn new(backend: B, sink: S, config: RuntimeConfig) -> Self {
        Self {
            backend,
            sink,
            config,
            active: None,
            pending: VecDeque::new(),
            timer: None,
            quit_after: false,
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub fn active(&self) -> Option<&RegionJob> {
        self.active.as_ref()
    }

    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    #[inline]
    pub fn quit_after(&self) -> bool {
        self.quit_after
    }

    pub fn set_quit_after(&mut self, quit: bool) {
        self.quit_after = quit;
    }

    /// Period of the running timer, if any.
    pub fn tick_period(&self) -> Option<u32> {
        self.timer.map(|t| t.period())
    }

    pub fn into_parts(self) -> (B, S) {
        (self.backend, self.sink)
    }

    /// Activates the job immediately when idle, otherwise queues it.
    pub fn submit(&mut self, job: RegionJob) {
        if self.active.is_none() {
            self.activate(job);
        } else {
            log::debug!(
                target: "pregen::scheduler",
                "queued job behind {} others",
                self.pending.len() + 1
            );
            self.pending.push_back(job);
        }
    }

    /// Validates and submits a request, answering the requester either way.
    /// Returns the job's queue position (0 when it became active).
    pub fn submit_request(&mut self, request: JobRequest) -> Result<usize, RequestError> {
        let job = match RegionJob::new(request.extent, request.options, &self.config) {
            Ok(job) => job,
            Err(err) => {
                self.sink
                    .report(&format!("Error: {}", err), request.requester, false);
                return Err(err);
            }
        };
        if request.options.debug {
            let g = job.grid();
            self.sink.report(
                &format!(
                    "-- Grid extent x {}..={} z {}..={}{}",
                    g.x1,
                    g.x2,
                    g.z1,
                    g.z2,
                    if g.clip.is_some() { " (circle)" } else { "" }
                ),
                request.requester,
                false,
            );
        }
        self.sink.report(
            &format!(
                "Queued generation of {} cells in {} sections ({} speed, {} lighting)",
                job.bounding_cells(),
                job.total_tiles(),
                job.speed().name(),
                job.lighting().name()
            ),
            request.requester,
            true,
        );
        if request.quit_after_completion {
            self.quit_after = true;
        }
        let position = if self.active.is_none() {
            0
        } else {
            self.pending.len() + 1
        };
        self.submit(job);
        Ok(position)
    }

    /// Called once per host tick; runs [`Scheduler::tick_at`] whenever the timer elapses.
    pub fn on_host_tick(&mut self, now: Instant) -> TickOutcome {
        if self.active.is_none() {
            return TickOutcome::Idle;
        }
        let fire = self.timer.as_mut().is_none_or(TickTimer::advance);
        if !fire {
            return TickOutcome::Waiting;
        }
        self.tick_at(now)
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// One step of the active job, plus promotion when it completes.
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        let queue = self.queue_depth();
        let Some(job) = self.active.as_mut() else {
            return TickOutcome::Idle;
        };
        match job.step(&mut self.backend, &mut self.sink, queue, now) {
            StepOutcome::Throttled => TickOutcome::Throttled,
            StepOutcome::Progressed => TickOutcome::Worked,
            StepOutcome::Complete => {
                if let Some(done) = self.active.take() {
                    log::info!(
                        target: "pregen::scheduler",
                        "job finished after {:.1}s ({} sections{})",
                        done.elapsed(now).as_secs_f64(),
                        done.total_tiles(),
                        if done.is_cancelled() { ", cancelled" } else { "" }
                    );
                }
                if let Some(next) = self.pending.pop_front() {
                    self.activate(next);
                    TickOutcome::JobFinished
                } else {
                    self.timer = None;
                    if self.quit_after {
                        self.quit_after = false;
                        log::info!(target: "pregen::scheduler", "generation queue empty; requesting host shutdown");
                        TickOutcome::ShutdownRequested
                    } else {
                        TickOutcome::JobFinished
                    }
                }
            }
        }
    }

    /// Cancels the active job only; pending jobs still run afterward.
    pub fn cancel_active(&mut self, requester: Recipient) -> bool {
        match self.active.as_mut() {
            Some(job) => {
                job.cancel();
                self.sink.report(
                    "Cancelling generation. Cells in flight are saved first.",
                    requester,
                    true,
                );
                true
            }
            None => {
                self.sink
                    .report("There is no generation running", requester, false);
                false
            }
        }
    }

    /// Cancels the active job, drops every pending job and clears quit-after.
    pub fn cancel_all(&mut self, requester: Recipient) -> bool {
        if self.active.is_none() && self.pending.is_empty() {
            self.sink
                .report("There is no generation running", requester, false);
            return false;
        }
        let dropped = self.pending.len();
        self.pending.clear();
        self.quit_after = false;
        if let Some(job) = self.active.as_mut() {
            job.cancel();
        }
        log::info!(target: "pregen::scheduler", "cancel requested; dropped {} pending jobs", dropped);
        self.sink.report(
            "Cancelling generation. Cells in flight are saved first.",
            requester,
            true,
        );
        true
    }

    /// Host is unloading: abort without waiting for evictions and stop the timer.
    pub fn shutdown(&mut self) {
        if let Some(mut job) = self.active.take() {
            self.sink
                .broadcast("Host is shutting down - aborting generation");
            let asked = job.abort(&mut self.backend);
            log::info!(
                target: "pregen::scheduler",
                "aborted active job; {} resident cells asked to evict",
                asked
            );
        }
        if !self.pending.is_empty() {
            log::info!(target: "pregen::scheduler", "dropping {} pending jobs", self.pending.len());
            self.pending.clear();
        }
        self.timer = None;
        self.quit_after = false;
    }

    fn queue_depth(&self) -> QueueDepth {
        if self.pending.is_empty() && self.quit_after {
            QueueDepth::ShutdownScheduled
        } else {
            QueueDepth::Pending(self.pending.len())
        }
    }

    fn activate(&mut self, job: RegionJob) {
        let period = job.tick_period();
        if self.timer.is_none_or(|t| t.period() != period) {
            log::debug!(target: "pregen::scheduler", "tick timer period {} host ticks", period);
            self.timer = Some(TickTimer::new(period));
        }
        self.active = Some(job);
    }
}
