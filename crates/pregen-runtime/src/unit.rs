use pregen_backend::{BackendError, RelightIntensity, TerrainBackend};
use pregen_grid::GridCoord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitState {
    Absent,
    Loading,
    Loaded,
    Relit,
    Evicting,
    Evicted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelightOutcome {
    Relit,
    /// Not all eight neighbors were resident; nothing was touched.
    MissingNeighbors,
    NotResident,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictProgress {
    Evicted,
    Pending,
    /// The retry ceiling was hit while the cell stayed resident.
    Abandoned,
}

impl EvictProgress {
    #[inline]
    pub fn is_done(self) -> bool {
        !matches!(self, EvictProgress::Pending)
    }
}

/// Lifecycle of one grid cell inside a job: load, optional relight, evict.
#[derive(Clone, Debug)]
pub struct ChunkUnit {
    coord: GridCoord,
    state: UnitState,
    was_created: bool,
    evict_requests: u32,
}

impl ChunkUnit {
    pub fn new(coord: GridCoord) -> Self {
        Self {
            coord,
            state: UnitState::Absent,
            was_created: false,
            evict_requests: 0,
        }
    }

    #[inline]
    pub fn coord(&self) -> GridCoord {
        self.coord
    }

    #[inline]
    pub fn state(&self) -> UnitState {
        self.state
    }

    /// True when materializing this cell generated fresh content.
    #[inline]
    pub fn was_created(&self) -> bool {
        self.was_created
    }

    #[inline]
    pub fn evict_requests(&self) -> u32 {
        self.evict_requests
    }

    /// Treat the cell as generated by this job even though it was loaded from storage
    /// (an earlier overlapping tile created it).
    pub(crate) fn mark_created(&mut self) {
        self.was_created = true;
    }

    /// Makes the cell resident, preferring existing content. Returns `was_created`.
    pub fn materialize<B: TerrainBackend + ?Sized>(&mut self, backend: &mut B) -> bool {
        if backend.is_resident(self.coord) {
            if matches!(self.state, UnitState::Absent | UnitState::Evicted) {
                self.state = UnitState::Loaded;
            }
            return self.was_created;
        }
        self.state = UnitState::Loading;
        if !backend.load(self.coord, false) {
            backend.load(self.coord, true);
            self.was_created = true;
        }
        self.state = UnitState::Loaded;
        self.was_created
    }

    /// Evacuates occupants, then throws the cell's content away and generates it again.
    /// Only applies to a resident cell that held pre-existing content.
    pub fn force_regenerate<B: TerrainBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        reason: &str,
    ) -> bool {
        if self.was_created || !backend.is_resident(self.coord) {
            return false;
        }
        self.kick_occupants(backend, reason);
        backend.force_evict(self.coord);
        backend.regenerate(self.coord);
        self.was_created = true;
        self.state = UnitState::Loaded;
        true
    }

    /// Destructive eviction without the host's safe drain.
    pub fn force_evict<B: TerrainBackend + ?Sized>(&mut self, backend: &mut B) {
        if backend.is_resident(self.coord) {
            backend.force_evict(self.coord);
        }
        self.state = UnitState::Evicted;
    }

    /// Runs a lighting pass, but only with all eight neighbors resident; lighting a cell
    /// without its neighbors corrupts the host's light data.
    pub fn relight<B: TerrainBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        intensity: RelightIntensity,
    ) -> Result<RelightOutcome, BackendError> {
        if !backend.is_resident(self.coord) {
            return Ok(RelightOutcome::NotResident);
        }
        if !self
            .coord
            .neighbors8()
            .iter()
            .all(|n| backend.is_resident(*n))
        {
            return Ok(RelightOutcome::MissingNeighbors);
        }
        backend.relight(self.coord, intensity)?;
        self.state = UnitState::Relit;
        Ok(RelightOutcome::Relit)
    }

    /// Issues one evict request. Cells still resident after `ceiling` requests are abandoned.
    pub fn request_evict<B: TerrainBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        ceiling: u32,
    ) -> EvictProgress {
        if !backend.is_resident(self.coord) {
            self.state = UnitState::Evicted;
            return EvictProgress::Evicted;
        }
        self.state = UnitState::Evicting;
        backend.request_evict(self.coord);
        self.evict_requests = self.evict_requests.saturating_add(1);
        if !backend.is_resident(self.coord) {
            self.state = UnitState::Evicted;
            EvictProgress::Evicted
        } else if self.evict_requests >= ceiling {
            log::debug!(
                target: "pregen::unit",
                "abandoning eviction of {} after {} requests",
                self.coord,
                self.evict_requests
            );
            EvictProgress::Abandoned
        } else {
            EvictProgress::Pending
        }
    }

    /// Evacuates live occupants of a resident cell. Returns how many were moved.
    pub fn kick_occupants<B: TerrainBackend + ?Sized>(&mut self, backend: &mut B, reason: &str) -> usize {
        if !backend.is_resident(self.coord) {
            return 0;
        }
        let occupants = backend.occupants_of(self.coord);
        for occupant in &occupants {
            backend.evacuate(*occupant, reason);
        }
        occupants.len()
    }
}
