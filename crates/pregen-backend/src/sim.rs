use hashbrown::{HashMap, HashSet};
use pregen_grid::GridCoord;

use crate::backend::{BackendError, OccupantId, RelightIntensity, TerrainBackend};

/// One recorded backend call, in the order the engine made it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimCall {
    Load {
        cell: GridCoord,
        allow_create: bool,
        created: bool,
    },
    Regenerate(GridCoord),
    RequestEvict(GridCoord),
    ForceEvict(GridCoord),
    Relight(GridCoord, RelightIntensity),
    Evacuate(OccupantId, GridCoord),
    Reclaim,
    DrainBacklog,
}

/// Ordered call log kept by [`SimTerrain`].
#[derive(Clone, Debug, Default)]
pub struct SimCalls {
    pub log: Vec<SimCall>,
}

impl SimCalls {
    pub fn count(&self, pred: impl Fn(&SimCall) -> bool) -> usize {
        self.log.iter().filter(|c| pred(c)).count()
    }

    pub fn loads(&self) -> usize {
        self.count(|c| matches!(c, SimCall::Load { .. }))
    }

    pub fn created(&self) -> usize {
        self.count(|c| matches!(c, SimCall::Load { created: true, .. }))
    }

    pub fn relights(&self) -> usize {
        self.count(|c| matches!(c, SimCall::Relight(..)))
    }

    pub fn evict_requests(&self) -> usize {
        self.count(|c| matches!(c, SimCall::RequestEvict(_)))
    }

    pub fn force_evictions(&self) -> usize {
        self.count(|c| matches!(c, SimCall::ForceEvict(_)))
    }

    pub fn regenerations(&self) -> usize {
        self.count(|c| matches!(c, SimCall::Regenerate(_)))
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&SimCall) -> bool) -> Option<usize> {
        self.log.iter().position(pred)
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }
}

/// In-memory terrain host.
///
/// Cells are either stored (exist on "disk"), resident, or both. Memory pressure is the
/// resident count over `capacity` unless overridden. Evict requests are deferred for
/// occupied or sticky cells.
#[derive(Debug)]
pub struct SimTerrain {
    stored: HashSet<GridCoord>,
    resident: HashSet<GridCoord>,
    occupants: HashMap<OccupantId, GridCoord>,
    sticky: HashSet<GridCoord>,
    relit: HashMap<GridCoord, u32>,
    capacity: usize,
    pressure_override: Option<f32>,
    lighting_supported: bool,
    observers: usize,
    backlog: Option<usize>,
    drain_fails: bool,
    pub calls: SimCalls,
}

impl Default for SimTerrain {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl SimTerrain {
    pub fn new(capacity: usize) -> Self {
        Self {
            stored: HashSet::new(),
            resident: HashSet::new(),
            occupants: HashMap::new(),
            sticky: HashSet::new(),
            relit: HashMap::new(),
            capacity: capacity.max(1),
            pressure_override: None,
            lighting_supported: true,
            observers: 0,
            backlog: None,
            drain_fails: false,
            calls: SimCalls::default(),
        }
    }

    pub fn with_existing(mut self, cells: impl IntoIterator<Item = GridCoord>) -> Self {
        self.stored.extend(cells);
        self
    }

    pub fn with_lighting_supported(mut self, supported: bool) -> Self {
        self.lighting_supported = supported;
        self
    }

    pub fn set_pressure(&mut self, pressure: Option<f32>) {
        self.pressure_override = pressure.map(|p| p.clamp(0.0, 1.0));
    }

    /// Cell will ignore evict requests until released.
    pub fn make_sticky(&mut self, cell: GridCoord) {
        self.sticky.insert(cell);
    }

    pub fn release_sticky(&mut self, cell: GridCoord) {
        self.sticky.remove(&cell);
    }

    pub fn place_occupant(&mut self, id: OccupantId, cell: GridCoord) {
        self.occupants.insert(id, cell);
    }

    pub fn occupant_ids(&self) -> Vec<OccupantId> {
        let mut ids: Vec<OccupantId> = self.occupants.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Online occupants that are not standing in any tracked cell.
    pub fn set_observers(&mut self, count: usize) {
        self.observers = count;
    }

    pub fn set_backlog(&mut self, depth: Option<usize>, drain_fails: bool) {
        self.backlog = depth;
        self.drain_fails = drain_fails;
    }

    /// Makes a cell resident without going through the engine.
    pub fn preload(&mut self, cell: GridCoord) {
        self.stored.insert(cell);
        self.resident.insert(cell);
    }

    pub fn is_stored(&self, cell: GridCoord) -> bool {
        self.stored.contains(&cell)
    }

    pub fn stored_count(&self) -> usize {
        self.stored.len()
    }

    pub fn relight_count(&self, cell: GridCoord) -> u32 {
        self.relit.get(&cell).copied().unwrap_or(0)
    }

    fn occupied(&self, cell: GridCoord) -> bool {
        self.occupants.values().any(|c| *c == cell)
    }
}

impl TerrainBackend for SimTerrain {
    fn is_resident(&self, cell: GridCoord) -> bool {
        self.resident.contains(&cell)
    }

    fn load(&mut self, cell: GridCoord, allow_create: bool) -> bool {
        let (loaded, created) = if self.resident.contains(&cell) || self.stored.contains(&cell) {
            self.resident.insert(cell);
            (true, false)
        } else if allow_create {
            self.stored.insert(cell);
            self.resident.insert(cell);
            (false, true)
        } else {
            (false, false)
        };
        self.calls.log.push(SimCall::Load {
            cell,
            allow_create,
            created,
        });
        loaded
    }

    fn regenerate(&mut self, cell: GridCoord) {
        self.stored.insert(cell);
        self.resident.insert(cell);
        self.relit.remove(&cell);
        self.calls.log.push(SimCall::Regenerate(cell));
    }

    fn request_evict(&mut self, cell: GridCoord) {
        self.calls.log.push(SimCall::RequestEvict(cell));
        if self.sticky.contains(&cell) || self.occupied(cell) {
            return;
        }
        self.resident.remove(&cell);
    }

    fn force_evict(&mut self, cell: GridCoord) {
        self.calls.log.push(SimCall::ForceEvict(cell));
        self.resident.remove(&cell);
    }

    fn relight(&mut self, cell: GridCoord, intensity: RelightIntensity) -> Result<(), BackendError> {
        if !self.lighting_supported {
            return Err(BackendError::Unsupported("relighting"));
        }
        if !self.resident.contains(&cell) {
            return Err(BackendError::Failed(format!("cell {} is not resident", cell)));
        }
        self.calls.log.push(SimCall::Relight(cell, intensity));
        *self.relit.entry(cell).or_insert(0) += 1;
        Ok(())
    }

    fn occupants_of(&self, cell: GridCoord) -> Vec<OccupantId> {
        if !self.resident.contains(&cell) {
            return Vec::new();
        }
        let mut out: Vec<OccupantId> = self
            .occupants
            .iter()
            .filter(|(_, c)| **c == cell)
            .map(|(id, _)| *id)
            .collect();
        out.sort();
        out
    }

    fn evacuate(&mut self, occupant: OccupantId, reason: &str) {
        if let Some(cell) = self.occupants.remove(&occupant) {
            log::debug!(target: "pregen::sim", "evacuated {} from {}: {}", occupant, cell, reason);
            self.calls.log.push(SimCall::Evacuate(occupant, cell));
        }
    }

    fn memory_pressure(&self) -> f32 {
        self.pressure_override
            .unwrap_or_else(|| (self.resident.len() as f32 / self.capacity as f32).min(1.0))
    }

    fn online_occupant_count(&self) -> usize {
        self.occupants.len() + self.observers
    }

    fn resident_count(&self) -> usize {
        self.resident.len()
    }

    fn backlog_depth(&self) -> Option<usize> {
        self.backlog
    }

    fn force_drain_backlog(&mut self) -> Result<(), BackendError> {
        self.calls.log.push(SimCall::DrainBacklog);
        match self.backlog {
            None => Err(BackendError::Unsupported("backlog draining")),
            Some(_) if self.drain_fails => {
                Err(BackendError::Failed("backlog drain rejected".to_string()))
            }
            Some(_) => {
                self.backlog = Some(0);
                Ok(())
            }
        }
    }

    fn reclaim_memory(&mut self) {
        self.calls.log.push(SimCall::Reclaim);
    }
}
