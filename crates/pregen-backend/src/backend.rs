use pregen_grid::GridCoord;
use serde::{Deserialize, Serialize};

/// Handle for a live occupant (player, actor) standing in a resident cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccupantId(pub u64);

impl std::fmt::Display for OccupantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How hard a lighting pass works on one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelightIntensity {
    /// Touch only the top of each column so the host recomputes propagation.
    Normal,
    /// Walk the full column and force a recompute at every light-deficient cell (~3x cost).
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The host cannot provide this capability at all.
    Unsupported(&'static str),
    Failed(String),
}

/// Everything the engine needs from the host's spatial-data layer.
///
/// Calls are only ever made from the scheduler's tick, one at a time.
pub trait TerrainBackend {
    fn is_resident(&self, cell: GridCoord) -> bool;

    /// Makes the cell resident. Returns `true` if it was already resident or could be
    /// loaded without generating new content. With `allow_create == false` a missing
    /// cell stays absent and `false` is returned.
    fn load(&mut self, cell: GridCoord, allow_create: bool) -> bool;

    /// Discards any stored content and generates the cell afresh, leaving it resident.
    fn regenerate(&mut self, cell: GridCoord);

    /// Asks the host to evict the cell. The host may defer while the cell is still in use.
    fn request_evict(&mut self, cell: GridCoord);

    /// Evicts immediately, skipping the host's safe drain.
    fn force_evict(&mut self, cell: GridCoord);

    fn relight(&mut self, cell: GridCoord, intensity: RelightIntensity) -> Result<(), BackendError>;

    fn occupants_of(&self, cell: GridCoord) -> Vec<OccupantId>;

    fn evacuate(&mut self, occupant: OccupantId, reason: &str);

    /// Fraction of memory capacity in use, in `[0, 1]`.
    fn memory_pressure(&self) -> f32;

    fn online_occupant_count(&self) -> usize;

    /// Number of resident cells (diagnostics only).
    fn resident_count(&self) -> usize;

    /// Depth of the host's internal tick backlog, if the host can report it.
    fn backlog_depth(&self) -> Option<usize> {
        None
    }

    fn force_drain_backlog(&mut self) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("backlog draining"))
    }

    /// Best-effort request for the host to reclaim memory.
    fn reclaim_memory(&mut self) {}
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Unsupported(what) => write!(f, "{} is not supported by this host", what),
            BackendError::Failed(msg) => write!(f, "backend failure: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
