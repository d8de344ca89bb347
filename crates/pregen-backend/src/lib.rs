//! Capability seams the generation engine is driven through, plus in-memory implementations.
#![forbid(unsafe_code)]

mod backend;
mod sim;
mod sink;

pub use backend::{BackendError, OccupantId, RelightIntensity, TerrainBackend};
pub use sim::{SimCall, SimCalls, SimTerrain};
pub use sink::{MemorySink, ProgressSink, Recipient, StatusMessage};
