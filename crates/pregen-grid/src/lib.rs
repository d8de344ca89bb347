//! Grid coordinates, request extents, and tile decomposition (pure math, no I/O).
#![forbid(unsafe_code)]

mod coord;
mod extent;
mod tile;

pub use coord::{CELL_SIZE, GridCoord, world_to_grid};
pub use extent::{CircleClip, Extent, ExtentError, GridExtent};
pub use tile::{TILE_OVERLAP, Tile, decompose};
