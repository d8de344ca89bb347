use crate::coord::GridCoord;
use crate::extent::{CircleClip, GridExtent};

/// Cells shared by adjacent tiles so edge-sensitive passes see full neighbor context.
pub const TILE_OVERLAP: i32 = 2;

/// A batch of grid cells processed together in one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    pub x1: i32,
    pub z1: i32,
    pub x2: i32,
    pub z2: i32,
    pub clip: Option<CircleClip>,
}

impl Tile {
    #[inline]
    pub fn width(&self) -> i32 {
        self.x2 - self.x1 + 1
    }

    #[inline]
    pub fn depth(&self) -> i32 {
        self.z2 - self.z1 + 1
    }

    #[inline]
    pub fn contains(&self, cell: GridCoord) -> bool {
        cell.x >= self.x1 && cell.x <= self.x2 && cell.z >= self.z1 && cell.z <= self.z2
    }

    /// Expands the tile into its concrete cells in row-major order, dropping cells
    /// outside the circle clip.
    pub fn cells(&self) -> Vec<GridCoord> {
        let mut out = Vec::with_capacity((self.width().max(0) * self.depth().max(0)) as usize);
        for z in self.z1..=self.z2 {
            for x in self.x1..=self.x2 {
                let cell = GridCoord::new(x, z);
                if self.clip.is_none_or(|c| c.contains(cell)) {
                    out.push(cell);
                }
            }
        }
        out
    }
}

/// Splits a grid extent into a row-major raster of tiles at most `region_size` cells on a side.
///
/// The first tile of every row and column starts on the extent boundary; every later tile
/// starts `overlap` cells before the end of its predecessor. An empty extent yields no tiles.
pub fn decompose(extent: &GridExtent, region_size: i32, overlap: i32) -> Vec<Tile> {
    if extent.is_empty() {
        return Vec::new();
    }
    let overlap = overlap.max(0);
    // A tile must advance past the overlap strip or the raster never terminates.
    let region_size = region_size.max(overlap + 1);

    let GridExtent {
        x1: x_start,
        z1: z_start,
        x2: x_end,
        z2: z_end,
        clip,
    } = *extent;

    let mut tiles = Vec::new();
    let mut z_next = z_start;
    let mut x_next = x_start;
    while z_next <= z_end {
        if z_next == z_start {
            z_next += overlap;
        }
        if x_next == x_start {
            x_next += overlap;
        }
        let x1 = x_next - overlap;
        let x2 = (x1 + region_size - 1).min(x_end);
        let z1 = z_next - overlap;
        let z2 = (z1 + region_size - 1).min(z_end);
        tiles.push(Tile {
            x1,
            z1,
            x2,
            z2,
            clip,
        });

        x_next = x2 + 1;
        if x_next > x_end {
            x_next = x_start + overlap;
            z_next = z2 + 1;
        }
    }
    tiles
}
