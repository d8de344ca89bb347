use serde::{Deserialize, Serialize};

/// World units covered by one grid cell along each horizontal axis.
pub const CELL_SIZE: i32 = 16;

/// Floor division of a world coordinate into its grid index.
///
/// `-1..=-16` map to `-1`, `0..=15` to `0`, `16..=31` to `1`.
#[inline]
pub const fn world_to_grid(c: i32) -> i32 {
    c.div_euclid(CELL_SIZE)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: i32,
    pub z: i32,
}

impl GridCoord {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    #[inline]
    pub fn from_world(wx: i32, wz: i32) -> Self {
        Self::new(world_to_grid(wx), world_to_grid(wz))
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    #[inline]
    pub fn distance_sq(self, other: GridCoord) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dz * dz
    }

    /// The eight surrounding cells (edges and diagonals).
    pub fn neighbors8(self) -> [GridCoord; 8] {
        [
            self.offset(-1, -1),
            self.offset(-1, 0),
            self.offset(-1, 1),
            self.offset(0, -1),
            self.offset(0, 1),
            self.offset(1, -1),
            self.offset(1, 0),
            self.offset(1, 1),
        ]
    }
}

impl From<(i32, i32)> for GridCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<GridCoord> for (i32, i32) {
    fn from(value: GridCoord) -> Self {
        (value.x, value.z)
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
