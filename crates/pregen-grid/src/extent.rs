use serde::{Deserialize, Serialize};

use crate::coord::{GridCoord, world_to_grid};

/// A requested region in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extent {
    Box {
        x_start: i32,
        z_start: i32,
        x_end: i32,
        z_end: i32,
    },
    Circle {
        x_center: i32,
        z_center: i32,
        radius: i32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtentError {
    InvertedBox,
    DegenerateBox,
    RadiusTooSmall,
}

impl Extent {
    pub const fn square(x_start: i32, z_start: i32, x_end: i32, z_end: i32) -> Self {
        Extent::Box {
            x_start,
            z_start,
            x_end,
            z_end,
        }
    }

    pub const fn circle(x_center: i32, z_center: i32, radius: i32) -> Self {
        Extent::Circle {
            x_center,
            z_center,
            radius,
        }
    }

    /// Rejects extents a job cannot be built from: a box must span at least one world
    /// unit on each axis and a circle needs a radius of at least 1.
    pub fn validate(&self) -> Result<(), ExtentError> {
        match *self {
            Extent::Box {
                x_start,
                z_start,
                x_end,
                z_end,
            } => {
                if x_end < x_start || z_end < z_start {
                    Err(ExtentError::InvertedBox)
                } else if x_end == x_start || z_end == z_start {
                    Err(ExtentError::DegenerateBox)
                } else {
                    Ok(())
                }
            }
            Extent::Circle { radius, .. } => {
                if radius < 1 {
                    Err(ExtentError::RadiusTooSmall)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Converts to grid space. Circles become their bounding box plus a clip; a circle whose
    /// radius rounds down to zero cells is treated as its bounding box.
    pub fn to_grid(&self) -> GridExtent {
        match *self {
            Extent::Box {
                x_start,
                z_start,
                x_end,
                z_end,
            } => GridExtent {
                x1: world_to_grid(x_start),
                z1: world_to_grid(z_start),
                x2: world_to_grid(x_end),
                z2: world_to_grid(z_end),
                clip: None,
            },
            Extent::Circle {
                x_center,
                z_center,
                radius,
            } => {
                let grid_radius = world_to_grid(radius);
                GridExtent {
                    x1: world_to_grid(x_center.saturating_sub(radius)),
                    z1: world_to_grid(z_center.saturating_sub(radius)),
                    x2: world_to_grid(x_center.saturating_add(radius)),
                    z2: world_to_grid(z_center.saturating_add(radius)),
                    clip: (grid_radius > 0).then(|| CircleClip {
                        center: GridCoord::from_world(x_center, z_center),
                        radius: grid_radius,
                    }),
                }
            }
        }
    }
}

/// Circle clip applied when a tile is expanded into cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CircleClip {
    pub center: GridCoord,
    pub radius: i32,
}

impl CircleClip {
    #[inline]
    pub fn contains(&self, cell: GridCoord) -> bool {
        let r = i64::from(self.radius);
        cell.distance_sq(self.center) <= r * r
    }
}

/// Inclusive grid-space bounds of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridExtent {
    pub x1: i32,
    pub z1: i32,
    pub x2: i32,
    pub z2: i32,
    pub clip: Option<CircleClip>,
}

impl GridExtent {
    pub const fn new(x1: i32, z1: i32, x2: i32, z2: i32) -> Self {
        Self {
            x1,
            z1,
            x2,
            z2,
            clip: None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x1 > self.x2 || self.z1 > self.z2
    }

    /// Cells in the bounding box, before any circle clip.
    pub fn cell_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let w = (i64::from(self.x2) - i64::from(self.x1) + 1) as u64;
        let h = (i64::from(self.z2) - i64::from(self.z1) + 1) as u64;
        w * h
    }

    #[inline]
    pub fn contains(&self, cell: GridCoord) -> bool {
        cell.x >= self.x1
            && cell.x <= self.x2
            && cell.z >= self.z1
            && cell.z <= self.z2
            && self.clip.is_none_or(|c| c.contains(cell))
    }
}

impl std::fmt::Display for ExtentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtentError::InvertedBox => write!(
                f,
                "x_end and z_end must be greater than x_start and z_start"
            ),
            ExtentError::DegenerateBox => {
                write!(f, "region must span at least one block on each axis")
            }
            ExtentError::RadiusTooSmall => write!(f, "circle radius must be at least 1"),
        }
    }
}

impl std::error::Error for ExtentError {}
