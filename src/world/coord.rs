//! Integer coordinates and inclusive coordinate ranges
//!
//! A [`Coordinate`] identifies either a chunk (in chunk-grid units) or a
//! voxel (in world units) depending on context. [`Bounds`] is the inclusive
//! axis-aligned box apertures use for their managed regions.

use std::ops::{Add, Sub};

use glam::Vec3;

use crate::world::chunk::CHUNK_DIAMETER;

/// Integer 3-tuple identifying a chunk or voxel position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coordinate {
    pub const ZERO: Coordinate = Coordinate { x: 0, y: 0, z: 0 };

    /// Create a new coordinate
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Convert a world-space position to the containing chunk coordinate
    pub fn from_world_pos(pos: Vec3) -> Self {
        let size = CHUNK_DIAMETER as f32;
        Self {
            x: (pos.x / size).floor() as i32,
            y: (pos.y / size).floor() as i32,
            z: (pos.z / size).floor() as i32,
        }
    }

    /// Chunk coordinate containing a world-space voxel coordinate
    pub fn voxel_to_chunk(self) -> Self {
        let d = CHUNK_DIAMETER as i32;
        Self {
            x: self.x.div_euclid(d),
            y: self.y.div_euclid(d),
            z: self.z.div_euclid(d),
        }
    }

    /// Local voxel index within its chunk (layout: y-major, then z, then x)
    pub fn voxel_local_index(self) -> usize {
        let d = CHUNK_DIAMETER as i32;
        let lx = self.x.rem_euclid(d) as usize;
        let ly = self.y.rem_euclid(d) as usize;
        let lz = self.z.rem_euclid(d) as usize;
        (ly * CHUNK_DIAMETER + lz) * CHUNK_DIAMETER + lx
    }

    /// Coordinate offset by the given deltas
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Euclidean-like distance with the vertical component scaled by
    /// `vertical_weight`. Used for streaming priorities.
    pub fn distance_to(self, other: Coordinate, vertical_weight: f32) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32 * vertical_weight;
        let dz = (self.z - other.z) as f32;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Coordinate {
    type Output = Coordinate;

    fn sub(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Inclusive axis-aligned box of coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Bounds {
    /// Create bounds from inclusive corners
    pub fn new(min: Coordinate, max: Coordinate) -> Self {
        Self { min, max }
    }

    /// Bounds of size (2*radius+1) horizontally and (2*height_radius+1)
    /// vertically, centered on `center`
    pub fn around(center: Coordinate, radius: i32, height_radius: i32) -> Self {
        Self {
            min: center.offset(-radius, -height_radius, -radius),
            max: center.offset(radius, height_radius, radius),
        }
    }

    /// True when no coordinate lies inside (a clip can produce this)
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Containment test (inclusive on all faces)
    pub fn contains(&self, c: Coordinate) -> bool {
        c.x >= self.min.x && c.x <= self.max.x
            && c.y >= self.min.y && c.y <= self.max.y
            && c.z >= self.min.z && c.z <= self.max.z
    }

    /// Intersection with another bounds; may be empty
    pub fn clipped_to(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: Coordinate::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            max: Coordinate::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        }
    }

    /// Iterate every coordinate inside the bounds
    pub fn iter(&self) -> impl Iterator<Item = Coordinate> + use<> {
        let b = *self;
        (b.min.y..=b.max.y).flat_map(move |y| {
            (b.min.z..=b.max.z).flat_map(move |z| {
                (b.min.x..=b.max.x).map(move |x| Coordinate::new(x, y, z))
            })
        })
    }

    /// Number of coordinates inside
    pub fn volume(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let dx = (self.max.x - self.min.x + 1) as usize;
        let dy = (self.max.y - self.min.y + 1) as usize;
        let dz = (self.max.z - self.min.z + 1) as usize;
        dx * dy * dz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_arithmetic() {
        let a = Coordinate::new(1, 2, 3);
        let b = Coordinate::new(-1, 0, 5);
        assert_eq!(a + b, Coordinate::new(0, 2, 8));
        assert_eq!(a - b, Coordinate::new(2, 2, -2));
        assert_eq!(a.offset(1, 1, 1), Coordinate::new(2, 3, 4));
    }

    #[test]
    fn test_from_world_pos() {
        let size = CHUNK_DIAMETER as f32;
        assert_eq!(
            Coordinate::from_world_pos(Vec3::new(size * 0.5, 0.0, 0.0)),
            Coordinate::new(0, 0, 0)
        );
        assert_eq!(
            Coordinate::from_world_pos(Vec3::new(size * 1.5, size * 2.5, -1.0)),
            Coordinate::new(1, 2, -1)
        );
    }

    #[test]
    fn test_voxel_to_chunk_and_local_index() {
        let d = CHUNK_DIAMETER as i32;

        let v = Coordinate::new(0, 0, 0);
        assert_eq!(v.voxel_to_chunk(), Coordinate::ZERO);
        assert_eq!(v.voxel_local_index(), 0);

        // Negative voxel coordinates land in the -1 chunk with a positive
        // local index
        let v = Coordinate::new(-1, -1, -1);
        assert_eq!(v.voxel_to_chunk(), Coordinate::new(-1, -1, -1));
        let last = CHUNK_DIAMETER - 1;
        assert_eq!(
            v.voxel_local_index(),
            (last * CHUNK_DIAMETER + last) * CHUNK_DIAMETER + last
        );

        let v = Coordinate::new(d + 3, 2, d * 2 + 1);
        assert_eq!(v.voxel_to_chunk(), Coordinate::new(1, 0, 2));
    }

    #[test]
    fn test_weighted_distance() {
        let origin = Coordinate::ZERO;
        // Pure vertical offset scales with the weight
        let above = Coordinate::new(0, 2, 0);
        assert_eq!(origin.distance_to(above, 1.0), 2.0);
        assert_eq!(origin.distance_to(above, 2.0), 4.0);
        // Horizontal distance is unaffected
        let side = Coordinate::new(3, 0, 4);
        assert_eq!(origin.distance_to(side, 5.0), 5.0);
    }

    #[test]
    fn test_bounds_around_and_contains() {
        let b = Bounds::around(Coordinate::new(1, 0, 1), 2, 1);
        assert_eq!(b.min, Coordinate::new(-1, -1, -1));
        assert_eq!(b.max, Coordinate::new(3, 1, 3));
        assert!(b.contains(Coordinate::new(3, 1, 3)));
        assert!(!b.contains(Coordinate::new(4, 0, 0)));
        assert_eq!(b.volume(), 5 * 3 * 5);
    }

    #[test]
    fn test_bounds_clip() {
        let a = Bounds::around(Coordinate::ZERO, 2, 2);
        let level = Bounds::new(Coordinate::new(0, 0, 0), Coordinate::new(10, 10, 10));
        let clipped = a.clipped_to(&level);
        assert_eq!(clipped.min, Coordinate::ZERO);
        assert_eq!(clipped.max, Coordinate::new(2, 2, 2));

        let far = Bounds::around(Coordinate::new(100, 0, 0), 1, 1);
        assert!(far.clipped_to(&level).is_empty());
        assert_eq!(far.clipped_to(&level).volume(), 0);
    }

    #[test]
    fn test_bounds_iter_count() {
        let b = Bounds::around(Coordinate::ZERO, 1, 0);
        let all: Vec<_> = b.iter().collect();
        assert_eq!(all.len(), 9);
        assert!(all.contains(&Coordinate::new(-1, 0, 1)));
        assert!(all.iter().all(|c| c.y == 0));
    }
}
