//! Common types and traits for truck-interior geometry.
//!
//! All lengths are non-negative integers in truck-interior units (centimetres in
//! practice). Areas are widened to `u64` and volumes to `u128`, so products of
//! `u32` extents never overflow.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use utoipa::ToSchema;

/// Numerical tolerance for weight comparisons.
///
/// Weights are the only floating-point quantity in the engine.
pub const EPSILON_WEIGHT: f64 = 1e-6;

/// An integer point inside the truck interior.
///
/// `x` runs along the truck length, `y` along its width and `z` is the height
/// above the floor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Point3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Point3 {
    #[inline]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// The truck origin (back, left, floor corner).
    #[inline]
    pub const fn origin() -> Self {
        Self::new(0, 0, 0)
    }

    #[inline]
    pub const fn as_tuple(&self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }
}

impl From<(u32, u32, u32)> for Point3 {
    #[inline]
    fn from(tuple: (u32, u32, u32)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }
}

/// Extents of a box: `length` along x, `width` along y, `height` along z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Dims3 {
    pub length: u32,
    pub width: u32,
    pub height: u32,
}

impl Dims3 {
    #[inline]
    pub const fn new(length: u32, width: u32, height: u32) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    #[inline]
    pub fn volume(&self) -> u128 {
        u128::from(self.footprint_area()) * u128::from(self.height)
    }

    /// Floor area covered by the box (length × width).
    #[inline]
    pub fn footprint_area(&self) -> u64 {
        u64::from(self.length) * u64::from(self.width)
    }

    /// Returns the same box turned a quarter about the vertical axis.
    #[inline]
    pub fn rotated(&self) -> Self {
        let (length, width) = crate::geometry::rotated_footprint(self.length, self.width);
        Self::new(length, width, self.height)
    }

    /// Component-wise `<=` against a container's extents.
    #[inline]
    pub fn fits_within(&self, container: &Self) -> bool {
        self.length <= container.length
            && self.width <= container.width
            && self.height <= container.height
    }

    #[inline]
    pub const fn as_tuple(&self) -> (u32, u32, u32) {
        (self.length, self.width, self.height)
    }
}

/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    fn dimensions(&self) -> Dims3;

    fn volume(&self) -> u128 {
        self.dimensions().volume()
    }

    fn footprint_area(&self) -> u64 {
        self.dimensions().footprint_area()
    }
}

/// An axis-aligned box given by its origin corner and its extents.
///
/// The box occupies the half-open region `[min, min + size)` on every axis, so two
/// boxes that share only a face or an edge do not intersect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub min: Point3,
    pub size: Dims3,
}

impl BoundingBox {
    #[inline]
    pub const fn new(min: Point3, size: Dims3) -> Self {
        Self { min, size }
    }

    #[inline]
    pub fn max_x(&self) -> u64 {
        u64::from(self.min.x) + u64::from(self.size.length)
    }

    #[inline]
    pub fn max_y(&self) -> u64 {
        u64::from(self.min.y) + u64::from(self.size.width)
    }

    /// Height of the top face.
    #[inline]
    pub fn top_z(&self) -> u64 {
        u64::from(self.min.z) + u64::from(self.size.height)
    }

    #[inline]
    pub fn volume(&self) -> u128 {
        self.size.volume()
    }
}

impl Dimensional for BoundingBox {
    fn dimensions(&self) -> Dims3 {
        self.size
    }
}

/// Candidate placement origin ordered by the packer's scan order.
///
/// Points compare by `z`, then `y`, then `x`: lowest first, then furthest toward the
/// back wall, then furthest toward the left side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CandidatePoint(pub Point3);

impl CandidatePoint {
    #[inline]
    fn scan_key(&self) -> (u32, u32, u32) {
        (self.0.z, self.0.y, self.0.x)
    }
}

impl PartialOrd for CandidatePoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CandidatePoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scan_key().cmp(&other.scan_key())
    }
}
