//! Geometric helper functions for collision detection inside a truck interior.
//!
//! Boxes are half-open (`[min, min + size)` per axis), so boxes that merely touch
//! at a face or an edge are neither overlapping nor out of bounds.

use crate::types::{BoundingBox, Dims3, Point3};

/// Checks whether the interiors of two boxes intersect.
///
/// Uses axis-aligned separation: two boxes do NOT overlap as soon as they are
/// separated along at least one axis.
///
/// # Examples
/// ```
/// use load_planner::geometry::overlaps;
/// use load_planner::types::{BoundingBox, Dims3, Point3};
///
/// let a = BoundingBox::new(Point3::new(0, 0, 0), Dims3::new(10, 10, 10));
/// let b = BoundingBox::new(Point3::new(10, 0, 0), Dims3::new(10, 10, 10));
/// assert!(!overlaps(&a, &b)); // touching faces
/// ```
pub fn overlaps(a: &BoundingBox, b: &BoundingBox) -> bool {
    let (ax, ay, az) = (
        u64::from(a.min.x),
        u64::from(a.min.y),
        u64::from(a.min.z),
    );
    let (bx, by, bz) = (
        u64::from(b.min.x),
        u64::from(b.min.y),
        u64::from(b.min.z),
    );

    !(a.max_x() <= bx
        || b.max_x() <= ax
        || a.max_y() <= by
        || b.max_y() <= ay
        || a.top_z() <= bz
        || b.top_z() <= az)
}

/// Checks whether a box lies entirely inside a container anchored at the origin.
pub fn fits_within(b: &BoundingBox, container: &Dims3) -> bool {
    b.max_x() <= u64::from(container.length)
        && b.max_y() <= u64::from(container.width)
        && b.top_z() <= u64::from(container.height)
}

/// Swaps the two horizontal extents of a footprint.
///
/// Height is never rotated: packages keep their "this side up" orientation.
#[inline]
pub fn rotated_footprint(length: u32, width: u32) -> (u32, u32) {
    (width, length)
}

/// Length of the overlap of two half-open intervals `[a1, a2)` and `[b1, b2)`.
#[inline]
pub fn overlap_1d(a1: u64, a2: u64, b1: u64, b2: u64) -> u64 {
    a2.min(b2).saturating_sub(a1.max(b1))
}

/// Area shared by the floor projections (XY footprints) of two boxes.
pub fn footprint_overlap_area(a: &BoundingBox, b: &BoundingBox) -> u64 {
    let overlap_x = overlap_1d(u64::from(a.min.x), a.max_x(), u64::from(b.min.x), b.max_x());
    let overlap_y = overlap_1d(u64::from(a.min.y), a.max_y(), u64::from(b.min.y), b.max_y());
    overlap_x * overlap_y
}

/// Checks whether `upper` sits at or above the top face of `lower` with their
/// footprints sharing some floor area.
///
/// Contact is not required: a box hovering over another still counts.
pub fn rests_above(upper: &BoundingBox, lower: &BoundingBox) -> bool {
    u64::from(upper.min.z) >= lower.top_z() && footprint_overlap_area(upper, lower) > 0
}

/// Checks whether a point lies inside a box (half-open on every axis).
///
/// A point on the far face of a box is outside it, which is exactly where the next
/// box may start.
pub fn point_inside(point: &Point3, b: &BoundingBox) -> bool {
    let (px, py, pz) = (u64::from(point.x), u64::from(point.y), u64::from(point.z));

    px >= u64::from(b.min.x)
        && px < b.max_x()
        && py >= u64::from(b.min.y)
        && py < b.max_y()
        && pz >= u64::from(b.min.z)
        && pz < b.top_z()
}

/// Checks whether a point can still serve as a box origin in the interior.
pub fn point_within_interior(point: &Point3, interior: &Dims3) -> bool {
    point.x < interior.length && point.y < interior.width && point.z < interior.height
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bx(pos: (u32, u32, u32), dims: (u32, u32, u32)) -> BoundingBox {
        BoundingBox::new(Point3::from(pos), Dims3::new(dims.0, dims.1, dims.2))
    }

    #[test]
    fn overlapping_boxes_intersect() {
        let a = bx((0, 0, 0), (10, 10, 10));
        let b = bx((5, 5, 5), (10, 10, 10));
        assert!(overlaps(&a, &b));
        assert!(overlaps(&b, &a));
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let a = bx((0, 0, 0), (10, 10, 10));
        assert!(!overlaps(&a, &bx((10, 0, 0), (10, 10, 10))));
        assert!(!overlaps(&a, &bx((0, 10, 0), (10, 10, 10))));
        assert!(!overlaps(&a, &bx((0, 0, 10), (10, 10, 10))));
        // edge contact only
        assert!(!overlaps(&a, &bx((10, 10, 0), (10, 10, 10))));
    }

    #[test]
    fn separation_on_one_axis_is_enough() {
        let a = bx((0, 0, 0), (10, 10, 10));
        let b = bx((2, 2, 50), (5, 5, 5));
        assert!(!overlaps(&a, &b));
    }

    #[test]
    fn contained_box_overlaps() {
        let outer = bx((0, 0, 0), (100, 100, 100));
        let inner = bx((10, 10, 10), (1, 1, 1));
        assert!(overlaps(&outer, &inner));
    }

    #[test]
    fn fits_within_respects_every_axis() {
        let truck = Dims3::new(100, 50, 40);
        assert!(fits_within(&bx((0, 0, 0), (100, 50, 40)), &truck));
        assert!(fits_within(&bx((60, 10, 0), (40, 40, 40)), &truck));
        assert!(!fits_within(&bx((61, 0, 0), (40, 10, 10)), &truck));
        assert!(!fits_within(&bx((0, 11, 0), (10, 40, 10)), &truck));
        assert!(!fits_within(&bx((0, 0, 1), (10, 10, 40)), &truck));
    }

    #[test]
    fn rotated_footprint_swaps_horizontal_extents() {
        assert_eq!(rotated_footprint(40, 30), (30, 40));
        assert_eq!(rotated_footprint(25, 25), (25, 25));
    }

    #[test]
    fn overlap_1d_is_never_negative() {
        assert_eq!(overlap_1d(0, 5, 3, 8), 2);
        assert_eq!(overlap_1d(0, 5, 5, 8), 0);
        assert_eq!(overlap_1d(6, 9, 0, 5), 0);
    }

    #[test]
    fn footprint_overlap_ignores_height() {
        let a = bx((0, 0, 0), (10, 10, 10));
        let b = bx((5, 5, 30), (10, 10, 10));
        assert_eq!(footprint_overlap_area(&a, &b), 25);
    }

    #[test]
    fn rests_above_needs_height_and_shared_footprint() {
        let lower = bx((0, 0, 0), (10, 10, 10));
        assert!(rests_above(&bx((5, 5, 10), (10, 10, 10)), &lower));
        assert!(rests_above(&bx((0, 0, 40), (1, 1, 1)), &lower));
        // beside, not above
        assert!(!rests_above(&bx((10, 0, 10), (10, 10, 10)), &lower));
        // below the top face
        assert!(!rests_above(&bx((0, 0, 9), (10, 10, 10)), &lower));
        assert!(!rests_above(&lower, &bx((0, 0, 10), (10, 10, 10))));
    }

    #[test]
    fn point_inside_is_half_open() {
        let b = bx((10, 10, 10), (10, 10, 10));
        assert!(point_inside(&Point3::new(10, 10, 10), &b));
        assert!(point_inside(&Point3::new(19, 19, 19), &b));
        assert!(!point_inside(&Point3::new(20, 10, 10), &b));
        assert!(!point_inside(&Point3::new(10, 10, 20), &b));
    }

    #[test]
    fn interior_points_exclude_far_walls() {
        let truck = Dims3::new(100, 50, 40);
        assert!(point_within_interior(&Point3::new(99, 49, 39), &truck));
        assert!(!point_within_interior(&Point3::new(100, 0, 0), &truck));
        assert!(!point_within_interior(&Point3::new(0, 0, 40), &truck));
    }
}
