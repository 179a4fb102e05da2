//! Placement heuristic for loading one truck.
//!
//! Packages are placed one by one, in the order given by the ordering policy, at
//! "extreme points": the truck origin plus the corners created next to and on top
//! of every box already loaded. For each package the candidate points are scanned
//! lowest first, then toward the back wall, then toward the left side, and at each
//! point the stored footprint is tried before the rotated one. The first position
//! that stays inside the truck, clears every loaded box and keeps sturdy freight
//! off fragile packages wins.
//!
//! The heuristic is greedy and never backtracks: a package that finds no position
//! is reported as unplaced and loading continues with the next one. It is
//! deterministic and polynomial (candidates × loaded boxes × 2 orientations per
//! package), which is what decision support needs; it is not an optimal packer.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::geometry::{fits_within, overlaps, point_inside, point_within_interior, rests_above};
use crate::model::{Package, Placement, TruckType};
use crate::types::{
    BoundingBox, CandidatePoint, Dimensional, Dims3, EPSILON_WEIGHT, Point3,
};

/// Version tag of the extreme-point first-fit heuristic with footprint rotation.
pub const ALGORITHM_VERSION: &str = "ep-first-fit/1.0";

/// Version tag of the same heuristic with footprint rotation switched off.
pub const ALGORITHM_VERSION_NO_ROTATION: &str = "ep-first-fit/1.0-norot";

/// Configuration of the packing heuristic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PackingConfig {
    /// Whether packages may be turned a quarter about the vertical axis.
    pub allow_rotation: bool,
}

impl PackingConfig {
    pub const DEFAULT_ALLOW_ROTATION: bool = true;

    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            allow_rotation: Self::DEFAULT_ALLOW_ROTATION,
        }
    }
}

/// Builder for `PackingConfig`.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn allow_rotation(mut self, allow: bool) -> Self {
        self.config.allow_rotation = allow;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// A package together with the placement the packer chose for it.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedPackage {
    pub placement: Placement,
    pub weight: f64,
    pub fragile: bool,
}

impl PlacedPackage {
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        self.placement.bounding_box()
    }

    #[inline]
    pub fn package_id(&self) -> &str {
        &self.placement.package_id
    }
}

impl Dimensional for PlacedPackage {
    fn dimensions(&self) -> Dims3 {
        self.placement.dims()
    }
}

/// Reasons why a package could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    /// No orientation of the package fits even the empty truck.
    DimensionsExceedTruck,
    /// Loading the package would push the running weight past the truck limit.
    ExceedsWeightLimit,
    /// Every candidate position collides with loaded cargo or leaves the truck.
    NoFeasiblePosition,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::DimensionsExceedTruck => "dimensions_exceed_truck",
            UnplacedReason::ExceedsWeightLimit => "exceeds_weight_limit",
            UnplacedReason::NoFeasiblePosition => "no_feasible_position",
        }
    }
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnplacedReason::DimensionsExceedTruck => write!(
                f,
                "Package does not fit the truck interior in any orientation"
            ),
            UnplacedReason::ExceedsWeightLimit => {
                write!(f, "Package would exceed the truck's weight limit")
            }
            UnplacedReason::NoFeasiblePosition => write!(
                f,
                "No free position inside the truck for this package"
            ),
        }
    }
}

/// A package that could not be placed.
#[derive(Clone, Debug, PartialEq)]
pub struct UnplacedPackage {
    pub package: Package,
    pub reason: UnplacedReason,
}

/// Result of one packing run.
///
/// `placed` is in placement order; `unplaced` is in the order packages were tried.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackingResult {
    pub placed: Vec<PlacedPackage>,
    pub unplaced: Vec<UnplacedPackage>,
}

impl PackingResult {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }

    pub fn placed_weight(&self) -> f64 {
        self.placed.iter().map(|p| p.weight).sum()
    }

    pub fn placed_volume(&self) -> u128 {
        self.placed.iter().map(|p| p.volume()).sum()
    }
}

/// Events emitted while a truck is being loaded, for live visualization.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// Loading of a truck begins.
    PlanStarted {
        truck: (u32, u32, u32),
        max_weight: f64,
        package_count: usize,
    },
    /// A package was placed.
    PackagePlaced {
        package_id: String,
        pos: (u32, u32, u32),
        dims: (u32, u32, u32),
        rotated: bool,
        layer: u32,
        total_weight: f64,
    },
    /// A package could not be placed.
    PackageUnplaced {
        package_id: String,
        weight: f64,
        dims: (u32, u32, u32),
        reason_code: String,
        reason_text: String,
    },
    /// Packing finished.
    Finished { placed: usize, unplaced: usize },
    /// The assembled plan passed verification.
    PlanAssembled {
        status: crate::model::PlanStatus,
        algorithm_version: String,
        util_weight_pct: f64,
        util_volume_pct: f64,
    },
    /// The planning call failed after packing started.
    Failed { error: String },
}

/// A placement heuristic that can be swapped without touching the data model.
///
/// Implementations must be deterministic: the same truck type and sequence must
/// always yield the same result, and `algorithm_version` must change whenever the
/// behaviour does.
pub trait PackingStrategy: Send + Sync {
    /// Tag recorded on every load plan produced with this strategy.
    fn algorithm_version(&self) -> &'static str;

    /// Loads `sequence` into an empty truck of `truck_type`, in the given order.
    fn pack(
        &self,
        truck_type: &TruckType,
        sequence: &[&Package],
        on_event: &mut dyn FnMut(&PackEvent),
    ) -> PackingResult;
}

/// Greedy first-fit packer over extreme points.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtremePointPacker {
    config: PackingConfig,
}

impl ExtremePointPacker {
    pub fn new(config: PackingConfig) -> Self {
        Self { config }
    }

    /// Orientations to try for a package, stored footprint first.
    ///
    /// A square footprint has a single distinct orientation and is never reported
    /// as rotated.
    fn orientations(&self, package: &Package) -> Vec<(Dims3, bool)> {
        let dims = package.dims();
        let mut orientations = vec![(dims, false)];
        if self.config.allow_rotation && dims.length != dims.width {
            orientations.push((dims.rotated(), true));
        }
        orientations
    }
}

impl PackingStrategy for ExtremePointPacker {
    fn algorithm_version(&self) -> &'static str {
        if self.config.allow_rotation {
            ALGORITHM_VERSION
        } else {
            ALGORITHM_VERSION_NO_ROTATION
        }
    }

    fn pack(
        &self,
        truck_type: &TruckType,
        sequence: &[&Package],
        on_event: &mut dyn FnMut(&PackEvent),
    ) -> PackingResult {
        on_event(&PackEvent::PlanStarted {
            truck: truck_type.interior().as_tuple(),
            max_weight: truck_type.max_weight,
            package_count: sequence.len(),
        });

        let mut space = LoadSpace::new(truck_type);
        let mut result = PackingResult::default();

        for &package in sequence {
            let orientations = self.orientations(package);

            let outcome = if !truck_type.can_fit_dimensions(package, self.config.allow_rotation) {
                Err(UnplacedReason::DimensionsExceedTruck)
            } else if space.loaded_weight + package.weight > space.max_weight + EPSILON_WEIGHT {
                Err(UnplacedReason::ExceedsWeightLimit)
            } else {
                space
                    .find_position(&orientations, package.fragile)
                    .ok_or(UnplacedReason::NoFeasiblePosition)
            };

            match outcome {
                Ok((origin, dims, rotated)) => {
                    let layer = space.occupy(package, origin, dims);
                    let placement = Placement::new(package.id.clone(), origin, dims, rotated, layer);
                    tracing::debug!(
                        package_id = %package.id,
                        x = origin.x,
                        y = origin.y,
                        z = origin.z,
                        rotated,
                        layer,
                        "package placed"
                    );
                    on_event(&PackEvent::PackagePlaced {
                        package_id: package.id.clone(),
                        pos: origin.as_tuple(),
                        dims: dims.as_tuple(),
                        rotated,
                        layer,
                        total_weight: space.loaded_weight,
                    });
                    result.placed.push(PlacedPackage {
                        placement,
                        weight: package.weight,
                        fragile: package.fragile,
                    });
                }
                Err(reason) => {
                    tracing::debug!(
                        package_id = %package.id,
                        reason = reason.code(),
                        "package not placed"
                    );
                    on_event(&PackEvent::PackageUnplaced {
                        package_id: package.id.clone(),
                        weight: package.weight,
                        dims: package.dims().as_tuple(),
                        reason_code: reason.code().to_string(),
                        reason_text: reason.to_string(),
                    });
                    result.unplaced.push(UnplacedPackage {
                        package: package.clone(),
                        reason,
                    });
                }
            }
        }

        on_event(&PackEvent::Finished {
            placed: result.placed_count(),
            unplaced: result.unplaced_count(),
        });
        result
    }
}

struct LoadedBox {
    bbox: BoundingBox,
    fragile: bool,
}

/// Working state of one packing run. Private to a single computation.
struct LoadSpace {
    interior: Dims3,
    max_weight: f64,
    loaded_weight: f64,
    boxes: Vec<LoadedBox>,
    candidates: BTreeSet<CandidatePoint>,
    base_heights: BTreeSet<u32>,
}

impl LoadSpace {
    fn new(truck_type: &TruckType) -> Self {
        let mut candidates = BTreeSet::new();
        candidates.insert(CandidatePoint(Point3::origin()));
        Self {
            interior: truck_type.interior(),
            max_weight: truck_type.max_weight,
            loaded_weight: 0.0,
            boxes: Vec::new(),
            candidates,
            base_heights: BTreeSet::new(),
        }
    }

    /// First `(point, orientation)` in scan order that fits and collides with nothing.
    fn find_position(
        &self,
        orientations: &[(Dims3, bool)],
        fragile: bool,
    ) -> Option<(Point3, Dims3, bool)> {
        for candidate in &self.candidates {
            for &(dims, rotated) in orientations {
                let bbox = BoundingBox::new(candidate.0, dims);
                if !fits_within(&bbox, &self.interior) {
                    continue;
                }
                if self.boxes.iter().any(|placed| overlaps(&placed.bbox, &bbox)) {
                    continue;
                }
                if self.crushes_fragile(&bbox, fragile) {
                    continue;
                }
                return Some((candidate.0, dims, rotated));
            }
        }
        None
    }

    /// Whether `bbox` would put non-fragile freight above a fragile package.
    ///
    /// Extreme points are not necessarily supported from below, so a fragile
    /// package could otherwise slip underneath a sturdy box loaded earlier.
    fn crushes_fragile(&self, bbox: &BoundingBox, fragile: bool) -> bool {
        self.boxes
            .iter()
            .filter(|placed| placed.fragile != fragile)
            .any(|placed| {
                if fragile {
                    rests_above(&placed.bbox, bbox)
                } else {
                    rests_above(bbox, &placed.bbox)
                }
            })
    }

    /// Records a placed box, refreshes the candidate set and returns the box's layer.
    ///
    /// The layer is the 1-based rank of the base height among the distinct base
    /// heights used so far; earlier placements keep the layer they were given.
    fn occupy(&mut self, package: &Package, origin: Point3, dims: Dims3) -> u32 {
        let bbox = BoundingBox::new(origin, dims);
        self.boxes.push(LoadedBox {
            bbox,
            fragile: package.fragile,
        });
        self.loaded_weight += package.weight;

        self.candidates.retain(|c| !point_inside(&c.0, &bbox));

        let corners = [
            (
                u64::from(origin.x) + u64::from(dims.length),
                u64::from(origin.y),
                u64::from(origin.z),
            ),
            (
                u64::from(origin.x),
                u64::from(origin.y) + u64::from(dims.width),
                u64::from(origin.z),
            ),
            (
                u64::from(origin.x),
                u64::from(origin.y),
                u64::from(origin.z) + u64::from(dims.height),
            ),
        ];
        for (x, y, z) in corners {
            let (Ok(x), Ok(y), Ok(z)) = (u32::try_from(x), u32::try_from(y), u32::try_from(z))
            else {
                continue;
            };
            let point = Point3::new(x, y, z);
            if !point_within_interior(&point, &self.interior) {
                continue;
            }
            if self.boxes.iter().any(|b| point_inside(&point, &b.bbox)) {
                continue;
            }
            self.candidates.insert(CandidatePoint(point));
        }

        self.base_heights.insert(origin.z);
        self.base_heights.range(..=origin.z).count() as u32
    }
}
