//! Aggregate capacity pre-check for a dispatch.
//!
//! The check is a cheap guard run before any placement attempt. It never rejects a
//! package set that could be loaded, but passing it does not prove that a 3D
//! arrangement exists; only the packer can show that.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{Package, TruckType};
use crate::types::{Dimensional, EPSILON_WEIGHT};

/// The truck limit that an aggregate exceeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityKind {
    Weight,
    Volume,
}

impl std::fmt::Display for CapacityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityKind::Weight => write!(f, "WEIGHT"),
            CapacityKind::Volume => write!(f, "VOLUME"),
        }
    }
}

/// Outcome of the aggregate check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityVerdict {
    Feasible,
    /// `excess` is the aggregate minus the limit, in weight units or cubic length units.
    OverCapacity { kind: CapacityKind, excess: f64 },
}

/// Totals of a candidate package set next to the truck's limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CapacityReport {
    pub total_weight: f64,
    pub total_volume: u128,
    pub max_weight: f64,
    pub truck_volume: u128,
    pub verdict: CapacityVerdict,
}

impl CapacityReport {
    pub fn is_feasible(&self) -> bool {
        matches!(self.verdict, CapacityVerdict::Feasible)
    }
}

/// Compares the summed weight and volume of `packages` against the truck type.
///
/// Weight is checked before volume, so a set that exceeds both limits is reported
/// as a weight problem.
///
/// # Examples
/// ```
/// use load_planner::capacity::{check_capacity, CapacityKind, CapacityVerdict};
/// use load_planner::model::{Package, TruckType};
///
/// let truck = TruckType::new(None, 100, 100, 100, 100.0).unwrap();
/// let heavy = Package::new("P1", 150.0, (10, 10, 10), false).unwrap();
/// let report = check_capacity(&truck, &[heavy]);
/// assert_eq!(
///     report.verdict,
///     CapacityVerdict::OverCapacity { kind: CapacityKind::Weight, excess: 50.0 }
/// );
/// ```
pub fn check_capacity(truck_type: &TruckType, packages: &[Package]) -> CapacityReport {
    let total_weight: f64 = packages.iter().map(|p| p.weight).sum();
    let total_volume: u128 = packages.iter().map(|p| p.volume()).sum();
    let truck_volume = truck_type.volume();

    let verdict = if total_weight > truck_type.max_weight + EPSILON_WEIGHT {
        CapacityVerdict::OverCapacity {
            kind: CapacityKind::Weight,
            excess: total_weight - truck_type.max_weight,
        }
    } else if total_volume > truck_volume {
        CapacityVerdict::OverCapacity {
            kind: CapacityKind::Volume,
            excess: (total_volume - truck_volume) as f64,
        }
    } else {
        CapacityVerdict::Feasible
    };

    CapacityReport {
        total_weight,
        total_volume,
        max_weight: truck_type.max_weight,
        truck_volume,
        verdict,
    }
}
