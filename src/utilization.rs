//! Weight and volume utilization of a load.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::TruckType;
use crate::packer::PlacedPackage;
use crate::types::Dimensional;

/// Utilization percentages, rounded to two decimals and clamped to `[0, 100]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Utilization {
    pub weight_pct: f64,
    pub volume_pct: f64,
}

/// Share of the truck's weight limit and interior volume used by the placed packages.
///
/// Only placed packages count; unplaced ones never contribute.
pub fn compute_utilization(truck_type: &TruckType, placed: &[PlacedPackage]) -> Utilization {
    let placed_weight: f64 = placed.iter().map(|p| p.weight).sum();
    let placed_volume: u128 = placed.iter().map(|p| p.volume()).sum();

    Utilization {
        weight_pct: percent(placed_weight, truck_type.max_weight),
        volume_pct: percent(placed_volume as f64, truck_type.volume() as f64),
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    let pct = (part / whole * 100.0).clamp(0.0, 100.0);
    (pct * 100.0).round() / 100.0
}
