//! Load plan assembly.
//!
//! [`LoadPlanner`] runs the whole pipeline for one dispatch: input validation,
//! the aggregate capacity check, the packing sequence, the packer, a final
//! verification of the produced placements and the utilization figures. The
//! result is either a complete or partial plan, or an explicit error; a rejected
//! dispatch never yields placements.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use thiserror::Error;

use crate::capacity::{CapacityKind, CapacityReport, CapacityVerdict, check_capacity};
use crate::geometry::{fits_within, overlaps, rests_above};
use crate::model::{
    DispatchRequest, LoadPlan, Package, Placement, PlanStatus, TruckType, ValidationError,
};
use crate::ordering::packing_sequence;
use crate::packer::{
    ExtremePointPacker, PackEvent, PackingConfig, PackingResult, PackingStrategy,
    PlacedPackage, UnplacedPackage,
};
use crate::types::EPSILON_WEIGHT;
use crate::utilization::compute_utilization;

/// A broken guarantee found while re-checking a packing result.
///
/// These indicate a bug in the packing strategy, never bad input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("package {package_id} extends beyond the truck interior")]
    OutOfBounds { package_id: String },
    #[error("packages {first} and {second} overlap")]
    Overlap { first: String, second: String },
    #[error("placed weight {placed_weight} exceeds the truck limit {max_weight}")]
    WeightExceeded { placed_weight: f64, max_weight: f64 },
    #[error("non-fragile package {above} rests above fragile package {fragile}")]
    FragileCrushed { fragile: String, above: String },
    #[error("package {package_id} is neither placed nor reported unplaced")]
    Unaccounted { package_id: String },
    #[error("package {package_id} is accounted for more than once")]
    DuplicatePlacement { package_id: String },
}

/// Errors returned by a planning call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
    #[error("dispatch exceeds truck {kind} capacity by {excess}")]
    OverCapacity { kind: CapacityKind, excess: f64 },
    #[error("internal invariant violation: {0}")]
    InternalInvariantViolation(#[from] InvariantViolation),
}

/// Everything one successful planning run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedLoad {
    pub load_plan: LoadPlan,
    /// In placement order.
    pub placements: Vec<Placement>,
    pub unplaced: Vec<UnplacedPackage>,
    pub capacity: CapacityReport,
}

impl PlannedLoad {
    pub fn placement_for(&self, package_id: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.package_id == package_id)
    }
}

/// Computes load plans with a fixed packing strategy.
#[derive(Clone, Debug)]
pub struct LoadPlanner<S = ExtremePointPacker> {
    strategy: S,
}

impl LoadPlanner<ExtremePointPacker> {
    pub fn new(config: PackingConfig) -> Self {
        Self {
            strategy: ExtremePointPacker::new(config),
        }
    }
}

impl Default for LoadPlanner<ExtremePointPacker> {
    fn default() -> Self {
        Self::new(PackingConfig::default())
    }
}

impl<S: PackingStrategy> LoadPlanner<S> {
    pub fn with_strategy(strategy: S) -> Self {
        Self { strategy }
    }

    pub fn algorithm_version(&self) -> &'static str {
        self.strategy.algorithm_version()
    }

    /// Plans a dispatch, stamping the plan with the current time.
    pub fn plan(&self, request: &DispatchRequest) -> Result<PlannedLoad, PlanningError> {
        self.plan_at(request, Utc::now())
    }

    /// Plans a dispatch with an explicit generation timestamp.
    ///
    /// With a fixed timestamp the output is fully reproducible.
    pub fn plan_at(
        &self,
        request: &DispatchRequest,
        generated_at: DateTime<Utc>,
    ) -> Result<PlannedLoad, PlanningError> {
        self.plan_with_progress(request, generated_at, &mut |_| {})
    }

    /// Plans a dispatch and reports every packing step to `on_event`.
    ///
    /// A failed call is also reported, as [`PackEvent::Failed`].
    pub fn plan_with_progress(
        &self,
        request: &DispatchRequest,
        generated_at: DateTime<Utc>,
        on_event: &mut dyn FnMut(&PackEvent),
    ) -> Result<PlannedLoad, PlanningError> {
        let span = tracing::info_span!("plan", dispatch_id = request.dispatch_id);
        let _guard = span.enter();

        let outcome = self.assemble(request, generated_at, on_event);
        if let Err(err) = &outcome {
            on_event(&PackEvent::Failed {
                error: err.to_string(),
            });
        }
        outcome
    }

    fn assemble(
        &self,
        request: &DispatchRequest,
        generated_at: DateTime<Utc>,
        on_event: &mut dyn FnMut(&PackEvent),
    ) -> Result<PlannedLoad, PlanningError> {
        request.validate().inspect_err(|err| {
            tracing::warn!(error = %err, "dispatch rejected");
        })?;

        let capacity = check_capacity(&request.truck_type, &request.packages);
        if let CapacityVerdict::OverCapacity { kind, excess } = capacity.verdict {
            tracing::warn!(%kind, excess, "dispatch exceeds truck capacity");
            return Err(PlanningError::OverCapacity { kind, excess });
        }

        let sequence = packing_sequence(&request.packages);
        let result = self.strategy.pack(&request.truck_type, &sequence, on_event);

        verify_plan(&request.truck_type, &request.packages, &result).inspect_err(|violation| {
            tracing::error!(%violation, "packing result failed verification");
        })?;

        let utilization = compute_utilization(&request.truck_type, &result.placed);
        let status = if result.is_complete() {
            PlanStatus::Complete
        } else {
            PlanStatus::Partial
        };

        let load_plan = LoadPlan {
            dispatch_id: request.dispatch_id,
            generated_at,
            algorithm_version: self.algorithm_version().to_string(),
            util_weight_pct: utilization.weight_pct,
            util_volume_pct: utilization.volume_pct,
            status,
            unplaced_package_ids: result
                .unplaced
                .iter()
                .map(|u| u.package.id.clone())
                .collect(),
        };

        on_event(&PackEvent::PlanAssembled {
            status,
            algorithm_version: load_plan.algorithm_version.clone(),
            util_weight_pct: load_plan.util_weight_pct,
            util_volume_pct: load_plan.util_volume_pct,
        });

        if status == PlanStatus::Partial {
            tracing::warn!(
                unplaced = load_plan.unplaced_package_ids.len(),
                "partial plan"
            );
        }
        tracing::info!(
            placed = result.placed_count(),
            unplaced = result.unplaced_count(),
            util_weight_pct = load_plan.util_weight_pct,
            util_volume_pct = load_plan.util_volume_pct,
            algorithm_version = %load_plan.algorithm_version,
            "load plan assembled"
        );

        let PackingResult { placed, unplaced } = result;
        Ok(PlannedLoad {
            load_plan,
            placements: placed.into_iter().map(|p| p.placement).collect(),
            unplaced,
            capacity,
        })
    }

    /// Plans independent dispatches in parallel.
    ///
    /// Results are returned in input order; one failing dispatch does not affect
    /// the others.
    pub fn plan_batch(
        &self,
        requests: &[DispatchRequest],
        generated_at: DateTime<Utc>,
    ) -> Vec<Result<PlannedLoad, PlanningError>> {
        tracing::info!(dispatches = requests.len(), "planning batch");
        requests
            .par_iter()
            .map(|request| self.plan_at(request, generated_at))
            .collect()
    }
}

/// Re-checks a packing result against the guarantees every load plan must hold.
///
/// Checks containment, pairwise non-overlap, the weight limit, that no
/// non-fragile package sits above a fragile one, and that every package is
/// accounted for exactly once.
///
/// Weight and fragility are taken from `packages`, not from what the strategy
/// reported for its placements.
pub fn verify_plan(
    truck_type: &TruckType,
    packages: &[Package],
    result: &PackingResult,
) -> Result<(), InvariantViolation> {
    let interior = truck_type.interior();
    let inputs: HashMap<&str, &Package> = packages.iter().map(|p| (p.id.as_str(), p)).collect();
    let input_of = |placed: &PlacedPackage| inputs.get(placed.package_id()).copied();

    for placed in &result.placed {
        if !fits_within(&placed.bounding_box(), &interior) {
            return Err(InvariantViolation::OutOfBounds {
                package_id: placed.package_id().to_string(),
            });
        }
    }

    for (i, a) in result.placed.iter().enumerate() {
        let a_box = a.bounding_box();
        for b in &result.placed[i + 1..] {
            if overlaps(&a_box, &b.bounding_box()) {
                return Err(InvariantViolation::Overlap {
                    first: a.package_id().to_string(),
                    second: b.package_id().to_string(),
                });
            }
        }
    }

    // Placements of unknown packages are reported by the accounting check below.
    let placed_weight: f64 = result
        .placed
        .iter()
        .filter_map(input_of)
        .map(|package| package.weight)
        .sum();
    if placed_weight > truck_type.max_weight + EPSILON_WEIGHT {
        return Err(InvariantViolation::WeightExceeded {
            placed_weight,
            max_weight: truck_type.max_weight,
        });
    }

    let is_fragile = |placed: &&PlacedPackage| input_of(*placed).is_some_and(|p| p.fragile);
    let is_sturdy = |placed: &&PlacedPackage| input_of(*placed).is_some_and(|p| !p.fragile);
    for fragile in result.placed.iter().filter(is_fragile) {
        let fragile_box = fragile.bounding_box();
        for other in result.placed.iter().filter(is_sturdy) {
            if rests_above(&other.bounding_box(), &fragile_box) {
                return Err(InvariantViolation::FragileCrushed {
                    fragile: fragile.package_id().to_string(),
                    above: other.package_id().to_string(),
                });
            }
        }
    }

    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(packages.len());
    let reported = result
        .placed
        .iter()
        .map(|p| p.package_id())
        .chain(result.unplaced.iter().map(|u| u.package.id.as_str()));
    for id in reported {
        *seen.entry(id).or_default() += 1;
    }
    for package in packages {
        match seen.remove(package.id.as_str()) {
            None => {
                return Err(InvariantViolation::Unaccounted {
                    package_id: package.id.clone(),
                });
            }
            Some(count) if count > 1 => {
                return Err(InvariantViolation::DuplicatePlacement {
                    package_id: package.id.clone(),
                });
            }
            Some(_) => {}
        }
    }
    // Anything left over was never part of the dispatch.
    if let Some(stray) = seen.keys().min() {
        return Err(InvariantViolation::Unaccounted {
            package_id: stray.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Truck, TruckStatus};
    use crate::packer::UnplacedReason;
    use crate::types::{Dims3, Point3};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 6, 0, 0).unwrap()
    }

    fn pkg(id: &str, weight: f64, dims: (u32, u32, u32), fragile: bool) -> Package {
        Package::new(id, weight, dims, fragile).unwrap()
    }

    fn dispatch(truck: (u32, u32, u32, f64), packages: Vec<Package>) -> DispatchRequest {
        DispatchRequest {
            dispatch_id: 42,
            service_date: None,
            truck: None,
            truck_type: TruckType::new(None, truck.0, truck.1, truck.2, truck.3).unwrap(),
            packages,
        }
    }

    fn placed(id: &str, origin: (u32, u32, u32), dims: (u32, u32, u32), weight: f64, fragile: bool) -> PlacedPackage {
        PlacedPackage {
            placement: Placement::new(
                id,
                Point3::from(origin),
                Dims3::new(dims.0, dims.1, dims.2),
                false,
                1,
            ),
            weight,
            fragile,
        }
    }

    #[test]
    fn complete_plan_carries_version_and_timestamp() {
        let request = dispatch(
            (200, 150, 150, 1000.0),
            vec![pkg("A", 40.0, (50, 50, 50), false)],
        );
        let planned = LoadPlanner::default().plan_at(&request, at()).unwrap();

        assert_eq!(planned.load_plan.dispatch_id, 42);
        assert_eq!(planned.load_plan.generated_at, at());
        assert_eq!(planned.load_plan.algorithm_version, "ep-first-fit/1.0");
        assert_eq!(planned.load_plan.status, PlanStatus::Complete);
        assert!(planned.load_plan.unplaced_package_ids.is_empty());
        assert_eq!(planned.placements.len(), 1);
        assert!(planned.capacity.is_feasible());
    }

    #[test]
    fn no_rotation_planner_reports_its_own_version() {
        let planner = LoadPlanner::new(PackingConfig::builder().allow_rotation(false).build());
        let request = dispatch((100, 100, 100, 100.0), vec![pkg("A", 1.0, (10, 10, 10), false)]);
        let planned = planner.plan_at(&request, at()).unwrap();
        assert_eq!(planned.load_plan.algorithm_version, "ep-first-fit/1.0-norot");
    }

    #[test]
    fn very_large_truck_is_planned_without_overflow() {
        let request = dispatch(
            (5_000_000, 5_000_000, 5_000_000, 1000.0),
            vec![pkg("A", 1.0, (10, 10, 10), false)],
        );
        let planned = LoadPlanner::default().plan_at(&request, at()).unwrap();

        assert!(planned.load_plan.is_complete());
        assert_eq!(planned.capacity.truck_volume, 125_000_000_000_000_000_000);
        assert_eq!(planned.load_plan.util_volume_pct, 0.0);
        assert_eq!(planned.load_plan.util_weight_pct, 0.1);
    }

    #[test]
    fn empty_dispatch_is_a_complete_empty_plan() {
        let request = dispatch((100, 100, 100, 100.0), vec![]);
        let planned = LoadPlanner::default().plan_at(&request, at()).unwrap();
        assert!(planned.load_plan.is_complete());
        assert!(planned.placements.is_empty());
        assert_eq!(planned.load_plan.util_volume_pct, 0.0);
        assert_eq!(planned.load_plan.util_weight_pct, 0.0);
    }

    #[test]
    fn invalid_input_yields_no_plan() {
        let mut request = dispatch((100, 100, 100, 100.0), vec![pkg("A", 1.0, (10, 10, 10), false)]);
        request.packages[0].height = 0;

        let err = LoadPlanner::default().plan_at(&request, at()).unwrap_err();
        assert!(matches!(
            err,
            PlanningError::InvalidInput(ValidationError::InvalidDimension(_))
        ));
    }

    #[test]
    fn out_of_service_truck_is_rejected() {
        let mut request = dispatch((100, 100, 100, 100.0), vec![]);
        request.truck = Some(Truck {
            id: 9,
            label: None,
            status: TruckStatus::OutOfService,
        });
        assert!(matches!(
            LoadPlanner::default().plan_at(&request, at()),
            Err(PlanningError::InvalidInput(ValidationError::TruckUnavailable(_)))
        ));
    }

    #[test]
    fn over_capacity_reports_kind_and_excess() {
        let request = dispatch(
            (100, 100, 100, 100.0),
            vec![pkg("A", 150.0, (10, 10, 10), false)],
        );
        match LoadPlanner::default().plan_at(&request, at()) {
            Err(PlanningError::OverCapacity { kind, excess }) => {
                assert_eq!(kind, CapacityKind::Weight);
                assert!((excess - 50.0).abs() < EPSILON_WEIGHT);
            }
            other => panic!("expected over capacity, got {:?}", other),
        }
    }

    #[test]
    fn failure_is_reported_as_event() {
        let request = dispatch(
            (100, 100, 100, 100.0),
            vec![pkg("A", 150.0, (10, 10, 10), false)],
        );
        let mut events = Vec::new();
        let _ = LoadPlanner::default().plan_with_progress(&request, at(), &mut |e| {
            events.push(e.clone())
        });
        assert!(matches!(events.as_slice(), [PackEvent::Failed { .. }]));
    }

    #[test]
    fn progress_ends_with_assembled_plan() {
        let request = dispatch(
            (100, 100, 100, 1000.0),
            vec![
                pkg("A", 20.0, (90, 90, 90), false),
                pkg("B", 10.0, (90, 90, 90), false),
            ],
        );
        let mut events = Vec::new();
        LoadPlanner::default()
            .plan_with_progress(&request, at(), &mut |e| events.push(e.clone()))
            .unwrap();

        assert!(matches!(
            events.last(),
            Some(PackEvent::PlanAssembled {
                status: PlanStatus::Partial,
                ..
            })
        ));
    }

    #[test]
    fn batch_keeps_input_order_and_isolates_failures() {
        let ok = dispatch((100, 100, 100, 100.0), vec![pkg("A", 1.0, (10, 10, 10), false)]);
        let mut heavy = dispatch((100, 100, 100, 100.0), vec![pkg("B", 500.0, (10, 10, 10), false)]);
        heavy.dispatch_id = 43;
        let mut other = ok.clone();
        other.dispatch_id = 44;

        let results = LoadPlanner::default().plan_batch(&[ok, heavy, other], at());
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().load_plan.dispatch_id, 42);
        assert!(matches!(results[1], Err(PlanningError::OverCapacity { .. })));
        assert_eq!(results[2].as_ref().unwrap().load_plan.dispatch_id, 44);
    }

    #[test]
    fn verify_rejects_overlap() {
        let truck = TruckType::new(None, 100, 100, 100, 100.0).unwrap();
        let packages = vec![pkg("A", 1.0, (50, 50, 50), false), pkg("B", 1.0, (50, 50, 50), false)];
        let result = PackingResult {
            placed: vec![
                placed("A", (0, 0, 0), (50, 50, 50), 1.0, false),
                placed("B", (25, 25, 25), (50, 50, 50), 1.0, false),
            ],
            unplaced: vec![],
        };
        assert!(matches!(
            verify_plan(&truck, &packages, &result),
            Err(InvariantViolation::Overlap { .. })
        ));
    }

    #[test]
    fn verify_rejects_out_of_bounds() {
        let truck = TruckType::new(None, 100, 100, 100, 100.0).unwrap();
        let packages = vec![pkg("A", 1.0, (50, 50, 50), false)];
        let result = PackingResult {
            placed: vec![placed("A", (60, 0, 0), (50, 50, 50), 1.0, false)],
            unplaced: vec![],
        };
        assert_eq!(
            verify_plan(&truck, &packages, &result),
            Err(InvariantViolation::OutOfBounds {
                package_id: "A".to_string()
            })
        );
    }

    #[test]
    fn verify_rejects_non_fragile_above_fragile() {
        let truck = TruckType::new(None, 100, 100, 100, 100.0).unwrap();
        let packages = vec![pkg("F", 1.0, (50, 50, 50), true), pkg("N", 1.0, (50, 50, 50), false)];
        let result = PackingResult {
            placed: vec![
                placed("F", (0, 0, 0), (50, 50, 50), 1.0, true),
                placed("N", (40, 40, 50), (50, 50, 50), 1.0, false),
            ],
            unplaced: vec![],
        };
        assert_eq!(
            verify_plan(&truck, &packages, &result),
            Err(InvariantViolation::FragileCrushed {
                fragile: "F".to_string(),
                above: "N".to_string()
            })
        );
    }

    #[test]
    fn verify_allows_fragile_beside_and_above_sturdy() {
        let truck = TruckType::new(None, 100, 100, 100, 100.0).unwrap();
        let packages = vec![pkg("F", 1.0, (50, 50, 50), true), pkg("N", 1.0, (50, 50, 50), false)];
        let result = PackingResult {
            placed: vec![
                placed("N", (0, 0, 0), (50, 50, 50), 1.0, false),
                placed("F", (0, 0, 50), (50, 50, 50), 1.0, true),
            ],
            unplaced: vec![],
        };
        assert_eq!(verify_plan(&truck, &packages, &result), Ok(()));
    }

    #[test]
    fn verify_rejects_excess_weight() {
        let truck = TruckType::new(None, 100, 100, 100, 10.0).unwrap();
        let packages = vec![pkg("A", 11.0, (10, 10, 10), false)];
        let result = PackingResult {
            placed: vec![placed("A", (0, 0, 0), (10, 10, 10), 11.0, false)],
            unplaced: vec![],
        };
        assert!(matches!(
            verify_plan(&truck, &packages, &result),
            Err(InvariantViolation::WeightExceeded { .. })
        ));
    }

    #[test]
    fn verify_uses_input_weight_and_fragility() {
        let truck = TruckType::new(None, 100, 100, 100, 10.0).unwrap();
        let packages = vec![pkg("F", 1.0, (50, 50, 50), true), pkg("N", 1.0, (50, 50, 50), false)];
        // The strategy claims F is sturdy, but the input says otherwise.
        let misreported_fragility = PackingResult {
            placed: vec![
                placed("F", (0, 0, 0), (50, 50, 50), 1.0, false),
                placed("N", (0, 0, 50), (50, 50, 50), 1.0, false),
            ],
            unplaced: vec![],
        };
        assert_eq!(
            verify_plan(&truck, &packages, &misreported_fragility),
            Err(InvariantViolation::FragileCrushed {
                fragile: "F".to_string(),
                above: "N".to_string()
            })
        );

        let heavy = vec![pkg("A", 11.0, (10, 10, 10), false)];
        let misreported_weight = PackingResult {
            placed: vec![placed("A", (0, 0, 0), (10, 10, 10), 0.5, false)],
            unplaced: vec![],
        };
        assert!(matches!(
            verify_plan(&truck, &heavy, &misreported_weight),
            Err(InvariantViolation::WeightExceeded { .. })
        ));
    }

    #[test]
    fn verify_checks_accounting() {
        let truck = TruckType::new(None, 100, 100, 100, 100.0).unwrap();
        let a = pkg("A", 1.0, (10, 10, 10), false);
        let b = pkg("B", 1.0, (10, 10, 10), false);
        let packages = vec![a.clone(), b];

        let missing = PackingResult {
            placed: vec![placed("A", (0, 0, 0), (10, 10, 10), 1.0, false)],
            unplaced: vec![],
        };
        assert_eq!(
            verify_plan(&truck, &packages, &missing),
            Err(InvariantViolation::Unaccounted {
                package_id: "B".to_string()
            })
        );

        let twice = PackingResult {
            placed: vec![
                placed("A", (0, 0, 0), (10, 10, 10), 1.0, false),
                placed("B", (10, 0, 0), (10, 10, 10), 1.0, false),
            ],
            unplaced: vec![UnplacedPackage {
                package: a,
                reason: UnplacedReason::NoFeasiblePosition,
            }],
        };
        assert_eq!(
            verify_plan(&truck, &packages, &twice),
            Err(InvariantViolation::DuplicatePlacement {
                package_id: "A".to_string()
            })
        );
    }
}
