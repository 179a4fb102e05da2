//! Key figures for a dispatch snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{DispatchRequest, LoadPlan, PlanStatus};
use crate::types::Dimensional;

/// Utilization of the most recent plan of a dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LatestPlanSummary {
    #[schema(value_type = String, format = DateTime)]
    pub generated_at: DateTime<Utc>,
    pub algorithm_version: String,
    pub status: PlanStatus,
    pub util_weight_pct: f64,
    pub util_volume_pct: f64,
}

impl From<&LoadPlan> for LatestPlanSummary {
    fn from(plan: &LoadPlan) -> Self {
        Self {
            generated_at: plan.generated_at,
            algorithm_version: plan.algorithm_version.clone(),
            status: plan.status,
            util_weight_pct: plan.util_weight_pct,
            util_volume_pct: plan.util_volume_pct,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DispatchSummary {
    pub dispatch_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Date)]
    pub service_date: Option<NaiveDate>,
    pub package_count: usize,
    pub fragile_count: usize,
    pub total_weight: f64,
    pub total_volume: u128,
    pub truck_max_weight: f64,
    pub truck_volume: u128,
    /// `None` while no plan has been generated for the dispatch.
    pub latest_plan: Option<LatestPlanSummary>,
}

/// The newest plan of `dispatch_id` among `plans`.
///
/// Plans of other dispatches are ignored. Among plans with the same timestamp the
/// one listed last wins.
pub fn latest_plan(plans: &[LoadPlan], dispatch_id: u64) -> Option<&LoadPlan> {
    plans
        .iter()
        .filter(|plan| plan.dispatch_id == dispatch_id)
        .max_by_key(|plan| plan.generated_at)
}

/// Summarizes a dispatch snapshot together with the plans stored for it so far.
pub fn summarize(request: &DispatchRequest, plans: &[LoadPlan]) -> DispatchSummary {
    DispatchSummary {
        dispatch_id: request.dispatch_id,
        service_date: request.service_date,
        package_count: request.packages.len(),
        fragile_count: request.packages.iter().filter(|p| p.fragile).count(),
        total_weight: request.packages.iter().map(|p| p.weight).sum(),
        total_volume: request.packages.iter().map(|p| p.volume()).sum(),
        truck_max_weight: request.truck_type.max_weight,
        truck_volume: request.truck_type.volume(),
        latest_plan: latest_plan(plans, request.dispatch_id).map(LatestPlanSummary::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Package, TruckType};
    use chrono::TimeZone;

    fn plan(dispatch_id: u64, hour: u32, util: f64) -> LoadPlan {
        LoadPlan {
            dispatch_id,
            generated_at: Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap(),
            algorithm_version: "ep-first-fit/1.0".to_string(),
            util_weight_pct: util,
            util_volume_pct: util,
            status: PlanStatus::Complete,
            unplaced_package_ids: vec![],
        }
    }

    fn request() -> DispatchRequest {
        DispatchRequest {
            dispatch_id: 5,
            service_date: NaiveDate::from_ymd_opt(2025, 3, 14),
            truck: None,
            truck_type: TruckType::new(Some("Small Van".into()), 260, 160, 140, 2500.0).unwrap(),
            packages: vec![
                Package::new("A", 6.0, (30, 20, 15), false).unwrap(),
                Package::new("B", 12.0, (40, 30, 25), true).unwrap(),
                Package::new("C", 9.0, (35, 25, 20), false).unwrap(),
            ],
        }
    }

    #[test]
    fn counts_packages_and_totals() {
        let summary = summarize(&request(), &[]);
        assert_eq!(summary.package_count, 3);
        assert_eq!(summary.fragile_count, 1);
        assert!((summary.total_weight - 27.0).abs() < 1e-9);
        assert_eq!(summary.total_volume, 9_000 + 30_000 + 17_500);
        assert_eq!(summary.truck_volume, 260 * 160 * 140);
        assert!(summary.latest_plan.is_none());
    }

    #[test]
    fn picks_newest_plan_of_the_dispatch() {
        let plans = vec![plan(5, 6, 10.0), plan(5, 9, 30.0), plan(6, 12, 99.0), plan(5, 7, 20.0)];
        let summary = summarize(&request(), &plans);

        let latest = summary.latest_plan.expect("dispatch 5 has plans");
        assert_eq!(latest.util_weight_pct, 30.0);
    }

    #[test]
    fn same_timestamp_prefers_last_listed() {
        let plans = vec![plan(5, 6, 10.0), plan(5, 6, 11.0)];
        assert_eq!(latest_plan(&plans, 5).map(|p| p.util_weight_pct), Some(11.0));
    }
}
