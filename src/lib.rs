//! Load planning engine for delivery trucks.
//!
//! Given a truck type and the packages of one dispatch, the engine decides where
//! every package goes inside the truck and how much of the truck's weight and
//! volume capacity the load uses. Planning is deterministic: the same snapshot and
//! timestamp always produce the same [`model::LoadPlan`] and placements.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use load_planner::model::{DispatchRequest, Package, PlanStatus, TruckType};
//! use load_planner::planner::LoadPlanner;
//!
//! let request = DispatchRequest {
//!     dispatch_id: 1,
//!     service_date: None,
//!     truck: None,
//!     truck_type: TruckType::new(None, 200, 150, 150, 1000.0).unwrap(),
//!     packages: vec![Package::new("A", 40.0, (50, 50, 50), false).unwrap()],
//! };
//! let at = Utc.with_ymd_and_hms(2025, 3, 14, 6, 0, 0).unwrap();
//! let planned = LoadPlanner::default().plan_at(&request, at).unwrap();
//!
//! assert_eq!(planned.load_plan.status, PlanStatus::Complete);
//! assert_eq!(planned.load_plan.util_volume_pct, 2.78);
//! ```

pub mod api;
pub mod capacity;
pub mod catalog;
pub mod config;
pub mod geometry;
pub mod model;
pub mod ordering;
pub mod packer;
pub mod planner;
pub mod summary;
pub mod types;
pub mod utilization;

pub use model::{DispatchRequest, LoadPlan, Package, Placement, PlanStatus, TruckType};
pub use packer::{ALGORITHM_VERSION, PackingConfig, PackingStrategy};
pub use planner::{LoadPlanner, PlannedLoad, PlanningError};
