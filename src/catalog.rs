//! Reference data: the standard fleet and typical parcel sizes.
//!
//! Dimensions are centimetres and weights pounds, matching the warehouse data the
//! planner is fed with.

use chrono::NaiveDate;

use crate::model::{DispatchRequest, Package, Truck, TruckStatus, TruckType};

/// `(name, length, width, height, max_weight)` of every standard truck type.
const STANDARD_TRUCK_TYPES: [(&str, u32, u32, u32, f64); 3] = [
    ("Small Van", 260, 160, 140, 2500.0),
    ("Medium Box", 400, 200, 180, 6000.0),
    ("Large Box", 600, 240, 240, 12000.0),
];

/// Trucks per standard type in the reference fleet.
pub const TRUCKS_PER_TYPE: usize = 4;

/// `(length, width, height, weight)` of the common parcel size classes.
pub const PACKAGE_SIZE_BUCKETS: [(u32, u32, u32, f64); 7] = [
    (30, 20, 15, 6.0),
    (35, 25, 20, 9.0),
    (40, 30, 25, 12.0),
    (50, 35, 25, 16.0),
    (60, 40, 30, 20.0),
    (70, 45, 35, 24.0),
    (80, 50, 40, 30.0),
];

pub fn standard_truck_types() -> Vec<TruckType> {
    STANDARD_TRUCK_TYPES
        .iter()
        .map(|&(name, length, width, height, max_weight)| TruckType {
            name: Some(name.to_string()),
            length,
            width,
            height,
            max_weight,
        })
        .collect()
}

/// Looks up a standard truck type by name, ignoring case.
pub fn truck_type_by_name(name: &str) -> Option<TruckType> {
    standard_truck_types().into_iter().find(|t| {
        t.name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    })
}

/// Fleet label of the `index`-th truck (1-based) of the `type_index`-th type (1-based).
///
/// ```
/// use load_planner::catalog::truck_label;
///
/// assert_eq!(truck_label("Small Van", 1, 1), "SM-101");
/// assert_eq!(truck_label("Large Box", 3, 4), "LA-304");
/// ```
pub fn truck_label(type_name: &str, type_index: usize, index: usize) -> String {
    let prefix: String = type_name.chars().take(2).collect::<String>().to_uppercase();
    format!("{}-{}{:02}", prefix, type_index, index)
}

/// The reference fleet: [`TRUCKS_PER_TYPE`] available trucks of every standard type.
pub fn standard_fleet() -> Vec<(Truck, TruckType)> {
    let mut fleet = Vec::with_capacity(STANDARD_TRUCK_TYPES.len() * TRUCKS_PER_TYPE);
    for (type_index, truck_type) in standard_truck_types().into_iter().enumerate() {
        let name = truck_type.name.clone().unwrap_or_default();
        for k in 1..=TRUCKS_PER_TYPE {
            let id = (type_index * TRUCKS_PER_TYPE + k) as u64;
            fleet.push((
                Truck {
                    id,
                    label: Some(truck_label(&name, type_index + 1, k)),
                    status: TruckStatus::Available,
                },
                truck_type.clone(),
            ));
        }
    }
    fleet
}

/// Builds a reproducible dispatch of `count` packages drawn from the size buckets.
///
/// Every eighth package is fragile. The same arguments always produce the same
/// dispatch, which makes it suitable for demos and benchmarks.
pub fn sample_dispatch(
    dispatch_id: u64,
    service_date: Option<NaiveDate>,
    truck_type: TruckType,
    count: usize,
) -> DispatchRequest {
    let packages = (0..count)
        .map(|i| {
            let bucket = (i * 3 + dispatch_id as usize) % PACKAGE_SIZE_BUCKETS.len();
            let (length, width, height, weight) = PACKAGE_SIZE_BUCKETS[bucket];
            Package {
                id: format!("PKG{:04}{:04}", dispatch_id, i),
                weight,
                length,
                width,
                height,
                fragile: i % 8 == 7,
            }
        })
        .collect();

    DispatchRequest {
        dispatch_id,
        service_date,
        truck: None,
        truck_type,
        packages,
    }
}
