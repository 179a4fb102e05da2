//! Data models for dispatch load planning.
//!
//! This module defines the engine's input snapshots and output records:
//! - `TruckType`, `Truck`: read-only reference data for the vehicle
//! - `Package`: one parcel of a dispatch, with dimensions, weight and fragility
//! - `DispatchRequest`: the unit of work (one truck, all its assigned packages)
//! - `LoadPlan`, `Placement`: the versioned result of one planning run
//!
//! Inputs are immutable snapshots handed over by the storage layer; the engine never
//! changes package or truck status.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{BoundingBox, Dimensional, Dims3, Point3};

/// Validation error for truck and package data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("Truck unavailable: {0}")]
    TruckUnavailable(String),
}

fn validate_dimension(value: u32, name: &str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_weight_value(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_dims(dims: Dims3, subject: &str) -> Result<(), ValidationError> {
    validate_dimension(dims.length, &format!("{} length", subject))?;
    validate_dimension(dims.width, &format!("{} width", subject))?;
    validate_dimension(dims.height, &format!("{} height", subject))?;
    Ok(())
}

/// Interior dimensions and weight limit of a class of trucks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Small Van",
    "length": 260,
    "width": 160,
    "height": 140,
    "max_weight": 2500.0
}))]
pub struct TruckType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub length: u32,
    pub width: u32,
    pub height: u32,
    pub max_weight: f64,
}

impl TruckType {
    /// Creates a truck type after validating the interior and the weight limit.
    ///
    /// # Examples
    /// ```
    /// use load_planner::model::TruckType;
    ///
    /// assert!(TruckType::new(None, 200, 150, 150, 1000.0).is_ok());
    /// assert!(TruckType::new(None, 0, 150, 150, 1000.0).is_err());
    /// ```
    pub fn new(
        name: Option<String>,
        length: u32,
        width: u32,
        height: u32,
        max_weight: f64,
    ) -> Result<Self, ValidationError> {
        let truck_type = Self {
            name,
            length,
            width,
            height,
            max_weight,
        };
        truck_type.validate()?;
        Ok(truck_type)
    }

    /// Checks the invariants of a deserialized record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dims(self.interior(), "Truck")?;
        validate_weight_value(self.max_weight, "Truck max weight")
    }

    #[inline]
    pub fn interior(&self) -> Dims3 {
        Dims3::new(self.length, self.width, self.height)
    }

    /// Checks whether a package fits the empty truck in at least one orientation.
    ///
    /// The rotated footprint is only considered when `allow_rotation` is set.
    pub fn can_fit_dimensions(&self, package: &Package, allow_rotation: bool) -> bool {
        let interior = self.interior();
        let dims = package.dims();
        dims.fits_within(&interior) || (allow_rotation && dims.rotated().fits_within(&interior))
    }
}

impl Dimensional for TruckType {
    fn dimensions(&self) -> Dims3 {
        self.interior()
    }
}

/// Operational status of a truck.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruckStatus {
    #[default]
    Available,
    OutOfService,
}

/// A physical truck. Its type is carried separately in the dispatch snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Truck {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub status: TruckStatus,
}

/// One parcel assigned to a dispatch.
///
/// # Fields
/// * `id` - Unique package identifier (e.g. `PKG12345678`)
/// * `weight` - Weight in the truck type's weight unit
/// * `length`, `width`, `height` - Stored dimensions; only the footprint may be rotated
/// * `fragile` - Nothing non-fragile may rest directly on top of this package
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "PKG10000001",
    "weight": 12.0,
    "length": 40,
    "width": 30,
    "height": 25,
    "fragile": false
}))]
pub struct Package {
    pub id: String,
    pub weight: f64,
    pub length: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub fragile: bool,
}

impl Package {
    /// Creates a package with validation.
    ///
    /// # Examples
    /// ```
    /// use load_planner::model::Package;
    ///
    /// assert!(Package::new("PKG1", 5.0, (10, 20, 30), false).is_ok());
    /// assert!(Package::new("PKG1", -5.0, (10, 20, 30), false).is_err());
    /// ```
    pub fn new(
        id: impl Into<String>,
        weight: f64,
        dims: (u32, u32, u32),
        fragile: bool,
    ) -> Result<Self, ValidationError> {
        let package = Self {
            id: id.into(),
            weight,
            length: dims.0,
            width: dims.1,
            height: dims.2,
            fragile,
        };
        package.validate()?;
        Ok(package)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidIdentity(
                "Package id must not be empty".to_string(),
            ));
        }
        validate_dims(self.dims(), &format!("Package {}", self.id))?;
        validate_weight_value(self.weight, &format!("Package {} weight", self.id))
    }

    #[inline]
    pub fn dims(&self) -> Dims3 {
        Dims3::new(self.length, self.width, self.height)
    }
}

impl Dimensional for Package {
    fn dimensions(&self) -> Dims3 {
        self.dims()
    }
}

/// Snapshot of one dispatch: a truck, its type and every package assigned to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DispatchRequest {
    pub dispatch_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Date, example = "2025-03-14")]
    pub service_date: Option<NaiveDate>,
    /// The truck serving the dispatch. When absent, only the truck type is checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truck: Option<Truck>,
    pub truck_type: TruckType,
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl DispatchRequest {
    /// Rejects snapshots the engine must not plan.
    ///
    /// Checks the truck type, every package, package id uniqueness and the truck's
    /// operational status.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.truck_type.validate()?;

        if let Some(truck) = &self.truck {
            if truck.status == TruckStatus::OutOfService {
                return Err(ValidationError::TruckUnavailable(format!(
                    "Truck {} is out of service",
                    truck.id
                )));
            }
        }

        let mut seen = HashSet::with_capacity(self.packages.len());
        for package in &self.packages {
            package.validate()?;
            if !seen.insert(package.id.as_str()) {
                return Err(ValidationError::InvalidIdentity(format!(
                    "Package id {} appears more than once in dispatch {}",
                    package.id, self.dispatch_id
                )));
            }
        }
        Ok(())
    }
}

/// Completion status of a load plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    /// Every package of the dispatch has a placement.
    Complete,
    /// Some packages could not be placed; see `unplaced_package_ids`.
    Partial,
}

/// Immutable, versioned summary of one planning run for a dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LoadPlan {
    pub dispatch_id: u64,
    #[schema(value_type = String, format = DateTime)]
    pub generated_at: DateTime<Utc>,
    pub algorithm_version: String,
    pub util_weight_pct: f64,
    pub util_volume_pct: f64,
    pub status: PlanStatus,
    #[serde(default)]
    pub unplaced_package_ids: Vec<String>,
}

impl LoadPlan {
    pub fn is_complete(&self) -> bool {
        self.status == PlanStatus::Complete
    }
}

/// Computed position and orientation of one package within one load plan.
///
/// `length`/`width`/`height` are the effective extents after rotation; `rotated`
/// is set when the footprint was turned about the vertical axis relative to the
/// package's stored dimensions. `layer` is 1-based and grows with base height.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Placement {
    pub package_id: String,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub length: u32,
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
    pub layer: u32,
}

impl Placement {
    pub fn new(
        package_id: impl Into<String>,
        origin: Point3,
        dims: Dims3,
        rotated: bool,
        layer: u32,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            x: origin.x,
            y: origin.y,
            z: origin.z,
            length: dims.length,
            width: dims.width,
            height: dims.height,
            rotated,
            layer,
        }
    }

    #[inline]
    pub fn origin(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn dims(&self) -> Dims3 {
        Dims3::new(self.length, self.width, self.height)
    }

    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.origin(), self.dims())
    }
}

impl Dimensional for Placement {
    fn dimensions(&self) -> Dims3 {
        self.dims()
    }
}
