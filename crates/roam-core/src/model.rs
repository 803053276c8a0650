//! # Domain Entities
//!
//! The two indexed entity categories (vehicles and stations) plus the
//! companion records they resolve against (vehicle types, pricing plans,
//! system information).
//!
//! ## Entity Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Vehicle                              Station                          │
//! │  ├── id, system_id                    ├── id, system_id                │
//! │  ├── coordinate (resolved)            ├── name, coordinate             │
//! │  ├── is_reserved / is_disabled        ├── counts, flags                │
//! │  ├── vehicle_type  ──┐                └── vehicle_types_available ──┐  │
//! │  └── pricing_plan    │                                              │  │
//! │                      ▼                                              ▼  │
//! │               VehicleType { form_factor, propulsion_type, ... }        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities are stored denormalized: a cached vehicle carries its full
//! vehicle type and pricing plan so the read path needs one lookup only.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

// =============================================================================
// Category Enums
// =============================================================================

/// Physical form of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFactor {
    Bicycle,
    CargoBicycle,
    Car,
    Moped,
    Scooter,
    ScooterStanding,
    ScooterSeated,
    Other,
}

impl std::fmt::Display for FormFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FormFactor::Bicycle => "bicycle",
            FormFactor::CargoBicycle => "cargo_bicycle",
            FormFactor::Car => "car",
            FormFactor::Moped => "moped",
            FormFactor::Scooter => "scooter",
            FormFactor::ScooterStanding => "scooter_standing",
            FormFactor::ScooterSeated => "scooter_seated",
            FormFactor::Other => "other",
        };
        f.write_str(s)
    }
}

/// Primary propulsion of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropulsionType {
    Human,
    ElectricAssist,
    Electric,
    Combustion,
    CombustionDiesel,
    Hybrid,
    PlugInHybrid,
    HydrogenFuelCell,
}

impl std::fmt::Display for PropulsionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PropulsionType::Human => "human",
            PropulsionType::ElectricAssist => "electric_assist",
            PropulsionType::Electric => "electric",
            PropulsionType::Combustion => "combustion",
            PropulsionType::CombustionDiesel => "combustion_diesel",
            PropulsionType::Hybrid => "hybrid",
            PropulsionType::PlugInHybrid => "plug_in_hybrid",
            PropulsionType::HydrogenFuelCell => "hydrogen_fuel_cell",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Companion Records
// =============================================================================

/// A vehicle type published in the `vehicle_types` feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleType {
    pub id: String,
    pub form_factor: FormFactor,
    pub propulsion_type: PropulsionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Range on a full charge/tank, required for motorized types upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_range_meters: Option<f64>,

    /// Plan applied to vehicles of this type that reference none themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_pricing_plan_id: Option<String>,
}

/// A pricing plan published in the `system_pricing_plans` feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPlan {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub price: f64,
    pub is_taxable: bool,
}

/// Provider-level metadata from the `system_information` feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub system_id: String,
    pub language: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

// =============================================================================
// Vehicle
// =============================================================================

/// A free-floating or docked vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub system_id: String,

    /// Own position, or the position of the station the vehicle is docked at.
    pub coordinate: Coordinate,

    pub is_reserved: bool,
    pub is_disabled: bool,
    pub vehicle_type: VehicleType,
    pub pricing_plan: PricingPlan,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_range_meters: Option<f64>,

    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reported: Option<i64>,
}

// =============================================================================
// Station
// =============================================================================

/// How many vehicles of one type a station currently offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleTypeAvailability {
    pub vehicle_type: VehicleType,
    pub count: u32,
}

/// A docking station, merged from `station_information` and `station_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub system_id: String,
    pub name: String,
    pub coordinate: Coordinate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,

    pub num_bikes_available: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_docks_available: Option<u32>,

    pub is_installed: bool,
    pub is_renting: bool,
    pub is_returning: bool,
    pub vehicle_types_available: Vec<VehicleTypeAvailability>,

    /// Unix seconds.
    pub last_reported: i64,
}

impl Station {
    /// Sorted, de-duplicated form factors of the vehicle types on offer.
    pub fn available_form_factors(&self) -> Vec<FormFactor> {
        let set: std::collections::BTreeSet<_> = self
            .vehicle_types_available
            .iter()
            .map(|a| a.vehicle_type.form_factor)
            .collect();
        set.into_iter().collect()
    }

    /// Sorted, de-duplicated propulsion types of the vehicle types on offer.
    pub fn available_propulsion_types(&self) -> Vec<PropulsionType> {
        let set: std::collections::BTreeSet<_> = self
            .vehicle_types_available
            .iter()
            .map(|a| a.vehicle_type.propulsion_type)
            .collect();
        set.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle_type(id: &str, form_factor: FormFactor, propulsion_type: PropulsionType) -> VehicleType {
        VehicleType {
            id: id.to_string(),
            form_factor,
            propulsion_type,
            name: None,
            max_range_meters: None,
            default_pricing_plan_id: None,
        }
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&FormFactor::ScooterStanding).unwrap(),
            "\"scooter_standing\""
        );
        let p: PropulsionType = serde_json::from_str("\"electric_assist\"").unwrap();
        assert_eq!(p, PropulsionType::ElectricAssist);
        assert_eq!(PropulsionType::PlugInHybrid.to_string(), "plug_in_hybrid");
    }

    #[test]
    fn test_station_attributes_sorted_and_deduplicated() {
        let station = Station {
            id: "st-1".into(),
            system_id: "sys".into(),
            name: "Central".into(),
            coordinate: Coordinate::new(10.0, 59.0),
            capacity: Some(20),
            num_bikes_available: 7,
            num_docks_available: Some(13),
            is_installed: true,
            is_renting: true,
            is_returning: true,
            vehicle_types_available: vec![
                VehicleTypeAvailability {
                    vehicle_type: vehicle_type("e", FormFactor::Scooter, PropulsionType::Electric),
                    count: 2,
                },
                VehicleTypeAvailability {
                    vehicle_type: vehicle_type("b", FormFactor::Bicycle, PropulsionType::Human),
                    count: 4,
                },
                VehicleTypeAvailability {
                    vehicle_type: vehicle_type("eb", FormFactor::Bicycle, PropulsionType::ElectricAssist),
                    count: 1,
                },
            ],
            last_reported: 0,
        };

        assert_eq!(
            station.available_form_factors(),
            vec![FormFactor::Bicycle, FormFactor::Scooter]
        );
        assert_eq!(
            station.available_propulsion_types(),
            vec![
                PropulsionType::Human,
                PropulsionType::ElectricAssist,
                PropulsionType::Electric
            ]
        );
    }
}
