//! # Spatial Filters
//!
//! Predicates evaluated against the attributes embedded in a spatial index
//! id, so a radius query can be narrowed without touching the entity store.
//! An absent set means "no constraint"; an empty set matches nothing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{FormFactor, PropulsionType};
use crate::spatial_id::{SpatialIndexId, StationAttributes, VehicleAttributes};

/// Predicate over spatial index ids of one category.
pub trait SpatialFilter<A> {
    fn matches(&self, id: &SpatialIndexId<A>) -> bool;
}

fn allows<T: Eq + std::hash::Hash>(set: &Option<HashSet<T>>, value: &T) -> bool {
    set.as_ref().map_or(true, |s| s.contains(value))
}

fn allows_any<T: Eq + std::hash::Hash>(set: &Option<HashSet<T>>, values: &[T]) -> bool {
    set.as_ref()
        .map_or(true, |s| values.iter().any(|v| s.contains(v)))
}

// =============================================================================
// Namespace Filter
// =============================================================================

/// Optional scoping by provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamespaceFilter {
    #[serde(default)]
    pub codespaces: Option<HashSet<String>>,
    #[serde(default)]
    pub system_ids: Option<HashSet<String>>,
    #[serde(default)]
    pub operator_ids: Option<HashSet<String>>,
}

impl<A> SpatialFilter<A> for NamespaceFilter {
    fn matches(&self, id: &SpatialIndexId<A>) -> bool {
        allows(&self.codespaces, &id.namespace.codespace)
            && allows(&self.system_ids, &id.namespace.system_id)
            && allows(&self.operator_ids, &id.namespace.operator_id)
    }
}

// =============================================================================
// Vehicle Filter
// =============================================================================

/// Vehicle search filter.
///
/// Reserved and disabled vehicles are excluded unless explicitly included.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VehicleFilter {
    #[serde(default, flatten)]
    pub namespace: NamespaceFilter,
    #[serde(default)]
    pub form_factors: Option<HashSet<FormFactor>>,
    #[serde(default)]
    pub propulsion_types: Option<HashSet<PropulsionType>>,
    #[serde(default)]
    pub include_reserved: bool,
    #[serde(default)]
    pub include_disabled: bool,
}

impl SpatialFilter<VehicleAttributes> for VehicleFilter {
    fn matches(&self, id: &SpatialIndexId<VehicleAttributes>) -> bool {
        let attrs = &id.attributes;
        self.namespace.matches(id)
            && allows(&self.form_factors, &attrs.form_factor)
            && allows(&self.propulsion_types, &attrs.propulsion_type)
            && (self.include_reserved || !attrs.reserved)
            && (self.include_disabled || !attrs.disabled)
    }
}

// =============================================================================
// Station Filter
// =============================================================================

/// Station search filter: a station matches if it offers any requested type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StationFilter {
    #[serde(default, flatten)]
    pub namespace: NamespaceFilter,
    #[serde(default)]
    pub available_form_factors: Option<HashSet<FormFactor>>,
    #[serde(default)]
    pub available_propulsion_types: Option<HashSet<PropulsionType>>,
}

impl SpatialFilter<StationAttributes> for StationFilter {
    fn matches(&self, id: &SpatialIndexId<StationAttributes>) -> bool {
        let attrs = &id.attributes;
        self.namespace.matches(id)
            && allows_any(&self.available_form_factors, &attrs.available_form_factors)
            && allows_any(
                &self.available_propulsion_types,
                &attrs.available_propulsion_types,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderNamespace;

    fn vehicle(reserved: bool, disabled: bool, propulsion_type: PropulsionType) -> SpatialIndexId<VehicleAttributes> {
        SpatialIndexId {
            id: "v".into(),
            namespace: ProviderNamespace::new("voioslo", "YVO", "YVO:Operator:voi", "nb"),
            attributes: VehicleAttributes {
                form_factor: FormFactor::Scooter,
                propulsion_type,
                reserved,
                disabled,
            },
        }
    }

    #[test]
    fn test_default_vehicle_filter_hides_reserved_and_disabled() {
        let filter = VehicleFilter::default();
        assert!(filter.matches(&vehicle(false, false, PropulsionType::Electric)));
        assert!(!filter.matches(&vehicle(true, false, PropulsionType::Electric)));
        assert!(!filter.matches(&vehicle(false, true, PropulsionType::Electric)));

        let inclusive = VehicleFilter {
            include_reserved: true,
            include_disabled: true,
            ..Default::default()
        };
        assert!(inclusive.matches(&vehicle(true, true, PropulsionType::Electric)));
    }

    #[test]
    fn test_attribute_sets() {
        let filter = VehicleFilter {
            propulsion_types: Some([PropulsionType::Combustion].into_iter().collect()),
            ..Default::default()
        };
        assert!(!filter.matches(&vehicle(false, false, PropulsionType::Electric)));
        assert!(filter.matches(&vehicle(false, false, PropulsionType::Combustion)));
    }

    #[test]
    fn test_namespace_scoping() {
        let filter = VehicleFilter {
            namespace: NamespaceFilter {
                codespaces: Some(["YTI".to_string()].into_iter().collect()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!filter.matches(&vehicle(false, false, PropulsionType::Electric)));
    }

    #[test]
    fn test_station_filter_matches_any_available_type() {
        let id = SpatialIndexId {
            id: "st".into(),
            namespace: ProviderNamespace::new("bysykkel", "YOS", "YOS:Operator:bysykkel", "nb"),
            attributes: StationAttributes {
                available_form_factors: vec![FormFactor::Bicycle, FormFactor::CargoBicycle],
                available_propulsion_types: vec![PropulsionType::Human],
            },
        };

        let cargo = StationFilter {
            available_form_factors: Some([FormFactor::CargoBicycle].into_iter().collect()),
            ..Default::default()
        };
        let cars = StationFilter {
            available_form_factors: Some([FormFactor::Car].into_iter().collect()),
            ..Default::default()
        };
        assert!(cargo.matches(&id));
        assert!(!cars.matches(&id));
        assert!(StationFilter::default().matches(&id));
    }
}
