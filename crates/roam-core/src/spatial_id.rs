//! # Cache Keys and Spatial Index Ids
//!
//! Two identities exist for every indexed entity:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CacheKey        = (id, system_id)                "bike-1_voioslo"      │
//! │                    stable for the entity's lifetime                     │
//! │                                                                         │
//! │  SpatialIndexId  = (id, namespace, attributes)                          │
//! │                    changes whenever an embedded attribute changes       │
//! │                                                                         │
//! │  reserved flips false → true:                                           │
//! │    CacheKey        bike-1_voioslo            (same)                     │
//! │    SpatialIndexId  {bike-1, ns, reserved=false}  → retired              │
//! │                    {bike-1, ns, reserved=true}   → inserted             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The attribute set for each category is declared exactly once, in
//! [`VehicleAttributes`] and [`StationAttributes`]. The writer
//! ([`Indexed::spatial_index_id`]) and the filters both read those structs,
//! so they cannot disagree about what an id carries.

use std::fmt::Debug;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::model::{FormFactor, PropulsionType, Station, Vehicle};
use crate::provider::ProviderNamespace;

// =============================================================================
// Cache Key
// =============================================================================

/// Globally unique cache key of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub id: String,
    pub system_id: String,
}

impl CacheKey {
    pub fn new(id: impl Into<String>, system_id: impl Into<String>) -> Self {
        CacheKey {
            id: id.into(),
            system_id: system_id.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.id, self.system_id)
    }
}

// =============================================================================
// Spatial Index Id
// =============================================================================

/// Composite spatial index member: entity id, full namespace, current attributes.
///
/// Equality is structural over every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialIndexId<A> {
    pub id: String,
    pub namespace: ProviderNamespace,
    pub attributes: A,
}

impl<A> SpatialIndexId<A> {
    /// Key of the cache entry backing this index member.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.id.clone(), self.namespace.system_id.clone())
    }
}

/// Filterable vehicle attributes embedded in its index id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleAttributes {
    pub form_factor: FormFactor,
    pub propulsion_type: PropulsionType,
    pub reserved: bool,
    pub disabled: bool,
}

/// Filterable station attributes embedded in its index id.
///
/// Both lists are sorted and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationAttributes {
    pub available_form_factors: Vec<FormFactor>,
    pub available_propulsion_types: Vec<PropulsionType>,
}

pub type VehicleSpatialIndexId = SpatialIndexId<VehicleAttributes>;
pub type StationSpatialIndexId = SpatialIndexId<StationAttributes>;

// =============================================================================
// Indexed Trait
// =============================================================================

/// An entity category that lives in both the entity store and a spatial index.
pub trait Indexed: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Attributes embedded in the category's spatial index ids.
    type Attributes: Clone + Debug + Eq + Hash + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Category name, used in log fields and backend key prefixes.
    const CATEGORY: &'static str;

    fn id(&self) -> &str;
    fn system_id(&self) -> &str;
    fn coordinate(&self) -> Coordinate;
    fn attributes(&self) -> Self::Attributes;

    fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.id(), self.system_id())
    }

    fn spatial_index_id(&self, namespace: &ProviderNamespace) -> SpatialIndexId<Self::Attributes> {
        SpatialIndexId {
            id: self.id().to_string(),
            namespace: namespace.clone(),
            attributes: self.attributes(),
        }
    }
}

impl Indexed for Vehicle {
    type Attributes = VehicleAttributes;
    const CATEGORY: &'static str = "vehicles";

    fn id(&self) -> &str {
        &self.id
    }

    fn system_id(&self) -> &str {
        &self.system_id
    }

    fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    fn attributes(&self) -> VehicleAttributes {
        VehicleAttributes {
            form_factor: self.vehicle_type.form_factor,
            propulsion_type: self.vehicle_type.propulsion_type,
            reserved: self.is_reserved,
            disabled: self.is_disabled,
        }
    }
}

impl Indexed for Station {
    type Attributes = StationAttributes;
    const CATEGORY: &'static str = "stations";

    fn id(&self) -> &str {
        &self.id
    }

    fn system_id(&self) -> &str {
        &self.system_id
    }

    fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    fn attributes(&self) -> StationAttributes {
        StationAttributes {
            available_form_factors: self.available_form_factors(),
            available_propulsion_types: self.available_propulsion_types(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace() -> ProviderNamespace {
        ProviderNamespace::new("voioslo", "YVO", "YVO:Operator:voi", "nb")
    }

    fn attrs(reserved: bool) -> VehicleAttributes {
        VehicleAttributes {
            form_factor: FormFactor::Scooter,
            propulsion_type: PropulsionType::Electric,
            reserved,
            disabled: false,
        }
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(CacheKey::new("bike-1", "voioslo").to_string(), "bike-1_voioslo");
    }

    #[test]
    fn test_attribute_change_yields_different_id() {
        let a = SpatialIndexId {
            id: "bike-1".to_string(),
            namespace: namespace(),
            attributes: attrs(false),
        };
        let b = SpatialIndexId {
            attributes: attrs(true),
            ..a.clone()
        };
        assert_ne!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_same_id_different_provider_does_not_collide() {
        let a = SpatialIndexId {
            id: "bike-1".to_string(),
            namespace: namespace(),
            attributes: attrs(false),
        };
        let b = SpatialIndexId {
            namespace: ProviderNamespace::new("tieroslo", "YTI", "YTI:Operator:tier", "nb"),
            ..a.clone()
        };
        assert_ne!(a, b);
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_json_encoding_is_stable() {
        let id = SpatialIndexId {
            id: "bike-1".to_string(),
            namespace: namespace(),
            attributes: attrs(false),
        };
        let first = serde_json::to_string(&id).unwrap();
        let second = serde_json::to_string(&id.clone()).unwrap();
        assert_eq!(first, second);

        let back: VehicleSpatialIndexId = serde_json::from_str(&first).unwrap();
        assert_eq!(back, id);
    }
}
