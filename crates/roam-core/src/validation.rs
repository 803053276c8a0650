//! # Validation and Entity Mapping
//!
//! Turns a provider's canonical delivery into the entities of one category.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  map_vehicles / map_stations                                            │
//! │                                                                         │
//! │   1. diffed feed present with data?        no → MissingFeed            │
//! │   2. companion feeds present, non-empty?   no → Missing/EmptyCompanion │
//! │   3. per record: resolve type, plan, coordinate                        │
//! │        ok  → entities                                                   │
//! │        err → rejected (never reaches the diff)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Errors of steps 1 and 2 skip the whole category. Rejections of step 3
//! only drop the record.

use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::feed::{
    require, BikeRecord, Delivery, FeedKind, FeedSnapshot, StationInformationRecord,
    StationStatusRecord,
};
use crate::geo::Coordinate;
use crate::model::{PricingPlan, Station, Vehicle, VehicleType, VehicleTypeAvailability};
use crate::provider::FeedProvider;

/// Valid entities of one snapshot plus the snapshot's freshness metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedBatch<E> {
    pub entities: Vec<E>,
    pub rejected: Vec<ValidationError>,
    pub last_updated: i64,
    pub ttl: u64,
}

// =============================================================================
// Companion Lookups
// =============================================================================

struct Companions<'a> {
    vehicle_types: HashMap<&'a str, &'a VehicleType>,
    pricing_plans: HashMap<&'a str, &'a PricingPlan>,
}

fn companions(delivery: &Delivery) -> CoreResult<Companions<'_>> {
    require(delivery.system_information.as_ref(), FeedKind::SystemInformation)?;

    let vehicle_types = &require(delivery.vehicle_types.as_ref(), FeedKind::VehicleTypes)?.vehicle_types;
    if vehicle_types.is_empty() {
        return Err(CoreError::EmptyCompanionFeed(FeedKind::VehicleTypes));
    }

    let plans = &require(delivery.system_pricing_plans.as_ref(), FeedKind::SystemPricingPlans)?.plans;
    if plans.is_empty() {
        return Err(CoreError::EmptyCompanionFeed(FeedKind::SystemPricingPlans));
    }

    Ok(Companions {
        vehicle_types: vehicle_types.iter().map(|t| (t.id.as_str(), t)).collect(),
        pricing_plans: plans.iter().map(|p| (p.id.as_str(), p)).collect(),
    })
}

fn diffed<T>(snapshot: Option<&FeedSnapshot<T>>, kind: FeedKind) -> CoreResult<(&T, i64, u64)> {
    match snapshot {
        Some(FeedSnapshot {
            last_updated,
            ttl,
            data: Some(data),
        }) => Ok((data, *last_updated, *ttl)),
        _ => Err(CoreError::MissingFeed(kind)),
    }
}

fn station_coordinates(delivery: &Delivery) -> HashMap<&str, Coordinate> {
    delivery
        .station_information
        .as_ref()
        .and_then(|s| s.data.as_ref())
        .map(|data| {
            data.stations
                .iter()
                .map(|s| (s.station_id.as_str(), Coordinate::new(s.lon, s.lat)))
                .filter(|(_, c)| c.is_valid())
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// Vehicles
// =============================================================================

/// Maps the delivery's `free_bike_status` snapshot to vehicles.
pub fn map_vehicles(provider: &FeedProvider, delivery: &Delivery) -> CoreResult<MappedBatch<Vehicle>> {
    let (data, last_updated, ttl) = diffed(delivery.free_bike_status.as_ref(), FeedKind::FreeBikeStatus)?;
    let companions = companions(delivery)?;
    let stations = station_coordinates(delivery);

    let mut seen = HashSet::new();
    let mut entities = Vec::with_capacity(data.bikes.len());
    let mut rejected = Vec::new();

    for bike in &data.bikes {
        match map_vehicle(provider, bike, &companions, &stations) {
            Ok(vehicle) if seen.insert(vehicle.id.clone()) => entities.push(vehicle),
            Ok(vehicle) => rejected.push(ValidationError::DuplicateId { id: vehicle.id }),
            Err(e) => rejected.push(e),
        }
    }

    Ok(MappedBatch {
        entities,
        rejected,
        last_updated,
        ttl,
    })
}

fn map_vehicle(
    provider: &FeedProvider,
    bike: &BikeRecord,
    companions: &Companions<'_>,
    stations: &HashMap<&str, Coordinate>,
) -> Result<Vehicle, ValidationError> {
    let id = &bike.bike_id;
    if id.is_empty() {
        return Err(ValidationError::EmptyId);
    }

    let own = match (bike.lon, bike.lat) {
        (Some(lon), Some(lat)) => Some(Coordinate::new(lon, lat)).filter(Coordinate::is_valid),
        _ => None,
    };
    let coordinate = own
        .or_else(|| {
            bike.station_id
                .as_deref()
                .and_then(|station_id| stations.get(station_id).copied())
        })
        .ok_or_else(|| ValidationError::MissingCoordinate { id: id.clone() })?;

    let vehicle_type_id = provider
        .vehicle_type_override()
        .or(bike.vehicle_type_id.as_deref())
        .ok_or_else(|| ValidationError::MissingVehicleType { id: id.clone() })?;
    let vehicle_type = companions
        .vehicle_types
        .get(vehicle_type_id)
        .ok_or_else(|| ValidationError::UnknownVehicleType {
            id: id.clone(),
            vehicle_type_id: vehicle_type_id.to_string(),
        })?;

    let pricing_plan_id = provider
        .pricing_plan_override()
        .or(bike.pricing_plan_id.as_deref())
        .or(vehicle_type.default_pricing_plan_id.as_deref())
        .ok_or_else(|| ValidationError::MissingPricingPlan { id: id.clone() })?;
    let pricing_plan = companions
        .pricing_plans
        .get(pricing_plan_id)
        .ok_or_else(|| ValidationError::UnknownPricingPlan {
            id: id.clone(),
            pricing_plan_id: pricing_plan_id.to_string(),
        })?;

    Ok(Vehicle {
        id: id.clone(),
        system_id: provider.system_id().to_string(),
        coordinate,
        is_reserved: bike.is_reserved,
        is_disabled: bike.is_disabled,
        vehicle_type: (*vehicle_type).clone(),
        pricing_plan: (*pricing_plan).clone(),
        station_id: bike.station_id.clone(),
        current_range_meters: bike.current_range_meters,
        last_reported: bike.last_reported,
    })
}

// =============================================================================
// Stations
// =============================================================================

/// Maps the delivery's `station_status` snapshot, merged with `station_information`.
pub fn map_stations(provider: &FeedProvider, delivery: &Delivery) -> CoreResult<MappedBatch<Station>> {
    let (data, last_updated, ttl) = diffed(delivery.station_status.as_ref(), FeedKind::StationStatus)?;
    let companions = companions(delivery)?;

    let info = &require(delivery.station_information.as_ref(), FeedKind::StationInformation)?.stations;
    if info.is_empty() {
        return Err(CoreError::EmptyCompanionFeed(FeedKind::StationInformation));
    }
    let info: HashMap<&str, &StationInformationRecord> =
        info.iter().map(|s| (s.station_id.as_str(), s)).collect();

    // A provider with a single vehicle type often leaves per-station counts out.
    let sole_type = if companions.vehicle_types.len() == 1 {
        companions.vehicle_types.values().next().copied()
    } else {
        None
    };

    let mut seen = HashSet::new();
    let mut entities = Vec::with_capacity(data.stations.len());
    let mut rejected = Vec::new();

    for status in &data.stations {
        match map_station(provider, status, &info, &companions, sole_type) {
            Ok(station) if seen.insert(station.id.clone()) => entities.push(station),
            Ok(station) => rejected.push(ValidationError::DuplicateId { id: station.id }),
            Err(e) => rejected.push(e),
        }
    }

    Ok(MappedBatch {
        entities,
        rejected,
        last_updated,
        ttl,
    })
}

fn map_station(
    provider: &FeedProvider,
    status: &StationStatusRecord,
    info: &HashMap<&str, &StationInformationRecord>,
    companions: &Companions<'_>,
    sole_type: Option<&VehicleType>,
) -> Result<Station, ValidationError> {
    let id = &status.station_id;
    if id.is_empty() {
        return Err(ValidationError::EmptyId);
    }

    let information = info
        .get(id.as_str())
        .ok_or_else(|| ValidationError::MissingStationInformation { id: id.clone() })?;
    let coordinate = Some(Coordinate::new(information.lon, information.lat))
        .filter(Coordinate::is_valid)
        .ok_or_else(|| ValidationError::MissingCoordinate { id: id.clone() })?;

    let listed = status.vehicle_types_available.as_deref().unwrap_or_default();
    let vehicle_types_available = match (listed.is_empty(), sole_type) {
        (true, Some(vehicle_type)) => vec![VehicleTypeAvailability {
            vehicle_type: vehicle_type.clone(),
            count: status.num_bikes_available,
        }],
        _ => listed
            .iter()
            .filter_map(|entry| {
                companions
                    .vehicle_types
                    .get(entry.vehicle_type_id.as_str())
                    .map(|vehicle_type| VehicleTypeAvailability {
                        vehicle_type: (*vehicle_type).clone(),
                        count: entry.count,
                    })
            })
            .collect(),
    };

    Ok(Station {
        id: id.clone(),
        system_id: provider.system_id().to_string(),
        name: information.name.clone(),
        coordinate,
        capacity: information.capacity,
        num_bikes_available: status.num_bikes_available,
        num_docks_available: status.num_docks_available,
        is_installed: status.is_installed,
        is_renting: status.is_renting,
        is_returning: status.is_returning,
        vehicle_types_available,
        last_reported: status.last_reported,
    })
}

// =============================================================================
// Previous Ids
// =============================================================================

/// Ids listed in the delivery's `free_bike_status`, or `None` if it has no data.
pub fn vehicle_ids(delivery: &Delivery) -> Option<HashSet<String>> {
    delivery
        .free_bike_status
        .as_ref()
        .and_then(|s| s.data.as_ref())
        .map(|data| data.bikes.iter().map(|b| b.bike_id.clone()).collect())
}

/// Ids listed in the delivery's `station_status`, or `None` if it has no data.
pub fn station_ids(delivery: &Delivery) -> Option<HashSet<String>> {
    delivery
        .station_status
        .as_ref()
        .and_then(|s| s.data.as_ref())
        .map(|data| data.stations.iter().map(|s| s.station_id.clone()).collect())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{
        FreeBikeStatusData, PricingPlansData, StationInformationData, StationStatusData,
        VehicleTypeCount, VehicleTypesData,
    };
    use crate::model::{FormFactor, PropulsionType, SystemInfo};
    use crate::provider::ProviderNamespace;

    fn provider() -> FeedProvider {
        FeedProvider::new(ProviderNamespace::new("voioslo", "YVO", "YVO:Operator:voi", "nb"))
    }

    fn scooter_type(id: &str) -> VehicleType {
        VehicleType {
            id: id.to_string(),
            form_factor: FormFactor::Scooter,
            propulsion_type: PropulsionType::Electric,
            name: None,
            max_range_meters: Some(20_000.0),
            default_pricing_plan_id: Some("basic".to_string()),
        }
    }

    fn bike(id: &str) -> BikeRecord {
        BikeRecord {
            bike_id: id.to_string(),
            lat: Some(59.91),
            lon: Some(10.75),
            is_reserved: false,
            is_disabled: false,
            vehicle_type_id: Some("scooter".to_string()),
            pricing_plan_id: None,
            station_id: None,
            current_range_meters: None,
            last_reported: None,
        }
    }

    fn delivery(bikes: Vec<BikeRecord>) -> Delivery {
        Delivery {
            system_information: Some(FeedSnapshot::new(
                100,
                60,
                SystemInfo {
                    system_id: "voioslo".into(),
                    language: "nb".into(),
                    name: "Voi Oslo".into(),
                    timezone: None,
                    operator: None,
                },
            )),
            vehicle_types: Some(FeedSnapshot::new(
                100,
                60,
                VehicleTypesData {
                    vehicle_types: vec![scooter_type("scooter")],
                },
            )),
            system_pricing_plans: Some(FeedSnapshot::new(
                100,
                60,
                PricingPlansData {
                    plans: vec![PricingPlan {
                        id: "basic".into(),
                        name: "Basic".into(),
                        currency: "NOK".into(),
                        price: 10.0,
                        is_taxable: false,
                    }],
                },
            )),
            free_bike_status: Some(FeedSnapshot::new(120, 30, FreeBikeStatusData { bikes })),
            station_information: None,
            station_status: None,
        }
    }

    #[test]
    fn test_valid_vehicle_uses_type_default_pricing_plan() {
        let batch = map_vehicles(&provider(), &delivery(vec![bike("a")])).unwrap();
        assert_eq!(batch.entities.len(), 1);
        assert_eq!(batch.entities[0].pricing_plan.id, "basic");
        assert_eq!(batch.entities[0].system_id, "voioslo");
        assert_eq!((batch.last_updated, batch.ttl), (120, 30));
    }

    #[test]
    fn test_invalid_records_are_rejected() {
        let mut no_coordinate = bike("no-coord");
        no_coordinate.lat = None;

        let mut unknown_type = bike("unknown-type");
        unknown_type.vehicle_type_id = Some("car".into());

        let mut unknown_plan = bike("unknown-plan");
        unknown_plan.pricing_plan_id = Some("premium".into());

        let batch = map_vehicles(
            &provider(),
            &delivery(vec![bike("ok"), no_coordinate, unknown_type, unknown_plan, bike("ok")]),
        )
        .unwrap();

        assert_eq!(batch.entities.len(), 1);
        assert_eq!(batch.rejected.len(), 4);
        assert!(batch
            .rejected
            .contains(&ValidationError::MissingCoordinate { id: "no-coord".into() }));
        assert!(batch
            .rejected
            .contains(&ValidationError::DuplicateId { id: "ok".into() }));
    }

    #[test]
    fn test_polar_vehicle_is_rejected_alone() {
        let mut polar = bike("polar");
        polar.lat = Some(89.0);

        let batch = map_vehicles(&provider(), &delivery(vec![polar, bike("ok")])).unwrap();
        assert_eq!(batch.entities.len(), 1);
        assert_eq!(batch.entities[0].id, "ok");
        assert_eq!(
            batch.rejected,
            vec![ValidationError::MissingCoordinate { id: "polar".into() }]
        );
    }

    #[test]
    fn test_docked_vehicle_takes_station_coordinate() {
        let mut docked = bike("docked");
        docked.lat = None;
        docked.lon = None;
        docked.station_id = Some("st-1".into());

        let mut d = delivery(vec![docked]);
        d.station_information = Some(FeedSnapshot::new(
            100,
            60,
            StationInformationData {
                stations: vec![StationInformationRecord {
                    station_id: "st-1".into(),
                    name: "Central".into(),
                    lat: 59.5,
                    lon: 10.5,
                    capacity: None,
                }],
            },
        ));

        let batch = map_vehicles(&provider(), &d).unwrap();
        assert_eq!(batch.entities[0].coordinate, Coordinate::new(10.5, 59.5));
    }

    #[test]
    fn test_provider_override_replaces_record_type() {
        let mut p = provider();
        p.vehicle_types = Some(vec!["scooter".into()]);

        let mut record = bike("a");
        record.vehicle_type_id = Some("something-else".into());

        let batch = map_vehicles(&p, &delivery(vec![record])).unwrap();
        assert_eq!(batch.entities[0].vehicle_type.id, "scooter");
    }

    #[test]
    fn test_missing_companion_skips_category() {
        let mut d = delivery(vec![bike("a")]);
        d.vehicle_types = None;
        assert_eq!(
            map_vehicles(&provider(), &d),
            Err(CoreError::MissingCompanionFeed(FeedKind::VehicleTypes))
        );

        let mut d = delivery(vec![bike("a")]);
        d.system_pricing_plans = Some(FeedSnapshot::new(1, 1, PricingPlansData::default()));
        assert_eq!(
            map_vehicles(&provider(), &d),
            Err(CoreError::EmptyCompanionFeed(FeedKind::SystemPricingPlans))
        );

        let mut d = delivery(vec![]);
        d.free_bike_status = None;
        assert_eq!(
            map_vehicles(&provider(), &d),
            Err(CoreError::MissingFeed(FeedKind::FreeBikeStatus))
        );
    }

    #[test]
    fn test_station_gets_sole_vehicle_type_capacity() {
        let mut d = delivery(vec![]);
        d.station_information = Some(FeedSnapshot::new(
            100,
            60,
            StationInformationData {
                stations: vec![StationInformationRecord {
                    station_id: "st-1".into(),
                    name: "Central".into(),
                    lat: 59.5,
                    lon: 10.5,
                    capacity: Some(12),
                }],
            },
        ));
        d.station_status = Some(FeedSnapshot::new(
            100,
            60,
            StationStatusData {
                stations: vec![
                    StationStatusRecord {
                        station_id: "st-1".into(),
                        num_bikes_available: 4,
                        num_docks_available: Some(8),
                        vehicle_types_available: None,
                        is_installed: true,
                        is_renting: true,
                        is_returning: true,
                        last_reported: 99,
                    },
                    StationStatusRecord {
                        station_id: "st-unknown".into(),
                        num_bikes_available: 1,
                        num_docks_available: None,
                        vehicle_types_available: Some(vec![VehicleTypeCount {
                            vehicle_type_id: "scooter".into(),
                            count: 1,
                        }]),
                        is_installed: true,
                        is_renting: true,
                        is_returning: true,
                        last_reported: 99,
                    },
                ],
            },
        ));

        let batch = map_stations(&provider(), &d).unwrap();
        assert_eq!(batch.entities.len(), 1);
        let station = &batch.entities[0];
        assert_eq!(station.vehicle_types_available.len(), 1);
        assert_eq!(station.vehicle_types_available[0].count, 4);
        assert_eq!(
            batch.rejected,
            vec![ValidationError::MissingStationInformation { id: "st-unknown".into() }]
        );
    }

    #[test]
    fn test_previous_ids_include_raw_records() {
        let mut broken = bike("broken");
        broken.lat = None;
        let d = delivery(vec![bike("a"), broken]);

        let ids = vehicle_ids(&d).unwrap();
        assert!(ids.contains("a") && ids.contains("broken"));
        assert!(station_ids(&d).is_none());
    }
}
