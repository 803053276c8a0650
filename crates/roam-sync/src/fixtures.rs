//! Delivery builders shared by the unit tests of this crate.

use roam_core::feed::{
    BikeRecord, FreeBikeStatusData, PricingPlansData, StationInformationData,
    StationInformationRecord, StationStatusData, StationStatusRecord, VehicleTypesData,
};
use roam_core::{
    Delivery, FeedProvider, FeedSnapshot, FormFactor, PricingPlan, PropulsionType,
    ProviderNamespace, SystemInfo, VehicleType,
};

pub const SYSTEM_ID: &str = "voioslo";
pub const LAST_UPDATED: i64 = 1_700_000_000;

pub fn provider() -> FeedProvider {
    FeedProvider::new(ProviderNamespace::new(SYSTEM_ID, "YVO", "YVO:Operator:voi", "nb"))
}

pub fn provider_with_id(system_id: &str) -> FeedProvider {
    FeedProvider::new(ProviderNamespace::new(system_id, "YVO", "YVO:Operator:voi", "nb"))
}

fn vehicle_type(id: &str, propulsion_type: PropulsionType) -> VehicleType {
    VehicleType {
        id: id.to_string(),
        form_factor: FormFactor::Scooter,
        propulsion_type,
        name: None,
        max_range_meters: None,
        default_pricing_plan_id: Some("basic".to_string()),
    }
}

/// An electric scooter north of (10.75, 59.91), offset by its id bytes.
pub fn bike(id: &str) -> BikeRecord {
    let offset = id.bytes().map(f64::from).sum::<f64>() * 0.0001;
    BikeRecord {
        bike_id: id.to_string(),
        lat: Some(59.91 + offset),
        lon: Some(10.75),
        is_reserved: false,
        is_disabled: false,
        vehicle_type_id: Some("electric".to_string()),
        pricing_plan_id: None,
        station_id: None,
        current_range_meters: None,
        last_reported: None,
    }
}

/// Same as [`bike`] but referencing the combustion vehicle type.
pub fn combustion_bike(id: &str) -> BikeRecord {
    BikeRecord {
        vehicle_type_id: Some("combustion".to_string()),
        ..bike(id)
    }
}

/// Delivery with all vehicle companions and the given `free_bike_status` ids.
pub fn vehicles(bikes: Vec<BikeRecord>) -> Delivery {
    Delivery {
        system_information: Some(FeedSnapshot::new(
            LAST_UPDATED,
            60,
            SystemInfo {
                system_id: SYSTEM_ID.to_string(),
                language: "nb".to_string(),
                name: "Voi Oslo".to_string(),
                timezone: Some("Europe/Oslo".to_string()),
                operator: None,
            },
        )),
        vehicle_types: Some(FeedSnapshot::new(
            LAST_UPDATED,
            60,
            VehicleTypesData {
                vehicle_types: vec![
                    vehicle_type("electric", PropulsionType::Electric),
                    vehicle_type("combustion", PropulsionType::Combustion),
                ],
            },
        )),
        system_pricing_plans: Some(FeedSnapshot::new(
            LAST_UPDATED,
            60,
            PricingPlansData {
                plans: vec![PricingPlan {
                    id: "basic".to_string(),
                    name: "Basic".to_string(),
                    currency: "NOK".to_string(),
                    price: 10.0,
                    is_taxable: false,
                }],
            },
        )),
        free_bike_status: Some(FeedSnapshot::new(
            LAST_UPDATED,
            60,
            FreeBikeStatusData { bikes },
        )),
        station_information: None,
        station_status: None,
    }
}

pub fn ids(ids: &[&str]) -> Vec<BikeRecord> {
    ids.iter().map(|id| bike(id)).collect()
}

/// Adds one station with the given id to both station feeds.
pub fn with_station(mut delivery: Delivery, station_id: &str, num_bikes_available: u32) -> Delivery {
    let info = delivery.station_information.get_or_insert_with(|| {
        FeedSnapshot::new(LAST_UPDATED, 60, StationInformationData::default())
    });
    if let Some(data) = info.data.as_mut() {
        data.stations.push(StationInformationRecord {
            station_id: station_id.to_string(),
            name: format!("Station {station_id}"),
            lat: 59.92,
            lon: 10.76,
            capacity: Some(20),
        });
    }

    let status = delivery
        .station_status
        .get_or_insert_with(|| FeedSnapshot::new(LAST_UPDATED, 60, StationStatusData::default()));
    if let Some(data) = status.data.as_mut() {
        data.stations.push(StationStatusRecord {
            station_id: station_id.to_string(),
            num_bikes_available,
            num_docks_available: Some(20 - num_bikes_available),
            vehicle_types_available: Some(vec![roam_core::feed::VehicleTypeCount {
                vehicle_type_id: "electric".to_string(),
                count: num_bikes_available,
            }]),
            is_installed: true,
            is_renting: true,
            is_returning: true,
            last_reported: LAST_UPDATED,
        });
    }
    delivery
}
