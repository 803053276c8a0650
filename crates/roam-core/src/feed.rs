//! # Canonical Feed Snapshots
//!
//! Every upstream format version is translated (outside this crate) into
//! one canonical snapshot type per feed kind. The engine only ever sees
//! these types, so it never branches on format version.
//!
//! ## Delivery
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Delivery (one provider, latest snapshot of each kind)                 │
//! │                                                                         │
//! │   system_information ──┐                                               │
//! │   vehicle_types ───────┼── companions (resolve, never diffed)          │
//! │   system_pricing_plans ┘                                               │
//! │   station_information ──── companion for stations + docked vehicles    │
//! │                                                                         │
//! │   free_bike_status ─────── diffed → vehicles                           │
//! │   station_status ───────── diffed → stations                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::{PricingPlan, SystemInfo, VehicleType};

// =============================================================================
// Feed Kind
// =============================================================================

/// The feed kinds the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    SystemInformation,
    VehicleTypes,
    SystemPricingPlans,
    FreeBikeStatus,
    StationInformation,
    StationStatus,
}

impl FeedKind {
    /// All kinds, in the order a spool directory is scanned.
    pub const ALL: [FeedKind; 6] = [
        FeedKind::SystemInformation,
        FeedKind::VehicleTypes,
        FeedKind::SystemPricingPlans,
        FeedKind::FreeBikeStatus,
        FeedKind::StationInformation,
        FeedKind::StationStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::SystemInformation => "system_information",
            FeedKind::VehicleTypes => "vehicle_types",
            FeedKind::SystemPricingPlans => "system_pricing_plans",
            FeedKind::FreeBikeStatus => "free_bike_status",
            FeedKind::StationInformation => "station_information",
            FeedKind::StationStatus => "station_status",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// One parsed feed payload with its freshness metadata.
///
/// `data` is optional: providers occasionally publish a message with a null
/// data block, which the engine treats like an absent feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot<T> {
    /// Unix seconds at which the provider generated the payload.
    pub last_updated: i64,

    /// Seconds the provider promises the payload stays valid.
    pub ttl: u64,

    pub data: Option<T>,
}

impl<T> FeedSnapshot<T> {
    pub fn new(last_updated: i64, ttl: u64, data: T) -> Self {
        FeedSnapshot {
            last_updated,
            ttl,
            data: Some(data),
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

/// Returns the payload of a companion feed, or the error that skips the category.
pub fn require<'a, T>(snapshot: Option<&'a FeedSnapshot<T>>, kind: FeedKind) -> CoreResult<&'a T> {
    snapshot
        .and_then(|s| s.data.as_ref())
        .ok_or(CoreError::MissingCompanionFeed(kind))
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleTypesData {
    pub vehicle_types: Vec<VehicleType>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PricingPlansData {
    pub plans: Vec<PricingPlan>,
}

/// A vehicle as published in `free_bike_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BikeRecord {
    pub bike_id: String,

    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,

    #[serde(default)]
    pub is_reserved: bool,
    #[serde(default)]
    pub is_disabled: bool,

    #[serde(default)]
    pub vehicle_type_id: Option<String>,
    #[serde(default)]
    pub pricing_plan_id: Option<String>,
    #[serde(default)]
    pub station_id: Option<String>,
    #[serde(default)]
    pub current_range_meters: Option<f64>,
    #[serde(default)]
    pub last_reported: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FreeBikeStatusData {
    pub bikes: Vec<BikeRecord>,
}

/// Static station data from `station_information`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationInformationRecord {
    pub station_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,

    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StationInformationData {
    pub stations: Vec<StationInformationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleTypeCount {
    pub vehicle_type_id: String,
    pub count: u32,
}

/// Dynamic station data from `station_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStatusRecord {
    pub station_id: String,
    pub num_bikes_available: u32,

    #[serde(default)]
    pub num_docks_available: Option<u32>,

    #[serde(default)]
    pub vehicle_types_available: Option<Vec<VehicleTypeCount>>,

    pub is_installed: bool,
    pub is_renting: bool,
    pub is_returning: bool,
    pub last_reported: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StationStatusData {
    pub stations: Vec<StationStatusRecord>,
}

// =============================================================================
// Delivery
// =============================================================================

/// Latest snapshot of every feed kind for one provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(default)]
    pub system_information: Option<FeedSnapshot<SystemInfo>>,
    #[serde(default)]
    pub vehicle_types: Option<FeedSnapshot<VehicleTypesData>>,
    #[serde(default)]
    pub system_pricing_plans: Option<FeedSnapshot<PricingPlansData>>,
    #[serde(default)]
    pub free_bike_status: Option<FeedSnapshot<FreeBikeStatusData>>,
    #[serde(default)]
    pub station_information: Option<FeedSnapshot<StationInformationData>>,
    #[serde(default)]
    pub station_status: Option<FeedSnapshot<StationStatusData>>,
}

impl Delivery {
    /// Returns true if no feed kind has been received.
    pub fn is_empty(&self) -> bool {
        self.system_information.is_none()
            && self.vehicle_types.is_none()
            && self.system_pricing_plans.is_none()
            && self.free_bike_status.is_none()
            && self.station_information.is_none()
            && self.station_status.is_none()
    }

    /// Feed kinds present in this delivery.
    pub fn kinds(&self) -> Vec<FeedKind> {
        FeedKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                FeedKind::SystemInformation => self.system_information.is_some(),
                FeedKind::VehicleTypes => self.vehicle_types.is_some(),
                FeedKind::SystemPricingPlans => self.system_pricing_plans.is_some(),
                FeedKind::FreeBikeStatus => self.free_bike_status.is_some(),
                FeedKind::StationInformation => self.station_information.is_some(),
                FeedKind::StationStatus => self.station_status.is_some(),
            })
            .collect()
    }
}

// =============================================================================
// Feed Message (push delivery unit)
// =============================================================================

/// One snapshot of one feed kind, as pushed by a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "feed", content = "snapshot", rename_all = "snake_case")]
pub enum FeedMessage {
    SystemInformation(FeedSnapshot<SystemInfo>),
    VehicleTypes(FeedSnapshot<VehicleTypesData>),
    SystemPricingPlans(FeedSnapshot<PricingPlansData>),
    FreeBikeStatus(FeedSnapshot<FreeBikeStatusData>),
    StationInformation(FeedSnapshot<StationInformationData>),
    StationStatus(FeedSnapshot<StationStatusData>),
}

impl FeedMessage {
    pub fn kind(&self) -> FeedKind {
        match self {
            FeedMessage::SystemInformation(_) => FeedKind::SystemInformation,
            FeedMessage::VehicleTypes(_) => FeedKind::VehicleTypes,
            FeedMessage::SystemPricingPlans(_) => FeedKind::SystemPricingPlans,
            FeedMessage::FreeBikeStatus(_) => FeedKind::FreeBikeStatus,
            FeedMessage::StationInformation(_) => FeedKind::StationInformation,
            FeedMessage::StationStatus(_) => FeedKind::StationStatus,
        }
    }

    /// Replaces the snapshot of this message's kind in `delivery`.
    pub fn apply_to(self, delivery: &mut Delivery) {
        match self {
            FeedMessage::SystemInformation(s) => delivery.system_information = Some(s),
            FeedMessage::VehicleTypes(s) => delivery.vehicle_types = Some(s),
            FeedMessage::SystemPricingPlans(s) => delivery.system_pricing_plans = Some(s),
            FeedMessage::FreeBikeStatus(s) => delivery.free_bike_status = Some(s),
            FeedMessage::StationInformation(s) => delivery.station_information = Some(s),
            FeedMessage::StationStatus(s) => delivery.station_status = Some(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_kind_display_matches_serde() {
        for kind in FeedKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn test_null_data_is_accepted() {
        let snapshot: FeedSnapshot<FreeBikeStatusData> =
            serde_json::from_str(r#"{"last_updated":1700000000,"ttl":60,"data":null}"#).unwrap();
        assert!(!snapshot.has_data());
        assert_eq!(
            require(Some(&snapshot), FeedKind::FreeBikeStatus),
            Err(CoreError::MissingCompanionFeed(FeedKind::FreeBikeStatus))
        );
    }

    #[test]
    fn test_absent_data_field_reads_as_none() {
        let snapshot: FeedSnapshot<SystemInfo> =
            serde_json::from_str(r#"{"last_updated":1700000000,"ttl":60}"#).unwrap();
        assert!(!snapshot.has_data());
    }

    #[test]
    fn test_messages_fold_into_delivery() {
        let mut delivery = Delivery::default();
        assert!(delivery.is_empty());

        let msg = FeedMessage::FreeBikeStatus(FeedSnapshot::new(1, 60, FreeBikeStatusData::default()));
        assert_eq!(msg.kind(), FeedKind::FreeBikeStatus);
        msg.apply_to(&mut delivery);

        let newer = FeedMessage::FreeBikeStatus(FeedSnapshot::new(2, 60, FreeBikeStatusData::default()));
        newer.apply_to(&mut delivery);

        assert_eq!(delivery.kinds(), vec![FeedKind::FreeBikeStatus]);
        assert_eq!(delivery.free_bike_status.as_ref().map(|s| s.last_updated), Some(2));
    }

    #[test]
    fn test_message_wire_shape() {
        let json = r#"{"feed":"vehicle_types","snapshot":{"last_updated":5,"ttl":0,"data":{"vehicle_types":[]}}}"#;
        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind(), FeedKind::VehicleTypes);
    }
}
