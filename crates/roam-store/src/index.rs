//! Spatial index contract.

use async_trait::async_trait;
use roam_core::{Coordinate, DistanceUnit, Indexed, SortOrder, SpatialIndexId};

use crate::error::StoreResult;

/// Spatial index id of entity category `E`.
pub type IndexId<E> = SpatialIndexId<<E as Indexed>::Attributes>;

/// Geo-indexed set of composite ids for one entity category.
///
/// Members are whole [`SpatialIndexId`] values: upserting an id whose
/// attributes differ from an existing member for the same entity adds a
/// second member. Retiring the old one is the caller's job.
#[async_trait]
pub trait SpatialIndex<E: Indexed>: Send + Sync {
    async fn upsert_many(&self, entries: &[(IndexId<E>, Coordinate)]) -> StoreResult<()>;

    async fn remove_many(&self, ids: &[IndexId<E>]) -> StoreResult<()>;

    /// Members within `radius` of `center`, ordered by distance.
    async fn radius(
        &self,
        center: Coordinate,
        radius: f64,
        unit: DistanceUnit,
        order: SortOrder,
    ) -> StoreResult<Vec<IndexId<E>>>;

    async fn list_all(&self) -> StoreResult<Vec<IndexId<E>>>;
}
