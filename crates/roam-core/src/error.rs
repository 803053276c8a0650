//! # Error Types
//!
//! Domain-specific error types for roam-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  roam-core errors (this file)                                          │
//! │  ├── CoreError        - A whole category cannot be synchronized        │
//! │  └── ValidationError  - A single snapshot record is rejected           │
//! │                                                                         │
//! │  roam-store errors (separate crate)                                    │
//! │  └── StoreError       - Cache / index / lock backend failures          │
//! │                                                                         │
//! │  roam-sync errors (separate crate)                                     │
//! │  └── SyncError        - Cycle, config and source failures              │
//! │                                                                         │
//! │  Flow: ValidationError (counted) ── CoreError → SyncError (logged)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `ValidationError` never aborts anything: the record is dropped before
//! the diff and counted. A `CoreError` skips the category for this cycle.

use thiserror::Error;

use crate::feed::FeedKind;

// =============================================================================
// Core Error
// =============================================================================

/// Category-level errors: the dependent entity category is skipped this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The feed being diffed is absent or carries no data.
    #[error("Feed {0} is missing or has no data")]
    MissingFeed(FeedKind),

    /// A companion feed the category depends on is absent or carries no data.
    ///
    /// ## When This Occurs
    /// - Provider has not published `system_information` yet
    /// - `vehicle_types` message arrived with a null `data` block
    #[error("Required companion feed {0} is missing or has no data")]
    MissingCompanionFeed(FeedKind),

    /// A companion feed is present but lists nothing to resolve against.
    #[error("Required companion feed {0} is empty")]
    EmptyCompanionFeed(FeedKind),

    /// A snapshot could not be parsed into its canonical form.
    #[error("Malformed {feed} snapshot: {reason}")]
    MalformedSnapshot { feed: FeedKind, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Per-record rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Record has neither its own coordinate nor a resolvable station.
    #[error("{id} has no coordinate and no resolvable station")]
    MissingCoordinate { id: String },

    /// Record references a vehicle type the provider does not publish.
    #[error("{id} references unknown vehicle type {vehicle_type_id}")]
    UnknownVehicleType { id: String, vehicle_type_id: String },

    /// Record does not reference a vehicle type at all.
    #[error("{id} has no vehicle type")]
    MissingVehicleType { id: String },

    /// Record references a pricing plan the provider does not publish.
    #[error("{id} references unknown pricing plan {pricing_plan_id}")]
    UnknownPricingPlan { id: String, pricing_plan_id: String },

    /// Record does not reference a pricing plan, directly or through its type.
    #[error("{id} has no pricing plan")]
    MissingPricingPlan { id: String },

    /// Station status without a matching station information record.
    #[error("station {id} has no station information")]
    MissingStationInformation { id: String },

    /// Record id is empty.
    #[error("record id is empty")]
    EmptyId,

    /// Record id appeared earlier in the same snapshot.
    #[error("{id} appears more than once in the snapshot")]
    DuplicateId { id: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::MissingCompanionFeed(FeedKind::VehicleTypes);
        assert_eq!(
            err.to_string(),
            "Required companion feed vehicle_types is missing or has no data"
        );

        let err = ValidationError::UnknownPricingPlan {
            id: "YVO:Vehicle:1".to_string(),
            pricing_plan_id: "YVO:PricingPlan:basic".to_string(),
        };
        assert!(err.to_string().contains("YVO:PricingPlan:basic"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let err: CoreError = ValidationError::EmptyId.into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
