//! # Providers
//!
//! A provider is one operator publishing availability feeds. Its namespace
//! scopes every cache key and every spatial index entry, so two providers
//! never collide even when their upstream ids are identical.

use serde::{Deserialize, Serialize};

// =============================================================================
// Provider Namespace
// =============================================================================

/// Immutable per-provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderNamespace {
    /// Upstream system id (unique across the registry).
    pub system_id: String,

    /// Codespace prefix used in published ids (e.g., "YVO").
    pub codespace: String,

    /// Operator id (e.g., "YVO:Operator:voi").
    pub operator_id: String,

    /// Language used for translated strings.
    pub language: String,
}

impl ProviderNamespace {
    /// Creates a namespace.
    pub fn new(
        system_id: impl Into<String>,
        codespace: impl Into<String>,
        operator_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        ProviderNamespace {
            system_id: system_id.into(),
            codespace: codespace.into(),
            operator_id: operator_id.into(),
            language: language.into(),
        }
    }
}

impl std::fmt::Display for ProviderNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.codespace, self.system_id)
    }
}

// =============================================================================
// Feed Provider (registry entry)
// =============================================================================

/// Static registry entry for a provider.
///
/// ## Attribute Overrides
/// Some operators publish a single vehicle type or pricing plan but never
/// reference it from their vehicle records. Declaring the ids here makes
/// every vehicle of the provider use the first declared id instead of
/// whatever the record carries.
///
/// ```toml
/// [[providers]]
/// system_id = "voioslo"
/// codespace = "YVO"
/// operator_id = "YVO:Operator:voi"
/// language = "nb"
/// vehicle_types = ["YVO:VehicleType:scooter"]
/// pricing_plans = ["YVO:PricingPlan:basic"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedProvider {
    #[serde(flatten)]
    pub namespace: ProviderNamespace,

    /// Fixed vehicle type ids (first one wins).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_types: Option<Vec<String>>,

    /// Fixed pricing plan ids (first one wins).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_plans: Option<Vec<String>>,
}

impl FeedProvider {
    /// Creates a registry entry without overrides.
    pub fn new(namespace: ProviderNamespace) -> Self {
        FeedProvider {
            namespace,
            vehicle_types: None,
            pricing_plans: None,
        }
    }

    /// Returns the provider's system id.
    pub fn system_id(&self) -> &str {
        &self.namespace.system_id
    }

    /// Returns the overriding vehicle type id, if one is declared.
    pub fn vehicle_type_override(&self) -> Option<&str> {
        self.vehicle_types
            .as_ref()
            .and_then(|ids| ids.first())
            .map(String::as_str)
    }

    /// Returns the overriding pricing plan id, if one is declared.
    pub fn pricing_plan_override(&self) -> Option<&str> {
        self.pricing_plans
            .as_ref()
            .and_then(|ids| ids.first())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_use_first_declared_id() {
        let mut provider = FeedProvider::new(ProviderNamespace::new("voioslo", "YVO", "YVO:Operator:voi", "nb"));
        assert!(provider.vehicle_type_override().is_none());

        provider.vehicle_types = Some(vec!["YVO:VehicleType:a".into(), "YVO:VehicleType:b".into()]);
        provider.pricing_plans = Some(vec![]);
        assert_eq!(provider.vehicle_type_override(), Some("YVO:VehicleType:a"));
        assert!(provider.pricing_plan_override().is_none());
    }

    #[test]
    fn test_flattened_toml_shape() {
        let json = r#"{"system_id":"s","codespace":"C","operator_id":"C:Operator:o","language":"en"}"#;
        let provider: FeedProvider = serde_json::from_str(json).unwrap();
        assert_eq!(provider.system_id(), "s");
        assert_eq!(provider.namespace.to_string(), "C/s");
    }
}
