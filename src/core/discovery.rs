//! LM-008: Discovery — an injected map from logical id to live reference.
//!
//! The compiler knows every dependency of a function, so it writes that map
//! into the function's environment instead of letting handler code inspect
//! deployed infrastructure. Handler code reads it once at startup with
//! [`DiscoveryInfo::from_env`] and keeps the immutable result.

use super::error::DiscoveryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Environment variable carrying the serialized mapping.
pub const DISCOVERY_VAR: &str = "LAMINA_DISCOVERY";

/// One resource a function depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    /// Provider type name, e.g. `AWS::DynamoDB::Table`
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Live reference (physical name or ARN) once deployed
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Logical id → live reference, resolved once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryInfo {
    resources: BTreeMap<String, DiscoveredResource>,
}

impl DiscoveryInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        logical_id: impl Into<String>,
        resource_type: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        self.resources.insert(
            logical_id.into(),
            DiscoveredResource {
                resource_type: resource_type.into(),
                reference: reference.into(),
            },
        );
        self
    }

    pub fn get(&self, logical_id: &str) -> Option<&DiscoveredResource> {
        self.resources.get(logical_id)
    }

    /// Resources of one provider type, by logical id.
    pub fn of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a DiscoveredResource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
            .map(|(id, r)| (id.as_str(), r))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DiscoveredResource)> {
        self.resources.iter().map(|(id, r)| (id.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Template-side form: every reference becomes a `${LogicalId}`
    /// substitution, resolved by the provider at deploy time.
    pub fn to_substitution(&self) -> String {
        let placeholders: BTreeMap<&str, DiscoveredResource> = self
            .resources
            .iter()
            .map(|(id, r)| {
                (
                    id.as_str(),
                    DiscoveredResource {
                        resource_type: r.resource_type.clone(),
                        reference: format!("${{{}}}", id),
                    },
                )
            })
            .collect();
        // A map of plain strings always serializes.
        serde_json::to_string(&placeholders).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(json: &str) -> Result<Self, DiscoveryError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from an explicit set of variables (tests, custom runtimes).
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, DiscoveryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        vars.into_iter()
            .find(|(k, _)| k.as_ref() == DISCOVERY_VAR)
            .ok_or(DiscoveryError::Missing(DISCOVERY_VAR))
            .and_then(|(_, v)| Self::from_json(v.as_ref()))
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, DiscoveryError> {
        Self::from_vars(std::env::vars())
    }
}
