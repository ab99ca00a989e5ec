use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of institution categories the index understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Bank,
    Exchange,
    Fintech,
    CasaCambio,
    Wallet,
    Defi,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Bank => "bank",
            EntityType::Exchange => "exchange",
            EntityType::Fintech => "fintech",
            EntityType::CasaCambio => "casa_cambio",
            EntityType::Wallet => "wallet",
            EntityType::Defi => "defi",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bank" => Ok(EntityType::Bank),
            "exchange" => Ok(EntityType::Exchange),
            "fintech" => Ok(EntityType::Fintech),
            "casa_cambio" => Ok(EntityType::CasaCambio),
            "wallet" => Ok(EntityType::Wallet),
            "defi" => Ok(EntityType::Defi),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// An entity record exactly as a source connector hands it over.
///
/// Everything is optional or free-form here; validation happens in the
/// normalizer, and identity is always derived, never carried in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawEntity {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub supported_currencies: Vec<String>,
    #[serde(default)]
    pub api_available: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub fees: serde_json::Value,
}

/// A validated, cleaned entity with its derived identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedEntity {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub country: String,
    pub description: String,
    pub services: Vec<String>,
    pub supported_currencies: Vec<String>,
    pub api_available: bool,
    pub url: String,
    pub rating: f64,
    pub last_updated: String,
    pub fees: serde_json::Value,
}

impl NormalizedEntity {
    pub fn metadata(&self) -> EntityMetadata {
        EntityMetadata {
            name: self.name.clone(),
            entity_type: self.entity_type,
            country: self.country.clone(),
            api_available: self.api_available,
            url: self.url.clone(),
        }
    }
}

/// The small metadata projection persisted alongside each indexed record.
/// Deliberately not the full entity; always re-derivable from the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub country: String,
    pub api_available: bool,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_round_trips_through_strings() {
        for raw in ["bank", "exchange", "fintech", "casa_cambio", "wallet", "defi"] {
            let parsed: EntityType = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
        assert!("broker".parse::<EntityType>().is_err());
        assert_eq!("  Bank ".parse::<EntityType>().unwrap(), EntityType::Bank);
    }

    #[test]
    fn raw_entity_deserializes_with_missing_fields() {
        let raw: RawEntity =
            serde_json::from_str(r#"{"name": "Banesco", "type": "bank", "country": "VE"}"#)
                .unwrap();
        assert_eq!(raw.name, "Banesco");
        assert_eq!(raw.entity_type, "bank");
        assert!(!raw.api_available);
        assert!(raw.services.is_empty());
    }
}
