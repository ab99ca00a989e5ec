use std::collections::HashSet;

use regex::Regex;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::errors::ApiError;

use super::types::{EntityType, NormalizedEntity, RawEntity};

/// Why an entity was rejected during normalization. Rejected entities are
/// dropped and logged by the ingestion pipeline; they never abort a batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown entity type: {0}")]
    UnknownType(String),
    #[error("country not enabled: {0}")]
    CountryNotEnabled(String),
    #[error("entity type not enabled: {0}")]
    TypeNotEnabled(String),
}

/// Cleans and canonicalizes raw entity records and derives their identity.
#[derive(Debug, Clone)]
pub struct Normalizer {
    enabled_countries: HashSet<String>,
    enabled_types: HashSet<EntityType>,
    whitespace: Regex,
    disallowed: Regex,
    space_before_punct: Regex,
    punct_without_space: Regex,
}

impl Normalizer {
    pub fn new(countries: &[String], types: &[EntityType]) -> Result<Self, ApiError> {
        Ok(Self {
            enabled_countries: countries.iter().map(|c| c.trim().to_uppercase()).collect(),
            enabled_types: types.iter().copied().collect(),
            whitespace: Regex::new(r"\s+").map_err(ApiError::internal)?,
            disallowed: Regex::new(r"[^\w\s.,;:!?()-]").map_err(ApiError::internal)?,
            space_before_punct: Regex::new(r"\s+([.,;:!?])").map_err(ApiError::internal)?,
            punct_without_space: Regex::new(r"([.,;:!?])(\S)").map_err(ApiError::internal)?,
        })
    }

    /// Collapse whitespace, strip characters outside the punctuation
    /// allow-list, and re-space sentence punctuation.
    pub fn clean_text(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let stripped = self.disallowed.replace_all(text, "");
        let collapsed = self.whitespace.replace_all(&stripped, " ");
        let tightened = self.space_before_punct.replace_all(&collapsed, "${1}");
        let spaced = self
            .punct_without_space
            .replace_all(&tightened, "${1} ${2}");

        spaced.trim().to_string()
    }

    /// Derive the stable identity hash from the (name, country, type)
    /// triplet. Inputs go through the same canonicalization as cleaning so
    /// that normalizing an already-normalized entity yields the same id.
    pub fn entity_id(&self, name: &str, country: &str, entity_type: &str) -> String {
        let key = format!(
            "{}_{}_{}",
            self.clean_text(name).to_lowercase(),
            country.trim().to_lowercase(),
            entity_type.trim().to_lowercase(),
        );
        let digest = Sha256::digest(key.as_bytes());
        hex::encode(digest)[..32].to_string()
    }

    /// Fail-closed validity check: required fields present, country and
    /// type inside the enabled sets.
    pub fn validate(&self, raw: &RawEntity) -> bool {
        self.check(raw).is_ok()
    }

    fn check(&self, raw: &RawEntity) -> Result<(EntityType, String), ValidationError> {
        if raw.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if raw.entity_type.trim().is_empty() {
            return Err(ValidationError::MissingField("type"));
        }
        if raw.country.trim().is_empty() {
            return Err(ValidationError::MissingField("country"));
        }

        let entity_type: EntityType = raw
            .entity_type
            .parse()
            .map_err(|_| ValidationError::UnknownType(raw.entity_type.clone()))?;

        let country = raw.country.trim().to_uppercase();
        if !self.enabled_countries.contains(&country) {
            return Err(ValidationError::CountryNotEnabled(country));
        }
        if !self.enabled_types.contains(&entity_type) {
            return Err(ValidationError::TypeNotEnabled(entity_type.to_string()));
        }

        Ok((entity_type, country))
    }

    /// Validate and canonicalize one raw record.
    pub fn normalize(&self, raw: &RawEntity) -> Result<NormalizedEntity, ValidationError> {
        let (entity_type, country) = self.check(raw)?;

        Ok(NormalizedEntity {
            id: self.entity_id(&raw.name, &raw.country, &raw.entity_type),
            name: self.clean_text(&raw.name),
            entity_type,
            country,
            description: self.clean_text(&raw.description),
            services: raw.services.clone(),
            supported_currencies: raw.supported_currencies.clone(),
            api_available: raw.api_available,
            url: raw.url.trim().to_string(),
            rating: raw.rating.clamp(0.0, 5.0),
            last_updated: raw.last_updated.clone(),
            fees: raw.fees.clone(),
        })
    }

    /// First-occurrence-wins deduplication by derived id, preserving the
    /// order of first occurrence.
    pub fn deduplicate(&self, entities: Vec<RawEntity>) -> Vec<RawEntity> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(entities.len());

        for entity in entities {
            let id = self.entity_id(&entity.name, &entity.country, &entity.entity_type);
            if seen.insert(id) {
                unique.push(entity);
            }
        }

        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_normalizer() -> Normalizer {
        let countries: Vec<String> = ["US", "VE", "MX"].iter().map(|c| c.to_string()).collect();
        let types = vec![
            EntityType::Bank,
            EntityType::Exchange,
            EntityType::Fintech,
            EntityType::CasaCambio,
        ];
        Normalizer::new(&countries, &types).unwrap()
    }

    fn raw(name: &str, entity_type: &str, country: &str) -> RawEntity {
        RawEntity {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            country: country.to_string(),
            ..RawEntity::default()
        }
    }

    #[test]
    fn clean_text_collapses_and_strips() {
        let n = test_normalizer();
        assert_eq!(n.clean_text("Banco   de\tVenezuela"), "Banco de Venezuela");
        assert_eq!(n.clean_text("Rates § via #scraper"), "Rates via scraper");
        assert_eq!(n.clean_text("fees , low .Fast"), "fees, low. Fast");
    }

    #[test]
    fn clean_text_is_idempotent() {
        let n = test_normalizer();
        for text in [
            "Central  bank of Venezuela .Official rates",
            "Multi-currency (USD, VES) wallet!",
            "",
        ] {
            let once = n.clean_text(text);
            assert_eq!(n.clean_text(&once), once);
        }
    }

    #[test]
    fn entity_id_is_stable_and_case_insensitive() {
        let n = test_normalizer();
        let a = n.entity_id("Banco Central de Venezuela", "VE", "bank");
        let b = n.entity_id("banco central de venezuela", "ve", "BANK");
        let c = n.entity_id("Banco  Central de Venezuela", "VE", "bank");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 32);

        let other = n.entity_id("Banco Central de Venezuela", "VE", "fintech");
        assert_ne!(a, other);
    }

    #[test]
    fn validate_fails_closed() {
        let n = test_normalizer();
        assert!(n.validate(&raw("Banesco", "bank", "VE")));
        assert!(!n.validate(&raw("", "bank", "VE")));
        assert!(!n.validate(&raw("Banesco", "", "VE")));
        assert!(!n.validate(&raw("Banesco", "bank", "")));
        assert!(!n.validate(&raw("N26", "bank", "DE")));
        assert!(!n.validate(&raw("Banesco", "broker", "VE")));
        // wallet parses but is not in the enabled set for this normalizer
        assert!(!n.validate(&raw("Reserve", "wallet", "VE")));
    }

    #[test]
    fn invalid_entities_report_the_reason() {
        let n = test_normalizer();
        assert_eq!(
            n.normalize(&raw("", "bank", "VE")),
            Err(ValidationError::MissingField("name"))
        );
        assert_eq!(
            n.normalize(&raw("N26", "bank", "DE")),
            Err(ValidationError::CountryNotEnabled("DE".to_string()))
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let n = test_normalizer();
        let entity = RawEntity {
            name: "Banco § Central  de Venezuela".to_string(),
            entity_type: "Bank".to_string(),
            country: "ve".to_string(),
            description: "Central bank ,official  rates".to_string(),
            services: vec!["exchange_rates".to_string()],
            rating: 5.0,
            ..RawEntity::default()
        };

        let once = n.normalize(&entity).unwrap();
        let as_raw = RawEntity {
            name: once.name.clone(),
            entity_type: once.entity_type.to_string(),
            country: once.country.clone(),
            description: once.description.clone(),
            services: once.services.clone(),
            supported_currencies: once.supported_currencies.clone(),
            api_available: once.api_available,
            url: once.url.clone(),
            rating: once.rating,
            last_updated: once.last_updated.clone(),
            fees: once.fees.clone(),
        };
        let twice = n.normalize(&as_raw).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn deduplicate_keeps_first_occurrence_in_order() {
        let n = test_normalizer();
        let entities = vec![
            raw("Remitly", "fintech", "US"),
            raw("Wise", "fintech", "US"),
            raw("remitly", "fintech", "us"),
            raw("Remitly", "fintech", "MX"),
        ];

        let unique = n.deduplicate(entities);
        let names: Vec<&str> = unique.iter().map(|e| e.name.as_str()).collect();
        // the lowercase duplicate collapses onto the first Remitly; the MX
        // record is a different identity and survives
        assert_eq!(names, vec!["Remitly", "Wise", "Remitly"]);
        assert_eq!(unique[0].country, "US");
    }
}
