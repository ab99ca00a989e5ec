//! Concrete entity sources.
//!
//! Seed sources carry the built-in Venezuela panel and the major
//! remittance services; directory sources pull raw entity records from a
//! configured remote JSON endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::core::config::settings::CollectionSettings;
use crate::core::errors::ApiError;
use crate::entity::RawEntity;

use super::EntitySource;

/// Venezuela-specific panel: the central bank, rate monitors, and the
/// exchange houses most relevant for the parallel market.
pub struct VenezuelaSource;

#[async_trait]
impl EntitySource for VenezuelaSource {
    fn source_id(&self) -> &str {
        "venezuela"
    }

    async fn fetch(&self) -> Result<Vec<RawEntity>, ApiError> {
        let mut entities = vec![
            RawEntity {
                name: "Banco Central de Venezuela".to_string(),
                entity_type: "bank".to_string(),
                country: "VE".to_string(),
                description: "Central bank of Venezuela, provides official exchange rates"
                    .to_string(),
                services: vec!["exchange_rates".to_string(), "monetary_policy".to_string()],
                supported_currencies: vec![
                    "VES".to_string(),
                    "USD".to_string(),
                    "EUR".to_string(),
                ],
                api_available: false,
                url: "http://www.bcv.org.ve".to_string(),
                rating: 5.0,
                ..RawEntity::default()
            },
            RawEntity {
                name: "Monitor Dolar Venezuela".to_string(),
                entity_type: "fintech".to_string(),
                country: "VE".to_string(),
                description: "Real-time monitoring of exchange rates in Venezuela".to_string(),
                services: vec!["exchange_rates".to_string(), "parallel_market".to_string()],
                supported_currencies: vec!["VES".to_string(), "USD".to_string()],
                api_available: true,
                url: "https://monitordolarvenezuela.com".to_string(),
                rating: 4.5,
                ..RawEntity::default()
            },
            RawEntity {
                name: "Reserve".to_string(),
                entity_type: "fintech".to_string(),
                country: "VE".to_string(),
                description: "Venezuelan digital wallet and exchange platform".to_string(),
                services: vec![
                    "wallet".to_string(),
                    "exchange".to_string(),
                    "remittances".to_string(),
                ],
                url: "https://reserve.org".to_string(),
                ..ve_defaults()
            },
            RawEntity {
                name: "Italcambio".to_string(),
                entity_type: "casa_cambio".to_string(),
                country: "VE".to_string(),
                description: "Currency exchange house in Venezuela".to_string(),
                services: vec!["currency_exchange".to_string(), "remittances".to_string()],
                url: "https://italcambio.com".to_string(),
                ..ve_defaults()
            },
            RawEntity {
                name: "Binance P2P Venezuela".to_string(),
                entity_type: "exchange".to_string(),
                country: "VE".to_string(),
                description: "Peer-to-peer cryptocurrency trading in Venezuela".to_string(),
                services: vec!["p2p_trading".to_string(), "crypto_exchange".to_string()],
                url: "https://p2p.binance.com".to_string(),
                ..ve_defaults()
            },
        ];

        let now = Utc::now().to_rfc3339();
        for entity in &mut entities {
            entity.last_updated = now.clone();
        }

        Ok(entities)
    }
}

fn ve_defaults() -> RawEntity {
    RawEntity {
        supported_currencies: vec!["VES".to_string(), "USD".to_string()],
        api_available: false,
        rating: 4.0,
        ..RawEntity::default()
    }
}

/// The major remittance corridors into Latin America.
pub struct RemittanceSource;

#[async_trait]
impl EntitySource for RemittanceSource {
    fn source_id(&self) -> &str {
        "remittance"
    }

    async fn fetch(&self) -> Result<Vec<RawEntity>, ApiError> {
        let mut entities = vec![
            RawEntity {
                name: "Western Union".to_string(),
                country: "US".to_string(),
                description: "Global money transfer and remittance service".to_string(),
                services: vec![
                    "remittances".to_string(),
                    "money_transfer".to_string(),
                    "bill_payment".to_string(),
                ],
                supported_currencies: currencies(&["USD", "MXN", "COP", "BRL", "VES"]),
                url: "https://www.westernunion.com".to_string(),
                rating: 4.5,
                ..RawEntity::default()
            },
            RawEntity {
                name: "MoneyGram".to_string(),
                country: "US".to_string(),
                description: "International money transfer service".to_string(),
                services: vec!["remittances".to_string(), "money_transfer".to_string()],
                supported_currencies: currencies(&["USD", "MXN", "COP", "BRL"]),
                url: "https://www.moneygram.com".to_string(),
                rating: 4.3,
                ..RawEntity::default()
            },
            RawEntity {
                name: "Remitly".to_string(),
                country: "US".to_string(),
                description: "Digital remittance service for LATAM".to_string(),
                services: vec!["remittances".to_string(), "digital_transfer".to_string()],
                supported_currencies: currencies(&["USD", "MXN", "COP", "PEN", "BRL"]),
                url: "https://www.remitly.com".to_string(),
                rating: 4.7,
                ..RawEntity::default()
            },
            RawEntity {
                name: "Wise".to_string(),
                country: "GB".to_string(),
                description: "Multi-currency account and transfer service".to_string(),
                services: vec![
                    "remittances".to_string(),
                    "multi_currency_account".to_string(),
                    "debit_card".to_string(),
                ],
                supported_currencies: currencies(&["USD", "MXN", "BRL", "CLP", "COP"]),
                url: "https://wise.com".to_string(),
                rating: 4.8,
                ..RawEntity::default()
            },
            RawEntity {
                name: "Ria Money Transfer".to_string(),
                country: "US".to_string(),
                description: "Money transfer service to 160+ countries".to_string(),
                services: vec!["remittances".to_string(), "money_transfer".to_string()],
                supported_currencies: currencies(&["USD", "MXN", "COP", "VES"]),
                url: "https://www.riamoneytransfer.com".to_string(),
                rating: 4.4,
                ..RawEntity::default()
            },
        ];

        let now = Utc::now().to_rfc3339();
        for entity in &mut entities {
            entity.entity_type = "fintech".to_string();
            entity.api_available = false;
            entity.last_updated = now.clone();
            entity.fees = json!({});
        }

        Ok(entities)
    }
}

fn currencies(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

/// A remote directory of raw entity records behind a JSON endpoint
/// (exchange listings, open-banking institution directories, ...).
pub struct HttpDirectorySource {
    id: String,
    url: String,
    client: reqwest::Client,
}

impl HttpDirectorySource {
    pub fn new(id: &str, url: &str, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            id: id.to_string(),
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl EntitySource for HttpDirectorySource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> Result<Vec<RawEntity>, ApiError> {
        let res = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            return Err(ApiError::Internal(format!(
                "directory {} responded {}",
                self.id,
                res.status()
            )));
        }

        let entities: Vec<RawEntity> = res.json().await.map_err(ApiError::internal)?;
        Ok(entities)
    }
}

/// Build the enabled source set from configuration. Disabled sources are
/// simply not constructed.
pub fn build_sources(cfg: &CollectionSettings) -> Result<Vec<Arc<dyn EntitySource>>, ApiError> {
    let mut sources: Vec<Arc<dyn EntitySource>> = Vec::new();

    if cfg.venezuela_seed {
        sources.push(Arc::new(VenezuelaSource));
    }
    if cfg.remittance_seed {
        sources.push(Arc::new(RemittanceSource));
    }
    if let Some(url) = &cfg.exchanges_url {
        sources.push(Arc::new(HttpDirectorySource::new(
            "exchanges",
            url,
            cfg.http_timeout_secs,
        )?));
    }
    if let Some(url) = &cfg.banks_url {
        sources.push(Arc::new(HttpDirectorySource::new(
            "banks",
            url,
            cfg.http_timeout_secs,
        )?));
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn venezuela_seed_includes_the_central_bank() {
        let entities = VenezuelaSource.fetch().await.unwrap();
        assert_eq!(entities.len(), 5);

        let bcv = entities
            .iter()
            .find(|e| e.name == "Banco Central de Venezuela")
            .unwrap();
        assert_eq!(bcv.entity_type, "bank");
        assert_eq!(bcv.country, "VE");
        assert!(!bcv.last_updated.is_empty());
    }

    #[tokio::test]
    async fn remittance_seed_is_all_fintech() {
        let entities = RemittanceSource.fetch().await.unwrap();
        assert_eq!(entities.len(), 5);
        assert!(entities.iter().all(|e| e.entity_type == "fintech"));
    }

    #[test]
    fn sources_follow_configuration_toggles() {
        let mut cfg = CollectionSettings::default();
        cfg.exchanges_url = Some("http://localhost:9/exchanges".to_string());

        let sources = build_sources(&cfg).unwrap();
        let ids: Vec<String> = sources.iter().map(|s| s.source_id().to_string()).collect();
        assert_eq!(ids, vec!["venezuela", "remittance", "exchanges"]);

        cfg.venezuela_seed = false;
        cfg.remittance_seed = false;
        cfg.exchanges_url = None;
        assert!(build_sources(&cfg).unwrap().is_empty());
    }
}
