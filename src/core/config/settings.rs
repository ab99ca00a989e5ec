use std::env;
use std::fs;

use serde::Deserialize;

use super::paths::AppPaths;
use crate::core::errors::ApiError;
use crate::entity::EntityType;

/// Application settings, loaded from a YAML config file with defaults for
/// every field. A missing config file yields the full default set.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub openai: OpenAiSettings,
    pub index: IndexSettings,
    pub search: SearchSettings,
    pub collection: CollectionSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub collection: String,
    pub vector_dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            collection: "financial_entities".to_string(),
            vector_dimension: 1536,
            chunk_size: 500,
            chunk_overlap: 50,
            embed_batch_size: 2048,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    pub min_similarity_score: f32,
    pub context_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            min_similarity_score: 0.7,
            context_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub countries_enabled: Vec<String>,
    pub entity_types_enabled: Vec<EntityType>,
    pub venezuela_seed: bool,
    pub remittance_seed: bool,
    pub exchanges_url: Option<String>,
    pub banks_url: Option<String>,
    pub http_timeout_secs: u64,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            countries_enabled: [
                "US", "CA", "MX", "GT", "HN", "SV", "NI", "CR", "PA", "VE", "CO",
                "EC", "PE", "BR", "BO", "PY", "AR", "UY", "CL", "CU", "DO", "HT",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            entity_types_enabled: vec![
                EntityType::Bank,
                EntityType::Exchange,
                EntityType::Fintech,
                EntityType::CasaCambio,
                EntityType::Wallet,
                EntityType::Defi,
            ],
            venezuela_seed: true,
            remittance_seed: true,
            exchanges_url: None,
            banks_url: None,
            http_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub autostart: bool,
    pub timezone: String,
    pub update_exchanges_interval: u64,
    pub update_banks_interval: u64,
    pub update_venezuela_interval: u64,
    pub discovery_interval: u64,
    pub maintenance_interval: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            autostart: true,
            timezone: "America/Caracas".to_string(),
            update_exchanges_interval: 900,
            update_banks_interval: 86_400,
            update_venezuela_interval: 1_800,
            discovery_interval: 604_800,
            maintenance_interval: 86_400,
        }
    }
}

impl Settings {
    pub fn load(paths: &AppPaths) -> Result<Self, ApiError> {
        let path = paths.config_path();
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(ApiError::internal)?;
            if contents.trim().is_empty() {
                Settings::default()
            } else {
                serde_yaml::from_str(&contents).map_err(ApiError::internal)?
            }
        } else {
            Settings::default()
        };

        // API key comes from the environment, not the config file
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                settings.openai.api_key = key;
            }
        }

        Ok(settings)
    }
}
