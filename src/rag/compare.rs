use std::sync::Arc;

use serde::Serialize;

use crate::core::errors::ApiError;
use crate::entity::EntityType;
use crate::store::RecordFilter;

use super::engine::{Retriever, SearchHit, SourceRef};

const OPTION_LIMIT: usize = 10;
const COMPARISON_CONTEXT: usize = 5;

/// Result of a remittance comparison between two countries.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub options: Vec<SearchHit>,
    pub comparison_text: String,
    pub sources: Vec<SourceRef>,
    pub total_found: usize,
}

/// Retrieval specialization for the remittance corridor question: narrows
/// search to fintechs and frames a comparison for the answer engine.
#[derive(Clone)]
pub struct Comparator {
    retriever: Arc<Retriever>,
}

impl Comparator {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }

    pub async fn compare(
        &self,
        from_country: &str,
        to_country: &str,
        amount: f64,
    ) -> Result<Comparison, ApiError> {
        let query = format!("remittance services from {from_country} to {to_country}");
        let services = self
            .retriever
            .search(
                &query,
                OPTION_LIMIT,
                &RecordFilter::new().with_entity_type(EntityType::Fintech),
            )
            .await?;

        if services.is_empty() {
            return Ok(Comparison {
                options: Vec::new(),
                comparison_text: format!(
                    "No remittance services found for {from_country} to {to_country}"
                ),
                sources: Vec::new(),
                total_found: 0,
            });
        }

        let question = format!(
            "Compare the best remittance options to send ${amount} from {from_country} to {to_country}. \
             Consider fees, speed, reliability, and user ratings. Provide a clear recommendation."
        );
        let answer = self.retriever.ask(&question, COMPARISON_CONTEXT).await?;

        let total_found = services.len();
        Ok(Comparison {
            options: services,
            comparison_text: answer.answer,
            sources: answer.sources,
            total_found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::engine::tests::{raw, seeded_retriever};

    #[tokio::test]
    async fn compare_over_seeded_fintechs() {
        let retriever = seeded_retriever(vec![
            raw("Western Union", "fintech", "US", "Global remittance service"),
            raw("MoneyGram", "fintech", "US", "International remittance transfers"),
            raw("Remitly", "fintech", "US", "Digital remittance service for LATAM"),
            raw("Wise", "fintech", "US", "Remittance and multi-currency accounts"),
            raw("Ria Money Transfer", "fintech", "US", "Remittance to 160+ countries"),
        ])
        .await;

        let comparator = Comparator::new(Arc::new(retriever));
        let result = comparator.compare("US", "VE", 100.0).await.unwrap();

        assert_eq!(result.total_found, 5);
        assert!(result.options.len() <= 5);
        assert!(!result.comparison_text.is_empty());
        assert!(!result.sources.is_empty());
        assert!(result
            .options
            .iter()
            .all(|o| o.metadata.entity_type == EntityType::Fintech));
    }

    #[tokio::test]
    async fn empty_corridor_is_an_explicit_result_not_an_error() {
        let retriever = seeded_retriever(vec![raw(
            "Bitso",
            "exchange",
            "MX",
            "Crypto trading platform",
        )])
        .await;

        let comparator = Comparator::new(Arc::new(retriever));
        let result = comparator.compare("US", "VE", 50.0).await.unwrap();

        assert_eq!(result.total_found, 0);
        assert!(result.options.is_empty());
        assert!(result.comparison_text.contains("No remittance services found"));
    }
}
