//! Free-text search over a user's expenses.
//!
//! Expenses and the query are embedded as vectors and ranked by cosine
//! similarity. [`HashEmbedder`] is a local bag-of-words embedding; any other
//! [`Embedder`] can be plugged in without touching the conversation code.

mod embedder;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::storage::{Expense, Storage, StorageResult};

pub use embedder::{cosine_similarity, Embedder, HashEmbedder};

/// How many recent expenses are scored per query.
const CANDIDATE_LIMIT: u64 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub expense: Expense,
    pub similarity: f32,
}

#[async_trait]
pub trait ExpenseSearch: Send + Sync {
    /// Hits scoring above `threshold`, best first, at most `limit`.
    async fn search_by_query(
        &self,
        telegram_id: i64,
        query: &str,
        threshold: f32,
        limit: usize,
    ) -> StorageResult<Vec<SearchHit>>;
}

pub struct SimilaritySearch {
    storage: Arc<dyn Storage>,
    embedder: Box<dyn Embedder>,
}

impl SimilaritySearch {
    pub fn new(storage: Arc<dyn Storage>, embedder: Box<dyn Embedder>) -> Self {
        Self { storage, embedder }
    }
}

/// Text embedded for an expense.
fn describe(expense: &Expense) -> String {
    let mut text = format!(
        "{} {} {}",
        expense.category.name, expense.category.group, expense.notes
    );
    if let Some(vehicle) = expense.vehicle_type {
        text.push(' ');
        text.push_str(vehicle.as_str());
    }
    text
}

#[async_trait]
impl ExpenseSearch for SimilaritySearch {
    async fn search_by_query(
        &self,
        telegram_id: i64,
        query: &str,
        threshold: f32,
        limit: usize,
    ) -> StorageResult<Vec<SearchHit>> {
        let Some(query_vector) = self.embedder.embed(query) else {
            return Ok(Vec::new());
        };

        let expenses = self
            .storage
            .get_expenses_by_telegram_id(telegram_id, CANDIDATE_LIMIT, 0)
            .await?;

        let mut hits: Vec<SearchHit> = expenses
            .into_iter()
            .filter_map(|expense| {
                let vector = self.embedder.embed(&describe(&expense))?;
                let similarity = cosine_similarity(&query_vector, &vector);
                (similarity > threshold).then_some(SearchHit {
                    expense,
                    similarity,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(limit);

        debug!(
            "Search for user {} matched {} expenses: {:?}",
            telegram_id,
            hits.len(),
            query
        );
        Ok(hits)
    }
}
