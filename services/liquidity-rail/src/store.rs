use crate::errors::StoreError;
use crate::models::{Quote, Transaction, TransactionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Quote persistence. Writes to the same id are last-writer-wins.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn insert(&self, quote: Quote) -> StoreResult<()>;
    async fn get(&self, quote_id: &str) -> StoreResult<Option<Quote>>;
    async fn update(&self, quote: Quote) -> StoreResult<()>;
}

/// Transaction persistence. Listing preserves insertion order.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, transaction: Transaction) -> StoreResult<()>;
    async fn get(&self, transaction_id: &str) -> StoreResult<Option<Transaction>>;
    async fn list_by_provider(
        &self,
        provider_id: &str,
        status: Option<TransactionStatus>,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<Transaction>>;
    async fn set_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Transaction>;
}

#[derive(Default)]
pub struct InMemoryQuoteStore {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl InMemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn insert(&self, quote: Quote) -> StoreResult<()> {
        let mut quotes = self.quotes.write().await;
        if quotes.contains_key(&quote.quote_id) {
            return Err(StoreError::DuplicateKey(quote.quote_id));
        }
        quotes.insert(quote.quote_id.clone(), quote);
        Ok(())
    }

    async fn get(&self, quote_id: &str) -> StoreResult<Option<Quote>> {
        Ok(self.quotes.read().await.get(quote_id).cloned())
    }

    async fn update(&self, quote: Quote) -> StoreResult<()> {
        let mut quotes = self.quotes.write().await;
        match quotes.get_mut(&quote.quote_id) {
            Some(existing) => {
                *existing = quote;
                Ok(())
            }
            None => Err(StoreError::Missing(quote.quote_id)),
        }
    }
}

#[derive(Default)]
struct TransactionTable {
    order: Vec<String>,
    by_id: HashMap<String, Transaction>,
}

#[derive(Default)]
pub struct InMemoryTransactionStore {
    table: RwLock<TransactionTable>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, transaction: Transaction) -> StoreResult<()> {
        let mut table = self.table.write().await;
        if table.by_id.contains_key(&transaction.transaction_id) {
            return Err(StoreError::DuplicateKey(transaction.transaction_id));
        }
        table.order.push(transaction.transaction_id.clone());
        table
            .by_id
            .insert(transaction.transaction_id.clone(), transaction);
        Ok(())
    }

    async fn get(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        Ok(self.table.read().await.by_id.get(transaction_id).cloned())
    }

    async fn list_by_provider(
        &self,
        provider_id: &str,
        status: Option<TransactionStatus>,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<Transaction>> {
        let table = self.table.read().await;

        Ok(table
            .order
            .iter()
            .filter_map(|id| table.by_id.get(id))
            .filter(|t| t.provider_id == provider_id)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn set_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Transaction> {
        let mut table = self.table.write().await;
        let transaction = table
            .by_id
            .get_mut(transaction_id)
            .ok_or_else(|| StoreError::Missing(transaction_id.to_string()))?;

        transaction.status = status;
        transaction.updated_on = at;
        Ok(transaction.clone())
    }
}
