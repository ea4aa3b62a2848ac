use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::domain::{
    CartLine, CustomerId, CustomerProfile, OrderId, OrderItem, OrderRecord, OrderStatus,
    ProductId, StatusHistoryEntry,
};
use super::risk::{
    BlocklistEntry, BlocklistEntryId, BlocklistProbe, BlocklistSeverity, NewBlocklistEntry,
    RiskAssessment,
};

/// Error enumeration for collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Administrator-maintained blocklist.
pub trait BlocklistRepository: Send + Sync {
    /// Active entries matching any identifier in `probe`, optionally restricted to one severity.
    fn find_active(
        &self,
        probe: &BlocklistProbe<'_>,
        severity: Option<BlocklistSeverity>,
        now: DateTime<Utc>,
    ) -> Result<Vec<BlocklistEntry>, RepositoryError>;
    fn insert(&self, entry: NewBlocklistEntry) -> Result<BlocklistEntry, RepositoryError>;
    fn remove(&self, id: &BlocklistEntryId) -> Result<(), RepositoryError>;
    fn list(&self) -> Result<Vec<BlocklistEntry>, RepositoryError>;
}

/// Loosely typed risk rule rows.
pub trait RuleRepository: Send + Sync {
    fn load(&self) -> Result<BTreeMap<String, Value>, RepositoryError>;
    fn set(&self, key: &str, value: Value) -> Result<(), RepositoryError>;
}

pub trait CustomerRepository: Send + Sync {
    fn fetch_profile(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, RepositoryError>;
    fn record_order_placed(&self, id: &CustomerId) -> Result<(), RepositoryError>;
    /// Bump the delivered/refused/returned counters for a lifecycle outcome.
    fn record_outcome(&self, id: &CustomerId, status: OrderStatus) -> Result<(), RepositoryError>;
}

/// Read-only counting queries over placed orders.
pub trait OrderHistory: Send + Sync {
    fn count_recent_orders(
        &self,
        phone: &str,
        since: DateTime<Utc>,
        excluded: &[OrderStatus],
    ) -> Result<u32, RepositoryError>;
    fn count_customer_orders_since(
        &self,
        customer_id: &CustomerId,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError>;
}

/// Order persistence. Each call is an independent write; callers get no transaction.
pub trait OrderRepository: Send + Sync {
    fn insert_order(&self, order: OrderRecord) -> Result<OrderRecord, RepositoryError>;
    fn delete_order(&self, id: &OrderId) -> Result<(), RepositoryError>;
    fn fetch_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, RepositoryError>;
    fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), RepositoryError>;
    fn insert_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError>;
    fn items(&self, id: &OrderId) -> Result<Vec<OrderItem>, RepositoryError>;
    /// Fails with `Conflict` if the order already has an assessment.
    fn save_assessment(
        &self,
        id: &OrderId,
        assessment: &RiskAssessment,
    ) -> Result<(), RepositoryError>;
    fn fetch_assessment(&self, id: &OrderId) -> Result<Option<RiskAssessment>, RepositoryError>;
    fn append_status_history(&self, entry: StatusHistoryEntry) -> Result<(), RepositoryError>;
    fn status_history(&self, id: &OrderId) -> Result<Vec<StatusHistoryEntry>, RepositoryError>;
}

pub trait CartRepository: Send + Sync {
    fn load_cart(&self, customer_id: &CustomerId) -> Result<Vec<CartLine>, RepositoryError>;
    fn clear_cart(&self, customer_id: &CustomerId) -> Result<(), RepositoryError>;
}

pub trait InventoryRepository: Send + Sync {
    fn decrement_stock(&self, product_id: &ProductId, quantity: u32)
        -> Result<(), RepositoryError>;
}
