//! In-process collaborators backing the demo binary and the test suites.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::domain::{
    CartLine, CustomerId, CustomerProfile, OrderId, OrderItem, OrderRecord, OrderStatus,
    ProductId, StatusHistoryEntry,
};
use super::repository::{
    BlocklistRepository, CartRepository, CustomerRepository, InventoryRepository, OrderHistory,
    OrderRepository, RepositoryError, RuleRepository,
};
use super::risk::{
    BlocklistEntry, BlocklistEntryId, BlocklistProbe, BlocklistSeverity, NewBlocklistEntry,
    RiskAssessment,
};
use super::service::CheckoutStores;

/// Collaborator call that can be switched to fail, to exercise degraded paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    BlocklistLookup,
    RuleLoad,
    CustomerProfile,
    CustomerStats,
    OrderHistory,
    InsertOrder,
    InsertItems,
    SaveAssessment,
    StatusHistory,
    DecrementStock,
    ClearCart,
}

#[derive(Debug, Default)]
struct StorefrontState {
    customers: HashMap<CustomerId, CustomerProfile>,
    carts: HashMap<CustomerId, Vec<CartLine>>,
    stock: HashMap<ProductId, i64>,
    orders: BTreeMap<OrderId, OrderRecord>,
    items: Vec<OrderItem>,
    assessments: HashMap<OrderId, RiskAssessment>,
    history: Vec<StatusHistoryEntry>,
    blocklist: Vec<BlocklistEntry>,
    rules: BTreeMap<String, Value>,
    failing: HashSet<StoreOperation>,
    blocklist_sequence: u64,
}

/// Single shared store implementing every collaborator trait.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorefront {
    state: Arc<Mutex<StorefrontState>>,
}

impl MemoryStorefront {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trait-object view of this store for the checkout and admin services.
    pub fn stores(&self) -> CheckoutStores {
        let store = Arc::new(self.clone());
        CheckoutStores {
            blocklist: store.clone(),
            rules: store.clone(),
            customers: store.clone(),
            history: store.clone(),
            orders: store.clone(),
            carts: store.clone(),
            inventory: store,
        }
    }

    pub fn add_customer(&self, profile: CustomerProfile) {
        self.state()
            .customers
            .insert(profile.customer_id.clone(), profile);
    }

    pub fn set_cart(&self, customer_id: &CustomerId, lines: Vec<CartLine>) {
        self.state().carts.insert(customer_id.clone(), lines);
    }

    pub fn cart(&self, customer_id: &CustomerId) -> Vec<CartLine> {
        self.state()
            .carts
            .get(customer_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_stock(&self, product_id: &ProductId, quantity: i64) {
        self.state().stock.insert(product_id.clone(), quantity);
    }

    pub fn stock(&self, product_id: &ProductId) -> Option<i64> {
        self.state().stock.get(product_id).copied()
    }

    pub fn set_rule(&self, key: &str, value: Value) {
        self.state().rules.insert(key.to_string(), value);
    }

    pub fn orders(&self) -> Vec<OrderRecord> {
        self.state().orders.values().cloned().collect()
    }

    pub fn fail(&self, operation: StoreOperation) {
        self.state().failing.insert(operation);
    }

    pub fn recover(&self, operation: StoreOperation) {
        self.state().failing.remove(&operation);
    }

    fn state(&self) -> MutexGuard<'_, StorefrontState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn checked(
        &self,
        operation: StoreOperation,
    ) -> Result<MutexGuard<'_, StorefrontState>, RepositoryError> {
        let state = self.state();
        if state.failing.contains(&operation) {
            return Err(RepositoryError::Unavailable(format!(
                "{operation:?} offline"
            )));
        }
        Ok(state)
    }
}

impl BlocklistRepository for MemoryStorefront {
    fn find_active(
        &self,
        probe: &BlocklistProbe<'_>,
        severity: Option<BlocklistSeverity>,
        now: DateTime<Utc>,
    ) -> Result<Vec<BlocklistEntry>, RepositoryError> {
        let state = self.checked(StoreOperation::BlocklistLookup)?;
        Ok(state
            .blocklist
            .iter()
            .filter(|entry| severity.map_or(true, |wanted| entry.severity == wanted))
            .filter(|entry| entry.is_active(now) && entry.matches(probe))
            .cloned()
            .collect())
    }

    fn insert(&self, entry: NewBlocklistEntry) -> Result<BlocklistEntry, RepositoryError> {
        let mut state = self.state();
        let duplicate = state.blocklist.iter().any(|existing| {
            existing.kind == entry.kind && existing.value.eq_ignore_ascii_case(entry.value.trim())
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        state.blocklist_sequence += 1;
        let id = BlocklistEntryId(format!("blk-{:04}", state.blocklist_sequence));
        let stored = entry.into_entry(id);
        state.blocklist.push(stored.clone());
        Ok(stored)
    }

    fn remove(&self, id: &BlocklistEntryId) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let before = state.blocklist.len();
        state.blocklist.retain(|entry| &entry.id != id);
        if state.blocklist.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<BlocklistEntry>, RepositoryError> {
        Ok(self.state().blocklist.clone())
    }
}

impl RuleRepository for MemoryStorefront {
    fn load(&self) -> Result<BTreeMap<String, Value>, RepositoryError> {
        Ok(self.checked(StoreOperation::RuleLoad)?.rules.clone())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), RepositoryError> {
        self.set_rule(key, value);
        Ok(())
    }
}

impl CustomerRepository for MemoryStorefront {
    fn fetch_profile(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, RepositoryError> {
        let state = self.checked(StoreOperation::CustomerProfile)?;
        Ok(state.customers.get(id).cloned())
    }

    fn record_order_placed(&self, id: &CustomerId) -> Result<(), RepositoryError> {
        let mut state = self.checked(StoreOperation::CustomerStats)?;
        let profile = state
            .customers
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        profile.total_orders += 1;
        Ok(())
    }

    fn record_outcome(&self, id: &CustomerId, status: OrderStatus) -> Result<(), RepositoryError> {
        let mut state = self.checked(StoreOperation::CustomerStats)?;
        let profile = state
            .customers
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        match status {
            OrderStatus::Delivered => profile.delivered_orders += 1,
            OrderStatus::Refused => profile.refused_orders += 1,
            OrderStatus::Returned => profile.returned_orders += 1,
            _ => {}
        }
        Ok(())
    }
}

impl OrderHistory for MemoryStorefront {
    fn count_recent_orders(
        &self,
        phone: &str,
        since: DateTime<Utc>,
        excluded: &[OrderStatus],
    ) -> Result<u32, RepositoryError> {
        let state = self.checked(StoreOperation::OrderHistory)?;
        let count = state
            .orders
            .values()
            .filter(|order| order.phone == phone && order.created_at >= since)
            .filter(|order| !excluded.contains(&order.status))
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn count_customer_orders_since(
        &self,
        customer_id: &CustomerId,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        let state = self.checked(StoreOperation::OrderHistory)?;
        let count = state
            .orders
            .values()
            .filter(|order| &order.customer_id == customer_id && order.created_at >= since)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

impl OrderRepository for MemoryStorefront {
    fn insert_order(&self, order: OrderRecord) -> Result<OrderRecord, RepositoryError> {
        let mut state = self.checked(StoreOperation::InsertOrder)?;
        if state.orders.contains_key(&order.order_id) {
            return Err(RepositoryError::Conflict);
        }
        state.orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    fn delete_order(&self, id: &OrderId) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state
            .orders
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn fetch_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, RepositoryError> {
        Ok(self.state().orders.get(id).cloned())
    }

    fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let order = state.orders.get_mut(id).ok_or(RepositoryError::NotFound)?;
        order.status = status;
        Ok(())
    }

    fn insert_items(&self, items: &[OrderItem]) -> Result<(), RepositoryError> {
        let mut state = self.checked(StoreOperation::InsertItems)?;
        state.items.extend_from_slice(items);
        Ok(())
    }

    fn items(&self, id: &OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        Ok(self
            .state()
            .items
            .iter()
            .filter(|item| &item.order_id == id)
            .cloned()
            .collect())
    }

    fn save_assessment(
        &self,
        id: &OrderId,
        assessment: &RiskAssessment,
    ) -> Result<(), RepositoryError> {
        let mut state = self.checked(StoreOperation::SaveAssessment)?;
        if state.assessments.contains_key(id) {
            return Err(RepositoryError::Conflict);
        }
        state.assessments.insert(id.clone(), assessment.clone());
        Ok(())
    }

    fn fetch_assessment(&self, id: &OrderId) -> Result<Option<RiskAssessment>, RepositoryError> {
        Ok(self.state().assessments.get(id).cloned())
    }

    fn append_status_history(&self, entry: StatusHistoryEntry) -> Result<(), RepositoryError> {
        self.checked(StoreOperation::StatusHistory)?
            .history
            .push(entry);
        Ok(())
    }

    fn status_history(&self, id: &OrderId) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        Ok(self
            .state()
            .history
            .iter()
            .filter(|entry| &entry.order_id == id)
            .cloned()
            .collect())
    }
}

impl CartRepository for MemoryStorefront {
    fn load_cart(&self, customer_id: &CustomerId) -> Result<Vec<CartLine>, RepositoryError> {
        Ok(self.cart(customer_id))
    }

    fn clear_cart(&self, customer_id: &CustomerId) -> Result<(), RepositoryError> {
        self.checked(StoreOperation::ClearCart)?
            .carts
            .remove(customer_id);
        Ok(())
    }
}

impl InventoryRepository for MemoryStorefront {
    /// Stock may go negative; oversell is reconciled by staff, not refused here.
    fn decrement_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let mut state = self.checked(StoreOperation::DecrementStock)?;
        let stock = state
            .stock
            .get_mut(product_id)
            .ok_or(RepositoryError::NotFound)?;
        *stock -= i64::from(quantity);
        Ok(())
    }
}
