use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registered storefront customers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Identifier wrapper for placed orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// Free-form delivery address as captured by the checkout form.
///
/// Only `address`, `area`, `city` and `district` take part in keyword screening; anything
/// else the form sends is kept in `extra` and passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub address: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ShippingAddress {
    /// Lower-cased text of every screened field, joined by newlines.
    pub fn screening_text(&self) -> String {
        [
            Some(self.address.as_str()),
            self.area.as_deref(),
            self.city.as_deref(),
            self.district.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// Order statistics and account age the risk engine reads for a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: CustomerId,
    pub account_created_at: DateTime<Utc>,
    pub total_orders: u32,
    pub delivered_orders: u32,
    pub refused_orders: u32,
    pub returned_orders: u32,
}

impl CustomerProfile {
    /// Fresh account with no order history.
    pub fn new(customer_id: CustomerId, account_created_at: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            account_created_at,
            total_orders: 0,
            delivered_orders: 0,
            refused_orders: 0,
            returned_orders: 0,
        }
    }
}

/// Lifecycle states of a cash-on-delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingConfirmation,
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Refused,
    Returned,
    Cancelled,
}

impl OrderStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "pending_confirmation",
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Refused => "refused",
            OrderStatus::Returned => "returned",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses that do not count towards phone velocity.
    pub const VELOCITY_EXCLUDED: [OrderStatus; 2] = [OrderStatus::Cancelled, OrderStatus::Delivered];

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (PendingConfirmation, Pending)
                | (PendingConfirmation, Cancelled)
                | (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Refused)
                | (Delivered, Returned)
        )
    }
}

/// Line in a customer's cart at the moment of checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    /// `None` when the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Checkout attempt as received from the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: CustomerId,
    /// Already normalised to the national format by the form layer.
    pub phone: String,
    pub shipping_address: ShippingAddress,
    /// Filled from the connection, never from the request body.
    #[serde(skip)]
    pub client_ip: Option<IpAddr>,
    #[serde(default)]
    pub customer_note: Option<String>,
}

/// Persisted order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub phone: String,
    pub shipping_address: ShippingAddress,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub customer_note: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Append-only audit row written on every status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
