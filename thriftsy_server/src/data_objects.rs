//! Request and response bodies for the HTTP API. All amounts are integers in paisa.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thriftsy_engine::db_types::{
    CartItem,
    NewOrder,
    OrderId,
    OrderStatusType,
    OrderTransition,
    Paisa,
    PaymentMethod,
    PaymentStatus,
    UserId,
};

use crate::integrations::Initiation;

/// A checkout as submitted by the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    pub payment_method: PaymentMethod,
    /// Defaults to the sum of the item prices.
    pub subtotal: Option<Paisa>,
    #[serde(default)]
    pub tax: Paisa,
    #[serde(default)]
    pub shipping: Paisa,
    /// Defaults to `subtotal + tax + shipping`.
    pub total: Option<Paisa>,
    pub shipping_address: Option<Value>,
    pub idempotency_key: Option<String>,
}

impl CheckoutRequest {
    pub fn into_new_order(self, buyer_id: Option<UserId>) -> NewOrder {
        let mut order = NewOrder::new(buyer_id, self.items, self.payment_method);
        let subtotal = self.subtotal.unwrap_or(order.subtotal);
        let total = self.total.unwrap_or(subtotal + self.tax + self.shipping);
        order = order.with_totals(subtotal, self.tax, self.shipping, total);
        if let Some(address) = self.shipping_address {
            order = order.with_shipping_address(address);
        }
        match self.idempotency_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => order.with_idempotency_key(key),
            None => order,
        }
    }
}

/// A partial order update. Each field that is present is applied as a separate transition, status first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatusType>,
    pub payment_status: Option<PaymentStatus>,
}

impl UpdateOrderRequest {
    pub fn transitions(&self) -> Vec<OrderTransition> {
        let status = self.status.map(OrderTransition::Status);
        let payment = self.payment_status.map(OrderTransition::PaymentStatus);
        status.into_iter().chain(payment).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    pub amount: Option<Paisa>,
    #[serde(alias = "productName")]
    pub product_label: Option<String>,
    #[serde(alias = "orderId")]
    pub order_id: Option<OrderId>,
    /// Creates the order first if no `order_id` is given.
    pub order: Option<CheckoutRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiatePaymentResponse {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub initiation: Initiation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub method: PaymentMethod,
    #[serde(alias = "orderId")]
    pub order_id: Option<OrderId>,
    pub txn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub ok: bool,
    pub reconciled: bool,
    pub order_id: Option<OrderId>,
    pub txn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<i64>,
}
