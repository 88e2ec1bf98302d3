use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;
pub use thriftsy_common::{Paisa, NPR_CURRENCY_CODE};

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

/// Implements `Display` and `FromStr` for a string-backed enum using the same snake_case names as the database.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $s),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($s => Ok(Self::$variant),)+
                    other => Err(ConversionError(format!("Invalid {}: {other}", stringify!($name)))),
                }
            }
        }
    };
}

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .trim_start_matches($prefix)
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|e| ConversionError(format!("Invalid {}: {s}. {e}", stringify!($name))))
            }
        }

        impl $name {
            pub fn value(&self) -> i64 {
                self.0
            }
        }
    };
}

//--------------------------------------     Identifiers     ---------------------------------------------------------
id_type!(OrderId, "#");
id_type!(ProductId, "p");
id_type!(UserId, "u");

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery
    Cod,
    Esewa,
    Khalti,
    BankTransfer,
}

string_enum!(PaymentMethod { Cod => "cod", Esewa => "esewa", Khalti => "khalti", BankTransfer => "bank_transfer" });

impl PaymentMethod {
    /// True for methods that are settled through a remote payment gateway.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Esewa | Self::Khalti)
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

string_enum!(PaymentStatus { Pending => "pending", Paid => "paid", Refunded => "refunded" });

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been placed, but payment has not been confirmed.
    Pending,
    /// Payment has been verified.
    Confirmed,
    /// The buyer cancelled the order. This is a terminal state.
    Cancelled,
}

string_enum!(OrderStatusType { Pending => "pending", Confirmed => "confirmed", Cancelled => "cancelled" });

//--------------------------------------    ProductStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Unsold,
    /// Claimed by exactly one order.
    OrderReceived,
    /// Marked sold by the catalog. Never reverted here.
    Sold,
}

string_enum!(ProductStatus { Unsold => "unsold", OrderReceived => "order_received", Sold => "sold" });

//--------------------------------------     LedgerStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Pending,
    Verified,
}

string_enum!(LedgerStatus { Pending => "pending", Verified => "verified" });

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// `None` for guest orders
    pub buyer_id: Option<UserId>,
    pub subtotal: Paisa,
    pub tax: Paisa,
    pub shipping: Paisa,
    pub total: Paisa,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatusType,
    pub shipping_address: Option<Json<Value>>,
    pub idempotency_key: Option<String>,
    pub esewa_transaction_uuid: Option<String>,
    pub khalti_pidx: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The correlation token stored for the given gateway, if any.
    pub fn gateway_token(&self, method: PaymentMethod) -> Option<&str> {
        match method {
            PaymentMethod::Esewa => self.esewa_transaction_uuid.as_deref(),
            PaymentMethod::Khalti => self.khalti_pidx.as_deref(),
            PaymentMethod::Cod | PaymentMethod::BankTransfer => None,
        }
    }

    pub fn is_bought_by(&self, user: UserId) -> bool {
        self.buyer_id == Some(user)
    }
}

//--------------------------------------       CartItem      ---------------------------------------------------------
/// A line from the buyer's cart, as submitted at checkout. Prices are taken as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Option<ProductId>,
    pub title: String,
    pub price: Paisa,
}

impl CartItem {
    pub fn new<S: Into<String>>(product_id: Option<ProductId>, title: S, price: Paisa) -> Self {
        Self { product_id, title: title.into(), price }
    }
}

//--------------------------------------       NewOrder      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub buyer_id: Option<UserId>,
    pub items: Vec<CartItem>,
    pub subtotal: Paisa,
    pub tax: Paisa,
    pub shipping: Paisa,
    /// The caller is responsible for `total = subtotal + tax + shipping`.
    pub total: Paisa,
    pub payment_method: PaymentMethod,
    pub shipping_address: Option<Value>,
    pub idempotency_key: Option<String>,
}

impl NewOrder {
    /// Creates a new order for the given cart, with the subtotal and total set to the sum of the item prices.
    pub fn new(buyer_id: Option<UserId>, items: Vec<CartItem>, payment_method: PaymentMethod) -> Self {
        let subtotal = items.iter().map(|i| i.price).sum::<Paisa>();
        Self {
            buyer_id,
            items,
            subtotal,
            tax: Paisa::default(),
            shipping: Paisa::default(),
            total: subtotal,
            payment_method,
            shipping_address: None,
            idempotency_key: None,
        }
    }

    pub fn with_totals(mut self, subtotal: Paisa, tax: Paisa, shipping: Paisa, total: Paisa) -> Self {
        self.subtotal = subtotal;
        self.tax = tax;
        self.shipping = shipping;
        self.total = total;
        self
    }

    pub fn with_shipping_address(mut self, address: Value) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn with_idempotency_key<S: Into<String>>(mut self, key: S) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// The distinct product ids referenced by the cart, in cart order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids = Vec::with_capacity(self.items.len());
        for id in self.items.iter().filter_map(|i| i.product_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    /// `None` once the product has been deleted from the catalog
    pub product_id: Option<ProductId>,
    pub title: String,
    pub price: Paisa,
    /// Whether this order took the product off the market at checkout. Only claimed products are released again when
    /// the order is cancelled.
    pub claimed: bool,
}

//--------------------------------------      SellerSale     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SellerSale {
    pub id: i64,
    pub seller_id: UserId,
    pub order_id: OrderId,
    pub buyer_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub title: String,
    pub price: Paisa,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSellerSale {
    pub seller_id: UserId,
    pub order_id: OrderId,
    pub buyer_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub title: String,
    pub price: Paisa,
}

//--------------------------------------       Product       ---------------------------------------------------------
/// The slice of a catalog product that the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: Option<UserId>,
    pub title: String,
    pub price: Paisa,
    pub status: ProductStatus,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub seller_id: Option<UserId>,
    pub title: String,
    pub price: Paisa,
}

impl NewProduct {
    pub fn new<S: Into<String>>(seller_id: Option<UserId>, title: S, price: Paisa) -> Self {
        Self { seller_id, title: title.into(), price }
    }
}

//--------------------------------------   Order transitions ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    Status,
    PaymentStatus,
}

impl OrderField {
    /// The column name. Safe to interpolate into SQL.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::PaymentStatus => "payment_status",
        }
    }
}

impl Display for OrderField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// A requested change to one of the order's state fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum OrderTransition {
    Status(OrderStatusType),
    PaymentStatus(PaymentStatus),
}

impl OrderTransition {
    pub fn field(&self) -> OrderField {
        match self {
            Self::Status(_) => OrderField::Status,
            Self::PaymentStatus(_) => OrderField::PaymentStatus,
        }
    }

    pub fn new_value(&self) -> String {
        match self {
            Self::Status(s) => s.to_string(),
            Self::PaymentStatus(s) => s.to_string(),
        }
    }

    /// The value the field currently holds on `order`.
    pub fn current_value(&self, order: &Order) -> String {
        match self {
            Self::Status(_) => order.status.to_string(),
            Self::PaymentStatus(_) => order.payment_status.to_string(),
        }
    }
}

/// A single compare-and-set field update: the field is only changed if it still holds `old_value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: OrderField,
    pub old_value: String,
    pub new_value: String,
}

impl FieldChange {
    pub fn for_transition(order: &Order, transition: OrderTransition) -> Self {
        Self { field: transition.field(), old_value: transition.current_value(order), new_value: transition.new_value() }
    }
}

//--------------------------------------        Actor        ---------------------------------------------------------
/// Who is asking for an order transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// An authenticated marketplace user
    User(UserId),
    /// The engine itself, acting on a verified gateway confirmation
    System,
}

impl Actor {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::System => None,
        }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::System => write!(f, "system"),
        }
    }
}

//--------------------------------------      AuditEntry     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub actor_id: Option<UserId>,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub order_id: OrderId,
    pub actor_id: Option<UserId>,
    pub field: OrderField,
    pub old_value: String,
    pub new_value: String,
}

//--------------------------------------     LedgerEntry     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub order_id: Option<OrderId>,
    pub method: PaymentMethod,
    pub gateway_txn_id: Option<String>,
    pub amount: Option<Paisa>,
    pub currency: String,
    pub status: LedgerStatus,
    pub raw_payload: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub order_id: Option<OrderId>,
    pub method: PaymentMethod,
    pub gateway_txn_id: Option<String>,
    pub amount: Option<Paisa>,
    pub status: LedgerStatus,
    pub raw_payload: Value,
}

impl NewLedgerEntry {
    pub fn new(method: PaymentMethod, status: LedgerStatus) -> Self {
        Self { order_id: None, method, gateway_txn_id: None, amount: None, status, raw_payload: Value::Null }
    }

    pub fn with_order_id(mut self, order_id: Option<OrderId>) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn with_gateway_txn_id<S: Into<String>>(mut self, txn: Option<S>) -> Self {
        self.gateway_txn_id = txn.map(Into::into);
        self
    }

    pub fn with_amount(mut self, amount: Option<Paisa>) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_raw_payload(mut self, payload: Value) -> Self {
        self.raw_payload = payload;
        self
    }
}
