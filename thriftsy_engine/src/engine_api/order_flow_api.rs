use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{InsertOrderResult, OrderManagement},
    db_types::{
        Actor,
        FieldChange,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        OrderTransition,
        Paisa,
        PaymentMethod,
        PaymentStatus,
    },
    engine_api::{errors::OrderFlowError, order_objects::CreateOrderResult},
    events::{EventProducers, OrderCancelledEvent, OrderCreatedEvent, OrderPaidEvent},
};

/// How many times a compare-and-set transition is re-read and retried before giving up with
/// [`OrderFlowError::Conflict`].
pub const MAX_TRANSITION_ATTEMPTS: usize = 3;

/// `OrderFlowApi` is the primary API for creating orders and moving them through their lifecycle, whether on behalf
/// of a buyer or in response to a verified gateway confirmation.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    require_buyer_identity: bool,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi (buyer identity required: {})", self.require_buyer_identity)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, require_buyer_identity: true }
    }

    /// Allow or refuse orders without a buyer. Guest checkout is refused unless this is switched off.
    pub fn with_buyer_identity_required(mut self, required: bool) -> Self {
        self.require_buyer_identity = required;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Stores a new order and claims its products.
    ///
    /// If the order carries an idempotency key that was seen before, the order created the first time is returned
    /// with `existing` set, and nothing else happens. Products that could not be claimed are listed in `unclaimed`;
    /// the order is created regardless.
    pub async fn create_order(&self, order: NewOrder) -> Result<CreateOrderResult, OrderFlowError> {
        if self.require_buyer_identity && order.buyer_id.is_none() {
            return Err(OrderFlowError::Unauthorized);
        }
        if order.items.is_empty() {
            return Err(OrderFlowError::InvalidRequest("An order must contain at least one item".into()));
        }
        if order.items.iter().any(|i| i.price.value() < 0) || order.total.value() < 0 {
            return Err(OrderFlowError::InvalidAmount("Prices and totals cannot be negative".into()));
        }
        match self.db.insert_order(order).await? {
            InsertOrderResult::AlreadyExists(order) => {
                info!("🔄️📦️ Order {} already exists for this idempotency key. Returning it unchanged.", order.id);
                let items = self.db.fetch_order_items(order.id).await?;
                Ok(CreateOrderResult { order, items, existing: true, unclaimed: Vec::new() })
            },
            InsertOrderResult::Inserted(record) => {
                let order = record.order;
                if !record.unclaimed.is_empty() {
                    warn!(
                        "🔄️📦️ Order {} was created, but {} products were already taken: {:?}",
                        order.id,
                        record.unclaimed.len(),
                        record.unclaimed
                    );
                }
                debug!("🔄️📦️ Order {} created with {} items. Total {}", order.id, record.items.len(), order.total);
                let event = OrderCreatedEvent::new(order.clone(), record.items.clone(), record.unclaimed.clone());
                for emitter in &self.producers.order_created_producer {
                    emitter.publish_event(event.clone()).await;
                }
                Ok(CreateOrderResult { order, items: record.items, existing: false, unclaimed: record.unclaimed })
            },
        }
    }

    pub async fn fetch_order(&self, id: OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_id(id).await?.ok_or(OrderFlowError::OrderNotFound(id))
    }

    pub async fn fetch_order_by_gateway_token(
        &self,
        method: PaymentMethod,
        token: &str,
    ) -> Result<Option<Order>, OrderFlowError> {
        Ok(self.db.fetch_order_by_gateway_token(method, token).await?)
    }

    /// Records the correlation token issued for a new gateway payment attempt. This replaces any earlier token for the
    /// same gateway and sets the order's payment method. It is not an audited transition.
    pub async fn attach_gateway_token(
        &self,
        id: OrderId,
        method: PaymentMethod,
        token: &str,
    ) -> Result<Order, OrderFlowError> {
        if !method.is_gateway() {
            return Err(OrderFlowError::InvalidRequest(format!("{method} payments do not use a gateway")));
        }
        let order = self.fetch_order(id).await?;
        if order.status == OrderStatusType::Cancelled {
            return Err(OrderFlowError::Forbidden(format!("Order {id} is cancelled and cannot be paid for")));
        }
        let order = self.db.set_gateway_token(id, method, token).await?;
        debug!("🔄️💳️ Order {id} is now awaiting {method} payment with token {token}");
        Ok(order)
    }

    /// Applies a single status or payment-status change on behalf of `actor`.
    ///
    /// | Change                         | Buyer of the order | Other users | System |
    /// |--------------------------------|--------------------|-------------|--------|
    /// | status `pending → confirmed`   | Forbidden          | Forbidden   | Ok     |
    /// | status `* → cancelled`         | Ok                 | Forbidden   | Forbidden |
    /// | status `cancelled → *`         | Forbidden          | Forbidden   | Forbidden |
    /// | payment `pending → paid`       | Forbidden          | Forbidden   | Ok     |
    /// | payment `paid → refunded`      | Forbidden          | Forbidden   | Ok     |
    ///
    /// Setting a field to the value it already holds is a no-op and returns the order unchanged. Every change that is
    /// applied writes one audit entry. Cancelling also puts the order's products back on sale.
    pub async fn transition(
        &self,
        id: OrderId,
        actor: Actor,
        transition: OrderTransition,
    ) -> Result<Order, OrderFlowError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let order = self.fetch_order(id).await?;
            let change = match check_transition(&order, actor, transition)? {
                Some(change) => change,
                None => {
                    debug!("🔄️📦️ Order {id} already has {} = {}", transition.field(), transition.new_value());
                    return Ok(order);
                },
            };
            match self.db.apply_field_changes(id, actor.user_id(), &[change]).await? {
                Some(updated) => {
                    info!("🔄️📦️ Order {id}: {} changed to {} by {actor}", transition.field(), transition.new_value());
                    if transition == OrderTransition::Status(OrderStatusType::Cancelled) {
                        self.on_cancelled(updated.clone()).await?;
                    }
                    return Ok(updated);
                },
                None => debug!("🔄️📦️ Order {id} changed while updating {} (attempt {attempt})", transition.field()),
            }
        }
        warn!("🔄️📦️ Giving up on changing {} for order {id}", transition.field());
        Err(OrderFlowError::Conflict(id, MAX_TRANSITION_ATTEMPTS))
    }

    async fn on_cancelled(&self, order: Order) -> Result<(), OrderFlowError> {
        let released = self.db.release_products_for_order(order.id).await?;
        info!("🔄️📦️ Order {} cancelled. {} products are back on sale.", order.id, released.len());
        let event = OrderCancelledEvent::new(order, released);
        for emitter in &self.producers.order_cancelled_producer {
            emitter.publish_event(event.clone()).await;
        }
        Ok(())
    }

    /// Marks the order as paid after a gateway verified the payment, and confirms it if it is still pending.
    ///
    /// The amount is recorded on the event but is not compared with the order total. Calling this for an order that is
    /// already paid changes nothing. A cancelled order keeps its status; only its payment status is updated.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        method: PaymentMethod,
        gateway_txn_id: Option<String>,
        amount: Option<Paisa>,
    ) -> Result<Order, OrderFlowError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let order = self.fetch_order(id).await?;
            match order.payment_status {
                PaymentStatus::Paid => {
                    debug!("🔄️💳️ Order {id} is already paid. Ignoring the repeat confirmation.");
                    return Ok(order);
                },
                PaymentStatus::Refunded => {
                    warn!("🔄️💳️ {method} confirmed payment for order {id}, which has been refunded. Leaving it as is.");
                    return Ok(order);
                },
                PaymentStatus::Pending => {},
            }
            let mut changes =
                vec![FieldChange::for_transition(&order, OrderTransition::PaymentStatus(PaymentStatus::Paid))];
            match order.status {
                OrderStatusType::Pending => {
                    changes.push(FieldChange::for_transition(&order, OrderTransition::Status(OrderStatusType::Confirmed)))
                },
                OrderStatusType::Cancelled => {
                    warn!("🔄️💳️ {method} payment received for cancelled order {id}. It will need a manual refund.")
                },
                OrderStatusType::Confirmed => {},
            }
            match self.db.apply_field_changes(id, None, &changes).await? {
                Some(updated) => {
                    let amount_str = amount.map(|a| a.to_string()).unwrap_or_else(|| "an unknown amount".into());
                    info!("🔄️💳️ Order {id} paid via {method} ({amount_str})");
                    let event = OrderPaidEvent::new(updated.clone(), method, gateway_txn_id, amount);
                    for emitter in &self.producers.order_paid_producer {
                        emitter.publish_event(event.clone()).await;
                    }
                    return Ok(updated);
                },
                None => debug!("🔄️💳️ Order {id} changed while marking it paid (attempt {attempt})"),
            }
        }
        Err(OrderFlowError::Conflict(id, MAX_TRANSITION_ATTEMPTS))
    }
}

/// Decides whether `actor` may apply `transition` to `order` as it currently stands. `Ok(None)` means the field
/// already holds the requested value.
pub fn check_transition(
    order: &Order,
    actor: Actor,
    transition: OrderTransition,
) -> Result<Option<FieldChange>, OrderFlowError> {
    let change = FieldChange::for_transition(order, transition);
    if change.old_value == change.new_value {
        return Ok(None);
    }
    match transition {
        OrderTransition::Status(to) => {
            let from = order.status;
            if from == OrderStatusType::Cancelled {
                return Err(OrderFlowError::forbidden_status_change(from, to));
            }
            match (actor, to) {
                (Actor::User(user), OrderStatusType::Cancelled) if order.is_bought_by(user) => {},
                (Actor::User(user), OrderStatusType::Cancelled) => {
                    return Err(OrderFlowError::Forbidden(format!("{user} did not place order {}", order.id)))
                },
                (Actor::System, OrderStatusType::Cancelled) => {
                    return Err(OrderFlowError::Forbidden("Only the buyer can cancel an order".into()))
                },
                (Actor::System, OrderStatusType::Confirmed) if from == OrderStatusType::Pending => {},
                _ => return Err(OrderFlowError::forbidden_status_change(from, to)),
            }
        },
        OrderTransition::PaymentStatus(to) => {
            let from = order.payment_status;
            if let Actor::User(user) = actor {
                return Err(OrderFlowError::Forbidden(format!("{user} cannot change the payment status of an order")));
            }
            match (from, to) {
                (PaymentStatus::Pending, PaymentStatus::Paid) | (PaymentStatus::Paid, PaymentStatus::Refunded) => {},
                _ => return Err(OrderFlowError::forbidden_payment_change(from, to)),
            }
        },
    }
    Ok(Some(change))
}
