//! Notification hooks for the order flow's domain events.
//!
//! The marketplace has no mailer or push service wired in yet, so the hooks log what a notification would say. Buyer
//! and seller notifications hang off the same three events.
use log::*;
use thriftsy_engine::events::{EventHooks, HookFuture, OrderCancelledEvent, OrderCreatedEvent, OrderPaidEvent};

pub const EVENT_BUFFER_SIZE: usize = 25;

pub fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev| Box::pin(async move { order_created(ev) }) as HookFuture)
        .on_order_paid(|ev| Box::pin(async move { order_paid(ev) }) as HookFuture)
        .on_order_cancelled(|ev| Box::pin(async move { order_cancelled(ev) }) as HookFuture);
    hooks
}

fn order_created(ev: OrderCreatedEvent) {
    let buyer = ev.order.buyer_id.map(|b| b.to_string()).unwrap_or_else(|| "guest".into());
    info!("📬️ Order {} placed by {buyer}: {} items, total {}", ev.order.id, ev.items.len(), ev.order.total);
    if !ev.unclaimed.is_empty() {
        warn!("📬️ Order {}: tell the buyer that products {:?} were no longer available", ev.order.id, ev.unclaimed);
    }
}

fn order_paid(ev: OrderPaidEvent) {
    let txn = ev.gateway_txn_id.as_deref().unwrap_or("-");
    info!("📬️ Order {} paid via {} (txn {txn}). Sellers can ship.", ev.order.id, ev.method);
}

fn order_cancelled(ev: OrderCancelledEvent) {
    info!("📬️ Order {} cancelled. {} products are listed again.", ev.order.id, ev.released.len());
}
