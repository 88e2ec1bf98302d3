use cucumber::{then, when};
use thriftsy_engine::{
    db_types::{
        Actor,
        CartItem,
        LedgerStatus,
        NewLedgerEntry,
        NewOrder,
        OrderStatusType,
        OrderTransition,
        PaymentMethod,
        PaymentStatus,
        ProductStatus,
        UserId,
    },
    AuditManagement,
    ProductAvailability,
};

use crate::cucumber::MarketplaceWorld;

async fn cart(world: &MarketplaceWorld, titles: &str) -> Vec<CartItem> {
    let mut items = Vec::new();
    for title in titles.split(',').map(str::trim) {
        let id = world.product(title);
        let product = world.system().db.fetch_product(id).await.unwrap().expect("Listing vanished");
        items.push(CartItem::new(Some(id), product.title, product.price));
    }
    items
}

fn method(s: &str) -> PaymentMethod {
    s.parse().unwrap_or_else(|e| panic!("{e}"))
}

#[when(expr = "buyer {int} checks out {string} with {word} as {string}")]
async fn checkout(world: &mut MarketplaceWorld, buyer: i64, titles: String, pay_by: String, name: String) {
    let items = cart(world, &titles).await;
    let order = NewOrder::new(Some(UserId(buyer)), items, method(&pay_by));
    let result = world.system().orders.create_order(order).await.expect("Checkout failed");
    world.orders.insert(name, result);
}

#[when(expr = "buyer {int} submits the checkout for {string} {int} times at once with key {string}")]
async fn checkout_burst(world: &mut MarketplaceWorld, buyer: i64, titles: String, n: usize, key: String) {
    let items = cart(world, &titles).await;
    let api = &world.system().orders;
    let requests = (0..n).map(|_| {
        let order = NewOrder::new(Some(UserId(buyer)), items.clone(), PaymentMethod::Cod).with_idempotency_key(&key);
        api.create_order(order)
    });
    let results = futures_util::future::join_all(requests).await;
    let results = results.into_iter().map(|r| r.expect("Checkout failed")).collect::<Vec<_>>();
    let id = results[0].order.id;
    assert!(results.iter().all(|r| r.order.id == id), "Requests resolved to different orders");
    let fresh = results.iter().filter(|r| !r.existing).count();
    assert_eq!(fresh, 1, "{fresh} requests claim to have created the order");
    world.orders.insert(key, results[0].clone());
}

#[when(expr = "buyers {int} and {int} check out {string} at the same time as {string} and {string}")]
async fn racing_checkouts(
    world: &mut MarketplaceWorld,
    buyer_a: i64,
    buyer_b: i64,
    titles: String,
    name_a: String,
    name_b: String,
) {
    let items = cart(world, &titles).await;
    let api = &world.system().orders;
    let a = NewOrder::new(Some(UserId(buyer_a)), items.clone(), PaymentMethod::Esewa);
    let b = NewOrder::new(Some(UserId(buyer_b)), items, PaymentMethod::Khalti);
    let (a, b) = futures_util::join!(api.create_order(a), api.create_order(b));
    world.orders.insert(name_a, a.expect("First checkout failed"));
    world.orders.insert(name_b, b.expect("Second checkout failed"));
}

#[when(expr = "buyer {int} cancels {string}")]
async fn cancel(world: &mut MarketplaceWorld, buyer: i64, name: String) {
    let id = world.order_id(&name);
    let transition = OrderTransition::Status(OrderStatusType::Cancelled);
    match world.system().orders.transition(id, Actor::User(UserId(buyer)), transition).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when(expr = "the catalog marks {string} as sold")]
async fn mark_sold(world: &mut MarketplaceWorld, title: String) {
    let id = world.product(&title);
    world.system().db.set_product_status(id, ProductStatus::Sold).await.expect("Could not mark listing sold");
}

#[when(expr = "{word} verifies payment of Rs {int} for {string} with transaction {string}")]
async fn gateway_verified(world: &mut MarketplaceWorld, gateway: String, rupees: i64, name: String, txn: String) {
    let id = world.order_id(&name);
    let method = method(&gateway);
    let amount = Some(thriftsy_engine::db_types::Paisa::from_rupees(rupees));
    let system = world.system();
    system.orders.mark_paid(id, method, Some(txn.clone()), amount).await.expect("Could not mark order paid");
    let entry = NewLedgerEntry::new(method, LedgerStatus::Verified)
        .with_order_id(Some(id))
        .with_gateway_txn_id(Some(txn))
        .with_amount(amount);
    system.ledger.record(entry).await;
}

#[when(expr = "{word} reports the payment for {string} as still pending")]
async fn gateway_pending(world: &mut MarketplaceWorld, gateway: String, name: String) {
    let id = world.order_id(&name);
    let entry = NewLedgerEntry::new(method(&gateway), LedgerStatus::Pending).with_order_id(Some(id));
    world.system().ledger.record(entry).await;
}

#[then(expr = "order {string} is {word} with payment {word}")]
async fn check_order(world: &mut MarketplaceWorld, name: String, status: String, payment: String) {
    let order = world.system().orders.fetch_order(world.order_id(&name)).await.expect("Order not found");
    assert_eq!(order.status, status.parse::<OrderStatusType>().unwrap());
    assert_eq!(order.payment_status, payment.parse::<PaymentStatus>().unwrap());
}

#[then(expr = "{string} is {word}")]
async fn check_product(world: &mut MarketplaceWorld, title: String, status: String) {
    let product = world.system().db.fetch_product(world.product(&title)).await.unwrap().expect("Listing vanished");
    assert_eq!(product.status, status.parse::<ProductStatus>().unwrap(), "{title} has the wrong status");
}

#[then(expr = "order {string} has {int} items and nothing unclaimed")]
async fn check_fully_claimed(world: &mut MarketplaceWorld, name: String, n: usize) {
    let result = world.orders.get(&name).expect("No such order");
    assert_eq!(result.items.len(), n);
    assert!(result.unclaimed.is_empty(), "Unclaimed: {:?}", result.unclaimed);
}

#[then(expr = "exactly one of {string} and {string} holds {string}")]
async fn check_single_holder(world: &mut MarketplaceWorld, a: String, b: String, title: String) {
    let id = world.product(&title);
    let unclaimed_by = |name: &str| world.orders.get(name).expect("No such order").unclaimed.contains(&id);
    assert!(unclaimed_by(&a) ^ unclaimed_by(&b), "{title} must be held by exactly one order");
}

#[then(expr = "order {string} reports {string} as unclaimed")]
async fn check_unclaimed(world: &mut MarketplaceWorld, name: String, title: String) {
    let id = world.product(&title);
    let result = world.orders.get(&name).expect("No such order");
    assert_eq!(result.unclaimed, vec![id]);
    let item = result.items.iter().find(|i| i.product_id == Some(id)).expect("Item missing from order");
    assert!(!item.claimed, "{title} is marked as claimed by {name}");
}

#[then(expr = "there is {int} order for buyer {int}")]
async fn check_order_count(world: &mut MarketplaceWorld, n: usize, buyer: i64) {
    use thriftsy_engine::OrderManagement;
    let orders = world.system().db.fetch_orders_for_buyer(UserId(buyer)).await.unwrap();
    assert_eq!(orders.len(), n);
}

#[then(expr = "the ledger for {string} has {int} verified and {int} pending entries")]
async fn check_ledger(world: &mut MarketplaceWorld, name: String, verified: usize, pending: usize) {
    let entries = world.system().ledger.for_order(world.order_id(&name)).await.unwrap();
    let count = |s: LedgerStatus| entries.iter().filter(|e| e.status == s).count();
    assert_eq!(count(LedgerStatus::Verified), verified);
    assert_eq!(count(LedgerStatus::Pending), pending);
}

#[then(expr = "the audit log for {string} has {int} entries")]
async fn check_audit(world: &mut MarketplaceWorld, name: String, n: usize) {
    let log = world.system().db.fetch_audit_log(world.order_id(&name)).await.unwrap();
    assert_eq!(log.len(), n, "{log:?}");
}

#[then("the request is forbidden")]
async fn check_forbidden(world: &mut MarketplaceWorld) {
    let err = world.last_error.as_deref().expect("The request succeeded");
    assert!(err.starts_with("Forbidden"), "Unexpected error: {err}");
}
