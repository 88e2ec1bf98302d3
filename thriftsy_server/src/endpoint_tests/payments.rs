use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::{json, Value};
use thriftsy_engine::{
    db_types::{LedgerStatus, Order, OrderStatusType, PaymentMethod, PaymentStatus},
    AuditManagement,
    OrderManagement,
    PaymentLedgerManagement,
};
use thriftsy_gateways::{signature, CallbackFields};
use wiremock::{
    matchers::{body_json, method, path},
    Mock,
    MockServer,
    ResponseTemplate,
};

use super::helpers::*;

const PIDX: &str = "HT6o6PEZRWFJ5ygavzHWd5";
const ESEWA_SIGNED: &str = "transaction_code,status,total_amount,transaction_uuid,product_code,signed_field_names";

async fn reload(ctx: &TestContext, order: &Order) -> Order {
    ctx.db.fetch_order_by_id(order.id).await.unwrap().expect("Order has gone missing")
}

/// The base64 `data` envelope eSewa appends to the success URL, signed with the merchant secret.
fn esewa_envelope(token: &str, status: &str, total_amount: &str, secret: &str) -> String {
    let mut fields = CallbackFields::from_pairs([
        ("transaction_code", "000AWEO"),
        ("status", status),
        ("total_amount", total_amount),
        ("transaction_uuid", token),
        ("product_code", "EPAYTEST"),
        ("signed_field_names", ESEWA_SIGNED),
    ]);
    let names = signature::signed_field_names(ESEWA_SIGNED);
    let message = signature::canonical_message(&fields, &names);
    fields.insert("signature", signature::sign(secret, &message));
    base64::encode(fields.to_json().to_string())
}

async fn initiate_esewa(ctx: &TestContext, order: &Order) -> Value {
    let body = json!({"amount": order.total, "product_label": "Wool sweater", "order_id": order.id});
    let req = TestRequest::post()
        .uri("/api/payments/initiate/esewa")
        .insert_header(bearer(&user_token(ALICE)))
        .set_json(body);
    let res = ctx.send(req).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    res.json()
}

//----------------------------------------------   Initiation  ----------------------------------------------------

#[actix_web::test]
async fn esewa_initiation_returns_a_signed_form() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Cod, 1500).await;
    let res = initiate_esewa(&ctx, &order).await;
    assert_eq!(res["order_id"], json!(order.id));
    assert_eq!(res["endpoint"], "https://rc-epay.esewa.com.np/api/epay/main/v2/form");
    assert_eq!(res["fields"]["total_amount"], "1500");
    assert_eq!(res["fields"]["product_code"], "EPAYTEST");
    assert_eq!(res["fields"]["success_url"], "http://api.thriftsy.test/api/payments/callback/esewa");
    assert_eq!(res["fields"]["failure_url"], "http://api.thriftsy.test/api/payments/callback/esewa/failure");
    let token = res["fields"]["transaction_uuid"].as_str().unwrap().to_string();
    assert!(token.starts_with(&format!("order-{}-", order.id.value())));

    let order = reload(&ctx, &order).await;
    assert_eq!(order.esewa_transaction_uuid.as_deref(), Some(token.as_str()));
    assert_eq!(order.payment_method, PaymentMethod::Esewa);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    ctx.teardown().await;
}

#[actix_web::test]
async fn initiation_can_create_the_order() {
    let ctx = TestContext::new().await;
    let lamp = ctx.list_product("Brass lamp", 900).await;
    let body = json!({
        "amount": 90000,
        "productName": "Brass lamp",
        "order": {
            "items": [{"product_id": lamp.id, "title": "Brass lamp", "price": 90000}],
            "payment_method": "esewa"
        }
    });
    let req =
        TestRequest::post().uri("/api/payments/initiate/esewa").insert_header(bearer(&user_token(BOB))).set_json(body);
    let res = ctx.send(req).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let orders = ctx.db.fetch_orders_for_buyer(BOB).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(res.json()["order_id"], json!(orders[0].id));
    assert!(orders[0].esewa_transaction_uuid.is_some());
    ctx.teardown().await;
}

#[actix_web::test]
async fn initiation_is_validated() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Cod, 1500).await;
    let token = user_token(ALICE);
    let req = |uri: &str, body: Value, token: &str| TestRequest::post().uri(uri).insert_header(bearer(token)).set_json(body);

    let body = json!({"amount": 150000, "product_label": "Sweater", "order_id": order.id});
    let res = ctx.send(req("/api/payments/initiate/cod", body.clone(), &token)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST, "Cash on delivery has no gateway");
    let res = ctx.send(req("/api/payments/initiate/paypal", body.clone(), &token)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = ctx.send(req("/api/payments/initiate/esewa", body.clone(), &user_token(BOB))).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN, "Bob cannot pay for Alice's order");

    let res = ctx
        .send(req("/api/payments/initiate/esewa", json!({"amount": 0, "product_label": "Sweater", "order_id": order.id}), &token))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = ctx
        .send(req("/api/payments/initiate/esewa", json!({"amount": 150000, "product_label": " ", "order_id": order.id}), &token))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = ctx.send(req("/api/payments/initiate/esewa", json!({"amount": 150000, "product_label": "x"}), &token)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let order = reload(&ctx, &order).await;
    assert!(order.esewa_transaction_uuid.is_none());
    ctx.teardown().await;
}

//----------------------------------------------   eSewa callbacks  ----------------------------------------------------

#[actix_web::test]
async fn esewa_success_marks_the_order_paid() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Esewa, 1500).await;
    let res = initiate_esewa(&ctx, &order).await;
    let token = res["fields"]["transaction_uuid"].as_str().unwrap().to_string();

    let data = esewa_envelope(&token, "COMPLETE", "1500.0", ESEWA_SECRET);
    let uri = format!("/api/payments/callback/esewa?data={}", urlencoding::encode(&data));
    let res = ctx.send(TestRequest::get().uri(&uri)).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/order/{}", order.id.value())));

    let paid = reload(&ctx, &order).await;
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.status, OrderStatusType::Confirmed);
    let ledger = ctx.db.fetch_ledger_entries_for_order(order.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].status, LedgerStatus::Verified);
    assert_eq!(ledger[0].gateway_txn_id.as_deref(), Some(token.as_str()));
    assert_eq!(ledger[0].amount.map(|a| a.value()), Some(150_000));

    // eSewa may redirect the browser twice. The second visit changes nothing but is still logged.
    let res = ctx.send(TestRequest::get().uri(&uri)).await;
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/order/{}", order.id.value())));
    let audit = ctx.db.fetch_audit_log(order.id).await.unwrap();
    assert_eq!(audit.len(), 2, "payment_status and status each change once");
    ctx.teardown().await;
}

#[actix_web::test]
async fn esewa_callbacks_can_be_posted() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Esewa, 200).await;
    let token = initiate_esewa(&ctx, &order).await["fields"]["transaction_uuid"].as_str().unwrap().to_string();
    let data = esewa_envelope(&token, "COMPLETE", "200", ESEWA_SECRET);
    let req = TestRequest::post().uri("/api/payments/callback/esewa").set_json(json!({ "data": data }));
    let res = ctx.send(req).await;
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/order/{}", order.id.value())));
    assert_eq!(reload(&ctx, &order).await.payment_status, PaymentStatus::Paid);
    ctx.teardown().await;
}

#[actix_web::test]
async fn esewa_forged_signature_is_rejected() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Esewa, 1500).await;
    let token = initiate_esewa(&ctx, &order).await["fields"]["transaction_uuid"].as_str().unwrap().to_string();

    let data = esewa_envelope(&token, "COMPLETE", "1500", "not-the-merchant-secret");
    let uri = format!("/api/payments/callback/esewa?data={}", urlencoding::encode(&data));
    let res = ctx.send(TestRequest::get().uri(&uri)).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/failure?method=esewa&reason=signature")));

    let order = reload(&ctx, &order).await;
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.status, OrderStatusType::Pending);
    let ledger = ctx.db.fetch_ledger_entries(10).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].status, LedgerStatus::Pending);
    assert_eq!(ledger[0].order_id, None);
    ctx.teardown().await;
}

#[actix_web::test]
async fn esewa_pending_and_unknown_tokens() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Esewa, 300).await;
    let token = initiate_esewa(&ctx, &order).await["fields"]["transaction_uuid"].as_str().unwrap().to_string();

    let data = esewa_envelope(&token, "PENDING", "300", ESEWA_SECRET);
    let res = ctx.send(TestRequest::get().uri(&format!("/api/payments/callback/esewa?data={}", urlencoding::encode(&data)))).await;
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/order/{}?payment=pending&method=esewa", order.id.value())));
    assert_eq!(reload(&ctx, &order).await.payment_status, PaymentStatus::Pending);

    let data = esewa_envelope("order-999-1", "COMPLETE", "300", ESEWA_SECRET);
    let res = ctx.send(TestRequest::get().uri(&format!("/api/payments/callback/esewa?data={}", urlencoding::encode(&data)))).await;
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/failure?method=esewa&reason=unknown-order&txn=order-999-1")));

    let ledger = ctx.db.fetch_ledger_entries(10).await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().all(|e| e.status == LedgerStatus::Pending));
    ctx.teardown().await;
}

#[actix_web::test]
async fn esewa_failure_url() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Esewa, 300).await;
    let token = initiate_esewa(&ctx, &order).await["fields"]["transaction_uuid"].as_str().unwrap().to_string();

    let uri = format!("/api/payments/callback/esewa/failure?transaction_uuid={token}");
    let res = ctx.send(TestRequest::get().uri(&uri)).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/failure?method=esewa&reason=cancelled&txn={token}")));

    let ledger = ctx.db.fetch_ledger_entries_for_order(order.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].status, LedgerStatus::Pending);
    assert_eq!(reload(&ctx, &order).await.payment_status, PaymentStatus::Pending);

    let res = ctx.send(TestRequest::post().uri("/api/payments/callback/esewa/failure")).await;
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/failure?method=esewa&reason=cancelled")));
    ctx.teardown().await;
}

#[actix_web::test]
async fn callbacks_for_unknown_methods_still_redirect() {
    let ctx = TestContext::new().await;
    let res = ctx.send(TestRequest::get().uri("/api/payments/callback/paypal?token=abc")).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/failure?method=paypal&reason=unsupported-method")));
    ctx.teardown().await;
}

//----------------------------------------------   Khalti  ----------------------------------------------------

async fn khalti_context(server: &MockServer) -> TestContext {
    TestContext::with_khalti_url(&format!("{}/api/v2", server.uri())).await
}

async fn mock_lookup(server: &MockServer, status: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v2/epayment/lookup/"))
        .and(body_json(json!({ "pidx": PIDX })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pidx": PIDX,
            "total_amount": 50000,
            "status": status,
            "transaction_id": "GFq9PFS7b2iYvL8Lir9oXe",
            "fee": 0,
            "refunded": false
        })))
        .mount(server)
        .await;
}

async fn khalti_order(ctx: &TestContext) -> Order {
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Khalti, 500).await;
    ctx.orders_api().attach_gateway_token(order.id, PaymentMethod::Khalti, PIDX).await.unwrap()
}

#[actix_web::test]
async fn khalti_initiation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/epayment/initiate/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pidx": PIDX,
            "payment_url": format!("https://test-pay.khalti.com/?pidx={PIDX}"),
            "expires_at": "2026-10-19T12:00:00+05:45",
            "expires_in": 1800
        })))
        .expect(1)
        .mount(&server)
        .await;
    let ctx = khalti_context(&server).await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Khalti, 500).await;

    let body = json!({"amount": 50000, "product_label": "Wool sweater", "order_id": order.id});
    let req = TestRequest::post()
        .uri("/api/payments/initiate/khalti")
        .insert_header(bearer(&user_token(ALICE)))
        .set_json(body);
    let res = ctx.send(req).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let res = res.json();
    assert_eq!(res["pidx"], PIDX);
    assert_eq!(res["payment_url"], format!("https://test-pay.khalti.com/?pidx={PIDX}"));
    assert_eq!(reload(&ctx, &order).await.khalti_pidx.as_deref(), Some(PIDX));
    ctx.teardown().await;
}

#[actix_web::test]
async fn khalti_completed_payment() {
    let server = MockServer::start().await;
    mock_lookup(&server, "Completed").await;
    let ctx = khalti_context(&server).await;
    let order = khalti_order(&ctx).await;

    // The redirect's own status is ignored. Only the lookup counts.
    let uri = format!("/api/payments/callback/khalti?pidx={PIDX}&status=Pending&amount=1");
    let res = ctx.send(TestRequest::get().uri(&uri)).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/order/{}", order.id.value())));

    let order = reload(&ctx, &order).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.status, OrderStatusType::Confirmed);
    let ledger = ctx.db.fetch_ledger_entries_for_order(order.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].status, LedgerStatus::Verified);
    assert_eq!(ledger[0].gateway_txn_id.as_deref(), Some("GFq9PFS7b2iYvL8Lir9oXe"));
    assert_eq!(ledger[0].amount.map(|a| a.value()), Some(50_000));
    ctx.teardown().await;
}

#[actix_web::test]
async fn khalti_pending_payment() {
    let server = MockServer::start().await;
    mock_lookup(&server, "Pending").await;
    let ctx = khalti_context(&server).await;
    let order = khalti_order(&ctx).await;

    let res = ctx.send(TestRequest::get().uri(&format!("/api/payments/callback/khalti?pidx={PIDX}"))).await;
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/order/{}?payment=pending&method=khalti", order.id.value())));
    assert_eq!(reload(&ctx, &order).await.payment_status, PaymentStatus::Pending);
    ctx.teardown().await;
}

#[actix_web::test]
async fn khalti_cancelled_payment() {
    let server = MockServer::start().await;
    mock_lookup(&server, "User canceled").await;
    let ctx = khalti_context(&server).await;
    let order = khalti_order(&ctx).await;

    let res = ctx.send(TestRequest::get().uri(&format!("/api/payments/callback/khalti?pidx={PIDX}"))).await;
    assert_eq!(
        res.location,
        Some(format!("{CLIENT_URL}/failure?method=khalti&reason=user%20canceled&txn=GFq9PFS7b2iYvL8Lir9oXe"))
    );
    assert_eq!(reload(&ctx, &order).await.payment_status, PaymentStatus::Pending);
    ctx.teardown().await;
}

#[actix_web::test]
async fn khalti_unreachable() {
    let ctx = TestContext::new().await;
    khalti_order(&ctx).await;
    let res = ctx.send(TestRequest::get().uri(&format!("/api/payments/callback/khalti?pidx={PIDX}"))).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/failure?method=khalti&reason=gateway-unavailable")));
    let ledger = ctx.db.fetch_ledger_entries(10).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].status, LedgerStatus::Pending);

    let res = ctx.send(TestRequest::get().uri("/api/payments/callback/khalti")).await;
    assert_eq!(res.location, Some(format!("{CLIENT_URL}/failure?method=khalti&reason=missing-pidx")));
    ctx.teardown().await;
}

//----------------------------------------------   Verify & ledger  ----------------------------------------------------

#[actix_web::test]
async fn verify_gateway_payment() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Esewa, 1500).await;
    let token = initiate_esewa(&ctx, &order).await["fields"]["transaction_uuid"].as_str().unwrap().to_string();

    let req = TestRequest::post()
        .uri("/api/payments/verify")
        .insert_header(("user-agent", "thriftsy-web/1.0"))
        .set_json(json!({"method": "esewa", "txn": token}));
    let res = ctx.send(req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), json!({"ok": true, "reconciled": true, "order_id": order.id, "txn": token}));

    let req = TestRequest::post()
        .uri("/api/payments/verify")
        .set_json(json!({"method": "esewa", "orderId": order.id, "txn": "order-1-1"}));
    let res = ctx.send(req).await;
    assert_eq!(res.json()["reconciled"], false);

    let ledger = ctx.db.fetch_ledger_entries_for_order(order.id).await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0].status, LedgerStatus::Verified);
    assert_eq!(ledger[1].status, LedgerStatus::Pending);
    let raw = ledger[0].raw_payload.as_ref().map(|j| j.0.clone()).unwrap_or_default();
    assert_eq!(raw["client"], "thriftsy-web/1.0");
    ctx.teardown().await;
}

#[actix_web::test]
async fn verify_offline_payment() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Cod, 700).await;
    let body = json!({"method": "cod", "order_id": order.id});
    let res = ctx.send(TestRequest::post().uri("/api/payments/verify").set_json(&body)).await;
    assert_eq!(res.json()["reconciled"], false);

    ctx.orders_api().mark_paid(order.id, PaymentMethod::Cod, None, None).await.unwrap();
    let res = ctx.send(TestRequest::post().uri("/api/payments/verify").set_json(&body)).await;
    assert_eq!(res.json()["reconciled"], true);

    let res = ctx.send(TestRequest::post().uri("/api/payments/verify").set_json(json!({"method": "khalti"}))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["ok"], false);
    assert_eq!(ctx.db.fetch_ledger_entries(10).await.unwrap().len(), 3);
    ctx.teardown().await;
}

#[actix_web::test]
async fn verify_unknown_order_is_still_recorded() {
    let ctx = TestContext::new().await;
    let body = json!({"method": "cod", "order_id": 424242});
    let res = ctx.send(TestRequest::post().uri("/api/payments/verify").set_json(&body)).await;
    assert_eq!(res.status, StatusCode::OK);
    let verdict = res.json();
    assert_eq!(verdict["ok"], false);
    assert_eq!(verdict["reconciled"], false);
    assert_eq!(verdict["order_id"], 424242);

    let entries = ctx.db.fetch_ledger_entries(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, LedgerStatus::Pending);
    assert_eq!(entries[0].order_id, None);
    let raw = entries[0].raw_payload.as_ref().map(|j| j.0.clone()).unwrap_or_default();
    assert_eq!(raw["requested_order_id"], 424242);
    ctx.teardown().await;
}

#[actix_web::test]
async fn ledger_is_for_admins_only() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Cod, 700).await;
    let body = json!({"method": "cod", "order_id": order.id});
    ctx.send(TestRequest::post().uri("/api/payments/verify").set_json(&body)).await;

    let res = ctx.send(TestRequest::get().uri("/api/payments/ledger")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let res = ctx.send(TestRequest::get().uri("/api/payments/ledger").insert_header(bearer(&user_token(ALICE)))).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = ctx.send(TestRequest::get().uri("/api/payments/ledger?limit=5").insert_header(bearer(&admin_token()))).await;
    assert_eq!(res.status, StatusCode::OK);
    let entries = res.json();
    assert_eq!(entries.as_array().map(|a| a.len()), Some(1));
    assert_eq!(entries[0]["method"], "cod");
    assert_eq!(entries[0]["status"], "pending");

    let uri = format!("/api/payments/ledger/{}", order.id.value());
    let res = ctx.send(TestRequest::get().uri(&uri).insert_header(bearer(&admin_token()))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()[0]["order_id"], json!(order.id));
    ctx.teardown().await;
}
