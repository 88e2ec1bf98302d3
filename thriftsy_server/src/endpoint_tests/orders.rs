use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use thriftsy_engine::db_types::PaymentMethod;

use super::helpers::*;

#[actix_web::test]
async fn my_orders_without_a_token() {
    let ctx = TestContext::new().await;
    let res = ctx.send(TestRequest::get().uri("/api/orders")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    ctx.teardown().await;
}

#[actix_web::test]
async fn my_orders_with_a_forged_token() {
    let ctx = TestContext::new().await;
    let mut token = user_token(ALICE);
    token.replace_range(token.len() - 10..token.len() - 5, "AAAAA");
    let res = ctx.send(TestRequest::get().uri("/api/orders").insert_header(bearer(&token))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    ctx.teardown().await;
}

#[actix_web::test]
async fn checkout_is_idempotent() {
    let ctx = TestContext::new().await;
    let jacket = ctx.list_product("Denim jacket", 1500).await;
    let body = json!({
        "items": [{"product_id": jacket.id, "title": "Denim jacket", "price": 150000}],
        "payment_method": "esewa",
        "shipping": 10000,
        "idempotency_key": "cart-alice-1"
    });
    let token = user_token(ALICE);
    let req = || TestRequest::post().uri("/api/orders").insert_header(bearer(&token)).set_json(&body);

    let first = ctx.send(req()).await;
    assert_eq!(first.status, StatusCode::CREATED);
    let first = first.json();
    assert_eq!(first["existing"], false);
    assert_eq!(first["order"]["buyer_id"], 1);
    assert_eq!(first["order"]["total"], 160000);
    assert_eq!(first["order"]["status"], "pending");
    assert_eq!(first["unclaimed"], json!([]));

    let second = ctx.send(req()).await;
    assert_eq!(second.status, StatusCode::OK);
    let second = second.json();
    assert_eq!(second["existing"], true);
    assert_eq!(second["order"]["id"], first["order"]["id"]);

    let mine = ctx.send(TestRequest::get().uri("/api/orders").insert_header(bearer(&token))).await;
    assert_eq!(mine.status, StatusCode::OK);
    let mine = mine.json();
    assert_eq!(mine.as_array().map(|a| a.len()), Some(1));
    assert_eq!(mine[0]["items"][0]["product_id"], json!(jacket.id));
    ctx.teardown().await;
}

#[actix_web::test]
async fn guests_cannot_check_out_by_default() {
    let ctx = TestContext::new().await;
    let body = json!({"items": [{"title": "Scarf", "price": 20000}], "payment_method": "cod"});
    let res = ctx.send(TestRequest::post().uri("/api/orders").set_json(&body)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    ctx.teardown().await;
}

#[actix_web::test]
async fn empty_carts_are_rejected() {
    let ctx = TestContext::new().await;
    let body = json!({"items": [], "payment_method": "cod"});
    let res = ctx.send(TestRequest::post().uri("/api/orders").insert_header(bearer(&user_token(ALICE))).set_json(&body)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    ctx.teardown().await;
}

#[actix_web::test]
async fn orders_are_private_to_their_buyer() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Cod, 800).await;
    let uri = format!("/api/orders/{}", order.id.value());

    let res = ctx.send(TestRequest::get().uri(&uri).insert_header(bearer(&user_token(ALICE)))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["items"].as_array().map(|a| a.len()), Some(1));

    let res = ctx.send(TestRequest::get().uri(&uri).insert_header(bearer(&user_token(BOB)))).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = ctx.send(TestRequest::get().uri(&uri).insert_header(bearer(&admin_token()))).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = ctx.send(TestRequest::get().uri("/api/orders/9999").insert_header(bearer(&admin_token()))).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    ctx.teardown().await;
}

#[actix_web::test]
async fn sellers_see_their_sales() {
    let ctx = TestContext::new().await;
    ctx.place_order(Some(ALICE), PaymentMethod::Cod, 800).await;
    ctx.place_order(Some(BOB), PaymentMethod::Cod, 1200).await;
    let res = ctx.send(TestRequest::get().uri("/api/orders/sold").insert_header(bearer(&user_token(SELLER)))).await;
    assert_eq!(res.status, StatusCode::OK);
    let sales = res.json();
    assert_eq!(sales["sales"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(sales["revenue"][0]["seller_id"], 10);
    assert_eq!(sales["revenue"][0]["total"], 200000);

    let res = ctx.send(TestRequest::get().uri("/api/orders/sold").insert_header(bearer(&user_token(ALICE)))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["sales"], json!([]));
    ctx.teardown().await;
}

#[actix_web::test]
async fn buyers_can_cancel_but_not_pay() {
    let ctx = TestContext::new().await;
    let order = ctx.place_order(Some(ALICE), PaymentMethod::Khalti, 500).await;
    let uri = format!("/api/orders/{}", order.id.value());
    let token = user_token(ALICE);

    let res = ctx
        .send(TestRequest::put().uri(&uri).insert_header(bearer(&token)).set_json(json!({"payment_status": "paid"})))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = ctx
        .send(TestRequest::put().uri(&uri).insert_header(bearer(&user_token(BOB))).set_json(json!({"status": "cancelled"})))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = ctx
        .send(TestRequest::put().uri(&uri).insert_header(bearer(&token)).set_json(json!({"status": "cancelled"})))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["status"], "cancelled");

    let res = ctx.send(TestRequest::put().uri(&uri).insert_header(bearer(&token)).set_json(json!({}))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let audit_uri = format!("{uri}/audit");
    let res = ctx.send(TestRequest::get().uri(&audit_uri).insert_header(bearer(&token))).await;
    assert_eq!(res.status, StatusCode::OK);
    let audit = res.json();
    assert_eq!(audit.as_array().map(|a| a.len()), Some(1));
    assert_eq!(audit[0]["field"], "status");
    assert_eq!(audit[0]["old_value"], "pending");
    assert_eq!(audit[0]["new_value"], "cancelled");
    assert_eq!(audit[0]["actor_id"], 1);

    let res = ctx.send(TestRequest::get().uri(&audit_uri).insert_header(bearer(&user_token(BOB)))).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    ctx.teardown().await;
}
