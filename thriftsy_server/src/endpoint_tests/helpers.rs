use std::time::Duration;

use actix_web::{
    body::MessageBody,
    http::{header, StatusCode},
    test,
    test::TestRequest,
    web,
    App,
    HttpResponse,
    ResponseError,
};
use chrono::{Days, Utc};
use log::debug;
use serde_json::Value;
use thriftsy_engine::{
    db_types::{CartItem, NewOrder, NewProduct, Order, Paisa, PaymentMethod, Product, UserId},
    events::EventProducers,
    test_utils::prepare_env::{destroy_database, prepare_test_env, random_db_path},
    HistoryApi,
    LedgerApi,
    OrderFlowApi,
    ProductAvailability,
    SqliteDatabase,
};
use thriftsy_gateways::{EsewaConfig, EsewaEnvironment, KhaltiConfig};

use crate::{
    auth::{JwtClaims, Role, TokenIssuer, TokenValidator},
    config::{AuthConfig, ServerConfig, ServerOptions},
    integrations::PaymentGateways,
    routes::health,
    server::api_scope,
};

// DO NOT re-use these secrets anywhere.
pub const JWT_SECRET: &str = "thriftsy-endpoint-tests-hs256-secret";
pub const ESEWA_SECRET: &str = "8gBm/:&EnhH.1/q";
pub const CLIENT_URL: &str = "http://shop.thriftsy.test";

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);
pub const SELLER: UserId = UserId(10);
pub const ADMIN: UserId = UserId(99);

pub fn issue_token(claims: JwtClaims) -> String {
    TokenIssuer::new(&AuthConfig::new(JWT_SECRET))
        .issue_token(claims, Utc::now() + Days::new(1))
        .expect("Failed to sign token")
}

pub fn user_token(user: UserId) -> String {
    issue_token(JwtClaims::new(user, vec![Role::User]))
}

pub fn admin_token() -> String {
    issue_token(JwtClaims::new(ADMIN, vec![Role::User, Role::Admin]))
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    fn from_response(res: HttpResponse) -> Self {
        let status = res.status();
        let location = res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).map(String::from);
        let body = res.into_body().try_into_bytes().unwrap_or_default();
        Self { status, location, body: String::from_utf8_lossy(&body).into_owned() }
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or_else(|e| panic!("Not JSON ({e}): {}", self.body))
    }
}

/// A freshly migrated database plus the configuration that the app under test is built from.
pub struct TestContext {
    pub db: SqliteDatabase,
    pub config: ServerConfig,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_khalti_url("http://127.0.0.1:9").await
    }

    pub async fn with_khalti_url(khalti_url: &str) -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: url,
            auth: AuthConfig::new(JWT_SECRET),
            server_base_url: "http://api.thriftsy.test".into(),
            client_base_url: CLIENT_URL.into(),
            require_buyer_identity: true,
            esewa: EsewaConfig::new("EPAYTEST", ESEWA_SECRET, EsewaEnvironment::Sandbox),
            khalti: KhaltiConfig::new("test-khalti-secret", khalti_url, Duration::from_secs(2)),
        };
        Self { db, config }
    }

    pub fn orders_api(&self) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), EventProducers::default())
            .with_buyer_identity_required(self.config.require_buyer_identity)
    }

    pub async fn list_product(&self, title: &str, rupees: i64) -> Product {
        self.db
            .insert_product(NewProduct::new(Some(SELLER), title, Paisa::from_rupees(rupees)))
            .await
            .expect("Error adding product")
    }

    /// Places an order for a single freshly listed product.
    pub async fn place_order(&self, buyer: Option<UserId>, method: PaymentMethod, rupees: i64) -> Order {
        let product = self.list_product("Wool sweater", rupees).await;
        let cart = vec![CartItem::new(Some(product.id), product.title, product.price)];
        let order = NewOrder::new(buyer, cart, method);
        let api = OrderFlowApi::new(self.db.clone(), EventProducers::default()).with_buyer_identity_required(false);
        api.create_order(order).await.expect("Error placing order").order
    }

    /// Builds the app the same way the server does, and sends it one request.
    pub async fn send(&self, req: TestRequest) -> TestResponse {
        let gateways = PaymentGateways::from_config(&self.config).expect("Error configuring gateways");
        let app = App::new()
            .app_data(web::Data::new(self.orders_api()))
            .app_data(web::Data::new(HistoryApi::new(self.db.clone())))
            .app_data(web::Data::new(LedgerApi::new(self.db.clone())))
            .app_data(web::Data::new(gateways))
            .app_data(web::Data::new(ServerOptions::from_config(&self.config)))
            .app_data(web::Data::new(TokenValidator::new(&self.config.auth)))
            .service(health)
            .service(api_scope());
        let service = test::init_service(app).await;
        let res = match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => TestResponse::from_response(res.into_parts().1),
            Err(e) => TestResponse::from_response(e.as_response_error().error_response()),
        };
        debug!("🚀️ Response: {res:?}");
        res
    }

    pub async fn teardown(self) {
        destroy_database(self.db).await;
    }
}
