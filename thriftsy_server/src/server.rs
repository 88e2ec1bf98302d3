use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer, Scope};
use log::*;
use thriftsy_engine::{
    events::{EventHandlers, EventProducers},
    HistoryApi,
    LedgerApi,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenValidator,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    hooks::{notification_hooks, EVENT_BUFFER_SIZE},
    integrations::PaymentGateways,
    payment_routes::{
        InitiatePaymentRoute,
        OrderLedgerRoute,
        PaymentCallbackGetRoute,
        PaymentCallbackPostRoute,
        PaymentFailureGetRoute,
        PaymentFailurePostRoute,
        PaymentLedgerRoute,
        VerifyPaymentRoute,
    },
    routes::{
        health,
        CreateOrderRoute,
        MyOrdersRoute,
        MySalesRoute,
        OrderAuditRoute,
        OrderByIdRoute,
        UpdateOrderRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let gateways = PaymentGateways::from_config(&config)?;
    if !config.esewa.is_configured() {
        warn!("🪛️ eSewa is not configured. eSewa payments will be refused.");
    }
    if !config.khalti.is_configured() {
        warn!("🪛️ Khalti is not configured. Khalti payments will be refused.");
    }
    let options = ServerOptions::from_config(&config);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone())
            .with_buyer_identity_required(config.require_buyer_identity);
        let history_api = HistoryApi::new(db.clone());
        let ledger_api = LedgerApi::new(db.clone());
        let validator = TokenValidator::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("thriftsy::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(history_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(gateways.clone()))
            .app_data(web::Data::new(options.clone()))
            .app_data(web::Data::new(validator));
        app.service(health).service(api_scope())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Every route under `/api`, backed by SQLite.
pub fn api_scope() -> Scope {
    web::scope("/api")
        .service(CreateOrderRoute::<SqliteDatabase>::new())
        .service(MyOrdersRoute::<SqliteDatabase>::new())
        // Must be registered before /orders/{order_id}
        .service(MySalesRoute::<SqliteDatabase>::new())
        .service(OrderByIdRoute::<SqliteDatabase>::new())
        .service(UpdateOrderRoute::<SqliteDatabase>::new())
        .service(OrderAuditRoute::<SqliteDatabase>::new())
        .service(InitiatePaymentRoute::<SqliteDatabase>::new())
        .service(PaymentCallbackGetRoute::<SqliteDatabase>::new())
        .service(PaymentCallbackPostRoute::<SqliteDatabase>::new())
        .service(PaymentFailureGetRoute::<SqliteDatabase>::new())
        .service(PaymentFailurePostRoute::<SqliteDatabase>::new())
        .service(VerifyPaymentRoute::<SqliteDatabase>::new())
        .service(PaymentLedgerRoute::<SqliteDatabase>::new())
        .service(OrderLedgerRoute::<SqliteDatabase>::new())
}
