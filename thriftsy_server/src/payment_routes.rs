//! Payment initiation, gateway callbacks and reconciliation.
//!
//! Callback handlers answer the gateway (really, the buyer's browser) with a redirect to the storefront in every case.
//! Errors are logged and written to the payment ledger, but are never surfaced as an error status.
use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use serde_json::json;
use thriftsy_engine::{
    db_types::{LedgerStatus, NewLedgerEntry, Order, OrderId, PaymentMethod, PaymentStatus},
    LedgerApi,
    OrderFlowApi,
    OrderFlowError,
    OrderManagement,
    PaymentLedgerManagement,
};
use thriftsy_gateways::{CallbackFields, CallbackPayload};

use crate::{
    auth::{JwtClaims, MaybeClaims, Role},
    config::ServerOptions,
    data_objects::{InitiatePaymentRequest, InitiatePaymentResponse, LedgerQuery, VerifyPaymentRequest, VerifyPaymentResponse},
    errors::{AuthError, ServerError},
    helpers::{callback_fields, redirect},
    integrations::{Confirmation, ConfirmationOutcome, GatewayAdapter, PaymentGateways},
    route,
};

//----------------------------------------------   Initiate  ----------------------------------------------------
route!(initiate_payment => Post "/payments/initiate/{method}" impl OrderManagement);
/// Starts a gateway payment for an existing order, or for an order created from the embedded checkout.
///
/// Orders that belong to a buyer can only be paid for by that buyer or by an admin. The response tells the storefront
/// how to hand the buyer over to the gateway.
pub async fn initiate_payment<B: OrderManagement>(
    claims: MaybeClaims,
    path: web::Path<String>,
    body: web::Json<InitiatePaymentRequest>,
    api: web::Data<OrderFlowApi<B>>,
    gateways: web::Data<PaymentGateways>,
) -> Result<HttpResponse, ServerError> {
    let method = parse_method(&path)?;
    let gateway = gateways.for_method(method, api.get_ref())?;
    let InitiatePaymentRequest { amount, product_label, order_id, order } = body.into_inner();
    let amount = amount
        .filter(|a| a.is_positive())
        .ok_or_else(|| ServerError::InvalidAmount("The payment amount must be greater than zero".into()))?;
    let label = product_label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .ok_or_else(|| ServerError::InvalidAmount("A product label is required".into()))?;
    let caller = claims.0;
    let order = match (order_id, order) {
        (Some(id), _) => {
            let order = api.fetch_order(id).await?;
            check_payer(caller.as_ref(), &order)?;
            order
        },
        (None, Some(checkout)) => {
            let new_order = checkout.into_new_order(caller.as_ref().map(|c| c.sub));
            api.create_order(new_order).await?.order
        },
        (None, None) => {
            return Err(ServerError::InvalidRequestBody("Supply either an order_id or an order to pay for".into()))
        },
    };
    if amount != order.total {
        warn!("💻️ {method} payment for order {} requested for {amount}, but the order total is {}", order.id, order.total);
    }
    let initiation = gateway.initiate(&order, amount, &label).await?;
    info!("💻️ {method} payment initiated for order {}", order.id);
    Ok(HttpResponse::Ok().json(InitiatePaymentResponse { order_id: order.id, initiation }))
}

fn check_payer(caller: Option<&JwtClaims>, order: &Order) -> Result<(), ServerError> {
    let buyer = match order.buyer_id {
        Some(b) => b,
        None => return Ok(()),
    };
    match caller {
        None => Err(AuthError::MissingToken.into()),
        Some(c) if c.is_admin() || c.sub == buyer => Ok(()),
        Some(c) => {
            Err(ServerError::InsufficientPermissions(format!("{} cannot pay for order {}, which belongs to {buyer}", c.sub, order.id)))
        },
    }
}

fn parse_method(s: &str) -> Result<PaymentMethod, ServerError> {
    s.parse::<PaymentMethod>().map_err(|_| ServerError::InvalidRequestPath(format!("Unknown payment method: {s}")))
}

//----------------------------------------------   Callbacks  ----------------------------------------------------
route!(payment_callback_get => Get "/payments/callback/{method}" impl OrderManagement, PaymentLedgerManagement);
pub async fn payment_callback_get<B: OrderManagement + PaymentLedgerManagement>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    ledger: web::Data<LedgerApi<B>>,
    gateways: web::Data<PaymentGateways>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    handle_callback(&path, callback_fields(&req, &[]), api.get_ref(), ledger.get_ref(), &gateways, &options).await
}

route!(payment_callback_post => Post "/payments/callback/{method}" impl OrderManagement, PaymentLedgerManagement);
pub async fn payment_callback_post<B: OrderManagement + PaymentLedgerManagement>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B>>,
    ledger: web::Data<LedgerApi<B>>,
    gateways: web::Data<PaymentGateways>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    handle_callback(&path, callback_fields(&req, &body), api.get_ref(), ledger.get_ref(), &gateways, &options).await
}

/// Confirms a callback with the gateway adapter and acts on the outcome.
///
/// | Outcome                 | Order                  | Ledger     | Redirect          |
/// |-------------------------|------------------------|------------|-------------------|
/// | Verified                | marked paid            | `verified` | order page        |
/// | Pending                 | untouched              | `pending`  | pending page      |
/// | Failed, or no order     | untouched              | `pending`  | failure page      |
/// | adapter or store error  | untouched              | `pending`  | failure page      |
async fn handle_callback<B>(
    method_name: &str,
    fields: CallbackFields,
    api: &OrderFlowApi<B>,
    ledger: &LedgerApi<B>,
    gateways: &PaymentGateways,
    options: &ServerOptions,
) -> HttpResponse
where
    B: OrderManagement + PaymentLedgerManagement,
{
    let method = match parse_method(method_name) {
        Ok(m) => m,
        Err(e) => {
            warn!("💻️ Callback for an unknown payment method. {e}");
            return redirect(&options.failure_page(method_name, "unsupported-method", None));
        },
    };
    let gateway = match gateways.for_method(method, api) {
        Ok(g) => g,
        Err(e) => {
            warn!("💻️ Callback received for {method}. {e}");
            return redirect(&options.failure_page(method_name, "unsupported-method", None));
        },
    };
    let raw_fields = fields.to_json();
    let confirmation = match gateway.confirm(CallbackPayload::from_params(fields)).await {
        Ok(c) => c,
        Err(e) => {
            error!("💻️ Could not confirm a {method} callback. {e}");
            let reason = match e {
                ServerError::GatewayUnavailable(_) => "gateway-unavailable",
                _ => "error",
            };
            let entry = NewLedgerEntry::new(method, LedgerStatus::Pending)
                .with_raw_payload(json!({ "callback": raw_fields, "error": e.to_string() }));
            ledger.record(entry).await;
            return redirect(&options.failure_page(method_name, reason, None));
        },
    };
    let txn = confirmation.gateway_txn_id.clone();
    match (confirmation.outcome.clone(), confirmation.order_id) {
        (ConfirmationOutcome::Verified, Some(id)) => {
            match api.mark_paid(id, method, txn.clone(), confirmation.amount).await {
                Ok(order) => {
                    ledger.record(ledger_entry(method, LedgerStatus::Verified, confirmation)).await;
                    debug!("💻️ Order {id} is {} / {} after the {method} callback", order.status, order.payment_status);
                    redirect(&options.order_page(id.value()))
                },
                Err(e) => {
                    error!("💻️ {method} verified payment {txn:?} for order {id}, but it could not be recorded. {e}");
                    ledger.record(ledger_entry(method, LedgerStatus::Pending, confirmation)).await;
                    redirect(&options.failure_page(method_name, "error", txn.as_deref()))
                },
            }
        },
        (ConfirmationOutcome::Pending(status), Some(id)) => {
            info!("💻️ {method} payment for order {id} is still {status}");
            ledger.record(ledger_entry(method, LedgerStatus::Pending, confirmation)).await;
            redirect(&options.pending_page(id.value(), method_name))
        },
        (ConfirmationOutcome::Failed(reason), _) => {
            info!("💻️ {method} callback did not confirm a payment: {reason}");
            ledger.record(ledger_entry(method, LedgerStatus::Pending, confirmation)).await;
            redirect(&options.failure_page(method_name, &reason, txn.as_deref()))
        },
        (outcome, None) => {
            warn!("💻️ {method} callback was {outcome}, but no order could be matched to it");
            ledger.record(ledger_entry(method, LedgerStatus::Pending, confirmation)).await;
            redirect(&options.failure_page(method_name, "unknown-order", txn.as_deref()))
        },
    }
}

fn ledger_entry(method: PaymentMethod, status: LedgerStatus, confirmation: Confirmation) -> NewLedgerEntry {
    NewLedgerEntry::new(method, status)
        .with_order_id(confirmation.order_id)
        .with_gateway_txn_id(confirmation.gateway_txn_id)
        .with_amount(confirmation.amount)
        .with_raw_payload(confirmation.raw)
}

route!(payment_failure_get => Get "/payments/callback/{method}/failure" impl OrderManagement, PaymentLedgerManagement);
pub async fn payment_failure_get<B: OrderManagement + PaymentLedgerManagement>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    ledger: web::Data<LedgerApi<B>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    handle_failure(&path, callback_fields(&req, &[]), api.get_ref(), ledger.get_ref(), &options).await
}

route!(payment_failure_post => Post "/payments/callback/{method}/failure" impl OrderManagement, PaymentLedgerManagement);
pub async fn payment_failure_post<B: OrderManagement + PaymentLedgerManagement>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B>>,
    ledger: web::Data<LedgerApi<B>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    handle_failure(&path, callback_fields(&req, &body), api.get_ref(), ledger.get_ref(), &options).await
}

/// The gateway says the buyer abandoned or failed the payment. Nothing about the order changes; the attempt is only
/// written to the ledger.
async fn handle_failure<B>(
    method_name: &str,
    fields: CallbackFields,
    api: &OrderFlowApi<B>,
    ledger: &LedgerApi<B>,
    options: &ServerOptions,
) -> HttpResponse
where
    B: OrderManagement + PaymentLedgerManagement,
{
    let method = match parse_method(method_name) {
        Ok(m) => m,
        Err(e) => {
            warn!("💻️ Failure callback for an unknown payment method. {e}");
            return redirect(&options.failure_page(method_name, "cancelled", None));
        },
    };
    let raw = fields.to_json();
    // eSewa sometimes sends its envelope on failure too
    let fields = CallbackPayload::from_params(fields).decode().unwrap_or_else(|e| {
        debug!("💻️ Could not decode the {method} failure payload. {e}");
        CallbackFields::default()
    });
    let txn = ["transaction_uuid", "pidx", "txn"].iter().find_map(|name| fields.non_empty(name)).map(String::from);
    let order_id = match &txn {
        Some(t) => match api.fetch_order_by_gateway_token(method, t).await {
            Ok(order) => order.map(|o| o.id),
            Err(e) => {
                warn!("💻️ Could not look up the order for {method} token {t}. {e}");
                None
            },
        },
        None => None,
    };
    info!("💻️ {method} reported a failed payment. Token: {txn:?}, order: {order_id:?}");
    let entry = NewLedgerEntry::new(method, LedgerStatus::Pending)
        .with_order_id(order_id)
        .with_gateway_txn_id(txn.clone())
        .with_raw_payload(raw);
    ledger.record(entry).await;
    redirect(&options.failure_page(method_name, "cancelled", txn.as_deref()))
}

//----------------------------------------------   Verify  ----------------------------------------------------
route!(verify_payment => Post "/payments/verify" impl OrderManagement, PaymentLedgerManagement);
/// Reconciles the storefront's view of a payment with what is stored.
///
/// For gateway payments, the order is reconciled if it carries a token for the gateway and the client's `txn` (if
/// given) matches it. For cash on delivery and bank transfers, the order must already be paid. The check is always
/// written to the ledger, even when the order cannot be found, in which case `ok` is false.
pub async fn verify_payment<B: OrderManagement + PaymentLedgerManagement>(
    req: HttpRequest,
    body: web::Json<VerifyPaymentRequest>,
    api: web::Data<OrderFlowApi<B>>,
    ledger: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let VerifyPaymentRequest { method, order_id, txn } = body.into_inner();
    let txn = txn.filter(|t| !t.trim().is_empty());
    let requested_id = order_id;
    let order = match (order_id, &txn) {
        (Some(id), _) => match api.fetch_order(id).await {
            Ok(order) => Some(order),
            Err(OrderFlowError::OrderNotFound(_)) => None,
            Err(e) => return Err(e.into()),
        },
        (None, Some(t)) if method.is_gateway() => api.fetch_order_by_gateway_token(method, t).await?,
        (None, _) => None,
    };
    let reconciled = order.as_ref().map(|o| is_reconciled(o, method, txn.as_deref())).unwrap_or(false);
    let order_id = order.as_ref().map(|o| o.id);
    if order_id.is_none() {
        info!("💻️ Verify {method} payment: no order matches id {requested_id:?} or txn {txn:?}");
    }
    debug!("💻️ Verify {method} payment for {order_id:?} with txn {txn:?}: reconciled = {reconciled}");
    let client = req.headers().get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or_default();
    let raw = json!({
        "method": method,
        "order_id": order_id,
        "requested_order_id": requested_id,
        "txn": txn,
        "client": client,
    });
    let status = if reconciled { LedgerStatus::Verified } else { LedgerStatus::Pending };
    let entry = NewLedgerEntry::new(method, status)
        .with_order_id(order_id)
        .with_gateway_txn_id(txn.clone())
        .with_amount(order.as_ref().map(|o| o.total))
        .with_raw_payload(raw);
    ledger.record(entry).await;
    let order_id = order_id.or(requested_id);
    Ok(HttpResponse::Ok().json(VerifyPaymentResponse { ok: order.is_some(), reconciled, order_id, txn }))
}

fn is_reconciled(order: &Order, method: PaymentMethod, txn: Option<&str>) -> bool {
    if method.is_gateway() {
        match (order.gateway_token(method), txn) {
            (Some(stored), Some(t)) => stored == t,
            (Some(_), None) => true,
            (None, _) => false,
        }
    } else {
        order.payment_status == PaymentStatus::Paid
    }
}

//----------------------------------------------   Ledger  ----------------------------------------------------
route!(payment_ledger => Get "/payments/ledger" impl PaymentLedgerManagement where requires [Role::Admin]);
pub async fn payment_ledger<B: PaymentLedgerManagement>(
    query: web::Query<LedgerQuery>,
    ledger: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let entries = ledger.latest(query.limit).await?;
    trace!("💻️ Returning {} ledger entries", entries.len());
    Ok(HttpResponse::Ok().json(entries))
}

route!(order_ledger => Get "/payments/ledger/{order_id}" impl PaymentLedgerManagement where requires [Role::Admin]);
/// The ledger entries for one order, oldest first.
pub async fn order_ledger<B: PaymentLedgerManagement>(
    path: web::Path<i64>,
    ledger: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let entries = ledger.for_order(OrderId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(entries))
}
