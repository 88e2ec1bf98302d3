//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//! The payment routes live in [`crate::payment_routes`].
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every database and gateway call here is async for that reason.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use thriftsy_engine::{
    db_types::{Actor, OrderId},
    AuditManagement,
    HistoryApi,
    OrderFlowApi,
    OrderManagement,
};

use crate::{
    auth::{JwtClaims, MaybeClaims, Role},
    data_objects::{CheckoutRequest, UpdateOrderRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),*]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderManagement);
/// Places an order for the cart in the request body.
///
/// The buyer is taken from the access token. Without a token the order is a guest order, which is refused unless guest
/// checkout is enabled. Responds with `201 Created`, or `200 OK` with `existing: true` if the idempotency key was
/// already used, in which case the original order is returned untouched.
pub async fn create_order<B: OrderManagement>(
    claims: MaybeClaims,
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let buyer = claims.0.map(|c| c.sub);
    debug!("💻️ Checkout request from {}", buyer.map(|b| b.to_string()).unwrap_or_else(|| "a guest".into()));
    let order = body.into_inner().into_new_order(buyer);
    let result = api.create_order(order).await?;
    if result.existing {
        Ok(HttpResponse::Ok().json(result))
    } else {
        Ok(HttpResponse::Created().json(result))
    }
}

route!(my_orders => Get "/orders" impl OrderManagement where requires [Role::User]);
pub async fn my_orders<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for {}", claims.sub);
    let orders = api.orders_for_buyer(claims.sub).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(my_sales => Get "/orders/sold" impl OrderManagement where requires [Role::User]);
pub async fn my_sales<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET sales for seller {}", claims.sub);
    let sales = api.sales_for_seller(claims.sub).await?;
    Ok(HttpResponse::Ok().json(sales))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement where requires []);
/// Buyers can read their own orders. Admins can read any order.
pub async fn order_by_id<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId(path.into_inner());
    debug!("💻️ GET order {id} for {}", claims.sub);
    let order = api.order_with_items(id).await?;
    check_read_access(&claims, order.order.buyer_id, id)?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order => Put "/orders/{order_id}" impl OrderManagement where requires []);
/// Applies a partial update on behalf of the caller. In practice this is how a buyer cancels an order; every other
/// change is reserved for the payment flow and is refused with `403`.
pub async fn update_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<UpdateOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
    history: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId(path.into_inner());
    let transitions = body.transitions();
    if transitions.is_empty() {
        return Err(ServerError::InvalidRequestBody("Nothing to update. Supply a status or payment_status".into()));
    }
    let actor = Actor::User(claims.sub);
    for transition in transitions {
        debug!("💻️ {actor} requests {} = {} on order {id}", transition.field(), transition.new_value());
        api.transition(id, actor, transition).await?;
    }
    let order = history.order_with_items(id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_audit => Get "/orders/{order_id}/audit" impl OrderManagement, AuditManagement where requires []);
pub async fn order_audit<B: OrderManagement + AuditManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<HistoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId(path.into_inner());
    let order = api.order_with_items(id).await?;
    check_read_access(&claims, order.order.buyer_id, id)?;
    let entries = api.audit_log(id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

fn check_read_access(
    claims: &JwtClaims,
    buyer_id: Option<thriftsy_engine::db_types::UserId>,
    id: OrderId,
) -> Result<(), ServerError> {
    if claims.is_admin() || buyer_id == Some(claims.sub) {
        Ok(())
    } else {
        debug!("💻️ {} tried to read order {id}, which belongs to someone else", claims.sub);
        Err(ServerError::InsufficientPermissions(format!("Order {id} belongs to another buyer")))
    }
}
