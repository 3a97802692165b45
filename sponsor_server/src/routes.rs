//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, http::StatusCode, web, HttpRequest, HttpResponse, Responder};
use log::*;
use sponsor_engine::{
    order_objects::{CreateOrderRequest, PaymentOutcome},
    traits::{CatalogManagement, OrderManagement, OrderQueryFilter},
    OrderFlowApi,
    OrderFlowError,
};
use wxpay_tools::{NotificationHeaders, NotificationVerifier};

use crate::{
    data_objects::{JsonResponse, NotificationAck, OrderResponse, UpdateStatusParams},
    errors::{notification_status, ServerError},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
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

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ where requires admin)  => {
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
                    .wrap($crate::middleware::AclMiddlewareFactory::admin_only());
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
route!(create_order => Post "/orders" impl OrderManagement, CatalogManagement);
/// Route handler for buyers placing an order.
///
/// The body is a [`CreateOrderRequest`]. Free works come back already PAID, with their delivery links. Everything
/// else is PENDING until the payment gateway reports the payment.
///
/// A buyer who already owns the work receives a 409 whose body carries the links they bought.
pub async fn create_order<B>(
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let request = body.into_inner();
    debug!("💻️ Order request for work {} from {}", request.work_id, request.buyer_email);
    let receipt = api.create_order(request).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(receipt)))
}

route!(order_status => Get "/orders/{order_no}" impl OrderManagement, CatalogManagement);
pub async fn order_status<B>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let order_no = path.into_inner();
    trace!("💻️ Status poll for order {order_no}");
    let receipt = api.fetch_order(&order_no).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(receipt)))
}

route!(download => Get "/download/{token}" impl OrderManagement, CatalogManagement);
pub async fn download<B>(path: web::Path<String>, api: web::Data<OrderFlowApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + CatalogManagement {
    let links = api.redeem_download(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(links))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(wxpay_notify => Post "/payments/wxpay/notify" impl OrderManagement, CatalogManagement);
/// Route handler for the payment gateway's notifications.
///
/// The raw body is authenticated and decrypted by the [`NotificationVerifier`] before anything in it is used. A
/// notification that fails verification never reaches the order engine; the gateway is told `FAIL` and nothing more.
///
/// Once verified, every outcome that retrying cannot change (duplicates, unknown orders, non-final trade states, a
/// mismatched amount) is acknowledged with `SUCCESS`, so that the gateway stops redelivering. Only a storage failure
/// asks for a retry.
pub async fn wxpay_notify<B>(
    req: HttpRequest,
    body: web::Bytes,
    verifier: web::Data<NotificationVerifier>,
    api: web::Data<OrderFlowApi<B>>,
) -> HttpResponse
where
    B: OrderManagement + CatalogManagement,
{
    trace!("💻️ Received payment notification");
    let headers = NotificationHeaders::from_lookup(|name| {
        req.headers().get(name).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
    });
    let tx = match verifier.verify_and_decrypt(&headers, &body) {
        Ok(tx) => tx,
        Err(e) => {
            warn!("💻️ Rejected payment notification. {e}");
            return HttpResponse::build(notification_status(&e)).json(NotificationAck::failure("FAIL"));
        },
    };
    let order_no = tx.out_trade_no.clone();
    match api.process_payment_notification(tx).await {
        Ok(PaymentOutcome::Paid(order)) => {
            info!("💻️ Order {} marked as paid by the gateway", order.order_no);
            HttpResponse::Ok().json(NotificationAck::success("OK"))
        },
        Ok(PaymentOutcome::AlreadyProcessed(order)) => {
            debug!("💻️ Notification for order {} ({}) was already processed", order.order_no, order.status);
            HttpResponse::Ok().json(NotificationAck::success("OK"))
        },
        Ok(PaymentOutcome::Ignored) => HttpResponse::Ok().json(NotificationAck::success("OK")),
        Err(OrderFlowError::OrderNotFound) => {
            warn!("💻️ Acknowledging notification for unknown order {order_no}");
            HttpResponse::Ok().json(NotificationAck::success("OK"))
        },
        Err(e @ OrderFlowError::AmountMismatch { .. }) => {
            error!("💻️ Notification for order {order_no} needs manual review. {e}");
            HttpResponse::Ok().json(NotificationAck::success("OK"))
        },
        Err(e) => {
            error!("💻️ Could not apply notification for order {order_no}. {e}");
            HttpResponse::build(StatusCode::INTERNAL_SERVER_ERROR).json(NotificationAck::failure("FAIL"))
        },
    }
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(update_order_status => Patch "/admin/orders/{id}/status" impl OrderManagement, CatalogManagement where requires admin);
/// Route handler for admins changing an order's status.
///
/// The body is `{ "status": "PAID" | "CANCELLED" | "REFUNDED" }`. Illegal moves answer 409 and change nothing. A
/// refund the gateway does not accept answers 502, and the order stays PAID.
pub async fn update_order_status<B>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<UpdateStatusParams>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let id = path.into_inner();
    let status = body.into_inner().status;
    info!("💻️ Admin requested order #{id} to move to {status}");
    let order = api.modify_status_for_order(id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(delete_order => Delete "/admin/orders/{id}" impl OrderManagement, CatalogManagement where requires admin);
pub async fn delete_order<B>(path: web::Path<i64>, api: web::Data<OrderFlowApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + CatalogManagement {
    let id = path.into_inner();
    api.delete_order(id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order #{id} deleted"))))
}

route!(search_orders => Get "/admin/orders" impl OrderManagement, CatalogManagement where requires admin);
pub async fn search_orders<B>(
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CatalogManagement,
{
    let orders = api.search_orders(query.into_inner()).await?;
    debug!("💻️ Order search returned {} result(s)", orders.len());
    Ok(HttpResponse::Ok().json(orders))
}
