use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer, Scope};
use log::*;
use sponsor_engine::{
    events::{EventHandlers, EventProducers},
    rate_limiter::{FixedWindowRateLimiter, StoreRateLimiter},
    refunds::RefundCoordinator,
    traits::{CatalogManagement, OrderManagement},
    OrderFlowApi,
    SqliteDatabase,
};
use wxpay_tools::{NotificationVerifier, WxPayApi};

use crate::{
    config::{RateLimitBackend, ServerConfig},
    errors::ServerError,
    middleware::AdminCredentials,
    notifications::{mailer_from_config, notification_hooks},
    routes::{
        health,
        CreateOrderRoute,
        DeleteOrderRoute,
        DownloadRoute,
        OrderStatusRoute,
        SearchOrdersRoute,
        UpdateOrderStatusRoute,
        WxpayNotifyRoute,
    },
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.auto_migrate {
        db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    let mailer = mailer_from_config(&config.mail);
    let hooks = notification_hooks(mailer, config.public_url.clone());
    let handlers = EventHandlers::new(config.event_buffer_size, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Builds the order engine for the server.
///
/// A single engine instance is shared by every worker, so the in-memory rate limiter counts calls across the whole
/// process.
pub fn order_flow_api(
    config: &ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> OrderFlowApi<SqliteDatabase> {
    let refunds = match WxPayApi::new(config.wxpay.clone()) {
        Ok(api) => RefundCoordinator::new(api),
        Err(e) => {
            warn!("💻️ Refunds through the payment gateway are unavailable. {e}");
            RefundCoordinator::default()
        },
    };
    let api = OrderFlowApi::new(db.clone(), producers).with_refund_coordinator(refunds);
    info!(
        "🚦️ Rate limiting orders to {} per {:?} ({})",
        config.rate_limit.max_calls, config.rate_limit.window, config.rate_limit_backend
    );
    match config.rate_limit_backend {
        RateLimitBackend::Memory => api.with_rate_limiter(FixedWindowRateLimiter::new(config.rate_limit)),
        RateLimitBackend::Database => api.with_rate_limiter(StoreRateLimiter::new(db, config.rate_limit)),
    }
}

/// Every route under `/api`
pub fn api_scope<B>() -> Scope
where B: OrderManagement + CatalogManagement + 'static {
    web::scope("/api")
        .service(CreateOrderRoute::<B>::new())
        .service(OrderStatusRoute::<B>::new())
        .service(DownloadRoute::<B>::new())
        .service(WxpayNotifyRoute::<B>::new())
        .service(SearchOrdersRoute::<B>::new())
        .service(UpdateOrderStatusRoute::<B>::new())
        .service(DeleteOrderRoute::<B>::new())
}

/// Malformed JSON bodies are answered with the server's own error format
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("💻️ Could not parse request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let orders_api = web::Data::new(order_flow_api(&config, db, producers));
    let verifier = web::Data::new(NotificationVerifier::from_config(&config.wxpay));
    if !verifier.is_configured() {
        warn!("💻️ The payment gateway is not configured. Payment notifications will be refused.");
    }
    let admin = web::Data::new(AdminCredentials::new(config.admin_token.clone()));
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sps::access_log"))
            .app_data(orders_api.clone())
            .app_data(verifier.clone())
            .app_data(admin.clone())
            .app_data(json_config())
            .service(health)
            .service(api_scope::<SqliteDatabase>())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
