//! Atelier Loans Server
//!
//! REST API server for workshop equipment loans.

use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_loans::{
    api,
    config::AppConfig,
    repository::Repository,
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    init_tracing(&config);

    tracing::info!("Starting Atelier Loans Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let repository = Repository::new(pool);
    let services = Services::new(repository, &config.loans)?;

    // Bring statuses up to date before the first request
    let report = services.lifecycle.advance_loan_states(chrono::Utc::now()).await?;
    tracing::info!(
        activated = report.activated,
        completed = report.completed,
        "Initial loan sweep done"
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("atelier_loans={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Devices
        .route(
            "/devices",
            get(api::devices::list_devices).post(api::devices::create_device),
        )
        .route(
            "/devices/:id",
            get(api::devices::get_device)
                .put(api::devices::update_device)
                .delete(api::devices::delete_device),
        )
        .route("/devices/:id/loans", get(api::devices::list_device_loans))
        // Device groups
        .route(
            "/device-groups",
            get(api::devices::list_groups).post(api::devices::create_group),
        )
        .route(
            "/device-groups/:id",
            put(api::devices::update_group).delete(api::devices::delete_group),
        )
        // Loans
        .route("/loans", post(api::loans::create_loan))
        .route("/loans/sweep", post(api::loans::sweep_loans))
        .route(
            "/loans/:id",
            get(api::loans::get_loan).delete(api::loans::delete_loan),
        )
        .route("/loans/:id/end", put(api::loans::update_loan_end))
        .route("/loans/:id/status", put(api::loans::set_loan_status))
        .route("/loans/:id/cancel", post(api::loans::cancel_loan))
        .route("/users/me/loans", get(api::loans::get_my_loans))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
