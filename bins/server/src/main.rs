//! Kavera API Server
//!
//! Main entry point for the Kavera settlement service.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kavera_api::{AppState, create_router};
use kavera_core::ledger::PaymentLimits;
use kavera_db::{LedgerEntryRepository, connect};
use kavera_gateway::HttpProviderClient;
use kavera_settlement::{PaymentService, ServiceConfig, Sweeper};
use kavera_shared::types::Currency;
use kavera_shared::{AppConfig, JwtConfig, JwtService, NotificationService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kavera=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // Create JWT service
    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        #[allow(clippy::cast_possible_wrap)]
        access_token_expires_minutes: (config.jwt.access_token_expiry_secs / 60) as i64,
    });

    // Create the provider client
    let provider = HttpProviderClient::new(&config.gateway)?;
    info!(base_url = %config.gateway.base_url, "Gateway client configured");

    // Create the notification service
    let notifier = NotificationService::new(config.notifications.clone());

    // Wire the payment service
    let store = Arc::new(LedgerEntryRepository::new(db));
    let currency = config
        .gateway
        .currency
        .parse::<Currency>()
        .map_err(|e| anyhow::anyhow!("gateway.currency: {e}"))?;
    let service_config = ServiceConfig {
        currency,
        limits: PaymentLimits {
            min_amount: Decimal::from(config.gateway.min_amount),
            max_amount: Decimal::from(config.gateway.max_amount),
            max_pending_entries: config.limits.max_pending_entries,
            max_withdrawal_amount: Decimal::from(config.limits.max_withdrawal_amount),
        },
        max_retries: config.sweeper.max_retries,
    };
    let payments = Arc::new(PaymentService::new(
        store,
        Arc::new(provider),
        Some(Arc::new(notifier)),
        service_config,
    ));

    // Spawn the reconciliation sweeper
    let sweeper = Arc::new(Sweeper::new(Arc::clone(&payments), config.sweeper.clone()));
    let _handles = sweeper.spawn();
    info!(
        interval_secs = config.sweeper.interval_secs,
        stale_threshold_secs = config.sweeper.stale_threshold_secs,
        "Reconciliation sweeper running"
    );

    // Create application state
    let state = AppState {
        payments,
        jwt_service: Arc::new(jwt_service),
        webhook_secret: Arc::from(config.gateway.webhook_secret.as_str()),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
