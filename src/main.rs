use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use certpay_api::config::{init_tracing, load_config};
use certpay_api::gateway::{PayAppClient, PaymentGateway};
use certpay_api::handlers::AppServices;
use certpay_api::services::notifications::{NoopNotifier, NotificationSink, SlackNotifier};
use certpay_api::{app_router, db, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);

    info!(
        environment = %config.environment,
        "starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let db_pool = Arc::new(
        db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?,
    );

    if config.auto_migrate {
        db::run_migrations(&db_pool)
            .await
            .context("failed to run migrations")?;
    }

    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(PayAppClient::from_config(&config).context("failed to build PayApp client")?);

    let notifier: Arc<dyn NotificationSink> = match &config.slack_webhook_url {
        Some(url) => Arc::new(
            SlackNotifier::new(url.clone(), config.notify_timeout_secs)
                .context("failed to build Slack notifier")?,
        ),
        None => {
            warn!("no Slack webhook configured; payment notifications disabled");
            Arc::new(NoopNotifier)
        }
    };

    let services = AppServices::new(db_pool.clone(), gateway, notifier);
    let state = AppState {
        db: db_pool,
        config: config.clone(),
        services,
    };

    let cors = build_cors_layer(&config);

    let app = app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid host/port configuration")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

fn build_cors_layer(config: &certpay_api::config::AppConfig) -> CorsLayer {
    if config.should_allow_permissive_cors() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|origin| {
            let origin = origin.trim();
            if origin.is_empty() {
                return None;
            }
            match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin, "ignoring unparseable CORS origin");
                    None
                }
            }
        })
        .collect();

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if config.cors_allow_credentials {
        cors = cors.allow_credentials(true);
    }

    cors
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
