// define modules in crate
mod auth;
mod config;
mod cqrs;
mod domain;
mod dtos;
mod error;
mod repositories;
mod routes;
mod state;
mod uow;

use std::sync::{Arc, Mutex};

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use dotenv::dotenv;
use mongodb::Client;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{event, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use uuid::Uuid;

use crate::{
    auth::{default_password_hasher, AuthService, SessionManager},
    config::{Config, StorageBackend},
    error::StartupError,
    repositories::{
        InMemoryCookieStandRepository, InMemoryUserRepository, MongoDbCookieStandRepository,
        MongoDbUserRepository,
    },
    state::AppState,
    uow::RepositoryContext,
};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenv().ok();

    let config = Config::load()?;
    init_tracing(&config)?;

    let uow = Arc::new(build_repository_context(&config.storage).await?);

    let session_secret = match &config.session_secret {
        Some(secret) => secret.clone(),
        None => {
            event!(
                Level::WARN,
                "SESSION_SECRET not set, sessions will not survive a restart"
            );
            format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
        }
    };
    let auth_service = Arc::new(AuthService::new(
        uow.user_repository.clone(),
        SessionManager::new(session_secret.as_bytes(), config.session_ttl),
        default_password_hasher(),
    ));

    if let Some(bootstrap) = &config.bootstrap_user {
        let user = auth_service
            .ensure_user(&bootstrap.username, &bootstrap.password)
            .await?;
        event!(Level::INFO, "Bootstrap user {} is available", user.username);
    }

    let state = Arc::new(AppState::new(uow, auth_service));

    let (prometheus_layer, metrics_handle) = PrometheusMetricLayer::pair();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    event!(Level::INFO, "Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        routes::router(state)
            .route("/metrics", get(move || async move { metrics_handle.render() }))
            .layer(prometheus_layer)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            ),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn init_tracing(config: &Config) -> Result<(), StartupError> {
    let writer = match &config.log_path {
        Some(path) => BoxMakeWriter::new(Mutex::new(std::fs::File::create(path)?)),
        None => BoxMakeWriter::new(std::io::stdout),
    };

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_target(false)
        .with_ansi(false)
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_writer(writer)
        .init();

    Ok(())
}

async fn build_repository_context(storage: &StorageBackend) -> Result<RepositoryContext, StartupError> {
    match storage {
        StorageBackend::Memory => {
            event!(Level::INFO, "Using in-memory storage");
            Ok(RepositoryContext::new(
                Arc::new(InMemoryCookieStandRepository::new()),
                Arc::new(InMemoryUserRepository::new()),
            ))
        }
        StorageBackend::MongoDb(info) => {
            event!(Level::INFO, "Using mongodb database {}", info.database);
            let client = Client::with_uri_str(&info.uri).await?;

            Ok(RepositoryContext::new(
                Arc::new(MongoDbCookieStandRepository::new(info, &client)),
                Arc::new(MongoDbUserRepository::new(info, &client).await?),
            ))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        event!(Level::ERROR, "Failed to listen for shutdown signal: {}", e);
    }
    event!(Level::INFO, "Shutting down");
}
