use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modelcheck::internal::backend::api::{create_backend_router, BackendState};
use modelcheck::internal::checks::builtin::CoreSource;
use modelcheck::internal::checks::registry::{CheckerRegistry, PluginSource};
use modelcheck::internal::config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "modelcheck=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Discovery happens once at startup; the registry is immutable after.
    let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(CoreSource)];
    let registry = Arc::new(CheckerRegistry::discover(&sources));
    tracing::info!(checks = registry.checks().len(), "checker registry loaded");

    let app = create_backend_router(BackendState::new(registry));

    let addr = config::backend_bind_addr();
    tracing::info!("backend API server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
