use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modelcheck::internal::config;
use modelcheck::internal::gateway::api::{create_gateway_router, GatewayState};
use modelcheck::internal::gateway::client::HttpBackendClient;
use modelcheck::internal::gateway::durable::GatewayStore;
use modelcheck::internal::gateway::service::JobGateway;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "modelcheck=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_url = config::database_url();
    let store = GatewayStore::connect(&db_url).await?;
    tracing::info!(%db_url, "durable store ready");

    let backend_url = config::backend_url();
    let backend = Arc::new(HttpBackendClient::new(&backend_url, config::poll_timeout()));
    tracing::info!(%backend_url, "forwarding jobs to backend");

    let gateway = Arc::new(JobGateway::new(store, backend));
    let app = create_gateway_router(GatewayState { gateway });

    let addr = config::gateway_bind_addr();
    tracing::info!("gateway API server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
