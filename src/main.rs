use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use interview_backend::{
    api_router,
    config::{get_config, init_config},
    middleware::rate_limit,
    store::{InterviewStore, MemoryStore, PgStore},
    AppState,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let store: Arc<dyn InterviewStore> = match &config.database_url {
        Some(url) => {
            info!("Connecting to Postgres store");
            Arc::new(PgStore::connect(url).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let app_state = AppState::new(store);

    {
        let state = app_state.clone();
        let grace_minutes = config.no_show_grace_minutes;
        tokio::spawn(async move {
            loop {
                match state.interview_service.sweep_no_shows(grace_minutes).await {
                    Ok(0) => {}
                    Ok(marked) => info!(marked, "no-show sweep transitioned interviews"),
                    Err(e) => tracing::error!(error = ?e, "No-show sweeper error"),
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });
    }

    let app = api_router(app_state)
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::new(config.api_rps),
            rate_limit::rps_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
