mod routes;
mod services;
mod state;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use services::store::SnapshotStore;
use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let port: u16 = env_parse("PORT", 3000);
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into());
    let persist_interval = Duration::from_millis(env_parse("PERSIST_INTERVAL_MS", 2000));

    let store = SnapshotStore::new(&data_dir);
    let state = AppState::new(store, persist_interval);

    let app = routes::app(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, %data_dir, "inkroom listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    // Flush every live room so committed work inside the throttle window
    // survives the restart.
    state.rooms.flush_all().await;
    tracing::info!("shutdown flush complete");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
