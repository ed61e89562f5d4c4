use gateway::config::Config;
use gateway::state::AppState;
use gateway::{build_device_router, build_operator_router};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    info!("connecting to database...");
    let pool = gateway::db::create_pool(&config.database_url).await;
    gateway::db::run_migrations(&pool).await;
    info!("migrations applied");

    let state = AppState::new(pool, &config);
    state
        .buckets
        .warm_cache()
        .await
        .expect("failed to warm bucket cache");

    state
        .availability
        .clone()
        .spawn_sweep(state.subscriptions.clone(), config.availability_sweep_interval_seconds);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let device_addr = format!("{}:{}", config.host, config.device_port);
    let device_listener = tokio::net::TcpListener::bind(&device_addr)
        .await
        .expect("failed to bind device port");
    let device_router = build_device_router(state.clone());
    let device_shutdown = shutdown_tx.subscribe();
    let device_server = axum::serve(device_listener, device_router)
        .with_graceful_shutdown(wait_for_shutdown(device_shutdown));

    let operator_addr = format!("{}:{}", config.host, config.operator_port);
    let operator_listener = tokio::net::TcpListener::bind(&operator_addr)
        .await
        .expect("failed to bind operator port");
    let operator_router = build_operator_router(state);
    let operator_shutdown = shutdown_tx.subscribe();
    let operator_server = axum::serve(operator_listener, operator_router)
        .with_graceful_shutdown(wait_for_shutdown(operator_shutdown));

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    info!(addr = %device_addr, "device-facing server listening");
    info!(addr = %operator_addr, "operator-facing server listening");

    let (device_result, operator_result) = tokio::join!(device_server, operator_server);
    device_result.expect("device server error");
    operator_result.expect("operator server error");
    info!("servers shut down gracefully");
}

async fn wait_for_shutdown(mut rx: tokio::sync::broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
