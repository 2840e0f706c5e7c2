//! Puzzle Arena Back binary entrypoint wiring REST, WebSocket, SSE and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use puzzle_arena_back::{
    config::{AppConfig, DirectoryConfig},
    dao::arena_store::memory::MemoryArenaStore,
    routes,
    services::catalog_client::HttpCatalogClient,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let catalog = HttpCatalogClient::new(&config.catalog).context("building catalog client")?;
    let directory = config.directory.clone();

    let (app_state, dispatcher) = AppState::new(config, Arc::new(catalog));
    tokio::spawn(dispatcher.run());

    install_storage(&app_state, directory).await?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Select the storage backend from `STORAGE_BACKEND` (`memory` by default, or `mongo`).
async fn install_storage(state: &SharedState, directory: DirectoryConfig) -> anyhow::Result<()> {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".into());
    match backend.to_ascii_lowercase().as_str() {
        "memory" => {
            let store = MemoryArenaStore::with_directory(directory.competitions, directory.users);
            state.set_store(Arc::new(store)).await;
            info!("using embedded in-memory store");
            Ok(())
        }
        "mongo" | "mongodb" => spawn_mongo_supervisor(state),
        other => bail!("unknown STORAGE_BACKEND `{other}` (expected `memory` or `mongo`)"),
    }
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: &SharedState) -> anyhow::Result<()> {
    use puzzle_arena_back::{
        dao::{
            arena_store::{
                ArenaStore,
                mongodb::{MongoArenaStore, MongoConfig},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    // The supervisor keeps the application degraded until MongoDB is reachable.
    tokio::spawn(storage_supervisor::run(state.clone(), || async {
        let config = MongoConfig::from_env().await?;
        let store = MongoArenaStore::connect(config).await?;
        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ArenaStore>)
    }));
    info!("using MongoDB store");
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: &SharedState) -> anyhow::Result<()> {
    bail!("STORAGE_BACKEND=mongo requires the `mongo-store` feature")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
