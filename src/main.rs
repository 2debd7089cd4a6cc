//! Process entrypoint: logging, configuration, store connections, room
//! registration, and the HTTP server.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use button_hold_back::{
    config::AppConfig,
    dao::{
        postgres::{PostgresConfig, PostgresRecordStore},
        redis::{RedisConfig, RedisStore},
    },
    localization::{EmbeddedMessages, FlavorSource},
    routes,
    services::room_service,
    state::{AppState, GameRoom, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let config = AppConfig::load();
    let port = config.port;

    let redis = RedisStore::connect(RedisConfig::from_env()?)
        .await
        .context("connecting to Redis")?;
    let postgres = PostgresRecordStore::connect(PostgresConfig::from_env()?)
        .await
        .context("connecting to Postgres")?;

    let app_state = AppState::new(
        config,
        Arc::new(redis.clone()),
        Arc::new(postgres),
        Arc::new(redis),
    );

    register_rooms(&app_state).await?;

    let app = routes::router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(stop_requested())
        .await
        .context("serving HTTP")?;

    Ok(())
}

/// Open the predefined rooms from the configuration and re-register custom
/// rooms recorded by previous runs.
async fn register_rooms(state: &SharedState) -> anyhow::Result<()> {
    let flavor: Arc<dyn FlavorSource> = Arc::new(EmbeddedMessages::bundled());

    let predefined: Vec<_> = state.config().predefined_rooms().collect();
    for key in predefined {
        let room = GameRoom::open(
            key.clone(),
            state.active_store(),
            state.record_store(),
            state.chat_stream(),
            Some(flavor.clone()),
        )
        .await
        .with_context(|| format!("opening predefined room {key}"))?;
        state.insert_room(room).await;
    }
    info!(count = state.room_count().await, "registered predefined rooms");

    match room_service::restore_custom_rooms(state).await {
        Ok(restored) if restored > 0 => info!(restored, "restored custom rooms"),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "failed to restore custom rooms"),
    }

    Ok(())
}

/// Log to stdout with span context; `RUST_LOG` overrides the default filter.
fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves once the process is asked to stop: Ctrl+C everywhere, SIGTERM
/// additionally on unix (what container runtimes send first).
async fn stop_requested() {
    let interrupt = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = interrupt => {}
                    _ = term.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "no SIGTERM handler; stopping on Ctrl+C only");
                let _ = interrupt.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = interrupt.await;
    }
}
