//! Process wiring: the HTTP API plus one supervised chat session per room.
//!
//! Sessions are single-use, so the reconnect policy lives here: each room
//! gets a watch loop that builds a fresh session per attempt and backs off
//! for a fixed delay after a failure.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use danmutv_core::{
    live::{
        Connector, GatewayResolver, HttpGatewayResolver, LiveEvent, LiveSession, SessionConfig,
        SessionNotice, WsConnector,
    },
    service::RoomRegistry,
    Config,
};

/// Registry poll cadence for picking up rooms added through the API.
const WATCHER_RECONCILE_INTERVAL: Duration = Duration::from_secs(10);

pub async fn run(config: Config) -> Result<()> {
    let registry = Arc::new(RoomRegistry::new());

    // Seed the registry from configuration.
    for &room_id in &config.live.rooms {
        match registry.add(room_id, config.account.uid, true, false, true) {
            Ok(_) => info!(room_id, "room registered from config"),
            Err(e) => warn!(room_id, error = %e, "skipping configured room"),
        }
    }

    let mut resolver = HttpGatewayResolver::new(config.live.api_domain.clone())
        .context("building gateway resolver")?;
    if let Some(cookie) = &config.account.cookie {
        resolver = resolver.with_cookie(cookie.clone());
    }
    let resolver: Arc<dyn GatewayResolver> = Arc::new(resolver);
    let connector: Arc<dyn Connector> = Arc::new(WsConnector);

    let session_config = SessionConfig {
        uid: config.account.uid,
        buvid: config.account.buvid.clone(),
        heartbeat_interval: Duration::from_secs(config.live.heartbeat_interval_secs),
    };
    let reconnect_delay = Duration::from_secs(config.live.reconnect_delay_secs);

    let shutdown = CancellationToken::new();

    let watchers = tokio::spawn(reconcile_watchers(
        registry.clone(),
        session_config,
        resolver,
        connector,
        reconnect_delay,
        shutdown.clone(),
    ));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    let app = danmutv_api::create_router(registry);
    let listener = tokio::net::TcpListener::bind(config.http_address())
        .await
        .with_context(|| format!("binding {}", config.http_address()))?;
    info!("HTTP API listening on {}", config.http_address());

    let http_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
        .await
        .context("http server")?;

    shutdown.cancel();
    let _ = watchers.await;
    info!("DanmuTV stopped");
    Ok(())
}

/// Spawns a watch loop for every registered room and keeps polling the
/// registry so rooms added through the API get watched too.
async fn reconcile_watchers(
    registry: Arc<RoomRegistry>,
    session_config: SessionConfig,
    resolver: Arc<dyn GatewayResolver>,
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
) {
    let mut watched: HashSet<u64> = HashSet::new();
    let mut handles = Vec::new();

    loop {
        for room in registry.list() {
            if watched.insert(room.room_id) {
                handles.push(tokio::spawn(watch_room(
                    room.room_id,
                    session_config.clone(),
                    resolver.clone(),
                    connector.clone(),
                    reconnect_delay,
                    shutdown.child_token(),
                )));
            }
        }

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(WATCHER_RECONCILE_INTERVAL) => {}
        }
    }

    for handle in handles {
        let _ = handle.await;
    }
}

/// Owns the reconnect policy for one room: each attempt builds a fresh
/// session (gateway tokens are single-use), consumes its notices, and backs
/// off after a terminal failure.
async fn watch_room(
    room_id: u64,
    session_config: SessionConfig,
    resolver: Arc<dyn GatewayResolver>,
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
) {
    while !shutdown.is_cancelled() {
        let (notice_tx, mut notices) = mpsc::unbounded_channel();
        let session = LiveSession::new(
            room_id,
            session_config.clone(),
            resolver.clone(),
            connector.clone(),
            notice_tx,
        );

        match session.connect().await {
            Ok(()) => {
                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => {
                            session.close().await;
                            return;
                        }
                        notice = notices.recv() => match notice {
                            Some(SessionNotice::Event(event)) => log_event(&event),
                            Some(SessionNotice::Failed(err)) => {
                                warn!(room_id, error = %err, "live session failed");
                                break;
                            }
                            None => break,
                        }
                    }
                }
                session.close().await;
            }
            Err(err) => error!(room_id, error = %err, "connect attempt failed"),
        }

        tokio::select! {
            () = shutdown.cancelled() => return,
            () = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

fn log_event(event: &LiveEvent) {
    match event {
        LiveEvent::ViewerCount { room_id, count } => {
            debug!(room_id, count, "viewer count");
        }
        LiveEvent::ModerationWarning { room_id, .. } => {
            warn!(room_id, "moderation warning received");
        }
        LiveEvent::StreamCutOff { room_id, .. } => {
            warn!(room_id, "stream cut off by platform");
        }
        other => {
            info!(room_id = other.room_id(), kind = other.kind(), "live event");
        }
    }
}
