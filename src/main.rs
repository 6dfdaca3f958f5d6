use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use tollgate::{
    AppState, Forwarder, Gateway, GatewayConfig, HealthTracker, InMemoryStore, LogSink,
    MetadataStore, MetricsAggregator, ResolutionCache, SlidingWindowLimiter, router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = GatewayConfig::from_env().context("failed to build gateway config")?;

    let store: Arc<dyn MetadataStore> = Arc::new(InMemoryStore::new());
    let cache = Arc::new(ResolutionCache::new(
        store.clone(),
        cfg.credential_cache_ttl,
        cfg.route_cache_ttl,
        cfg.service_cache_ttl,
    ));
    let limiter = Arc::new(SlidingWindowLimiter::new());
    let metrics = Arc::new(MetricsAggregator::new());
    let logs = LogSink::new(store.clone(), cfg.log_queue_capacity);
    let forwarder = Forwarder::new(cfg.forward_timeout)
        .map_err(|e| anyhow!("failed to build forwarding client: {}", e.message()))?;

    let tracker = Arc::new(HealthTracker::new(
        store.clone(),
        cache.clone(),
        cfg.health_check_interval,
        cfg.health_check_timeout,
    )?);
    tracker.start();

    let flush_metrics = metrics.clone();
    let flush_store = store.clone();
    let flush_interval = cfg.metrics_flush_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(flush_interval);
        loop {
            ticker.tick().await;
            let merged = flush_metrics.flush_into(flush_store.as_ref()).await;
            if merged > 0 {
                tracing::debug!(credentials = merged, "metrics flushed");
            }
        }
    });

    let sweep_limiter = limiter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let evicted = sweep_limiter.sweep();
            if evicted > 0 {
                tracing::debug!(
                    evicted,
                    tracked = sweep_limiter.tracked_keys(),
                    "rate limit ledger swept"
                );
            }
        }
    });

    let drain_sink = logs.clone();
    tokio::spawn(async move { drain_sink.drain().await });

    let gateway = Arc::new(Gateway::new(
        store.clone(),
        cache,
        limiter,
        metrics.clone(),
        logs.clone(),
        forwarder,
        cfg.default_rate_limit,
    ));
    let app = router(AppState {
        gateway,
        store: store.clone(),
        default_rate_limit: cfg.default_rate_limit,
    });

    let listener = TcpListener::bind(cfg.bind_addr)
        .await
        .context("failed to bind listener")?;
    tracing::info!(addr = %cfg.bind_addr, "gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("gateway server error")?;

    // Whatever accumulated since the last timer tick still gets merged.
    let merged = metrics.flush_into(store.as_ref()).await;
    tracing::info!(
        credentials = merged,
        dropped_logs = logs.dropped(),
        "final metrics flush complete"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut signal) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            signal.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
