use crate::api::{AppState, router};
use crate::janitor::RetentionJanitor;
use crate::relay::RelayBridge;
use common::Cancellation;
use common::model::config::Config;
use errors::{Result, ServerError};
use log::{error, info, warn};
use queue::{LocalLog, LogBackend, NotificationQueue, RedisLog};
use std::sync::Arc;
use std::time::Duration;
use storage::{KvBackend, LocalBackend, RedisBackend};
use tokio::task::JoinHandle;
use tracker::OperationStore;
use utils::connector::create_redis_pool;

/// Redis backends when `[redis]` is configured, in-process ones otherwise.
pub fn build_backends(config: &Config) -> Result<(Arc<dyn KvBackend>, Arc<dyn LogBackend>)> {
    match &config.redis {
        Some(redis) => {
            let pool = create_redis_pool(redis).ok_or_else(|| {
                ServerError::Backend(format!(
                    "failed to create redis pool for {}:{}",
                    redis.redis_host, redis.redis_port
                ))
            })?;
            info!("Using redis backend at {}:{}", redis.redis_host, redis.redis_port);
            let kv: Arc<dyn KvBackend> = Arc::new(RedisBackend::new(pool.clone()));
            let log: Arc<dyn LogBackend> = Arc::new(RedisLog::new(pool));
            Ok((kv, log))
        }
        None => {
            warn!("No [redis] section configured; using the in-process backend");
            let kv: Arc<dyn KvBackend> = Arc::new(LocalBackend::new());
            let log: Arc<dyn LogBackend> = Arc::new(LocalLog::new());
            Ok((kv, log))
        }
    }
}

pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        let (kv, log) = build_backends(&config)?;
        Ok(Self::with_backends(config, kv, log))
    }

    pub fn with_backends(config: Config, kv: Arc<dyn KvBackend>, log: Arc<dyn LogBackend>) -> Self {
        let queue = Arc::new(NotificationQueue::new(
            log,
            kv.clone(),
            Duration::from_millis(config.relay.block_ms),
        ));
        let store = Arc::new(OperationStore::new(kv.clone(), queue));
        let bridge = Arc::new(RelayBridge::new(store.clone(), config.relay.clone()));
        let state = AppState {
            store,
            bridge,
            kv,
            api_key: config.api.api_key.clone(),
            shutdown: Cancellation::new(),
        };
        Self { config, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Cancelling the returned signal stops the server and every live session.
    pub fn shutdown_signal(&self) -> Cancellation {
        self.state.shutdown.clone()
    }

    pub async fn run(self) -> Result<()> {
        let shutdown = self.state.shutdown.clone();
        let api = &self.config.api;
        let addr = format!("{}:{}", api.host, api.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("API server started on http://{addr}");
        if api.api_key.is_none() {
            warn!("No API Key configured; producer requests will be rejected. Set 'api.api_key' in config to enable access.");
        }

        let janitor = RetentionJanitor::from_config(
            self.state.store.queue().clone(),
            &self.config.retention,
        )
        .map(|janitor| janitor.spawn(shutdown.clone()));

        let signals = watch_signals(shutdown.clone());

        let app = router(self.state.clone());
        let graceful = shutdown.clone();
        let served = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await;

        shutdown.cancel();
        let _ = signals.await;
        if let Some(janitor) = janitor {
            let _ = janitor.await;
        }

        match served {
            Ok(()) => {
                info!("API server stopped gracefully");
                Ok(())
            }
            Err(e) => {
                error!("API server error: {e:?}");
                Err(ServerError::Serve(e).into())
            }
        }
    }
}

/// Cancels `shutdown` on Ctrl+C or SIGTERM. A signal that cannot be
/// listened for is logged and ignored.
fn watch_signals(shutdown: Cancellation) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = ctrl_c() => {
                info!("Received Ctrl+C, initiating shutdown...");
                shutdown.cancel();
            }
            _ = terminate() => {
                info!("Received SIGTERM, initiating shutdown...");
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
    })
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(e) => {
            error!("Failed to listen for SIGTERM: {e}");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
