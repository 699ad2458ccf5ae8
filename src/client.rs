//! Host-Facing Facade
//!
//! `ExecutorClient` wires the subsystems together for the embedding host:
//! build it from a configuration, register job functions, then `run()` to
//! register with the coordinator and serve control requests until
//! `shutdown()` is called.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use axum::routing::post;
use axum::{Extension, Router};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::admin::protocol::HandleCallbackParam;
use crate::admin::AdminClient;
use crate::config::ExecutorConfig;
use crate::executor::error::ExecutorError;
use crate::executor::handlers;
use crate::executor::protocol::{
    ENDPOINT_BEAT, ENDPOINT_IDLE_BEAT, ENDPOINT_KILL, ENDPOINT_LOG, ENDPOINT_RUN,
};
use crate::executor::registry::JobRegistry;
use crate::executor::reporter::ResultReporter;
use crate::executor::types::RunContext;

pub struct ExecutorClient {
    config: Arc<ExecutorConfig>,
    registry: Arc<JobRegistry>,
    admin: Arc<AdminClient>,
    callback_rx: Mutex<Option<UnboundedReceiver<HandleCallbackParam>>>,
    shutdown: CancellationToken,
}

impl ExecutorClient {
    pub fn new(config: ExecutorConfig) -> Self {
        let (reporter, callback_rx) = ResultReporter::channel();
        let registry = JobRegistry::new(&config, reporter);
        let admin = AdminClient::new(&config);
        Self {
            config: Arc::new(config),
            registry,
            admin,
            callback_rx: Mutex::new(Some(callback_rx)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Registers a named job function. Must happen before [`run`] so the
    /// coordinator never triggers a name the registry does not know.
    ///
    /// [`run`]: ExecutorClient::run
    pub fn register_job<F, Fut>(&self, name: &str, job: F) -> Result<(), ExecutorError>
    where
        F: Fn(RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        // Box::pin type-erases the concrete future so differently shaped
        // job functions share one table entry type
        self.registry.register_job(
            name,
            Arc::new(move |ctx| {
                Box::pin(job(ctx)) as Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
            }),
        )
    }

    /// The underlying registry, for hosts that need direct access.
    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// Registers with the coordinator, starts the heartbeat and callback
    /// loops, and serves the control surface until [`shutdown`] is called.
    /// On the way out the registry is reset and the registration removed.
    ///
    /// [`shutdown`]: ExecutorClient::shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config.glue_source_dir)?;
        std::fs::create_dir_all(&self.config.log_dir)?;

        self.admin.register().await;
        let heartbeat = self
            .admin
            .spawn_heartbeat(self.config.beat_interval, self.shutdown.clone());

        let callback_rx = self
            .callback_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("executor client already running"))?;
        let callback_loop = self.admin.spawn_callback_loop(callback_rx);

        let app = Router::new()
            .route(ENDPOINT_BEAT, post(handlers::handle_beat))
            .route(ENDPOINT_IDLE_BEAT, post(handlers::handle_idle_beat))
            .route(ENDPOINT_KILL, post(handlers::handle_kill))
            .route(ENDPOINT_LOG, post(handlers::handle_log))
            .route(ENDPOINT_RUN, post(handlers::handle_run))
            // The coordinator treats any unmatched path as a trigger.
            .fallback(handlers::handle_run)
            .layer(Extension(self.registry.clone()))
            .layer(Extension(self.config.clone()));

        let bind_addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!(
            "executor '{}' serving control surface on {}",
            self.config.app_name,
            bind_addr
        );

        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!("control surface stopped, unregistering");
        heartbeat.abort();
        self.registry.reset();
        self.admin.remove().await;
        callback_loop.abort();
        Ok(())
    }

    /// Stops the control surface; [`run`] then unregisters and returns.
    ///
    /// [`run`]: ExecutorClient::run
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
