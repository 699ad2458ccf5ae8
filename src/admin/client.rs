//! Coordinator HTTP Client
//!
//! Talks to every configured coordinator address. Registration and removal
//! go to all of them; callbacks stop at the first address that accepts the
//! batch. Each POST retries with exponential backoff and jitter to ride out
//! transient network blips.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::protocol::{
    AdminResponse, HandleCallbackParam, RegistryParam, ACCESS_TOKEN_HEADER, API_CALLBACK,
    API_REGISTRY, API_REGISTRY_REMOVE, REGISTRY_GROUP_EXECUTOR,
};
use crate::config::ExecutorConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_ATTEMPTS: usize = 3;

pub struct AdminClient {
    addresses: Vec<String>,
    app_name: String,
    register_value: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl AdminClient {
    pub fn new(config: &ExecutorConfig) -> Arc<Self> {
        Arc::new(Self {
            addresses: config.admin_addresses.clone(),
            app_name: config.app_name.clone(),
            register_value: config.register_address(),
            access_token: config.access_token.clone(),
            http: reqwest::Client::new(),
        })
    }

    fn registry_param(&self) -> RegistryParam {
        RegistryParam {
            registry_group: REGISTRY_GROUP_EXECUTOR.to_string(),
            registry_key: self.app_name.clone(),
            registry_value: self.register_value.clone(),
        }
    }

    /// Registers this executor with every coordinator address.
    pub async fn register(&self) {
        let param = self.registry_param();
        for address in &self.addresses {
            match self.post_with_retry(address, API_REGISTRY, &param).await {
                Ok(response) if response.is_success() => {
                    tracing::debug!("registered at {}", address);
                }
                Ok(response) => {
                    tracing::warn!(
                        "coordinator {} refused registration: {}",
                        address,
                        response.msg.unwrap_or_default()
                    );
                }
                Err(e) => {
                    tracing::warn!("registration with {} failed: {}", address, e);
                }
            }
        }
    }

    /// Removes this executor's registration from every coordinator address.
    pub async fn remove(&self) {
        let param = self.registry_param();
        for address in &self.addresses {
            if let Err(e) = self
                .post_with_retry(address, API_REGISTRY_REMOVE, &param)
                .await
            {
                tracing::warn!("de-registration with {} failed: {}", address, e);
            }
        }
    }

    /// Delivers one batch of callback records. Addresses are tried in order
    /// until one accepts; total failure is logged and the batch dropped —
    /// the core does not re-queue callbacks.
    pub async fn callback(&self, batch: &[HandleCallbackParam]) {
        for address in &self.addresses {
            match self.post_with_retry(address, API_CALLBACK, &batch).await {
                Ok(response) if response.is_success() => return,
                Ok(response) => {
                    tracing::warn!(
                        "coordinator {} rejected callback batch: {}",
                        address,
                        response.msg.unwrap_or_default()
                    );
                }
                Err(e) => {
                    tracing::warn!("callback delivery to {} failed: {}", address, e);
                }
            }
        }
        tracing::error!("dropped callback batch of {} record(s)", batch.len());
    }

    /// Spawns the heartbeat loop: re-register on every tick until shutdown.
    pub fn spawn_heartbeat(
        self: &Arc<Self>,
        beat_interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(beat_interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => client.register().await,
                }
            }
            tracing::debug!("heartbeat loop stopped");
        })
    }

    /// Spawns the callback delivery loop: block on the next record, then
    /// drain whatever else is already queued into the same batch so bursts
    /// of results cost one HTTP call.
    pub fn spawn_callback_loop(
        self: &Arc<Self>,
        mut rx: UnboundedReceiver<HandleCallbackParam>,
    ) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            while let Some(first) = rx.recv().await {
                let mut batch = vec![first];
                while let Ok(next) = rx.try_recv() {
                    batch.push(next);
                }
                client.callback(&batch).await;
            }
            tracing::debug!("callback loop stopped");
        })
    }

    async fn post_with_retry<T: serde::Serialize + ?Sized>(
        &self,
        address: &str,
        api: &str,
        payload: &T,
    ) -> anyhow::Result<AdminResponse> {
        let url = format!("{}/{}", address.trim_end_matches('/'), api);
        let mut delay_ms = 150u64;

        for attempt in 0..RETRY_ATTEMPTS {
            let mut request = self
                .http
                .post(&url)
                .json(payload)
                .timeout(REQUEST_TIMEOUT);
            if let Some(token) = &self.access_token {
                request = request.header(ACCESS_TOKEN_HEADER, token);
            }

            match request.send().await {
                Ok(response) => {
                    let parsed = response.json::<AdminResponse>().await?;
                    return Ok(parsed);
                }
                Err(e) => {
                    if attempt + 1 == RETRY_ATTEMPTS {
                        return Err(anyhow::anyhow!(e));
                    }
                    // Jitter to avoid thundering-herd retries
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("retry attempts exhausted"))
    }
}
