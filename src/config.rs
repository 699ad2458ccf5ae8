//! Executor Configuration
//!
//! All tunables for the runtime, built through a chainable builder so the
//! host application only spells out what differs from the defaults. The
//! defaults mirror the directory conventions the coordinator ecosystem
//! expects for glue sources and run logs.

use std::net::{IpAddr, UdpSocket};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for an [`crate::ExecutorClient`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Application name this executor registers under at the coordinator.
    pub app_name: String,
    /// Port the control-surface HTTP server binds to.
    pub port: u16,
    /// Base URLs of the coordinator instances, e.g. `http://localhost:8080/xxl-job-admin`.
    pub admin_addresses: Vec<String>,
    /// Access token sent with every coordinator request, if configured.
    pub access_token: Option<String>,
    /// Directory where script-mode glue sources are materialized.
    pub glue_source_dir: PathBuf,
    /// Base directory for date-partitioned run-log files.
    pub log_dir: PathBuf,
    /// Interval between registration heartbeats to the coordinator.
    pub beat_interval: Duration,
    /// IP address advertised to the coordinator. Discovered from the first
    /// outbound-capable interface when unset.
    pub advertise_ip: Option<IpAddr>,
    /// When true, run requests drained from a queue by a kill request each
    /// report a failure callback instead of disappearing silently.
    pub callback_on_drain: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            app_name: "job-executor".to_string(),
            port: 9999,
            admin_addresses: Vec::new(),
            access_token: None,
            glue_source_dir: PathBuf::from("/data/applogs/xxl-job/jobhandler/gluesource"),
            log_dir: PathBuf::from("/data/applogs/xxl-job/jobhandler"),
            beat_interval: Duration::from_secs(30),
            advertise_ip: None,
            callback_on_drain: false,
        }
    }
}

impl ExecutorConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Self::default()
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn admin_address(mut self, addr: impl Into<String>) -> Self {
        self.admin_addresses.push(addr.into());
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn glue_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.glue_source_dir = dir.into();
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn beat_interval(mut self, interval: Duration) -> Self {
        self.beat_interval = interval;
        self
    }

    pub fn advertise_ip(mut self, ip: IpAddr) -> Self {
        self.advertise_ip = Some(ip);
        self
    }

    pub fn callback_on_drain(mut self, enabled: bool) -> Self {
        self.callback_on_drain = enabled;
        self
    }

    /// The address the coordinator should call back into, e.g. `http://10.0.0.3:9999/`.
    pub fn register_address(&self) -> String {
        let ip = self
            .advertise_ip
            .or_else(discover_local_ip)
            .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]));
        format!("http://{}:{}/", ip, self.port)
    }
}

/// Best-effort discovery of the local non-loopback address: open a UDP socket
/// toward a public IP (no packet is sent) and read the chosen source address.
fn discover_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
