//! Coordinator Client
//!
//! Everything this executor says to the coordinator: registration on
//! startup, the periodic heartbeat that keeps the registration alive, the
//! de-registration on shutdown, and delivery of batched result callbacks.
//!
//! ## Responsibilities
//! - **Registration/heartbeat**: re-POST the registry record on a fixed
//!   interval until shutdown.
//! - **Callback delivery**: drain the reporter channel and send one HTTP
//!   call per drained batch. Fire-and-forget: delivery failures are logged,
//!   not retried beyond the per-call transport retry.
//! - **Transport**: JSON POSTs with access-token header and
//!   retry-with-backoff against each configured coordinator address.

pub mod client;
pub mod protocol;


pub use client::AdminClient;
