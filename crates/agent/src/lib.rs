//! Typed HTTP client for a Consul-compatible discovery agent.
//!
//! This crate is the read/write surface against the local agent:
//! - **Domain values** ([`Service`], [`Check`], [`Status`], [`Node`]) with
//!   their exact wire codecs,
//! - a **transport seam** ([`Transport`]) with a reqwest-backed production
//!   implementation ([`HttpTransport`]),
//! - the **typed agent API** ([`AgentClient`]): service registration and
//!   TTL check updates, service discovery, session lifecycle, and a simple
//!   KV surface.
//!
//! # Example
//!
//! ```no_run
//! use herald_agent::{AgentClient, HttpTransport, Service, DEFAULT_ENDPOINT};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new()?);
//! let client = AgentClient::new(DEFAULT_ENDPOINT, None, transport);
//!
//! let service = Service {
//!     id: Some("web-1".to_string()),
//!     name: Some("web".to_string()),
//!     port: Some(8080),
//!     ..Service::default()
//! };
//! client.service_register(&service).await?;
//!
//! for peer in client.services("web", &[]).await? {
//!     println!("{}: {:?}", peer.service, peer.service.address);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::{AgentClient, ServiceFilter, SessionOptions, DEFAULT_ENDPOINT};
pub use error::AgentError;
pub use transport::{
    HttpTransport, Method, Payload, Request, Response, Transport, TransportError,
};
pub use types::{AnnounceKey, Check, Discovered, Node, Service, State, Status, TaggedAddresses};
