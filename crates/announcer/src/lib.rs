//! Herald announcer - keeps services visible in a Consul-compatible agent.
//!
//! Given a set of service definitions, the announcer registers each one
//! with the local agent and keeps its TTL health check passing, one worker
//! per service:
//!
//! - **[`AnnounceUnit`]**: the per-service worker. Registers the service,
//!   refreshes its check every tick (a fifth of the check TTL), and backs
//!   off exponentially while the agent is unreachable. Deregisters on the
//!   way down.
//! - **[`Announcer`]**: the serialized registry of units, keyed by the
//!   service's `(id, name)` pair. Supports runtime register / unregister /
//!   whereis on top of the startup set.
//! - **[`AnnounceServer`]**: daemon wiring around a YAML [`Config`].
//!
//! Per-tick failures never escape a unit; `stat` exposes the current
//! registration and heartbeat health instead.

pub mod announcer;
pub mod config;
pub mod server;
pub mod unit;

pub use announcer::{AnnounceError, Announcer};
pub use config::{Config, ConfigError};
pub use server::AnnounceServer;
pub use unit::{AnnounceUnit, Health, UnitHandle, UnitStat};
