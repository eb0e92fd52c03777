//! Per-service announce worker.
//!
//! One unit is spawned per announced service. It owns the tick loop that
//! keeps the agent convinced the service exists and is passing: register
//! when the agent does not know us, refresh the TTL check every tick, and
//! back off exponentially when the agent is unreachable. All mutation
//! happens on the unit's own task; the outside world only reads [`stat`].
//!
//! [`stat`]: AnnounceUnit::stat

use herald_agent::{AgentClient, AgentError, Service, Status};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// Ceiling for the failure backoff.
const MAX_BACKOFF: Duration = Duration::from_millis(300_000);

/// Tick interval for services without a check. There is no heartbeat to
/// refresh; the tick only re-registers if a failure cleared our state.
const NO_CHECK_TICK: Duration = Duration::from_millis(300_000);

/// Smallest allowed heartbeat interval.
const MIN_TICK_MS: u64 = 50;

/// Fallback when a check carries no (or an unparseable) TTL.
const DEFAULT_TTL_MS: u64 = 10_000;

/// How long a stopping worker may take to deregister before it is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(5_000);

/// Health of one leg of the announce cycle, as reported by [`AnnounceUnit::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    Error,
}

/// Snapshot of a unit's registration and heartbeat health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStat {
    pub service: Health,
    pub heartbeat: Health,
}

/// Announce state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    /// Not registered at the agent, or we no longer believe we are.
    Absent,
    /// Register went through; heartbeat not yet confirmed this cycle.
    Registered,
    /// Register went through and the last heartbeat succeeded.
    Beating,
    /// Last tick failed; the next attempt runs after `wait`.
    Failing { wait: Duration },
}

struct UnitShared {
    service: Service,
    client: Arc<AgentClient>,
    base_tick: Duration,
    state: RwLock<UnitState>,
    stop: Notify,
    worker: StdMutex<Option<AbortHandle>>,
}

impl UnitShared {
    async fn stat(&self) -> UnitStat {
        match *self.state.read().await {
            UnitState::Beating => UnitStat {
                service: Health::Ok,
                heartbeat: Health::Ok,
            },
            UnitState::Registered => UnitStat {
                service: Health::Ok,
                heartbeat: Health::Error,
            },
            UnitState::Absent | UnitState::Failing { .. } => UnitStat {
                service: Health::Error,
                heartbeat: Health::Error,
            },
        }
    }

    async fn current_wait(&self) -> Duration {
        match *self.state.read().await {
            UnitState::Failing { wait } => wait,
            _ => self.base_tick,
        }
    }

    /// Run one tick and return the wait until the next one.
    async fn run_tick(&self, current_wait: Duration) -> Duration {
        let was_failing = matches!(*self.state.read().await, UnitState::Failing { .. });
        match self.tick().await {
            Ok(()) => {
                if was_failing {
                    debug!(service = %self.service, "ok");
                }
                self.base_tick
            }
            Err(error) => {
                let wait = next_backoff(current_wait);
                *self.state.write().await = UnitState::Failing { wait };
                warn!(
                    service = %self.service,
                    error = %error,
                    retry_ms = wait.as_millis() as u64,
                    "Announce tick failed"
                );
                wait
            }
        }
    }

    /// One register-then-heartbeat cycle. A heartbeat is never attempted
    /// before registration is confirmed in the same cycle.
    async fn tick(&self) -> Result<(), AgentError> {
        let registered = matches!(
            *self.state.read().await,
            UnitState::Registered | UnitState::Beating
        );
        if !registered {
            self.client.service_register(&self.service).await?;
            *self.state.write().await = UnitState::Registered;
        }

        if self.service.check.is_some() {
            self.client
                .check_update(&self.service, &Status::passing())
                .await?;
            *self.state.write().await = UnitState::Beating;
        }
        Ok(())
    }

    async fn deregister(&self) {
        let Some(id) = self.service.id.as_deref().or(self.service.name.as_deref()) else {
            return;
        };
        match self.client.service_deregister(id).await {
            Ok(()) => info!(service = %self.service, "Service deregistered"),
            Err(error) => {
                warn!(service = %self.service, error = %error, "Deregistration failed")
            }
        }
    }
}

/// Worker for one announced service.
pub struct AnnounceUnit {
    shared: Arc<UnitShared>,
    supervisor: JoinHandle<()>,
}

impl AnnounceUnit {
    /// Create the unit and run its first tick before returning, so `stat`
    /// reflects a real attempt immediately. A failing first tick is not
    /// fatal: the unit starts out backing off and retries.
    pub async fn spawn(service: Service, client: Arc<AgentClient>) -> Self {
        let base_tick = base_tick(&service);
        let shared = Arc::new(UnitShared {
            service,
            client,
            base_tick,
            state: RwLock::new(UnitState::Absent),
            stop: Notify::new(),
            worker: StdMutex::new(None),
        });

        let first_wait = shared.run_tick(base_tick).await;
        let supervisor = tokio::spawn(supervise(shared.clone(), first_wait));

        Self { shared, supervisor }
    }

    /// Current registration / heartbeat health. Never fails.
    pub async fn stat(&self) -> UnitStat {
        self.shared.stat().await
    }

    /// Steady-state interval between heartbeats.
    pub fn base_tick(&self) -> Duration {
        self.shared.base_tick
    }

    /// Wait before the next tick: the base tick, or the current backoff
    /// while failing.
    pub async fn current_wait(&self) -> Duration {
        self.shared.current_wait().await
    }

    pub fn service(&self) -> &Service {
        &self.shared.service
    }

    /// Cloneable live view of this unit.
    pub fn handle(&self) -> UnitHandle {
        UnitHandle {
            shared: self.shared.clone(),
        }
    }

    /// Stop the worker and reap it. The worker cancels its pending timer,
    /// deregisters the service at the agent, and exits; if that takes
    /// longer than the shutdown grace it is aborted.
    pub async fn shutdown(mut self) {
        self.shared.stop.notify_one();
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.supervisor)
            .await
            .is_err()
        {
            warn!(service = %self.shared.service, "Announce worker did not stop in time, aborting");
            if let Some(worker) = self.shared.worker.lock().unwrap().take() {
                worker.abort();
            }
            self.supervisor.abort();
        }
    }
}

/// Cloneable view of a live unit, as returned by the announcer's `whereis`.
#[derive(Clone)]
pub struct UnitHandle {
    shared: Arc<UnitShared>,
}

impl UnitHandle {
    /// Current registration / heartbeat health. Never fails.
    pub async fn stat(&self) -> UnitStat {
        self.shared.stat().await
    }

    pub fn service(&self) -> &Service {
        &self.shared.service
    }

    pub fn base_tick(&self) -> Duration {
        self.shared.base_tick
    }

    pub async fn current_wait(&self) -> Duration {
        self.shared.current_wait().await
    }
}

/// Watch the worker task and apply the transient restart policy: a worker
/// that panics is restarted from a clean slate; a worker that exits after a
/// stop request is not.
async fn supervise(shared: Arc<UnitShared>, first_wait: Duration) {
    let mut wait = first_wait;
    loop {
        let worker = tokio::spawn(run(shared.clone(), wait));
        *shared.worker.lock().unwrap() = Some(worker.abort_handle());
        match worker.await {
            Ok(()) => break,
            Err(error) if error.is_panic() => {
                warn!(service = %shared.service, "Announce worker crashed, restarting");
                *shared.state.write().await = UnitState::Absent;
                wait = shared.base_tick;
            }
            Err(_) => break,
        }
    }
}

async fn run(shared: Arc<UnitShared>, mut wait: Duration) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                wait = shared.run_tick(wait).await;
            }
            _ = shared.stop.notified() => break,
        }
    }
    // The pending timer is gone (the select dropped it); deregistration is
    // the last thing the worker does.
    shared.deregister().await;
}

/// Heartbeat interval for a service: a fifth of the check TTL, clamped to
/// at least 50ms. Without a check there is no heartbeat to refresh and the
/// unit idles on [`NO_CHECK_TICK`].
fn base_tick(service: &Service) -> Duration {
    match &service.check {
        None => NO_CHECK_TICK,
        Some(check) => {
            let millis = check
                .ttl
                .as_deref()
                .and_then(ttl_millis)
                .unwrap_or(DEFAULT_TTL_MS);
            Duration::from_millis((millis / 5).max(MIN_TICK_MS))
        }
    }
}

/// Milliseconds described by a TTL string: an integer with an optional
/// `h`/`m`/`s` suffix. A bare integer is milliseconds.
fn ttl_millis(ttl: &str) -> Option<u64> {
    let ttl = ttl.trim();
    let split = ttl
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(ttl.len());
    let (digits, suffix) = ttl.split_at(split);
    let value: u64 = digits.parse().ok()?;
    let multiplier = match suffix {
        "h" => 3_600_000,
        "m" => 60_000,
        "s" => 1_000,
        "" => 1,
        _ => return None,
    };
    Some(value * multiplier)
}

/// Doubled wait, capped at five minutes.
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
