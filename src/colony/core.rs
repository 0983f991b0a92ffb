//! # Colony: orchestrates zooid runtimes, event delivery, and shutdown.
//!
//! The [`Colony`] owns the signal bus, the [`SinkSet`], the registry store,
//! and the heartbeat tracker. It spawns per-zooid runtimes, handles OS
//! termination signals, and performs graceful shutdown with a configurable
//! grace window.
//!
//! ## High-level architecture
//! ```text
//! ColonyBuilder ──► Colony
//!                     ├─ Bus (broadcast signals)
//!                     ├─ SinkSet (governance events → sinks)
//!                     ├─ RegistryStore (locked lifecycle state)
//!                     ├─ HeartbeatTracker (bus → last-beat map)
//!                     └─ JoinSet<()> (one entry per ZooidRuntime)
//!
//! Shutdown path:
//!   OS signal (SIGINT/SIGTERM/SIGQUIT)
//!     └─► emit ShutdownRequested
//!     └─► publish governance.kill  → every runtime stops cooperatively
//!     └─► cancel runtime token     → heartbeats and listeners stop
//!     └─► wait up to grace:
//!           ├─ all joined   → emit AllStoppedWithin
//!           └─ still live   → emit GraceExceeded,
//!                             Err(RuntimeError::GraceExceeded { stuck })
//! ```

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::colony::HeartbeatTracker;
use crate::config::ColonyConfig;
use crate::error::RuntimeError;
use crate::events::{Event, EventKind, SinkSet};
use crate::integrity::HmacKey;
use crate::ledger::LedgerWriter;
use crate::registry::RegistryStore;
use crate::runtime::{SignalHandler, ZooidRuntime};
use crate::signals::{unix_ts, Bus, Signal};

/// Coordinates zooid runtimes, event delivery, and graceful shutdown.
#[derive(Debug)]
pub struct Colony {
    pub(crate) cfg: ColonyConfig,
    pub(crate) bus: Bus,
    pub(crate) key: HmacKey,
    pub(crate) sinks: Arc<SinkSet>,
    pub(crate) store: Arc<RegistryStore>,
    pub(crate) tracker: Arc<HeartbeatTracker>,
    pub(crate) runtime_token: CancellationToken,
    pub(crate) zooids: tokio::sync::Mutex<JoinSet<()>>,
}

impl Colony {
    /// Starts building a colony with the given configuration.
    pub fn builder(cfg: ColonyConfig) -> crate::colony::ColonyBuilder {
        crate::colony::ColonyBuilder::new(cfg)
    }

    /// The colony's signal bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The locked registry store.
    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.store
    }

    /// The governance-event fan-out.
    pub fn sinks(&self) -> &Arc<SinkSet> {
        &self.sinks
    }

    /// The heartbeat tracker fed from the bus.
    pub fn tracker(&self) -> &Arc<HeartbeatTracker> {
        &self.tracker
    }

    /// Token cancelled when the colony shuts down.
    pub fn runtime_token(&self) -> CancellationToken {
        self.runtime_token.clone()
    }

    /// Spawns a supervised zooid runtime subscribed to `topics`.
    pub async fn spawn_zooid(
        &self,
        name: impl Into<String>,
        niche: impl Into<String>,
        ecosystem: impl Into<String>,
        handler: Arc<dyn SignalHandler>,
        topics: Vec<String>,
    ) -> Arc<ZooidRuntime> {
        let zooid = ZooidRuntime::new(
            name,
            niche,
            ecosystem,
            self.bus.clone(),
            self.key.clone(),
            self.runtime_token.child_token(),
            &self.cfg,
            Arc::clone(&self.sinks),
        );
        let mut set = self.zooids.lock().await;
        set.spawn(Arc::clone(&zooid).run(handler, topics));
        zooid
    }

    /// Spawns the ledger writer consuming observation signals from the bus.
    pub fn spawn_ledger_writer(&self, ledger_path: impl Into<std::path::PathBuf>) {
        let writer = LedgerWriter::new(
            self.key.clone(),
            ledger_path,
            &self.cfg,
            Arc::clone(&self.sinks),
        );
        tokio::spawn(writer.run(
            self.bus.clone(),
            Arc::clone(&self.store),
            self.runtime_token.clone(),
        ));
    }

    /// Broadcasts the kill signal to every live zooid.
    pub fn kill_all(&self, ecosystem: impl Into<String>) {
        self.sinks.emit(Event::now(EventKind::KillBroadcast));
        self.bus.publish(Signal::kill(ecosystem));
    }

    /// Runs until an OS termination signal arrives, then shuts down.
    pub async fn run_until_shutdown(&self) -> Result<(), RuntimeError> {
        let _ = wait_for_shutdown_signal().await;
        self.sinks.emit(Event::now(EventKind::ShutdownRequested));
        self.shutdown().await
    }

    /// Kills every zooid and waits up to the configured grace for them to
    /// stop.
    ///
    /// On timeout, the heartbeat tracker names the zooids still live and the
    /// call fails with [`RuntimeError::GraceExceeded`].
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.kill_all("colony");
        self.runtime_token.cancel();

        let grace = self.cfg.grace;
        let mut set = self.zooids.lock().await;
        let done = async { while set.join_next().await.is_some() {} };

        match tokio::time::timeout(grace, done).await {
            Ok(()) => {
                self.sinks.emit(Event::now(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.sinks.emit(Event::now(EventKind::GraceExceeded));
                let ttl = self.cfg.heartbeat_period * 3;
                let stuck = self.tracker.snapshot_live(unix_ts(), ttl).await;
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

/// Waits for a termination signal.
///
/// Unix: SIGINT, SIGTERM, SIGQUIT (and Ctrl-C). Elsewhere: Ctrl-C only.
/// Each call creates independent listeners.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
