//! The tally node: owns the event registry and drives its timers and servers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use tally_engine::{EngineRegistry, EventEngine};
use tally_rpc::{RpcServer, RpcState};
use tally_types::{Clock, SystemClock};
use tally_utils::format_duration;
use tally_websocket::WebSocketServer;

use crate::config::{EventConfig, NodeConfig};
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::persistence::JsonFilePersistence;
use crate::shutdown::ShutdownController;
use crate::tracing_spans;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running tally node.
pub struct TallyNode {
    pub config: NodeConfig,
    pub registry: Arc<EngineRegistry>,
    pub metrics: Arc<NodeMetrics>,
    pub shutdown: Arc<ShutdownController>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl TallyNode {
    /// Create a node on the wall clock and bootstrap the configured events.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: NodeConfig, clock: Arc<dyn Clock>) -> Result<Self, NodeError> {
        config.validate()?;
        let registry = Arc::new(EngineRegistry::new(config.engine_config(), clock));
        let node = Self {
            config,
            registry,
            metrics: Arc::new(NodeMetrics::new()),
            shutdown: Arc::new(ShutdownController::new()),
            task_handles: Vec::new(),
        };
        for event in node.config.events.clone() {
            node.add_event(&event)?;
        }
        node.metrics.refresh(&node.registry);
        Ok(node)
    }

    /// Create an event, register its contestants and, when a data directory
    /// is configured, restore whatever a previous run saved for it.
    pub fn add_event(&self, event: &EventConfig) -> Result<Arc<EventEngine>, NodeError> {
        let name = if event.name.is_empty() {
            event.id.to_string()
        } else {
            event.name.clone()
        };
        let engine = self.registry.create_event(event.id.clone(), name)?;
        for profile in &event.contestants {
            engine.register_contestant(profile.clone())?;
        }
        if let Some(data_dir) = &self.config.data_dir {
            let _span = tracing_spans::persist_span(event.id.as_str(), "restore").entered();
            let persistence = JsonFilePersistence::open(data_dir, &event.id)?;
            engine.restore_from(&persistence)?;
        }
        Ok(engine)
    }

    pub fn registry(&self) -> Arc<EngineRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<NodeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Spawn the timer tasks and the enabled servers, then return.
    pub fn start(&mut self) -> Result<(), NodeError> {
        tracing::info!(
            events = self.registry.len(),
            update_interval = %format_duration(self.config.update_interval()),
            sample_interval = %format_duration(self.config.sample_interval()),
            rpc = self.config.enable_rpc,
            websocket = self.config.enable_websocket,
            "tally node starting"
        );

        // ── Snapshot publisher ─────────────────────────────────────────────
        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.metrics);
        let mut shutdown_rx = self.shutdown.subscribe();
        let update_interval = self.config.update_interval();

        let publish_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(update_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("publisher task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        for engine in registry.engines() {
                            let _span = tracing_spans::tick_span(engine.event_id().as_str()).entered();
                            let started = Instant::now();
                            let outcome = engine.tick();
                            metrics.observe_tick(started.elapsed(), &outcome);
                        }
                        metrics.refresh(&registry);
                    }
                }
            }
        });
        self.task_handles.push(publish_handle);

        // ── Trend sampler ──────────────────────────────────────────────────
        let registry = Arc::clone(&self.registry);
        let mut shutdown_rx = self.shutdown.subscribe();
        let sample_interval = self.config.sample_interval();

        let sample_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sample_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("trend sampler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        for engine in registry.engines() {
                            let _span = tracing_spans::sample_span(engine.event_id().as_str()).entered();
                            let sampled = engine.sample();
                            tracing::trace!(sampled, "trend samples recorded");
                        }
                    }
                }
            }
        });
        self.task_handles.push(sample_handle);

        // ── Tally persistence (optional) ───────────────────────────────────
        if let Some(data_dir) = self.config.data_dir.clone() {
            let registry = Arc::clone(&self.registry);
            let mut shutdown_rx = self.shutdown.subscribe();
            let persist_interval = self.config.persist_interval();

            let persist_handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval(persist_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // The first tick fires immediately; nothing new to save yet.
                interval.tick().await;
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            tracing::debug!("persist task shutting down");
                            break;
                        }
                        _ = interval.tick() => {
                            persist_all(&registry, &data_dir);
                        }
                    }
                }
            });
            self.task_handles.push(persist_handle);
        }

        // ── RPC server (optional) ──────────────────────────────────────────
        if self.config.enable_rpc {
            let port = self.config.rpc_port;
            let mut state = RpcState::new(Arc::clone(&self.registry));
            if self.config.enable_metrics {
                state = state.with_metrics(self.metrics.registry.clone());
            }
            let server = RpcServer::new(port, state);
            let shutdown = self.shutdown.signal();

            let rpc_handle = tokio::spawn(
                async move {
                    match server.start(shutdown).await {
                        Ok(()) => tracing::info!("RPC server exited"),
                        Err(e) => tracing::error!("RPC server error: {e}"),
                    }
                }
                .instrument(tracing_spans::rpc_span(port)),
            );
            self.task_handles.push(rpc_handle);
        }

        // ── WebSocket server (optional) ────────────────────────────────────
        if self.config.enable_websocket {
            let port = self.config.websocket_port;
            let server = WebSocketServer::new(port, Arc::clone(&self.registry));
            let shutdown = self.shutdown.signal();

            let ws_handle = tokio::spawn(
                async move {
                    match server.start(shutdown).await {
                        Ok(()) => tracing::info!("WebSocket server exited"),
                        Err(e) => tracing::error!("WebSocket server error: {e}"),
                    }
                }
                .instrument(tracing_spans::websocket_span(port)),
            );
            self.task_handles.push(ws_handle);
        }

        tracing::info!("tally node started");
        Ok(())
    }

    /// Block until SIGINT/SIGTERM or a programmatic shutdown.
    pub async fn wait_for_shutdown(&self) {
        let signal = self.shutdown.signal();
        tokio::select! {
            _ = self.shutdown.wait_for_signal() => {}
            _ = signal => {}
        }
    }

    /// Stop the node gracefully.
    ///
    /// Signals every task, waits for them (bounded by a timeout), then saves
    /// tallies one last time so a restart loses nothing that was accepted.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("tally node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all)
            .await
            .is_err()
        {
            tracing::warn!(
                "shutdown timeout ({:?}) — some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        if let Some(data_dir) = &self.config.data_dir {
            persist_all(&self.registry, data_dir);
        }

        // Final metrics snapshot
        self.metrics.refresh(&self.registry);

        tracing::info!("tally node stopped");
        Ok(())
    }
}

/// Save every event's tallies. Failures are logged and retried next pass.
fn persist_all(registry: &EngineRegistry, data_dir: &std::path::Path) {
    for engine in registry.engines() {
        let _span = tracing_spans::persist_span(engine.event_id().as_str(), "save").entered();
        let result = JsonFilePersistence::open(data_dir, engine.event_id())
            .map_err(NodeError::from)
            .and_then(|p| engine.persist_to(&p).map_err(NodeError::from));
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to persist tallies");
        }
    }
}
