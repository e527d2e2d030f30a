//! Scheduled refresh engine
//!
//! The SyncEngine is the scheduled trigger of the system. It is responsible for:
//! - Ticking on a fixed interval
//! - Running one refresh cycle per tick through the [`RefreshCoordinator`]
//! - Emitting events for monitoring and for follow-up work (hosts file output)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Interval   │─── tick ───┐
//! └─────────────┘            │
//!                            ▼
//!                   ┌──────────────┐
//!                   │  SyncEngine  │──── SyncEvent ────▶ receiver
//!                   └──────────────┘
//!                            │
//!                            ▼
//!                ┌───────────────────────┐
//!                │  RefreshCoordinator   │
//!                │ (resolve + merge)     │
//!                └───────────────────────┘
//! ```
//!
//! A failed cycle is logged and reported as an event; the next tick simply
//! tries again. Ticks missed while a cycle was running are not replayed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{info, warn};

use crate::config::ScheduleConfig;
use crate::coordinator::{RefreshCoordinator, UpdateOutcome};
use crate::error::Result;

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Engine started
    Started {
        domains_count: usize,
        interval_secs: u64,
    },

    /// A refresh cycle started
    RefreshStarted { cycle: u64 },

    /// A refresh cycle persisted its results
    RefreshCompleted { cycle: u64, outcome: UpdateOutcome },

    /// A refresh cycle could not persist its results
    RefreshFailed { cycle: u64, reason: String },

    /// Engine stopped
    Stopped { reason: String },
}

/// Scheduled refresh engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Start with [`SyncEngine::run()`]
/// 3. Engine runs until a shutdown signal is received
///
/// ## Load Resistance
///
/// Events go through a bounded channel. When it is full, new events are
/// dropped with a warning instead of blocking the refresh loop.
pub struct SyncEngine {
    coordinator: Arc<RefreshCoordinator>,
    interval: Duration,
    run_on_start: bool,
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        config: &ScheduleConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            coordinator,
            interval: config.interval(),
            run_on_start: config.run_on_start,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine until ctrl-c
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run the engine until `shutdown_rx` fires, or ctrl-c when `None`
    ///
    /// A shutdown requested while a cycle is running takes effect once that
    /// cycle has finished.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(SyncEvent::Started {
            domains_count: self.coordinator.domains().len(),
            interval_secs: self.interval.as_secs(),
        });
        info!(
            "Sync engine started: {} domain(s), refresh every {:?}",
            self.coordinator.domains().len(),
            self.interval
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.run_on_start {
            // First tick completes immediately
            interval.tick().await;
        }
        let mut ticks = IntervalStream::new(interval);

        let shutdown = async {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Failed to listen for ctrl-c: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let mut cycle = 0u64;
        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    cycle += 1;
                    self.refresh(cycle).await;
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(SyncEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        info!("Sync engine stopped after {} cycle(s)", cycle);
        Ok(())
    }

    /// Run one refresh cycle and report it
    async fn refresh(&self, cycle: u64) {
        self.emit_event(SyncEvent::RefreshStarted { cycle });

        match self.coordinator.run_scheduled_refresh().await {
            UpdateOutcome::Failed { reason } => {
                self.emit_event(SyncEvent::RefreshFailed { cycle, reason });
            }
            outcome => {
                self.emit_event(SyncEvent::RefreshCompleted { cycle, outcome });
            }
        }
    }

    fn emit_event(&self, event: SyncEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
