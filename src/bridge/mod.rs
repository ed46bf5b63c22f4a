//! Bridge module - Mirrors a Bravia television into the state store
//!
//! The Bridge is the orchestrator that manages:
//! - The periodic status cycle (probe, power status, connection flag)
//! - Volume/input refreshes while the television is on
//! - User writes under the namespace (remote commands and manual triggers)
//! - Last-writer-wins merging of overlapping cycles

mod dispatcher;
mod names;
mod poller;
mod refresher;
mod status;

pub use dispatcher::{classify, Dispatch};
pub use names::*;
pub use refresher::{normalize_volume, plan_volume_updates};
pub use status::{ConnectionBook, PowerStatus, PowerTransition, POWER_ACTIVE};


use crate::config::AppConfig;
use crate::device::BraviaDevice;
use crate::probe::Reachability;
use crate::state::StateActorHandle;
use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// One-shot request for an immediate cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Run a status cycle now
    Status,
    /// Run a volume/input refresh now (still requires power "active")
    Volume,
}

/// Bravia to state store bridge
///
/// Cheap to clone: every clone shares the same bookkeeping and channels, so
/// each cycle can run as its own task.
#[derive(Clone)]
pub struct Bridge {
    /// Address handed to the reachability probe
    pub(crate) host: String,
    pub(crate) names: names::Namespace,
    /// `None` when no device client could be built; every cycle then reports "errorping"
    pub(crate) device: Option<Arc<dyn BraviaDevice>>,
    pub(crate) prober: Arc<dyn Reachability>,
    pub(crate) store: StateActorHandle,
    pub(crate) book: Arc<ConnectionBook>,
    pub(crate) trigger_tx: mpsc::UnboundedSender<Trigger>,
    /// Receiver for manual triggers (taken once by `run`)
    pub(crate) trigger_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Trigger>>>>,
}

impl Bridge {
    pub fn new(
        namespace: &str,
        host: impl Into<String>,
        device: Option<Arc<dyn BraviaDevice>>,
        prober: Arc<dyn Reachability>,
        store: StateActorHandle,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        Self {
            host: host.into(),
            names: names::Namespace::new(namespace),
            device,
            prober,
            store,
            book: Arc::new(ConnectionBook::new()),
            trigger_tx,
            trigger_rx: Arc::new(Mutex::new(Some(trigger_rx))),
        }
    }

    /// Create from config with the given collaborators
    pub fn from_config(
        config: &AppConfig,
        device: Option<Arc<dyn BraviaDevice>>,
        prober: Arc<dyn Reachability>,
        store: StateActorHandle,
    ) -> Self {
        Self::new(&config.namespace, config.device.ip.clone(), device, prober, store)
    }

    pub fn namespace(&self) -> &str {
        self.names.as_str()
    }

    /// Last known power status
    pub fn power_status(&self) -> PowerStatus {
        self.book.power()
    }

    /// Queue an immediate cycle
    pub fn trigger(&self, trigger: Trigger) {
        if self.trigger_tx.send(trigger).is_err() {
            debug!(?trigger, "Trigger dropped, bridge loop not running");
        }
    }

    /// Take the trigger receiver (can only be called once)
    fn take_trigger_receiver(&self) -> Option<mpsc::UnboundedReceiver<Trigger>> {
        self.trigger_rx.lock().take()
    }

    /// Seed the declared states without overwriting existing values
    pub async fn init_states(&self) -> Result<usize> {
        let defaults = vec![
            (self.names.id(INFO_CONNECTION), Value::Bool(false)),
            (self.names.id(INFO_TRIGGER_STATUS), Value::Bool(false)),
            (self.names.id(INFO_TRIGGER_VOLUME), Value::Bool(false)),
        ];
        self.store.ensure_defaults(defaults).await
    }

    /// Acknowledged write of a relative state name, awaiting the store's confirmation
    pub(crate) async fn publish(&self, name: &str, val: Value) -> Result<()> {
        self.store.set_state_confirmed(self.names.id(name), val, true).await
    }

    /// Run the bridge until `shutdown` resolves
    ///
    /// Starts one status cycle immediately, then one per `interval` tick.
    /// `None` disables the timer; cycles then only run on manual triggers.
    pub async fn run<F>(self, interval: Option<Duration>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Some(mut triggers) = self.take_trigger_receiver() else {
            anyhow::bail!("bridge is already running");
        };
        let mut changes = self.store.subscribe();

        let mut ticker = interval.and_then(|period| {
            let Some(start) = Instant::now().checked_add(period) else {
                warn!(?period, "Refresh interval out of range, periodic refresh disabled");
                return None;
            };
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        });

        info!(
            namespace = %self.names.as_str(),
            host = %self.host,
            interval = ?interval,
            "Bridge started"
        );

        self.spawn_status_cycle();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = next_tick(&mut ticker) => {
                    self.spawn_status_cycle();
                }
                Some(trigger) = triggers.recv() => {
                    match trigger {
                        Trigger::Status => self.spawn_status_cycle(),
                        Trigger::Volume => self.spawn_volume_cycle(),
                    }
                }
                change = changes.recv() => match change {
                    Ok(change) => self.on_state_change(change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "State change feed lagged, writes were missed");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("State store closed, stopping bridge");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!("Bridge shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    fn spawn_status_cycle(&self) {
        let bridge = self.clone();
        tokio::spawn(async move { bridge.check_status().await });
    }

    fn spawn_volume_cycle(&self) {
        let bridge = self.clone();
        tokio::spawn(async move {
            bridge.refresh_volume().await;
            bridge.reset_trigger_flag(INFO_TRIGGER_VOLUME).await;
        });
    }
}

/// Next timer tick, or never when the timer is disabled
async fn next_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
