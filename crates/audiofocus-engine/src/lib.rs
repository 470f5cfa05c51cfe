//! Audio interrupt and focus arbitration engine.
//!
//! This crate ties the stream registry, policy table, arbiter and
//! notification dispatcher into a [`FocusService`], and serves it over
//! channels through the [`Engine`] command loop.

mod arbiter;
mod config;
mod context;
mod dispatcher;
mod error;
mod metrics;
mod orchestrator;
mod registry;
mod service;
mod volume;

pub use arbiter::{ArbiterOptions, InterruptArbiter};
pub use config::{ConfigError, EngineConfig, VolumeConfig, DEFAULT_DUCK_FACTOR};
pub use context::DeviceSceneContext;
pub use dispatcher::{NotificationDispatcher, Subscription, SubscriptionId};
pub use error::{FocusError, FocusResult};
pub use metrics::MetricsCollector;
pub use orchestrator::Engine;
pub use registry::StreamRegistry;
pub use service::FocusService;
pub use volume::VolumeManager;

use std::time::Duration;

use audiofocus_ipc::{EngineCommand, EngineEvent};
use crossbeam_channel::{Receiver, Sender};

/// Create an engine instance with IPC channels.
pub fn create_engine(
    config: &EngineConfig,
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
) -> FocusResult<Engine> {
    let service = FocusService::new(config)?;
    let interval = config.metrics_interval_ms.map(Duration::from_millis);
    Ok(Engine::new(service, command_rx, event_tx).with_metrics_interval(interval))
}
