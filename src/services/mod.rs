pub mod engine;
pub mod network;
pub mod scheduler;
pub mod status;

pub use engine::{EngineConfig, PushMode, SkipReason, SyncEngine, SyncOutcome, SyncStats};
pub use network::NetworkMonitor;
pub use scheduler::{SchedulerConfig, SyncScheduler, SyncTrigger, TriggerKind};
pub use status::{StatusView, SyncIndicator};
