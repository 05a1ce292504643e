pub mod format;
pub mod gate;
pub mod sink;
pub mod status;
pub mod types;
pub mod watcher;

use std::time::Duration;

pub use gate::NotificationGate;
pub use sink::DurableSink;
pub use status::StatusQueryService;
pub use watcher::EventWatcher;

/// Upper bound for any single backend call (runtime, store, cache, chat).
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);
