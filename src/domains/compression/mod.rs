// Declare submodules for the compression domain
pub mod background;
pub mod coordinator;
pub mod types;

pub use background::{BackgroundTaskBudget, BackgroundTaskHost, BackgroundTaskId, ExpiryHandler};
pub use coordinator::{
    BudgetPhase, CacheUpdate, CompressionResourceCoordinator, CoordinatorEvent, CoordinatorSnapshot, LifecycleEvent,
};
pub use types::{
    ComprehensiveStatus, CompressionConfig, CompressionMethod, CompressionPriority, CompressionQueueStatus,
    CompressionResult, CompressionStats, DocumentCompressionHistory, QueueOutcome, WorkerThrottleStatus,
};
