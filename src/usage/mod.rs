//! Storage Usage Module
//!
//! A process-wide bounded queue of storage-usage change events. Producers
//! hold a [`StorageUsageNotifier`]; a single consumer drains the queue into a
//! [`StorageUsageTrigger`](crate::domain::ports::StorageUsageTrigger).

pub mod events;
pub mod notifier;

pub use events::*;
pub use notifier::*;
