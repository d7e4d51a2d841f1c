//! Storage Usage Notifier
//!
//! The queue is created once at startup with [`storage_usage_queue`]. The
//! notifier half is cloned into every component that reports usage changes;
//! the receiver half is handed to a single [`StorageUsageConsumer`].

use crate::domain::ports::{StorageUsageTrigger, StorageUsageTriggerRef};
use crate::error::Result;
use crate::metrics::OperatorMetrics;
use crate::usage::StorageUsageEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default queue capacity
pub const DEFAULT_USAGE_QUEUE_CAPACITY: usize = 1024;

/// Create the storage usage queue
pub fn storage_usage_queue(capacity: usize) -> (StorageUsageNotifier, StorageUsageReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        StorageUsageNotifier { sender },
        StorageUsageReceiver { receiver },
    )
}

// =============================================================================
// Notifier
// =============================================================================

/// Producer half of the storage usage queue
#[derive(Debug, Clone)]
pub struct StorageUsageNotifier {
    sender: mpsc::Sender<StorageUsageEvent>,
}

impl StorageUsageNotifier {
    /// Report a usage change for `storage_class_name` in `namespace`.
    ///
    /// Does nothing when either argument is empty. Waits for queue space
    /// when the queue is full; if `cancel` fires first the event is dropped.
    pub async fn notify(&self, cancel: &CancellationToken, namespace: &str, storage_class_name: &str) {
        if namespace.is_empty() || storage_class_name.is_empty() {
            debug!(
                namespace,
                storage_class_name, "Skipping storage usage notification"
            );
            return;
        }

        let event = StorageUsageEvent::new(namespace, storage_class_name);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%event, "Storage usage notification cancelled");
            }
            sent = self.sender.send(event.clone()) => {
                if let Err(mpsc::error::SendError(event)) = sent {
                    warn!(%event, "Storage usage queue is closed, dropping event");
                }
            }
        }
    }

    /// True once the consumer has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// =============================================================================
// Receiver
// =============================================================================

/// Consumer half of the storage usage queue
#[derive(Debug)]
pub struct StorageUsageReceiver {
    receiver: mpsc::Receiver<StorageUsageEvent>,
}

impl StorageUsageReceiver {
    /// Wait for the next event; `None` once every notifier is dropped
    pub async fn recv(&mut self) -> Option<StorageUsageEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is queued
    pub fn try_recv(&mut self) -> Option<StorageUsageEvent> {
        self.receiver.try_recv().ok()
    }
}

// =============================================================================
// Consumer
// =============================================================================

/// Drains the storage usage queue into a trigger
pub struct StorageUsageConsumer {
    receiver: StorageUsageReceiver,
    trigger: StorageUsageTriggerRef,
    metrics: Option<Arc<OperatorMetrics>>,
}

impl StorageUsageConsumer {
    pub fn new(receiver: StorageUsageReceiver, trigger: StorageUsageTriggerRef) -> Self {
        Self {
            receiver,
            trigger,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<OperatorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run until the queue closes or `cancel` fires. Returns the number of
    /// events the trigger accepted.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        let mut delivered = 0;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = self.receiver.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let key = event.key();
            match self.trigger.trigger(event).await {
                Ok(()) => {
                    delivered += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_usage_event(true);
                    }
                }
                Err(e) => {
                    warn!(event = %key, error = %e, "Storage usage trigger failed");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_usage_event(false);
                    }
                }
            }
        }

        info!("Storage usage consumer stopped after {} events", delivered);
        delivered
    }
}

// =============================================================================
// Logging Trigger
// =============================================================================

/// Trigger that only logs each event
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTrigger;

#[async_trait]
impl StorageUsageTrigger for LoggingTrigger {
    async fn trigger(&self, event: StorageUsageEvent) -> Result<()> {
        info!(
            namespace = %event.namespace,
            storage_class = %event.name,
            "Storage usage changed"
        );
        Ok(())
    }
}
