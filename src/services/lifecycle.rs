//! Bucket lifecycle: Active <-> MarkedForDeletion.
//!
//! The status is advisory. It reflects whether a bucket currently holds
//! objects and is reported in listings; nothing reads it as a gate.

use crate::{
    models::{self, bucket::BucketStatus},
    services::{registry::BucketRegistry, table::TableResult},
};
use tracing::debug;

/// An object-registry change that may move a bucket's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ObjectWritten,
    ObjectRemoved { remaining: usize },
}

/// Pure transition function.
pub fn next_status(current: BucketStatus, event: LifecycleEvent) -> BucketStatus {
    match event {
        LifecycleEvent::ObjectWritten => BucketStatus::Active,
        LifecycleEvent::ObjectRemoved { remaining: 0 } => BucketStatus::MarkedForDeletion,
        LifecycleEvent::ObjectRemoved { .. } => current,
    }
}

/// Applies lifecycle events to the bucket registry.
///
/// Callers hold the bucket's object-registry lock; this takes the
/// bucket-registry lock second.
#[derive(Clone, Debug)]
pub struct LifecycleController {
    registry: BucketRegistry,
}

impl LifecycleController {
    pub fn new(registry: BucketRegistry) -> Self {
        Self { registry }
    }

    /// Record `event` for `bucket`, stamping its modification time.
    /// Returns the resulting status, or `None` if the bucket has no row.
    pub async fn apply(
        &self,
        bucket: &str,
        event: LifecycleEvent,
    ) -> TableResult<Option<BucketStatus>> {
        let mut writer = self.registry.write().await;
        let Some(current) = writer.get(bucket).await? else {
            return Ok(None);
        };
        let next = next_status(current.status, event);
        if next != current.status {
            debug!("bucket {} status {} -> {}", bucket, current.status, next);
        }
        writer.mark_status(bucket, next, models::now()).await?;
        Ok(Some(next))
    }
}
