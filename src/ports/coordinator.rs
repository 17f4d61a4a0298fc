use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::domain::error::BoxError;
use crate::domain::types::{Job, SegmentData, SegmentStatus, StreamKind};

/// Job queues plus segment readiness notifications.
///
/// Notification delivery is at-least-once: duplicates must be idempotent to
/// consumers, which simply re-read storage. A waiter registered via
/// [`Coordinator::wait_segment`] before the matching job is enqueued must not
/// miss the notification; implementations either register synchronously or
/// buffer one pending status per key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), BoxError>;

    /// Subscribe to the job stream for one stream kind. Jobs enqueued before
    /// any subscriber exists are delivered once a subscription is made.
    async fn subscribe(&self, kind: StreamKind) -> Result<UnboundedReceiver<Job>, BoxError>;

    async fn ack(&self, job_id: &str) -> Result<(), BoxError>;

    async fn notify_segment(
        &self,
        info: &SegmentData,
        status: SegmentStatus,
    ) -> Result<(), BoxError>;

    /// Register interest in a segment. The returned stream yields at least
    /// one status once the segment is produced or fails.
    async fn wait_segment(
        &self,
        info: &SegmentData,
    ) -> Result<UnboundedReceiver<SegmentStatus>, BoxError>;

    /// Release all queues and waiter registrations.
    fn close(&self);
}
