//! Storage facade that turns every successful segment write into a
//! readiness notification. All other operations delegate verbatim, so the
//! facade can stand anywhere a [`Storage`] is expected.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::error::BoxError;
use crate::domain::types::{SegmentData, SegmentStatus};
use crate::ports::coordinator::Coordinator;
use crate::ports::storage::Storage;

pub struct NotifyingStore {
    storage: Arc<dyn Storage>,
    coordinator: Arc<dyn Coordinator>,
}

impl NotifyingStore {
    pub fn new(storage: Arc<dyn Storage>, coordinator: Arc<dyn Coordinator>) -> Self {
        Self {
            storage,
            coordinator,
        }
    }
}

#[async_trait]
impl Storage for NotifyingStore {
    async fn metadata_exists(&self, source_url: &str) -> Result<bool, BoxError> {
        self.storage.metadata_exists(source_url).await
    }

    async fn read_metadata(&self, source_url: &str) -> Result<Vec<u8>, BoxError> {
        self.storage.read_metadata(source_url).await
    }

    async fn write_metadata(&self, source_url: &str, data: &[u8]) -> Result<(), BoxError> {
        self.storage.write_metadata(source_url, data).await
    }

    async fn segment_exists(&self, info: &SegmentData) -> Result<bool, BoxError> {
        self.storage.segment_exists(info).await
    }

    async fn read_segment(&self, info: &SegmentData) -> Result<Vec<u8>, BoxError> {
        self.storage.read_segment(info).await
    }

    /// Write the segment, then wake every waiter. The ready notification is
    /// published only after the bytes are readable from the underlying
    /// store; a failed write publishes an error status instead.
    async fn write_segment(&self, info: &SegmentData, data: &[u8]) -> Result<(), BoxError> {
        if let Err(err) = self.storage.write_segment(info, data).await {
            let status = SegmentStatus::error(err.to_string());
            if let Err(notify_err) = self.coordinator.notify_segment(info, status).await {
                warn!(
                    index = info.index,
                    error = %notify_err,
                    "failed to publish segment write failure"
                );
            }
            return Err(err);
        }

        self.coordinator
            .notify_segment(info, SegmentStatus::ready())
            .await?;

        Ok(())
    }

    async fn sprite_exists(&self, source_url: &str, index: usize) -> Result<bool, BoxError> {
        self.storage.sprite_exists(source_url, index).await
    }

    async fn read_sprite(&self, source_url: &str, index: usize) -> Result<Vec<u8>, BoxError> {
        self.storage.read_sprite(source_url, index).await
    }

    async fn write_sprite(
        &self,
        source_url: &str,
        index: usize,
        data: &[u8],
    ) -> Result<(), BoxError> {
        self.storage.write_sprite(source_url, index, data).await
    }

    async fn sprite_vtt_exists(&self, source_url: &str) -> Result<bool, BoxError> {
        self.storage.sprite_vtt_exists(source_url).await
    }

    async fn read_sprite_vtt(&self, source_url: &str) -> Result<Vec<u8>, BoxError> {
        self.storage.read_sprite_vtt(source_url).await
    }

    async fn write_sprite_vtt(&self, source_url: &str, data: &[u8]) -> Result<(), BoxError> {
        self.storage.write_sprite_vtt(source_url, data).await
    }

    async fn subtitle_vtt_exists(&self, source_url: &str, lang: &str) -> Result<bool, BoxError> {
        self.storage.subtitle_vtt_exists(source_url, lang).await
    }

    async fn read_subtitle_vtt(&self, source_url: &str, lang: &str) -> Result<Vec<u8>, BoxError> {
        self.storage.read_subtitle_vtt(source_url, lang).await
    }

    async fn write_subtitle_vtt(
        &self,
        source_url: &str,
        lang: &str,
        data: &[u8],
    ) -> Result<(), BoxError> {
        self.storage
            .write_subtitle_vtt(source_url, lang, data)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryCoordinator, MemoryStorage};
    use crate::domain::types::{SegmentState, StreamKind};

    fn segment_info(index: usize) -> SegmentData {
        SegmentData {
            source_url: "file:///media.mkv".to_owned(),
            rendition: "1080p".to_owned(),
            kind: StreamKind::Video,
            index,
        }
    }

    struct FailingStorage;

    #[async_trait]
    impl Storage for FailingStorage {
        async fn metadata_exists(&self, _: &str) -> Result<bool, BoxError> {
            Ok(false)
        }
        async fn read_metadata(&self, _: &str) -> Result<Vec<u8>, BoxError> {
            Err("no metadata".into())
        }
        async fn write_metadata(&self, _: &str, _: &[u8]) -> Result<(), BoxError> {
            Ok(())
        }
        async fn segment_exists(&self, _: &SegmentData) -> Result<bool, BoxError> {
            Ok(false)
        }
        async fn read_segment(&self, _: &SegmentData) -> Result<Vec<u8>, BoxError> {
            Err("no segment".into())
        }
        async fn write_segment(&self, _: &SegmentData, _: &[u8]) -> Result<(), BoxError> {
            Err("disk full".into())
        }
        async fn sprite_exists(&self, _: &str, _: usize) -> Result<bool, BoxError> {
            Ok(false)
        }
        async fn read_sprite(&self, _: &str, _: usize) -> Result<Vec<u8>, BoxError> {
            Err("no sprite".into())
        }
        async fn write_sprite(&self, _: &str, _: usize, _: &[u8]) -> Result<(), BoxError> {
            Ok(())
        }
        async fn sprite_vtt_exists(&self, _: &str) -> Result<bool, BoxError> {
            Ok(false)
        }
        async fn read_sprite_vtt(&self, _: &str) -> Result<Vec<u8>, BoxError> {
            Err("no vtt".into())
        }
        async fn write_sprite_vtt(&self, _: &str, _: &[u8]) -> Result<(), BoxError> {
            Ok(())
        }
        async fn subtitle_vtt_exists(&self, _: &str, _: &str) -> Result<bool, BoxError> {
            Ok(false)
        }
        async fn read_subtitle_vtt(&self, _: &str, _: &str) -> Result<Vec<u8>, BoxError> {
            Err("no vtt".into())
        }
        async fn write_subtitle_vtt(&self, _: &str, _: &str, _: &[u8]) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn successful_write_publishes_ready_after_bytes_are_readable() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        let store = NotifyingStore::new(storage.clone(), coordinator.clone());

        let info = segment_info(1);
        let mut waiter = coordinator.wait_segment(&info).await.expect("register");

        store
            .write_segment(&info, b"payload")
            .await
            .expect("write succeeds");

        let status = waiter.recv().await.expect("status delivered");
        assert_eq!(status.state, SegmentState::Ready);

        let data = storage.read_segment(&info).await.expect("readable");
        assert_eq!(data, b"payload");
    }

    #[tokio::test]
    async fn failed_write_publishes_error_and_returns_it() {
        let coordinator = Arc::new(MemoryCoordinator::new());
        let store = NotifyingStore::new(Arc::new(FailingStorage), coordinator.clone());

        let info = segment_info(2);
        let mut waiter = coordinator.wait_segment(&info).await.expect("register");

        let err = store
            .write_segment(&info, b"payload")
            .await
            .expect_err("write fails");
        assert!(err.to_string().contains("disk full"));

        let status = waiter.recv().await.expect("status delivered");
        assert_eq!(status.state, SegmentState::Error);
        assert!(status.error.contains("disk full"));
    }

    #[tokio::test]
    async fn other_operations_delegate_verbatim() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        let store = NotifyingStore::new(storage.clone(), coordinator);

        store
            .write_metadata("file:///media.mkv", b"{}")
            .await
            .expect("write metadata");
        assert!(store
            .metadata_exists("file:///media.mkv")
            .await
            .expect("exists"));
        assert_eq!(
            store
                .read_metadata("file:///media.mkv")
                .await
                .expect("read"),
            b"{}"
        );
    }
}
