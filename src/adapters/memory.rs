//! In-process implementations of the storage and coordinator ports. Good
//! enough for single-instance deployments and the backbone of the test
//! suite; distributed setups swap in their own backends.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::domain::error::BoxError;
use crate::domain::types::{Job, SegmentData, SegmentStatus, StreamKind};
use crate::ports::coordinator::Coordinator;
use crate::ports::storage::Storage;

/// Blob store backed by hash maps. Concurrency-safe at the per-key level.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<StorageInner>,
}

#[derive(Default)]
struct StorageInner {
    metadata: HashMap<String, Vec<u8>>,
    segments: HashMap<SegmentData, Vec<u8>>,
    sprites: HashMap<(String, usize), Vec<u8>>,
    sprite_vtts: HashMap<String, Vec<u8>>,
    subtitle_vtts: HashMap<(String, String), Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(what: &str, key: impl std::fmt::Display) -> BoxError {
    format!("{what} not found: {key}").into()
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn metadata_exists(&self, source_url: &str) -> Result<bool, BoxError> {
        Ok(self.inner.lock().unwrap().metadata.contains_key(source_url))
    }

    async fn read_metadata(&self, source_url: &str) -> Result<Vec<u8>, BoxError> {
        self.inner
            .lock()
            .unwrap()
            .metadata
            .get(source_url)
            .cloned()
            .ok_or_else(|| missing("metadata", source_url))
    }

    async fn write_metadata(&self, source_url: &str, data: &[u8]) -> Result<(), BoxError> {
        self.inner
            .lock()
            .unwrap()
            .metadata
            .insert(source_url.to_owned(), data.to_vec());
        Ok(())
    }

    async fn segment_exists(&self, info: &SegmentData) -> Result<bool, BoxError> {
        Ok(self.inner.lock().unwrap().segments.contains_key(info))
    }

    async fn read_segment(&self, info: &SegmentData) -> Result<Vec<u8>, BoxError> {
        self.inner
            .lock()
            .unwrap()
            .segments
            .get(info)
            .cloned()
            .ok_or_else(|| missing("segment", info.index))
    }

    async fn write_segment(&self, info: &SegmentData, data: &[u8]) -> Result<(), BoxError> {
        self.inner
            .lock()
            .unwrap()
            .segments
            .insert(info.clone(), data.to_vec());
        Ok(())
    }

    async fn sprite_exists(&self, source_url: &str, index: usize) -> Result<bool, BoxError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sprites
            .contains_key(&(source_url.to_owned(), index)))
    }

    async fn read_sprite(&self, source_url: &str, index: usize) -> Result<Vec<u8>, BoxError> {
        self.inner
            .lock()
            .unwrap()
            .sprites
            .get(&(source_url.to_owned(), index))
            .cloned()
            .ok_or_else(|| missing("sprite", index))
    }

    async fn write_sprite(
        &self,
        source_url: &str,
        index: usize,
        data: &[u8],
    ) -> Result<(), BoxError> {
        self.inner
            .lock()
            .unwrap()
            .sprites
            .insert((source_url.to_owned(), index), data.to_vec());
        Ok(())
    }

    async fn sprite_vtt_exists(&self, source_url: &str) -> Result<bool, BoxError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sprite_vtts
            .contains_key(source_url))
    }

    async fn read_sprite_vtt(&self, source_url: &str) -> Result<Vec<u8>, BoxError> {
        self.inner
            .lock()
            .unwrap()
            .sprite_vtts
            .get(source_url)
            .cloned()
            .ok_or_else(|| missing("sprite vtt", source_url))
    }

    async fn write_sprite_vtt(&self, source_url: &str, data: &[u8]) -> Result<(), BoxError> {
        self.inner
            .lock()
            .unwrap()
            .sprite_vtts
            .insert(source_url.to_owned(), data.to_vec());
        Ok(())
    }

    async fn subtitle_vtt_exists(&self, source_url: &str, lang: &str) -> Result<bool, BoxError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .subtitle_vtts
            .contains_key(&(source_url.to_owned(), lang.to_owned())))
    }

    async fn read_subtitle_vtt(&self, source_url: &str, lang: &str) -> Result<Vec<u8>, BoxError> {
        self.inner
            .lock()
            .unwrap()
            .subtitle_vtts
            .get(&(source_url.to_owned(), lang.to_owned()))
            .cloned()
            .ok_or_else(|| missing("subtitle vtt", lang))
    }

    async fn write_subtitle_vtt(
        &self,
        source_url: &str,
        lang: &str,
        data: &[u8],
    ) -> Result<(), BoxError> {
        self.inner
            .lock()
            .unwrap()
            .subtitle_vtts
            .insert((source_url.to_owned(), lang.to_owned()), data.to_vec());
        Ok(())
    }
}

/// In-process coordinator: per-kind job queues plus per-key waiter lists.
///
/// Waiter registration happens synchronously under the internal lock, so a
/// waiter registered before a job is enqueued can never miss that job's
/// notifications. Notifications with no registered waiter are dropped.
#[derive(Default)]
pub struct MemoryCoordinator {
    inner: Mutex<CoordinatorInner>,
}

#[derive(Default)]
struct CoordinatorInner {
    queues: HashMap<StreamKind, QueueState>,
    waiters: HashMap<SegmentData, Vec<UnboundedSender<SegmentStatus>>>,
    closed: bool,
}

#[derive(Default)]
struct QueueState {
    subscriber: Option<UnboundedSender<Job>>,
    pending: VecDeque<Job>,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn enqueue(&self, job: Job) -> Result<(), BoxError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err("coordinator closed".into());
        }

        let queue = inner.queues.entry(job.kind).or_default();
        match &queue.subscriber {
            Some(tx) if tx.send(job.clone()).is_ok() => {}
            _ => queue.pending.push_back(job),
        }

        Ok(())
    }

    async fn subscribe(&self, kind: StreamKind) -> Result<UnboundedReceiver<Job>, BoxError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err("coordinator closed".into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let queue = inner.queues.entry(kind).or_default();
        while let Some(job) = queue.pending.pop_front() {
            let _ = tx.send(job);
        }
        queue.subscriber = Some(tx);

        Ok(rx)
    }

    async fn ack(&self, _job_id: &str) -> Result<(), BoxError> {
        // In-process delivery is direct; there is nothing to redeliver.
        Ok(())
    }

    async fn notify_segment(
        &self,
        info: &SegmentData,
        status: SegmentStatus,
    ) -> Result<(), BoxError> {
        let waiters = {
            let mut inner = self.inner.lock().unwrap();
            inner.waiters.remove(info).unwrap_or_default()
        };

        for waiter in waiters {
            let _ = waiter.send(status.clone());
        }

        Ok(())
    }

    async fn wait_segment(
        &self,
        info: &SegmentData,
    ) -> Result<UnboundedReceiver<SegmentStatus>, BoxError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err("coordinator closed".into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.waiters.entry(info.clone()).or_default().push(tx);

        Ok(rx)
    }

    fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.queues.clear();
        inner.waiters.clear();
    }
}
