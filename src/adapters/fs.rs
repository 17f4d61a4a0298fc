//! Filesystem-backed storage. Every source gets a directory named by the
//! hex encoding of its URL, with blobs laid out per resource kind beneath
//! it. Suited to single-host deployments where segments live on local disk.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::error::BoxError;
use crate::domain::types::SegmentData;
use crate::ports::storage::Storage;

pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn source_dir(&self, source_url: &str) -> PathBuf {
        self.root.join(hex_key(source_url))
    }

    fn metadata_path(&self, source_url: &str) -> PathBuf {
        self.source_dir(source_url).join("metadata.json")
    }

    fn segment_path(&self, info: &SegmentData) -> PathBuf {
        self.source_dir(&info.source_url)
            .join("segments")
            .join(info.kind.to_string())
            .join(&info.rendition)
            .join(format!("segment-{:05}.ts", info.index))
    }

    fn sprite_path(&self, source_url: &str, index: usize) -> PathBuf {
        self.source_dir(source_url)
            .join("sprites")
            .join(format!("sprite-{index}.jpg"))
    }

    fn sprite_vtt_path(&self, source_url: &str) -> PathBuf {
        self.source_dir(source_url).join("sprites.vtt")
    }

    fn subtitle_path(&self, source_url: &str, lang: &str) -> PathBuf {
        self.source_dir(source_url)
            .join("subtitles")
            .join(format!("{lang}.vtt"))
    }
}

fn hex_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() * 2);
    for byte in raw.bytes() {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

async fn exists(path: &Path) -> Result<bool, BoxError> {
    Ok(tokio::fs::try_exists(path).await?)
}

async fn read(path: &Path) -> Result<Vec<u8>, BoxError> {
    Ok(tokio::fs::read(path).await?)
}

async fn write(path: &Path, data: &[u8]) -> Result<(), BoxError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await?;
    Ok(())
}

#[async_trait]
impl Storage for FsStorage {
    async fn metadata_exists(&self, source_url: &str) -> Result<bool, BoxError> {
        exists(&self.metadata_path(source_url)).await
    }

    async fn read_metadata(&self, source_url: &str) -> Result<Vec<u8>, BoxError> {
        read(&self.metadata_path(source_url)).await
    }

    async fn write_metadata(&self, source_url: &str, data: &[u8]) -> Result<(), BoxError> {
        write(&self.metadata_path(source_url), data).await
    }

    async fn segment_exists(&self, info: &SegmentData) -> Result<bool, BoxError> {
        exists(&self.segment_path(info)).await
    }

    async fn read_segment(&self, info: &SegmentData) -> Result<Vec<u8>, BoxError> {
        read(&self.segment_path(info)).await
    }

    async fn write_segment(&self, info: &SegmentData, data: &[u8]) -> Result<(), BoxError> {
        write(&self.segment_path(info), data).await
    }

    async fn sprite_exists(&self, source_url: &str, index: usize) -> Result<bool, BoxError> {
        exists(&self.sprite_path(source_url, index)).await
    }

    async fn read_sprite(&self, source_url: &str, index: usize) -> Result<Vec<u8>, BoxError> {
        read(&self.sprite_path(source_url, index)).await
    }

    async fn write_sprite(
        &self,
        source_url: &str,
        index: usize,
        data: &[u8],
    ) -> Result<(), BoxError> {
        write(&self.sprite_path(source_url, index), data).await
    }

    async fn sprite_vtt_exists(&self, source_url: &str) -> Result<bool, BoxError> {
        exists(&self.sprite_vtt_path(source_url)).await
    }

    async fn read_sprite_vtt(&self, source_url: &str) -> Result<Vec<u8>, BoxError> {
        read(&self.sprite_vtt_path(source_url)).await
    }

    async fn write_sprite_vtt(&self, source_url: &str, data: &[u8]) -> Result<(), BoxError> {
        write(&self.sprite_vtt_path(source_url), data).await
    }

    async fn subtitle_vtt_exists(&self, source_url: &str, lang: &str) -> Result<bool, BoxError> {
        exists(&self.subtitle_path(source_url, lang)).await
    }

    async fn read_subtitle_vtt(&self, source_url: &str, lang: &str) -> Result<Vec<u8>, BoxError> {
        read(&self.subtitle_path(source_url, lang)).await
    }

    async fn write_subtitle_vtt(
        &self,
        source_url: &str,
        lang: &str,
        data: &[u8],
    ) -> Result<(), BoxError> {
        write(&self.subtitle_path(source_url, lang), data).await
    }
}
