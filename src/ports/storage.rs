use async_trait::async_trait;

use crate::domain::error::BoxError;
use crate::domain::types::SegmentData;

/// Keyed byte-blob persistence for everything the pipeline produces:
/// metadata per source URL, segments per [`SegmentData`], sprite sheets,
/// sprite WebVTT, and subtitle WebVTT.
///
/// Implementations must be safe for concurrent access at the per-key level.
/// Metadata is effectively write-once; writer-wins is acceptable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    async fn metadata_exists(&self, source_url: &str) -> Result<bool, BoxError>;
    async fn read_metadata(&self, source_url: &str) -> Result<Vec<u8>, BoxError>;
    async fn write_metadata(&self, source_url: &str, data: &[u8]) -> Result<(), BoxError>;

    async fn segment_exists(&self, info: &SegmentData) -> Result<bool, BoxError>;
    async fn read_segment(&self, info: &SegmentData) -> Result<Vec<u8>, BoxError>;
    async fn write_segment(&self, info: &SegmentData, data: &[u8]) -> Result<(), BoxError>;

    async fn sprite_exists(&self, source_url: &str, index: usize) -> Result<bool, BoxError>;
    async fn read_sprite(&self, source_url: &str, index: usize) -> Result<Vec<u8>, BoxError>;
    async fn write_sprite(&self, source_url: &str, index: usize, data: &[u8])
        -> Result<(), BoxError>;

    async fn sprite_vtt_exists(&self, source_url: &str) -> Result<bool, BoxError>;
    async fn read_sprite_vtt(&self, source_url: &str) -> Result<Vec<u8>, BoxError>;
    async fn write_sprite_vtt(&self, source_url: &str, data: &[u8]) -> Result<(), BoxError>;

    async fn subtitle_vtt_exists(&self, source_url: &str, lang: &str) -> Result<bool, BoxError>;
    async fn read_subtitle_vtt(&self, source_url: &str, lang: &str) -> Result<Vec<u8>, BoxError>;
    async fn write_subtitle_vtt(
        &self,
        source_url: &str,
        lang: &str,
        data: &[u8],
    ) -> Result<(), BoxError>;
}
