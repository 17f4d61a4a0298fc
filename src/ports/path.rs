use crate::domain::types::StreamKind;

/// Pure URL rendering for playlists and assets. The core never parses these
/// URLs; it embeds them verbatim in playlist output, and the serving layer
/// must route them back to the matching controller operations.
#[cfg_attr(test, mockall::automock)]
pub trait PathGenerator: Send + Sync {
    fn master_playlist(&self, source_url: &str) -> String;
    fn variant_playlist(&self, source_url: &str, rendition: &str, kind: StreamKind) -> String;
    fn segment(&self, source_url: &str, rendition: &str, kind: StreamKind, index: usize)
        -> String;
    fn sprite_vtt(&self, source_url: &str) -> String;
    fn sprite(&self, source_url: &str, index: usize) -> String;
    fn subtitle_vtt(&self, source_url: &str, lang: &str) -> String;
}
