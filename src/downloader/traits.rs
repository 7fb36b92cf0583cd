// Engine and observer seams

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::errors::EngineError;
use super::models::{ProgressEvent, StreamDescriptor};

/// Raw metadata for one URL, as returned by the engine's simulate mode.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub title: String,
    pub channel: String,
    pub duration_secs: u64,
    pub thumbnail: String,
    pub formats: Vec<StreamDescriptor>,
}

/// One download invocation handed to the engine: selection expression,
/// output naming and post-processing. The orchestrator builds these; the
/// engine performs all network and media work.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,

    /// Engine stream-selection expression, e.g. "137+bestaudio/best"
    pub format_spec: String,

    /// Output path template containing the engine's `%(ext)s` placeholder
    pub output_template: PathBuf,

    /// Force the merged container to this format (video downloads)
    pub merge_output_format: Option<String>,

    /// Extract and transcode audio instead of keeping video
    pub extract_audio: Option<AudioExtraction>,
}

#[derive(Debug, Clone)]
pub struct AudioExtraction {
    /// Target codec short name, e.g. "mp3"
    pub codec: String,
    /// Target bitrate, passed through to the transcoder verbatim
    pub quality_kbps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineStatus {
    #[default]
    Downloading,
    /// Transfer done, muxing/transcoding started. Not true completion.
    Finished,
    Error,
}

/// Low-level progress record emitted by the engine during a download.
#[derive(Debug, Clone, Default)]
pub struct EngineEvent {
    pub status: EngineStatus,
    pub percent: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    /// Path of the file being written, as reported by the engine
    pub filename: Option<String>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    /// Error text, for `Error` events
    pub message: Option<String>,
}

/// Callback the engine invokes with raw progress during a download.
pub type EngineHook<'a> = &'a (dyn Fn(EngineEvent) + Send + Sync);

/// Interface to the external extraction/download engine.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Metadata-only fetch: title, channel, duration, thumbnail and the
    /// raw stream descriptors. No file is written.
    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, EngineError>;

    /// Perform the download described by `request`, invoking `hook` with
    /// raw progress events during transfer.
    async fn download(&self, request: &DownloadRequest, hook: EngineHook<'_>)
        -> Result<(), EngineError>;

    /// Best-effort metadata tagging of the finished file. Callers treat
    /// failures as non-fatal.
    async fn attach_metadata(&self, file: &Path, title: &str) -> Result<(), EngineError>;
}

/// Observer for normalized progress events. One subscriber at a time;
/// called synchronously from whatever thread drives the operation.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}
