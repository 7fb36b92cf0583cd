// Common data models for the downloader core

use serde::{Deserialize, Serialize};

/// One selectable stream as reported by the extraction engine.
///
/// Immutable once fetched; owned by the session that fetched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Opaque engine handle, stable within one fetch session
    pub format_id: String,

    /// Container short name (e.g. "mp4", "webm")
    pub ext: String,

    /// Video height in pixels, if the stream carries video
    pub height: Option<u32>,

    /// Video codec, "none" for audio-only streams
    pub vcodec: Option<String>,

    /// Audio codec, "none" for video-only streams
    pub acodec: Option<String>,

    /// Resolution string from the engine ("audio only" for audio streams)
    pub resolution: Option<String>,

    /// Exact size in bytes, when the engine knows it
    pub filesize: Option<u64>,

    /// Engine-estimated size, used when the exact size is unknown
    pub filesize_approx: Option<u64>,
}

impl StreamDescriptor {
    pub fn has_video(&self) -> bool {
        self.vcodec
            .as_deref()
            .map_or(false, |v| v != "none" && !v.is_empty())
    }

    pub fn has_audio(&self) -> bool {
        self.acodec
            .as_deref()
            .map_or(false, |a| a != "none" && !a.is_empty())
    }

    pub fn is_audio_only(&self) -> bool {
        self.resolution.as_deref() == Some("audio only")
    }

    /// Exact size, falling back to the engine's estimate.
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }
}

/// A deduplicated, presentation-ready quality choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOffering {
    /// Position in the offered list, stable for the session
    pub index: usize,

    /// Display label, e.g. "1080p (mp4) 150.00 MB + audio"
    pub label: String,

    /// Engine format handle to request for this offering
    pub format_id: String,

    /// Resolution tier in pixels
    pub height: u32,

    /// Container of the underlying stream
    pub container: String,

    /// Size in bytes, when known
    pub size: Option<u64>,

    /// True when the stream is video-only and audio must be merged in
    pub needs_audio_merge: bool,
}

/// Fetched metadata for one URL. Created whole by a fetch call and never
/// partially mutated; a new fetch yields a new session value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSession {
    pub url: String,
    pub title: String,
    pub channel: String,
    pub duration_secs: u64,
    pub thumbnail: String,
    pub offerings: Vec<FormatOffering>,
}

/// Normalized progress record forwarded to the registered observer.
///
/// Produced and consumed synchronously, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
    Downloading {
        percent: String,
        speed: String,
        eta: String,
        /// Basename of the file being written, directory stripped
        filename: String,
        downloaded_bytes: u64,
        /// Exact total when known, otherwise the engine's estimate
        total_bytes: u64,
    },
    Processing {
        message: String,
    },
    Complete {
        message: String,
    },
    Error {
        message: String,
    },
}
