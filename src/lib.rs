//! Core library for downloading YouTube videos and audio via yt-dlp.
//!
//! The [`downloader`] module holds the engine-agnostic core: format
//! normalization, progress reporting and the download orchestrator. The
//! [`ytdlp`] module provides the concrete engine that shells out to the
//! yt-dlp binary.

pub mod downloader;
pub mod ytdlp;

pub use downloader::config::default_download_dir;
pub use downloader::errors::{DownloadError, EngineError};
pub use downloader::models::{FormatOffering, ProgressEvent, StreamDescriptor, VideoSession};
pub use downloader::orchestrator::{VideoDownloader, DEFAULT_AUDIO_QUALITY_KBPS};
pub use downloader::traits::{ExtractionEngine, ProgressObserver};
pub use ytdlp::YtDlpEngine;
