// Downloader module - core abstraction layer

pub mod config;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod traits;
pub mod utils;

pub use errors::{DownloadError, EngineError};
pub use models::{FormatOffering, ProgressEvent, StreamDescriptor, VideoSession};
pub use orchestrator::{VideoDownloader, DEFAULT_AUDIO_QUALITY_KBPS};
pub use progress::ProgressReporter;
pub use traits::{
    DownloadRequest, EngineEvent, EngineStatus, ExtractionEngine, ProgressObserver, VideoMetadata,
};
