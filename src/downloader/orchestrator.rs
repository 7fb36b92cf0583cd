// Download orchestrator - turns a user's offering choice into a concrete
// engine invocation: selection expression, output naming, directory
// preparation. Everything else is delegated to the engine.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::errors::DownloadError;
use super::format_selector::normalize_formats;
use super::models::{ProgressEvent, VideoSession};
use super::progress::ProgressReporter;
use super::traits::{
    AudioExtraction, DownloadRequest, ExtractionEngine, ProgressObserver,
};
use super::utils::{is_valid_youtube_url, sanitize_filename, timestamp};

/// Default audio bitrate for `download_audio`, in kbps.
pub const DEFAULT_AUDIO_QUALITY_KBPS: u32 = 192;

const VIDEO_CONTAINER: &str = "mp4";
const AUDIO_CODEC: &str = "mp3";
const EXT_PLACEHOLDER: &str = "%(ext)s";
const VIDEO_COMPLETE_MESSAGE: &str = "Download complete!";
const AUDIO_COMPLETE_MESSAGE: &str = "Audio download complete!";

/// Drives fetch and download against one extraction engine.
///
/// Each operation is a single blocking flow; the type holds no session
/// state of its own and is not meant for concurrent calls against the
/// same instance. There is no cancellation or retry at this layer.
pub struct VideoDownloader<E> {
    engine: E,
    reporter: ProgressReporter,
}

impl<E: ExtractionEngine> VideoDownloader<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            reporter: ProgressReporter::new(),
        }
    }

    /// Register the progress observer. Last registration wins.
    pub fn set_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.reporter.set_observer(observer);
    }

    /// Fetch metadata and the normalized offering list for a URL.
    ///
    /// Returns a fresh immutable session; fetching again (same URL or
    /// not) yields a new value and invalidates nothing.
    pub async fn fetch_video_info(&self, url: &str) -> Result<VideoSession, DownloadError> {
        if !is_valid_youtube_url(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }

        let metadata = match self.engine.fetch_metadata(url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.reporter.notify(ProgressEvent::Error {
                    message: e.to_string(),
                });
                return Err(DownloadError::FetchFailure(e));
            }
        };

        let offerings = normalize_formats(&metadata.formats);
        info!(
            "[{}] fetched \"{}\" ({} offerings)",
            self.engine.name(),
            metadata.title,
            offerings.len()
        );

        Ok(VideoSession {
            url: url.to_string(),
            title: metadata.title,
            channel: metadata.channel,
            duration_secs: metadata.duration_secs,
            thumbnail: metadata.thumbnail,
            offerings,
        })
    }

    /// Download the selected offering as an mp4 file and return its path.
    pub async fn download_video(
        &self,
        session: &VideoSession,
        offering_index: usize,
        output_dir: &Path,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let offering = session.offerings.get(offering_index).ok_or(
            DownloadError::InvalidSelection {
                index: offering_index,
                count: session.offerings.len(),
            },
        )?;

        // Video-only stream: join in the best audio, with a generic
        // best-quality fallback if the specific id is unavailable.
        let format_spec = if offering.needs_audio_merge {
            format!("{}+bestaudio/best", offering.format_id)
        } else {
            offering.format_id.clone()
        };

        let template = self.output_template(output_dir, &session.title, filename)?;
        let request = DownloadRequest {
            url: session.url.clone(),
            format_spec,
            output_template: template.clone(),
            merge_output_format: Some(VIDEO_CONTAINER.to_string()),
            extract_audio: None,
        };

        self.run_download(&request).await?;
        let path = substitute_extension(&template, VIDEO_CONTAINER);

        // Best-effort tagging; never fails the download.
        if let Err(e) = self.engine.attach_metadata(&path, &session.title).await {
            warn!("metadata attach failed for {}: {}", path.display(), e);
        }

        self.reporter.notify(ProgressEvent::Complete {
            message: VIDEO_COMPLETE_MESSAGE.to_string(),
        });
        Ok(path)
    }

    /// Download best audio as an mp3 file at `quality_kbps` and return
    /// its path.
    pub async fn download_audio(
        &self,
        session: &VideoSession,
        output_dir: &Path,
        filename: Option<&str>,
        quality_kbps: u32,
    ) -> Result<PathBuf, DownloadError> {
        let template = self.output_template(output_dir, &session.title, filename)?;
        let request = DownloadRequest {
            url: session.url.clone(),
            format_spec: "bestaudio/best".to_string(),
            output_template: template.clone(),
            merge_output_format: None,
            extract_audio: Some(AudioExtraction {
                codec: AUDIO_CODEC.to_string(),
                quality_kbps,
            }),
        };

        self.run_download(&request).await?;

        self.reporter.notify(ProgressEvent::Complete {
            message: AUDIO_COMPLETE_MESSAGE.to_string(),
        });
        Ok(substitute_extension(&template, AUDIO_CODEC))
    }

    /// Fetch-then-download convenience for callers without a session.
    pub async fn download_video_from_url(
        &self,
        url: &str,
        offering_index: usize,
        output_dir: &Path,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let session = self.fetch_video_info(url).await?;
        self.download_video(&session, offering_index, output_dir, filename)
            .await
    }

    /// Fetch-then-download convenience for audio extraction.
    pub async fn download_audio_from_url(
        &self,
        url: &str,
        output_dir: &Path,
        filename: Option<&str>,
        quality_kbps: u32,
    ) -> Result<PathBuf, DownloadError> {
        let session = self.fetch_video_info(url).await?;
        self.download_audio(&session, output_dir, filename, quality_kbps)
            .await
    }

    async fn run_download(&self, request: &DownloadRequest) -> Result<(), DownloadError> {
        let reporter = &self.reporter;
        let hook = move |event: super::traits::EngineEvent| reporter.on_engine_event(event);

        match self.engine.download(request, &hook).await {
            Ok(()) => Ok(()),
            Err(e) => {
                reporter.notify(ProgressEvent::Error {
                    message: e.to_string(),
                });
                Err(DownloadError::DownloadFailure(e))
            }
        }
    }

    /// Build `<dir>/<stem>.%(ext)s`, creating the directory first. The
    /// stem is the caller's filename verbatim, or the sanitized title
    /// plus a timestamp so repeated downloads never collide.
    fn output_template(
        &self,
        output_dir: &Path,
        title: &str,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        fs::create_dir_all(output_dir)
            .map_err(|e| DownloadError::DownloadFailure(e.into()))?;

        let stem = match filename {
            Some(name) => name.to_string(),
            None => format!("{}_{}", sanitize_filename(title), timestamp()),
        };

        Ok(output_dir.join(format!("{}.{}", stem, EXT_PLACEHOLDER)))
    }
}

fn substitute_extension(template: &Path, ext: &str) -> PathBuf {
    PathBuf::from(
        template
            .to_string_lossy()
            .replace(EXT_PLACEHOLDER, ext),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::downloader::errors::EngineError;
    use crate::downloader::models::StreamDescriptor;
    use crate::downloader::traits::{EngineEvent, EngineHook, EngineStatus, VideoMetadata};

    fn descriptor(format_id: &str, height: u32, ext: &str, has_audio: bool) -> StreamDescriptor {
        StreamDescriptor {
            format_id: format_id.to_string(),
            ext: ext.to_string(),
            height: Some(height),
            vcodec: Some("avc1".to_string()),
            acodec: Some(if has_audio { "mp4a" } else { "none" }.to_string()),
            resolution: None,
            filesize: Some(1024),
            filesize_approx: None,
        }
    }

    #[derive(Default)]
    struct MockEngine {
        fetch_calls: AtomicUsize,
        fail_fetch: bool,
        fail_download: bool,
        fail_metadata_attach: bool,
        requests: Mutex<Vec<DownloadRequest>>,
        tagged: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ExtractionEngine for MockEngine {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, EngineError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err(EngineError::ExecutionFailed("video unavailable".to_string()));
            }
            let formats = if url.contains("empty") {
                Vec::new()
            } else {
                vec![
                    descriptor("137", 1080, "webm", false),
                    descriptor("22", 720, "mp4", true),
                ]
            };
            Ok(VideoMetadata {
                title: format!("Video: {}", crate::downloader::utils::extract_video_id(url).unwrap_or_default()),
                channel: "Channel".to_string(),
                duration_secs: 90,
                thumbnail: String::new(),
                formats,
            })
        }

        async fn download(
            &self,
            request: &DownloadRequest,
            hook: EngineHook<'_>,
        ) -> Result<(), EngineError> {
            if self.fail_download {
                return Err(EngineError::ExecutionFailed("network unreachable".to_string()));
            }
            self.requests.lock().unwrap().push(request.clone());
            hook(EngineEvent {
                status: EngineStatus::Downloading,
                percent: Some("50.0%".to_string()),
                downloaded_bytes: Some(512),
                total_bytes: Some(1024),
                ..Default::default()
            });
            hook(EngineEvent {
                status: EngineStatus::Finished,
                ..Default::default()
            });
            Ok(())
        }

        async fn attach_metadata(&self, file: &Path, _title: &str) -> Result<(), EngineError> {
            if self.fail_metadata_attach {
                return Err(EngineError::ExecutionFailed("ffmpeg missing".to_string()));
            }
            self.tagged.lock().unwrap().push(file.to_path_buf());
            Ok(())
        }
    }

    fn observed_downloader(
        engine: MockEngine,
    ) -> (VideoDownloader<MockEngine>, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut downloader = VideoDownloader::new(engine);
        downloader.set_observer(Box::new(move |event| sink.lock().unwrap().push(event)));
        (downloader, events)
    }

    const URL_A: &str = "https://www.youtube.com/watch?v=aaaaaaaaaaa";
    const URL_B: &str = "https://www.youtube.com/watch?v=bbbbbbbbbbb";

    #[tokio::test]
    async fn test_invalid_url_rejected_before_engine_call() {
        let (downloader, events) = observed_downloader(MockEngine::default());

        let err = downloader.fetch_video_info("not a url").await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
        assert_eq!(downloader.engine.fetch_calls.load(Ordering::SeqCst), 0);
        // Validation errors never touch the observer
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_builds_session_with_offerings() {
        let (downloader, _) = observed_downloader(MockEngine::default());

        let session = downloader.fetch_video_info(URL_A).await.unwrap();
        assert_eq!(session.url, URL_A);
        assert_eq!(session.offerings.len(), 2);
        assert_eq!(session.offerings[0].height, 1080);
        assert!(session.offerings[0].needs_audio_merge);
        assert_eq!(session.offerings[1].height, 720);
    }

    #[tokio::test]
    async fn test_sequential_fetches_yield_independent_sessions() {
        let (downloader, _) = observed_downloader(MockEngine::default());

        let first = downloader.fetch_video_info(URL_A).await.unwrap();
        let second = downloader.fetch_video_info(URL_B).await.unwrap();

        assert_ne!(first.title, second.title);
        assert_eq!(second.url, URL_B);
        // The first session is untouched by the second fetch
        assert_eq!(first.url, URL_A);
        assert_eq!(first.offerings.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_notifies_then_propagates() {
        let engine = MockEngine {
            fail_fetch: true,
            ..Default::default()
        };
        let (downloader, events) = observed_downloader(engine);

        let err = downloader.fetch_video_info(URL_A).await.unwrap_err();

        assert!(matches!(err, DownloadError::FetchFailure(_)));
        let events = events.lock().unwrap();
        assert!(matches!(&events[0], ProgressEvent::Error { message } if message.contains("video unavailable")));
    }

    #[tokio::test]
    async fn test_out_of_range_offering_index() {
        let (downloader, _) = observed_downloader(MockEngine::default());
        let tmp = tempfile::tempdir().unwrap();

        let session = downloader.fetch_video_info(URL_A).await.unwrap();
        let err = downloader
            .download_video(&session, 99, tmp.path(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DownloadError::InvalidSelection { index: 99, count: 2 }
        ));
    }

    #[tokio::test]
    async fn test_video_download_forces_mp4_and_merges_audio() {
        let (downloader, events) = observed_downloader(MockEngine::default());
        let tmp = tempfile::tempdir().unwrap();

        let session = downloader.fetch_video_info(URL_A).await.unwrap();
        // Offering 0 is the 1080p webm video-only stream
        let path = downloader
            .download_video(&session, 0, tmp.path(), None)
            .await
            .unwrap();

        assert_eq!(path.extension().unwrap(), "mp4");

        let requests = downloader.engine.requests.lock().unwrap();
        assert_eq!(requests[0].format_spec, "137+bestaudio/best");
        assert_eq!(requests[0].merge_output_format.as_deref(), Some("mp4"));
        assert!(requests[0].extract_audio.is_none());

        let events = events.lock().unwrap();
        assert!(matches!(events.last(), Some(ProgressEvent::Complete { message }) if message == "Download complete!"));
    }

    #[tokio::test]
    async fn test_muxed_offering_uses_bare_format_id() {
        let (downloader, _) = observed_downloader(MockEngine::default());
        let tmp = tempfile::tempdir().unwrap();

        let session = downloader.fetch_video_info(URL_A).await.unwrap();
        downloader
            .download_video(&session, 1, tmp.path(), None)
            .await
            .unwrap();

        let requests = downloader.engine.requests.lock().unwrap();
        assert_eq!(requests[0].format_spec, "22");
    }

    #[tokio::test]
    async fn test_custom_filename_used_verbatim() {
        let (downloader, _) = observed_downloader(MockEngine::default());
        let tmp = tempfile::tempdir().unwrap();

        let session = downloader.fetch_video_info(URL_A).await.unwrap();
        let path = downloader
            .download_video(&session, 1, tmp.path(), Some("my clip"))
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("my clip.mp4"));
    }

    #[tokio::test]
    async fn test_derived_filename_is_sanitized_and_timestamped() {
        let engine = MockEngine::default();
        let mut downloader = VideoDownloader::new(engine);
        downloader.set_observer(Box::new(|_| {}));
        let tmp = tempfile::tempdir().unwrap();

        let mut session = downloader.fetch_video_info(URL_A).await.unwrap();
        session.title = "a:b/c?d".to_string();

        let path = downloader
            .download_video(&session, 1, tmp.path(), None)
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("a_b_c_d_"), "unexpected name: {}", name);
        assert!(name.ends_with(".mp4"));
        // stem + '_' + 19-char timestamp + ".mp4"
        assert_eq!(name.len(), "a_b_c_d_".len() + 19 + ".mp4".len());
    }

    #[tokio::test]
    async fn test_audio_download_passes_bitrate_through() {
        let (downloader, events) = observed_downloader(MockEngine::default());
        let tmp = tempfile::tempdir().unwrap();

        let session = downloader.fetch_video_info(URL_A).await.unwrap();
        let path = downloader
            .download_audio(&session, tmp.path(), Some("track"), 256)
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("track.mp3"));

        let requests = downloader.engine.requests.lock().unwrap();
        assert_eq!(requests[0].format_spec, "bestaudio/best");
        let audio = requests[0].extract_audio.as_ref().unwrap();
        assert_eq!(audio.codec, "mp3");
        assert_eq!(audio.quality_kbps, 256);

        let events = events.lock().unwrap();
        assert!(matches!(events.last(), Some(ProgressEvent::Complete { message }) if message == "Audio download complete!"));
    }

    #[tokio::test]
    async fn test_metadata_attach_failure_is_swallowed() {
        let engine = MockEngine {
            fail_metadata_attach: true,
            ..Default::default()
        };
        let (downloader, events) = observed_downloader(engine);
        let tmp = tempfile::tempdir().unwrap();

        let session = downloader.fetch_video_info(URL_A).await.unwrap();
        let result = downloader
            .download_video(&session, 0, tmp.path(), Some("clip"))
            .await;

        assert!(result.is_ok());
        let events = events.lock().unwrap();
        assert!(matches!(events.last(), Some(ProgressEvent::Complete { .. })));
    }

    #[tokio::test]
    async fn test_download_failure_notifies_then_propagates() {
        let engine = MockEngine {
            fail_download: true,
            ..Default::default()
        };
        let (downloader, events) = observed_downloader(engine);
        let tmp = tempfile::tempdir().unwrap();

        let session = downloader.fetch_video_info(URL_A).await.unwrap();
        let err = downloader
            .download_video(&session, 0, tmp.path(), Some("clip"))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::DownloadFailure(_)));
        let events = events.lock().unwrap();
        assert!(matches!(events.last(), Some(ProgressEvent::Error { message }) if message.contains("network unreachable")));
    }

    #[tokio::test]
    async fn test_progress_events_flow_to_observer() {
        let (downloader, events) = observed_downloader(MockEngine::default());
        let tmp = tempfile::tempdir().unwrap();

        let session = downloader.fetch_video_info(URL_A).await.unwrap();
        downloader
            .download_video(&session, 1, tmp.path(), Some("clip"))
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert!(matches!(events[0], ProgressEvent::Downloading { .. }));
        assert!(matches!(events[1], ProgressEvent::Processing { .. }));
        assert!(matches!(events[2], ProgressEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn test_implicit_fetch_convenience() {
        let (downloader, _) = observed_downloader(MockEngine::default());
        let tmp = tempfile::tempdir().unwrap();

        let path = downloader
            .download_video_from_url(URL_A, 1, tmp.path(), Some("clip"))
            .await
            .unwrap();

        assert_eq!(downloader.engine.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(path, tmp.path().join("clip.mp4"));
    }

    #[test]
    fn test_substitute_extension() {
        let template = PathBuf::from("/out/video_2024.%(ext)s");
        assert_eq!(
            substitute_extension(&template, "mp4"),
            PathBuf::from("/out/video_2024.mp4")
        );
    }
}
