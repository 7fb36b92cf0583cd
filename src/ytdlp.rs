//! yt-dlp backed implementation of the extraction engine.
//!
//! All network fetch, stream download and muxing/transcoding happens in
//! the spawned yt-dlp process; this module only builds arguments, streams
//! progress lines back as engine events, and summarizes failures.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::downloader::errors::EngineError;
use crate::downloader::models::StreamDescriptor;
use crate::downloader::traits::{
    DownloadRequest, EngineEvent, EngineHook, EngineStatus, ExtractionEngine, VideoMetadata,
};

const FETCH_TIMEOUT_SECS: u64 = 60;
const METADATA_ATTACH_TIMEOUT_SECS: u64 = 120;
const SOCKET_TIMEOUT_SECS: &str = "15";
const FETCH_RETRIES: &str = "2";

/// Machine-readable progress line requested from yt-dlp. Fields are
/// pipe-separated; yt-dlp renders unknown fields as "NA".
const PROGRESS_TEMPLATE: &str = "download:%(progress._percent_str)s|%(progress._speed_str)s|\
%(progress._eta_str)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|\
%(progress.total_bytes_estimate)s|%(progress.filename)s";

lazy_static! {
    // Post-processing started: transfer is done, muxing/transcoding begins
    static ref POSTPROCESS_RE: Regex =
        Regex::new(r"^\[(Merger|ExtractAudio|Metadata|VideoRemuxer|VideoConvertor)\]").unwrap();
}

/// Extraction engine that shells out to the yt-dlp binary, with ffmpeg
/// for the best-effort metadata pass.
pub struct YtDlpEngine {
    binary: PathBuf,
    ffmpeg: PathBuf,
}

impl YtDlpEngine {
    pub fn new() -> Self {
        Self {
            binary: find_tool("yt-dlp"),
            ffmpeg: find_tool("ffmpeg"),
        }
    }

    /// Use a specific yt-dlp binary instead of probing the system.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg: find_tool("ffmpeg"),
        }
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, EngineError> {
        let args = vec![
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            SOCKET_TIMEOUT_SECS.to_string(),
            "--retries".to_string(),
            FETCH_RETRIES.to_string(),
            url.to_string(),
        ];

        let output = run_output_with_timeout(&self.binary, args, FETCH_TIMEOUT_SECS).await?;
        if !output.status.success() {
            return Err(EngineError::ExecutionFailed(error_summary(
                &String::from_utf8_lossy(&output.stderr),
            )));
        }

        parse_metadata(&output.stdout)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        hook: EngineHook<'_>,
    ) -> Result<(), EngineError> {
        let args = build_download_args(request);
        debug!("spawning {} {:?}", self.binary.display(), args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.binary, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::ExecutionFailed("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::ExecutionFailed("failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let mut reader = BufReader::new(stderr);
            let _ = reader.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut postprocess_reported = false;
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(event) = parse_progress_line(&line) {
                hook(event);
            } else if !postprocess_reported && POSTPROCESS_RE.is_match(&line) {
                postprocess_reported = true;
                hook(EngineEvent {
                    status: EngineStatus::Finished,
                    ..Default::default()
                });
            }
        }

        let status = child.wait().await?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let message = error_summary(&stderr_output);
            hook(EngineEvent {
                status: EngineStatus::Error,
                message: Some(message.clone()),
                ..Default::default()
            });
            return Err(EngineError::ExecutionFailed(message));
        }

        info!("yt-dlp finished: {}", request.url);
        Ok(())
    }

    async fn attach_metadata(&self, file: &Path, title: &str) -> Result<(), EngineError> {
        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
            .to_string();
        let staging = file.with_extension(format!("tagged.{}", ext));

        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            file.to_string_lossy().into_owned(),
            "-map".to_string(),
            "0".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-metadata".to_string(),
            format!("title={}", title),
            staging.to_string_lossy().into_owned(),
        ];

        let output =
            run_output_with_timeout(&self.ffmpeg, args, METADATA_ATTACH_TIMEOUT_SECS).await?;
        if !output.status.success() {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(EngineError::ExecutionFailed(error_summary(
                &String::from_utf8_lossy(&output.stderr),
            )));
        }

        tokio::fs::rename(&staging, file).await?;
        Ok(())
    }
}

/// Locate a tool binary: common install paths first, then PATH.
fn find_tool(name: &str) -> PathBuf {
    let common_paths = [
        format!("/opt/homebrew/bin/{}", name),
        format!("/usr/local/bin/{}", name),
        format!("/usr/bin/{}", name),
    ];

    for path in common_paths {
        if Path::new(&path).exists() {
            return PathBuf::from(path);
        }
    }

    if let Ok(output) = std::process::Command::new("which").arg(name).output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
    }

    // Hope it's resolvable at spawn time
    PathBuf::from(name)
}

fn spawn_error(program: &Path, e: std::io::Error) -> EngineError {
    if e.kind() == std::io::ErrorKind::NotFound {
        EngineError::ToolNotFound(program.display().to_string())
    } else {
        EngineError::Io(e)
    }
}

/// Run a command to completion under an overall timeout, killing the
/// child if it expires.
async fn run_output_with_timeout(
    program: &Path,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, EngineError> {
    let mut child = Command::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::ExecutionFailed("failed to capture stdout".to_string()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| EngineError::ExecutionFailed("failed to capture stderr".to_string()))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res?;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(EngineError::ExecutionFailed(format!(
                "{} timed out after {}s",
                program.display(),
                timeout_secs
            )))
        }
    }
}

fn build_download_args(request: &DownloadRequest) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        request.format_spec.clone(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--newline".to_string(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
        "-o".to_string(),
        request.output_template.to_string_lossy().into_owned(),
    ];

    if let Some(container) = &request.merge_output_format {
        args.push("--merge-output-format".to_string());
        args.push(container.clone());
    }

    if let Some(audio) = &request.extract_audio {
        args.extend([
            "-x".to_string(),
            "--audio-format".to_string(),
            audio.codec.clone(),
            "--audio-quality".to_string(),
            format!("{}K", audio.quality_kbps),
        ]);
    }

    args.push(request.url.clone());
    args
}

/// Parse one templated progress line into a raw engine event.
/// Expected shape: `download:<pct>|<speed>|<eta>|<down>|<total>|<est>|<file>`
fn parse_progress_line(line: &str) -> Option<EngineEvent> {
    let rest = line.strip_prefix("download:")?;
    // The filename comes last and may itself contain '|'
    let fields: Vec<&str> = rest.splitn(7, '|').collect();
    if fields.len() != 7 {
        return None;
    }

    Some(EngineEvent {
        status: EngineStatus::Downloading,
        percent: text_field(fields[0]),
        speed: text_field(fields[1]),
        eta: text_field(fields[2]),
        downloaded_bytes: numeric_field(fields[3]),
        total_bytes: numeric_field(fields[4]),
        total_bytes_estimate: numeric_field(fields[5]),
        filename: text_field(fields[6]),
        message: None,
    })
}

fn text_field(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "NA" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn numeric_field(raw: &str) -> Option<u64> {
    // yt-dlp renders estimates as floats
    raw.trim().parse::<f64>().ok().map(|v| v as u64)
}

/// Reduce yt-dlp stderr to a short human-readable message: ERROR lines
/// first, otherwise the last non-empty line.
fn error_summary(stderr: &str) -> String {
    let error_lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .take(2)
        .collect();

    if !error_lines.is_empty() {
        return error_lines.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Unknown error")
        .to_string()
}

fn parse_metadata(stdout: &[u8]) -> Result<VideoMetadata, EngineError> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| EngineError::ParseError(format!("invalid JSON from yt-dlp: {}", e)))?;

    Ok(VideoMetadata {
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        channel: json["channel"]
            .as_str()
            .or_else(|| json["uploader"].as_str())
            .unwrap_or("Unknown")
            .to_string(),
        duration_secs: json["duration"].as_f64().unwrap_or(0.0) as u64,
        thumbnail: json["thumbnail"].as_str().unwrap_or("").to_string(),
        formats: parse_stream_descriptors(&json),
    })
}

fn parse_stream_descriptors(json: &serde_json::Value) -> Vec<StreamDescriptor> {
    let formats = match json["formats"].as_array() {
        Some(formats) => formats,
        None => return Vec::new(),
    };

    formats
        .iter()
        .filter_map(|f| {
            let format_id = f["format_id"].as_str()?;
            Some(StreamDescriptor {
                format_id: format_id.to_string(),
                ext: f["ext"].as_str().unwrap_or("unknown").to_string(),
                height: f["height"].as_u64().map(|h| h as u32),
                vcodec: f["vcodec"].as_str().map(str::to_string),
                acodec: f["acodec"].as_str().map(str::to_string),
                resolution: f["resolution"].as_str().map(str::to_string),
                filesize: f["filesize"].as_u64(),
                filesize_approx: f["filesize_approx"].as_u64(),
            })
        })
        .collect()
}
