// Pure helpers: size/duration formatting, filename sanitizing, URL validation

use lazy_static::lazy_static;
use regex::Regex;
use time::macros::format_description;
use time::OffsetDateTime;

lazy_static! {
    static ref ILLEGAL_FILENAME_RE: Regex = Regex::new(r#"[\\/*?:"<>|]"#).unwrap();
    // Anchored at the start like a prefix match; accepts watch/embed/v/short-link forms
    static ref YOUTUBE_URL_RE: Regex = Regex::new(
        r"^(https?://)?(www\.)?(youtube|youtu|youtube-nocookie)\.(com|be)/(watch\?v=|embed/|v/|.+\?v=)?([^&=%\?]{11})"
    )
    .unwrap();
    static ref VIDEO_ID_RE: Regex = Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").unwrap();
}

/// Format a byte count for display: two decimals across B/KB/MB/GB/TB,
/// `"Unknown"` when the size is not known.
pub fn format_filesize(bytes: Option<u64>) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let Some(bytes) = bytes else {
        return "Unknown".to_string();
    };

    let mut value = bytes as f64;
    let mut unit = UNITS[0];
    for u in UNITS {
        unit = u;
        if value < 1024.0 || u == "TB" {
            break;
        }
        value /= 1024.0;
    }

    format!("{:.2} {}", value, unit)
}

/// Replace characters illegal in filesystem names with underscores.
pub fn sanitize_filename(filename: &str) -> String {
    ILLEGAL_FILENAME_RE.replace_all(filename, "_").into_owned()
}

/// Current timestamp as `YYYY-MM-DD_HH-MM-SS`, suitable for filenames.
pub fn timestamp() -> String {
    let format = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format)
        .unwrap_or_else(|_| "0000-00-00_00-00-00".to_string())
}

/// Format a duration in seconds as `MM:SS`, or `HH:MM:SS` past the hour.
pub fn format_duration(secs: u64) -> String {
    let (minutes, seconds) = (secs / 60, secs % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Whether the URL matches an accepted YouTube hostname pattern and
/// carries an 11-character video id. Gate before any network access.
pub fn is_valid_youtube_url(url: &str) -> bool {
    YOUTUBE_URL_RE.is_match(url)
}

/// Extract the 11-character video id token from a YouTube URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
}
