// Environment-driven configuration

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Environment variable holding the preferred download directory.
pub const DOWNLOAD_PATH_ENV: &str = "DEFAULT_DOWNLOAD_PATH";

const FALLBACK_DOWNLOAD_PATH: &str = "./downloads";

/// Resolve the default download directory.
///
/// Reads `DEFAULT_DOWNLOAD_PATH` (falling back to `./downloads`), expands
/// a leading `~`, resolves to an absolute path and creates the directory
/// if it does not exist.
pub fn default_download_dir() -> io::Result<PathBuf> {
    let raw = env::var(DOWNLOAD_PATH_ENV).unwrap_or_else(|_| FALLBACK_DOWNLOAD_PATH.to_string());
    let path = expand_home(&raw);
    let path = if path.is_absolute() {
        path
    } else {
        env::current_dir()?.join(path)
    };

    fs::create_dir_all(&path)?;
    path.canonicalize()
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}
