// Progress reporter - translates raw engine events into normalized
// ProgressEvents for the registered observer.

use std::path::Path;

use super::models::ProgressEvent;
use super::traits::{EngineEvent, EngineStatus, ProgressObserver};

const UNKNOWN_FIELD: &str = "Unknown";
const PROCESSING_MESSAGE: &str = "Download finished. Now processing...";
const UNKNOWN_ERROR: &str = "Unknown error";

/// Holds at most one observer; re-registering replaces the previous one.
#[derive(Default)]
pub struct ProgressReporter {
    observer: Option<Box<dyn ProgressObserver>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the observer. Last registration wins.
    pub fn set_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observer = Some(observer);
    }

    /// Forward a normalized event to the observer, if one is registered.
    pub fn notify(&self, event: ProgressEvent) {
        if let Some(observer) = &self.observer {
            observer.on_progress(event);
        }
    }

    /// Translate a raw engine event and forward it.
    pub fn on_engine_event(&self, raw: EngineEvent) {
        self.notify(translate(raw));
    }
}

fn translate(raw: EngineEvent) -> ProgressEvent {
    match raw.status {
        EngineStatus::Downloading => ProgressEvent::Downloading {
            percent: text_or_unknown(raw.percent),
            speed: text_or_unknown(raw.speed),
            eta: text_or_unknown(raw.eta),
            filename: basename(raw.filename.as_deref().unwrap_or("")),
            downloaded_bytes: raw.downloaded_bytes.unwrap_or(0),
            total_bytes: raw
                .total_bytes
                .or(raw.total_bytes_estimate)
                .unwrap_or(0),
        },
        EngineStatus::Finished => ProgressEvent::Processing {
            message: PROCESSING_MESSAGE.to_string(),
        },
        EngineStatus::Error => ProgressEvent::Error {
            message: raw.message.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        },
    }
}

fn text_or_unknown(field: Option<String>) -> String {
    match field {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => UNKNOWN_FIELD.to_string(),
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
