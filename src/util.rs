use crate::entity::Episode;
use crate::model::Item;
use flexi_logger::{FlexiLoggerError, Logger, LoggerHandle};
use log::debug;
use std::path::Path;

pub const DEFAULT_EXTENSION: &str = ".mp3";

const ILLEGAL_CHARS: &[char] = &['\\', '/', ':', '"', '*', '?', '<', '>', '|'];

/// Start stdout logging; `RUST_LOG` takes precedence over `spec`.
/// The returned handle must be kept alive for the lifetime of the process.
pub fn init_log(spec: &str) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_env_or_str(spec)?.log_to_stdout().start()
}

/// Strip characters that are illegal in file names on common filesystems.
pub fn sanitize(name: &str) -> String {
    name.chars().filter(|c| !ILLEGAL_CHARS.contains(c)).collect()
}

/// File suffix of the enclosure URL including the dot, ignoring query and fragment.
pub fn extension(url: &str) -> Option<&str> {
    let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    let url = &url[..end];
    let path = match url.find("://") {
        Some(i) => {
            let rest = &url[i + 3..];
            &rest[rest.find('/')?..]
        }
        None => url,
    };
    let segment = path.rsplit('/').next()?;
    let dot = segment.rfind('.')?;
    let ext = &segment[dot..];
    if ext.len() > 1 {
        Some(ext)
    } else {
        None
    }
}

pub fn watermark_filter(watermark: i64) -> impl Fn(&Item) -> bool {
    move |i: &Item| -> bool { i.timestamp >= watermark }
}

/// Select the newest-first prefix of `items` published at or after `watermark`,
/// resolving each one to a destination under `feed_dir`.
///
/// The scan stops at the first older item; `items` must already be newest-first.
pub fn select_new(items: &[Item], watermark: i64, feed_dir: &Path) -> Vec<Episode> {
    let keep = watermark_filter(watermark);
    items
        .iter()
        .take_while(|i| keep(*i))
        .map(|i| {
            let mut stem = sanitize(&i.title);
            if stem.trim().is_empty() {
                stem = i.timestamp.to_string();
            }
            let ext = extension(&i.url)
                .map(sanitize)
                .filter(|e| e.len() > 1)
                .unwrap_or_else(|| {
                    debug!("assuming {} extension for {}", DEFAULT_EXTENSION, i.title);
                    DEFAULT_EXTENSION.to_string()
                });
            Episode {
                name: i.title.clone(),
                url: i.url.clone(),
                timestamp: i.timestamp,
                path: feed_dir.join(format!("{}{}", stem, ext)),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn test_log() {
    let _ = Logger::try_with_str("debug").map(|l| l.log_to_stdout().start());
}
