use crate::entity::FeedDefinition;
use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub const DEFAULT_CONFIG: &str = "config/config.yaml";

/// Read the feed list from a YAML document.
pub fn load_feeds(path: &Path) -> Result<Vec<FeedDefinition>> {
    let config_error = |source: Box<dyn std::error::Error + Send + Sync>| Error::Config {
        path: path.to_path_buf(),
        source,
    };
    let raw = fs::read_to_string(path).map_err(|e| config_error(e.into()))?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let feeds: Option<Vec<FeedDefinition>> =
        serde_yaml::from_str(&raw).map_err(|e| config_error(e.into()))?;
    Ok(feeds.unwrap_or_default())
}

/// Replace the feed list atomically: write a sibling temp file, then rename it over `path`.
pub fn save_feeds(path: &Path, feeds: &[FeedDefinition]) -> Result<()> {
    let state_error = |source: Box<dyn std::error::Error + Send + Sync>| Error::State {
        path: path.to_path_buf(),
        source,
    };
    let yaml = serde_yaml::to_string(feeds).map_err(|e| state_error(e.into()))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| state_error(e.into()))?;
    tmp.write_all(yaml.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| state_error(e.into()))?;
    tmp.persist(path).map_err(|e| state_error(e.into()))?;
    Ok(())
}
