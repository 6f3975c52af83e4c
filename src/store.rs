use crate::entity::Episode;
use crate::error::{Error, Result};
use crate::util::sanitize;
use log::warn;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum FileState {
    Exists,
    Missing,
    Unknown(io::Error),
}

pub fn file_state(path: &Path) -> FileState {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => FileState::Exists,
        Ok(_) => FileState::Missing,
        Err(e) if e.kind() == ErrorKind::NotFound => FileState::Missing,
        Err(e) => FileState::Unknown(e),
    }
}

/// `<root>/<title>`, the directory a feed's episodes are written into.
/// Titles that sanitize to nothing, `.` or `..` would escape that directory.
pub fn feed_dir(root: &Path, feed_title: &str) -> Result<PathBuf> {
    let name = sanitize(feed_title);
    match name.trim() {
        "" | "." | ".." => Err(Error::Directory {
            path: root.join(&name),
            source: io::Error::new(
                ErrorKind::InvalidInput,
                format!("unusable directory name {:?}", feed_title),
            ),
        }),
        _ => Ok(root.join(name)),
    }
}

/// Create the feed directory; an existing directory is fine.
/// The root itself is not created.
pub fn ensure_directory(root: &Path, feed_title: &str) -> Result<PathBuf> {
    let dir = feed_dir(root, feed_title)?;
    match fs::create_dir(&dir) {
        Ok(()) => Ok(dir),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(dir),
        Err(source) => Err(Error::Directory { path: dir, source }),
    }
}

/// Drop episodes whose destination file is already on disk.
pub fn filter_existing(episodes: Vec<Episode>) -> Vec<Episode> {
    episodes
        .into_iter()
        .filter(|e| match file_state(&e.path) {
            FileState::Exists => false,
            FileState::Missing => true,
            FileState::Unknown(err) => {
                warn!("can't stat {}, assuming absent: {}", e.path.display(), err);
                true
            }
        })
        .collect()
}
