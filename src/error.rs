use std::error::Error as StdError;
use std::path::PathBuf;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can't load config {path}: {source}")]
    Config { path: PathBuf, source: BoxError },

    #[error("can't fetch feed {url}: {source}")]
    Fetch { url: String, source: BoxError },

    #[error("can't create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("can't download {url}: {source}")]
    Download { url: String, source: BoxError },

    #[error("can't save watermarks to {path}: {source}")]
    State { path: PathBuf, source: BoxError },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn fetch(url: &str, source: impl Into<BoxError>) -> Self {
        Error::Fetch {
            url: url.to_string(),
            source: source.into(),
        }
    }

    pub fn download(url: &str, source: impl Into<BoxError>) -> Self {
        Error::Download {
            url: url.to_string(),
            source: source.into(),
        }
    }
}
