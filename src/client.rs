use crate::error::{Error, Result};
use crate::model::Feed;
use crate::parser::parse_feed;
use log::debug;
use simple_error::SimpleError;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub trait Fetcher {
    /// Retrieve and parse a feed; items come back newest-first.
    fn fetch_feed(&self, url: &str) -> Result<Feed>;
}

pub trait Transport {
    /// Write the body behind `url` to `dest`, returning the byte count.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

pub struct Client {
    agent: ureq::Agent,
}

impl Client {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .user_agent(concat!("podcast_sync/", env!("CARGO_PKG_VERSION")))
            .build();
        Client { agent }
    }

    // 4xx/5xx surface as errors here; nothing has touched the disk yet
    fn get(&self, url: &str) -> std::result::Result<ureq::Response, SimpleError> {
        self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => SimpleError::new(format!("HTTP status {}", code)),
            other => SimpleError::new(other.to_string()),
        })
    }
}

impl Fetcher for Client {
    fn fetch_feed(&self, url: &str) -> Result<Feed> {
        debug!("fetching feed {}", url);
        let resp = self.get(url).map_err(|e| Error::fetch(url, e))?;
        let mut feed =
            parse_feed(BufReader::new(resp.into_reader())).map_err(|e| Error::fetch(url, e))?;
        feed.sort_newest_first();
        Ok(feed)
    }
}

impl Transport for Client {
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let resp = self.get(url).map_err(|e| Error::download(url, e))?;
        let part = part_path(dest);
        let written = File::create(&part).and_then(|mut file| {
            let n = io::copy(&mut resp.into_reader(), &mut file)?;
            file.sync_all()?;
            Ok(n)
        });
        match written.and_then(|n| fs::rename(&part, dest).map(|_| n)) {
            Ok(n) => Ok(n),
            Err(e) => {
                let _ = fs::remove_file(&part);
                Err(Error::download(url, e))
            }
        }
    }
}

/// `<dest>.part`, the in-flight name of a download.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}
