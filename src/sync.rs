use crate::client::{Fetcher, Transport};
use crate::config::{load_feeds, save_feeds};
use crate::entity::FeedDefinition;
use crate::error::{Error, Result};
use crate::store::{ensure_directory, filter_existing};
use crate::util::select_new;
use log::{error, info};
use simple_error::SimpleError;
use std::path::{Path, PathBuf};

pub const DEFAULT_ROOT: &str = "/podcasts";
pub const DEFAULT_MAX_DOWNLOADS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base directory holding one sub-directory per feed.
    pub root: PathBuf,
    /// Downloads attempted per feed per run.
    pub max_downloads: usize,
    pub update_watermarks: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            root: PathBuf::from(DEFAULT_ROOT),
            max_downloads: DEFAULT_MAX_DOWNLOADS,
            update_watermarks: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedReport {
    pub url: String,
    pub title: String,
    /// Episodes at or after the watermark.
    pub selected: usize,
    /// Selected episodes already on disk.
    pub skipped: usize,
    pub downloaded: usize,
    /// Pending episodes left for a later run by the per-feed cap.
    pub deferred: usize,
    pub errors: usize,
    /// Watermark to record for this feed after the run.
    pub watermark: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunReport {
    pub feeds: Vec<FeedReport>,
    pub persist_failed: bool,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.persist_failed || self.feeds.iter().any(|f| f.errors > 0)
    }
}

/// Fetch, select, gate and download one feed. Every failure is logged and
/// counted in the report; nothing here aborts the caller's loop.
pub fn sync_feed(
    def: &FeedDefinition,
    fetcher: &impl Fetcher,
    transport: &impl Transport,
    settings: &Settings,
) -> FeedReport {
    let mut report = FeedReport {
        url: def.url.clone(),
        title: def.url.clone(),
        watermark: def.watermark,
        ..Default::default()
    };

    let feed = match fetcher.fetch_feed(&def.url) {
        Ok(feed) => feed,
        Err(e) => {
            error!("{}", e);
            report.errors += 1;
            return report;
        }
    };
    let title = def
        .title_override()
        .map(str::to_string)
        .unwrap_or(feed.title);
    if title.trim().is_empty() {
        error!(
            "{}",
            Error::fetch(&def.url, SimpleError::new("feed has no title"))
        );
        report.errors += 1;
        return report;
    }
    report.title = title;

    let dir = match ensure_directory(&settings.root, &report.title) {
        Ok(dir) => dir,
        Err(e) => {
            error!("{}", e);
            report.errors += 1;
            return report;
        }
    };

    let episodes = select_new(&feed.items, def.watermark, &dir);
    report.selected = episodes.len();

    info!("Found {} episodes for {}", episodes.len(), report.title);
    let pending = filter_existing(episodes.clone());
    report.skipped = episodes.len() - pending.len();
    info!("Skipping {} episodes that already exist", report.skipped);
    report.deferred = pending.len().saturating_sub(settings.max_downloads);

    for ep in pending.iter().take(settings.max_downloads) {
        info!("Downloading {}", ep.name);
        match transport.download(&ep.url, &ep.path) {
            Ok(bytes) => {
                log::debug!("wrote {} bytes to {}", bytes, ep.path.display());
                report.downloaded += 1;
            }
            Err(e) => {
                error!("Error getting episode {}: {}", ep.name, e);
                report.errors += 1;
            }
        }
    }

    // advancing past deferred or failed episodes would lose them for good
    if report.errors == 0 && report.deferred == 0 {
        if let Some(newest) = episodes.iter().map(|e| e.timestamp).max() {
            report.watermark = report.watermark.max(newest);
        }
    }
    report
}

/// One pass over every configured feed. Only an unreadable config fails the run.
pub fn run(
    config: &Path,
    settings: &Settings,
    fetcher: &impl Fetcher,
    transport: &impl Transport,
) -> Result<RunReport> {
    let mut defs = load_feeds(config)?;
    info!("Loaded {} feeds from {}", defs.len(), config.display());

    let mut report = RunReport::default();
    for def in &defs {
        let feed = sync_feed(def, fetcher, transport, settings);
        info!(
            "{}: {} selected, {} skipped, {} downloaded, {} deferred, {} errors",
            feed.title, feed.selected, feed.skipped, feed.downloaded, feed.deferred, feed.errors
        );
        report.feeds.push(feed);
    }

    if settings.update_watermarks {
        let mut changed = false;
        for (def, feed) in defs.iter_mut().zip(&report.feeds) {
            if feed.watermark != def.watermark {
                info!(
                    "{}: watermark {} -> {}",
                    feed.title, def.watermark, feed.watermark
                );
                def.watermark = feed.watermark;
                changed = true;
            }
        }
        if changed {
            if let Err(e) = save_feeds(config, &defs) {
                error!("{}", e);
                report.persist_failed = true;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Feed, Item};
    use crate::util::test_log;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;

    #[derive(Default)]
    struct FakeFetcher {
        feeds: HashMap<String, Feed>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn with(mut self, url: &str, title: &str, stamps: &[i64]) -> Self {
            let items = stamps
                .iter()
                .map(|&t| Item {
                    title: format!("ep {}", t),
                    url: format!("http://cdn.example.com/{}.mp3", t),
                    timestamp: t,
                })
                .collect();
            self.feeds.insert(
                url.to_string(),
                Feed {
                    title: title.to_string(),
                    items,
                },
            );
            self
        }
    }

    impl Fetcher for FakeFetcher {
        fn fetch_feed(&self, url: &str) -> Result<Feed> {
            self.calls.borrow_mut().push(url.to_string());
            self.feeds
                .get(url)
                .cloned()
                .ok_or_else(|| Error::fetch(url, "connection refused"))
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        fail: Vec<String>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl Transport for FakeTransport {
        fn download(&self, url: &str, dest: &Path) -> Result<u64> {
            self.calls.borrow_mut().push(url.to_string());
            if self.fail.iter().any(|f| f == url) {
                return Err(Error::download(url, "connection reset"));
            }
            fs::write(dest, url).map_err(|e| Error::download(url, e))?;
            Ok(url.len() as u64)
        }
    }

    fn def(url: &str, watermark: i64) -> FeedDefinition {
        FeedDefinition {
            url: url.to_string(),
            watermark,
            title_override: None,
        }
    }

    fn settings(root: &Path, max_downloads: usize) -> Settings {
        Settings {
            root: root.to_path_buf(),
            max_downloads,
            update_watermarks: false,
        }
    }

    fn ep_url(t: i64) -> String {
        format!("http://cdn.example.com/{}.mp3", t)
    }

    #[test]
    fn older_item_halts_selection() {
        test_log();
        let root = tempfile::tempdir().expect("tempdir failed");
        let fetcher = FakeFetcher::default().with("f1", "Show", &[2000, 1500, 500]);
        let transport = FakeTransport::default();

        let report = sync_feed(&def("f1", 1000), &fetcher, &transport, &settings(root.path(), 10));
        assert_eq!(report.selected, 2);
        assert_eq!(report.downloaded, 2);
        assert_eq!(transport.calls(), vec![ep_url(2000), ep_url(1500)]);
        assert!(root.path().join("Show/ep 2000.mp3").is_file());
        assert!(!root.path().join("Show/ep 500.mp3").exists());
        assert_eq!(report.watermark, 2000);
    }

    #[test]
    fn cap_keeps_newest() {
        let root = tempfile::tempdir().expect("tempdir failed");
        let fetcher = FakeFetcher::default().with("f1", "Show", &[30, 20, 10]);
        let transport = FakeTransport::default();

        let report = sync_feed(&def("f1", 0), &fetcher, &transport, &settings(root.path(), 1));
        assert_eq!(transport.calls(), vec![ep_url(30)]);
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.deferred, 2);
        // deferred episodes keep the watermark where it was
        assert_eq!(report.watermark, 0);
    }

    #[test]
    fn existing_file_is_never_downloaded() {
        let root = tempfile::tempdir().expect("tempdir failed");
        fs::create_dir(root.path().join("Show")).expect("mkdir failed");
        fs::write(root.path().join("Show/ep 20.mp3"), b"old").expect("write failed");
        let fetcher = FakeFetcher::default().with("f1", "Show", &[30, 20, 10]);
        let transport = FakeTransport::default();

        let report = sync_feed(&def("f1", 0), &fetcher, &transport, &settings(root.path(), 10));
        assert_eq!(report.skipped, 1);
        assert_eq!(transport.calls(), vec![ep_url(30), ep_url(10)]);
        assert_eq!(
            fs::read(root.path().join("Show/ep 20.mp3")).expect("read failed"),
            b"old"
        );
    }

    #[test]
    fn second_pass_downloads_nothing() {
        let root = tempfile::tempdir().expect("tempdir failed");
        let fetcher = FakeFetcher::default().with("f1", "Show", &[30, 20]);
        let transport = FakeTransport::default();
        let s = settings(root.path(), 10);

        sync_feed(&def("f1", 0), &fetcher, &transport, &s);
        let again = sync_feed(&def("f1", 0), &fetcher, &transport, &s);
        assert_eq!(again.skipped, 2);
        assert_eq!(again.downloaded, 0);
        assert_eq!(transport.calls().len(), 2);
    }

    #[test]
    fn failed_fetch_moves_on() {
        test_log();
        let root = tempfile::tempdir().expect("tempdir failed");
        let dir = tempfile::tempdir().expect("tempdir failed");
        let config = dir.path().join("config.yaml");
        fs::write(&config, "- url: down\n- url: f2\n").expect("write failed");
        let fetcher = FakeFetcher::default().with("f2", "Second", &[5]);
        let transport = FakeTransport::default();

        let report = run(&config, &settings(root.path(), 10), &fetcher, &transport)
            .expect("run failed");
        assert_eq!(*fetcher.calls.borrow(), vec!["down", "f2"]);
        assert_eq!(report.feeds[0].errors, 1);
        assert_eq!(report.feeds[1].downloaded, 1);
        assert!(report.has_errors());
        assert!(root.path().join("Second/ep 5.mp3").is_file());
    }

    #[test]
    fn failed_episode_moves_on() {
        let root = tempfile::tempdir().expect("tempdir failed");
        let fetcher = FakeFetcher::default().with("f1", "Show", &[30, 20, 10]);
        let transport = FakeTransport {
            fail: vec![ep_url(20)],
            ..Default::default()
        };

        let report = sync_feed(&def("f1", 0), &fetcher, &transport, &settings(root.path(), 10));
        assert_eq!(transport.calls().len(), 3);
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.watermark, 0);
    }

    #[test]
    fn title_override_names_directory() {
        let root = tempfile::tempdir().expect("tempdir failed");
        let fetcher = FakeFetcher::default().with("f1", "Feed Title", &[7]);
        let transport = FakeTransport::default();
        let mut d = def("f1", 0);
        d.title_override = Some("Mine".to_string());

        let report = sync_feed(&d, &fetcher, &transport, &settings(root.path(), 10));
        assert_eq!(report.title, "Mine");
        assert!(root.path().join("Mine/ep 7.mp3").is_file());
        assert!(!root.path().join("Feed Title").exists());
    }

    #[test]
    fn untitled_feed_is_an_error() {
        let root = tempfile::tempdir().expect("tempdir failed");
        let fetcher = FakeFetcher::default().with("f1", "  ", &[7]);
        let transport = FakeTransport::default();

        let report = sync_feed(&def("f1", 0), &fetcher, &transport, &settings(root.path(), 10));
        assert_eq!(report.errors, 1);
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn title_cannot_escape_root() {
        let base = tempfile::tempdir().expect("tempdir failed");
        let root = base.path().join("root");
        fs::create_dir(&root).expect("mkdir failed");
        let fetcher = FakeFetcher::default()
            .with("f1", "???", &[7])
            .with("f2", "..", &[8])
            .with("f3", "Fine", &[9]);
        let transport = FakeTransport::default();
        let s = settings(&root, 10);

        let mut over = def("f3", 0);
        over.title_override = Some("..".to_string());
        for d in &[def("f1", 0), def("f2", 0), over] {
            let report = sync_feed(d, &fetcher, &transport, &s);
            assert_eq!(report.errors, 1, "{}", d.url);
            assert_eq!(report.downloaded, 0);
        }
        assert!(transport.calls().is_empty());
        assert_eq!(fs::read_dir(&root).expect("readdir failed").count(), 0);
        assert_eq!(fs::read_dir(base.path()).expect("readdir failed").count(), 1);
    }

    #[test]
    fn missing_root_skips_downloads() {
        let root = tempfile::tempdir().expect("tempdir failed");
        let fetcher = FakeFetcher::default().with("f1", "Show", &[7]);
        let transport = FakeTransport::default();

        let s = settings(&root.path().join("absent"), 10);
        let report = sync_feed(&def("f1", 0), &fetcher, &transport, &s);
        assert_eq!(report.errors, 1);
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn unreadable_config_fails_the_run() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let fetcher = FakeFetcher::default();
        let transport = FakeTransport::default();
        let err = run(
            &dir.path().join("missing.yaml"),
            &settings(dir.path(), 10),
            &fetcher,
            &transport,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(fetcher.calls.borrow().is_empty());
    }

    #[test]
    fn watermarks_written_back() {
        let root = tempfile::tempdir().expect("tempdir failed");
        let dir = tempfile::tempdir().expect("tempdir failed");
        let config = dir.path().join("config.yaml");
        fs::write(
            &config,
            "- url: f1\n  lasttime: 100\n- url: f2\n  lasttime: 100\n",
        )
        .expect("write failed");
        let fetcher = FakeFetcher::default()
            .with("f1", "One", &[300, 200, 50])
            .with("f2", "Two", &[900, 800]);
        let transport = FakeTransport::default();
        let mut s = settings(root.path(), 1);
        s.update_watermarks = true;

        let report = run(&config, &s, &fetcher, &transport).expect("run failed");
        assert!(!report.has_errors());
        let saved = load_feeds(&config).expect("reload failed");
        // f1 deferred one episode under the cap, f2 as well
        assert_eq!(saved[0].watermark, 100);
        assert_eq!(saved[1].watermark, 100);

        s.max_downloads = 10;
        run(&config, &s, &fetcher, &transport).expect("second run failed");
        let saved = load_feeds(&config).expect("reload failed");
        assert_eq!(saved[0].watermark, 300);
        assert_eq!(saved[1].watermark, 900);
        assert_eq!(transport.calls().len(), 4);
    }
}
