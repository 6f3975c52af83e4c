use clap::Parser;
use podcast_sync::{config::DEFAULT_CONFIG, get_client, sync, util, DEFAULT_TIMEOUT};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Download new podcast episodes from the feeds listed in a config file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML list of feeds (url, lasttime, titleoverride)
    #[arg(short, long, env = "PODCAST_SYNC_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Directory holding one sub-directory per podcast
    #[arg(short, long, env = "PODCAST_SYNC_ROOT", default_value = sync::DEFAULT_ROOT)]
    root: PathBuf,

    /// Downloads per feed per run, newest first
    #[arg(short, long, env = "PODCAST_SYNC_MAX_DOWNLOADS", default_value_t = sync::DEFAULT_MAX_DOWNLOADS)]
    max_downloads: usize,

    /// Connect and read timeout in seconds
    #[arg(long, env = "PODCAST_SYNC_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Write advanced watermarks back to the config file
    #[arg(long)]
    update_watermarks: bool,

    /// Exit with status 1 when any feed had an error
    #[arg(long)]
    fail_on_error: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _lg = match util::init_log(if args.verbose { "debug" } else { "info" }) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("can't start logger: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = sync::Settings {
        root: args.root,
        max_downloads: args.max_downloads,
        update_watermarks: args.update_watermarks,
    };
    let client = get_client(Duration::from_secs(args.timeout));

    match sync::run(&args.config, &settings, &client, &client) {
        Ok(report) if args.fail_on_error && report.has_errors() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
