pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod model;
pub mod parser;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};

use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// default impl of the feed fetcher and episode transport
pub fn get_client(timeout: Duration) -> client::Client {
    client::Client::new(timeout)
}
