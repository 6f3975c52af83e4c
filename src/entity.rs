use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One subscribed feed as listed in the config file.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct FeedDefinition {
    pub url: String,
    #[serde(rename = "lasttime", default)]
    pub watermark: i64,
    #[serde(
        rename = "titleoverride",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub title_override: Option<String>,
}

impl FeedDefinition {
    pub fn title_override(&self) -> Option<&str> {
        self.title_override
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Episode {
    pub name: String,
    pub url: String,
    pub timestamp: i64,
    pub path: PathBuf,
}
