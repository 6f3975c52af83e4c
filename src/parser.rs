use crate::error::BoxError;
use crate::model::{Feed, Item};
use chrono::DateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use simple_error::SimpleError;
use std::io::BufRead;

/// Parse an RSS 2.0 or Atom document into its title and items, in document order.
pub fn parse_feed<R: BufRead>(r: R) -> Result<Feed, BoxError> {
    let mut reader = Reader::from_reader(r);
    reader.config_mut().trim_text(true);

    let mut feed = Feed::default();
    let mut found_root = false;
    let mut title: Option<String> = None;
    let mut current: Option<ItemBuilder> = None;
    let mut state: Option<ParseState> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                match e.name().as_ref() {
                    b"channel" | b"feed" => found_root = true,
                    b"item" | b"entry" => current = Some(ItemBuilder::default()),
                    _ => {}
                }
                if let Some(item) = current.as_mut() {
                    item.attach(&e);
                }
                state = ParseState::of(e.name().as_ref());
                text.clear();
            }
            Event::Empty(e) => {
                if let Some(item) = current.as_mut() {
                    item.attach(&e);
                }
            }
            Event::Text(e) => {
                if state.is_some() {
                    match (e.unescape(), current.as_mut()) {
                        (Ok(t), _) => text.push_str(&t),
                        (Err(err), Some(item)) => item.reject(err.into()),
                        (Err(err), None) => {
                            log::warn!("keeping feed text with bad escape as is: {}", err);
                            text.push_str(&String::from_utf8_lossy(&e));
                        }
                    }
                }
            }
            Event::CData(e) => {
                if state.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => {
                let name = e.name();
                if let Some(st) = state.take() {
                    let value = std::mem::take(&mut text);
                    match current.as_mut() {
                        Some(item) => st.fill(item, value),
                        None if st == ParseState::Title && title.is_none() => {
                            title = Some(value)
                        }
                        None => {}
                    }
                }
                if matches!(name.as_ref(), b"item" | b"entry") {
                    if let Some(item) = current.take().and_then(ItemBuilder::build) {
                        feed.items.push(item);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if !found_root {
        return Err(SimpleError::new("document has no channel or feed element").into());
    }
    feed.title = title.unwrap_or_default().trim().to_string();
    Ok(feed)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParseState {
    Title,
    PubDate,
    Updated,
}

impl ParseState {
    fn of(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(ParseState::Title),
            b"pubDate" | b"published" => Some(ParseState::PubDate),
            b"updated" => Some(ParseState::Updated),
            _ => None,
        }
    }

    fn fill(&self, item: &mut ItemBuilder, value: String) {
        match self {
            ParseState::Title => item.title = Some(value),
            ParseState::PubDate => item.published = Some(value),
            ParseState::Updated => item.updated = Some(value),
        }
    }
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: Option<String>,
    url: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    error: Option<BoxError>,
}

impl ItemBuilder {
    fn reject(&mut self, err: BoxError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn attach(&mut self, e: &BytesStart) {
        if let Err(err) = self.enclosure(e) {
            self.reject(err);
        }
    }

    // <enclosure url=".."/> in RSS, <link rel="enclosure" href=".."/> in Atom
    fn enclosure(&mut self, e: &BytesStart) -> Result<(), BoxError> {
        if self.url.is_some() {
            return Ok(());
        }
        let key: &[u8] = match e.name().as_ref() {
            b"enclosure" => &b"url"[..],
            b"link" => &b"href"[..],
            _ => return Ok(()),
        };
        let mut url = None;
        let mut is_enclosure = e.name().as_ref() == b"enclosure";
        for attr in e.attributes() {
            let attr = attr?;
            match attr.key.as_ref() {
                k if k == key => url = Some(attr.unescape_value()?.trim().to_string()),
                b"rel" => is_enclosure = attr.unescape_value()? == "enclosure",
                _ => {}
            }
        }
        if is_enclosure {
            self.url = url.filter(|u| !u.is_empty());
        }
        Ok(())
    }

    fn build(self) -> Option<Item> {
        let title = self.title.unwrap_or_default();
        if let Some(err) = self.error {
            log::warn!("skipping malformed item {:?}: {}", title, err);
            return None;
        }
        let url = match self.url {
            Some(url) => url,
            None => {
                log::debug!("skipping item without enclosure: {}", title);
                return None;
            }
        };
        let date = self.published.or(self.updated).unwrap_or_default();
        let timestamp = match to_timestamp(&date) {
            Some(t) => t,
            None => {
                log::warn!("skipping item with unusable date {:?}: {}", date, title);
                return None;
            }
        };
        let title = match title.trim() {
            "" => url_stem(&url).to_string(),
            t => t.to_string(),
        };
        Some(Item {
            title,
            url,
            timestamp,
        })
    }
}

/// Unix timestamp of an RFC 2822 (RSS) or RFC 3339 (Atom) date.
pub fn to_timestamp(date: &str) -> Option<i64> {
    let date = date.trim();
    DateTime::parse_from_rfc2822(date)
        .or_else(|_| DateTime::parse_from_rfc3339(date))
        .map(|d| d.timestamp())
        .ok()
}

fn url_stem(url: &str) -> &str {
    let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    let segment = url[..end].rsplit('/').next().unwrap_or_default();
    match segment.rfind('.') {
        Some(0) | None => segment,
        Some(dot) => &segment[..dot],
    }
}
