//! Public Atom release feed (`{web}/{owner}/{repo}/releases.atom`).
//!
//! Used for repositories the structured API cannot serve. Only the first
//! entry matters: its `id` ends with the tag, `updated` is the publish
//! instant and `media:thumbnail` carries the author avatar.

use chrono::DateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::StatusCode;

use crate::error::FetchError;
use crate::http::{HttpResponse, classify_status};
use crate::model::{FetchMethod, ReleaseSnapshot};

pub const FEED_ACCEPT: &str = "application/atom+xml";

pub fn feed_url(web_url: &str, snapshot: &ReleaseSnapshot) -> String {
    format!(
        "{}/{}/{}/releases.atom",
        web_url, snapshot.name.owner, snapshot.name.repo
    )
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: Option<String>,
    pub updated: Option<String>,
    pub thumbnail: Option<String>,
}

impl FeedEntry {
    /// Tag is the last `/`-separated segment of the entry id,
    /// e.g. `tag:github.com,2008:Repository/1296269/v1.0.0`.
    pub fn tag(&self) -> Option<&str> {
        let id = self.id.as_deref()?;
        let i = id.rfind('/')?;
        Some(&id[i + 1..]).filter(|t| !t.is_empty())
    }

    pub fn published_at(&self) -> Option<i64> {
        let updated = self.updated.as_deref()?;
        DateTime::parse_from_rfc3339(updated)
            .ok()
            .map(|t| t.timestamp_millis())
    }
}

#[derive(Clone, Copy)]
enum Field {
    Id,
    Updated,
}

/// Reads the first `<entry>` of an Atom document.
///
/// Returns `Ok(None)` for a well-formed feed with no entries.
pub fn parse_first_entry(xml: &str) -> Result<Option<FeedEntry>, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut saw_feed = false;
    let mut in_entry = false;
    let mut field: Option<Field> = None;
    let mut entry = FeedEntry::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"feed" => saw_feed = true,
                b"entry" => in_entry = true,
                b"id" if in_entry => field = Some(Field::Id),
                b"updated" if in_entry => field = Some(Field::Updated),
                b"thumbnail" if in_entry => entry.thumbnail = url_attribute(&e)?,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_entry && e.local_name().as_ref() == b"thumbnail" {
                    entry.thumbnail = url_attribute(&e)?;
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(f) = field {
                    let text = t
                        .unescape()
                        .map_err(|e| FetchError::Parse(e.to_string()))?
                        .into_owned();
                    match f {
                        Field::Id => entry.id = Some(text),
                        Field::Updated => entry.updated = Some(text),
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"entry" => return Ok(Some(entry)),
                b"id" | b"updated" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FetchError::Parse(format!(
                    "feed error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if !saw_feed {
        return Err(FetchError::Parse("document is not an Atom feed".into()));
    }
    Ok(None)
}

fn url_attribute(e: &BytesStart<'_>) -> Result<Option<String>, FetchError> {
    let attr = e
        .try_get_attribute("url")
        .map_err(|e| FetchError::Parse(e.to_string()))?;
    match attr {
        Some(a) => Ok(Some(
            a.unescape_value()
                .map_err(|e| FetchError::Parse(e.to_string()))?
                .into_owned(),
        )),
        None => Ok(None),
    }
}

/// Turns one feed response into the next snapshot for `previous`.
pub fn snapshot_from_response(
    previous: &ReleaseSnapshot,
    response: HttpResponse,
    web_url: &str,
) -> Result<ReleaseSnapshot, FetchError> {
    match response.status {
        StatusCode::NOT_FOUND => Ok(previous.without_release(FetchMethod::Feed, web_url)),
        s if s.is_success() => match parse_first_entry(&response.body)? {
            None => Ok(previous.without_release(FetchMethod::Feed, web_url)),
            Some(entry) => Ok(snapshot_from_entry(previous, &entry, web_url)),
        },
        s => Err(classify_status(
            s,
            response.rate_limit_remaining,
            &response.body,
        )),
    }
}

fn snapshot_from_entry(previous: &ReleaseSnapshot, entry: &FeedEntry, web_url: &str) -> ReleaseSnapshot {
    let tag_name = entry
        .tag()
        .map(str::to_string)
        .unwrap_or_else(|| previous.tag_name.clone());

    let (zipball_url, tarball_url) = if tag_name.is_empty() {
        (String::new(), String::new())
    } else {
        let base = format!("{}/{}/archive/{}", web_url, previous.name, tag_name);
        (format!("{}.zip", base), format!("{}.tar.gz", base))
    };

    ReleaseSnapshot {
        name: previous.name.clone(),
        watching: previous.watching,
        method: FetchMethod::Feed,
        etag: String::new(),
        last_modified: String::new(),
        avatar_url: entry
            .thumbnail
            .clone()
            .unwrap_or_else(|| previous.avatar_url_or_default()),
        author_url: previous.author_url_or_default(web_url),
        html_url: previous.html_url_or_default(web_url),
        published_at: entry.published_at().unwrap_or(previous.published_at),
        tag_name,
        zipball_url,
        tarball_url,
        assets: Vec::new(),
    }
}
