// backup-dav/src/webdav/multistatus.rs
//! Parser for `207 Multi-Status` PROPFIND bodies.
//!
//! Servers disagree on namespace prefixes (`d:`, `D:`, none), so elements
//! are matched on their local names only.

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::RemoteEntry;
use crate::errors::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Href,
    LastModified,
    ContentLength,
    Other,
}

#[derive(Default)]
struct PendingEntry {
    href: String,
    is_dir: bool,
    last_modified: Option<String>,
    size: Option<String>,
}

/// Parses a PROPFIND response into the children of `listed_path`.
///
/// The entry describing `listed_path` itself is dropped.
pub fn parse_listing(xml: &str, listed_path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<PendingEntry> = None;
    let mut field = Field::Other;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| RemoteError::Xml(format!("at byte {}: {}", reader.buffer_position(), e)))?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"response" => current = Some(PendingEntry::default()),
                b"href" => field = Field::Href,
                b"getlastmodified" => field = Field::LastModified,
                b"getcontentlength" => field = Field::ContentLength,
                b"collection" => mark_dir(&mut current),
                _ => field = Field::Other,
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"collection" {
                    mark_dir(&mut current);
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| RemoteError::Xml(e.to_string()))?;
                if let Some(entry) = current.as_mut() {
                    match field {
                        Field::Href => entry.href.push_str(&text),
                        Field::LastModified => entry.last_modified = Some(text.into_owned()),
                        Field::ContentLength => entry.size = Some(text.into_owned()),
                        Field::Other => {}
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"response" {
                    if let Some(entry) = current.take() {
                        entries.push(finish_entry(entry));
                    }
                }
                field = Field::Other;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let listed = trim_dir(listed_path);
    Ok(entries
        .into_iter()
        .filter(|entry| trim_dir(&entry.path) != listed && !entry.name.is_empty())
        .collect())
}

fn mark_dir(current: &mut Option<PendingEntry>) {
    if let Some(entry) = current.as_mut() {
        entry.is_dir = true;
    }
}

fn finish_entry(pending: PendingEntry) -> RemoteEntry {
    let path = href_path(&pending.href);
    let name = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    RemoteEntry {
        path,
        name,
        is_dir: pending.is_dir,
        last_modified: pending.last_modified.as_deref().and_then(parse_http_date),
        size: pending.size.and_then(|s| s.trim().parse().ok()),
    }
}

/// Hrefs may be absolute URLs or absolute paths; either way keep the
/// decoded path.
fn href_path(href: &str) -> String {
    let raw = match url::Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.trim().to_string(),
    };
    percent_decode_str(&raw).decode_utf8_lossy().into_owned()
}

fn trim_dir(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
