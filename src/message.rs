//! Fetched messages and their normalized headers.

use std::collections::hash_map::{self, HashMap};

use chrono::DateTime;
use mailparse::{addrparse_header, MailAddr, MailHeader, MailHeaderMap, SingleInfo};

use crate::error::{Error, Result};
use crate::types::{Envelope, Fetch, Flag, Uid};

/// Headers rendered as `name <addr>` lists.
pub const ADDRESS_FIELDS: [&str; 4] = ["from", "to", "cc", "reply-to"];
/// Headers taken from the envelope; always present, possibly empty.
pub const ENVELOPE_FIELDS: [&str; 3] = ["subject", "date", "message-id"];

/// The value of one header. A header that occurs more than once on a message becomes
/// [`HeaderValue::Multi`], in the order the occurrences were seen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderValue {
    pub fn values(&self) -> &[String] {
        match self {
            HeaderValue::Single(value) => std::slice::from_ref(value),
            HeaderValue::Multi(values) => values,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(first) => {
                let first = std::mem::take(first);
                *self = HeaderValue::Multi(vec![first, value]);
            }
            HeaderValue::Multi(values) => values.push(value),
        }
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Single(value)
    }
}

impl<'a> From<&'a str> for HeaderValue {
    fn from(value: &'a str) -> Self {
        HeaderValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(values: Vec<String>) -> Self {
        HeaderValue::Multi(values)
    }
}

impl<'a> From<Vec<&'a str>> for HeaderValue {
    fn from(values: Vec<&'a str>) -> Self {
        HeaderValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Header name to value, keyed by lower-cased name. Lookups are case-insensitive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap(HashMap<String, HeaderValue>);

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap::default()
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.0.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets a header, replacing any previous value.
    pub fn insert(&mut self, name: &str, value: impl Into<HeaderValue>) {
        self.0.insert(name.to_lowercase(), value.into());
    }

    /// Adds one more occurrence of a header.
    pub fn append(&mut self, name: &str, value: String) {
        match self.0.entry(name.to_lowercase()) {
            hash_map::Entry::Occupied(mut entry) => entry.get_mut().push(value),
            hash_map::Entry::Vacant(entry) => {
                entry.insert(HeaderValue::Single(value));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, HeaderValue> {
        self.0.iter()
    }
}

impl<K: AsRef<str>, V: Into<HeaderValue>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in iter {
            map.insert(name.as_ref(), value);
        }
        map
    }
}

/// A message as seen by the rule matcher. Lives for one evaluation round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub uid: Uid,
    pub flags: Vec<Flag>,
    pub envelope: Envelope,
    pub headers: HeaderMap,
}

impl Message {
    /// Builds a message from a `UID FLAGS ENVELOPE BODY[HEADER]` fetch.
    pub fn from_fetch(fetch: Fetch) -> Result<Message> {
        let uid = fetch
            .uid
            .ok_or_else(|| Error::Unexpected(format!("no UID for message {}", fetch.message)))?;
        let raw = fetch
            .header
            .ok_or_else(|| Error::Unexpected(format!("no header section for UID {}", uid)))?;
        let envelope = fetch.envelope.unwrap_or_default();
        let headers = parse_message_headers(&raw, &envelope)?;
        Ok(Message {
            uid,
            flags: fetch.flags,
            envelope,
            headers,
        })
    }
}

/// Normalizes a raw header block.
///
/// Address fields become lower-cased `name <addr>` lists; subject, date and message-id come
/// from the envelope, falling back to the header block; every other header is kept with its
/// lower-cased value.
pub fn parse_message_headers(raw: &[u8], envelope: &Envelope) -> Result<HeaderMap> {
    let (fields, _) = mailparse::parse_headers(raw)?;
    let mut headers = HeaderMap::new();

    for name in ADDRESS_FIELDS {
        if let Some(value) = address_field(&fields, name)? {
            headers.insert(name, value);
        }
    }

    let subject = fields
        .get_first_value("subject")
        .or_else(|| envelope.subject.clone())
        .unwrap_or_default();
    headers.insert("subject", subject.trim().to_lowercase());

    let date = envelope
        .date
        .clone()
        .or_else(|| fields.get_first_value("date"))
        .map(|d| normalize_date(&d))
        .unwrap_or_default();
    headers.insert("date", date.to_lowercase());

    let message_id = envelope
        .message_id
        .clone()
        .or_else(|| fields.get_first_value("message-id"))
        .unwrap_or_default();
    headers.insert("message-id", message_id.trim().to_lowercase());

    for field in &fields {
        let name = field.get_key().to_lowercase();
        if ADDRESS_FIELDS.contains(&name.as_str()) || ENVELOPE_FIELDS.contains(&name.as_str()) {
            continue;
        }
        headers.append(&name, field.get_value().to_lowercase());
    }

    Ok(headers)
}

fn normalize_date(value: &str) -> String {
    match DateTime::parse_from_rfc2822(value.trim()) {
        Ok(date) => date.format("%Y-%m-%d %H:%M:%S %z").to_string(),
        Err(_) => value.trim().to_string(),
    }
}

fn render(info: &SingleInfo) -> String {
    let name = info.display_name.as_deref().unwrap_or("");
    format!("{} <{}>", name, info.addr).trim().to_lowercase()
}

/// Renders the first occurrence of an address header. `None` when absent or empty.
fn address_field(fields: &[MailHeader<'_>], name: &str) -> Result<Option<String>> {
    let header = match fields.get_first_header(name) {
        Some(header) => header,
        None => return Ok(None),
    };
    let verbatim = header.get_value().trim().to_lowercase();
    if verbatim.is_empty() {
        return Ok(None);
    }

    let list = match addrparse_header(header) {
        Ok(list) => list,
        Err(_) if !verbatim.contains('@') => return Ok(Some(verbatim)),
        Err(e) => return Err(Error::HeaderParse(e)),
    };

    let mut rendered = Vec::new();
    for addr in list.iter() {
        match addr {
            MailAddr::Single(info) => rendered.push(info),
            MailAddr::Group(group) => rendered.extend(group.addrs.iter()),
        }
    }
    if rendered.is_empty() || rendered.iter().any(|info| !info.addr.contains('@')) {
        return Ok(Some(verbatim));
    }

    Ok(Some(
        rendered
            .into_iter()
            .map(render)
            .collect::<Vec<_>>()
            .join(", "),
    ))
}
