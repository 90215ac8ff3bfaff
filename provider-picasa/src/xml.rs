//! Scoped extraction over Atom feeds.
//!
//! Feeds are not parsed as full XML. Each `<entry>` span is located first and
//! named fields are then pulled out of that span only, so feed-level
//! elements such as the feed's own `<title>` never leak into an entry.

use bridge_traits::album::{RemoteAlbum, RemotePhoto};
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?s)<entry(?:\s[^>]*)?>(.*?)</entry>"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| compile(r"&(amp|quot|apos|lt|gt);"));
static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"([A-Za-z_][\w:.-]*)\s*=\s*(?:'([^']*)'|"([^"]*)")"#));

static TITLE: LazyLock<Regex> = LazyLock::new(|| element("title"));
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| element("summary"));
static UPDATED: LazyLock<Regex> = LazyLock::new(|| element("updated"));
static GPHOTO_ID: LazyLock<Regex> = LazyLock::new(|| element("gphoto:id"));
static GPHOTO_ALBUM_ID: LazyLock<Regex> = LazyLock::new(|| element("gphoto:albumid"));
static GPHOTO_ACCESS: LazyLock<Regex> = LazyLock::new(|| element("gphoto:access"));
static GPHOTO_WIDTH: LazyLock<Regex> = LazyLock::new(|| element("gphoto:width"));
static GPHOTO_HEIGHT: LazyLock<Regex> = LazyLock::new(|| element("gphoto:height"));
static LINK: LazyLock<Regex> = LazyLock::new(|| empty_element("link"));
static CONTENT: LazyLock<Regex> = LazyLock::new(|| empty_element("content"));

/// Size segment of feed content URLs and its full-resolution replacement.
const SIZED_SEGMENT: &str = "/s1600/";
const ORIGINAL_SEGMENT: &str = "/s0/";

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => unreachable!("invalid built-in pattern {pattern}: {e}"),
    }
}

/// `<tag attr='..'>text</tag>` capturing the text.
fn element(tag: &str) -> Regex {
    let tag = regex::escape(tag);
    compile(&format!(r"(?s)<{tag}(?:\s[^>]*)?>([^<]*)</{tag}>"))
}

/// `<tag attr='..'/>` or `<tag attr='..'>` capturing the attribute list.
fn empty_element(tag: &str) -> Regex {
    let tag = regex::escape(tag);
    compile(&format!(r"(?s)<{tag}(\s[^>]*?)/?>"))
}

/// Replace the five XML special characters with their entities.
pub fn encode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`encode_entities`]. Decodes in a single pass, so `&amp;lt;`
/// becomes `&lt;`, and leaves any other entity untouched.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| match &caps[1] {
            "amp" => "&",
            "quot" => "\"",
            "apos" => "'",
            "lt" => "<",
            _ => ">",
        })
        .into_owned()
}

/// Inner text of every `<entry>` in `feed`, in document order.
pub fn entries(feed: &str) -> Vec<&str> {
    ENTRY
        .captures_iter(feed)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

fn text_of(scope: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(scope)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
}

/// Attributes of every matching tag in `scope`, values entity-decoded.
fn attributes_of(scope: &str, pattern: &Regex) -> Vec<HashMap<String, String>> {
    pattern
        .captures_iter(scope)
        .filter_map(|caps| caps.get(1))
        .map(|attrs| {
            ATTRIBUTE
                .captures_iter(attrs.as_str())
                .filter_map(|a| {
                    let value = a.get(2).or_else(|| a.get(3))?;
                    Some((a[1].to_string(), decode_entities(value.as_str())))
                })
                .collect()
        })
        .collect()
}

/// `href` of the `<link>` whose `rel` equals `rel`.
fn link_href(scope: &str, rel: &str) -> Option<String> {
    attributes_of(scope, &LINK)
        .into_iter()
        .find(|attrs| attrs.get("rel").map(String::as_str) == Some(rel))
        .and_then(|mut attrs| attrs.remove("href"))
}

fn full_size_url(url: &str) -> Cow<'_, str> {
    if url.contains(SIZED_SEGMENT) {
        Cow::Owned(url.replacen(SIZED_SEGMENT, ORIGINAL_SEGMENT, 1))
    } else {
        Cow::Borrowed(url)
    }
}

pub fn parse_album(entry: &str) -> RemoteAlbum {
    RemoteAlbum {
        id: text_of(entry, &GPHOTO_ID),
        title: text_of(entry, &TITLE).unwrap_or_default(),
        summary: text_of(entry, &SUMMARY).unwrap_or_default(),
        access: text_of(entry, &GPHOTO_ACCESS).unwrap_or_default(),
        updated: text_of(entry, &UPDATED),
        edit_url: link_href(entry, "edit"),
    }
}

pub fn parse_photo(entry: &str) -> RemotePhoto {
    let content = attributes_of(entry, &CONTENT).into_iter().next();
    let (content_url, mime_type) = match content {
        Some(mut attrs) => (
            attrs.remove("src").map(|src| full_size_url(&src).into_owned()),
            attrs.remove("type"),
        ),
        None => (None, None),
    };

    RemotePhoto {
        id: text_of(entry, &GPHOTO_ID),
        album_id: text_of(entry, &GPHOTO_ALBUM_ID),
        title: text_of(entry, &TITLE).unwrap_or_default(),
        summary: text_of(entry, &SUMMARY).unwrap_or_default(),
        content_url,
        updated: text_of(entry, &UPDATED),
        mime_type,
        width: text_of(entry, &GPHOTO_WIDTH).and_then(|w| w.parse().ok()),
        height: text_of(entry, &GPHOTO_HEIGHT).and_then(|h| h.parse().ok()),
        edit_url: link_href(entry, "edit"),
        edit_media_url: link_href(entry, "edit-media"),
    }
}
