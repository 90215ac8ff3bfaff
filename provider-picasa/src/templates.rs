//! Atom documents sent on create and update.

use bridge_traits::album::{RemoteAlbum, RemotePhoto};

use crate::xml::encode_entities;

const ENTRY_OPEN: &str = "<entry xmlns='http://www.w3.org/2005/Atom' \
    xmlns:media='http://search.yahoo.com/mrss/' \
    xmlns:gphoto='http://schemas.google.com/photos/2007'>";
const KIND_SCHEME: &str = "http://schemas.google.com/g/2005#kind";
const ALBUM_KIND: &str = "http://schemas.google.com/photos/2007#album";
const PHOTO_KIND: &str = "http://schemas.google.com/photos/2007#photo";

fn push_element(doc: &mut String, tag: &str, value: &str) {
    doc.push_str(&format!("<{tag}>{}</{tag}>", encode_entities(value)));
}

fn push_text(doc: &mut String, tag: &str, value: &str) {
    doc.push_str(&format!(
        "<{tag} type='text'>{}</{tag}>",
        encode_entities(value)
    ));
}

fn push_kind(doc: &mut String, kind: &str) {
    doc.push_str(&format!(
        "<category scheme='{KIND_SCHEME}' term='{kind}'></category>"
    ));
}

/// Album entry; includes `gphoto:id` when the album already exists.
pub(crate) fn album_entry(album: &RemoteAlbum, timestamp_millis: i64) -> String {
    let mut doc = String::from(ENTRY_OPEN);
    if let Some(id) = &album.id {
        push_element(&mut doc, "gphoto:id", id);
    }
    push_text(&mut doc, "title", &album.title);
    push_text(&mut doc, "summary", &album.summary);
    push_element(&mut doc, "gphoto:access", &album.access);
    push_element(&mut doc, "gphoto:timestamp", &timestamp_millis.to_string());
    push_kind(&mut doc, ALBUM_KIND);
    doc.push_str("</entry>");
    doc
}

/// Photo entry; includes `gphoto:id` and `gphoto:albumid` when updating.
pub(crate) fn photo_entry(photo: &RemotePhoto, timestamp_millis: i64) -> String {
    let mut doc = String::from(ENTRY_OPEN);
    if let Some(id) = &photo.id {
        push_element(&mut doc, "gphoto:id", id);
        if let Some(album_id) = &photo.album_id {
            push_element(&mut doc, "gphoto:albumid", album_id);
        }
    }
    push_text(&mut doc, "title", &photo.title);
    push_text(&mut doc, "summary", &photo.summary);
    push_element(&mut doc, "gphoto:timestamp", &timestamp_millis.to_string());
    push_kind(&mut doc, PHOTO_KIND);
    doc.push_str("</entry>");
    doc
}
