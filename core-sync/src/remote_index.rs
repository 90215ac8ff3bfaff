//! Remote photos of the sync album, keyed by title.

use bridge_traits::album::RemotePhoto;
use std::collections::BTreeMap;
use tracing::debug;

const JPEG_MIME: &str = "image/jpeg";

/// Title under which a contact's photo is stored remotely.
pub fn canonical_title(prefix: &str, source_id: &str) -> String {
    format!("{prefix}{source_id}.jpg")
}

/// Title used before remote titles carried a prefix.
pub fn legacy_title(source_id: &str) -> String {
    format!("{source_id}.jpg")
}

/// Square JPEGs no larger than `max_dimension` on either side.
pub fn is_contact_photo(photo: &RemotePhoto, max_dimension: u32) -> bool {
    let (Some(width), Some(height)) = (photo.width, photo.height) else {
        return false;
    };
    photo.mime_type.as_deref() == Some(JPEG_MIME)
        && width == height
        && width <= max_dimension
}

#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    prefix: String,
    entries: BTreeMap<String, RemotePhoto>,
}

impl RemoteIndex {
    /// Index the photos that qualify as contact photos; others are ignored.
    pub fn build(photos: Vec<RemotePhoto>, prefix: &str, max_dimension: u32) -> Self {
        let mut entries = BTreeMap::new();
        for photo in photos {
            if !is_contact_photo(&photo, max_dimension) {
                debug!(title = %photo.title, "Ignoring remote photo that fails image requirements");
                continue;
            }
            entries.insert(photo.title.clone(), photo);
        }

        Self {
            prefix: prefix.to_string(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn title_for(&self, source_id: &str) -> String {
        canonical_title(&self.prefix, source_id)
    }

    pub fn get(&self, title: &str) -> Option<&RemotePhoto> {
        self.entries.get(title)
    }

    /// Title of an unadopted photo that belongs to the contact: first one
    /// named after the source id without the prefix, then one whose summary
    /// matches the display name ignoring case and surrounding whitespace.
    pub fn find_legacy(&self, source_id: &str, display_name: Option<&str>) -> Option<String> {
        let legacy = legacy_title(source_id);
        if self.entries.contains_key(&legacy) {
            return Some(legacy);
        }

        let name = display_name.map(|n| n.trim().to_lowercase())?;
        if name.is_empty() {
            return None;
        }

        self.entries
            .values()
            .filter(|photo| !photo.title.starts_with(&self.prefix))
            .find(|photo| photo.summary.trim().to_lowercase() == name)
            .map(|photo| photo.title.clone())
    }

    /// Replace whatever is stored under `previous_title` with `photo`.
    pub fn replace(&mut self, previous_title: &str, photo: RemotePhoto) {
        self.entries.remove(previous_title);
        self.entries.insert(photo.title.clone(), photo);
    }

    pub fn remove(&mut self, title: &str) -> Option<RemotePhoto> {
        self.entries.remove(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(title: &str, summary: &str, side: u32) -> RemotePhoto {
        let mut photo = RemotePhoto::new("album", title);
        photo.summary = summary.to_string();
        photo.mime_type = Some(JPEG_MIME.to_string());
        photo.width = Some(side);
        photo.height = Some(side);
        photo
    }

    #[test]
    fn titles_derive_from_source_id() {
        assert_eq!(canonical_title("acps-", "c9"), "acps-c9.jpg");
        assert_eq!(legacy_title("c9"), "c9.jpg");
    }

    #[test]
    fn filters_non_contact_photos() {
        let mut png = photo("acps-a.jpg", "", 100);
        png.mime_type = Some("image/png".into());
        let mut wide = photo("acps-b.jpg", "", 100);
        wide.width = Some(200);
        let big = photo("acps-c.jpg", "", 1024);
        let mut unsized_photo = photo("acps-d.jpg", "", 100);
        unsized_photo.height = None;
        let good = photo("acps-e.jpg", "", 720);

        let index = RemoteIndex::build(vec![png, wide, big, unsized_photo, good], "acps-", 720);

        assert_eq!(index.len(), 1);
        assert!(index.get("acps-e.jpg").is_some());
    }

    #[test]
    fn legacy_title_preferred_over_summary() {
        let index = RemoteIndex::build(
            vec![photo("c1.jpg", "Other", 96), photo("IMG_1.jpg", "Ada Lovelace", 96)],
            "acps-",
            720,
        );

        assert_eq!(index.find_legacy("c1", Some("Ada Lovelace")), Some("c1.jpg".into()));
    }

    #[test]
    fn summary_match_ignores_case_and_padding() {
        let index = RemoteIndex::build(vec![photo("IMG_1.jpg", " ada lovelace ", 96)], "acps-", 720);

        assert_eq!(
            index.find_legacy("c1", Some("Ada Lovelace")),
            Some("IMG_1.jpg".into())
        );
        assert_eq!(index.find_legacy("c1", Some("Grace Hopper")), None);
        assert_eq!(index.find_legacy("c1", None), None);
    }

    #[test]
    fn adopted_photos_are_not_matched_by_summary() {
        let index = RemoteIndex::build(vec![photo("acps-c2.jpg", "Ada Lovelace", 96)], "acps-", 720);

        assert_eq!(index.find_legacy("c1", Some("Ada Lovelace")), None);
    }

    #[test]
    fn replace_moves_entry_to_new_title() {
        let mut index = RemoteIndex::build(vec![photo("c1.jpg", "", 96)], "acps-", 720);
        let renamed = photo("acps-c1.jpg", "", 96);

        index.replace("c1.jpg", renamed);

        assert!(index.get("c1.jpg").is_none());
        assert!(index.get("acps-c1.jpg").is_some());
        assert_eq!(index.title_for("c1"), "acps-c1.jpg");
    }
}
