//! Remote Photo Album Abstraction
//!
//! Describes the hosted album service the sync engine mirrors contact photos
//! into. Implementations live in provider crates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::{DynAsyncWrite, UploadBody};

/// An album on the remote photo service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlbum {
    /// Service-assigned identifier, `None` until the album is created.
    pub id: Option<String>,
    pub title: String,
    pub summary: String,
    /// Visibility level, e.g. `protected` or `public`.
    pub access: String,
    /// Opaque version stamp of the last modification.
    pub updated: Option<String>,
    /// URL used to update the album's metadata.
    pub edit_url: Option<String>,
}

/// A photo entry inside a remote album.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePhoto {
    pub id: Option<String>,
    pub album_id: Option<String>,
    pub title: String,
    pub summary: String,
    /// URL serving the binary image.
    pub content_url: Option<String>,
    /// Opaque version stamp, compared against the stored sync marker.
    pub updated: Option<String>,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// URL used for metadata-only updates.
    pub edit_url: Option<String>,
    /// URL used when replacing the binary image.
    pub edit_media_url: Option<String>,
}

impl RemotePhoto {
    /// A photo not yet known to the service.
    pub fn new(album_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            album_id: Some(album_id.into()),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// CRUD and binary transfer against a remote album service.
///
/// Errors follow a fixed contract: credential rejection surfaces as
/// [`BridgeError::Unauthorized`](crate::BridgeError::Unauthorized) on every
/// operation, vanished content during download as
/// [`BridgeError::NotFound`](crate::BridgeError::NotFound), and all other
/// failures as I/O or HTTP status errors.
#[async_trait]
pub trait PhotoAlbumProvider: Send + Sync {
    /// List every album owned by the authenticated user.
    async fn list_albums(&self) -> Result<Vec<RemoteAlbum>>;

    /// Fetch one album. A missing album is `Ok(None)`.
    async fn get_album(&self, id: &str) -> Result<Option<RemoteAlbum>>;

    /// Create the album if it has no id, otherwise update it.
    async fn save_album(&self, album: &RemoteAlbum) -> Result<RemoteAlbum>;

    /// List the photos of one album.
    async fn list_photos(&self, album_id: &str) -> Result<Vec<RemotePhoto>>;

    /// Create or update a photo. Metadata only when `content` is `None`.
    async fn save_photo(
        &self,
        photo: &RemotePhoto,
        content: Option<UploadBody>,
    ) -> Result<RemotePhoto>;

    /// Stream the photo's binary content into `sink`, returning the byte count.
    async fn download_photo(&self, photo: &RemotePhoto, sink: &mut DynAsyncWrite) -> Result<u64>;

    /// Delete the photo. Returns `false` when the service refused.
    async fn delete_photo(&self, photo: &RemotePhoto) -> Result<bool>;
}
