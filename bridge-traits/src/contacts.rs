//! Local Contact Photo Store
//!
//! The device address book that owns contact photos. Its public write path
//! recompresses images; [`StoreOwner`] exposes what a privileged writer needs
//! to replace the stored file directly.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use crate::error::Result;
use crate::io::DynAsyncRead;

/// A contact eligible for photo sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    /// Local row identifier.
    pub id: i64,
    /// Stable cross-sync key.
    pub source_id: String,
    pub display_name: Option<String>,
}

/// Identity and private storage of the process that owns the store's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOwner {
    pub uid: u32,
    /// Directory holding full-size photo files, named by file id.
    pub photo_dir: PathBuf,
    /// Running process, if any.
    pub pid: Option<u32>,
}

/// Incremental writer returned by [`ContactPhotoStore::open_photo_sink`].
///
/// Nothing becomes visible until [`PhotoSink::commit`] succeeds.
#[async_trait]
pub trait PhotoSink: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait ContactPhotoStore: Send + Sync {
    /// Contacts of `account` that take part in photo sync.
    async fn list_sync_candidates(&self, account: &str) -> Result<Vec<ContactRecord>>;

    /// Open the stored full-size photo, `None` when the contact has no photo.
    async fn open_photo_reader(&self, contact_id: i64) -> Result<Option<Box<DynAsyncRead>>>;

    /// Begin writing a photo through the public (recompressing) path.
    async fn open_photo_sink(&self, contact_id: i64) -> Result<Box<dyn PhotoSink>>;

    /// Remove the contact's photo through the public path.
    async fn clear_photo(&self, contact_id: i64) -> Result<()>;

    /// Internal file id allocated for the contact's full-size photo.
    async fn photo_file_id(&self, contact_id: i64) -> Result<Option<i64>>;

    async fn read_sync_token(&self, contact_id: i64) -> Result<Option<String>>;

    async fn persist_sync_token(&self, contact_id: i64, token: &str) -> Result<()>;

    /// Resolve the owning process, `None` when it cannot be determined.
    async fn owner_process(&self) -> Result<Option<StoreOwner>>;

    /// Read the whole photo into memory.
    async fn read_photo_bytes(&self, contact_id: i64) -> Result<Option<Vec<u8>>> {
        let Some(mut reader) = self.open_photo_reader(contact_id).await? else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        Ok(Some(bytes))
    }

    /// Write a complete photo through the public path.
    async fn write_photo_recompressed(&self, contact_id: i64, bytes: &[u8]) -> Result<()> {
        let mut sink = self.open_photo_sink(contact_id).await?;
        sink.write_chunk(bytes).await?;
        sink.commit().await
    }
}
