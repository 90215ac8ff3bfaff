//! # Photo Sync Engine
//!
//! Runs one synchronization pass over the contacts of an account.
//!
//! ## Workflow
//!
//! 1. Try the privileged channel once; a refusal disables full-size
//!    substitution for the whole run
//! 2. Find or create the sync album and index its contact photos by title
//! 3. For every contact: gather its stored [`SyncState`], the hash of the
//!    local photo and the matching remote photo, [`decide`] a direction and
//!    apply it
//! 4. Persist the new state of each contact as soon as it is applied
//! 5. Signal the photo store to restart if any pull replaced a file behind
//!    its back
//!
//! Failures are contained per contact except for rejected credentials and
//! album bootstrap failures, which stop the run with no further contacts
//! processed.

use bridge_traits::album::{PhotoAlbumProvider, RemoteAlbum, RemotePhoto};
use bridge_traits::contacts::{ContactPhotoStore, ContactRecord};
use bridge_traits::error::BridgeError;
use bridge_traits::io::UploadBody;
use core_photo::{HighFidelityPhotoWriter, WriteOutcome};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, PhotoEvent, SyncEvent};
use std::future::Future;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::decision::{decide, remote_version, SyncAction};
use crate::error::{Result, SyncError};
use crate::hasher::{hash_bytes, hash_reader, ContentHash};
use crate::remote_index::RemoteIndex;
use crate::report::SyncReport;
use crate::state::SyncState;

/// What applying a decision did to one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContactOutcome {
    Inserted,
    Updated,
    Deleted,
    Skipped,
    Unchanged,
}

impl ContactOutcome {
    fn record(self, report: &mut SyncReport) {
        match self {
            ContactOutcome::Inserted => report.inserted += 1,
            ContactOutcome::Updated => report.updated += 1,
            ContactOutcome::Deleted => report.deleted += 1,
            ContactOutcome::Skipped => report.skipped += 1,
            ContactOutcome::Unchanged => report.unchanged += 1,
        }
    }
}

/// Everything gathered about a contact before acting on it.
struct Gathered {
    state: SyncState,
    local_hash: ContentHash,
    remote: Option<RemotePhoto>,
    action: SyncAction,
}

/// State shared by the contacts of one run.
struct RunContext {
    run_id: String,
    album_id: String,
    index: RemoteIndex,
    /// Cleared on the first refusal so later pulls skip the attempt.
    privileged: bool,
    /// A pull replaced a file through the privileged channel.
    restart_needed: bool,
}

pub struct PhotoSyncEngine {
    provider: Arc<dyn PhotoAlbumProvider>,
    store: Arc<dyn ContactPhotoStore>,
    writer: HighFidelityPhotoWriter,
    event_bus: Arc<EventBus>,
    settings: SyncSettings,
}

impl PhotoSyncEngine {
    pub fn new(
        provider: Arc<dyn PhotoAlbumProvider>,
        store: Arc<dyn ContactPhotoStore>,
        writer: HighFidelityPhotoWriter,
        event_bus: Arc<EventBus>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            provider,
            store,
            writer,
            event_bus,
            settings,
        }
    }

    /// Run one pass over the contacts of `account`.
    ///
    /// Never fails as a whole: run-level errors are counted in the report
    /// and flagged with [`SyncReport::aborted`]. State already persisted for
    /// earlier contacts is kept on abort and on cancellation.
    #[instrument(skip(self, cancel))]
    pub async fn run(&self, account: &str, cancel: &CancellationToken) -> SyncReport {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut report = SyncReport::default();

        info!(%run_id, "Starting photo sync");

        match self.run_pass(&run_id, account, cancel, &mut report).await {
            Ok(()) => {}
            Err(SyncError::Cancelled) => report.cancelled = true,
            Err(e) => {
                error!(%run_id, error = %e, "Photo sync aborted");
                report.record_run_error(&e);
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        run_id: run_id.clone(),
                        message: e.to_string(),
                        auth: e.is_auth(),
                    }))
                    .ok();
            }
        }

        if report.cancelled {
            info!(%run_id, processed = report.processed(), "Photo sync cancelled");
            self.event_bus
                .emit(CoreEvent::Sync(SyncEvent::Cancelled {
                    run_id,
                    contacts_processed: report.processed(),
                }))
                .ok();
        } else if !report.aborted {
            info!(
                %run_id,
                inserted = report.inserted,
                updated = report.updated,
                deleted = report.deleted,
                skipped = report.skipped,
                io_errors = report.io_errors,
                "Photo sync completed"
            );
            self.event_bus
                .emit(CoreEvent::Sync(SyncEvent::Completed {
                    run_id,
                    inserted: report.inserted,
                    updated: report.updated,
                    deleted: report.deleted,
                    skipped: report.skipped,
                    io_errors: report.io_errors,
                    duration_secs: started.elapsed().as_secs(),
                }))
                .ok();
        }

        report
    }

    async fn run_pass(
        &self,
        run_id: &str,
        account: &str,
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> Result<()> {
        let privileged =
            self.settings.privileged_substitution && self.writer.channel().check_access().await;
        if !privileged {
            info!("Full-size photo substitution unavailable for this run");
        }

        let album = self.ensure_album().await?;
        let album_id = album
            .id
            .clone()
            .ok_or_else(|| SyncError::AlbumBootstrap("album has no identifier".to_string()))?;

        let photos = self
            .provider
            .list_photos(&album_id)
            .await
            .map_err(SyncError::bootstrap)?;
        if let Some(title) = &self.settings.readme_title {
            self.ensure_readme(&album_id, &photos, title)
                .await
                .map_err(SyncError::bootstrap)?;
        }
        let index = RemoteIndex::build(
            photos,
            &self.settings.remote_title_prefix,
            self.settings.max_photo_dimension,
        );
        debug!(remote_photos = index.len(), "Indexed remote photos");

        let contacts = self.store.list_sync_candidates(account).await?;
        tokio::fs::create_dir_all(&self.settings.scratch_dir).await?;

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                run_id: run_id.to_string(),
                contacts: contacts.len() as u64,
            }))
            .ok();

        let mut ctx = RunContext {
            run_id: run_id.to_string(),
            album_id,
            index,
            privileged,
            restart_needed: false,
        };

        let result = self.sync_contacts(&mut ctx, &contacts, cancel, report).await;
        self.restart_consumer_if_needed(&ctx).await;
        result
    }

    async fn sync_contacts(
        &self,
        ctx: &mut RunContext,
        contacts: &[ContactRecord],
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> Result<()> {
        for contact in contacts {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let (action, result) = match self.gather(ctx, contact).await {
                Ok(gathered) => {
                    let action = gathered.action;
                    (action, self.apply(ctx, contact, gathered, cancel).await)
                }
                Err(e) => (SyncAction::None, Err(e)),
            };

            let applied = match result {
                Ok(outcome) => {
                    outcome.record(report);
                    outcome != ContactOutcome::Skipped
                }
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => {
                    warn!(contact_id = contact.id, error = %e, "Skipping contact");
                    report.record_contact_error(&e);
                    false
                }
            };

            self.event_bus
                .emit(CoreEvent::Sync(SyncEvent::ContactProcessed {
                    run_id: ctx.run_id.clone(),
                    contact_id: contact.id,
                    action: action.into(),
                    applied,
                }))
                .ok();
        }

        Ok(())
    }

    /// Select the configured album, creating it or fixing its description
    /// when needed.
    async fn ensure_album(&self) -> Result<RemoteAlbum> {
        let albums = self
            .provider
            .list_albums()
            .await
            .map_err(SyncError::bootstrap)?;

        let existing = albums
            .into_iter()
            .find(|album| album.title == self.settings.album_title);

        let mut album = match existing {
            Some(album) if album.summary == self.settings.album_summary => return Ok(album),
            Some(album) => {
                info!(album = %album.title, "Updating album description");
                album
            }
            None => {
                info!(album = %self.settings.album_title, "Creating sync album");
                RemoteAlbum::default()
            }
        };

        album.title = self.settings.album_title.clone();
        album.summary = self.settings.album_summary.clone();
        album.access = self.settings.album_access.clone();

        self.provider
            .save_album(&album)
            .await
            .map_err(SyncError::bootstrap)
    }

    /// Keep the readme PNG in the album, captioned with the album summary.
    /// It is never a contact photo, so the index leaves it out.
    async fn ensure_readme(
        &self,
        album_id: &str,
        photos: &[RemotePhoto],
        title: &str,
    ) -> std::result::Result<(), BridgeError> {
        let existing = photos
            .iter()
            .find(|photo| photo.title == title && photo.mime_type.as_deref() == Some(PNG_MIME));

        match existing {
            Some(photo) if photo.summary == self.settings.album_summary => Ok(()),
            Some(photo) => {
                info!(title, "Updating album readme caption");
                let mut photo = photo.clone();
                photo.summary = self.settings.album_summary.clone();
                self.provider.save_photo(&photo, None).await.map(drop)
            }
            None => {
                info!(title, "Adding album readme");
                let mut photo = RemotePhoto::new(album_id, title);
                photo.summary = self.settings.album_summary.clone();
                photo.mime_type = Some(PNG_MIME.to_string());
                let body: UploadBody = Box::new(Cursor::new(readme_png()?));
                self.provider.save_photo(&photo, Some(body)).await.map(drop)
            }
        }
    }

    #[instrument(skip(self, ctx, contact), fields(contact_id = contact.id))]
    async fn gather(&self, ctx: &mut RunContext, contact: &ContactRecord) -> Result<Gathered> {
        let token = self.store.read_sync_token(contact.id).await?;
        let state = SyncState::decode(token.as_deref());
        let local_hash = self.local_hash(contact.id).await?;
        let remote = self.resolve_remote(&mut ctx.index, contact).await?;
        let action = decide(&state, &local_hash, remote.as_ref());

        debug!(?action, remote = remote.is_some(), "Decided sync direction");

        Ok(Gathered {
            state,
            local_hash,
            remote,
            action,
        })
    }

    async fn apply(
        &self,
        ctx: &mut RunContext,
        contact: &ContactRecord,
        gathered: Gathered,
        cancel: &CancellationToken,
    ) -> Result<ContactOutcome> {
        let Gathered {
            mut state,
            local_hash,
            remote,
            action,
        } = gathered;

        match (action, remote) {
            (SyncAction::Push, remote) => self.push(ctx, contact, &local_hash, remote, cancel).await,
            (SyncAction::Pull, Some(remote)) => {
                self.pull(ctx, contact, &local_hash, remote, cancel).await
            }
            _ => {
                if state.take_override().is_some() {
                    debug!(contact_id = contact.id, "Clearing override with nothing to do");
                    // A forced pull leaves no stored hash behind.
                    state.local_hash = local_hash;
                    self.persist(contact.id, &state).await?;
                }
                Ok(ContactOutcome::Unchanged)
            }
        }
    }

    /// Streamed hash of the stored photo; an absent photo hashes as empty.
    async fn local_hash(&self, contact_id: i64) -> Result<ContentHash> {
        match self.store.open_photo_reader(contact_id).await? {
            Some(mut reader) => {
                let (hash, _) = hash_reader(&mut reader, self.settings.chunk_size).await?;
                Ok(hash)
            }
            None => Ok(ContentHash::empty()),
        }
    }

    /// Remote photo for the contact, adopting a legacy entry if that is all
    /// there is.
    async fn resolve_remote(
        &self,
        index: &mut RemoteIndex,
        contact: &ContactRecord,
    ) -> Result<Option<RemotePhoto>> {
        let title = index.title_for(&contact.source_id);
        if let Some(photo) = index.get(&title) {
            return Ok(Some(photo.clone()));
        }

        let Some(legacy_title) =
            index.find_legacy(&contact.source_id, contact.display_name.as_deref())
        else {
            return Ok(None);
        };
        let Some(mut photo) = index.get(&legacy_title).cloned() else {
            return Ok(None);
        };

        info!(from = %legacy_title, to = %title, "Adopting remote photo");
        photo.title = title;
        let saved = self.provider.save_photo(&photo, None).await?;
        index.replace(&legacy_title, saved.clone());

        Ok(Some(saved))
    }

    async fn push(
        &self,
        ctx: &mut RunContext,
        contact: &ContactRecord,
        local_hash: &ContentHash,
        remote: Option<RemotePhoto>,
        cancel: &CancellationToken,
    ) -> Result<ContactOutcome> {
        let bytes = if local_hash.is_empty_content() {
            None
        } else {
            self.store
                .read_photo_bytes(contact.id)
                .await?
                .filter(|bytes| !bytes.is_empty())
        };

        let Some(bytes) = bytes else {
            return self.push_removal(ctx, contact, remote).await;
        };

        if image::load_from_memory(&bytes).is_err() {
            return Err(SyncError::CorruptLocalImage {
                contact_id: contact.id,
            });
        }
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let uploaded_hash = hash_bytes(&bytes);
        let (photo, created) = match remote {
            Some(photo) => (photo, false),
            None => {
                let mut photo =
                    RemotePhoto::new(&ctx.album_id, ctx.index.title_for(&contact.source_id));
                photo.summary = contact.display_name.clone().unwrap_or_default();
                (photo, true)
            }
        };

        let body: UploadBody = Box::new(Cursor::new(bytes));
        let saved = or_cancelled(cancel, self.provider.save_photo(&photo, Some(body))).await??;
        let state = SyncState::synced(remote_version(&saved), uploaded_hash);

        ctx.index.replace(&photo.title, saved);
        self.persist(contact.id, &state).await?;

        if created {
            info!(contact_id = contact.id, "Uploaded new contact photo");
            Ok(ContactOutcome::Inserted)
        } else {
            info!(contact_id = contact.id, "Replaced remote contact photo");
            Ok(ContactOutcome::Updated)
        }
    }

    /// The local photo is gone: remove its remote copy as well.
    async fn push_removal(
        &self,
        ctx: &mut RunContext,
        contact: &ContactRecord,
        remote: Option<RemotePhoto>,
    ) -> Result<ContactOutcome> {
        let outcome = match remote {
            Some(photo) => {
                if !self.provider.delete_photo(&photo).await? {
                    return Err(SyncError::Io(format!(
                        "remote refused to delete {}",
                        photo.title
                    )));
                }
                ctx.index.remove(&photo.title);
                info!(contact_id = contact.id, "Deleted remote contact photo");
                ContactOutcome::Deleted
            }
            None => ContactOutcome::Unchanged,
        };

        self.persist(contact.id, &SyncState::never_synced()).await?;
        Ok(outcome)
    }

    async fn pull(
        &self,
        ctx: &mut RunContext,
        contact: &ContactRecord,
        local_hash: &ContentHash,
        remote: RemotePhoto,
        cancel: &CancellationToken,
    ) -> Result<ContactOutcome> {
        let scratch = self
            .settings
            .scratch_dir
            .join(format!("pull-{}.jpg", Uuid::new_v4()));

        let result = self
            .pull_through(ctx, contact, local_hash, &remote, &scratch, cancel)
            .await;

        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %scratch.display(), error = %e, "Failed to remove scratch photo");
            }
        }

        result
    }

    async fn pull_through(
        &self,
        ctx: &mut RunContext,
        contact: &ContactRecord,
        local_hash: &ContentHash,
        remote: &RemotePhoto,
        scratch: &Path,
        cancel: &CancellationToken,
    ) -> Result<ContactOutcome> {
        {
            let mut file = tokio::fs::File::create(scratch).await?;
            match or_cancelled(cancel, self.provider.download_photo(remote, &mut file)).await? {
                Ok(bytes) => debug!(bytes, "Downloaded remote photo"),
                Err(BridgeError::NotFound(url)) => {
                    warn!(contact_id = contact.id, %url, "Remote photo vanished");
                    let cleared = SyncState::synced(String::new(), local_hash.clone());
                    self.persist(contact.id, &cleared).await?;
                    return Ok(ContactOutcome::Skipped);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let outcome = self
            .writer
            .write(contact.id, scratch, ctx.privileged, cancel)
            .await;

        let full_fidelity = match outcome {
            WriteOutcome::Success => {
                ctx.restart_needed = true;
                true
            }
            WriteOutcome::PrivilegeUnavailable => {
                if ctx.privileged {
                    warn!("Privileged substitution refused; using recompressed photos for the rest of the run");
                    ctx.privileged = false;
                }
                false
            }
            WriteOutcome::IoFailure(message) => return Err(SyncError::Io(message)),
            WriteOutcome::Cancelled => return Err(SyncError::Cancelled),
        };

        let stored_hash = self.stored_hash(contact.id).await;
        let state = SyncState::synced(remote_version(remote), stored_hash);
        self.persist(contact.id, &state).await?;

        self.event_bus
            .emit(CoreEvent::Photo(PhotoEvent::Changed {
                contact_id: contact.id,
                full_fidelity,
            }))
            .ok();

        info!(contact_id = contact.id, full_fidelity, "Stored remote photo locally");
        Ok(ContactOutcome::Updated)
    }

    /// Hash of what the store now serves, or the unknown marker.
    async fn stored_hash(&self, contact_id: i64) -> ContentHash {
        match self.local_hash(contact_id).await {
            Ok(hash) if !hash.is_empty_content() => hash,
            Ok(_) => {
                warn!(contact_id, "Stored photo reads back empty");
                ContentHash::unknown()
            }
            Err(e) => {
                warn!(contact_id, error = %e, "Stored photo unreadable");
                ContentHash::unknown()
            }
        }
    }

    async fn persist(&self, contact_id: i64, state: &SyncState) -> Result<()> {
        self.store
            .persist_sync_token(contact_id, &state.encode())
            .await?;
        Ok(())
    }

    async fn restart_consumer_if_needed(&self, ctx: &RunContext) {
        if !ctx.restart_needed {
            return;
        }

        if let Some(pid) = self.writer.restart_consumer().await {
            self.event_bus
                .emit(CoreEvent::Photo(PhotoEvent::ConsumerRestarted { pid }))
                .ok();
        }
    }
}

/// Drops `work` as soon as the run is cancelled.
async fn or_cancelled<F: Future>(cancel: &CancellationToken, work: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        out = work => Ok(out),
    }
}

const PNG_MIME: &str = "image/png";

/// Plain grey square standing in for the album readme artwork.
fn readme_png() -> std::result::Result<Vec<u8>, BridgeError> {
    let image = image::GrayImage::from_pixel(64, 64, image::Luma([0xD0]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| BridgeError::OperationFailed(format!("readme image: {e}")))?;
    Ok(bytes)
}
