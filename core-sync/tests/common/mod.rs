#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::album::{PhotoAlbumProvider, RemoteAlbum, RemotePhoto};
use bridge_traits::contacts::{ContactPhotoStore, ContactRecord, PhotoSink, StoreOwner};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::io::{DynAsyncRead, DynAsyncWrite, UploadBody};
use bridge_traits::privileged::PrivilegedShell;
use bridge_traits::time::Timer;
use core_photo::{HighFidelityPhotoWriter, PrivilegedChannel};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus};
use core_sync::{PhotoSyncEngine, SyncReport, SyncState};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;

pub const ACCOUNT: &str = "ada@example.com";
pub const STORE_UID: u32 = 10_017;
pub const STORE_PID: u32 = 3141;

/// A small, valid JPEG whose pixels depend on `seed`.
pub fn jpeg(seed: u8) -> Vec<u8> {
    let img = image::RgbImage::from_fn(16, 16, |x, y| {
        image::Rgb([seed, (x * 16) as u8, (y * 16) as u8])
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .unwrap();
    bytes
}

/// The store's lossy re-encode: keeps every other byte.
pub fn reduce(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().step_by(2).copied().collect()
}

pub fn contact(id: i64, source_id: &str, name: &str) -> ContactRecord {
    ContactRecord {
        id,
        source_id: source_id.to_string(),
        display_name: Some(name.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Remote album service
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RemoteState {
    albums: Vec<RemoteAlbum>,
    photos: BTreeMap<String, (RemotePhoto, Vec<u8>)>,
    next_id: u64,
    next_version: u64,
    vanished: HashSet<String>,
}

impl RemoteState {
    fn version(&mut self) -> String {
        self.next_version += 1;
        format!("2012-06-01T00:00:{:02}.000Z", self.next_version)
    }

    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn by_title(&self, title: &str) -> Option<&(RemotePhoto, Vec<u8>)> {
        self.photos.values().find(|(photo, _)| photo.title == title)
    }
}

#[derive(Default)]
pub struct FakeAlbumService {
    state: Mutex<RemoteState>,
    reject_auth: AtomicBool,
    reject_uploads_auth: AtomicBool,
    albums_unavailable: AtomicBool,
    stall_transfers: AtomicBool,
    uploads: AtomicUsize,
    downloads: AtomicUsize,
}

impl FakeAlbumService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_auth(&self) {
        self.reject_auth.store(true, Ordering::SeqCst);
    }

    pub fn reject_uploads_auth(&self) {
        self.reject_uploads_auth.store(true, Ordering::SeqCst);
    }

    pub fn make_albums_unavailable(&self) {
        self.albums_unavailable.store(true, Ordering::SeqCst);
    }

    /// Uploads and downloads start but never finish.
    pub fn stall_transfers(&self) {
        self.stall_transfers.store(true, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn albums(&self) -> Vec<RemoteAlbum> {
        self.state.lock().unwrap().albums.clone()
    }

    /// Album id of `title`, creating the album if needed.
    pub fn album_id(&self, title: &str) -> String {
        let mut state = self.state.lock().unwrap();
        if let Some(id) = state
            .albums
            .iter()
            .find(|album| album.title == title)
            .and_then(|album| album.id.clone())
        {
            return id;
        }
        let id = state.id("album-");
        let updated = state.version();
        state.albums.push(RemoteAlbum {
            id: Some(id.clone()),
            title: title.to_string(),
            summary: SyncSettings::default().album_summary,
            access: "protected".to_string(),
            updated: Some(updated),
            edit_url: Some(format!("https://photos.test/entry/{id}")),
        });
        id
    }

    /// Put a photo in the default album as if another device uploaded it,
    /// returning its version.
    pub fn seed_photo(&self, title: &str, summary: &str, bytes: Vec<u8>) -> String {
        let album_id = self.album_id(&SyncSettings::default().album_title);
        let mut state = self.state.lock().unwrap();
        let id = state.id("photo-");
        let version = state.version();
        let photo = RemotePhoto {
            id: Some(id.clone()),
            album_id: Some(album_id),
            title: title.to_string(),
            summary: summary.to_string(),
            content_url: Some(format!("https://photos.test/media/{id}/s0/{title}")),
            updated: Some(version.clone()),
            mime_type: Some("image/jpeg".to_string()),
            width: Some(96),
            height: Some(96),
            edit_url: Some(format!("https://photos.test/entry/{id}")),
            edit_media_url: Some(format!("https://photos.test/media/edit/{id}")),
        };
        state.photos.insert(id, (photo, bytes));
        version
    }

    /// Replace the bytes of an existing photo, returning its new version.
    pub fn replace_photo(&self, title: &str, bytes: Vec<u8>) -> String {
        let mut state = self.state.lock().unwrap();
        let version = state.version();
        let entry = state
            .photos
            .values_mut()
            .find(|(photo, _)| photo.title == title)
            .expect("photo to replace");
        entry.0.updated = Some(version.clone());
        entry.1 = bytes;
        version
    }

    /// Make downloads of `title` answer 404 while it stays listed.
    pub fn vanish(&self, title: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state
            .by_title(title)
            .and_then(|(photo, _)| photo.id.clone())
            .expect("photo to vanish");
        state.vanished.insert(id);
    }

    pub fn photo(&self, title: &str) -> Option<RemotePhoto> {
        let state = self.state.lock().unwrap();
        state.by_title(title).map(|(photo, _)| photo.clone())
    }

    pub fn photo_bytes(&self, title: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.by_title(title).map(|(_, bytes)| bytes.clone())
    }

    fn check_auth(&self) -> BridgeResult<()> {
        if self.reject_auth.load(Ordering::SeqCst) {
            return Err(BridgeError::Unauthorized("HTTP 403".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PhotoAlbumProvider for FakeAlbumService {
    async fn list_albums(&self) -> BridgeResult<Vec<RemoteAlbum>> {
        self.check_auth()?;
        if self.albums_unavailable.load(Ordering::SeqCst) {
            return Err(BridgeError::HttpStatus {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(self.albums())
    }

    async fn get_album(&self, id: &str) -> BridgeResult<Option<RemoteAlbum>> {
        self.check_auth()?;
        Ok(self
            .albums()
            .into_iter()
            .find(|album| album.id.as_deref() == Some(id)))
    }

    async fn save_album(&self, album: &RemoteAlbum) -> BridgeResult<RemoteAlbum> {
        self.check_auth()?;
        let mut state = self.state.lock().unwrap();
        let mut saved = album.clone();
        saved.updated = Some(state.version());
        match album.id.clone() {
            Some(id) => {
                let existing = state
                    .albums
                    .iter_mut()
                    .find(|a| a.id.as_deref() == Some(id.as_str()))
                    .ok_or_else(|| BridgeError::NotFound(id.clone()))?;
                *existing = saved.clone();
            }
            None => {
                let id = state.id("album-");
                saved.edit_url = Some(format!("https://photos.test/entry/{id}"));
                saved.id = Some(id);
                state.albums.push(saved.clone());
            }
        }
        Ok(saved)
    }

    async fn list_photos(&self, album_id: &str) -> BridgeResult<Vec<RemotePhoto>> {
        self.check_auth()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .photos
            .values()
            .filter(|(photo, _)| photo.album_id.as_deref() == Some(album_id))
            .map(|(photo, _)| photo.clone())
            .collect())
    }

    async fn save_photo(
        &self,
        photo: &RemotePhoto,
        content: Option<UploadBody>,
    ) -> BridgeResult<RemotePhoto> {
        self.check_auth()?;
        let content = match content {
            Some(mut body) => {
                if self.reject_uploads_auth.load(Ordering::SeqCst) {
                    self.uploads.fetch_add(1, Ordering::SeqCst);
                    return Err(BridgeError::Unauthorized("HTTP 403".to_string()));
                }
                if self.stall_transfers.load(Ordering::SeqCst) {
                    self.uploads.fetch_add(1, Ordering::SeqCst);
                    std::future::pending::<()>().await;
                }
                let mut bytes = Vec::new();
                body.read_to_end(&mut bytes).await?;
                self.uploads.fetch_add(1, Ordering::SeqCst);
                Some(bytes)
            }
            None => None,
        };

        let mut state = self.state.lock().unwrap();
        let version = state.version();
        let mut saved = photo.clone();
        saved.updated = Some(version);

        match photo.id.clone() {
            Some(id) => {
                let entry = state
                    .photos
                    .get_mut(&id)
                    .ok_or_else(|| BridgeError::NotFound(id.clone()))?;
                if let Some(bytes) = content {
                    entry.1 = bytes;
                }
                entry.0 = saved.clone();
            }
            None => {
                let id = state.id("photo-");
                saved.id = Some(id.clone());
                saved.mime_type = photo.mime_type.clone().or(Some("image/jpeg".to_string()));
                saved.width = Some(96);
                saved.height = Some(96);
                saved.content_url = Some(format!("https://photos.test/media/{id}/s0/x.jpg"));
                saved.edit_url = Some(format!("https://photos.test/entry/{id}"));
                saved.edit_media_url = Some(format!("https://photos.test/media/edit/{id}"));
                state
                    .photos
                    .insert(id, (saved.clone(), content.unwrap_or_default()));
            }
        }
        Ok(saved)
    }

    async fn download_photo(
        &self,
        photo: &RemotePhoto,
        sink: &mut DynAsyncWrite,
    ) -> BridgeResult<u64> {
        self.check_auth()?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.stall_transfers.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let bytes = {
            let state = self.state.lock().unwrap();
            let id = photo.id.clone().unwrap_or_default();
            let url = photo.content_url.clone().unwrap_or_default();
            if state.vanished.contains(&id) {
                return Err(BridgeError::NotFound(url));
            }
            match state.photos.get(&id) {
                Some((_, bytes)) => bytes.clone(),
                None => return Err(BridgeError::NotFound(url)),
            }
        };
        sink.write_all(&bytes).await?;
        sink.flush().await?;
        Ok(bytes.len() as u64)
    }

    async fn delete_photo(&self, photo: &RemotePhoto) -> BridgeResult<bool> {
        self.check_auth()?;
        let mut state = self.state.lock().unwrap();
        let id = photo.id.clone().unwrap_or_default();
        Ok(state.photos.remove(&id).is_some())
    }
}

// ---------------------------------------------------------------------------
// Local address book
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BookState {
    contacts: Vec<ContactRecord>,
    tokens: HashMap<i64, String>,
    reduced: HashMap<i64, Vec<u8>>,
    file_ids: HashMap<i64, i64>,
    next_file_id: i64,
    unreadable: HashSet<i64>,
}

/// Address book that recompresses every photo written through it and serves
/// the file in its photo directory when one exists for the allocated id.
pub struct FakeAddressBook {
    photo_dir: PathBuf,
    state: Arc<Mutex<BookState>>,
}

struct FakeSink {
    contact_id: i64,
    buffer: Vec<u8>,
    state: Arc<Mutex<BookState>>,
}

#[async_trait]
impl PhotoSink for FakeSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> BridgeResult<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.reduced.insert(self.contact_id, reduce(&self.buffer));
        state.next_file_id += 1;
        let file_id = state.next_file_id;
        state.file_ids.insert(self.contact_id, file_id);
        Ok(())
    }
}

impl FakeAddressBook {
    pub fn new(photo_dir: &Path, contacts: Vec<ContactRecord>) -> Self {
        Self {
            photo_dir: photo_dir.to_path_buf(),
            state: Arc::new(Mutex::new(BookState {
                contacts,
                next_file_id: 100,
                ..Default::default()
            })),
        }
    }

    /// Set a photo the way the user's own edit would.
    pub fn set_photo(&self, contact_id: i64, bytes: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state.file_ids.remove(&contact_id);
        state.reduced.insert(contact_id, bytes);
    }

    pub fn remove_photo(&self, contact_id: i64) {
        let mut state = self.state.lock().unwrap();
        state.file_ids.remove(&contact_id);
        state.reduced.remove(&contact_id);
    }

    pub fn make_unreadable(&self, contact_id: i64) {
        self.state.lock().unwrap().unreadable.insert(contact_id);
    }

    pub fn set_token(&self, contact_id: i64, token: &str) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(contact_id, token.to_string());
    }

    pub fn token(&self, contact_id: i64) -> Option<String> {
        self.state.lock().unwrap().tokens.get(&contact_id).cloned()
    }

    pub fn sync_state(&self, contact_id: i64) -> SyncState {
        SyncState::decode(self.token(contact_id).as_deref())
    }

    pub fn photo(&self, contact_id: i64) -> Option<Vec<u8>> {
        let full_size = {
            let state = self.state.lock().unwrap();
            state
                .file_ids
                .get(&contact_id)
                .map(|file_id| self.photo_dir.join(file_id.to_string()))
        };
        if let Some(path) = full_size {
            if let Ok(bytes) = std::fs::read(path) {
                return Some(bytes);
            }
        }
        self.state.lock().unwrap().reduced.get(&contact_id).cloned()
    }
}

#[async_trait]
impl ContactPhotoStore for FakeAddressBook {
    async fn list_sync_candidates(&self, _account: &str) -> BridgeResult<Vec<ContactRecord>> {
        Ok(self.state.lock().unwrap().contacts.clone())
    }

    async fn open_photo_reader(&self, contact_id: i64) -> BridgeResult<Option<Box<DynAsyncRead>>> {
        if self.state.lock().unwrap().unreadable.contains(&contact_id) {
            return Err(BridgeError::OperationFailed("photo file locked".to_string()));
        }
        Ok(self
            .photo(contact_id)
            .map(|bytes| Box::new(std::io::Cursor::new(bytes)) as Box<DynAsyncRead>))
    }

    async fn open_photo_sink(&self, contact_id: i64) -> BridgeResult<Box<dyn PhotoSink>> {
        Ok(Box::new(FakeSink {
            contact_id,
            buffer: Vec::new(),
            state: self.state.clone(),
        }))
    }

    async fn clear_photo(&self, contact_id: i64) -> BridgeResult<()> {
        self.remove_photo(contact_id);
        Ok(())
    }

    async fn photo_file_id(&self, contact_id: i64) -> BridgeResult<Option<i64>> {
        Ok(self.state.lock().unwrap().file_ids.get(&contact_id).copied())
    }

    async fn read_sync_token(&self, contact_id: i64) -> BridgeResult<Option<String>> {
        Ok(self.token(contact_id))
    }

    async fn persist_sync_token(&self, contact_id: i64, token: &str) -> BridgeResult<()> {
        self.set_token(contact_id, token);
        Ok(())
    }

    async fn owner_process(&self) -> BridgeResult<Option<StoreOwner>> {
        Ok(Some(StoreOwner {
            uid: STORE_UID,
            photo_dir: self.photo_dir.clone(),
            pid: Some(STORE_PID),
        }))
    }
}

// ---------------------------------------------------------------------------
// Privileged shell and timer
// ---------------------------------------------------------------------------

/// Shell that performs the `mv` lines of granted scripts.
pub struct FakeRootShell {
    granted: bool,
    scripts: Mutex<Vec<String>>,
}

impl FakeRootShell {
    pub fn new(granted: bool) -> Self {
        Self {
            granted,
            scripts: Mutex::new(Vec::new()),
        }
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PrivilegedShell for FakeRootShell {
    async fn run_privileged(&self, script: &str) -> bool {
        self.scripts.lock().unwrap().push(script.to_string());
        if !self.granted {
            return false;
        }
        for line in script.lines() {
            let Some(args) = line.strip_prefix("mv '").and_then(|l| l.strip_suffix('\'')) else {
                continue;
            };
            let Some((from, to)) = args.split_once("' '") else {
                return false;
            };
            if std::fs::rename(from, to).is_err() {
                return false;
            }
        }
        true
    }
}

pub struct InstantTimer;

#[async_trait]
impl Timer for InstantTimer {
    async fn sleep(&self, _duration: Duration) {}
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    _dir: TempDir,
    pub scratch_dir: PathBuf,
    pub remote: Arc<FakeAlbumService>,
    pub book: Arc<FakeAddressBook>,
    pub shell: Arc<FakeRootShell>,
    pub events: Arc<EventBus>,
    pub settings: SyncSettings,
}

impl Harness {
    pub fn new(contacts: Vec<ContactRecord>, root_granted: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let photo_dir = dir.path().join("photos");
        let scratch_dir = dir.path().join("scratch");
        std::fs::create_dir_all(&photo_dir).unwrap();

        let settings = SyncSettings::builder()
            .db_polling(Duration::from_millis(500), Duration::from_millis(50))
            .scratch_dir(&scratch_dir)
            .readme_title(None)
            .build()
            .unwrap();

        Self {
            _dir: dir,
            scratch_dir,
            remote: Arc::new(FakeAlbumService::new()),
            book: Arc::new(FakeAddressBook::new(&photo_dir, contacts)),
            shell: Arc::new(FakeRootShell::new(root_granted)),
            events: Arc::new(EventBus::default()),
            settings,
        }
    }

    pub fn engine(&self) -> PhotoSyncEngine {
        let writer = HighFidelityPhotoWriter::new(
            self.book.clone(),
            Arc::new(PrivilegedChannel::new(self.shell.clone())),
            Arc::new(InstantTimer),
            &self.settings,
        );
        PhotoSyncEngine::new(
            self.remote.clone(),
            self.book.clone(),
            writer,
            self.events.clone(),
            self.settings.clone(),
        )
    }

    pub async fn run(&self) -> SyncReport {
        self.engine().run(ACCOUNT, &CancellationToken::new()).await
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }
}

pub fn drain(receiver: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
