//! # Core Configuration Module
//!
//! Builder-based configuration for the contact photo sync core.
//!
//! ## Overview
//!
//! [`SyncSettings`] holds the tunables of a sync run (album naming, photo
//! limits, polling bounds). [`CoreConfig`] bundles those settings with the
//! host capabilities the core calls into. Both builders validate eagerly so
//! a misconfiguration fails before any contact is touched.
//!
//! ## Required Dependencies
//!
//! - `ContactPhotoStore` - the local address book
//! - `AuthTokenProvider` - service tokens per account
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `HttpClient` - desktop default: reqwest (`desktop-shims`)
//! - `PrivilegedShell` - desktop default: `su` (`desktop-shims`), otherwise never granted
//! - `Timer` / `Clock` - tokio timer and system clock
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SyncSettings};
//! use std::sync::Arc;
//!
//! let settings = SyncSettings::builder()
//!     .album_title("Contact Photos")
//!     .max_photo_dimension(720)
//!     .build()?;
//!
//! let config = CoreConfig::builder()
//!     .photo_store(Arc::new(MyAddressBook))
//!     .token_provider(Arc::new(MyAccountManager))
//!     .settings(settings)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AuthTokenProvider, Clock, ContactPhotoStore, HttpClient, PrivilegedShell, SystemClock, Timer,
    TokioTimer,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ALBUM_TITLE: &str = "Contact Photos";
pub const DEFAULT_ALBUM_SUMMARY: &str =
    "Full-size contact photos kept in sync with the address book. \
     Renaming or re-captioning photos here breaks the link to their contact.";
pub const DEFAULT_ALBUM_ACCESS: &str = "protected";
pub const DEFAULT_REMOTE_TITLE_PREFIX: &str = "acps-";
pub const DEFAULT_README_TITLE: &str = "acps-readme.png";
pub const DEFAULT_MAX_PHOTO_DIMENSION: u32 = 720;
pub const DEFAULT_DB_POLL_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_DB_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Tunables of a synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Title of the remote album holding contact photos.
    pub album_title: String,
    /// Summary written when the album is created.
    pub album_summary: String,
    /// Access level written when the album is created.
    pub album_access: String,
    /// Prefix of remote photo titles; the title is `<prefix><sourceId>.jpg`.
    pub remote_title_prefix: String,
    /// Title of a PNG kept in the album, captioned with the album summary,
    /// so people browsing the album see what it is for. `None` skips it.
    pub readme_title: Option<String>,
    /// Remote photos larger than this on either side are ignored.
    pub max_photo_dimension: u32,
    /// Bound on each wait for the store to allocate or expose a photo file.
    pub db_poll_timeout: Duration,
    /// Delay between polls within that bound.
    pub db_poll_interval: Duration,
    /// Bytes copied per chunk in local transfers.
    pub chunk_size: usize,
    /// Where downloaded and staged photos are kept before being committed.
    pub scratch_dir: PathBuf,
    /// Attempt privileged substitution of full-size photos.
    pub privileged_substitution: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            album_title: DEFAULT_ALBUM_TITLE.to_string(),
            album_summary: DEFAULT_ALBUM_SUMMARY.to_string(),
            album_access: DEFAULT_ALBUM_ACCESS.to_string(),
            remote_title_prefix: DEFAULT_REMOTE_TITLE_PREFIX.to_string(),
            readme_title: Some(DEFAULT_README_TITLE.to_string()),
            max_photo_dimension: DEFAULT_MAX_PHOTO_DIMENSION,
            db_poll_timeout: DEFAULT_DB_POLL_TIMEOUT,
            db_poll_interval: DEFAULT_DB_POLL_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            scratch_dir: std::env::temp_dir(),
            privileged_substitution: true,
        }
    }
}

impl SyncSettings {
    pub fn builder() -> SyncSettingsBuilder {
        SyncSettingsBuilder::default()
    }

    /// Checks:
    /// - titles, prefix and access level are not blank
    /// - photo dimension and chunk size are non-zero
    /// - the poll interval is non-zero and fits in the poll timeout
    /// - the scratch directory is set
    pub fn validate(&self) -> Result<()> {
        if self.album_title.trim().is_empty() {
            return Err(Error::Config("Album title cannot be empty".to_string()));
        }

        if self.album_access.trim().is_empty() {
            return Err(Error::Config("Album access level cannot be empty".to_string()));
        }

        if self.remote_title_prefix.is_empty() {
            return Err(Error::Config(
                "Remote title prefix cannot be empty; legacy titles are recognised by its absence"
                    .to_string(),
            ));
        }

        if let Some(title) = &self.readme_title {
            if title.trim().is_empty() || title.ends_with(".jpg") {
                return Err(Error::Config(
                    "Readme title must be set and must not look like a contact photo".to_string(),
                ));
            }
        }

        if self.max_photo_dimension == 0 {
            return Err(Error::Config(
                "Maximum photo dimension must be greater than 0".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(Error::Config("Chunk size must be greater than 0".to_string()));
        }

        if self.db_poll_interval.is_zero() {
            return Err(Error::Config(
                "Database poll interval must be greater than 0".to_string(),
            ));
        }

        if self.db_poll_interval > self.db_poll_timeout {
            return Err(Error::Config(format!(
                "Database poll interval ({:?}) exceeds the poll timeout ({:?})",
                self.db_poll_interval, self.db_poll_timeout
            )));
        }

        if self.scratch_dir.as_os_str().is_empty() {
            return Err(Error::Config("Scratch directory cannot be empty".to_string()));
        }

        Ok(())
    }
}

/// Builder for [`SyncSettings`]; unset fields keep their defaults.
#[derive(Debug, Default)]
pub struct SyncSettingsBuilder {
    settings: Option<SyncSettings>,
}

impl SyncSettingsBuilder {
    fn settings(&mut self) -> &mut SyncSettings {
        self.settings.get_or_insert_with(SyncSettings::default)
    }

    pub fn album_title(mut self, title: impl Into<String>) -> Self {
        self.settings().album_title = title.into();
        self
    }

    pub fn album_summary(mut self, summary: impl Into<String>) -> Self {
        self.settings().album_summary = summary.into();
        self
    }

    pub fn album_access(mut self, access: impl Into<String>) -> Self {
        self.settings().album_access = access.into();
        self
    }

    pub fn remote_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings().remote_title_prefix = prefix.into();
        self
    }

    pub fn readme_title(mut self, title: Option<&str>) -> Self {
        self.settings().readme_title = title.map(str::to_string);
        self
    }

    pub fn max_photo_dimension(mut self, dimension: u32) -> Self {
        self.settings().max_photo_dimension = dimension;
        self
    }

    /// Bound and interval of the store polling loops.
    pub fn db_polling(mut self, timeout: Duration, interval: Duration) -> Self {
        let settings = self.settings();
        settings.db_poll_timeout = timeout;
        settings.db_poll_interval = interval;
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.settings().chunk_size = bytes;
        self
    }

    pub fn scratch_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings().scratch_dir = path.into();
        self
    }

    pub fn privileged_substitution(mut self, enabled: bool) -> Self {
        self.settings().privileged_substitution = enabled;
        self
    }

    pub fn build(mut self) -> Result<SyncSettings> {
        let settings = self.settings.take().unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }
}

/// Capabilities and settings required to run a sync.
#[derive(Clone)]
pub struct CoreConfig {
    pub http_client: Arc<dyn HttpClient>,
    pub photo_store: Arc<dyn ContactPhotoStore>,
    pub privileged_shell: Arc<dyn PrivilegedShell>,
    pub token_provider: Arc<dyn AuthTokenProvider>,
    pub timer: Arc<dyn Timer>,
    pub clock: Arc<dyn Clock>,
    pub settings: SyncSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("photo_store", &"ContactPhotoStore { ... }")
            .field("privileged_shell", &"PrivilegedShell { ... }")
            .field("token_provider", &"AuthTokenProvider { ... }")
            .field("settings", &self.settings)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::DefaultCapability(format!("reqwest HttpClient: {e}")))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "No HTTP client implementation provided. \
         Desktop: enable the 'desktop-shims' feature. \
         Mobile: inject the platform-native adapter.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_privileged_shell() -> Arc<dyn PrivilegedShell> {
    Arc::new(bridge_desktop::SuShell::new())
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_privileged_shell() -> Arc<dyn PrivilegedShell> {
    Arc::new(bridge_traits::UnprivilegedShell)
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    photo_store: Option<Arc<dyn ContactPhotoStore>>,
    privileged_shell: Option<Arc<dyn PrivilegedShell>>,
    token_provider: Option<Arc<dyn AuthTokenProvider>>,
    timer: Option<Arc<dyn Timer>>,
    clock: Option<Arc<dyn Clock>>,
    settings: Option<SyncSettings>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn photo_store(mut self, store: Arc<dyn ContactPhotoStore>) -> Self {
        self.photo_store = Some(store);
        self
    }

    pub fn privileged_shell(mut self, shell: Arc<dyn PrivilegedShell>) -> Self {
        self.privileged_shell = Some(shell);
        self
    }

    pub fn token_provider(mut self, provider: Arc<dyn AuthTokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` when no photo store or token provider was given,
    ///   or no HTTP client was given and `desktop-shims` is disabled
    /// - `Config` when the settings fail validation
    pub fn build(self) -> Result<CoreConfig> {
        let photo_store = self.photo_store.ok_or_else(|| {
            capability_missing(
                "ContactPhotoStore",
                "A ContactPhotoStore implementation is required to read and write contact photos. \
                 Inject the host address book adapter with .photo_store().",
            )
        })?;

        let token_provider = self.token_provider.ok_or_else(|| {
            capability_missing(
                "AuthTokenProvider",
                "An AuthTokenProvider is required to authenticate against the photo service. \
                 Inject the host account manager with .token_provider().",
            )
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let settings = self.settings.unwrap_or_default();
        settings.validate()?;

        Ok(CoreConfig {
            http_client,
            photo_store,
            privileged_shell: self
                .privileged_shell
                .unwrap_or_else(provide_default_privileged_shell),
            token_provider,
            timer: self.timer.unwrap_or_else(|| Arc::new(TokioTimer)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = SyncSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.album_access, "protected");
        assert_eq!(settings.remote_title_prefix, "acps-");
        assert_eq!(settings.readme_title.as_deref(), Some("acps-readme.png"));
        assert_eq!(settings.db_poll_timeout, Duration::from_secs(5));
        assert_eq!(settings.db_poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn builder_overrides_fields() {
        let settings = SyncSettings::builder()
            .album_title("Faces")
            .max_photo_dimension(256)
            .db_polling(Duration::from_millis(200), Duration::from_millis(10))
            .chunk_size(1024)
            .scratch_dir("/tmp/photos")
            .privileged_substitution(false)
            .build()
            .unwrap();

        assert_eq!(settings.album_title, "Faces");
        assert_eq!(settings.max_photo_dimension, 256);
        assert_eq!(settings.db_poll_timeout, Duration::from_millis(200));
        assert_eq!(settings.chunk_size, 1024);
        assert_eq!(settings.scratch_dir, PathBuf::from("/tmp/photos"));
        assert!(!settings.privileged_substitution);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let blank_title = SyncSettings::builder().album_title("  ").build();
        assert!(matches!(blank_title, Err(Error::Config(_))));

        let zero_dim = SyncSettings::builder().max_photo_dimension(0).build();
        assert!(matches!(zero_dim, Err(Error::Config(_))));

        let inverted = SyncSettings::builder()
            .db_polling(Duration::from_millis(10), Duration::from_millis(50))
            .build();
        assert!(matches!(inverted, Err(Error::Config(msg)) if msg.contains("exceeds")));

        let no_prefix = SyncSettings::builder().remote_title_prefix("").build();
        assert!(no_prefix.is_err());

        let jpeg_readme = SyncSettings::builder().readme_title(Some("acps-readme.jpg")).build();
        assert!(jpeg_readme.is_err());
        assert!(SyncSettings::builder().readme_title(None).build().is_ok());
    }

    #[test]
    fn missing_photo_store_is_reported() {
        let result = CoreConfig::builder().build();
        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "ContactPhotoStore")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
