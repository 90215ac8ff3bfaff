//! Core service façade.
//!
//! Wires the host capabilities collected in a
//! [`CoreConfig`](core_runtime::config::CoreConfig) into the sync engine and
//! exposes the single invocation surface, [`CoreService::run_sync`]. Desktop
//! hosts typically enable the `desktop-shims` feature so the HTTP client and
//! privileged shell default to the `bridge-desktop` implementations.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::{Arc, Mutex};

use bridge_traits::album::PhotoAlbumProvider;
use bridge_traits::error::BridgeError;
use core_photo::{HighFidelityPhotoWriter, PrivilegedChannel};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_sync::{PhotoSyncEngine, SyncReport};
use provider_picasa::PicasaClient;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Builds the remote album client for a freshly issued token.
pub type ProviderFactory =
    Arc<dyn Fn(&CoreConfig, String) -> Arc<dyn PhotoAlbumProvider> + Send + Sync>;

fn picasa_factory() -> ProviderFactory {
    Arc::new(|config: &CoreConfig, token: String| {
        Arc::new(
            PicasaClient::new(config.http_client.clone(), token).with_clock(config.clock.clone()),
        ) as Arc<dyn PhotoAlbumProvider>
    })
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    provider_factory: ProviderFactory,
    event_bus: Arc<EventBus>,
    /// Shared by all runs so privileged scripts never interleave.
    channel: Arc<PrivilegedChannel>,
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl CoreService {
    /// Create a service talking to the Picasa Web Albums API.
    pub fn new(config: CoreConfig) -> Result<Self> {
        Self::with_provider_factory(config, picasa_factory())
    }

    /// Create a service with a custom remote album client.
    pub fn with_provider_factory(config: CoreConfig, provider_factory: ProviderFactory) -> Result<Self> {
        config.settings.validate()?;
        let channel = Arc::new(PrivilegedChannel::new(config.privileged_shell.clone()));

        Ok(Self {
            config: Arc::new(config),
            provider_factory,
            event_bus: Arc::new(EventBus::default()),
            channel,
            active: Arc::new(Mutex::new(None)),
        })
    }

    /// Receive sync progress and photo-changed notifications.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .map(|active| active.is_some())
            .unwrap_or(false)
    }

    /// Request the running sync to stop after its current step.
    ///
    /// Returns `false` when no sync is running.
    pub fn cancel(&self) -> bool {
        let Ok(active) = self.active.lock() else {
            return false;
        };
        match active.as_ref() {
            Some(token) => {
                info!("Cancelling photo sync");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Synchronize the contact photos of `account`.
    ///
    /// Token and run-level failures are reported through the counters of
    /// the returned [`SyncReport`]; only misuse of the service is an error.
    #[instrument(skip(self))]
    pub async fn run_sync(&self, account: &str) -> Result<SyncReport> {
        let cancel = CancellationToken::new();
        let _guard = ActiveRun::register(&self.active, account, cancel.clone())?;

        let token = match self.fresh_token(account).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not obtain a service token");
                return Ok(self.token_failure(&e));
            }
        };

        let provider = (self.provider_factory)(&self.config, token);
        let writer = HighFidelityPhotoWriter::new(
            self.config.photo_store.clone(),
            self.channel.clone(),
            self.config.timer.clone(),
            &self.config.settings,
        );
        let engine = PhotoSyncEngine::new(
            provider,
            self.config.photo_store.clone(),
            writer,
            self.event_bus.clone(),
            self.config.settings.clone(),
        );

        Ok(engine.run(account, &cancel).await)
    }

    /// Fetch a token, invalidate it and fetch again so a cached token that
    /// already expired is never used.
    async fn fresh_token(&self, account: &str) -> std::result::Result<String, BridgeError> {
        let provider = &self.config.token_provider;
        let stale = provider.auth_token(account).await?;
        provider.invalidate_token(account, &stale).await?;
        provider.auth_token(account).await
    }

    fn token_failure(&self, err: &BridgeError) -> SyncReport {
        let mut report = SyncReport {
            aborted: true,
            ..Default::default()
        };
        if err.is_unauthorized() {
            report.auth_errors = 1;
        } else {
            report.io_errors = 1;
        }

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Failed {
                run_id: String::new(),
                message: err.to_string(),
                auth: err.is_unauthorized(),
            }))
            .ok();

        report
    }
}

/// Marks a run active for as long as it is alive.
struct ActiveRun<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
}

impl<'a> ActiveRun<'a> {
    fn register(
        slot: &'a Mutex<Option<CancellationToken>>,
        account: &str,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let mut active = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if active.is_some() {
            return Err(CoreError::SyncInProgress {
                account: account.to_string(),
            });
        }
        *active = Some(cancel);
        Ok(Self { slot })
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let mut active = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *active = None;
    }
}
