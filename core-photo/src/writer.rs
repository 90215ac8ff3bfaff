//! Full-fidelity contact photo writes.

use bridge_traits::contacts::ContactPhotoStore;
use bridge_traits::time::Timer;
use core_runtime::config::SyncSettings;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{PhotoError, Result};
use crate::poll::{BoundedPoller, PollOutcome, PollPolicy};
use crate::privileged::{PrivilegedChannel, PrivilegedScript};

/// Result of [`HighFidelityPhotoWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The original bytes replaced the store's copy.
    Success,
    /// Only the recompressed copy is stored; it is valid and readable.
    PrivilegeUnavailable,
    /// The store never produced a usable photo file.
    IoFailure(String),
    /// Stopped part way; the stored photo is in an unknown state.
    Cancelled,
}

impl WriteOutcome {
    /// Whether the contact now has a stored photo the caller may hash.
    pub fn is_stored(&self) -> bool {
        matches!(self, WriteOutcome::Success | WriteOutcome::PrivilegeUnavailable)
    }
}

/// Writes images as contact photos without the store's recompression.
///
/// Protocol, in order:
/// 1. clear the existing photo (best effort)
/// 2. stream the image through the store's public path, which allocates a
///    photo file but recompresses its content
/// 3. poll for the allocated file id
/// 4. poll until the allocated file can be opened
/// 5. through the privileged channel, hand the source file to the store's
///    owner, move it over the allocated file and signal the owner to restart
///
/// Steps 3 and 4 each get the full poll budget. The source file is consumed
/// by step 5 on success and left in place otherwise.
pub struct HighFidelityPhotoWriter {
    store: Arc<dyn ContactPhotoStore>,
    channel: Arc<PrivilegedChannel>,
    poller: BoundedPoller,
    chunk_size: usize,
}

impl HighFidelityPhotoWriter {
    pub fn new(
        store: Arc<dyn ContactPhotoStore>,
        channel: Arc<PrivilegedChannel>,
        timer: Arc<dyn Timer>,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            store,
            channel,
            poller: BoundedPoller::new(timer, PollPolicy::from_settings(settings)),
            chunk_size: settings.chunk_size.max(1),
        }
    }

    pub fn channel(&self) -> &Arc<PrivilegedChannel> {
        &self.channel
    }

    /// Store the image at `source` as the photo of `contact_id`.
    ///
    /// With `allow_privileged` false the protocol stops after step 4 and
    /// reports [`WriteOutcome::PrivilegeUnavailable`].
    #[instrument(skip(self, source, cancel))]
    pub async fn write(
        &self,
        contact_id: i64,
        source: &Path,
        allow_privileged: bool,
        cancel: &CancellationToken,
    ) -> WriteOutcome {
        match self
            .write_inner(contact_id, source, allow_privileged, cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(PhotoError::Cancelled) => {
                info!("Photo write cancelled");
                WriteOutcome::Cancelled
            }
            Err(e) => {
                warn!(error = %e, "Photo write failed");
                WriteOutcome::IoFailure(e.to_string())
            }
        }
    }

    async fn write_inner(
        &self,
        contact_id: i64,
        source: &Path,
        allow_privileged: bool,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        if let Err(e) = self.store.clear_photo(contact_id).await {
            warn!(error = %e, "Clearing previous photo failed");
        }

        self.write_recompressed(contact_id, source, cancel).await?;

        let store = &self.store;
        let file_id = match self
            .poller
            .poll(cancel, || async move {
                store.photo_file_id(contact_id).await.ok().flatten()
            })
            .await
        {
            PollOutcome::Ready(file_id) => file_id,
            PollOutcome::TimedOut { waited } => {
                return Err(PhotoError::FileIdTimeout { contact_id, waited })
            }
            PollOutcome::Cancelled => return Err(PhotoError::Cancelled),
        };
        debug!(file_id, "Store allocated photo file");

        match self
            .poller
            .poll(cancel, || async move {
                matches!(store.open_photo_reader(contact_id).await, Ok(Some(_))).then_some(())
            })
            .await
        {
            PollOutcome::Ready(()) => {}
            PollOutcome::TimedOut { waited } => {
                return Err(PhotoError::FileUnreadable { contact_id, waited })
            }
            PollOutcome::Cancelled => return Err(PhotoError::Cancelled),
        }

        if !allow_privileged {
            debug!("Privileged substitution disabled; keeping recompressed copy");
            return Ok(WriteOutcome::PrivilegeUnavailable);
        }
        if cancel.is_cancelled() {
            return Err(PhotoError::Cancelled);
        }

        let owner = match self.store.owner_process().await {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                warn!("Photo store owner could not be resolved");
                return Ok(WriteOutcome::PrivilegeUnavailable);
            }
            Err(e) => {
                warn!(error = %e, "Photo store owner lookup failed");
                return Ok(WriteOutcome::PrivilegeUnavailable);
            }
        };

        let target = owner.photo_dir.join(file_id.to_string());
        let mut script = PrivilegedScript::new()
            .chown(source, owner.uid)
            .chmod(source, "600")
            .rename(source, &target);
        if let Some(pid) = owner.pid {
            script = script.kill(pid);
        }

        if self.channel.run(&script).await {
            info!(file_id, "Stored full-size photo");
            Ok(WriteOutcome::Success)
        } else {
            warn!("Privileged substitution refused; keeping recompressed copy");
            Ok(WriteOutcome::PrivilegeUnavailable)
        }
    }

    /// Step 2: stream `source` through the store's public write path.
    async fn write_recompressed(
        &self,
        contact_id: i64,
        source: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut file = tokio::fs::File::open(source).await?;
        let mut sink = self.store.open_photo_sink(contact_id).await?;
        let mut buffer = vec![0u8; self.chunk_size];
        let mut written = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(PhotoError::Cancelled);
            }
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            sink.write_chunk(&buffer[..read]).await?;
            written += read as u64;
        }

        sink.commit().await?;
        debug!(bytes = written, "Wrote photo through store");
        Ok(())
    }

    /// Signal the store's owning process to restart, returning its pid.
    pub async fn restart_consumer(&self) -> Option<u32> {
        let pid = match self.store.owner_process().await {
            Ok(Some(owner)) => owner.pid?,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Photo store owner lookup failed");
                return None;
            }
        };

        if self.channel.run(&PrivilegedScript::new().kill(pid)).await {
            info!(pid, "Signalled photo store to restart");
            Some(pid)
        } else {
            warn!(pid, "Photo store restart refused");
            None
        }
    }
}
