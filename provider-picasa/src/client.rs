//! Picasa Web Albums API client
//!
//! Implements [`PhotoAlbumProvider`] over the GData feeds at
//! `https://picasaweb.google.com/data`.

use async_trait::async_trait;
use bridge_traits::album::{PhotoAlbumProvider, RemoteAlbum, RemotePhoto};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::io::{DynAsyncWrite, UploadBody};
use bridge_traits::time::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::error::{PicasaError, Result};
use crate::multipart;
use crate::templates;
use crate::xml;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://picasaweb.google.com/data";

const ATOM_CONTENT_TYPE: &str = "application/atom+xml";
const MAX_RESULTS: u32 = 1_000_000;
/// Image size requested in photo feeds.
const FEED_IMAGE_MAX: u32 = 1600;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Picasa Web Albums client bound to one account token.
///
/// # Example
///
/// ```ignore
/// use provider_picasa::PicasaClient;
/// use bridge_traits::album::PhotoAlbumProvider;
///
/// let client = PicasaClient::new(http_client, auth_token);
/// let albums = client.list_albums().await?;
/// ```
pub struct PicasaClient {
    http_client: Arc<dyn HttpClient>,
    auth_token: String,
    clock: Arc<dyn Clock>,
    feed_base: String,
    entry_base: String,
}

impl PicasaClient {
    pub fn new(http_client: Arc<dyn HttpClient>, auth_token: impl Into<String>) -> Self {
        Self::with_base_url(http_client, auth_token, DEFAULT_BASE_URL)
    }

    /// Point the client at another API root, e.g. a local test server.
    pub fn with_base_url(
        http_client: Arc<dyn HttpClient>,
        auth_token: impl Into<String>,
        base_url: &str,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            http_client,
            auth_token: auth_token.into(),
            clock: Arc::new(SystemClock),
            feed_base: format!("{base}/feed/api/user/default"),
            entry_base: format!("{base}/entry/api/user/default"),
        }
    }

    /// Clock stamped into uploaded documents.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn request(&self, method: HttpMethod, url: impl Into<String>) -> HttpRequest {
        HttpRequest::new(method, url)
            .google_login(&self.auth_token)
            .timeout(REQUEST_TIMEOUT)
    }

    fn albums_url(&self) -> String {
        format!("{}?max-results={MAX_RESULTS}", self.feed_base)
    }

    fn album_entry_url(&self, album_id: &str) -> String {
        format!("{}/albumid/{album_id}", self.entry_base)
    }

    fn album_feed_url(&self, album_id: &str) -> String {
        format!("{}/albumid/{album_id}", self.feed_base)
    }

    fn photos_url(&self, album_id: &str) -> String {
        format!(
            "{}?imgmax={FEED_IMAGE_MAX}&max-results={MAX_RESULTS}",
            self.album_feed_url(album_id)
        )
    }

    /// Map statuses every operation treats alike.
    fn reject_unauthorized(status: u16, url: &str) -> Result<()> {
        if status == 403 {
            warn!(url, "Picasa rejected the auth token");
            return Err(PicasaError::Unauthorized(format!("HTTP 403 for {url}")));
        }
        Ok(())
    }

    fn api_error(response: &HttpResponse) -> PicasaError {
        PicasaError::ApiError {
            status_code: response.status,
            message: String::from_utf8_lossy(&response.body).trim().to_string(),
        }
    }

    /// Buffered request. GET and PUT are retried, POST and DELETE are sent once.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let policy = match request.method {
            HttpMethod::Get | HttpMethod::Put => RetryPolicy::default(),
            HttpMethod::Post | HttpMethod::Delete => RetryPolicy::none(),
        };
        let url = request.url.clone();
        let response = self.http_client.execute_with_retry(request, policy).await?;
        debug!(url = %url, status = response.status, "Picasa response");
        Self::reject_unauthorized(response.status, &url)?;
        Ok(response)
    }

    async fn fetch_feed(&self, url: String) -> Result<String> {
        let response = self.send(self.request(HttpMethod::Get, url)).await?;
        if response.status != 200 {
            return Err(Self::api_error(&response));
        }
        Ok(response.text()?)
    }

    fn first_entry(body: &str) -> Result<&str> {
        xml::entries(body)
            .into_iter()
            .next()
            .ok_or_else(|| PicasaError::ParseError("response contains no <entry>".to_string()))
    }

    fn is_saved(status: u16) -> bool {
        status == 200 || status == 201
    }

    async fn save_photo_inner(
        &self,
        photo: &RemotePhoto,
        content: Option<UploadBody>,
    ) -> Result<RemotePhoto> {
        let (method, url) = match (&photo.id, &content) {
            (None, _) => {
                let album_id = photo.album_id.as_deref().ok_or_else(|| {
                    PicasaError::InvalidRequest(format!("photo {} has no album", photo.title))
                })?;
                (HttpMethod::Post, self.album_feed_url(album_id))
            }
            (Some(_), None) => (HttpMethod::Put, Self::require(&photo.edit_url, "edit")?),
            (Some(_), Some(_)) => (
                HttpMethod::Put,
                Self::require(&photo.edit_media_url, "edit-media")?,
            ),
        };

        let document = templates::photo_entry(photo, self.clock.unix_timestamp_millis());
        let request = self.request(method, url.clone());

        let response = match content {
            None => {
                self.send(
                    request
                        .content_type(ATOM_CONTENT_TYPE)
                        .body(document.into_bytes()),
                )
                .await?
            }
            Some(image) => {
                let request = request
                    .content_type(multipart::CONTENT_TYPE)
                    .header("MIME-version", multipart::MIME_VERSION);
                let image_type = photo
                    .mime_type
                    .as_deref()
                    .unwrap_or(multipart::DEFAULT_IMAGE_TYPE);
                let body = multipart::related_body(document, image_type, image);
                let response = self.http_client.execute_streaming(request, body).await?;
                Self::reject_unauthorized(response.status, &url)?;
                response
            }
        };

        if !Self::is_saved(response.status) {
            return Err(Self::api_error(&response));
        }

        let body = response.text()?;
        Ok(xml::parse_photo(Self::first_entry(&body)?))
    }

    fn require(url: &Option<String>, rel: &str) -> Result<String> {
        url.clone()
            .ok_or_else(|| PicasaError::InvalidRequest(format!("entry has no {rel} link")))
    }
}

#[async_trait]
impl PhotoAlbumProvider for PicasaClient {
    #[instrument(skip(self))]
    async fn list_albums(&self) -> BridgeResult<Vec<RemoteAlbum>> {
        let body = self.fetch_feed(self.albums_url()).await?;
        let albums: Vec<RemoteAlbum> = xml::entries(&body)
            .into_iter()
            .map(xml::parse_album)
            .collect();

        info!("Listed {} albums", albums.len());
        Ok(albums)
    }

    #[instrument(skip(self))]
    async fn get_album(&self, id: &str) -> BridgeResult<Option<RemoteAlbum>> {
        let response = self
            .send(self.request(HttpMethod::Get, self.album_entry_url(id)))
            .await?;

        match response.status {
            200 => {
                let body = response.text()?;
                Ok(Some(xml::parse_album(Self::first_entry(&body)?)))
            }
            404 => {
                debug!(album_id = id, "Album not found");
                Ok(None)
            }
            _ => Err(Self::api_error(&response).into()),
        }
    }

    #[instrument(skip(self, album), fields(title = %album.title))]
    async fn save_album(&self, album: &RemoteAlbum) -> BridgeResult<RemoteAlbum> {
        let (method, url) = match &album.id {
            None => (HttpMethod::Post, self.feed_base.clone()),
            Some(_) => (HttpMethod::Put, Self::require(&album.edit_url, "edit")?),
        };

        let document = templates::album_entry(album, self.clock.unix_timestamp_millis());
        let response = self
            .send(
                self.request(method, url)
                    .content_type(ATOM_CONTENT_TYPE)
                    .body(document.into_bytes()),
            )
            .await?;

        if !Self::is_saved(response.status) {
            return Err(Self::api_error(&response).into());
        }

        let body = response.text()?;
        let saved = xml::parse_album(Self::first_entry(&body)?);
        info!(album_id = ?saved.id, "Saved album");
        Ok(saved)
    }

    #[instrument(skip(self))]
    async fn list_photos(&self, album_id: &str) -> BridgeResult<Vec<RemotePhoto>> {
        let body = self.fetch_feed(self.photos_url(album_id)).await?;
        let photos: Vec<RemotePhoto> = xml::entries(&body)
            .into_iter()
            .map(xml::parse_photo)
            .collect();

        info!("Listed {} photos", photos.len());
        Ok(photos)
    }

    #[instrument(skip(self, photo, content), fields(title = %photo.title, upload = content.is_some()))]
    async fn save_photo(
        &self,
        photo: &RemotePhoto,
        content: Option<UploadBody>,
    ) -> BridgeResult<RemotePhoto> {
        let saved = self.save_photo_inner(photo, content).await?;
        info!(photo_id = ?saved.id, updated = ?saved.updated, "Saved photo");
        Ok(saved)
    }

    #[instrument(skip(self, photo, sink), fields(title = %photo.title))]
    async fn download_photo(
        &self,
        photo: &RemotePhoto,
        sink: &mut DynAsyncWrite,
    ) -> BridgeResult<u64> {
        let url = Self::require(&photo.content_url, "content")?;
        let mut response = self
            .http_client
            .download_stream(self.request(HttpMethod::Get, url.clone()))
            .await?;

        Self::reject_unauthorized(response.status, &url)?;
        match response.status {
            200 => {}
            404 => return Err(PicasaError::NotFound { url }.into()),
            status => {
                return Err(PicasaError::ApiError {
                    status_code: status,
                    message: format!("download of {url} failed"),
                }
                .into())
            }
        }

        let copied = tokio::io::copy(&mut response.body, sink).await?;
        sink.flush().await?;
        debug!(bytes = copied, "Downloaded photo");
        Ok(copied)
    }

    #[instrument(skip(self, photo), fields(title = %photo.title))]
    async fn delete_photo(&self, photo: &RemotePhoto) -> BridgeResult<bool> {
        let url = Self::require(&photo.edit_url, "edit")?;
        let response = self.send(self.request(HttpMethod::Delete, url)).await?;

        let deleted = response.status == 200;
        if !deleted {
            warn!(status = response.status, "Photo delete refused");
        }
        Ok(deleted)
    }
}
