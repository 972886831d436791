//! # Attachment Module
//!
//! Attachment descriptors and the resolver that produces them. The dialog
//! core only sees the [`AttachmentResolver`] trait; [`FileAttachmentResolver`]
//! is the deployed implementation reading images from a configured directory.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dialog_config::AttachmentConfig;
use crate::dialog_errors::DialogError;

/// The three attachment flavours offered by the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentKind {
    Inline,
    Uploaded,
    Internet,
}

impl AttachmentKind {
    pub const ALL: [AttachmentKind; 3] = [
        AttachmentKind::Inline,
        AttachmentKind::Uploaded,
        AttachmentKind::Internet,
    ];
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentKind::Inline => write!(f, "inline"),
            AttachmentKind::Uploaded => write!(f, "uploaded"),
            AttachmentKind::Internet => write!(f, "internet"),
        }
    }
}

/// Where the attachment bytes live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentRef {
    /// Base64 payload carried in the message itself
    Inline { data: String },
    /// Reference returned by an upload store
    Uploaded { uri: String },
    /// Publicly reachable URL
    External { url: String },
}

/// Attachment ready to be sent with an outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub name: String,
    pub content_type: String,
    pub content: ContentRef,
}

impl AttachmentDescriptor {
    /// Content URL as a client would see it; inline payloads become `data:` URIs
    pub fn content_url(&self) -> String {
        match &self.content {
            ContentRef::Inline { data } => format!("data:{};base64,{}", self.content_type, data),
            ContentRef::Uploaded { uri } => uri.clone(),
            ContentRef::External { url } => url.clone(),
        }
    }

    /// Raw bytes of an inline payload
    pub fn inline_bytes(&self) -> Option<Vec<u8>> {
        match &self.content {
            ContentRef::Inline { data } => BASE64.decode(data).ok(),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Produces a descriptor for a menu selection
#[async_trait]
pub trait AttachmentResolver: Send + Sync {
    async fn resolve(&self, kind: AttachmentKind) -> Result<AttachmentDescriptor, DialogError>;
}

/// File already held by an upload store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub uri: String,
    pub content_type: String,
}

/// Uploads bytes to the channel and returns a reference usable in later messages
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// A previous upload under `name`, checked before the resource is read
    async fn lookup(&self, _name: &str) -> Option<StoredFile> {
        None
    }

    async fn upload(&self, name: &str, content_type: &str, bytes: Vec<u8>)
        -> anyhow::Result<String>;
}

/// Map image magic bytes to a MIME type
pub fn detect_image_content_type(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

/// Resolver backed by a resource directory, an optional upload store and HTTP
pub struct FileAttachmentResolver {
    config: AttachmentConfig,
    store: Option<Arc<dyn AttachmentStore>>,
    http: reqwest::Client,
}

impl FileAttachmentResolver {
    pub fn new(config: AttachmentConfig) -> Self {
        Self {
            config,
            store: None,
            http: reqwest::Client::new(),
        }
    }

    /// Attach the store used for `Uploaded` attachments
    pub fn with_store(mut self, store: Arc<dyn AttachmentStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn resource_path(&self, file_name: &str) -> PathBuf {
        self.config.resource_dir.join(file_name)
    }

    /// Read an image resource and detect its content type
    async fn read_image(
        &self,
        kind: AttachmentKind,
        file_name: &str,
    ) -> Result<(Vec<u8>, &'static str), DialogError> {
        let path = self.resource_path(file_name);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            DialogError::resolution(kind, format!("cannot read {}: {e}", path.display()))
        })?;

        let content_type = detect_image_content_type(&bytes).ok_or_else(|| {
            DialogError::resolution(kind, format!("{} is not a supported image", path.display()))
        })?;

        debug!(path = %path.display(), bytes = bytes.len(), content_type, "Loaded attachment resource");
        Ok((bytes, content_type))
    }

    async fn resolve_inline(&self) -> Result<AttachmentDescriptor, DialogError> {
        let kind = AttachmentKind::Inline;
        let (bytes, content_type) = self.read_image(kind, &self.config.inline_file).await?;

        if bytes.len() as u64 > self.config.max_inline_bytes {
            return Err(DialogError::resolution(
                kind,
                format!(
                    "{} bytes exceeds the inline limit of {} bytes",
                    bytes.len(),
                    self.config.max_inline_bytes
                ),
            ));
        }

        Ok(AttachmentDescriptor {
            name: self.config.inline_file.clone(),
            content_type: content_type.to_string(),
            content: ContentRef::Inline {
                data: BASE64.encode(&bytes),
            },
        })
    }

    async fn resolve_uploaded(&self) -> Result<AttachmentDescriptor, DialogError> {
        let kind = AttachmentKind::Uploaded;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| DialogError::resolution(kind, "no upload store configured"))?;

        if let Some(stored) = store.lookup(&self.config.uploaded_file).await {
            debug!(name = %self.config.uploaded_file, uri = %stored.uri, "Reusing uploaded attachment");
            return Ok(AttachmentDescriptor {
                name: self.config.uploaded_file.clone(),
                content_type: stored.content_type,
                content: ContentRef::Uploaded { uri: stored.uri },
            });
        }

        let (bytes, content_type) = self.read_image(kind, &self.config.uploaded_file).await?;
        let uri = store
            .upload(&self.config.uploaded_file, content_type, bytes)
            .await
            .map_err(|e| DialogError::resolution(kind, format!("upload failed: {e:#}")))?;

        info!(name = %self.config.uploaded_file, uri = %uri, "Attachment uploaded");
        Ok(AttachmentDescriptor {
            name: self.config.uploaded_file.clone(),
            content_type: content_type.to_string(),
            content: ContentRef::Uploaded { uri },
        })
    }

    async fn resolve_internet(&self) -> Result<AttachmentDescriptor, DialogError> {
        let kind = AttachmentKind::Internet;
        let url = reqwest::Url::parse(&self.config.internet_url)
            .map_err(|e| DialogError::resolution(kind, format!("invalid URL: {e}")))?;

        if self.config.probe_internet {
            let response = self
                .http
                .head(url.clone())
                .timeout(Duration::from_secs(self.config.probe_timeout_secs))
                .send()
                .await
                .map_err(|e| DialogError::resolution(kind, format!("probe failed: {e}")))?;

            if !response.status().is_success() {
                warn!(url = %url, status = %response.status(), "External attachment probe failed");
                return Err(DialogError::resolution(
                    kind,
                    format!("probe returned {}", response.status()),
                ));
            }
        }

        Ok(AttachmentDescriptor {
            name: self.config.internet_name.clone(),
            content_type: "image/png".to_string(),
            content: ContentRef::External {
                url: url.to_string(),
            },
        })
    }
}

#[async_trait]
impl AttachmentResolver for FileAttachmentResolver {
    async fn resolve(&self, kind: AttachmentKind) -> Result<AttachmentDescriptor, DialogError> {
        match kind {
            AttachmentKind::Inline => self.resolve_inline().await,
            AttachmentKind::Uploaded => self.resolve_uploaded().await,
            AttachmentKind::Internet => self.resolve_internet().await,
        }
    }
}
