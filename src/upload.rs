use std::path::Path;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::Service;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::error::UploadError;
use crate::task::TaskHandle;
use crate::transport::AnalysisTransport;

/// A user-selected image, ready to be submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl ImageUpload {
    /// The MIME type is sniffed from the bytes; anything that does not look
    /// like an image is rejected.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, UploadError> {
        let format = image::guess_format(&bytes)
            .map_err(|e| UploadError::UnsupportedImage(e.to_string()))?;
        Ok(Self {
            file_name: file_name.into(),
            content_type: format.to_mime_type().to_string(),
            bytes,
        })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Self::from_bytes(file_name, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Turns a selected image into a task handle.
pub struct UploadTrigger<T: ?Sized> {
    transport: Arc<T>,
    max_upload_bytes: usize,
}

impl<T: ?Sized> Clone for UploadTrigger<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

impl<T> UploadTrigger<T>
where
    T: AnalysisTransport + ?Sized,
{
    pub fn new(transport: Arc<T>, max_upload_bytes: usize) -> Self {
        Self {
            transport,
            max_upload_bytes,
        }
    }

    #[instrument(skip_all, fields(file = %image.file_name(), attempt = %Uuid::new_v4()))]
    pub async fn submit(&self, image: &ImageUpload) -> Result<TaskHandle, UploadError> {
        if image.len() > self.max_upload_bytes {
            return Err(UploadError::TooLarge {
                size: image.len(),
                limit: self.max_upload_bytes,
            });
        }

        let response = self.transport.submit(image).await.map_err(|e| {
            error!("Upload rejected: {}", e);
            UploadError::Rejected(e)
        })?;

        match response.into_handle() {
            Some(handle) => {
                info!("Upload accepted as task {}", handle);
                Ok(handle)
            }
            None => {
                error!("Upload reply carried no task id");
                Err(UploadError::MissingTaskId)
            }
        }
    }
}

impl<T> Service<ImageUpload> for UploadTrigger<T>
where
    T: AnalysisTransport + ?Sized + 'static,
{
    type Response = TaskHandle;
    type Error = UploadError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, image: ImageUpload) -> Self::Future {
        let trigger = self.clone();
        Box::pin(async move { trigger.submit(&image).await })
    }
}
