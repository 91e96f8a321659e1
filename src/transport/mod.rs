mod http;
#[cfg(test)]
pub(crate) mod scripted;
mod wire;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::task::TaskHandle;
use crate::upload::ImageUpload;

pub use http::HttpTransport;
pub use wire::{StatusResponse, SubmitResponse, TaskReport, normalize_payload};

/// The two calls the client makes against the analysis backend.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    /// Submits one image. A successful reply may still lack a task handle.
    async fn submit(&self, image: &ImageUpload) -> Result<SubmitResponse, TransportError>;

    /// Fetches the status, and once completed the result, of a task.
    async fn task_status(&self, handle: &TaskHandle) -> Result<TaskReport, TransportError>;
}
