use async_trait::async_trait;
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::config::Configuration;
use crate::error::TransportError;
use crate::task::TaskHandle;
use crate::transport::{AnalysisTransport, StatusResponse, SubmitResponse, TaskReport};
use crate::upload::ImageUpload;

/// Talks to the analysis backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

impl HttpTransport {
    pub fn new(configuration: &Configuration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(configuration.request_timeout)
            .build()?;
        let base_url = Url::parse(&configuration.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", configuration.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(configuration.base_url.clone()));
        }
        Ok(Self { client, base_url })
    }

    /// Appends each segment percent-encoded, so a task id stays one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn success_body(response: reqwest::Response) -> Result<Vec<u8>, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // FastAPI-style errors wrap the message in {"detail": ...}.
            let body = serde_json::from_str::<ErrorBody>(&text)
                .map(|error| error.detail)
                .unwrap_or(text);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn submit(&self, image: &ImageUpload) -> Result<SubmitResponse, TransportError> {
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name().to_string())
            .mime_str(image.content_type())?;
        let form = Form::new().part("file", part);

        let url = self.endpoint(&["analyze"])?;
        debug!("POST {} ({} bytes)", url, image.len());
        let response = self.client.post(url).multipart(form).send().await?;
        let body = Self::success_body(response).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn task_status(&self, handle: &TaskHandle) -> Result<TaskReport, TransportError> {
        let url = self.endpoint(&["task", handle.as_str()])?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let body = Self::success_body(response).await?;
        let status: StatusResponse = serde_json::from_slice(&body)?;
        Ok(status.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{RemoteStatus, ResultPayload};
    use axum::{
        Json, Router,
        body::Bytes,
        extract::Path,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::{Value, json};

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    async fn spawn_backend(router: Router) -> Configuration {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Configuration::default().base_url(format!("http://{}/api/", addr))
    }

    fn backend() -> Router {
        Router::new()
            .route(
                "/api/analyze",
                post(|body: Bytes| async move {
                    let has_file = body
                        .windows(b"filename=\"food.png\"".len())
                        .any(|window| window == b"filename=\"food.png\"");
                    if has_file {
                        (StatusCode::ACCEPTED, Json(json!({"taskId": "task-1"})))
                    } else {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"detail": "Only image files are allowed."})),
                        )
                    }
                }),
            )
            .route(
                "/api/task/{id}",
                get(|Path(id): Path<String>| async move {
                    match id.as_str() {
                        "pending" => (StatusCode::OK, Json(json!({"status": "pending"}))),
                        "odd/id?x=1" => (StatusCode::OK, Json(json!({"status": "failed", "detail": id}))),
                        "done" => (
                            StatusCode::OK,
                            Json(json!({
                                "status": "completed",
                                "data": {"result": [{"name": "Onion", "description": "Anemia"}]}
                            })),
                        ),
                        _ => (
                            StatusCode::NOT_FOUND,
                            Json::<Value>(json!({"detail": "Task not found."})),
                        ),
                    }
                }),
            )
    }

    #[tokio::test]
    async fn test_submit_posts_multipart_file() {
        let configuration = spawn_backend(backend()).await;
        let transport = HttpTransport::new(&configuration).unwrap();
        let image = ImageUpload::from_bytes("food.png", PNG_MAGIC.to_vec()).unwrap();

        let response = transport.submit(&image).await.unwrap();
        assert_eq!(response.into_handle(), Some(TaskHandle::new("task-1")));
    }

    #[tokio::test]
    async fn test_task_status_reports() {
        let configuration = spawn_backend(backend()).await;
        let transport = HttpTransport::new(&configuration).unwrap();

        let pending = transport
            .task_status(&TaskHandle::new("pending"))
            .await
            .unwrap();
        assert_eq!(pending, TaskReport::InProgress(RemoteStatus::Pending));

        let done = transport
            .task_status(&TaskHandle::new("done"))
            .await
            .unwrap();
        match done {
            TaskReport::Completed(ResultPayload::Hazards(records)) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].name, "Onion");
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_task_is_a_status_error() {
        let configuration = spawn_backend(backend()).await;
        let transport = HttpTransport::new(&configuration).unwrap();

        let err = transport
            .task_status(&TaskHandle::new("missing"))
            .await
            .unwrap_err();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "Task not found.");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_http_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let configuration = Configuration::default().base_url(format!("http://{}/api", addr));
        let transport = HttpTransport::new(&configuration).unwrap();
        let err = transport
            .task_status(&TaskHandle::new("pending"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
    }

    #[tokio::test]
    async fn test_task_id_is_a_single_encoded_segment() {
        let configuration = spawn_backend(backend()).await;
        let transport = HttpTransport::new(&configuration).unwrap();

        let report = transport
            .task_status(&TaskHandle::new("odd/id?x=1"))
            .await
            .unwrap();
        assert_eq!(report, TaskReport::Failed("odd/id?x=1".to_string()));

        let url = transport
            .endpoint(&["task", "odd/id?x=1"])
            .unwrap();
        assert!(url.as_str().ends_with("/api/task/odd%2Fid%3Fx=1"));
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let configuration = Configuration::default().base_url("not a url");
        assert!(matches!(
            HttpTransport::new(&configuration),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
