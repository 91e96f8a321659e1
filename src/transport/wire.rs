use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::task::{HazardRecord, RemoteStatus, ResultPayload, TaskHandle};

/// Body of the submit reply: `{"taskId": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl SubmitResponse {
    pub fn with_task_id(task_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
        }
    }

    /// An empty id counts as missing.
    pub fn into_handle(self) -> Option<TaskHandle> {
        self.task_id
            .filter(|id| !id.trim().is_empty())
            .map(TaskHandle::new)
    }
}

/// Body of the status reply before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A status reply with its payload resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskReport {
    InProgress(RemoteStatus),
    Completed(ResultPayload),
    Failed(String),
}

impl From<StatusResponse> for TaskReport {
    fn from(response: StatusResponse) -> Self {
        match response.status {
            RemoteStatus::Completed => TaskReport::Completed(normalize_payload(response.data)),
            RemoteStatus::Failed => TaskReport::Failed(
                response
                    .detail
                    .unwrap_or_else(|| "the server did not give a reason".to_string()),
            ),
            status => TaskReport::InProgress(status),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PayloadShape {
    Wrapped { result: Vec<HazardRecord> },
    Bare(Vec<HazardRecord>),
}

/// Accepts both `{"result": [...]}` and a bare `[...]`.
pub fn normalize_payload(data: Option<Value>) -> ResultPayload {
    let Some(data) = data.filter(|value| !value.is_null()) else {
        warn!("Completed task carried no data");
        return ResultPayload::Unreadable;
    };
    match serde_json::from_value::<PayloadShape>(data) {
        Ok(PayloadShape::Wrapped { result }) | Ok(PayloadShape::Bare(result)) => {
            ResultPayload::Hazards(result)
        }
        Err(e) => {
            warn!("Completed task data has an unexpected shape: {}", e);
            ResultPayload::Unreadable
        }
    }
}
