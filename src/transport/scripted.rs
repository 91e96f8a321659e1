use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::TransportError;
use crate::task::{RemoteStatus, ResultPayload, TaskHandle};
use crate::transport::{AnalysisTransport, SubmitResponse, TaskReport};
use crate::upload::ImageUpload;

/// One scripted answer to a status query.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Report(TaskReport),
    Fail(String),
    Delayed(Duration, TaskReport),
}

impl Step {
    pub(crate) fn pending() -> Self {
        Step::Report(TaskReport::InProgress(RemoteStatus::Pending))
    }

    pub(crate) fn completed(payload: ResultPayload) -> Self {
        Step::Report(TaskReport::Completed(payload))
    }
}

/// In-memory backend. Unscripted queries answer `pending`, unscripted uploads
/// receive a fresh task id.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    submits: Mutex<VecDeque<Result<SubmitResponse, String>>>,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    queries: Mutex<Vec<(String, Instant)>>,
    uploads: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(self, handle: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(handle.to_string(), steps.into());
        self
    }

    pub(crate) fn submit_reply(self, reply: Result<SubmitResponse, String>) -> Self {
        self.submits.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn queries(&self) -> Vec<(String, Instant)> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn query_count(&self, handle: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(queried, _)| queried == handle)
            .count()
    }

    pub(crate) fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisTransport for ScriptedTransport {
    async fn submit(&self, image: &ImageUpload) -> Result<SubmitResponse, TransportError> {
        self.uploads
            .lock()
            .unwrap()
            .push(image.file_name().to_string());
        let reply = self.submits.lock().unwrap().pop_front();
        match reply {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(TransportError::Unavailable(reason)),
            None => Ok(SubmitResponse::with_task_id(Uuid::new_v4().to_string())),
        }
    }

    async fn task_status(&self, handle: &TaskHandle) -> Result<TaskReport, TransportError> {
        self.queries
            .lock()
            .unwrap()
            .push((handle.as_str().to_string(), Instant::now()));
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(handle.as_str())
            .and_then(|steps| steps.pop_front())
            .unwrap_or_else(Step::pending);
        match step {
            Step::Report(report) => Ok(report),
            Step::Fail(reason) => Err(TransportError::Unavailable(reason)),
            Step::Delayed(delay, report) => {
                tokio::time::sleep(delay).await;
                Ok(report)
            }
        }
    }
}
