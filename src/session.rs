use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tower::ServiceExt;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::error::PollError;
use crate::poller::{PollCallbacks, PollOptions, TaskPoller};
use crate::presenter::{Rendering, present};
use crate::task::{RemoteStatus, ResultPayload, TaskHandle, TaskStatus};
use crate::transport::AnalysisTransport;
use crate::upload::{ImageUpload, UploadTrigger};

/// Poller callbacks become these, tagged with the handle they belong to.
#[derive(Debug)]
pub enum SessionEvent {
    Status(TaskHandle, RemoteStatus),
    Completed(TaskHandle, ResultPayload),
    Failed(TaskHandle, PollError),
}

impl SessionEvent {
    fn handle(&self) -> &TaskHandle {
        match self {
            SessionEvent::Status(handle, _)
            | SessionEvent::Completed(handle, _)
            | SessionEvent::Failed(handle, _) => handle,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub task: Option<TaskHandle>,
    pub status: TaskStatus,
    /// Only set once the task completed; cleared by every new upload.
    pub result: Option<ResultPayload>,
    pub uploaded: bool,
    pub error_message: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    /// No further events are expected for the current upload.
    pub settled: bool,
}

impl SessionState {
    pub fn rendering(&self) -> Rendering {
        present(
            self.status,
            self.result.as_ref(),
            self.uploaded,
            self.error_message.as_deref(),
        )
    }
}

/// Page-level owner of the single current-task slot.
pub struct AnalysisSession<T: ?Sized> {
    trigger: UploadTrigger<T>,
    poller: TaskPoller<T>,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    state: SessionState,
}

impl<T> AnalysisSession<T>
where
    T: AnalysisTransport + ?Sized + 'static,
{
    pub fn new(transport: Arc<T>, configuration: &Configuration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            trigger: UploadTrigger::new(transport.clone(), configuration.max_upload_bytes),
            poller: TaskPoller::new(transport, PollOptions::from(configuration)),
            events_tx,
            events_rx,
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn rendering(&self) -> Rendering {
        self.state.rendering()
    }

    pub fn is_settled(&self) -> bool {
        self.state.settled
    }

    /// Starts a new analysis, superseding any previous one. Submission
    /// failures land in the session state instead of being returned.
    pub async fn upload(&mut self, image: ImageUpload) -> Option<TaskHandle> {
        self.poller.stop().await;
        self.state = SessionState {
            status: TaskStatus::Pending,
            uploaded: true,
            submitted_at: Some(Utc::now()),
            ..SessionState::default()
        };

        match self.trigger.clone().oneshot(image).await {
            Ok(handle) => {
                self.state.task = Some(handle.clone());
                let callbacks = self.callbacks(&handle);
                self.poller.track(Some(handle.clone()), callbacks).await;
                Some(handle)
            }
            Err(e) => {
                warn!("Upload failed: {}", e);
                self.state.status = TaskStatus::Error;
                self.state.error_message = Some(e.to_string());
                self.state.settled = true;
                None
            }
        }
    }

    /// Drops the current task and everything known about it.
    pub async fn reset(&mut self) {
        self.poller.track(None, PollCallbacks::ignore()).await;
        self.state = SessionState::default();
    }

    /// Waits for the next event of the current task and applies it. Returns
    /// `None` when nothing is being tracked.
    pub async fn next_update(&mut self) -> Option<Rendering> {
        if self.state.task.is_none() || self.state.settled {
            return None;
        }
        loop {
            let event = self.events_rx.recv().await?;
            if self.apply(event) {
                return Some(self.rendering());
            }
        }
    }

    pub async fn wait_for_outcome(&mut self) -> Rendering {
        while self.next_update().await.is_some() {}
        self.rendering()
    }

    /// Applies one event; events of a superseded task are dropped.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        if self.state.task.as_ref() != Some(event.handle()) {
            debug!("Dropping event for stale task {}", event.handle());
            return false;
        }

        match event {
            SessionEvent::Status(_, _) => {
                self.state.status = TaskStatus::Pending;
                self.state.error_message = None;
            }
            SessionEvent::Completed(handle, payload) => {
                if let Some(submitted_at) = self.state.submitted_at {
                    let elapsed = Utc::now() - submitted_at;
                    info!(
                        "Task {} finished in {} ms",
                        handle,
                        elapsed.num_milliseconds()
                    );
                }
                self.state.status = TaskStatus::Completed;
                self.state.result = Some(payload);
                self.state.error_message = None;
                self.state.settled = true;
            }
            SessionEvent::Failed(_, e) => {
                self.state.status = TaskStatus::Error;
                // Query failures get the generic notice, server failures their reason.
                self.state.error_message = e.is_terminal().then(|| e.to_string());
                if e.is_terminal() || !self.poller.options().continue_on_error {
                    self.state.settled = true;
                }
            }
        }
        true
    }

    fn callbacks(&self, handle: &TaskHandle) -> PollCallbacks {
        let completed_tx = self.events_tx.clone();
        let status_tx = self.events_tx.clone();
        let error_tx = self.events_tx.clone();
        let (completed_handle, status_handle, error_handle) =
            (handle.clone(), handle.clone(), handle.clone());

        PollCallbacks::new(move |payload| {
            let _ = completed_tx.send(SessionEvent::Completed(completed_handle, payload));
        })
        .on_status(move |status| {
            let _ = status_tx.send(SessionEvent::Status(status_handle.clone(), status));
        })
        .on_error(move |e| {
            let _ = error_tx.send(SessionEvent::Failed(error_handle.clone(), e));
        })
    }
}
