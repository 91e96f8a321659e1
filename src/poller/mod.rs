mod callbacks;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Configuration;
use crate::error::PollError;
use crate::task::TaskHandle;
use crate::transport::{AnalysisTransport, TaskReport};

pub use callbacks::{CompletedCallback, ErrorCallback, PollCallbacks, StatusCallback};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOptions {
    pub interval: Duration,
    /// Keep polling after a failed status query instead of abandoning the task.
    pub continue_on_error: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            continue_on_error: true,
        }
    }
}

impl From<&Configuration> for PollOptions {
    fn from(configuration: &Configuration) -> Self {
        Self {
            interval: configuration.poll_interval,
            continue_on_error: configuration.continue_on_error,
        }
    }
}

struct ActivePoll {
    handle: TaskHandle,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the polling loop of at most one task at a time.
///
/// Queries for a handle are strictly sequential: the next one is scheduled
/// only after the previous one settled. Assigning a new handle, clearing it,
/// or dropping the poller cancels the loop of the old handle. Once
/// [`TaskPoller::track`] or [`TaskPoller::stop`] returns, no callback of the
/// old loop runs again, including callbacks of a query that was in flight.
pub struct TaskPoller<T: ?Sized> {
    transport: Arc<T>,
    options: PollOptions,
    active: Option<ActivePoll>,
}

impl<T> TaskPoller<T>
where
    T: AnalysisTransport + ?Sized + 'static,
{
    pub fn new(transport: Arc<T>, options: PollOptions) -> Self {
        Self {
            transport,
            options,
            active: None,
        }
    }

    pub fn options(&self) -> PollOptions {
        self.options
    }

    /// The handle currently being tracked, if any.
    pub fn current(&self) -> Option<&TaskHandle> {
        self.active.as_ref().map(|active| &active.handle)
    }

    pub fn is_polling(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Replaces the tracked handle. The previous loop is cancelled first; a
    /// `None` handle only cancels. The first query for a new handle is issued
    /// immediately.
    pub async fn track(&mut self, handle: Option<TaskHandle>, callbacks: PollCallbacks) {
        self.stop().await;
        let Some(handle) = handle else {
            return;
        };

        debug!("Start polling task {}", handle);
        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(poll_until_done(
            self.transport.clone(),
            handle.clone(),
            self.options,
            callbacks,
            cancel_token.clone(),
        ));
        self.active = Some(ActivePoll {
            handle,
            cancel_token,
            task,
        });
    }

    /// Cancels the current loop and waits until it has wound down.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.cancel_token.cancel();
        if let Err(e) = active.task.await {
            warn!("Polling task for {} ended abnormally: {}", active.handle, e);
        } else {
            debug!("Stopped polling task {}", active.handle);
        }
    }
}

impl<T: ?Sized> Drop for TaskPoller<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel_token.cancel();
            active.task.abort();
        }
    }
}

// A task that never settles keeps counting without wrapping.
fn next_attempt(attempt: u64) -> u64 {
    attempt.saturating_add(1)
}

#[instrument(skip_all, fields(task = %handle))]
async fn poll_until_done<T>(
    transport: Arc<T>,
    handle: TaskHandle,
    options: PollOptions,
    callbacks: PollCallbacks,
    cancel_token: CancellationToken,
) where
    T: AnalysisTransport + ?Sized,
{
    let PollCallbacks {
        on_completed,
        mut on_status,
        mut on_error,
    } = callbacks;
    let mut attempt: u64 = 0;

    loop {
        attempt = next_attempt(attempt);
        let outcome = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!("Cancelled with query {} in flight", attempt);
                return;
            }
            outcome = transport.task_status(&handle) => outcome,
        };
        if cancel_token.is_cancelled() {
            return;
        }

        match outcome {
            Ok(TaskReport::Completed(payload)) => {
                info!("Task completed after {} queries", attempt);
                on_completed(payload);
                return;
            }
            Ok(TaskReport::Failed(detail)) => {
                warn!("Task failed on the server: {}", detail);
                if let Some(on_error) = on_error.as_mut() {
                    on_error(PollError::TaskFailed(detail));
                }
                return;
            }
            Ok(TaskReport::InProgress(status)) => {
                debug!("Query {} reported {}", attempt, status);
                if let Some(on_status) = on_status.as_mut() {
                    on_status(status);
                }
            }
            Err(e) => {
                warn!("Query {} failed: {}", attempt, e);
                if let Some(on_error) = on_error.as_mut() {
                    on_error(PollError::Query(e));
                }
                if !options.continue_on_error {
                    return;
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return,
            _ = tokio::time::sleep(options.interval) => {}
        }
    }
}
