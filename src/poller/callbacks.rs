use crate::error::PollError;
use crate::task::{RemoteStatus, ResultPayload};

pub type CompletedCallback = Box<dyn FnOnce(ResultPayload) + Send>;
pub type StatusCallback = Box<dyn FnMut(RemoteStatus) + Send>;
pub type ErrorCallback = Box<dyn FnMut(PollError) + Send>;

/// Caller-supplied reactions to one polling loop. The completion callback is
/// consumed when it fires, so it can only ever run once per handle.
pub struct PollCallbacks {
    pub(super) on_completed: CompletedCallback,
    pub(super) on_status: Option<StatusCallback>,
    pub(super) on_error: Option<ErrorCallback>,
}

impl PollCallbacks {
    pub fn new(on_completed: impl FnOnce(ResultPayload) + Send + 'static) -> Self {
        Self {
            on_completed: Box::new(on_completed),
            on_status: None,
            on_error: None,
        }
    }

    /// Called with every non-terminal status the server reports.
    pub fn on_status(mut self, on_status: impl FnMut(RemoteStatus) + Send + 'static) -> Self {
        self.on_status = Some(Box::new(on_status));
        self
    }

    pub fn on_error(mut self, on_error: impl FnMut(PollError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Callbacks for a loop whose outcome nobody observes.
    pub fn ignore() -> Self {
        Self::new(|_| {})
    }
}
