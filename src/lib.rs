pub mod config;
pub mod error;
pub mod poller;
pub mod presenter;
pub mod session;
pub mod task;
pub mod transport;
pub mod upload;

pub use crate::config::Configuration;
pub use crate::error::{AppError, ConfigError, PollError, TransportError, UploadError};
pub use crate::poller::{PollCallbacks, PollOptions, TaskPoller};
pub use crate::presenter::{Rendering, present};
pub use crate::session::{AnalysisSession, SessionEvent, SessionState};
pub use crate::task::{DangerLevel, HazardRecord, RemoteStatus, ResultPayload, TaskHandle, TaskStatus};
pub use crate::transport::{AnalysisTransport, HttpTransport};
pub use crate::upload::{ImageUpload, UploadTrigger};
