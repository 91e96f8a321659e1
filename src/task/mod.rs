mod hazard;
mod status;

pub use hazard::{DangerLevel, HazardRecord, ResultPayload};
pub use status::{RemoteStatus, TaskHandle, TaskStatus};
