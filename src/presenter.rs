use std::fmt;

use crate::task::{HazardRecord, ResultPayload, TaskStatus};

pub const RESULT_HEADER: &str = "Analysis result";
pub const IN_PROGRESS_TEXT: &str = "Analyzing...";
pub const DEFAULT_ERROR_TEXT: &str = "An error occurred during analysis.";
pub const NO_RESULTS_TEXT: &str = "No results.";
pub const UNREADABLE_TEXT: &str = "The analysis finished but the result could not be read.";
pub const DEFAULT_HAZARD_IMAGE: &str = "/assets/ppg.png";

#[derive(Debug, Clone, PartialEq)]
pub enum Rendering {
    /// Nothing has been uploaded yet.
    Nothing,
    InProgress,
    Error(String),
    NoResults,
    Unreadable,
    Hazards(Vec<HazardRecord>),
}

/// Chooses what to show for the current page state. Pure; no I/O.
pub fn present(
    status: TaskStatus,
    result: Option<&ResultPayload>,
    uploaded: bool,
    error_message: Option<&str>,
) -> Rendering {
    if !uploaded {
        return Rendering::Nothing;
    }
    match status {
        TaskStatus::Error => Rendering::Error(
            error_message
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_ERROR_TEXT.to_string()),
        ),
        TaskStatus::Completed => match result {
            Some(ResultPayload::Hazards(records)) if records.is_empty() => Rendering::NoResults,
            Some(ResultPayload::Hazards(records)) => Rendering::Hazards(records.clone()),
            Some(ResultPayload::Unreadable) => Rendering::Unreadable,
            None => Rendering::NoResults,
        },
        TaskStatus::Idle | TaskStatus::Pending => Rendering::InProgress,
    }
}

impl fmt::Display for Rendering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self {
            Rendering::Nothing => return Ok(()),
            Rendering::InProgress => IN_PROGRESS_TEXT.to_string(),
            Rendering::Error(message) => message.clone(),
            Rendering::NoResults => NO_RESULTS_TEXT.to_string(),
            Rendering::Unreadable => UNREADABLE_TEXT.to_string(),
            Rendering::Hazards(records) => records
                .iter()
                .map(format_hazard)
                .collect::<Vec<_>>()
                .join("\n"),
        };
        writeln!(f, "{}", RESULT_HEADER)?;
        write!(f, "{}", body)
    }
}

fn format_hazard(record: &HazardRecord) -> String {
    let level = record
        .danger_level
        .map(|level| format!(" [{}]", level))
        .unwrap_or_default();
    let image = record
        .image
        .as_deref()
        .filter(|image| !image.is_empty())
        .unwrap_or(DEFAULT_HAZARD_IMAGE);
    format!(
        "- {}{}\n  {}\n  image: {}",
        record.name, level, record.description, image
    )
}
