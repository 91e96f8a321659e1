use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerLevel {
    Safe,
    Warning,
    Danger,
}

impl fmt::Display for DangerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DangerLevel::Safe => "safe",
            DangerLevel::Warning => "warning",
            DangerLevel::Danger => "danger",
        };
        f.write_str(label)
    }
}

/// One named substance or food found in the analysed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardRecord {
    #[serde(alias = "foodName")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(
        default,
        alias = "dangerLevel",
        skip_serializing_if = "Option::is_none"
    )]
    pub danger_level: Option<DangerLevel>,
}

// Descriptions come from a nullable column.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl HazardRecord {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            description: description.into(),
            danger_level: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_danger_level(mut self, danger_level: DangerLevel) -> Self {
        self.danger_level = Some(danger_level);
        self
    }
}

/// Result of a completed analysis, resolved once at the transport boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    /// Possibly empty: an empty list means no hazards were identified.
    Hazards(Vec<HazardRecord>),
    /// The server completed the task but its data had no recognizable shape.
    Unreadable,
}

impl ResultPayload {
    pub fn hazards(&self) -> &[HazardRecord] {
        match self {
            ResultPayload::Hazards(records) => records,
            ResultPayload::Unreadable => &[],
        }
    }
}
