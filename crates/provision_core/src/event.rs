use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Progress,
    Complete,
    Error,
    Activity,
}

impl EventType {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "progress" => Some(Self::Progress),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            "activity" => Some(Self::Activity),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEventError {
    #[error("frame is not a valid event object: {0}")]
    Json(String),
    #[error("event has no job id")]
    MissingJobId,
    #[error("event has no type")]
    MissingType,
    #[error("unknown event type {0:?}")]
    InvalidType(String),
    #[error("progress is not a finite number: {0}")]
    InvalidProgress(String),
}

/// Event exactly as received from the transport. Nothing here is trusted yet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default, alias = "job_id")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub progress: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// A validated progress notification for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub job_id: JobId,
    pub kind: EventType,
    pub stage: Option<String>,
    /// Percentage, already clamped to `0..=100`.
    pub progress: Option<u8>,
    pub message: Option<String>,
}

impl Event {
    pub fn new(job_id: impl Into<JobId>, kind: EventType) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            stage: None,
            progress: None,
            message: None,
        }
    }

    pub fn progress(job_id: impl Into<JobId>, stage: impl Into<String>, percent: u8) -> Self {
        Self::new(job_id, EventType::Progress)
            .with_stage(stage)
            .with_progress(percent)
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_progress(mut self, percent: u8) -> Self {
        self.progress = Some(percent.min(100));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Parses and validates one transport frame.
    pub fn from_json(frame: &str) -> Result<Self, MalformedEventError> {
        let raw: RawEvent =
            serde_json::from_str(frame).map_err(|err| MalformedEventError::Json(err.to_string()))?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawEvent> for Event {
    type Error = MalformedEventError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let job_id = non_blank(raw.job_id).ok_or(MalformedEventError::MissingJobId)?;
        let kind_text = raw.kind.ok_or(MalformedEventError::MissingType)?;
        let kind = EventType::parse(&kind_text)
            .ok_or_else(|| MalformedEventError::InvalidType(kind_text.clone()))?;
        let progress = raw.progress.as_ref().map(parse_progress).transpose()?;

        Ok(Self {
            job_id,
            kind,
            stage: non_blank(raw.stage),
            progress,
            message: non_blank(raw.message),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn parse_progress(value: &serde_json::Value) -> Result<u8, MalformedEventError> {
    let number = match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(number) if number.is_finite() => Ok(number.clamp(0.0, 100.0).round() as u8),
        _ => Err(MalformedEventError::InvalidProgress(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_frame() {
        let event = Event::from_json(r#"{"jobId":"job1","type":"activity"}"#).unwrap();
        assert_eq!(event, Event::new("job1", EventType::Activity));
    }

    #[test]
    fn clamps_and_rounds_progress() {
        let event =
            Event::from_json(r#"{"jobId":"j","type":"progress","stage":"gmail","progress":140.2}"#)
                .unwrap();
        assert_eq!(event.progress, Some(100));

        let event =
            Event::from_json(r#"{"job_id":"j","type":"progress","progress":"33.6"}"#).unwrap();
        assert_eq!(event.progress, Some(34));

        let event = Event::from_json(r#"{"jobId":"j","type":"progress","progress":-5}"#).unwrap();
        assert_eq!(event.progress, Some(0));
    }

    #[test]
    fn null_progress_counts_as_absent() {
        let event = Event::from_json(r#"{"jobId":"j","type":"progress","progress":null}"#).unwrap();
        assert_eq!(event.progress, None);
    }

    #[test]
    fn rejects_malformed_fields() {
        assert_eq!(
            Event::from_json(r#"{"type":"progress"}"#).unwrap_err(),
            MalformedEventError::MissingJobId
        );
        assert_eq!(
            Event::from_json(r#"{"jobId":"   ","type":"progress"}"#).unwrap_err(),
            MalformedEventError::MissingJobId
        );
        assert_eq!(
            Event::from_json(r#"{"jobId":"j"}"#).unwrap_err(),
            MalformedEventError::MissingType
        );
        assert_eq!(
            Event::from_json(r#"{"jobId":"j","type":"teleport"}"#).unwrap_err(),
            MalformedEventError::InvalidType("teleport".to_string())
        );
        assert!(matches!(
            Event::from_json(r#"{"jobId":"j","type":"progress","progress":"lots"}"#),
            Err(MalformedEventError::InvalidProgress(_))
        ));
        assert!(matches!(
            Event::from_json("not json"),
            Err(MalformedEventError::Json(_))
        ));
    }

    #[test]
    fn blank_stage_and_message_are_dropped() {
        let event =
            Event::from_json(r#"{"jobId":"j","type":"progress","stage":" ","message":""}"#)
                .unwrap();
        assert_eq!(event.stage, None);
        assert_eq!(event.message, None);
    }
}
