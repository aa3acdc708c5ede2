// Allure result-file data model

use serde::{Deserialize, Serialize};

/// Terminal outcome of a report entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Broken,
    Skipped,
    Unknown,
}

impl Status {
    /// Parse a status reported by the runner. `pending` is mocha's name for skipped.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "broken" => Some(Self::Broken),
            "skipped" | "pending" => Some(Self::Skipped),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Broken => "broken",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Broken)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Scheduled,
    Running,
    Finished,
    Pending,
    Interrupted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flaky: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

impl StatusDetails {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.trace.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Step or fixture body, serialized recursively
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
    pub stage: Stage,
    #[serde(default)]
    pub steps: Vec<StepResult>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub start: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<u128>,
}

pub type FixtureResult = StepResult;

/// `<uuid>-result.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub uuid: String,
    pub history_id: String,
    pub full_name: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub steps: Vec<StepResult>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub start: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<u128>,
}

/// `<uuid>-container.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultContainer {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub befores: Vec<FixtureResult>,
    #[serde(default)]
    pub afters: Vec<FixtureResult>,
    pub start: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<u128>,
}

pub fn result_file_name(uuid: &str) -> String {
    format!("{}-result.json", uuid)
}

pub fn container_file_name(uuid: &str) -> String {
    format!("{}-container.json", uuid)
}

pub fn attachment_file_name(uuid: &str, extension: &str) -> String {
    if extension.is_empty() {
        format!("{}-attachment", uuid)
    } else {
        format!("{}-attachment.{}", uuid, extension.trim_start_matches('.'))
    }
}

/// Best-effort content type from a file extension
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "txt" | "log" => "text/plain",
        "xml" => "application/xml",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

/// Inverse of [`content_type_for`], used when only a MIME type is known
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "application/json" => "json",
        "text/html" => "html",
        "text/plain" => "txt",
        "application/xml" => "xml",
        "text/csv" => "csv",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_aliases() {
        assert_eq!(Status::parse("pending"), Some(Status::Skipped));
        assert_eq!(Status::parse(" Passed "), Some(Status::Passed));
        assert_eq!(Status::parse("sentinel"), None);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = TestResult {
            uuid: "u".to_string(),
            history_id: "h".to_string(),
            full_name: "spec.cy.js#a b".to_string(),
            name: "b".to_string(),
            status: Some(Status::Broken),
            status_details: Some(StatusDetails::message("boom")),
            stage: Stage::Finished,
            description: None,
            labels: vec![Label::new("suite", "a")],
            links: Vec::new(),
            parameters: Vec::new(),
            steps: Vec::new(),
            attachments: Vec::new(),
            start: 1,
            stop: Some(2),
        };

        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["historyId"], "h");
        assert_eq!(json["fullName"], "spec.cy.js#a b");
        assert_eq!(json["status"], "broken");
        assert_eq!(json["stage"], "finished");
        assert_eq!(json["statusDetails"]["message"], "boom");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_attachment_file_name() {
        assert_eq!(attachment_file_name("x", ".png"), "x-attachment.png");
        assert_eq!(attachment_file_name("x", ""), "x-attachment");
        assert_eq!(content_type_for("PNG"), "image/png");
        assert_eq!(extension_for("video/mp4"), "mp4");
    }
}
