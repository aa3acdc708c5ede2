// Lifecycle events - one JSON object per event, tagged by `event`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::report::model::StatusDetails;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LifecycleEvent {
    SpecStarted {
        spec: String,
        #[serde(default)]
        at: Option<u64>,
    },
    SpecEnded {
        #[serde(default)]
        video: Option<PathBuf>,
        #[serde(default)]
        at: Option<u64>,
    },
    SuiteStarted {
        title: String,
        #[serde(default)]
        at: Option<u64>,
    },
    SuiteEnded {
        #[serde(default)]
        at: Option<u64>,
    },
    HookStarted {
        title: String,
        #[serde(default)]
        at: Option<u64>,
    },
    HookEnded {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        trace: Option<String>,
        #[serde(default)]
        at: Option<u64>,
    },
    TestStarted {
        title: String,
        /// Attempt number, 0 for the first run
        #[serde(default)]
        retry: u32,
        #[serde(default)]
        at: Option<u64>,
    },
    TestEnded {
        status: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        trace: Option<String>,
        #[serde(default)]
        at: Option<u64>,
    },
    TestPending {
        title: String,
        #[serde(default)]
        at: Option<u64>,
    },
    StepStarted {
        name: String,
        #[serde(default)]
        at: Option<u64>,
    },
    StepEnded {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        trace: Option<String>,
        #[serde(default)]
        at: Option<u64>,
    },
    EndAllSteps {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        at: Option<u64>,
    },
    Label {
        name: String,
        value: String,
    },
    Link {
        url: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "type")]
        link_type: Option<String>,
    },
    Parameter {
        name: String,
        value: String,
    },
    Description {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Attachment {
        name: String,
        /// Base64 encoded body
        content: String,
        content_type: String,
    },
    Screenshot {
        path: PathBuf,
        #[serde(default)]
        name: Option<String>,
    },
    RunEnded {
        #[serde(default)]
        at: Option<u64>,
    },
}

/// Build status details from optional message and trace
pub fn details(message: Option<String>, trace: Option<String>) -> Option<StatusDetails> {
    if message.is_none() && trace.is_none() {
        return None;
    }
    Some(StatusDetails {
        message,
        trace,
        ..StatusDetails::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_line() {
        let event: LifecycleEvent =
            serde_json::from_str(r#"{"event":"testStarted","title":"works","at":10}"#)
                .expect("parse");
        assert_eq!(
            event,
            LifecycleEvent::TestStarted {
                title: "works".to_string(),
                retry: 0,
                at: Some(10),
            }
        );
    }

    #[test]
    fn test_attachment_fields_are_camel_case() {
        let event: LifecycleEvent = serde_json::from_str(
            r#"{"event":"attachment","name":"log","content":"aGk=","contentType":"text/plain"}"#,
        )
        .expect("parse");
        assert!(matches!(event, LifecycleEvent::Attachment { ref content_type, .. } if content_type == "text/plain"));
    }

    #[test]
    fn test_details_empty() {
        assert!(details(None, None).is_none());
        assert_eq!(
            details(Some("m".to_string()), None).and_then(|d| d.message),
            Some("m".to_string())
        );
    }
}
