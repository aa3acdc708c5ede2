// Status and label helpers shared by every report entity

use crate::report::model::{Label, Stage, Status, StatusDetails};
use crate::report::store::ExecutableItem;

pub const LABEL_PARENT_SUITE: &str = "parentSuite";
pub const LABEL_SUITE: &str = "suite";
pub const LABEL_SUB_SUITE: &str = "subSuite";

const SUITE_LABELS: [&str; 3] = [LABEL_PARENT_SUITE, LABEL_SUITE, LABEL_SUB_SUITE];

/// Stage an entity lands in for a given status
pub fn stage_for(status: Status) -> Stage {
    match status {
        Status::Passed | Status::Failed | Status::Broken => Stage::Finished,
        Status::Skipped | Status::Unknown => Stage::Pending,
    }
}

/// Apply a raw runner status and optional details to an entity.
///
/// Unrecognized statuses become `unknown` and their literal value is kept as the
/// detail message when the caller gave none.
pub fn set_status(item: &mut ExecutableItem, raw: &str, details: Option<StatusDetails>) {
    match Status::parse(raw) {
        Some(status) => set_known_status(item, status, details),
        None => {
            let details = details
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| StatusDetails::message(format!("Unexpected status: {}", raw)));
            item.status = Some(Status::Unknown);
            item.stage = Stage::Pending;
            item.status_details = Some(details);
        }
    }
}

pub fn set_known_status(item: &mut ExecutableItem, status: Status, details: Option<StatusDetails>) {
    item.status = Some(status);
    item.stage = stage_for(status);
    if matches!(status, Status::Failed | Status::Broken | Status::Skipped) {
        if let Some(details) = details.filter(|d| !d.is_empty()) {
            item.status_details = Some(details);
        }
    }
}

/// Last label written under `name`, if any
pub fn apply_label<'a>(buffer: &'a [Label], name: &str) -> Option<&'a Label> {
    buffer.iter().rev().find(|label| label.name == name)
}

/// Collapse an accumulation buffer to one label per name, keeping the last value
/// and the position of the first occurrence.
pub fn resolve_labels(buffer: &[Label]) -> Vec<Label> {
    let mut resolved: Vec<Label> = Vec::new();
    for label in buffer {
        if resolved.iter().any(|l| l.name == label.name) {
            continue;
        }
        if let Some(last) = apply_label(buffer, &label.name) {
            resolved.push(last.clone());
        }
    }
    resolved
}

/// Map the outermost suites of a test onto `parentSuite`, `suite` and `subSuite`.
/// Suites nested deeper than three levels get no label of their own.
pub fn group_labels(suite_names: &[String]) -> Vec<Label> {
    suite_names
        .iter()
        .zip(SUITE_LABELS)
        .map(|(value, name)| Label::new(name, value.clone()))
        .collect()
}

pub fn is_suite_label(name: &str) -> bool {
    SUITE_LABELS.contains(&name)
}
