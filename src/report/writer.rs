// Persistence of sealed report entities

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use tracing::{error, warn};

use crate::executor::Executor;
use crate::ops::{Encoding, Operation};
use crate::queue::TaskQueue;
use crate::report::model::{self, TestResult, TestResultContainer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    Content(Vec<u8>),
    File(PathBuf),
}

/// Sink for sealed entities. `identity` names the spec the entity belongs to;
/// writes for one identity must land in the order they were issued.
pub trait ReportWriter {
    fn write_result(&mut self, identity: &str, result: &TestResult);

    fn write_container(&mut self, identity: &str, container: &TestResultContainer);

    fn write_attachment(&mut self, identity: &str, file_name: &str, source: AttachmentSource);

    /// Attach a recording to already written results of `identity`
    fn attach_video(&mut self, identity: &str, video: &Path, test_uuids: &[String]);

    /// Nothing more will be written for `identity`
    fn finish_identity(&mut self, identity: &str);
}

/// Turns writes into operations on the task queue
pub struct QueuedWriter {
    results_dir: PathBuf,
    watch_dir: Option<PathBuf>,
    executor: Arc<Executor>,
    queue: TaskQueue,
    /// File names written per identity, moved to the watch directory at the end
    written: HashMap<String, Vec<String>>,
}

impl QueuedWriter {
    pub fn new(results_dir: PathBuf, executor: Arc<Executor>, queue: TaskQueue) -> Self {
        Self {
            results_dir,
            watch_dir: None,
            executor,
            queue,
            written: HashMap::new(),
        }
    }

    pub fn with_watch_dir(mut self, watch_dir: Option<PathBuf>) -> Self {
        self.watch_dir = watch_dir;
        self
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    fn submit(&self, identity: &str, operation: Operation) {
        let executor = self.executor.clone();
        let submitted = self.queue.add_task(identity, async move {
            let kind = operation.kind();
            let result = executor.execute(operation).await;
            if !result.success {
                warn!(
                    "{} failed: {}",
                    kind,
                    result.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
        });
        if let Err(e) = submitted {
            error!("Report write lost: {}", e);
        }
    }

    fn record(&mut self, identity: &str, file_name: &str) {
        self.written
            .entry(identity.to_string())
            .or_default()
            .push(file_name.to_string());
    }

    fn write_json<T: Serialize>(&mut self, identity: &str, file_name: String, value: &T) {
        let content = match serde_json::to_string(value) {
            Ok(content) => content,
            Err(e) => {
                error!("Failed to serialize {}: {}", file_name, e);
                return;
            }
        };
        self.submit(
            identity,
            Operation::WriteFile {
                path: self.results_dir.join(&file_name),
                content,
                encoding: Encoding::Utf8,
            },
        );
        self.record(identity, &file_name);
    }
}

impl ReportWriter for QueuedWriter {
    fn write_result(&mut self, identity: &str, result: &TestResult) {
        self.write_json(identity, model::result_file_name(&result.uuid), result);
    }

    fn write_container(&mut self, identity: &str, container: &TestResultContainer) {
        self.write_json(identity, model::container_file_name(&container.uuid), container);
    }

    fn write_attachment(&mut self, identity: &str, file_name: &str, source: AttachmentSource) {
        let operation = match source {
            AttachmentSource::Content(bytes) => Operation::WriteFile {
                path: self.results_dir.join(file_name),
                content: BASE64.encode(bytes),
                encoding: Encoding::Base64,
            },
            AttachmentSource::File(path) => Operation::CopyScreenshot {
                source: path,
                results_dir: self.results_dir.clone(),
                file_name: file_name.to_string(),
            },
        };
        self.submit(identity, operation);
        self.record(identity, file_name);
    }

    fn attach_video(&mut self, identity: &str, video: &Path, test_uuids: &[String]) {
        let extension = video
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let file_name = model::attachment_file_name(&uuid::Uuid::new_v4().to_string(), extension);
        self.submit(
            identity,
            Operation::AttachVideo {
                results_dir: self.results_dir.clone(),
                video_path: video.to_path_buf(),
                test_uuids: test_uuids.to_vec(),
                file_name: Some(file_name.clone()),
            },
        );
        self.record(identity, &file_name);
    }

    fn finish_identity(&mut self, identity: &str) {
        let files = self.written.remove(identity).unwrap_or_default();
        if let Some(watch_dir) = &self.watch_dir
            && !files.is_empty()
        {
            self.submit(
                identity,
                Operation::MoveToWatch {
                    results_dir: self.results_dir.clone(),
                    watch_dir: watch_dir.clone(),
                    files,
                },
            );
        }
    }
}

/// Keeps everything in memory; used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryWriter {
    pub results: Vec<TestResult>,
    pub containers: Vec<TestResultContainer>,
    pub attachments: Vec<(String, AttachmentSource)>,
    pub videos: Vec<(PathBuf, Vec<String>)>,
    pub finished: Vec<String>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result(&self, name: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn container(&self, name: &str) -> Option<&TestResultContainer> {
        self.containers.iter().find(|c| c.name == name)
    }
}

impl ReportWriter for MemoryWriter {
    fn write_result(&mut self, _identity: &str, result: &TestResult) {
        self.results.push(result.clone());
    }

    fn write_container(&mut self, _identity: &str, container: &TestResultContainer) {
        self.containers.push(container.clone());
    }

    fn write_attachment(&mut self, _identity: &str, file_name: &str, source: AttachmentSource) {
        self.attachments.push((file_name.to_string(), source));
    }

    fn attach_video(&mut self, _identity: &str, video: &Path, test_uuids: &[String]) {
        self.videos.push((video.to_path_buf(), test_uuids.to_vec()));
    }

    fn finish_identity(&mut self, identity: &str) {
        self.finished.push(identity.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::model::Stage;
    use std::time::Duration;

    fn sample_result() -> TestResult {
        TestResult {
            uuid: "0000-test".to_string(),
            history_id: "h".to_string(),
            full_name: "spec#t".to_string(),
            name: "t".to_string(),
            status: None,
            status_details: None,
            stage: Stage::Finished,
            description: None,
            labels: Vec::new(),
            links: Vec::new(),
            parameters: Vec::new(),
            steps: Vec::new(),
            attachments: Vec::new(),
            start: 0,
            stop: Some(1),
        }
    }

    #[tokio::test]
    async fn test_queued_writer_moves_to_watch_after_writes() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let results = dir.path().join("results");
        let watch = dir.path().join("watch");
        let queue = TaskQueue::new(2, Duration::from_secs(5));
        let mut writer = QueuedWriter::new(results.clone(), Arc::new(Executor::local()), queue)
            .with_watch_dir(Some(watch.clone()));

        writer.write_result("spec.cy.js", &sample_result());
        writer.write_attachment(
            "spec.cy.js",
            "a-attachment.txt",
            AttachmentSource::Content(b"log".to_vec()),
        );
        writer.finish_identity("spec.cy.js");

        assert!(writer.queue().flush_all_tasks(Duration::from_secs(5)).await);
        assert!(watch.join("0000-test-result.json").exists());
        assert_eq!(
            std::fs::read(watch.join("a-attachment.txt")).expect("moved"),
            b"log"
        );
        assert!(!results.join("0000-test-result.json").exists());
    }
}
