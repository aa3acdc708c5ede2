// Serializable side effects, executed in-process or by the worker

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::report::model::{self, Attachment, TestResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Base64,
}

impl Encoding {
    pub fn decode(&self, content: &str) -> Result<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(content.as_bytes().to_vec()),
            Self::Base64 => BASE64
                .decode(content)
                .context("Content is not valid base64"),
        }
    }

    pub fn encode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).context("File is not valid UTF-8"),
            Self::Base64 => Ok(BASE64.encode(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRef {
    pub path: PathBuf,
    pub name: String,
    pub test_uuid: String,
}

/// One side effect. Plain data only, so the same value can be executed here or
/// shipped to the worker unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    #[serde(rename = "fs:mkdir", alias = "fs:mkdirSync")]
    Mkdir {
        path: PathBuf,
        #[serde(default = "default_recursive")]
        recursive: bool,
    },

    #[serde(rename = "fs:writeFile", alias = "fs:writeFileSync")]
    WriteFile {
        path: PathBuf,
        content: String,
        #[serde(default)]
        encoding: Encoding,
    },

    #[serde(rename = "fs:appendFile", alias = "fs:appendFileSync")]
    AppendFile {
        path: PathBuf,
        content: String,
        #[serde(default)]
        encoding: Encoding,
    },

    #[serde(rename = "fs:readFile", alias = "fs:readFileSync")]
    ReadFile {
        path: PathBuf,
        #[serde(default)]
        encoding: Encoding,
    },

    #[serde(rename = "fs:copyFile", alias = "fs:copyFileSync")]
    CopyFile { from: PathBuf, to: PathBuf },

    #[serde(rename = "fs:removeFile", alias = "fs:removeFileSync")]
    RemoveFile { path: PathBuf },

    #[serde(rename = "fs:exists", alias = "fs:existsSync")]
    Exists { path: PathBuf },

    #[serde(rename = "allure:attachVideo", rename_all = "camelCase")]
    AttachVideo {
        results_dir: PathBuf,
        video_path: PathBuf,
        test_uuids: Vec<String>,
        /// Attachment file name inside `results_dir`; generated when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },

    #[serde(rename = "allure:moveToWatch", rename_all = "camelCase")]
    MoveToWatch {
        results_dir: PathBuf,
        watch_dir: PathBuf,
        /// File names inside `results_dir`; empty moves everything
        #[serde(default)]
        files: Vec<String>,
    },

    #[serde(rename = "allure:attachScreenshots", rename_all = "camelCase")]
    AttachScreenshots {
        results_dir: PathBuf,
        screenshots: Vec<ScreenshotRef>,
    },

    #[serde(rename = "allure:copyScreenshot", rename_all = "camelCase")]
    CopyScreenshot {
        source: PathBuf,
        results_dir: PathBuf,
        file_name: String,
    },

    #[serde(rename = "allure:writeTestMessage")]
    WriteTestMessage { path: PathBuf, message: String },

    #[serde(rename = "batch")]
    Batch { operations: Vec<Operation> },

    #[serde(rename = "shutdown")]
    Shutdown,

    #[serde(rename = "health")]
    Health,
}

fn default_recursive() -> bool {
    true
}

impl Operation {
    /// Wire tag, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mkdir { .. } => "fs:mkdir",
            Self::WriteFile { .. } => "fs:writeFile",
            Self::AppendFile { .. } => "fs:appendFile",
            Self::ReadFile { .. } => "fs:readFile",
            Self::CopyFile { .. } => "fs:copyFile",
            Self::RemoveFile { .. } => "fs:removeFile",
            Self::Exists { .. } => "fs:exists",
            Self::AttachVideo { .. } => "allure:attachVideo",
            Self::MoveToWatch { .. } => "allure:moveToWatch",
            Self::AttachScreenshots { .. } => "allure:attachScreenshots",
            Self::CopyScreenshot { .. } => "allure:copyScreenshot",
            Self::WriteTestMessage { .. } => "allure:writeTestMessage",
            Self::Batch { .. } => "batch",
            Self::Shutdown => "shutdown",
            Self::Health => "health",
        }
    }
}

/// Response body of every operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Execute an operation in this process. Never panics and never returns `Err`:
/// failures come back as `success: false`.
pub async fn apply(operation: &Operation) -> OperationResult {
    if let Operation::Batch { operations } = operation {
        return apply_batch(operations).await;
    }

    match run(operation).await {
        Ok(data) => OperationResult::ok(data),
        Err(e) => {
            debug!("{} failed: {:#}", operation.kind(), e);
            OperationResult::err(format!("{:#}", e))
        }
    }
}

/// Sequential, best-effort: every sub-operation runs even after a failure.
fn apply_batch(operations: &[Operation]) -> BoxFuture<'_, OperationResult> {
    Box::pin(async move {
        let mut results = Vec::with_capacity(operations.len());
        let mut failures = Vec::new();

        for (index, operation) in operations.iter().enumerate() {
            let result = apply(operation).await;
            if let Some(error) = &result.error {
                failures.push(format!("#{} {}: {}", index, operation.kind(), error));
            }
            results.push(result);
        }

        let data = serde_json::to_value(&results).ok();
        if failures.is_empty() {
            OperationResult::ok(data)
        } else {
            OperationResult {
                success: false,
                data,
                error: Some(format!(
                    "{} of {} operations failed: {}",
                    failures.len(),
                    operations.len(),
                    failures.join("; ")
                )),
            }
        }
    })
}

async fn run(operation: &Operation) -> Result<Option<Value>> {
    match operation {
        Operation::Mkdir { path, recursive } => {
            if *recursive {
                tokio::fs::create_dir_all(path).await
            } else {
                tokio::fs::create_dir(path).await
            }
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
            Ok(None)
        }
        Operation::WriteFile {
            path,
            content,
            encoding,
        } => {
            let bytes = encoding.decode(content)?;
            ensure_parent(path).await?;
            tokio::fs::write(path, bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(None)
        }
        Operation::AppendFile {
            path,
            content,
            encoding,
        } => {
            let bytes = encoding.decode(content)?;
            append(path, &bytes).await?;
            Ok(None)
        }
        Operation::ReadFile { path, encoding } => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(Value::String(encoding.encode(&bytes)?)))
        }
        Operation::CopyFile { from, to } => {
            copy(from, to).await?;
            Ok(None)
        }
        Operation::RemoveFile { path } => {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
                }
            }
            Ok(None)
        }
        Operation::Exists { path } => Ok(Some(Value::Bool(
            tokio::fs::try_exists(path).await.unwrap_or(false),
        ))),
        Operation::AttachVideo {
            results_dir,
            video_path,
            test_uuids,
            file_name,
        } => attach_video(results_dir, video_path, test_uuids, file_name.as_deref()).await,
        Operation::MoveToWatch {
            results_dir,
            watch_dir,
            files,
        } => move_to_watch(results_dir, watch_dir, files).await,
        Operation::AttachScreenshots {
            results_dir,
            screenshots,
        } => attach_screenshots(results_dir, screenshots).await,
        Operation::CopyScreenshot {
            source,
            results_dir,
            file_name,
        } => {
            copy(source, &results_dir.join(file_name)).await?;
            Ok(None)
        }
        Operation::WriteTestMessage { path, message } => {
            let line = json!({
                "message": message,
                "timestamp": crate::time::now_rfc3339(),
            });
            append(path, format!("{}\n", line).as_bytes()).await?;
            Ok(None)
        }
        Operation::Batch { operations } => {
            let result = apply_batch(operations).await;
            match result.error {
                Some(error) => Err(anyhow!(error)),
                None => Ok(result.data),
            }
        }
        Operation::Health => Ok(Some(json!({ "status": "ok" }))),
        Operation::Shutdown => Ok(None),
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

async fn append(path: &Path, bytes: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    ensure_parent(path).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("Failed to append to {}", path.display()))?;
    file.flush().await?;
    Ok(())
}

async fn copy(from: &Path, to: &Path) -> Result<()> {
    ensure_parent(to).await?;
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

async fn read_result(path: &Path) -> Result<TestResult> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("Invalid result file {}", path.display()))
}

async fn add_attachment(results_dir: &Path, test_uuid: &str, attachment: Attachment) -> Result<()> {
    let path = results_dir.join(model::result_file_name(test_uuid));
    let mut result = read_result(&path).await?;
    result.attachments.push(attachment);
    let body = serde_json::to_vec(&result)?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string()
}

async fn attach_video(
    results_dir: &Path,
    video_path: &Path,
    test_uuids: &[String],
    file_name: Option<&str>,
) -> Result<Option<Value>> {
    if !tokio::fs::try_exists(video_path).await.unwrap_or(false) {
        bail!("Video {} does not exist", video_path.display());
    }

    let extension = extension_of(video_path);
    let file_name = match file_name {
        Some(name) => name.to_string(),
        None => model::attachment_file_name(&uuid::Uuid::new_v4().to_string(), &extension),
    };
    copy(video_path, &results_dir.join(&file_name)).await?;

    let mut attached = 0usize;
    for test_uuid in test_uuids {
        let attachment = Attachment {
            name: "video".to_string(),
            source: file_name.clone(),
            content_type: model::content_type_for(&extension).to_string(),
        };
        match add_attachment(results_dir, test_uuid, attachment).await {
            Ok(()) => attached += 1,
            Err(e) => warn!("Video not attached to {}: {:#}", test_uuid, e),
        }
    }

    Ok(Some(json!({ "source": file_name, "attached": attached })))
}

async fn move_to_watch(
    results_dir: &Path,
    watch_dir: &Path,
    files: &[String],
) -> Result<Option<Value>> {
    tokio::fs::create_dir_all(watch_dir)
        .await
        .with_context(|| format!("Failed to create directory {}", watch_dir.display()))?;

    let names: Vec<String> = if files.is_empty() {
        walkdir::WalkDir::new(results_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .flatten()
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect()
    } else {
        files.to_vec()
    };

    let mut moved = 0usize;
    let mut missing = Vec::new();
    for name in &names {
        let from = results_dir.join(name);
        let to = watch_dir.join(name);
        if tokio::fs::rename(&from, &to).await.is_ok() {
            moved += 1;
            continue;
        }
        // rename fails across filesystems
        match copy(&from, &to).await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&from).await;
                moved += 1;
            }
            Err(_) => missing.push(name.clone()),
        }
    }

    if !missing.is_empty() {
        bail!("Failed to move {}", missing.join(", "));
    }
    Ok(Some(json!({ "moved": moved })))
}

async fn attach_screenshots(
    results_dir: &Path,
    screenshots: &[ScreenshotRef],
) -> Result<Option<Value>> {
    let mut failures = Vec::new();
    for screenshot in screenshots {
        let extension = extension_of(&screenshot.path);
        let file_name =
            model::attachment_file_name(&uuid::Uuid::new_v4().to_string(), &extension);
        let attached = async {
            copy(&screenshot.path, &results_dir.join(&file_name)).await?;
            add_attachment(
                results_dir,
                &screenshot.test_uuid,
                Attachment {
                    name: screenshot.name.clone(),
                    source: file_name.clone(),
                    content_type: model::content_type_for(&extension).to_string(),
                },
            )
            .await
        }
        .await;
        if let Err(e) = attached {
            failures.push(format!("{}: {:#}", screenshot.path.display(), e));
        }
    }

    if !failures.is_empty() {
        bail!("{}", failures.join("; "));
    }
    Ok(Some(json!({ "attached": screenshots.len() })))
}
