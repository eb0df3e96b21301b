use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TroupeError;

/// One intermediate result written by a pipeline step.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StepRecord {
    pub step_name: String,
    pub result: Value,
}

/// Destination for per-run step artifacts.
#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync + 'static {
    async fn record(
        &self,
        run_label: &str,
        step_name: &str,
        result: Value,
    ) -> Result<(), TroupeError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullArtifactSink;

#[async_trait::async_trait]
impl ArtifactSink for NullArtifactSink {
    async fn record(&self, _: &str, _: &str, _: Value) -> Result<(), TroupeError> {
        Ok(())
    }
}

/// Writes `<base>/<run_label>/<millis>_<step>.json`, adding `-<n>` to the
/// timestamp when that name is taken.
#[derive(Clone, Debug)]
pub struct FileArtifactSink {
    base_dir: PathBuf,
}

impl FileArtifactSink {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn run_dir(&self, run_label: &str) -> PathBuf {
        self.base_dir.join(sanitize_segment(run_label))
    }
}

fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .filter(|c| !c.is_control())
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "unlabelled".to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait::async_trait]
impl ArtifactSink for FileArtifactSink {
    async fn record(
        &self,
        run_label: &str,
        step_name: &str,
        result: Value,
    ) -> Result<(), TroupeError> {
        let dir = self.run_dir(run_label);
        tokio::fs::create_dir_all(&dir).await?;
        let record = StepRecord {
            step_name: step_name.to_string(),
            result,
        };
        let millis = Utc::now().timestamp_millis();
        let step = sanitize_segment(step_name);
        let mut path = dir.join(format!("{millis}_{step}.json"));
        // Same step twice within a millisecond.
        let mut n = 1;
        while tokio::fs::try_exists(&path).await? {
            path = dir.join(format!("{millis}-{n}_{step}.json"));
            n += 1;
        }
        let body = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(&path, body).await?;
        tracing::debug!(path = %path.display(), step = step_name, "recorded step artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_sink_writes_step_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileArtifactSink::new(dir.path());
        sink.record("run/1", "Code_Done", serde_json::json!({ "code": "print(1)" }))
            .await
            .unwrap();

        let run_dir = sink.run_dir("run/1");
        assert!(run_dir.ends_with("run_1"));
        let entries: Vec<_> = std::fs::read_dir(&run_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        assert!(path.to_string_lossy().ends_with("_Code_Done.json"));
        let record: StepRecord =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(record.step_name, "Code_Done");
        assert_eq!(record.result["code"], "print(1)");
    }
}
