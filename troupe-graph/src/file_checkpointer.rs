use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use troupe_core::{
    Checkpoint, CheckpointMetadata, Checkpointer, HistoryCheckpointer, StateSchema, TroupeError,
};

/// One line of a thread's JSONL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "S: StateSchema")]
pub struct CheckpointRecord<S: StateSchema> {
    pub seq: u64,
    pub created_at: String,
    pub checkpoint: Checkpoint<S>,
}

/// Append-only checkpoint log: `<base_dir>/<thread>.jsonl`, one JSON
/// record per committed superstep.
#[derive(Clone, Debug)]
pub struct FileCheckpointer {
    base_dir: PathBuf,
}

fn failed(err: impl ToString) -> TroupeError {
    TroupeError::CheckpointFailed(err.to_string())
}

impl FileCheckpointer {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn sanitize_thread_id(thread_id: &str) -> String {
        let mut out = String::with_capacity(thread_id.len());
        for ch in thread_id.chars() {
            match ch {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
                c if c.is_control() => {}
                c => out.push(c),
            }
        }
        let trimmed = out.trim_matches(|c: char| c == '.' || c.is_whitespace() || c == '_');
        if trimmed.is_empty() {
            let mut hasher = DefaultHasher::new();
            thread_id.hash(&mut hasher);
            return format!("thread-{:08x}", hasher.finish());
        }
        trimmed.to_string()
    }

    pub fn thread_path(&self, thread_id: &str) -> PathBuf {
        let filename = format!("{}.jsonl", Self::sanitize_thread_id(thread_id));
        self.base_dir.join(filename)
    }

    fn read_records<S: StateSchema>(
        &self,
        thread_id: &str,
    ) -> Result<Vec<CheckpointRecord<S>>, TroupeError> {
        let path = self.thread_path(thread_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path).map_err(failed)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(failed)?;
            if line.trim().is_empty() {
                continue;
            }
            let record: CheckpointRecord<S> = serde_json::from_str(&line).map_err(failed)?;
            if record.checkpoint.thread_id == thread_id {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl<S: StateSchema> Checkpointer<S> for FileCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint<S>) -> Result<(), TroupeError> {
        fs::create_dir_all(&self.base_dir).map_err(failed)?;

        let seq = self
            .read_records::<S>(&checkpoint.thread_id)?
            .last()
            .map(|record| record.seq + 1)
            .unwrap_or(1);
        let record = CheckpointRecord {
            seq,
            created_at: checkpoint.created_at.clone(),
            checkpoint: checkpoint.clone(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.thread_path(&checkpoint.thread_id))
            .map_err(failed)?;
        let line = serde_json::to_string(&record).map_err(failed)?;
        file.write_all(format!("{line}\n").as_bytes())
            .map_err(failed)?;
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, TroupeError> {
        Ok(self
            .read_records::<S>(thread_id)?
            .pop()
            .map(|record| record.checkpoint))
    }
}

#[async_trait::async_trait]
impl<S: StateSchema> HistoryCheckpointer<S> for FileCheckpointer {
    async fn list_checkpoints(
        &self,
        thread_id: &str,
    ) -> Result<Vec<CheckpointMetadata>, TroupeError> {
        Ok(self
            .read_records::<S>(thread_id)?
            .into_iter()
            .map(|record| CheckpointMetadata {
                seq: record.seq,
                step: record.checkpoint.step,
                created_at: record.created_at,
            })
            .collect())
    }
}
