/// Persistence collaborators for the accounting engine
///
/// Two seams, both injectable so tests can induce failures:
/// - PersistProvider: directory + per-worker log file creation, done once
///   for the first instance of a (client, worker) pair. Failures are fatal
///   to that first creation only.
/// - WorkerStore: best-effort durable worker records, written on block
///   finds. Failures are logged and never fatal; memory stays authoritative.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PoolError;

pub trait PersistProvider: Send + Sync {
    fn mkdir_all(&self, path: &Path) -> Result<(), PoolError>;
    fn new_logger(&self, path: &Path) -> Result<WorkerLogger, PoolError>;
}

/// Production provider backed by the local filesystem.
#[derive(Debug, Default)]
pub struct DiskProvider;

impl PersistProvider for DiskProvider {
    fn mkdir_all(&self, path: &Path) -> Result<(), PoolError> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    fn new_logger(&self, path: &Path) -> Result<WorkerLogger, PoolError> {
        WorkerLogger::open(path)
    }
}

/// Append-only per-worker log. Writes are best-effort; an I/O error is
/// traced and the line dropped.
#[derive(Debug)]
pub struct WorkerLogger {
    path: PathBuf,
    file: Mutex<File>,
}

impl WorkerLogger {
    pub fn open(path: &Path) -> Result<Self, PoolError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, line: &str) {
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let mut file = self.file.lock().unwrap();
        if let Err(e) = writeln!(file, "[{}] {}", stamp, line) {
            tracing::warn!(path = %self.path.display(), error = %e, "worker log write failed");
        }
    }
}

/// Durable view of a worker, keyed by (client, name) at the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: u64,
    pub name: String,
    pub blocks_found: u64,
    pub client: String,
}

pub trait WorkerStore: Send + Sync {
    fn update_worker_record(&self, record: &WorkerRecord) -> Result<(), PoolError>;
}

/// Production store: one JSON file per worker under
/// `<root>/clients/<client>/<name>.json`, overwritten on every update.
#[derive(Debug)]
pub struct JsonWorkerStore {
    root: PathBuf,
}

impl JsonWorkerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn record_path(&self, client: &str, name: &str) -> PathBuf {
        self.root
            .join("clients")
            .join(client)
            .join(format!("{}.json", name))
    }

    pub fn load(&self, client: &str, name: &str) -> Result<WorkerRecord, PoolError> {
        let raw = std::fs::read(self.record_path(client, name))
            .map_err(|e| PoolError::Persistence(e.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| PoolError::Persistence(e.to_string()))
    }
}

impl WorkerStore for JsonWorkerStore {
    fn update_worker_record(&self, record: &WorkerRecord) -> Result<(), PoolError> {
        let path = self.record_path(&record.client, &record.name);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| PoolError::Persistence(e.to_string()))?;
        }
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| PoolError::Persistence(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| PoolError::Persistence(e.to_string()))?;
        tracing::debug!(path = %path.display(), blocks = record.blocks_found, "worker record updated");
        Ok(())
    }
}

/// In-memory store for embedders and tests.
#[derive(Debug, Default)]
pub struct MemoryWorkerStore {
    records: Mutex<HashMap<(String, String), WorkerRecord>>,
}

impl MemoryWorkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, client: &str, name: &str) -> Option<WorkerRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(client.to_string(), name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkerStore for MemoryWorkerStore {
    fn update_worker_record(&self, record: &WorkerRecord) -> Result<(), PoolError> {
        self.records.lock().unwrap().insert(
            (record.client.clone(), record.name.clone()),
            record.clone(),
        );
        Ok(())
    }
}
