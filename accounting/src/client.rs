/// Client - a pool account owning its workers
///
/// A client often represents a user; each worker is a single miner under
/// that user. One name can carry several concurrently-live worker instances
/// (one per physical connection), and adding a later instance never
/// displaces an earlier one.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::context::PoolContext;
use crate::worker::Worker;

#[derive(Debug)]
pub struct Client {
    id: u64,
    name: String,
    pool: Arc<PoolContext>,
    workers: RwLock<HashMap<String, Vec<Arc<Worker>>>>,
}

impl Client {
    pub fn new(name: &str, pool: Arc<PoolContext>) -> Arc<Self> {
        Arc::new(Self {
            id: pool.ids().next(),
            name: name.to_string(),
            pool,
            workers: RwLock::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to the pool-wide services; lookup only, never lifetime
    /// management. Ownership runs account -> worker, never back.
    pub fn pool(&self) -> &Arc<PoolContext> {
        &self.pool
    }

    /// First live instance registered under the name, if any.
    pub fn worker(&self, name: &str) -> Option<Arc<Worker>> {
        let workers = self.workers.read().unwrap();
        workers.get(name).and_then(|v| v.first().cloned())
    }

    /// Every live instance under the name.
    pub fn worker_instances(&self, name: &str) -> Vec<Arc<Worker>> {
        let workers = self.workers.read().unwrap();
        workers.get(name).cloned().unwrap_or_default()
    }

    pub fn add_worker(&self, worker: Arc<Worker>) {
        let name = worker.name();
        let mut workers = self.workers.write().unwrap();
        workers.entry(name).or_default().push(worker);
    }

    /// Drop one instance at connection teardown, identified by worker id.
    pub fn remove_worker(&self, worker: &Worker) {
        let name = worker.name();
        let mut workers = self.workers.write().unwrap();
        if let Some(instances) = workers.get_mut(&name) {
            instances.retain(|w| w.id() != worker.id());
            if instances.is_empty() {
                workers.remove(&name);
            }
        }
    }

    /// Total live instances across all names.
    pub fn worker_count(&self) -> usize {
        let workers = self.workers.read().unwrap();
        workers.values().map(Vec::len).sum()
    }
}
