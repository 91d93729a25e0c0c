/// Dispatcher - registry of all live per-connection handlers
///
/// One coarse mutex over the whole table: membership changes happen at
/// connect/disconnect rate, while full-table scans back pool-wide stats
/// queries such as Worker::current_difficulty. Lock ordering rule for the
/// whole engine: Dispatcher lock first, then any worker lock, never the
/// reverse.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::Client;
use crate::session::Session;
use crate::worker::Worker;

/// Live per-connection state. Holds non-owning references for aggregation;
/// lifetime is driven by the connection, not by the registry.
#[derive(Debug)]
pub struct Handler {
    id: u64,
    client: Arc<Client>,
    worker: Arc<Worker>,
    session: Arc<Session>,
}

impl Handler {
    pub fn new(id: u64, client: Arc<Client>, worker: Arc<Worker>, session: Arc<Session>) -> Arc<Self> {
        Arc::new(Self {
            id,
            client,
            worker,
            session,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    handlers: Mutex<HashMap<u64, Arc<Handler>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler at connection authentication.
    pub fn add(&self, handler: Arc<Handler>) {
        let mut handlers = self.handlers.lock().unwrap();
        handlers.insert(handler.id(), handler);
    }

    /// Drop a handler at disconnect. References already read out of the
    /// table (e.g. by a settlement job) stay valid on their own.
    pub fn remove(&self, handler: &Handler) {
        let mut handlers = self.handlers.lock().unwrap();
        handlers.remove(&handler.id());
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every live handler under the registry lock. For aggregation
    /// queries only; callers must not block or take the registry lock again.
    pub fn for_each_handler(&self, mut f: impl FnMut(&Handler)) {
        let handlers = self.handlers.lock().unwrap();
        for handler in handlers.values() {
            f(handler);
        }
    }

    /// Clone the handler set out of the lock, for callers that do real work
    /// per handler (shift rotation) and must not hold the registry lock
    /// while doing it.
    pub fn snapshot(&self) -> Vec<Arc<Handler>> {
        let handlers = self.handlers.lock().unwrap();
        handlers.values().cloned().collect()
    }
}
