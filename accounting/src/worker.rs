/// Worker - one miner instance under a client account
///
/// A client/worker relationship is one-to-many, and one worker *name* can be
/// live on several connections at once; each connection gets its own Worker
/// instance with its own id and counters. Share accounting delegates to the
/// bound session's current shift. The per-worker RwLock covers identity
/// fields only (name / parent / session), never shift counters, so metadata
/// reads do not serialize behind share increments.
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::client::Client;
use crate::error::PoolError;
use crate::id::sprint_id;
use crate::persist::{WorkerLogger, WorkerRecord};
use crate::session::Session;

#[derive(Debug)]
struct Identity {
    name: String,
    parent: Weak<Client>,
    session: Option<Arc<Session>>,
}

#[derive(Debug)]
pub struct Worker {
    id: u64,
    blocks_found: AtomicU64,
    identity: RwLock<Identity>,
    /// Present only on the first instance of a (client, name) pair.
    log: Option<WorkerLogger>,
}

impl Worker {
    /// Create a worker instance for an authenticated connection.
    ///
    /// Persistence setup (client directory + per-worker log file) runs only
    /// when no instance of this (client, name) pair is live yet; a setup
    /// failure aborts this creation but cannot touch running siblings,
    /// which did their setup when they were first.
    pub fn create(
        client: &Arc<Client>,
        name: &str,
        session: Arc<Session>,
    ) -> Result<Arc<Self>, PoolError> {
        let ctx = client.pool();
        let id = ctx.ids().next();

        let mut log = None;
        if client.worker(name).is_none() {
            let dir = ctx
                .config()
                .persist_dir
                .join("clients")
                .join(client.name());
            ctx.provider().mkdir_all(&dir)?;
            log = Some(ctx.provider().new_logger(&dir.join(format!("{}.log", name)))?);
        }

        let worker = Arc::new(Self {
            id,
            blocks_found: AtomicU64::new(0),
            identity: RwLock::new(Identity {
                name: name.to_string(),
                parent: Arc::downgrade(client),
                session: Some(session),
            }),
            log,
        });
        tracing::debug!(
            worker = %name,
            client = %client.name(),
            id = %sprint_id(id),
            "worker instance created"
        );
        Ok(worker)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn print_id(&self) -> String {
        sprint_id(self.id)
    }

    pub fn name(&self) -> String {
        self.identity.read().unwrap().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.identity.write().unwrap().name = name.to_string();
    }

    pub fn parent(&self) -> Option<Arc<Client>> {
        self.identity.read().unwrap().parent.upgrade()
    }

    pub fn set_parent(&self, client: &Arc<Client>) {
        self.identity.write().unwrap().parent = Arc::downgrade(client);
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.identity.read().unwrap().session.clone()
    }

    pub fn set_session(&self, session: Option<Arc<Session>>) {
        self.identity.write().unwrap().session = session;
    }

    pub fn online(&self) -> bool {
        self.identity.read().unwrap().session.is_some()
    }

    pub fn shares_this_block(&self) -> u64 {
        self.session().map(|s| s.shift().shares()).unwrap_or(0)
    }

    /// Count one accepted share at the given difficulty against the bound
    /// session's current shift. A share for an offline worker is dropped;
    /// the protocol layer gates submissions on `online()`.
    pub fn increment_shares(&self, current_difficulty: f64) {
        match self.session() {
            Some(session) => session.record_share(current_difficulty),
            None => tracing::debug!(worker = %self.name(), "share dropped, no bound session"),
        }
    }

    pub fn invalid_shares(&self) -> u64 {
        self.session().map(|s| s.shift().invalid()).unwrap_or(0)
    }

    pub fn increment_invalid_shares(&self) {
        if let Some(session) = self.session() {
            session.record_invalid();
        }
    }

    pub fn stale_shares(&self) -> u64 {
        self.session().map(|s| s.shift().stale()).unwrap_or(0)
    }

    pub fn increment_stale_shares(&self) {
        if let Some(session) = self.session() {
            session.record_stale();
        }
    }

    pub fn last_share_time(&self) -> Option<DateTime<Utc>> {
        self.session().and_then(|s| s.shift().last_share_time())
    }

    pub fn set_last_share_time(&self, t: DateTime<Utc>) {
        if let Some(session) = self.session() {
            session.set_last_share_time(t);
        }
    }

    pub fn cumulative_difficulty(&self) -> f64 {
        self.session()
            .map(|s| s.shift().cumulative_difficulty())
            .unwrap_or(0.0)
    }

    pub fn blocks_found(&self) -> u64 {
        self.blocks_found.load(Ordering::Acquire)
    }

    /// Block finds are rare and high-value, so the synchronous best-effort
    /// record write is acceptable here; per-share persistence is not done.
    pub fn increment_blocks_found(&self) {
        let total = self.blocks_found.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(log) = &self.log {
            log.log(&format!("block found (total {})", total));
        }
        self.update_worker_record();
    }

    fn update_worker_record(&self) {
        let Some(client) = self.parent() else {
            tracing::warn!(worker = %self.name(), "no parent client, worker record not persisted");
            return;
        };
        let record = WorkerRecord {
            worker_id: self.id,
            name: self.name(),
            blocks_found: self.blocks_found(),
            client: client.name().to_string(),
        };
        if let Err(e) = client.pool().store().update_worker_record(&record) {
            tracing::warn!(
                worker = %record.name,
                client = %record.client,
                error = %e,
                "worker record update failed"
            );
        }
    }

    /// Average live session difficulty across every connection mining as
    /// this (client, name), or 0.0 when none match. O(live connections)
    /// under the dispatcher lock; for periodic stats queries, not the
    /// per-share path. Lock order here is dispatcher first, worker second.
    pub fn current_difficulty(&self) -> f64 {
        let Some(client) = self.parent() else {
            return 0.0;
        };
        let dispatcher = client.pool().dispatcher().clone();
        let mut matches = 0u64;
        let mut total = 0.0f64;
        dispatcher.for_each_handler(|h| {
            if h.client().name() == client.name() && h.worker().name() == self.name() {
                total += h.session().current_difficulty();
                matches += 1;
            }
        });
        if matches == 0 {
            return 0.0;
        }
        total / matches as f64
    }
}
