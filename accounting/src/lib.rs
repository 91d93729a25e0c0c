pub mod client;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod id;
pub mod persist;
pub mod rotation;
pub mod session;
pub mod shift;
pub mod worker;

// Re-exports
pub use client::Client;
pub use config::AccountingConfig;
pub use context::PoolContext;
pub use dispatcher::{Dispatcher, Handler};
pub use error::PoolError;
pub use id::IdGenerator;
pub use persist::{
    DiskProvider, JsonWorkerStore, MemoryWorkerStore, PersistProvider, WorkerLogger, WorkerRecord,
    WorkerStore,
};
pub use rotation::{SchedulerHandle, SettledShift, ShiftScheduler};
pub use session::Session;
pub use shift::{FinalizedShift, Shift};
pub use worker::Worker;
