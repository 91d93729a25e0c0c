/// Pool-wide services shared by every client and worker: the id generator,
/// the live-connection dispatcher, and the persistence collaborators.
/// Construction is the configuration-error boundary; everything after it
/// can rely on the collaborators being present.
use std::sync::Arc;

use crate::config::AccountingConfig;
use crate::dispatcher::Dispatcher;
use crate::error::PoolError;
use crate::id::IdGenerator;
use crate::persist::{PersistProvider, WorkerStore};

pub struct PoolContext {
    config: AccountingConfig,
    ids: IdGenerator,
    dispatcher: Arc<Dispatcher>,
    provider: Arc<dyn PersistProvider>,
    store: Arc<dyn WorkerStore>,
}

impl PoolContext {
    pub fn builder() -> PoolContextBuilder {
        PoolContextBuilder::default()
    }

    pub fn config(&self) -> &AccountingConfig {
        &self.config
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn provider(&self) -> &Arc<dyn PersistProvider> {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn WorkerStore> {
        &self.store
    }
}

impl std::fmt::Debug for PoolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolContext")
            .field("config", &self.config)
            .field("live_handlers", &self.dispatcher.len())
            .finish()
    }
}

#[derive(Default)]
pub struct PoolContextBuilder {
    config: Option<AccountingConfig>,
    provider: Option<Arc<dyn PersistProvider>>,
    store: Option<Arc<dyn WorkerStore>>,
}

impl PoolContextBuilder {
    pub fn config(mut self, config: AccountingConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn PersistProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn store(mut self, store: Arc<dyn WorkerStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// A missing collaborator or invalid config is fatal here, by contract.
    pub fn build(self) -> Result<Arc<PoolContext>, PoolError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let provider = self
            .provider
            .ok_or_else(|| PoolError::Configuration("persist provider is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| PoolError::Configuration("worker store is required".to_string()))?;
        Ok(Arc::new(PoolContext {
            config,
            ids: IdGenerator::new(),
            dispatcher: Arc::new(Dispatcher::new()),
            provider,
            store,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{DiskProvider, MemoryWorkerStore};

    #[test]
    fn build_requires_provider_and_store() {
        let err = PoolContext::builder().build().unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));

        let err = PoolContext::builder()
            .provider(Arc::new(DiskProvider))
            .build()
            .unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let cfg = AccountingConfig {
            shift_duration_secs: 0,
            ..AccountingConfig::default()
        };
        let err = PoolContext::builder()
            .config(cfg)
            .provider(Arc::new(DiskProvider))
            .store(Arc::new(MemoryWorkerStore::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));
    }

    #[test]
    fn build_succeeds_with_all_collaborators() {
        let ctx = PoolContext::builder()
            .config(AccountingConfig::default())
            .provider(Arc::new(DiskProvider))
            .store(Arc::new(MemoryWorkerStore::new()))
            .build()
            .unwrap();
        assert_eq!(ctx.ids().next(), 1);
        assert!(ctx.dispatcher().is_empty());
    }
}
