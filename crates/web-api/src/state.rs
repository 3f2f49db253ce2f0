use std::sync::Arc;

use application::{
    BcryptPasswordHasher, Broadcaster, Clock, CredentialVerifier, MessageStore, PasswordHasher,
    SessionRegistry, StoreCredentialVerifier, SystemClock, OUTBOUND_BUFFER,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub registry: Arc<SessionRegistry>,
    pub broadcaster: Broadcaster,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub outbound_buffer: usize,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: Arc<SessionRegistry>,
        broadcaster: Broadcaster,
        verifier: Arc<dyn CredentialVerifier>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            store,
            registry,
            broadcaster,
            verifier,
            hasher,
            outbound_buffer: OUTBOUND_BUFFER,
        }
    }

    pub fn outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity;
        self
    }

    /// 用默认组件把给定存储装配成完整状态。
    pub fn with_store(store: Arc<dyn MessageStore>, bcrypt_cost: Option<u32>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = Arc::new(SessionRegistry::new(clock));
        let broadcaster = Broadcaster::new(registry.clone());
        let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptPasswordHasher::new(bcrypt_cost));
        let verifier: Arc<dyn CredentialVerifier> =
            Arc::new(StoreCredentialVerifier::new(store.clone(), hasher.clone()));
        Self::new(store, registry, broadcaster, verifier, hasher)
    }
}
