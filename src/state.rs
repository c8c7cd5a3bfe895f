use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    locks::UserLocks,
    store::{Store, StorePolicy},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub policy: StorePolicy,
    pub cart_locks: Arc<UserLocks>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, policy: StorePolicy, jwt_secret: &str) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            policy,
            cart_locks: Arc::new(UserLocks::new()),
            jwt_secret: Arc::from(jwt_secret),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
