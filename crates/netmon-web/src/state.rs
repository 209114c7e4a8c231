//! Shared application state handed to every handler.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use netmon_core::store::Store;

use crate::cache::ResponseCache;
use crate::notifier::Notifier;

/// Built once in `main` and cloned into each request.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<Store>,
    pub(crate) notifier: Arc<Notifier>,
    pub(crate) cache: Arc<ResponseCache>,
}

impl AppState {
    pub(crate) fn new(store: Arc<Store>, notifier: Arc<Notifier>, cache: Arc<ResponseCache>) -> Self {
        Self {
            store,
            notifier,
            cache,
        }
    }
}
