use std::sync::Arc;

use crate::cache::LookupCache;
use crate::config::Collections;
use crate::identity::{IdentityService, LocalIdentityService};
use crate::import::CommitOrchestrator;
use crate::store::{BlobStore, DocumentStore};

/// Shared handles passed to every route.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<LookupCache>,
    /// Identity backend used by the commit step.
    pub identity: Arc<dyn IdentityService>,
    /// Backs the `/api/users/signup` route.
    pub local_identity: Arc<LocalIdentityService>,
    pub blobs: Arc<dyn BlobStore>,
    pub collections: Collections,
    /// The only bucket the file routes accept.
    pub attachment_bucket: String,
    pub app_env: String,
}

impl AppState {
    pub fn commit_orchestrator(&self) -> CommitOrchestrator {
        CommitOrchestrator::new(self.store.clone(), self.identity.clone(), self.cache.clone())
    }
}
