//! Shared server state.

use std::sync::Arc;

use teamcal_core::{HttpFetcher, Syncer};

use crate::store_json::JsonStore;

/// The concrete syncer this server runs: JSON files on disk, HTTP feeds.
pub type AppSyncer = Syncer<JsonStore, HttpFetcher>;

#[derive(Clone)]
pub struct AppState {
    pub syncer: Arc<AppSyncer>,
}
