//! Application state and initialization
//!
//! All services are initialized here and made available to request
//! handlers through AppState.

use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{FoldersService, ItemsService, ReportsService};
use crate::storage::FileStore;
use std::path::{Path, PathBuf};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub folders: FoldersService,
    pub items: ItemsService,
    pub reports: ReportsService,
    pub uploads_dir: PathBuf,
}

impl AppState {
    pub fn new(repo: Repository, files: FileStore, uploads_dir: PathBuf) -> Self {
        Self {
            folders: FoldersService::new(repo.clone(), files.clone()),
            items: ItemsService::new(repo.clone(), files),
            reports: ReportsService::new(repo.clone()),
            repo,
            uploads_dir,
        }
    }
}

/// Initialize persistent state under a data directory: database pool,
/// migrations, uploads root.
pub async fn init(data_dir: &Path) -> Result<AppState> {
    tracing::info!("Initializing application, data dir: {:?}", data_dir);

    std::fs::create_dir_all(data_dir)?;

    let pool = create_pool(&data_dir.join("cloudkeep.db")).await?;

    let uploads_dir = data_dir.join("uploads");
    let files = FileStore::new(uploads_dir.clone());
    files.initialize().await?;

    tracing::info!("Application initialized successfully");

    Ok(AppState::new(Repository::new(pool), files, uploads_dir))
}
