//! Depot Admin data layer.
//!
//! Catalog, PRF, inventory, expense and lubebay pages share one shape: list
//! records from the admin REST API, normalise and coalesce them into rows,
//! derive summary cards, and run mutations remote-first with a local SQLite
//! fallback ledger when the API is unavailable. [`AppState`] wires the
//! layers together; the page operations live in [`commands`].

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod auth;
pub mod coalesce;
pub mod commands;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod entities;
pub mod error;
pub mod events;
pub mod fallback;
pub mod forms;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod query;
pub mod record;
pub mod seed;
pub mod selection;
pub mod status;

use crate::api::{HttpApi, RemoteApi};
use crate::auth::TokenStore;
use crate::config::AppConfig;
use crate::db::DbState;
use crate::error::{AppError, AppResult};
use crate::events::EventBus;
use crate::orchestrator::MutationOrchestrator;
use crate::query::ListService;
use crate::selection::SelectionController;

/// Everything a page command needs.
pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<DbState>,
    pub api: Arc<dyn RemoteApi>,
    pub tokens: Arc<dyn TokenStore>,
    pub events: EventBus,
    pub orchestrator: MutationOrchestrator,
    pub lists: ListService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: Arc<DbState>,
        api: Arc<dyn RemoteApi>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let events = EventBus::new();
        let orchestrator = MutationOrchestrator::new(api.clone(), db.clone(), events.clone())
            .offline(config.offline_mode);
        let lists = ListService::new(api.clone(), db.clone())
            .offline(config.offline_mode)
            .default_page_size(config.page_size);
        Self {
            config,
            db,
            api,
            tokens,
            events,
            orchestrator,
            lists,
        }
    }

    /// Open the on-disk database under `config.data_dir` and build the HTTP
    /// client.
    pub fn open(config: AppConfig, tokens: Arc<dyn TokenStore>) -> AppResult<Self> {
        let db = Arc::new(db::init(&config.data_dir).map_err(AppError::Storage)?);
        let config = AppConfig::load(&db);
        let api: Arc<dyn RemoteApi> = Arc::new(HttpApi::new(
            &config.api_base_url,
            config.request_timeout(),
            tokens.clone(),
        )?);
        Ok(Self::new(config, db, api, tokens))
    }

    pub fn selection(&self) -> SelectionController {
        SelectionController::new(self.config.selection_policy)
    }
}

/// Structured logging to the console and a daily rolling file in
/// `log_dir`. Keep the returned guard alive; dropping it flushes the file.
pub fn init_logging(log_dir: &Path) -> WorkerGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,depot_admin_lib=debug"));

    // Prune old log files before setting up the appender
    diagnostics::prune_old_logs(log_dir);
    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, diagnostics::LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Starting Depot Admin v{}", env!("CARGO_PKG_VERSION"));
    guard
}
