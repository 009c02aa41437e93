//! Depot Admin command line.
//!
//! Usage:
//!   depot-admin list products --search oil
//!   depot-admin summary prfs
//!   depot-admin transition prfs 4 reject --reason "over budget"

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::debug;
use zeroize::Zeroizing;

use depot_admin_lib::api::{HttpApi, RemoteApi};
use depot_admin_lib::auth::{KeyringTokenStore, MemoryTokenStore, TokenStore};
use depot_admin_lib::commands::{auth, expenses, inventory, lubebay, prf, products, records, settings};
use depot_admin_lib::config::AppConfig;
use depot_admin_lib::entities::EntityType;
use depot_admin_lib::query::ListQuery;
use depot_admin_lib::record::RecordId;
use depot_admin_lib::status::TransitionAction;
use depot_admin_lib::{db, diagnostics, init_logging, AppState};

#[derive(Parser, Debug)]
#[command(name = "depot-admin")]
#[command(about = "Depot admin records with offline fallback", version)]
struct Cli {
    /// Skip the API and work against the local fallback ledger only
    #[arg(long, global = true)]
    offline: bool,

    /// In-memory database and token store; nothing is persisted
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Page {
    Catalog,
    Prfs,
    Expenses,
    Inventory,
    Lubebay,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the access token
    Login {
        email: String,
        /// Read from DEPOT_PASSWORD when omitted
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    /// Show the stored session
    Session,
    /// List one page of records
    List {
        entity: EntityType,
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        page_size: Option<u64>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Foreign-key scope as field=value, e.g. --scope lubebay=2
        #[arg(long, value_parser = parse_scope)]
        scope: Vec<(String, String)>,
    },
    Get {
        entity: EntityType,
        id: RecordId,
    },
    /// Create a record from a JSON object
    Create {
        entity: EntityType,
        json: String,
    },
    /// Patch a record with a JSON object
    Update {
        entity: EntityType,
        id: RecordId,
        json: String,
    },
    Delete {
        entity: EntityType,
        id: RecordId,
    },
    BulkDelete {
        entity: EntityType,
        #[arg(required = true)]
        ids: Vec<RecordId>,
    },
    /// submit, approve, reject, cancel, activate or deactivate
    Transition {
        entity: EntityType,
        id: RecordId,
        action: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// A page with its summary cards
    Summary {
        page: Page,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page_number: Option<u64>,
        /// Lubebay to scope transactions to
        #[arg(long)]
        lubebay: Option<RecordId>,
    },
    /// Stock movements for a product with running balance
    BinCard {
        product: RecordId,
        #[arg(long)]
        warehouse: Option<RecordId>,
    },
    /// Record a stock receipt or issue from a JSON object
    Movement { json: String },
    /// Record a lubebay sale from a JSON object
    Sale { json: String },
    /// Version, build and storage info
    About,
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    Show,
    Set { key: String, value: String },
    Reset,
}

fn parse_scope(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected field=value, got '{raw}'")),
    }
}

fn parse_json(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("argument is not valid JSON")?;
    if !value.is_object() {
        bail!("expected a JSON object");
    }
    Ok(value)
}

fn print(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_state(cli: &Cli) -> Result<AppState> {
    let mut config = AppConfig::bootstrap();
    if cli.ephemeral {
        config.offline_mode = config.offline_mode || cli.offline;
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::default());
        let db = db::open_in_memory().map_err(anyhow::Error::msg)?;
        let api: Arc<dyn RemoteApi> = Arc::new(HttpApi::new(
            &config.api_base_url,
            config.request_timeout(),
            tokens.clone(),
        )?);
        return Ok(AppState::new(config, Arc::new(db), api, tokens));
    }
    let tokens: Arc<dyn TokenStore> = Arc::new(KeyringTokenStore);
    let mut state = AppState::open(config, tokens)?;
    if cli.offline && !state.config.offline_mode {
        let mut config = state.config.clone();
        config.offline_mode = true;
        state = AppState::new(config, state.db.clone(), state.api.clone(), state.tokens.clone());
    }
    Ok(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let bootstrap = AppConfig::bootstrap();
    let _guard = init_logging(&diagnostics::get_log_dir(&bootstrap));

    let state = open_state(&cli)?;
    debug!(offline = state.config.offline_mode, "state ready");

    let output = match cli.command {
        Command::Login { email, password } => {
            let password = match password.or_else(|| std::env::var("DEPOT_PASSWORD").ok()) {
                Some(p) => Zeroizing::new(p),
                None => bail!("no password given (use --password or DEPOT_PASSWORD)"),
            };
            auth::login(&state, &email, password).await?
        }
        Command::Logout => auth::logout(&state)?,
        Command::Session => auth::session(&state),
        Command::List {
            entity,
            page,
            page_size,
            search,
            status,
            category,
            scope,
        } => {
            let query = ListQuery {
                page,
                page_size,
                search,
                status,
                category,
                scope,
                ..Default::default()
            };
            records::list(&state, entity, &query).await
        }
        Command::Get { entity, id } => records::get(&state, entity, &id).await?,
        Command::Create { entity, json } => {
            serde_json::to_value(records::create(&state, entity, parse_json(&json)?, None).await?)?
        }
        Command::Update { entity, id, json } => serde_json::to_value(
            records::update(&state, entity, id, parse_json(&json)?, None).await?,
        )?,
        Command::Delete { entity, id } => {
            serde_json::to_value(records::delete(&state, entity, id, None).await?)?
        }
        Command::BulkDelete { entity, ids } => {
            serde_json::to_value(records::bulk_delete(&state, entity, ids).await?)?
        }
        Command::Transition {
            entity,
            id,
            action,
            reason,
        } => {
            let Some(mut action) = TransitionAction::parse(&action) else {
                bail!("unknown action '{action}'");
            };
            if let TransitionAction::Reject { reason: slot } = &mut action {
                *slot = reason;
            }
            serde_json::to_value(records::transition(&state, entity, id, action, None).await?)?
        }
        Command::Summary {
            page,
            search,
            page_number,
            lubebay: bay,
        } => {
            let query = ListQuery {
                page: page_number,
                search,
                ..Default::default()
            };
            match page {
                Page::Catalog => products::catalog_page(&state, &query, &ListQuery::default()).await,
                Page::Prfs => prf::prf_page(&state, &query).await,
                Page::Expenses => expenses::expenses_page(&state, &query).await,
                Page::Inventory => inventory::stock_page(&state, &query).await,
                Page::Lubebay => lubebay::transactions_page(&state, bay.as_ref(), &query).await,
            }
        }
        Command::BinCard { product, warehouse } => {
            inventory::bin_card(&state, &product, warehouse.as_ref()).await
        }
        Command::Movement { json } => serde_json::to_value(
            inventory::record_movement(&state, parse_json(&json)?, None).await?,
        )?,
        Command::Sale { json } => serde_json::to_value(
            lubebay::create_transaction(&state, parse_json(&json)?, None).await?,
        )?,
        Command::About => diagnostics::about(&state.config, &state.db),
        Command::Config(ConfigCommand::Show) => settings::get_settings(&state)?,
        Command::Config(ConfigCommand::Set { key, value }) => {
            settings::set_setting(&state, &Value::String(key), Some(&Value::String(value)))?
        }
        Command::Config(ConfigCommand::Reset) => settings::reset_settings(&state)?,
    };
    print(&output)
}
