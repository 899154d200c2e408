pub mod cli;
pub mod composer;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod formatters;
pub mod live;
pub mod logging;
pub mod models;
pub mod order_store;
pub mod reorder;
pub mod source;
pub mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Cli, Commands, OrderAction};
use composer::resolve_order;
use config::Config;
use models::WidgetCatalog;
use order_store::OrderStore;
use std::sync::Arc;
use store::{MemoryStore, RemoteStore, RestStore};

/// The shared store client, plus the demo store when running offline.
pub struct Backend {
    pub client: Arc<dyn RemoteStore>,
    pub demo: Option<MemoryStore>,
}

pub fn connect(config: &Config, offline: bool) -> Result<Backend> {
    let backend = &config.backend;
    match (&backend.url, &backend.anon_key) {
        (Some(url), Some(key)) if !offline => {
            let rest = RestStore::new(url, key, backend.request_timeout(), backend.poll_interval())
                .context("Failed to build HTTP client")?;
            tracing::info!(url = %url, "using remote store");
            Ok(Backend {
                client: Arc::new(rest),
                demo: None,
            })
        }
        _ => {
            if !offline {
                tracing::warn!("backend url or anon key not configured, running offline with demo data");
            }
            let demo = MemoryStore::with_demo_data(Utc::now());
            Ok(Backend {
                client: Arc::new(demo.clone()),
                demo: Some(demo),
            })
        }
    }
}

pub fn build_order_store(config: &Config, catalog: &WidgetCatalog, client: Arc<dyn RemoteStore>) -> OrderStore {
    OrderStore::new(
        client,
        &config.backend.preferences_table,
        config.backend.order_key,
        catalog.default_order(),
    )
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.global.config.as_deref())?;
    config.apply_overrides(&cli.global);

    let command = cli.command.unwrap_or(Commands::Dashboard {
        refresh: None,
        simulate: false,
    });

    match command {
        Commands::Dashboard { refresh, simulate } => {
            let _guard = logging::init_file(&config.log_directory(), config.logging.debug)?;
            if let Some(refresh) = refresh {
                config.dashboard.refresh = refresh;
            }
            let backend = connect(&config, cli.global.offline)?;
            dashboard::run_dashboard(&config, backend, simulate).await
        }
        Commands::Order { action } => {
            logging::init_stderr(config.logging.debug);
            let backend = connect(&config, cli.global.offline)?;
            if backend.demo.is_some() {
                println!("Note: running against the in-memory demo store; changes are not kept.");
            }
            run_order_command(action, &config, backend.client).await
        }
    }
}

pub async fn run_order_command(action: OrderAction, config: &Config, client: Arc<dyn RemoteStore>) -> Result<()> {
    let catalog = WidgetCatalog::default();
    let orders = build_order_store(config, &catalog, client);

    match action {
        OrderAction::Show { json } => {
            let record = orders.load().await;
            let layout = resolve_order(&catalog, &record.sequence);
            if json {
                println!("{}", formatters::format_order_json(&record, &layout, &catalog)?);
            } else {
                formatters::print_order_summary(&record, &catalog);
                println!("{}", formatters::format_order_table(&layout));
            }
        }
        OrderAction::Reset => {
            orders
                .try_commit(orders.default_order())
                .await
                .context("Failed to store the default order")?;
            println!("Widget order reset to {:?}", orders.default_order());
        }
        OrderAction::Swap { a, b } => {
            let mut sequence = orders.load().await.sequence;
            if !reorder::swap_positions(&mut sequence, a, b) {
                anyhow::bail!("Widget {} or {} is not in the stored order {:?}", a, b, sequence);
            }
            orders
                .try_commit(&sequence)
                .await
                .context("Failed to store the new order")?;
            println!("Widget order is now {:?}", sequence);
        }
    }

    Ok(())
}
