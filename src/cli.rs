use clap::{Args, Parser, Subcommand};

use crate::models::WidgetId;

pub fn parse_refresh_rate(s: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|_| "Invalid refresh rate".to_string())
        .and_then(|v| {
            if v > 0.0 && v <= 60.0 {
                Ok(v)
            } else {
                Err("Refresh rate must be between 0 and 60 seconds".to_string())
            }
        })
}

#[derive(Parser, Debug)]
#[command(name = "analytics-dashboard")]
#[command(about = "Realtime analytics dashboard with a drag-reorderable layout")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Backend project URL
    #[arg(long, env = "SUPABASE_URL", global = true)]
    pub url: Option<String>,

    /// Backend anonymous API key
    #[arg(long, env = "SUPABASE_ANON_KEY", global = true, hide_env_values = true)]
    pub anon_key: Option<String>,

    /// Use the built-in demo store instead of the backend
    #[arg(long, global = true)]
    pub offline: bool,

    /// Verbose logging (honours RUST_LOG)
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive dashboard (default)
    #[command(visible_aliases = &["dash", "d"])]
    Dashboard {
        /// Redraw interval in seconds (supports decimals, e.g. 0.5)
        #[arg(short, long, value_parser = parse_refresh_rate)]
        refresh: Option<f64>,

        /// In offline mode, keep inserting demo traffic
        #[arg(long)]
        simulate: bool,
    },

    /// Inspect or change the stored widget order
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum OrderAction {
    /// Print the stored order
    Show {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Store the default order
    Reset,
    /// Swap the positions of two widgets
    Swap { a: WidgetId, b: WidgetId },
}
