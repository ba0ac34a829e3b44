use crate::core::ProductFilter;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "kaspi-tracker")]
#[command(about = "Tracks how long products stay in the Kaspi unrecognized list")]
pub struct CliConfig {
    /// Path to TOML configuration file (default: kaspi-tracker.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override database URL from config
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Log in, download the unrecognized list and reconcile it
    Sync,

    /// Reconcile a local .xlsx export without network access
    Import {
        /// Path to the downloaded spreadsheet
        file: String,
    },

    /// Log in and save the export without touching the database
    Download {
        /// Output file (default: storage.download_path)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Export products and activity periods as a zip of CSV files
    Report {
        /// Output directory (default: storage.report_dir)
        #[arg(short, long)]
        output: Option<String>,

        /// Only products currently in (true) or out of (false) the list
        #[arg(long)]
        in_list: Option<bool>,

        /// Case-insensitive match on name or SKU
        #[arg(long)]
        search: Option<String>,
    },
}

impl Command {
    pub fn product_filter(&self) -> ProductFilter {
        match self {
            Command::Report { in_list, search, .. } => ProductFilter {
                in_list: *in_list,
                search: search.clone(),
            },
            _ => ProductFilter::default(),
        }
    }
}
