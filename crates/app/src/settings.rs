//! Handles settings for the daemon.
//!
//! Values come from an optional TOML file (`ledgerd.toml` unless `--config`
//! says otherwise) and `LEDGER_*` environment variables, e.g.
//! `LEDGER_APP__LEVEL=debug`.
use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "ledgerd";

#[derive(Debug, Parser)]
#[command(name = "ledgerd", about = "Ledger balance engine daemon")]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long, env = "LEDGER_CONFIG")]
    config: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("ledger.db".to_string())
    }
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Self::Memory => String::from("sqlite::memory:"),
            Self::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let args = Args::parse();
        let path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("LEDGER").separator("__"))
            .build()?
            .try_deserialize()
    }
}
