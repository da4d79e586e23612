//! Pantry demo
//!
//! Defines two stores, installs a registry in an application context and
//! drives them from a few nested scopes.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pantry_core::Context;
use pantry_store::{RegistryConfig, StoreRegistry};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod stores;

#[derive(Parser)]
#[command(name = "pantry-demo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pantry store factory demo", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Registry configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Options-style store: increment an age and read the doubled value
    Index {
        /// Amount to add to the age
        #[arg(default_value = "2")]
        by: i64,
    },

    /// Setup-style store: update a record field and read the derived value
    Setup {
        /// New value for `a.v`
        #[arg(default_value = "15")]
        v: i64,
    },

    /// Run both scenarios and list the constructed stores
    All,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => RegistryConfig::load(path)?,
        None => RegistryConfig::default(),
    };

    let app = Context::root();
    let registry = StoreRegistry::with_config(config);
    registry.install(&app);

    match cli.command {
        Commands::Index { by } => cmd_index(&app, by),
        Commands::Setup { v } => cmd_setup(&app, v),
        Commands::All => {
            cmd_index(&app, 2)?;
            cmd_setup(&app, 15)?;
            info!("Stores: {}", registry.ids().join(", "));
            Ok(())
        }
    }
}

fn cmd_index(app: &Context, by: i64) -> Result<()> {
    let use_index = stores::use_index()?;

    // A component that mutates the store
    let editor = app.child();
    let store = use_index.use_store(&editor)?;
    info!(
        "{} is {} (double: {})",
        store.get::<String>("name")?,
        store.get::<i64>("age")?,
        store.get::<i64>("doubleAge")?
    );
    let increment = store.action("increment")?;
    let age = increment.call(&[json!(by)])?;
    info!("increment({by}) -> {age}");

    // A sibling component sees the same instance
    let viewer = app.child();
    let store = use_index.use_store(&viewer)?;
    info!("doubleAge = {}", store.get::<i64>("doubleAge")?);
    Ok(())
}

fn cmd_setup(app: &Context, v: i64) -> Result<()> {
    let use_fn_store = stores::use_fn_store()?;

    let store = use_fn_store.use_store(&app.child())?;
    info!("doubleA = {}", store.get::<i64>("doubleA")?);

    store.record("a")?.set("v", v)?;
    info!("a.v = {v}");

    let store = use_fn_store.use_store(&app.child().child())?;
    info!("doubleA = {}", store.get::<i64>("doubleA")?);
    Ok(())
}
