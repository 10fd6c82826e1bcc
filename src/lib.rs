pub mod catalog;
pub mod clean;
pub mod cli;
pub mod data;
pub mod derive;
pub mod io_utils;
pub mod report;
pub mod states;
pub mod table;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("grant_scrub", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean(args) => clean::execute(&args),
        Commands::Catalog(args) => handle_catalog(&args),
        Commands::Report(args) => report::execute(&args),
    }
}

fn handle_catalog(args: &cli::CatalogArgs) -> Result<()> {
    let catalog = catalog::Catalog::builtin();
    match args.output.as_deref() {
        Some(path) if !io_utils::is_dash(path) => {
            catalog
                .save(path)
                .with_context(|| format!("Writing catalog to {path:?}"))?;
            info!(
                "Catalog with {} field(s) written to {:?}",
                catalog.fields.len(),
                path
            );
        }
        _ => {
            print!("{}", catalog.to_yaml_string()?);
        }
    }
    Ok(())
}
