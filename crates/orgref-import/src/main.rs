//! Orgref Import - organisation reference data import tool

use anyhow::Result;
use clap::Parser;
use orgref_common::logging::{init_logging, LogConfig, LogLevel};
use orgref_import::config::{
    ImportConfig, StoreKind, DEFAULT_DATA_PATH, DEFAULT_DATA_URL, DEFAULT_SCHEMA_PATH,
    DEFAULT_SCHEMA_URL, TEST_IMPORT_LIMIT,
};
use orgref_import::pipeline::ImportPipeline;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "orgref-import")]
#[command(author, version, about = "Organisation reference data import tool")]
struct Cli {
    /// Run the import in verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// The destination store to use
    #[arg(short, long, value_enum, default_value_t = StoreKind::Sqlite)]
    dbms: StoreKind,

    /// Skip the XML data file download and use a local copy
    #[arg(short, long)]
    local: bool,

    /// Path to the local XML data archive
    #[arg(short = 'x', long, default_value = DEFAULT_DATA_PATH)]
    xml: PathBuf,

    /// Path to the local XSD schema archive
    #[arg(short, long, default_value = DEFAULT_SCHEMA_PATH)]
    schema: PathBuf,

    /// URL of the official XML data archive
    #[arg(short = 'u', long)]
    data_url: Option<String>,

    /// URL of the official XML schema archive
    #[arg(short = 'w', long)]
    schema_url: Option<String>,

    /// Connection string for the destination store
    #[arg(short, long)]
    connection: Option<String>,

    /// Import only the first ten organisations, for use in testing
    #[arg(short, long)]
    testdb: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment variables win over the verbosity flag
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose && std::env::var("LOG_LEVEL").is_err() {
        log_config.level = LogLevel::Debug;
    }
    log_config.log_file_prefix = "orgref-import".to_string();

    init_logging(&log_config)?;

    let config = if cli.local {
        debug!("Running in local mode");
        ImportConfig {
            data_path: cli.xml,
            schema_path: cli.schema,
            data_url: None,
            schema_url: None,
            store: cli.dbms,
            connection: cli.connection,
            organisation_limit: cli.testdb.then_some(TEST_IMPORT_LIMIT),
        }
    } else {
        debug!("Running in download mode");
        ImportConfig {
            data_path: cli.xml,
            schema_path: cli.schema,
            data_url: Some(cli.data_url.unwrap_or_else(|| DEFAULT_DATA_URL.to_string())),
            schema_url: Some(
                cli.schema_url
                    .unwrap_or_else(|| DEFAULT_SCHEMA_URL.to_string()),
            ),
            store: cli.dbms,
            connection: cli.connection,
            organisation_limit: cli.testdb.then_some(TEST_IMPORT_LIMIT),
        }
    };

    // The publicly-accessible source data has been withdrawn, so only local
    // archives are accepted; this is checked before any stage runs
    if config.data_url.is_some() || config.schema_url.is_some() {
        error!(
            "Download mode is not currently available due to the publicly-accessible source data \
             being removed. Please download the source data manually, and then re-run with the \
             local switch e.g. 'orgref-import --local'"
        );
        std::process::exit(1);
    }

    if cli.testdb {
        debug!(limit = TEST_IMPORT_LIMIT, "Running in test mode");
    }

    let started = Instant::now();
    let summary = ImportPipeline::new(config).run().await?;

    info!(
        organisations = summary.organisations,
        roles = summary.roles,
        relationships = summary.relationships,
        addresses = summary.addresses,
        successors = summary.successors,
        code_systems = summary.code_systems,
        elapsed = ?started.elapsed(),
        "Database import finished"
    );
    Ok(())
}
