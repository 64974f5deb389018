//! Sequential import pipeline
//!
//! Acquire, parse, validate, map, commit: each stage fully completes before
//! the next begins, and failure at any stage short-circuits everything
//! downstream. Nothing is written to the store until the whole document has
//! been validated and mapped, and the commit stage is all-or-nothing.

use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{info, warn};

use crate::archive;
use crate::config::ImportConfig;
use crate::dom::Document;
use crate::fetch;
use crate::mapper::{self, MapOptions};
use crate::schema::CompiledSchema;
use crate::storage::{LoadSummary, Store};

/// Fixed, well-known name of the schema definition inside the schema archive
pub const SCHEMA_ENTRY_NAME: &str = "HSCOrgRefData.xsd";

/// Outcome of a successful run
#[derive(Debug, Clone, Copy)]
pub struct ImportSummary {
    pub organisations: usize,
    pub roles: usize,
    pub relationships: usize,
    pub addresses: usize,
    pub successors: usize,
    pub code_systems: usize,
}

impl From<LoadSummary> for ImportSummary {
    fn from(loaded: LoadSummary) -> Self {
        ImportSummary {
            organisations: loaded.organisations,
            roles: loaded.roles,
            relationships: loaded.relationships,
            addresses: loaded.addresses,
            successors: loaded.successors,
            code_systems: loaded.code_systems,
        }
    }
}

/// One import run over a pair of archives
pub struct ImportPipeline {
    config: ImportConfig,
}

impl ImportPipeline {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline and return the row counts committed
    pub async fn run(&self) -> Result<ImportSummary> {
        let started = Instant::now();

        // Acquire both archives before anything is opened
        let data_path = fetch::acquire(&self.config.data_path, self.config.data_url.as_deref())
            .await
            .context("Failed to acquire the data archive")?;
        let schema_path =
            fetch::acquire(&self.config.schema_path, self.config.schema_url.as_deref())
                .await
                .context("Failed to acquire the schema archive")?;

        // Extract and parse the single data document
        let (entry_name, data) = archive::extract_single_entry(&data_path)?;
        let document = Document::parse_bytes(&data)
            .with_context(|| format!("Failed to parse {}", entry_name))?;
        info!(
            entry = %entry_name,
            bytes = data.len(),
            elapsed = ?started.elapsed(),
            "Data document loaded"
        );

        // Validate the whole document before any record is produced
        let xsd = archive::extract_named_entry(&schema_path, SCHEMA_ENTRY_NAME)?;
        let schema = CompiledSchema::compile_bytes(&xsd)
            .with_context(|| format!("Failed to compile {}", SCHEMA_ENTRY_NAME))?;
        schema
            .validate(&document)
            .context("The data document does not conform to the published schema")?;
        info!("Data document is valid against the published schema");

        // Map the document into the batch of records
        let mapping_started = Instant::now();
        let outcome = mapper::map_document(
            &document,
            MapOptions {
                organisation_limit: self.config.organisation_limit,
            },
        )
        .context("Failed to map the data document")?;
        if !outcome.diagnostics.is_clean() {
            warn!(
                unparseable_dates = outcome.diagnostics.unparseable_dates,
                "Some optional date fields could not be parsed and were left empty"
            );
        }
        info!(
            organisations = outcome.batch.organisation_count(),
            roles = outcome.batch.role_count(),
            relationships = outcome.batch.relationship_count(),
            addresses = outcome.batch.address_count(),
            successors = outcome.batch.successor_count(),
            code_systems = outcome.batch.code_system_count(),
            elapsed = ?mapping_started.elapsed(),
            "Mapping complete"
        );

        // Commit the batch as one atomic unit
        let mut store = Store::connect(self.config.store, &self.config.connection_string())
            .await
            .context("Failed to open the destination store")?;
        store
            .create_tables()
            .await
            .context("Failed to prepare the destination store")?;
        let loaded = store.load(&outcome.batch).await?;

        info!(elapsed = ?started.elapsed(), "Import finished");
        Ok(loaded.into())
    }
}
