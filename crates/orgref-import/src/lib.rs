//! Orgref Import Library
//!
//! Imports a zip-published national organisation reference XML dataset into a
//! relational store. Each run acquires the data and schema archives, parses
//! the single contained XML document, validates it against the published
//! schema, maps it into typed entity records, and commits the whole batch in
//! one transaction.
//!
//! # Example
//!
//! ```no_run
//! use orgref_import::config::ImportConfig;
//! use orgref_import::pipeline::ImportPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ImportConfig::local("data/fullfile.zip", "data/ancilliary.zip");
//!     let summary = ImportPipeline::new(config).run().await?;
//!     println!("imported {} organisations", summary.organisations);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod dom;
pub mod fetch;
pub mod mapper;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod storage;
