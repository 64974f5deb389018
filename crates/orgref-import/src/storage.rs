//! Transactional batch loader
//!
//! Persists a complete [`ImportBatch`] as one atomic unit of work. A single
//! connection is acquired per run and held for the whole load; every insert
//! runs inside one transaction that is committed only on full success and
//! explicitly rolled back on any failure. The connection is closed on every
//! exit path.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{Any, AnyConnection, Connection, Transaction};
use std::sync::Once;
use tracing::{debug, error, info};

use crate::config::StoreKind;
use crate::models::{
    Address, CodeSystem, ImportBatch, Organisation, Relationship, Role, Setting, Successor,
    Version,
};

/// Table-creation statements shared by both store kinds.
///
/// Dates are persisted as ISO-8601 text; run-local references as BIGINT.
const CREATE_TABLES: [&str; 11] = [
    "CREATE TABLE IF NOT EXISTS versions (
        file_version TEXT,
        publication_date TEXT,
        publication_type TEXT,
        publication_seqno TEXT,
        publication_source TEXT,
        file_creation_date TEXT,
        import_timestamp TEXT,
        record_count BIGINT,
        content_description TEXT
    )",
    "CREATE TABLE IF NOT EXISTS codesystems (
        id TEXT,
        name TEXT,
        displayname TEXT
    )",
    "CREATE TABLE IF NOT EXISTS organisations (
        ref BIGINT,
        odscode TEXT,
        name TEXT,
        status TEXT,
        record_class TEXT,
        last_changed TEXT,
        legal_start_date TEXT,
        legal_end_date TEXT,
        operational_start_date TEXT,
        operational_end_date TEXT,
        ref_only BOOLEAN,
        post_code TEXT
    )",
    "CREATE TABLE IF NOT EXISTS roles (
        organisation_ref BIGINT,
        org_odscode TEXT,
        code TEXT,
        primary_role BOOLEAN,
        unique_id TEXT,
        status TEXT,
        legal_start_date TEXT,
        legal_end_date TEXT,
        operational_start_date TEXT,
        operational_end_date TEXT
    )",
    "CREATE TABLE IF NOT EXISTS relationships (
        organisation_ref BIGINT,
        org_odscode TEXT,
        code TEXT,
        target_odscode TEXT,
        status TEXT,
        unique_id TEXT,
        legal_start_date TEXT,
        legal_end_date TEXT,
        operational_start_date TEXT,
        operational_end_date TEXT
    )",
    "CREATE TABLE IF NOT EXISTS addresses (
        organisation_ref BIGINT,
        org_odscode TEXT,
        address_line1 TEXT,
        address_line2 TEXT,
        address_line3 TEXT,
        town TEXT,
        county TEXT,
        post_code TEXT,
        country TEXT,
        uprn TEXT
    )",
    "CREATE TABLE IF NOT EXISTS successors (
        organisation_ref BIGINT,
        org_odscode TEXT,
        unique_id TEXT,
        type TEXT,
        legal_start_date TEXT,
        target_odscode TEXT,
        target_primary_role_code TEXT,
        target_unique_role_id TEXT
    )",
    "CREATE TABLE IF NOT EXISTS settings (
        key TEXT,
        value TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_roles_org_odscode ON roles (org_odscode)",
    "CREATE INDEX IF NOT EXISTS idx_relationships_org_odscode ON relationships (org_odscode)",
    "CREATE INDEX IF NOT EXISTS idx_addresses_org_odscode ON addresses (org_odscode)",
];

/// Rows written per table by a successful load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub organisations: usize,
    pub roles: usize,
    pub relationships: usize,
    pub addresses: usize,
    pub successors: usize,
    pub code_systems: usize,
}

/// One run's handle on the destination store
pub struct Store {
    conn: AnyConnection,
    kind: StoreKind,
}

impl Store {
    /// Connect to the destination store
    pub async fn connect(kind: StoreKind, url: &str) -> Result<Store> {
        install_drivers();
        let conn = AnyConnection::connect(url)
            .await
            .with_context(|| format!("Failed to connect to {} store", kind))?;
        debug!(%kind, "Connected to destination store");
        Ok(Store { conn, kind })
    }

    /// Create the destination tables if they do not already exist
    pub async fn create_tables(&mut self) -> Result<()> {
        for statement in CREATE_TABLES {
            sqlx::query(statement)
                .execute(&mut self.conn)
                .await
                .context("Failed to create destination tables")?;
        }
        Ok(())
    }

    /// Persist the whole batch in one transaction.
    ///
    /// Consumes the store: whatever happens, the connection is closed before
    /// returning. On any insert failure the transaction is rolled back and
    /// the error re-raised; no partial dataset is ever left visible.
    pub async fn load(mut self, batch: &ImportBatch) -> Result<LoadSummary> {
        let result = Self::load_in_tx(&mut self.conn, self.kind, batch).await;
        let closed = self.conn.close().await;

        match result {
            Ok(summary) => {
                closed.context("Failed to close store connection")?;
                info!(
                    organisations = summary.organisations,
                    roles = summary.roles,
                    relationships = summary.relationships,
                    addresses = summary.addresses,
                    successors = summary.successors,
                    "Batch committed"
                );
                Ok(summary)
            },
            Err(e) => {
                if let Err(close_err) = closed {
                    error!(error = %close_err, "Failed to close store connection after rollback");
                }
                Err(e)
            },
        }
    }

    async fn load_in_tx(
        conn: &mut AnyConnection,
        kind: StoreKind,
        batch: &ImportBatch,
    ) -> Result<LoadSummary> {
        let mut tx = conn.begin().await.context("Failed to begin transaction")?;

        match Self::insert_batch(&mut tx, kind, batch).await {
            Ok(summary) => {
                tx.commit().await.context("Failed to commit import")?;
                Ok(summary)
            },
            Err(e) => {
                debug!("Rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            },
        }
    }

    async fn insert_batch(
        tx: &mut Transaction<'_, Any>,
        kind: StoreKind,
        batch: &ImportBatch,
    ) -> Result<LoadSummary> {
        Self::insert_version(tx, kind, &batch.version).await?;
        for code_system in &batch.code_systems {
            Self::insert_code_system(tx, kind, code_system).await?;
        }
        for org in &batch.organisations {
            Self::insert_organisation(tx, kind, &org.organisation).await?;
            for role in &org.roles {
                Self::insert_role(tx, kind, role).await?;
            }
            for relationship in &org.relationships {
                Self::insert_relationship(tx, kind, relationship).await?;
            }
            for address in &org.addresses {
                Self::insert_address(tx, kind, address).await?;
            }
            for successor in &org.successors {
                Self::insert_successor(tx, kind, successor).await?;
            }
        }
        Self::insert_setting(tx, kind, &batch.setting).await?;

        Ok(LoadSummary {
            organisations: batch.organisation_count(),
            roles: batch.role_count(),
            relationships: batch.relationship_count(),
            addresses: batch.address_count(),
            successors: batch.successor_count(),
            code_systems: batch.code_system_count(),
        })
    }

    async fn insert_version(
        tx: &mut Transaction<'_, Any>,
        kind: StoreKind,
        version: &Version,
    ) -> Result<()> {
        let sql = insert_sql(
            kind,
            "versions",
            &[
                "file_version",
                "publication_date",
                "publication_type",
                "publication_seqno",
                "publication_source",
                "file_creation_date",
                "import_timestamp",
                "record_count",
                "content_description",
            ],
        );
        sqlx::query(&sql)
            .bind(version.file_version.as_str())
            .bind(version.publication_date.as_str())
            .bind(version.publication_type.as_str())
            .bind(version.publication_seqno.as_str())
            .bind(version.publication_source.as_str())
            .bind(version.file_creation_date.as_str())
            .bind(version.import_timestamp.to_rfc3339())
            .bind(version.record_count)
            .bind(version.content_description.as_str())
            .execute(&mut **tx)
            .await
            .context("Failed to insert version row")?;
        Ok(())
    }

    async fn insert_code_system(
        tx: &mut Transaction<'_, Any>,
        kind: StoreKind,
        code_system: &CodeSystem,
    ) -> Result<()> {
        let sql = insert_sql(kind, "codesystems", &["id", "name", "displayname"]);
        sqlx::query(&sql)
            .bind(code_system.id.as_str())
            .bind(code_system.category.as_str())
            .bind(code_system.display_name.as_str())
            .execute(&mut **tx)
            .await
            .context("Failed to insert codesystem row")?;
        Ok(())
    }

    async fn insert_organisation(
        tx: &mut Transaction<'_, Any>,
        kind: StoreKind,
        org: &Organisation,
    ) -> Result<()> {
        let sql = insert_sql(
            kind,
            "organisations",
            &[
                "ref",
                "odscode",
                "name",
                "status",
                "record_class",
                "last_changed",
                "legal_start_date",
                "legal_end_date",
                "operational_start_date",
                "operational_end_date",
                "ref_only",
                "post_code",
            ],
        );
        sqlx::query(&sql)
            .bind(org.ref_id)
            .bind(org.code.as_str())
            .bind(org.name.as_str())
            .bind(org.status.as_str())
            .bind(org.record_class.as_str())
            .bind(org.last_changed.as_str())
            .bind(iso_date(org.legal_start_date))
            .bind(iso_date(org.legal_end_date))
            .bind(iso_date(org.operational_start_date))
            .bind(iso_date(org.operational_end_date))
            .bind(org.ref_only)
            .bind(org.post_code.as_deref())
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to insert organisation {}", org.code))?;
        Ok(())
    }

    async fn insert_role(tx: &mut Transaction<'_, Any>, kind: StoreKind, role: &Role) -> Result<()> {
        let sql = insert_sql(
            kind,
            "roles",
            &[
                "organisation_ref",
                "org_odscode",
                "code",
                "primary_role",
                "unique_id",
                "status",
                "legal_start_date",
                "legal_end_date",
                "operational_start_date",
                "operational_end_date",
            ],
        );
        sqlx::query(&sql)
            .bind(role.organisation_ref)
            .bind(role.org_code.as_str())
            .bind(role.code.as_str())
            .bind(role.primary_role)
            .bind(role.unique_id.as_deref())
            .bind(role.status.as_str())
            .bind(iso_date(role.legal_start_date))
            .bind(iso_date(role.legal_end_date))
            .bind(iso_date(role.operational_start_date))
            .bind(iso_date(role.operational_end_date))
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to insert role for {}", role.org_code))?;
        Ok(())
    }

    async fn insert_relationship(
        tx: &mut Transaction<'_, Any>,
        kind: StoreKind,
        relationship: &Relationship,
    ) -> Result<()> {
        let sql = insert_sql(
            kind,
            "relationships",
            &[
                "organisation_ref",
                "org_odscode",
                "code",
                "target_odscode",
                "status",
                "unique_id",
                "legal_start_date",
                "legal_end_date",
                "operational_start_date",
                "operational_end_date",
            ],
        );
        sqlx::query(&sql)
            .bind(relationship.organisation_ref)
            .bind(relationship.org_code.as_str())
            .bind(relationship.code.as_str())
            .bind(relationship.target_code.as_str())
            .bind(relationship.status.as_str())
            .bind(relationship.unique_id.as_deref())
            .bind(iso_date(relationship.legal_start_date))
            .bind(iso_date(relationship.legal_end_date))
            .bind(iso_date(relationship.operational_start_date))
            .bind(iso_date(relationship.operational_end_date))
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to insert relationship for {}", relationship.org_code))?;
        Ok(())
    }

    async fn insert_address(
        tx: &mut Transaction<'_, Any>,
        kind: StoreKind,
        address: &Address,
    ) -> Result<()> {
        let sql = insert_sql(
            kind,
            "addresses",
            &[
                "organisation_ref",
                "org_odscode",
                "address_line1",
                "address_line2",
                "address_line3",
                "town",
                "county",
                "post_code",
                "country",
                "uprn",
            ],
        );
        sqlx::query(&sql)
            .bind(address.organisation_ref)
            .bind(address.org_code.as_str())
            .bind(address.line1.as_deref())
            .bind(address.line2.as_deref())
            .bind(address.line3.as_deref())
            .bind(address.town.as_deref())
            .bind(address.county.as_deref())
            .bind(address.post_code.as_deref())
            .bind(address.country.as_deref())
            .bind(address.uprn.as_deref())
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to insert address for {}", address.org_code))?;
        Ok(())
    }

    async fn insert_successor(
        tx: &mut Transaction<'_, Any>,
        kind: StoreKind,
        successor: &Successor,
    ) -> Result<()> {
        let sql = insert_sql(
            kind,
            "successors",
            &[
                "organisation_ref",
                "org_odscode",
                "unique_id",
                "type",
                "legal_start_date",
                "target_odscode",
                "target_primary_role_code",
                "target_unique_role_id",
            ],
        );
        sqlx::query(&sql)
            .bind(successor.organisation_ref)
            .bind(successor.org_code.as_str())
            .bind(successor.unique_id.as_deref())
            .bind(successor.succession_type.as_deref())
            .bind(iso_date(successor.legal_start_date))
            .bind(successor.target_code.as_deref())
            .bind(successor.target_primary_role_code.as_deref())
            .bind(successor.target_unique_role_id.as_deref())
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to insert successor for {}", successor.org_code))?;
        Ok(())
    }

    async fn insert_setting(
        tx: &mut Transaction<'_, Any>,
        kind: StoreKind,
        setting: &Setting,
    ) -> Result<()> {
        let sql = insert_sql(kind, "settings", &["key", "value"]);
        sqlx::query(&sql)
            .bind(setting.key.as_str())
            .bind(setting.value.as_str())
            .execute(&mut **tx)
            .await
            .context("Failed to insert setting row")?;
        Ok(())
    }
}

/// Register the compiled-in sqlx drivers; callable any number of times
pub fn install_drivers() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(sqlx::any::install_default_drivers);
}

/// Build an INSERT statement with the placeholder syntax of the store kind
fn insert_sql(kind: StoreKind, table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| placeholder(kind, i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn placeholder(kind: StoreKind, index: usize) -> String {
    match kind {
        StoreKind::Sqlite => "?".to_string(),
        StoreKind::Postgres => format!("${}", index),
    }
}

fn iso_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|date| date.to_string())
}
