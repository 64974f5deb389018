//! Typed entity records produced by the mapper
//!
//! Every record is created fresh during a run and persisted exactly once by
//! the loader; there is no update-in-place. Child records carry the owning
//! organisation's run-local reference and code.

use chrono::{DateTime, NaiveDate, Utc};

/// An organisation from the dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Organisation {
    /// Run-local reference carried by this organisation's child records
    pub ref_id: i64,
    pub code: String,
    pub name: String,
    pub status: String,
    /// Record-class display name resolved through the run's code systems
    pub record_class: String,
    pub last_changed: String,
    pub legal_start_date: Option<NaiveDate>,
    pub legal_end_date: Option<NaiveDate>,
    pub operational_start_date: Option<NaiveDate>,
    pub operational_end_date: Option<NaiveDate>,
    /// Marks an informational, non-authoritative record
    pub ref_only: bool,
    /// Back-filled from the first address carrying a postcode
    pub post_code: Option<String>,
}

/// A role held by an organisation
#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub organisation_ref: i64,
    pub org_code: String,
    pub code: String,
    pub primary_role: bool,
    pub unique_id: Option<String>,
    pub status: String,
    pub legal_start_date: Option<NaiveDate>,
    pub legal_end_date: Option<NaiveDate>,
    pub operational_start_date: Option<NaiveDate>,
    pub operational_end_date: Option<NaiveDate>,
}

/// A relationship between two organisations
///
/// The target is referenced by code only; nothing enforces that the target
/// organisation appears in the same file.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub organisation_ref: i64,
    pub org_code: String,
    pub code: String,
    pub target_code: String,
    pub status: String,
    pub unique_id: Option<String>,
    pub legal_start_date: Option<NaiveDate>,
    pub legal_end_date: Option<NaiveDate>,
    pub operational_start_date: Option<NaiveDate>,
    pub operational_end_date: Option<NaiveDate>,
}

/// A postal address of an organisation; every field is independently optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub organisation_ref: i64,
    pub org_code: String,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub line3: Option<String>,
    pub town: Option<String>,
    pub county: Option<String>,
    pub post_code: Option<String>,
    pub country: Option<String>,
    /// Unique property reference number
    pub uprn: Option<String>,
}

/// A recorded succession (merger, renaming, closure) to another organisation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Successor {
    pub organisation_ref: i64,
    pub org_code: String,
    pub unique_id: Option<String>,
    pub succession_type: Option<String>,
    pub legal_start_date: Option<NaiveDate>,
    pub target_code: Option<String>,
    pub target_primary_role_code: Option<String>,
    pub target_unique_role_id: Option<String>,
}

/// One concept of a controlled vocabulary, scoped to a named category
#[derive(Debug, Clone, PartialEq)]
pub struct CodeSystem {
    pub id: String,
    pub category: String,
    pub display_name: String,
}

/// File-level version information from the document manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub file_version: String,
    pub publication_date: String,
    pub publication_type: String,
    pub publication_seqno: String,
    pub publication_source: String,
    pub file_creation_date: String,
    pub record_count: i64,
    pub content_description: String,
    pub import_timestamp: DateTime<Utc>,
}

/// A key/value setting row
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// An organisation bundled with all of its child records
#[derive(Debug, Clone, PartialEq)]
pub struct MappedOrganisation {
    pub organisation: Organisation,
    pub roles: Vec<Role>,
    pub relationships: Vec<Relationship>,
    pub addresses: Vec<Address>,
    pub successors: Vec<Successor>,
}

/// The complete ordered batch of records for one run
///
/// Handed to the loader as a single value; the loader persists it in one
/// transaction in the order version, code systems, organisations with their
/// children, setting.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBatch {
    pub version: Version,
    pub code_systems: Vec<CodeSystem>,
    pub organisations: Vec<MappedOrganisation>,
    pub setting: Setting,
}

impl ImportBatch {
    pub fn organisation_count(&self) -> usize {
        self.organisations.len()
    }

    pub fn role_count(&self) -> usize {
        self.organisations.iter().map(|o| o.roles.len()).sum()
    }

    pub fn relationship_count(&self) -> usize {
        self.organisations.iter().map(|o| o.relationships.len()).sum()
    }

    pub fn address_count(&self) -> usize {
        self.organisations.iter().map(|o| o.addresses.len()).sum()
    }

    pub fn successor_count(&self) -> usize {
        self.organisations.iter().map(|o| o.successors.len()).sum()
    }

    pub fn code_system_count(&self) -> usize {
        self.code_systems.len()
    }
}
