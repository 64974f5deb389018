//! Document-to-record mapping
//!
//! Walks the validated document tree and produces the complete batch of
//! entity records for one run. The code-system pass runs first and builds the
//! id-to-display-name index the organisation pass resolves record classes
//! through; the index is threaded into the organisation pass as an argument
//! and read-only from then on.
//!
//! Optional fields are extracted with a tolerant policy: a missing
//! sub-element, or a date that is present but unparseable, leaves that one
//! field empty and the record intact. Parse failures are counted on a
//! diagnostics channel instead of being discarded silently.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dom::{Document, Element};
use crate::models::{
    Address, CodeSystem, ImportBatch, MappedOrganisation, Organisation, Relationship, Role,
    Setting, Successor, Version,
};

/// Dataset format marker written to the settings table on every run
pub const SCHEMA_VERSION: &str = "015";

/// Code-system categories enumerated from `CodeSystems/CodeSystem`
const CODE_SYSTEM_CATEGORIES: [&str; 3] = [
    "OrganisationRelationship",
    "OrganisationRecordClass",
    "OrganisationRole",
];

/// The primary-role category is read from the manifest, not `CodeSystems`
const PRIMARY_ROLE_SCOPE: &str = "PrimaryRoleScope";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum MapError {
    #[error("{element}: required field {field} is missing")]
    MissingField { element: String, field: String },

    #[error("organisation {org_code}: record class id {id:?} is not among this file's code systems")]
    UnknownRecordClass { org_code: String, id: String },

    #[error("manifest field {0} is missing")]
    MissingManifestField(&'static str),

    #[error("manifest record count {0:?} is not a number")]
    InvalidRecordCount(String),
}

pub type Result<T> = std::result::Result<T, MapError>;

/// Mapping options
#[derive(Debug, Clone, Copy, Default)]
pub struct MapOptions {
    /// Bound on the organisation pass; None maps every organisation
    pub organisation_limit: Option<usize>,
}

/// Id-to-display-name lookup built by the code-system pass
#[derive(Debug, Default)]
pub struct CodeIndex {
    entries: HashMap<String, String>,
}

impl CodeIndex {
    fn insert(&mut self, id: &str, display_name: &str) {
        self.entries.insert(id.to_string(), display_name.to_string());
    }

    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counters for tolerated field-level failures
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MapDiagnostics {
    /// Date values that were present but did not parse
    pub unparseable_dates: usize,
}

impl MapDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.unparseable_dates == 0
    }
}

/// The mapper's full output for one run
#[derive(Debug)]
pub struct MapOutcome {
    pub batch: ImportBatch,
    pub diagnostics: MapDiagnostics,
}

/// Map a validated document into the batch of records for one run
pub fn map_document(doc: &Document, options: MapOptions) -> Result<MapOutcome> {
    let root = doc.root();
    let mut diagnostics = MapDiagnostics::default();

    let version = map_version(root)?;
    let (code_systems, code_index) = map_code_systems(root);
    debug!(
        code_systems = code_systems.len(),
        indexed = code_index.len(),
        "Code-system pass complete"
    );

    let mut organisations = Vec::new();
    if let Some(container) = root.child("Organisations") {
        for node in container.children("Organisation") {
            if let Some(limit) = options.organisation_limit {
                if organisations.len() >= limit {
                    debug!(limit, "Organisation limit reached, stopping the pass");
                    break;
                }
            }
            let ref_id = organisations.len() as i64 + 1;
            organisations.push(map_organisation(node, ref_id, &code_index, &mut diagnostics)?);
        }
    }

    let setting = Setting {
        key: "schema_version".to_string(),
        value: SCHEMA_VERSION.to_string(),
    };

    Ok(MapOutcome {
        batch: ImportBatch {
            version,
            code_systems,
            organisations,
            setting,
        },
        diagnostics,
    })
}

/// Emit one CodeSystem record per concept and build the lookup index.
///
/// The index covers the three code-system categories; primary-role concepts
/// are recorded but not indexed, record-class resolution never needs them.
fn map_code_systems(root: &Element) -> (Vec<CodeSystem>, CodeIndex) {
    let mut records = Vec::new();
    let mut index = CodeIndex::default();

    if let Some(code_systems) = root.child("CodeSystems") {
        for category in CODE_SYSTEM_CATEGORIES {
            let system = code_systems
                .children("CodeSystem")
                .find(|system| system.attr("name") == Some(category));
            let Some(system) = system else { continue };

            for concept in system.children("concept") {
                let (Some(id), Some(display_name)) =
                    (concept.attr("id"), concept.attr("displayName"))
                else {
                    continue;
                };
                index.insert(id, display_name);
                records.push(CodeSystem {
                    id: id.to_string(),
                    category: category.to_string(),
                    display_name: display_name.to_string(),
                });
            }
        }
    }

    if let Some(scope) = root.find("Manifest/PrimaryRoleScope") {
        for role in scope.children("PrimaryRole") {
            let (Some(id), Some(display_name)) = (role.attr("id"), role.attr("displayName"))
            else {
                continue;
            };
            records.push(CodeSystem {
                id: id.to_string(),
                category: PRIMARY_ROLE_SCOPE.to_string(),
                display_name: display_name.to_string(),
            });
        }
    }

    (records, index)
}

fn map_organisation(
    node: &Element,
    ref_id: i64,
    codes: &CodeIndex,
    diagnostics: &mut MapDiagnostics,
) -> Result<MappedOrganisation> {
    let code = node
        .find("OrgId")
        .and_then(|id| id.attr("extension"))
        .filter(|code| !code.is_empty())
        .ok_or_else(|| missing("Organisation", "OrgId@extension"))?
        .to_string();
    let name = node
        .child("Name")
        .and_then(Element::text)
        .ok_or_else(|| missing("Organisation", "Name"))?
        .to_string();
    let status = node
        .child("Status")
        .and_then(|status| status.attr("value"))
        .ok_or_else(|| missing("Organisation", "Status@value"))?
        .to_string();
    let last_changed = node
        .child("LastChangeDate")
        .and_then(|date| date.attr("value"))
        .ok_or_else(|| missing("Organisation", "LastChangeDate@value"))?
        .to_string();

    let record_class_id = node
        .attr("orgRecordClass")
        .ok_or_else(|| missing("Organisation", "orgRecordClass"))?;
    let record_class = codes
        .display_name(record_class_id)
        .ok_or_else(|| MapError::UnknownRecordClass {
            org_code: code.clone(),
            id: record_class_id.to_string(),
        })?
        .to_string();

    let dates = extract_date_ranges(node, diagnostics);
    let mut organisation = Organisation {
        ref_id,
        code,
        name,
        status,
        record_class,
        last_changed,
        legal_start_date: dates.legal_start,
        legal_end_date: dates.legal_end,
        operational_start_date: dates.operational_start,
        operational_end_date: dates.operational_end,
        ref_only: node.attr("refOnly").is_some(),
        post_code: None,
    };

    let roles = map_roles(node, &organisation, diagnostics)?;
    let relationships = map_relationships(node, &organisation, diagnostics)?;
    let addresses = map_addresses(node, &mut organisation);
    let successors = map_successors(node, &organisation, diagnostics);

    Ok(MappedOrganisation {
        organisation,
        roles,
        relationships,
        addresses,
        successors,
    })
}

fn map_roles(
    node: &Element,
    organisation: &Organisation,
    diagnostics: &mut MapDiagnostics,
) -> Result<Vec<Role>> {
    let mut roles = Vec::new();
    if let Some(container) = node.child("Roles") {
        for role in container.children("Role") {
            let dates = extract_date_ranges(role, diagnostics);
            roles.push(Role {
                organisation_ref: organisation.ref_id,
                org_code: organisation.code.clone(),
                code: role
                    .attr("id")
                    .ok_or_else(|| missing("Role", "id"))?
                    .to_string(),
                primary_role: role.attr("primaryRole").is_some(),
                unique_id: role.attr("uniqueRoleId").map(str::to_string),
                status: role
                    .child("Status")
                    .and_then(|status| status.attr("value"))
                    .ok_or_else(|| missing("Role", "Status@value"))?
                    .to_string(),
                legal_start_date: dates.legal_start,
                legal_end_date: dates.legal_end,
                operational_start_date: dates.operational_start,
                operational_end_date: dates.operational_end,
            });
        }
    }
    Ok(roles)
}

/// An organisation without a `Rels` container has zero relationships
fn map_relationships(
    node: &Element,
    organisation: &Organisation,
    diagnostics: &mut MapDiagnostics,
) -> Result<Vec<Relationship>> {
    let mut relationships = Vec::new();
    if let Some(container) = node.child("Rels") {
        for relationship in container.children("Rel") {
            let dates = extract_date_ranges(relationship, diagnostics);
            relationships.push(Relationship {
                organisation_ref: organisation.ref_id,
                org_code: organisation.code.clone(),
                code: relationship
                    .attr("id")
                    .ok_or_else(|| missing("Rel", "id"))?
                    .to_string(),
                target_code: relationship
                    .find("Target/OrgId")
                    .and_then(|id| id.attr("extension"))
                    .ok_or_else(|| missing("Rel", "Target/OrgId@extension"))?
                    .to_string(),
                status: relationship
                    .child("Status")
                    .and_then(|status| status.attr("value"))
                    .ok_or_else(|| missing("Rel", "Status@value"))?
                    .to_string(),
                unique_id: relationship.attr("uniqueRelId").map(str::to_string),
                legal_start_date: dates.legal_start,
                legal_end_date: dates.legal_end,
                operational_start_date: dates.operational_start,
                operational_end_date: dates.operational_end,
            });
        }
    }
    Ok(relationships)
}

/// Every address field is independently optional; the first postcode seen
/// also back-fills the owning organisation's postcode
fn map_addresses(node: &Element, organisation: &mut Organisation) -> Vec<Address> {
    let mut addresses = Vec::new();
    if let Some(geo) = node.child("GeoLoc") {
        for location in geo.children("Location") {
            let address = Address {
                organisation_ref: organisation.ref_id,
                org_code: organisation.code.clone(),
                line1: child_text(location, "AddrLn1"),
                line2: child_text(location, "AddrLn2"),
                line3: child_text(location, "AddrLn3"),
                town: child_text(location, "Town"),
                county: child_text(location, "County"),
                post_code: child_text(location, "PostCode"),
                country: child_text(location, "Country"),
                uprn: child_text(location, "UPRN"),
            };
            if organisation.post_code.is_none() {
                organisation.post_code = address.post_code.clone();
            }
            addresses.push(address);
        }
    }
    addresses
}

fn map_successors(
    node: &Element,
    organisation: &Organisation,
    diagnostics: &mut MapDiagnostics,
) -> Vec<Successor> {
    let mut successors = Vec::new();
    if let Some(container) = node.child("Succs") {
        for succ in container.children("Succ") {
            successors.push(Successor {
                organisation_ref: organisation.ref_id,
                org_code: organisation.code.clone(),
                unique_id: succ.attr("uniqueSuccId").map(str::to_string),
                succession_type: child_text(succ, "Type"),
                legal_start_date: parse_optional_date(
                    succ.find("Date/Start").and_then(|start| start.attr("value")),
                    diagnostics,
                ),
                target_code: succ
                    .find("Target/OrgId")
                    .and_then(|id| id.attr("extension"))
                    .map(str::to_string),
                target_primary_role_code: succ
                    .find("Target/PrimaryRoleId")
                    .and_then(|role| role.attr("id"))
                    .map(str::to_string),
                target_unique_role_id: succ
                    .find("Target/PrimaryRoleId")
                    .and_then(|role| role.attr("uniqueRoleId"))
                    .map(str::to_string),
            });
        }
    }
    successors
}

fn map_version(root: &Element) -> Result<Version> {
    let manifest = root
        .child("Manifest")
        .ok_or(MapError::MissingManifestField("Manifest"))?;
    let field = |name: &'static str| -> Result<String> {
        manifest
            .child(name)
            .and_then(|field| field.attr("value"))
            .map(str::to_string)
            .ok_or(MapError::MissingManifestField(name))
    };

    let record_count_raw = field("RecordCount")?;
    let record_count = record_count_raw
        .parse::<i64>()
        .map_err(|_| MapError::InvalidRecordCount(record_count_raw.clone()))?;

    Ok(Version {
        file_version: field("Version")?,
        publication_date: field("PublicationDate")?,
        publication_type: field("PublicationType")?,
        publication_seqno: field("PublicationSeqNum")?,
        publication_source: field("PublicationSource")?,
        file_creation_date: field("FileCreationDateTime")?,
        record_count,
        content_description: field("ContentDescription")?,
        import_timestamp: Utc::now(),
    })
}

#[derive(Debug, Default, Clone, Copy)]
struct DateRanges {
    legal_start: Option<NaiveDate>,
    legal_end: Option<NaiveDate>,
    operational_start: Option<NaiveDate>,
    operational_end: Option<NaiveDate>,
}

/// Scan repeated `Date` sub-elements for the Legal and Operational ranges
fn extract_date_ranges(node: &Element, diagnostics: &mut MapDiagnostics) -> DateRanges {
    let mut ranges = DateRanges::default();
    for date in node.children("Date") {
        let start = parse_optional_date(
            date.child("Start").and_then(|start| start.attr("value")),
            diagnostics,
        );
        let end = parse_optional_date(
            date.child("End").and_then(|end| end.attr("value")),
            diagnostics,
        );
        match date.child("Type").and_then(|kind| kind.attr("value")) {
            Some("Legal") => {
                ranges.legal_start = start;
                ranges.legal_end = end;
            },
            Some("Operational") => {
                ranges.operational_start = start;
                ranges.operational_end = end;
            },
            _ => {},
        }
    }
    ranges
}

/// Parse an optional `YYYY-MM-DD` value; an unparseable value is tolerated,
/// counted, and yields None
fn parse_optional_date(value: Option<&str>, diagnostics: &mut MapDiagnostics) -> Option<NaiveDate> {
    let value = value?;
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            diagnostics.unparseable_dates += 1;
            warn!(value, "Ignoring unparseable date");
            None
        },
    }
}

fn child_text(element: &Element, name: &str) -> Option<String> {
    element.child(name).and_then(Element::text).map(str::to_string)
}

fn missing(element: &str, field: &str) -> MapError {
    MapError::MissingField {
        element: element.to_string(),
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <OrgRefData>
            <Manifest>
                <Version value="1-0-0"/>
                <PublicationDate value="2026-07-31"/>
                <PublicationType value="Full"/>
                <PublicationSeqNum value="128"/>
                <PublicationSource value="national"/>
                <FileCreationDateTime value="2026-07-31T02:00:00"/>
                <RecordCount value="2"/>
                <ContentDescription value="full file"/>
                <PrimaryRoleScope>
                    <PrimaryRole id="RO98" displayName="Commissioning Body"/>
                </PrimaryRoleScope>
            </Manifest>
            <CodeSystems>
                <CodeSystem name="OrganisationRecordClass">
                    <concept id="RC1" displayName="HSC Organisation"/>
                    <concept id="RC2" displayName="HSC Site"/>
                </CodeSystem>
                <CodeSystem name="OrganisationRole">
                    <concept id="RO98" displayName="Commissioning Body"/>
                </CodeSystem>
                <CodeSystem name="OrganisationRelationship">
                    <concept id="RE4" displayName="Is commissioned by"/>
                </CodeSystem>
            </CodeSystems>
            <Organisations>
                <Organisation orgRecordClass="RC1" refOnly="true">
                    <Name>Alpha Trust</Name>
                    <OrgId root="2.16.840.1.113883.2.1.3.2.4.18.48" extension="AAA"/>
                    <Status value="Active"/>
                    <LastChangeDate value="2026-06-01"/>
                    <Date>
                        <Type value="Legal"/>
                        <Start value="2001-04-01"/>
                        <End value="not-a-date"/>
                    </Date>
                    <Date>
                        <Type value="Operational"/>
                        <Start value="2001-05-01"/>
                    </Date>
                    <Roles>
                        <Role id="RO98" uniqueRoleId="R1" primaryRole="true">
                            <Status value="Active"/>
                            <Date>
                                <Type value="Operational"/>
                                <Start value="2001-05-01"/>
                            </Date>
                        </Role>
                        <Role id="RO99">
                            <Status value="Inactive"/>
                        </Role>
                    </Roles>
                    <Rels>
                        <Rel id="RE4" uniqueRelId="X1">
                            <Status value="Active"/>
                            <Target>
                                <OrgId extension="BBB"/>
                            </Target>
                            <Date>
                                <Type value="Legal"/>
                                <Start value="2013-04-01"/>
                            </Date>
                        </Rel>
                    </Rels>
                    <GeoLoc>
                        <Location>
                            <AddrLn1>1 High Street</AddrLn1>
                            <County>Yorkshire</County>
                            <PostCode>LS1 4AP</PostCode>
                            <Country>England</Country>
                            <UPRN>100012345</UPRN>
                        </Location>
                        <Location>
                            <AddrLn1>Annex</AddrLn1>
                            <Town>Leeds</Town>
                            <PostCode>LS2 7EY</PostCode>
                        </Location>
                    </GeoLoc>
                    <Succs>
                        <Succ uniqueSuccId="S1">
                            <Type>Successor</Type>
                            <Date>
                                <Start value="2020-04-01"/>
                            </Date>
                            <Target>
                                <OrgId extension="BBB"/>
                                <PrimaryRoleId id="RO98" uniqueRoleId="R9"/>
                            </Target>
                        </Succ>
                    </Succs>
                </Organisation>
                <Organisation orgRecordClass="RC2">
                    <Name>Beta Site</Name>
                    <OrgId extension="BBB"/>
                    <Status value="Active"/>
                    <LastChangeDate value="2026-05-20"/>
                    <Roles>
                        <Role id="RO98">
                            <Status value="Active"/>
                        </Role>
                    </Roles>
                </Organisation>
            </Organisations>
        </OrgRefData>"#;

    fn mapped() -> MapOutcome {
        let doc = Document::parse(FIXTURE).unwrap();
        map_document(&doc, MapOptions::default()).unwrap()
    }

    #[test]
    fn test_counts_match_the_document() {
        let outcome = mapped();
        let batch = &outcome.batch;

        assert_eq!(batch.organisation_count(), 2);
        assert_eq!(batch.role_count(), 3);
        assert_eq!(batch.relationship_count(), 1);
        assert_eq!(batch.address_count(), 2);
        assert_eq!(batch.successor_count(), 1);
        // four code-system concepts plus one primary-role concept
        assert_eq!(batch.code_system_count(), 5);
    }

    #[test]
    fn test_organisation_fields() {
        let outcome = mapped();
        let org = &outcome.batch.organisations[0].organisation;

        assert_eq!(org.ref_id, 1);
        assert_eq!(org.code, "AAA");
        assert_eq!(org.name, "Alpha Trust");
        assert_eq!(org.status, "Active");
        assert_eq!(org.record_class, "HSC Organisation");
        assert_eq!(org.last_changed, "2026-06-01");
        assert!(org.ref_only);

        let second = &outcome.batch.organisations[1].organisation;
        assert_eq!(second.ref_id, 2);
        assert_eq!(second.record_class, "HSC Site");
        assert!(!second.ref_only);
    }

    #[test]
    fn test_malformed_date_leaves_field_empty_and_record_intact() {
        let outcome = mapped();
        let org = &outcome.batch.organisations[0].organisation;

        assert_eq!(
            org.legal_start_date,
            NaiveDate::from_ymd_opt(2001, 4, 1)
        );
        // "not-a-date" is tolerated: the end date is empty, nothing else is
        assert_eq!(org.legal_end_date, None);
        assert_eq!(
            org.operational_start_date,
            NaiveDate::from_ymd_opt(2001, 5, 1)
        );
        assert_eq!(outcome.diagnostics.unparseable_dates, 1);
        assert!(!outcome.diagnostics.is_clean());
    }

    #[test]
    fn test_roles_carry_owner_and_flags() {
        let outcome = mapped();
        let roles = &outcome.batch.organisations[0].roles;

        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].organisation_ref, 1);
        assert_eq!(roles[0].org_code, "AAA");
        assert_eq!(roles[0].code, "RO98");
        assert!(roles[0].primary_role);
        assert_eq!(roles[0].unique_id.as_deref(), Some("R1"));
        assert_eq!(
            roles[0].operational_start_date,
            NaiveDate::from_ymd_opt(2001, 5, 1)
        );
        assert!(!roles[1].primary_role);
        assert_eq!(roles[1].unique_id, None);
    }

    #[test]
    fn test_relationship_target_and_absent_container() {
        let outcome = mapped();

        let rels = &outcome.batch.organisations[0].relationships;
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].target_code, "BBB");
        assert_eq!(rels[0].unique_id.as_deref(), Some("X1"));
        assert_eq!(
            rels[0].legal_start_date,
            NaiveDate::from_ymd_opt(2013, 4, 1)
        );

        // the second organisation has no Rels container at all
        assert!(outcome.batch.organisations[1].relationships.is_empty());
    }

    #[test]
    fn test_address_fields_are_independently_optional() {
        let outcome = mapped();
        let addresses = &outcome.batch.organisations[0].addresses;

        assert_eq!(addresses[0].line1.as_deref(), Some("1 High Street"));
        assert_eq!(addresses[0].town, None);
        assert_eq!(addresses[0].county.as_deref(), Some("Yorkshire"));
        assert_eq!(addresses[0].post_code.as_deref(), Some("LS1 4AP"));
        assert_eq!(addresses[0].uprn.as_deref(), Some("100012345"));
        assert_eq!(addresses[1].town.as_deref(), Some("Leeds"));
    }

    #[test]
    fn test_first_postcode_backfills_the_organisation() {
        let outcome = mapped();
        let org = &outcome.batch.organisations[0].organisation;
        assert_eq!(org.post_code.as_deref(), Some("LS1 4AP"));

        let second = &outcome.batch.organisations[1].organisation;
        assert_eq!(second.post_code, None);
    }

    #[test]
    fn test_successor_fields() {
        let outcome = mapped();
        let succs = &outcome.batch.organisations[0].successors;

        assert_eq!(succs.len(), 1);
        assert_eq!(succs[0].unique_id.as_deref(), Some("S1"));
        assert_eq!(succs[0].succession_type.as_deref(), Some("Successor"));
        assert_eq!(
            succs[0].legal_start_date,
            NaiveDate::from_ymd_opt(2020, 4, 1)
        );
        assert_eq!(succs[0].target_code.as_deref(), Some("BBB"));
        assert_eq!(succs[0].target_primary_role_code.as_deref(), Some("RO98"));
        assert_eq!(succs[0].target_unique_role_id.as_deref(), Some("R9"));
    }

    #[test]
    fn test_version_and_setting() {
        let outcome = mapped();
        let version = &outcome.batch.version;

        assert_eq!(version.file_version, "1-0-0");
        assert_eq!(version.publication_seqno, "128");
        assert_eq!(version.record_count, 2);
        assert_eq!(version.content_description, "full file");

        assert_eq!(outcome.batch.setting.key, "schema_version");
        assert_eq!(outcome.batch.setting.value, SCHEMA_VERSION);
    }

    #[test]
    fn test_record_class_values_come_from_the_code_index() {
        let outcome = mapped();
        let display_names: Vec<&str> = outcome
            .batch
            .code_systems
            .iter()
            .map(|cs| cs.display_name.as_str())
            .collect();

        for org in &outcome.batch.organisations {
            assert!(display_names.contains(&org.organisation.record_class.as_str()));
        }
    }

    #[test]
    fn test_unknown_record_class_is_fatal() {
        let broken = FIXTURE.replace(r#"orgRecordClass="RC2""#, r#"orgRecordClass="RC9""#);
        let doc = Document::parse(&broken).unwrap();

        let err = map_document(&doc, MapOptions::default()).unwrap_err();
        match err {
            MapError::UnknownRecordClass { org_code, id } => {
                assert_eq!(org_code, "BBB");
                assert_eq!(id, "RC9");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_organisation_limit_is_exact() {
        let doc = Document::parse(FIXTURE).unwrap();

        let outcome = map_document(
            &doc,
            MapOptions {
                organisation_limit: Some(1),
            },
        )
        .unwrap();
        assert_eq!(outcome.batch.organisation_count(), 1);
        assert_eq!(outcome.batch.organisations[0].organisation.code, "AAA");

        // a limit at or above the document size changes nothing
        let outcome = map_document(
            &doc,
            MapOptions {
                organisation_limit: Some(2),
            },
        )
        .unwrap();
        assert_eq!(outcome.batch.organisation_count(), 2);
    }

    #[test]
    fn test_missing_manifest_field_is_fatal() {
        let broken = FIXTURE.replace(r#"<RecordCount value="2"/>"#, "");
        let doc = Document::parse(&broken).unwrap();

        let err = map_document(&doc, MapOptions::default()).unwrap_err();
        assert!(matches!(err, MapError::MissingManifestField("RecordCount")));
    }
}
