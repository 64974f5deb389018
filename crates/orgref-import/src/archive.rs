//! Zip archive extraction
//!
//! The data archive must contain exactly one file entry (the XML document);
//! the schema archive is addressed by a fixed, well-known entry name.

use orgref_common::{OrgRefError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Extract the single file entry of a zip archive.
///
/// Returns the entry name and its contents. Zero file entries, or more than
/// one, is an error: the data archive is published with exactly one document
/// and anything else is ambiguous.
pub fn extract_single_entry(path: &Path) -> Result<(String, Vec<u8>)> {
    let mut archive = open(path)?;

    let mut file_indices = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| archive_error(path, &e.to_string()))?;
        if entry.is_file() {
            file_indices.push(index);
        }
    }

    let index = match file_indices.as_slice() {
        [] => return Err(archive_error(path, "archive contains no file entries")),
        [index] => *index,
        more => {
            return Err(archive_error(
                path,
                &format!("expected a single file entry, found {}", more.len()),
            ))
        },
    };

    let mut entry = archive
        .by_index(index)
        .map_err(|e| archive_error(path, &e.to_string()))?;
    let name = entry.name().to_string();
    let mut contents = Vec::new();
    entry.read_to_end(&mut contents)?;

    debug!(entry = %name, bytes = contents.len(), "Extracted archive entry");
    Ok((name, contents))
}

/// Extract a named entry from a zip archive
pub fn extract_named_entry(path: &Path, name: &str) -> Result<Vec<u8>> {
    let mut archive = open(path)?;
    let mut entry = archive
        .by_name(name)
        .map_err(|e| archive_error(path, &format!("entry {:?}: {}", name, e)))?;

    let mut contents = Vec::new();
    entry.read_to_end(&mut contents)?;

    debug!(entry = name, bytes = contents.len(), "Extracted archive entry");
    Ok(contents)
}

fn open(path: &Path) -> Result<zip::ZipArchive<File>> {
    let file = File::open(path)?;
    zip::ZipArchive::new(file).map_err(|e| archive_error(path, &e.to_string()))
}

fn archive_error(path: &Path, message: &str) -> OrgRefError {
    OrgRefError::Archive(format!("{}: {}", path.display(), message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extracts_the_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.zip");
        write_zip(&path, &[("dataset.xml", b"<Root/>")]);

        let (name, contents) = extract_single_entry(&path).unwrap();
        assert_eq!(name, "dataset.xml");
        assert_eq!(contents, b"<Root/>");
    }

    #[test]
    fn test_empty_archive_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.zip");
        write_zip(&path, &[]);

        let err = extract_single_entry(&path).unwrap_err();
        assert!(err.to_string().contains("no file entries"));
    }

    #[test]
    fn test_ambiguous_archive_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.zip");
        write_zip(&path, &[("a.xml", b"<a/>"), ("b.xml", b"<b/>")]);

        let err = extract_single_entry(&path).unwrap_err();
        assert!(err.to_string().contains("single file entry"));
    }

    #[test]
    fn test_named_entry_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.zip");
        write_zip(&path, &[("readme.txt", b"notes"), ("schema.xsd", b"<xs/>")]);

        let contents = extract_named_entry(&path, "schema.xsd").unwrap();
        assert_eq!(contents, b"<xs/>");

        let err = extract_named_entry(&path, "missing.xsd").unwrap_err();
        assert!(err.to_string().contains("missing.xsd"));
    }
}
