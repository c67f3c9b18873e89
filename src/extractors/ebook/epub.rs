// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! EPUB package metadata (Dublin Core inside the OPF file)

use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use super::{clean_isbn, element_path, looks_like_isbn, walk_xml};
use crate::attributes::{extract_year, Attributes};
use crate::{MediaShelfError, Result};

const CONTAINER_PATH: &str = "META-INF/container.xml";

pub(super) fn read_metadata(path: &Path) -> Result<Attributes> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| MediaShelfError::extraction(format!("Not an EPUB archive: {}", e)))?;

    let opf_path = match read_entry(&mut archive, CONTAINER_PATH)
        .ok()
        .and_then(|xml| rootfile_path(&xml))
    {
        Some(found) => found,
        None => {
            debug!("No usable container.xml in {:?}, searching for an OPF file", path);
            archive
                .file_names()
                .find(|name| name.to_lowercase().ends_with(".opf"))
                .map(str::to_string)
                .ok_or_else(|| MediaShelfError::extraction("EPUB has no OPF package file"))?
        }
    };

    let opf = read_entry(&mut archive, &opf_path)?;
    parse_opf(&opf)
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| MediaShelfError::extraction(format!("{}: {}", name, e)))?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `full-path` of the first `<rootfile>` in container.xml
fn rootfile_path(container_xml: &str) -> Option<String> {
    let mut found = None;
    walk_xml(container_xml, |stack, text| {
        if found.is_some() || text.is_some() {
            return;
        }
        if let Some(element) = stack.last() {
            if element.name == "rootfile" {
                found = element.attr("full-path").map(str::to_string);
            }
        }
    })
    .ok()?;
    found
}

/// Dublin Core fields from an OPF package document
fn parse_opf(opf: &str) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    let mut identifiers: Vec<(String, String)> = Vec::new();

    walk_xml(opf, |stack, text| {
        let Some(text) = text else { return };
        let path = element_path(stack);
        if !path.contains(&"metadata") {
            return;
        }
        let Some(element) = stack.last() else { return };

        match element.name.as_str() {
            "title" => attrs.fill("title", text),
            "creator" => attrs.fill("author", text),
            "publisher" => attrs.fill("publisher", text),
            "language" => attrs.fill("language", text),
            "subject" => attrs.fill("genre", text),
            "date" => {
                if let Some(year) = extract_year(text) {
                    attrs.fill("year", year);
                }
            }
            "identifier" => {
                let scheme = element.attr("scheme").unwrap_or_default().to_string();
                identifiers.push((scheme, text.to_string()));
            }
            _ => {}
        }
    })?;

    let isbn = identifiers.iter().find(|(scheme, value)| {
        scheme.to_lowercase().contains("isbn")
            || value.to_lowercase().contains("isbn")
            || looks_like_isbn(value)
    });
    if let Some((_, value)) = isbn {
        attrs.set_text("isbn", &clean_isbn(value));
    }

    Ok(attrs)
}
