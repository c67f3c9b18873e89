// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! PDF document info dictionary

use lopdf::{Dictionary, Document, Object};
use std::path::Path;
use tracing::debug;

use crate::attributes::{extract_year, Attributes};
use crate::{MediaShelfError, Result};

pub(super) fn read_metadata(path: &Path) -> Result<Attributes> {
    let doc = Document::load(path)
        .map_err(|e| MediaShelfError::extraction(format!("Failed to load PDF: {}", e)))?;

    let mut attrs = Attributes::new();
    let Some(info) = info_dictionary(&doc) else {
        debug!("PDF has no Info dictionary: {:?}", path);
        return Ok(attrs);
    };

    if let Some(title) = text_entry(info, b"Title") {
        attrs.set_text("title", &title);
    }
    if let Some(author) = text_entry(info, b"Author") {
        attrs.set_text("author", &author);
    }
    if let Some(producer) = text_entry(info, b"Producer") {
        attrs.set_text("publisher", &producer);
    }
    if let Some(subject) = text_entry(info, b"Subject") {
        attrs.set_text("genre", &subject);
    }
    if let Some(year) = text_entry(info, b"CreationDate").and_then(|d| creation_year(&d)) {
        attrs.set("year", year);
    }

    Ok(attrs)
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    match info.as_reference() {
        Ok(id) => doc.get_dictionary(id).ok(),
        Err(_) => info.as_dict().ok(),
    }
}

fn text_entry(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// PDF text strings are UTF-16BE with a BOM or single-byte otherwise
fn decode_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// `D:20030415...` gives `2003`
fn creation_year(date: &str) -> Option<String> {
    let rest = date.trim().strip_prefix("D:").unwrap_or(date.trim());
    extract_year(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use tempfile::tempdir;

    fn write_pdf(path: &Path, info: Dictionary) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(info);
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_info_dictionary_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        write_pdf(
            &path,
            dictionary! {
                "Title" => Object::string_literal("On Computable Numbers"),
                "Author" => Object::string_literal("A. M. Turing"),
                "Producer" => Object::string_literal("LMS Press"),
                "Subject" => Object::string_literal("Mathematics"),
                "CreationDate" => Object::string_literal("D:19361112090000Z"),
            },
        );

        let attrs = read_metadata(&path).unwrap();
        assert_eq!(attrs.text("title"), "On Computable Numbers");
        assert_eq!(attrs.text("author"), "A. M. Turing");
        assert_eq!(attrs.text("publisher"), "LMS Press");
        assert_eq!(attrs.text("genre"), "Mathematics");
        assert_eq!(attrs.text("year"), "1936");
    }

    #[test]
    fn test_decode_utf16_text() {
        let bytes = [0xFE, 0xFF, 0x00, 0x43, 0x00, 0x61, 0x00, 0x66, 0x00, 0xE9];
        assert_eq!(decode_text(&bytes), "Café");
        assert_eq!(decode_text(b"Plain"), "Plain");
    }

    #[test]
    fn test_creation_year() {
        assert_eq!(creation_year("D:20030415").as_deref(), Some("2003"));
        assert_eq!(creation_year("garbage"), None);
    }

    #[test]
    fn test_not_a_pdf() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"%PDF nope").unwrap();
        assert!(read_metadata(&path).is_err());
    }
}
