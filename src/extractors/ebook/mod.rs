// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ebook metadata for PDF, EPUB, MOBI/AZW and FB2
//!
//! Every sub-format converges on the same attribute names: `title`,
//! `author`, `year`, `genre`, `publisher`, `isbn` and `language`.

mod epub;
mod fb2;
mod mobi;
mod pdf;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;
use tracing::{info, warn};

use super::MetadataExtractor;
use crate::attributes::{file_stem, Attributes};
use crate::category::{path_extension, Category};
use crate::{MediaShelfError, Result};

const EBOOK_KEYS: [&str; 6] = ["author", "year", "genre", "publisher", "isbn", "language"];

/// Extractor for ebook files
pub struct EbookExtractor;

impl EbookExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EbookExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataExtractor for EbookExtractor {
    fn category(&self) -> Category {
        Category::Ebook
    }

    async fn extract(&self, path: &Path) -> Result<Attributes> {
        info!("Extracting ebook metadata: {:?}", path);

        let parsed = match path_extension(path).as_deref() {
            Some(".pdf") => pdf::read_metadata(path),
            Some(".epub") => epub::read_metadata(path),
            Some(".mobi") | Some(".azw") | Some(".azw3") => mobi::read_metadata(path),
            Some(".fb2") => fb2::read_metadata(path),
            _ => Ok(Attributes::new()),
        };

        // Format errors only cost the format-specific fields
        let mut attrs = parsed.unwrap_or_else(|e| {
            warn!("Error extracting ebook metadata from {:?}: {}", path, e);
            Attributes::new()
        });

        attrs.fill("title", file_stem(path));
        attrs.default_unknown(&EBOOK_KEYS);
        Ok(attrs)
    }
}

/// True for identifiers that look like an ISBN-10 or ISBN-13
pub(crate) fn looks_like_isbn(value: &str) -> bool {
    let chars: Vec<char> = value
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .collect();
    match chars.len() {
        13 => chars.iter().all(char::is_ascii_digit),
        10 => {
            chars[..9].iter().all(char::is_ascii_digit)
                && (chars[9].is_ascii_digit() || chars[9] == 'X' || chars[9] == 'x')
        }
        _ => false,
    }
}

/// Drop a `urn:isbn:` or `isbn:` prefix
pub(crate) fn clean_isbn(value: &str) -> String {
    let trimmed = value.trim();
    let lower = trimmed.to_lowercase();
    for prefix in ["urn:isbn:", "isbn:", "isbn"] {
        if lower.starts_with(prefix) {
            if let Some(rest) = trimmed.get(prefix.len()..) {
                return rest.trim().to_string();
            }
        }
    }
    trimmed.to_string()
}

/// An open XML element with its attributes, names stripped of prefixes
#[derive(Debug)]
pub(crate) struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Walk an XML document.
///
/// `visit` is called once for each element as it opens (with `None`) and for
/// every non-blank text node (with `Some(text)`); the slice is the path of
/// open elements, innermost last.
pub(crate) fn walk_xml<F>(xml: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&[XmlElement], Option<&str>),
{
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut stack: Vec<XmlElement> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(open_element(&e));
                visit(&stack, None);
            }
            Ok(Event::Empty(e)) => {
                stack.push(open_element(&e));
                visit(&stack, None);
                stack.pop();
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                if !text.trim().is_empty() {
                    visit(&stack, Some(text.trim()));
                }
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                if !text.trim().is_empty() {
                    visit(&stack, Some(text.trim()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(MediaShelfError::extraction(format!(
                    "XML error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    Ok(())
}

fn open_element(e: &quick_xml::events::BytesStart<'_>) -> XmlElement {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let attrs = e
        .attributes()
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
            let value = a
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
            (key, value)
        })
        .collect();
    XmlElement { name, attrs }
}

/// Local names of the open elements, e.g. `["package", "metadata", "title"]`
pub(crate) fn element_path(stack: &[XmlElement]) -> Vec<&str> {
    stack.iter().map(|e| e.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_isbn_detection() {
        assert!(looks_like_isbn("978-0-13-110362-7"));
        assert!(looks_like_isbn("0131103628"));
        assert!(looks_like_isbn("080442957X"));
        assert!(!looks_like_isbn("urn:uuid:1234"));
        assert!(!looks_like_isbn("12345"));
    }

    #[test]
    fn test_clean_isbn() {
        assert_eq!(clean_isbn("urn:isbn:9780131103627"), "9780131103627");
        assert_eq!(clean_isbn("ISBN 0131103628"), "0131103628");
        assert_eq!(clean_isbn(" 9780131103627 "), "9780131103627");
    }

    #[test]
    fn test_walk_xml_paths_and_attributes() {
        let xml = r#"<a><b kind="x">one &amp; two</b><c ref="y"/></a>"#;
        let mut seen = Vec::new();
        walk_xml(xml, |stack, text| {
            let path = element_path(stack).join("/");
            match text {
                Some(t) => seen.push(format!("{path}={t}")),
                None => seen.push(format!(
                    "{path}[{}]",
                    stack.last().and_then(|e| e.attrs.first()).map(|(k, v)| format!("{k}:{v}")).unwrap_or_default()
                )),
            }
        })
        .unwrap();

        assert_eq!(seen, vec!["a[]", "a/b[kind:x]", "a/b=one & two", "a/c[ref:y]"]);
    }

    #[tokio::test]
    async fn test_unparseable_ebook_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Field Notes.epub");
        fs::write(&path, b"this is not a zip archive").unwrap();

        let attrs = EbookExtractor::new().extract(&path).await.unwrap();
        assert_eq!(attrs.text("title"), "Field Notes");
        for key in EBOOK_KEYS {
            assert_eq!(attrs.text(key), "Unknown", "{key}");
        }
    }
}
