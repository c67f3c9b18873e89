// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! FictionBook 2 description block

use std::path::Path;

use super::{clean_isbn, element_path, walk_xml};
use crate::attributes::{extract_year, Attributes};
use crate::Result;

pub(super) fn read_metadata(path: &Path) -> Result<Attributes> {
    let bytes = std::fs::read(path)?;
    parse_fb2(&String::from_utf8_lossy(&bytes))
}

#[derive(Default)]
struct AuthorName {
    first: Option<String>,
    middle: Option<String>,
    last: Option<String>,
}

impl AuthorName {
    fn full(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.first, &self.middle, &self.last]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

fn parse_fb2(xml: &str) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    let mut author = AuthorName::default();
    let mut authors_seen = 0usize;
    let mut publish_year = None;

    walk_xml(xml, |stack, text| {
        let path = element_path(stack);
        let Some(section) = path.iter().position(|name| *name == "title-info" || *name == "publish-info")
        else {
            return;
        };
        let in_title_info = path[section] == "title-info";
        let tail = &path[section + 1..];

        let Some(text) = text else {
            if in_title_info && tail == ["author"] {
                authors_seen += 1;
            }
            if in_title_info && tail == ["date"] {
                if let Some(year) = stack.last().and_then(|e| e.attr("value")).and_then(extract_year) {
                    attrs.fill("year", year);
                }
            }
            return;
        };

        if in_title_info {
            match tail {
                ["book-title"] => attrs.fill("title", text),
                ["genre"] => attrs.fill("genre", text),
                ["lang"] => attrs.fill("language", text),
                ["date"] => {
                    if let Some(year) = extract_year(text) {
                        attrs.fill("year", year);
                    }
                }
                ["author", part] if authors_seen == 1 => {
                    let slot = match *part {
                        "first-name" => &mut author.first,
                        "middle-name" => &mut author.middle,
                        "last-name" => &mut author.last,
                        _ => return,
                    };
                    slot.get_or_insert_with(|| text.to_string());
                }
                _ => {}
            }
        } else {
            match tail {
                ["publisher"] => attrs.fill("publisher", text),
                ["isbn"] => attrs.fill("isbn", clean_isbn(text)),
                ["year"] => publish_year = extract_year(text),
                _ => {}
            }
        }
    })?;

    if let Some(name) = author.full() {
        attrs.fill("author", name);
    }
    if let Some(year) = publish_year {
        attrs.fill("year", year);
    }

    Ok(attrs)
}
