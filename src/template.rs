// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Path template rendering
//!
//! A template is a `/`-separated path whose segments may contain `{name}`
//! placeholders. Rendering substitutes sanitized attribute values, elides or
//! fills unknown values, guarantees the file name appears once, and returns a
//! normalized relative path using `/` separators. Rendering never fails.

use crate::attributes::{Attributes, MediaRecord, UNKNOWN};
use crate::config::{ExcludeUnknownConfig, TemplateConfig};

/// Characters that are never allowed inside a rendered value.
/// Braces are included so substituted text can never read as a placeholder.
const FORBIDDEN: [char; 11] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*', '{', '}'];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Token(String),
}

/// Split one template segment into literals and `{name}` tokens.
///
/// Unmatched braces and empty `{}` pairs are dropped.
fn tokenize(segment: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = segment.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' => {
                let rest = &segment[i + 1..];
                let close = rest.find('}');
                let reopen = rest.find('{');
                match close {
                    Some(end) if reopen.map_or(true, |r| r > end) => {
                        let name = rest[..end].trim();
                        if !literal.is_empty() {
                            pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                        }
                        if !name.is_empty() {
                            pieces.push(Piece::Token(name.to_lowercase()));
                        }
                        // Skip past the closing brace
                        while let Some((j, _)) = chars.peek() {
                            if *j > i + end + 1 {
                                break;
                            }
                            chars.next();
                        }
                    }
                    _ => {}
                }
            }
            '}' => {}
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

/// Replace characters that are unsafe in file names with `_`
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect()
}

/// Placeholder names used by a template, lowercased, in order of appearance
pub fn placeholders(template: &str) -> Vec<String> {
    template
        .split(['/', '\\'])
        .flat_map(tokenize)
        .filter_map(|piece| match piece {
            Piece::Token(name) => Some(name),
            Piece::Literal(_) => None,
        })
        .collect()
}

/// Render `template` against `attributes` into a relative path.
///
/// With `exclude_unknown` set, placeholders whose value is missing, blank or
/// `Unknown` are elided and segments left without content are removed;
/// otherwise they render as `Unknown`. If elision leaves nothing the path
/// falls back to `<file_type>/<filename_with_extension>`; a template that is
/// empty on its own renders as the bare file name.
pub fn render(template: &str, attributes: &Attributes, exclude_unknown: bool) -> String {
    let names = placeholders(template);
    let has_filename = names
        .iter()
        .any(|n| n == "filename" || n == "filename_with_extension");
    let has_extension = names.iter().any(|n| n == "extension");

    let extension = attributes
        .get("extension")
        .map(ToString::to_string)
        .unwrap_or_default();
    let full_name = full_filename(attributes);

    let mut segments: Vec<String> = Vec::new();
    let mut any_elided = false;
    for raw in template.split(['/', '\\']) {
        let mut rendered = String::new();
        let mut elided = false;

        for piece in tokenize(raw) {
            match piece {
                Piece::Literal(text) => rendered.push_str(&text),
                Piece::Token(name) => {
                    let value = attributes.get(&name).filter(|v| !v.is_unknown());
                    match value {
                        Some(value) => {
                            let mut text = value.to_string();
                            if name == "filename" && !has_extension && !extension.is_empty() {
                                text = format!("{}.{}", text, extension);
                            }
                            rendered.push_str(&sanitize(text.trim()));
                        }
                        None if exclude_unknown => elided = true,
                        None => rendered.push_str(UNKNOWN),
                    }
                }
            }
        }

        if exclude_unknown {
            any_elided |= elided;
            if elided {
                rendered = rendered
                    .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | ',' | ';' | '.'))
                    .to_string();
                if !rendered.chars().any(char::is_alphanumeric) {
                    continue;
                }
            }
            if rendered.trim() == UNKNOWN {
                any_elided = true;
                continue;
            }
        }
        segments.push(rendered);
    }

    let mut segments = normalize(segments);

    if segments.is_empty() {
        if !any_elided {
            return normalize(vec![sanitize(&full_name)]).join("/");
        }
        let file_type = attributes.text("file_type");
        return normalize(vec![sanitize(&file_type), sanitize(&full_name)]).join("/");
    }

    if !has_filename {
        segments.push(sanitize(&full_name));
        segments = normalize(segments);
    }

    segments.join("/")
}

/// Destination for a record using its category's template and exclusion flag
pub fn render_record(
    record: &MediaRecord,
    templates: &TemplateConfig,
    exclude_unknown: &ExcludeUnknownConfig,
) -> String {
    render(
        templates.get(record.category),
        &record.attributes,
        exclude_unknown.get(record.category),
    )
}

fn full_filename(attributes: &Attributes) -> String {
    match attributes.get("filename_with_extension") {
        Some(name) if !name.is_unknown() => name.to_string(),
        _ => {
            let stem = attributes.text("filename");
            match attributes.get("extension") {
                Some(ext) if !ext.is_unknown() => format!("{}.{}", stem, ext),
                _ => stem,
            }
        }
    }
}

/// Trim trailing dots and spaces, drop empty, `.` and `..` segments
fn normalize(segments: Vec<String>) -> Vec<String> {
    segments
        .into_iter()
        .map(|s| s.trim_start().trim_end_matches(['.', ' ']).to_string())
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .collect()
}
