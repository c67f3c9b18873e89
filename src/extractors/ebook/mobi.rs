// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! MOBI, AZW and AZW3 headers: PalmDB, the MOBI header and EXTH records

use std::path::Path;

use super::clean_isbn;
use crate::attributes::{extract_year, Attributes};
use crate::{MediaShelfError, Result};

const PALMDB_HEADER_LEN: usize = 78;
const UTF8_ENCODING: u32 = 65001;
const EXTH_FLAG: u32 = 0x40;

const EXTH_AUTHOR: u32 = 100;
const EXTH_PUBLISHER: u32 = 101;
const EXTH_ISBN: u32 = 104;
const EXTH_SUBJECT: u32 = 105;
const EXTH_PUBLISHED: u32 = 106;
const EXTH_UPDATED_TITLE: u32 = 503;
const EXTH_LANGUAGE: u32 = 524;

pub(super) fn read_metadata(path: &Path) -> Result<Attributes> {
    let data = std::fs::read(path)?;
    parse_mobi(&data)
}

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn truncated() -> MediaShelfError {
    MediaShelfError::extraction("MOBI header is truncated")
}

fn decode(bytes: &[u8], encoding: u32) -> String {
    let bytes = match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    };
    if encoding == UTF8_ENCODING {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        // CP1252 text; the Latin-1 range covers the common cases
        bytes.iter().map(|&b| char::from(b)).collect()
    }
}

fn parse_mobi(data: &[u8]) -> Result<Attributes> {
    if data.len() < PALMDB_HEADER_LEN + 8 {
        return Err(truncated());
    }

    let kind = &data[60..68];
    if kind != b"BOOKMOBI" && kind != b"TEXtREAd" {
        return Err(MediaShelfError::extraction(format!(
            "Unsupported PalmDB type {:?}",
            String::from_utf8_lossy(kind)
        )));
    }

    let mut attrs = Attributes::new();
    let palm_name = decode(&data[..32], 1252).replace('_', " ");

    let record_count = be_u16(data, 76).ok_or_else(truncated)?;
    if record_count == 0 {
        attrs.set_text("title", &palm_name);
        return Ok(attrs);
    }
    let record0 = be_u32(data, PALMDB_HEADER_LEN).ok_or_else(truncated)? as usize;

    // PalmDOC header is 16 bytes, the MOBI header follows
    let mobi = record0 + 16;
    if data.get(mobi..mobi + 4) != Some(b"MOBI".as_slice()) {
        attrs.set_text("title", &palm_name);
        return Ok(attrs);
    }

    let header_len = be_u32(data, mobi + 4).ok_or_else(truncated)? as usize;
    let encoding = be_u32(data, mobi + 12).unwrap_or(1252);

    let full_name = match (be_u32(data, record0 + 84), be_u32(data, record0 + 88)) {
        (Some(offset), Some(len)) if len > 0 => {
            let start = record0 + offset as usize;
            data.get(start..start + len as usize)
                .map(|bytes| decode(bytes, encoding))
        }
        _ => None,
    };

    let mut updated_title = None;
    let exth_flags = be_u32(data, mobi + 112).unwrap_or(0);
    if exth_flags & EXTH_FLAG != 0 {
        let exth = mobi + header_len;
        if data.get(exth..exth + 4) == Some(b"EXTH".as_slice()) {
            let count = be_u32(data, exth + 8).ok_or_else(truncated)?;
            let mut cursor = exth + 12;
            for _ in 0..count {
                let (Some(kind), Some(len)) = (be_u32(data, cursor), be_u32(data, cursor + 4)) else {
                    break;
                };
                let len = len as usize;
                if len < 8 {
                    break;
                }
                let Some(payload) = data.get(cursor + 8..cursor + len) else {
                    break;
                };
                let value = decode(payload, encoding);
                let value = value.trim();
                match kind {
                    EXTH_AUTHOR => attrs.fill("author", value),
                    EXTH_PUBLISHER => attrs.fill("publisher", value),
                    EXTH_ISBN => attrs.fill("isbn", clean_isbn(value)),
                    EXTH_SUBJECT => attrs.fill("genre", value),
                    EXTH_PUBLISHED => {
                        if let Some(year) = extract_year(value) {
                            attrs.fill("year", year);
                        }
                    }
                    EXTH_UPDATED_TITLE => {
                        if !value.is_empty() {
                            updated_title = Some(value.to_string());
                        }
                    }
                    EXTH_LANGUAGE => attrs.fill("language", value),
                    _ => {}
                }
                cursor += len;
            }
        }
    }

    let title = updated_title
        .or(full_name.filter(|n| !n.trim().is_empty()))
        .unwrap_or(palm_name);
    attrs.set_text("title", &title);

    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exth_record(kind: u32, value: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&kind.to_be_bytes());
        out.extend_from_slice(&((value.len() + 8) as u32).to_be_bytes());
        out.extend_from_slice(value.as_bytes());
        out
    }

    /// Minimal single-record BOOKMOBI file
    fn build_mobi(full_name: &str, exth: &[(u32, &str)]) -> Vec<u8> {
        let mut data = vec![0u8; PALMDB_HEADER_LEN + 8];
        data[..12].copy_from_slice(b"palm_db_name");
        data[60..68].copy_from_slice(b"BOOKMOBI");
        data[76..78].copy_from_slice(&1u16.to_be_bytes());
        let record0 = data.len() as u32;
        data[78..82].copy_from_slice(&record0.to_be_bytes());

        let mobi_header_len = 232u32;
        let mut record = vec![0u8; 16 + mobi_header_len as usize];
        record[16..20].copy_from_slice(b"MOBI");
        record[20..24].copy_from_slice(&mobi_header_len.to_be_bytes());
        record[28..32].copy_from_slice(&UTF8_ENCODING.to_be_bytes());
        record[128..132].copy_from_slice(&EXTH_FLAG.to_be_bytes());

        let records: Vec<u8> = exth.iter().flat_map(|(k, v)| exth_record(*k, v)).collect();
        let mut exth_block = Vec::new();
        exth_block.extend_from_slice(b"EXTH");
        exth_block.extend_from_slice(&((12 + records.len()) as u32).to_be_bytes());
        exth_block.extend_from_slice(&(exth.len() as u32).to_be_bytes());
        exth_block.extend_from_slice(&records);
        record.extend_from_slice(&exth_block);

        let name_offset = record.len() as u32;
        record[84..88].copy_from_slice(&name_offset.to_be_bytes());
        record[88..92].copy_from_slice(&(full_name.len() as u32).to_be_bytes());
        record.extend_from_slice(full_name.as_bytes());
        record.extend_from_slice(&[0, 0]);

        data.extend_from_slice(&record);
        data
    }

    #[test]
    fn test_exth_fields() {
        let data = build_mobi(
            "Dune",
            &[
                (EXTH_AUTHOR, "Frank Herbert"),
                (EXTH_PUBLISHER, "Chilton Books"),
                (EXTH_ISBN, "9780441013593"),
                (EXTH_SUBJECT, "Science Fiction"),
                (EXTH_PUBLISHED, "1965-08-01T00:00:00+00:00"),
                (EXTH_LANGUAGE, "en"),
            ],
        );

        let attrs = parse_mobi(&data).unwrap();
        assert_eq!(attrs.text("title"), "Dune");
        assert_eq!(attrs.text("author"), "Frank Herbert");
        assert_eq!(attrs.text("publisher"), "Chilton Books");
        assert_eq!(attrs.text("isbn"), "9780441013593");
        assert_eq!(attrs.text("genre"), "Science Fiction");
        assert_eq!(attrs.text("year"), "1965");
        assert_eq!(attrs.text("language"), "en");
    }

    #[test]
    fn test_updated_title_wins() {
        let data = build_mobi("Dune", &[(EXTH_UPDATED_TITLE, "Dune (40th Anniversary)")]);
        let attrs = parse_mobi(&data).unwrap();
        assert_eq!(attrs.text("title"), "Dune (40th Anniversary)");
    }

    #[test]
    fn test_rejects_other_palm_databases() {
        let mut data = vec![0u8; 200];
        data[60..68].copy_from_slice(b"DATAxxxx");
        assert!(parse_mobi(&data).is_err());
        assert!(parse_mobi(b"short").is_err());
    }
}
