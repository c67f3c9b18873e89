// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image dimensions, pixel mode and EXIF capture data

use async_trait::async_trait;
use exif::{In, Tag};
use image::{ColorType, ImageDecoder, ImageReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

use super::MetadataExtractor;
use crate::attributes::Attributes;
use crate::category::Category;
use crate::{MediaShelfError, Result};

const IMAGE_KEYS: [&str; 4] = ["width", "height", "format", "mode"];

const EXIF_TAGS: [(Tag, &str); 5] = [
    (Tag::Make, "camera_make"),
    (Tag::Model, "camera_model"),
    (Tag::DateTime, "date_time"),
    (Tag::DateTimeOriginal, "date_taken"),
    (Tag::Copyright, "copyright"),
];

/// Extractor for image files
pub struct ImageExtractor;

impl ImageExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Dimensions, format and mode from the image header
    fn read_header(path: &Path) -> Result<Attributes> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format();
        let decoder = reader.into_decoder().map_err(MediaShelfError::extraction)?;
        let (width, height) = decoder.dimensions();

        let mut attrs = Attributes::new();
        attrs.set("width", width);
        attrs.set("height", height);
        if let Some(format) = format {
            attrs.set("format", format!("{:?}", format).to_uppercase());
        }
        attrs.set("mode", color_mode(decoder.color_type()));
        Ok(attrs)
    }

    /// EXIF fields present in the primary image
    fn read_exif(path: &Path) -> Attributes {
        let mut attrs = Attributes::new();
        let exif = File::open(path).map_err(exif::Error::Io).and_then(|file| {
            let mut reader = BufReader::new(file);
            exif::Reader::new().read_from_container(&mut reader)
        });

        match exif {
            Ok(exif) => {
                for (tag, key) in EXIF_TAGS {
                    if let Some(field) = exif.get_field(tag, In::PRIMARY) {
                        let value = field.display_value().to_string().replace(['\\', '"'], "");
                        attrs.set_text(key, &value);
                    }
                }
            }
            Err(e) => debug!("No EXIF data in {:?}: {}", path, e),
        }

        attrs
    }
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Pixel mode name in the usual short form
fn color_mode(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::L16 => "L",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "Unknown",
    }
}

#[async_trait]
impl MetadataExtractor for ImageExtractor {
    fn category(&self) -> Category {
        Category::Image
    }

    async fn extract(&self, path: &Path) -> Result<Attributes> {
        info!("Extracting image metadata: {:?}", path);

        let mut attrs = Self::read_header(path)?;
        attrs.extend(Self::read_exif(path));
        attrs.default_unknown(&IMAGE_KEYS);
        let exif_keys: Vec<&str> = EXIF_TAGS.iter().map(|(_, key)| *key).collect();
        attrs.default_unknown(&exif_keys);
        Ok(attrs)
    }
}
