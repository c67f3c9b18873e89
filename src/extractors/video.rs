// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Video metadata via FFprobe, with a container probe fallback

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use super::audio::probe_container;
use super::MetadataExtractor;
use crate::attributes::{extract_year, file_stem, format_duration, Attributes};
use crate::category::Category;
use crate::{MediaShelfError, Result};

const VIDEO_KEYS: [&str; 6] = ["album", "artist", "director", "year", "genre", "duration"];

/// Extractor for video files
pub struct VideoExtractor {
    ffprobe: OnceLock<bool>,
}

impl VideoExtractor {
    pub fn new() -> Self {
        Self {
            ffprobe: OnceLock::new(),
        }
    }

    /// Extractor that never shells out to FFprobe
    pub fn without_ffprobe() -> Self {
        let ffprobe = OnceLock::new();
        let _ = ffprobe.set(false);
        Self { ffprobe }
    }

    /// Check once whether FFprobe is on the PATH
    fn ffprobe_available(&self) -> bool {
        *self.ffprobe.get_or_init(|| {
            let available = Command::new("ffprobe")
                .arg("-version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false);
            if !available {
                warn!("ffprobe not available. Video metadata extraction will be limited.");
            }
            available
        })
    }

    fn run_ffprobe(path: &Path) -> Result<serde_json::Value> {
        let output = Command::new("ffprobe")
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()?;

        if !output.status.success() {
            return Err(MediaShelfError::extraction(format!(
                "ffprobe exited with {} for {}",
                output.status,
                path.display()
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Limited metadata when FFprobe is missing
    fn fallback_metadata(path: &Path) -> Attributes {
        let mut attrs = Attributes::new();

        if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
            let date: DateTime<Local> = modified.into();
            attrs.set("year", date.format("%Y").to_string());
        }

        if let Some(probe) = probe_container(path) {
            if let Some(title) = probe.tags.get("title") {
                attrs.set("title", title.clone());
            }
            if let Some(artist) = probe.tags.get("artist") {
                attrs.set("artist", artist.clone());
            }
            if let Some(year) = probe.tags.get("year") {
                attrs.set("year", year.clone());
            }
            if let Some(secs) = probe.duration_secs {
                attrs.set("duration", format_duration(secs));
            }
        }

        attrs
    }
}

impl Default for VideoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Map FFprobe's JSON report onto attribute names
pub fn parse_ffprobe(json: &serde_json::Value) -> Attributes {
    let mut attrs = Attributes::new();

    if let Some(format) = json.get("format") {
        let tag = |key: &str| {
            format
                .get("tags")
                .and_then(|tags| {
                    tags.as_object().and_then(|map| {
                        map.iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(key))
                            .map(|(_, v)| v)
                    })
                })
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        if let Some(title) = tag("title") {
            attrs.set("title", title);
        }
        if let Some(album) = tag("album") {
            attrs.set("album", album);
        }
        if let Some(artist) = tag("artist").or_else(|| tag("album_artist")) {
            attrs.set("artist", artist);
        }
        if let Some(director) = tag("director") {
            attrs.set("director", director);
        }
        if let Some(genre) = tag("genre") {
            attrs.set("genre", genre);
        }
        if let Some(year) = tag("date")
            .or_else(|| tag("year"))
            .or_else(|| tag("creation_time"))
            .and_then(extract_year)
        {
            attrs.set("year", year);
        }

        let duration = format
            .get("duration")
            .and_then(|d| d.as_str())
            .and_then(|d| d.parse::<f64>().ok());
        if let Some(secs) = duration {
            attrs.set("duration", format_duration(secs));
        }
    }

    let video_stream = json
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"))
        });

    if let Some(stream) = video_stream {
        if let Some(width) = stream.get("width").and_then(|w| w.as_i64()) {
            attrs.set("width", width);
        }
        if let Some(height) = stream.get("height").and_then(|h| h.as_i64()) {
            attrs.set("height", height);
        }
        if let Some(codec) = stream.get("codec_name").and_then(|c| c.as_str()) {
            attrs.set("codec", codec.to_uppercase());
        }
        if let Some(rate) = stream
            .get("r_frame_rate")
            .and_then(|f| f.as_str())
            .and_then(parse_frame_rate)
        {
            attrs.set("frame_rate", rate);
        }
        let bit_depth = stream
            .get("bits_per_raw_sample")
            .and_then(|b| b.as_str())
            .and_then(|b| b.parse::<i64>().ok());
        if let Some(depth) = bit_depth {
            attrs.set("bit_depth", depth);
        }
    }

    attrs
}

/// `30000/1001` becomes `29.97`, `25/1` becomes `25`
fn parse_frame_rate(raw: &str) -> Option<String> {
    let value = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    if value <= 0.0 {
        return None;
    }
    let text = format!("{:.3}", value);
    Some(text.trim_end_matches('0').trim_end_matches('.').to_string())
}

#[async_trait]
impl MetadataExtractor for VideoExtractor {
    fn category(&self) -> Category {
        Category::Video
    }

    async fn extract(&self, path: &Path) -> Result<Attributes> {
        info!("Extracting video metadata: {:?}", path);

        let mut attrs = if self.ffprobe_available() {
            match Self::run_ffprobe(path) {
                Ok(json) => parse_ffprobe(&json),
                Err(e) => {
                    debug!("ffprobe failed for {:?}: {}", path, e);
                    Attributes::new()
                }
            }
        } else {
            Self::fallback_metadata(path)
        };

        attrs.fill("title", file_stem(path));
        attrs.default_unknown(&VIDEO_KEYS);
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeValue;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_ffprobe_report() {
        let json = serde_json::json!({
            "format": {
                "duration": "125.400000",
                "tags": {
                    "TITLE": "Harbour Timelapse",
                    "artist": "R. Okafor",
                    "date": "2022-08-14",
                    "genre": "Documentary"
                }
            },
            "streams": [
                { "codec_type": "audio", "codec_name": "aac" },
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "30000/1001",
                    "bits_per_raw_sample": "8"
                }
            ]
        });

        let attrs = parse_ffprobe(&json);
        assert_eq!(attrs.text("title"), "Harbour Timelapse");
        assert_eq!(attrs.text("artist"), "R. Okafor");
        assert_eq!(attrs.text("year"), "2022");
        assert_eq!(attrs.text("genre"), "Documentary");
        assert_eq!(attrs.text("duration"), "2:05");
        assert_eq!(attrs.get("width"), Some(&AttributeValue::Integer(1920)));
        assert_eq!(attrs.text("codec"), "H264");
        assert_eq!(attrs.text("frame_rate"), "29.97");
        assert_eq!(attrs.get("bit_depth"), Some(&AttributeValue::Integer(8)));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25/1").as_deref(), Some("25"));
        assert_eq!(parse_frame_rate("24000/1001").as_deref(), Some("23.976"));
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[tokio::test]
    async fn test_fallback_uses_filename_and_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("birthday_party.mkv");
        fs::write(&path, b"no matroska here").unwrap();

        let attrs = VideoExtractor::without_ffprobe().extract(&path).await.unwrap();
        assert_eq!(attrs.text("title"), "birthday_party");
        assert_eq!(attrs.text("year").len(), 4);
        assert_eq!(attrs.text("director"), "Unknown");
        assert_eq!(attrs.text("duration"), "Unknown");
    }
}
