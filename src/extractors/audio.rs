// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Audio metadata from ID3 tags and a generic container probe

use async_trait::async_trait;
use id3::TagLike;
use std::path::Path;
use tracing::{debug, info};

use super::MetadataExtractor;
use crate::attributes::{extract_year, file_stem, format_duration, Attributes};
use crate::category::{path_extension, Category};
use crate::Result;

const AUDIO_KEYS: [&str; 8] = [
    "artist",
    "album",
    "year",
    "genre",
    "track",
    "duration",
    "bitrate",
    "sample_rate",
];

/// Extractor for audio files
pub struct AudioExtractor;

impl AudioExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Read the ID3 tag of an MP3
    fn read_id3(path: &Path) -> Option<Attributes> {
        let tag = match id3::Tag::read_from_path(path) {
            Ok(tag) => tag,
            Err(e) => {
                debug!("No ID3 tag in {:?}: {}", path, e);
                return None;
            }
        };

        let mut attrs = Attributes::new();
        if let Some(title) = tag.title() {
            attrs.set_text("title", title);
        }
        if let Some(artist) = tag.artist() {
            attrs.set_text("artist", artist);
        }
        if let Some(album) = tag.album() {
            attrs.set_text("album", album);
        }
        if let Some(genre) = tag.genre() {
            attrs.set_text("genre", genre);
        }
        if let Some(track) = tag.track() {
            attrs.set("track", track.to_string());
        }

        let year = tag
            .year()
            .map(|y| y.to_string())
            .or_else(|| tag.date_recorded().map(|d| d.to_string()))
            .or_else(|| tag.date_released().map(|d| d.to_string()))
            .and_then(|raw| extract_year(&raw));
        if let Some(year) = year {
            attrs.set("year", year);
        }

        if let Some(millis) = tag.duration() {
            attrs.set("duration", format_duration(f64::from(millis) / 1000.0));
        }

        Some(attrs)
    }
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream properties and tags found by the generic probe
#[derive(Debug, Default)]
pub(crate) struct ProbeSummary {
    pub duration_secs: Option<f64>,
    pub sample_rate: Option<u32>,
    pub bitrate_kbps: Option<u64>,
    pub tags: Attributes,
}

/// Probe any container symphonia understands
pub(crate) fn probe_container(path: &Path) -> Option<ProbeSummary> {
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path).ok()?;
    let file_len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = match symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(probed) => probed,
        Err(e) => {
            debug!("Probe failed for {:?}: {}", path, e);
            return None;
        }
    };

    let mut summary = ProbeSummary::default();

    if let Some(track) = probed.format.default_track() {
        let params = &track.codec_params;
        summary.sample_rate = params.sample_rate;
        if let (Some(n_frames), Some(rate)) = (params.n_frames, params.sample_rate) {
            if rate > 0 {
                summary.duration_secs = Some(n_frames as f64 / f64::from(rate));
            }
        }
    }

    if let Some(secs) = summary.duration_secs {
        if secs > 0.0 && file_len > 0 {
            summary.bitrate_kbps = Some((file_len as f64 * 8.0 / secs / 1000.0) as u64);
        }
    }

    let mut tags = Attributes::new();
    if let Some(rev) = probed.format.metadata().current() {
        read_revision(rev, &mut tags);
    }
    if let Some(meta) = probed.metadata.get() {
        if let Some(rev) = meta.current() {
            read_revision(rev, &mut tags);
        }
    }
    summary.tags = tags;

    Some(summary)
}

fn read_revision(rev: &symphonia::core::meta::MetadataRevision, tags: &mut Attributes) {
    use symphonia::core::meta::StandardTagKey;

    for tag in rev.tags() {
        let value = tag.value.to_string();
        let value = value.trim();
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) => tags.fill("title", value),
            Some(StandardTagKey::Artist) | Some(StandardTagKey::AlbumArtist) => {
                tags.fill("artist", value)
            }
            Some(StandardTagKey::Album) => tags.fill("album", value),
            Some(StandardTagKey::Genre) => tags.fill("genre", value),
            Some(StandardTagKey::TrackNumber) => tags.fill("track", value),
            Some(StandardTagKey::Date) | Some(StandardTagKey::ReleaseDate) => {
                if let Some(year) = extract_year(value) {
                    tags.fill("year", year);
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl MetadataExtractor for AudioExtractor {
    fn category(&self) -> Category {
        Category::Audio
    }

    async fn extract(&self, path: &Path) -> Result<Attributes> {
        info!("Extracting audio metadata: {:?}", path);

        let mut attrs = Attributes::new();

        // ID3 first for MP3s, then let the probe fill whatever is left
        if path_extension(path).as_deref() == Some(".mp3") {
            if let Some(id3) = Self::read_id3(path) {
                attrs.extend(id3);
            }
        }

        if let Some(probe) = probe_container(path) {
            if let Some(secs) = probe.duration_secs {
                attrs.fill("duration", format_duration(secs));
            }
            if let Some(kbps) = probe.bitrate_kbps {
                attrs.fill("bitrate", format!("{} kbps", kbps));
            }
            if let Some(rate) = probe.sample_rate {
                attrs.fill("sample_rate", format!("{} kHz", rate / 1000));
            }
            attrs.merge_missing(probe.tags);
        }

        attrs.fill("title", file_stem(path));
        attrs.default_unknown(&AUDIO_KEYS);
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_untagged_file_degrades_to_unknown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Demo Take 3.mp3");
        fs::write(&path, b"definitely not mpeg audio").unwrap();

        let attrs = AudioExtractor::new().extract(&path).await.unwrap();
        assert_eq!(attrs.text("title"), "Demo Take 3");
        for key in AUDIO_KEYS {
            assert_eq!(attrs.text(key), "Unknown", "{key}");
        }
    }

    #[tokio::test]
    async fn test_id3_tags_are_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"").unwrap();

        let mut tag = id3::Tag::new();
        tag.set_title("So What");
        tag.set_artist("Miles Davis");
        tag.set_album("Kind of Blue");
        tag.set_year(1959);
        tag.set_genre("Jazz");
        tag.set_track(1);
        tag.write_to_path(&path, id3::Version::Id3v23).unwrap();

        let attrs = AudioExtractor::new().extract(&path).await.unwrap();
        assert_eq!(attrs.text("title"), "So What");
        assert_eq!(attrs.text("artist"), "Miles Davis");
        assert_eq!(attrs.text("album"), "Kind of Blue");
        assert_eq!(attrs.text("year"), "1959");
        assert_eq!(attrs.text("genre"), "Jazz");
        assert_eq!(attrs.text("track"), "1");
    }
}
