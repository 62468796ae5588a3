//! Details for the metadata panel, read from the file and its EXIF block.

use chrono::NaiveDateTime;
use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use crate::cache::Waker;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoMetadata {
    pub file_name: String,
    pub file_size: Option<u64>,
    pub camera: Option<String>,
    pub lens: Option<String>,
    pub exposure: Option<String>,
    pub taken_at: Option<NaiveDateTime>,
}

fn ascii_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(parts) => parts
            .first()
            .map(|p| String::from_utf8_lossy(p).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn display_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    exif.get_field(tag, exif::In::PRIMARY)
        .map(|f| f.display_value().with_unit(exif).to_string())
}

pub fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y:%m:%d %H:%M:%S").ok()
}

/// Joins make and model, dropping the make when the model already starts with it.
fn camera_name(make: Option<String>, model: Option<String>) -> Option<String> {
    match (make, model) {
        (Some(make), Some(model)) if model.to_lowercase().starts_with(&make.to_lowercase()) => Some(model),
        (Some(make), Some(model)) => Some(format!("{} {}", make, model)),
        (make, model) => make.or(model),
    }
}

pub fn read_metadata(path: &str) -> PhotoMetadata {
    let mut meta = PhotoMetadata {
        file_size: fs::metadata(path).ok().map(|m| m.len()),
        ..PhotoMetadata::named(path)
    };

    let Ok(file) = fs::File::open(path) else { return meta };
    let exif = match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
        Ok(exif) => exif,
        Err(e) => {
            log::debug!("No EXIF in {}: {}", path, e);
            return meta;
        }
    };

    meta.camera = camera_name(ascii_field(&exif, exif::Tag::Make), ascii_field(&exif, exif::Tag::Model));
    meta.lens = ascii_field(&exif, exif::Tag::LensModel);
    let exposure: Vec<String> = [
        exif::Tag::FocalLength,
        exif::Tag::FNumber,
        exif::Tag::ExposureTime,
        exif::Tag::PhotographicSensitivity,
    ]
    .into_iter()
    .filter_map(|t| display_field(&exif, t))
    .collect();
    if !exposure.is_empty() {
        meta.exposure = Some(exposure.join("  "));
    }
    meta.taken_at = ascii_field(&exif, exif::Tag::DateTimeOriginal).and_then(|s| parse_exif_datetime(&s));
    meta
}

pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Read `path` on a background thread; the result arrives once on the returned channel.
pub fn spawn_read_metadata(path: String, waker: Waker) -> Receiver<PhotoMetadata> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        if tx.send(read_metadata(&path)).is_ok() {
            waker();
        }
    });
    rx
}

impl PhotoMetadata {
    /// Only the file name, shown until the file itself has been read.
    pub fn named(path: &str) -> Self {
        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        Self { file_name, ..Default::default() }
    }

    /// Text lines for the panel; `dimensions` come from whatever is currently decoded.
    pub fn lines(&self, dimensions: Option<(u32, u32)>) -> Vec<String> {
        let mut out = vec![self.file_name.clone()];
        if let Some((w, h)) = dimensions {
            out.push(format!("{} x {}", w, h));
        }
        if let Some(size) = self.file_size {
            out.push(format_size(size));
        }
        if let Some(taken) = self.taken_at {
            out.push(taken.format("%Y-%m-%d %H:%M").to_string());
        }
        out.extend(self.camera.clone());
        out.extend(self.lens.clone());
        out.extend(self.exposure.clone());
        out
    }
}
