use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::ManifestError;
use crate::gallery::ViewerImage;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tga", "tiff", "tif", "webp", "ico", "pnm", "pbm",
    "pgm", "ppm", "pam", "dds", "hdr", "exr", "ff", "qoi",
];
const PROXY_EXTENSIONS: &[&str] = &["webp", "jpg", "jpeg", "png"];
const LIVE_EXTENSIONS: &[&str] = &["mov", "MOV", "mp4", "MP4"];
const MEDIUM_DIR: &str = "medium";
const THUMB_DIR: &str = "thumb";

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// `photo.medium.webp` and `photo.thumb.jpg` are proxies, not photos.
fn is_proxy_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.ends_with(".medium") || s.ends_with(".thumb"))
        .unwrap_or(false)
}

fn is_proxy_dir(path: &Path) -> bool {
    matches!(path.file_name().and_then(|n| n.to_str()), Some(MEDIUM_DIR) | Some(THUMB_DIR))
}

fn path_string(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

/// Looks for `<dir>/<sub>/<name>` first, then `<dir>/<stem>.<suffix>.<ext>`.
fn find_proxy(path: &Path, sub: &str, suffix: &str) -> Option<String> {
    let dir = path.parent()?;
    let name = path.file_name()?;
    let stem = path.file_stem()?.to_str()?;

    let in_subdir = dir.join(sub).join(name);
    if in_subdir.is_file() {
        return Some(path_string(&in_subdir));
    }
    PROXY_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}.{}", stem, suffix, ext)))
        .find(|p| p.is_file())
        .map(|p| path_string(&p))
}

fn find_live_video(path: &Path) -> Option<String> {
    LIVE_EXTENSIONS
        .iter()
        .map(|ext| path.with_extension(ext))
        .find(|p| p.is_file())
        .map(|p| path_string(&p))
}

fn describe(path: &Path) -> ViewerImage {
    let live = find_live_video(path);
    ViewerImage {
        id: String::new(),
        file_path: path_string(path),
        medium_path: find_proxy(path, MEDIUM_DIR, "medium"),
        small_thumb_path: find_proxy(path, THUMB_DIR, "thumb"),
        title: path.file_stem().map(|s| s.to_string_lossy().to_string()),
        is_live_photo: live.is_some(),
        live_photo_video_path: live,
    }
}

/// Make `id` unique among `taken` by suffixing `-2`, `-3`, ...
fn unique_id(base: &str, taken: &mut HashSet<String>) -> String {
    let base: String = base
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' { '-' } else { c })
        .collect();
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

pub fn collect_gallery(paths: &[PathBuf], recursive: bool, follow_links: bool) -> Vec<ViewerImage> {
    let start_time = Instant::now();
    let mut files = Vec::new();
    for path in paths {
        if !follow_links {
            if let Ok(meta) = fs::symlink_metadata(path) {
                if meta.file_type().is_symlink() {
                    continue;
                }
            }
        }
        if path.is_dir() {
            scan_dir(path, recursive, follow_links, &mut files);
        } else if path.is_file() && is_image_file(path) && !is_proxy_file(path) {
            files.push(path.clone());
        }
    }

    let mut images: Vec<ViewerImage> = files.par_iter().map(|p| describe(p)).collect();
    let mut taken = HashSet::new();
    for img in &mut images {
        let stem = img.title.clone().unwrap_or_else(|| "image".to_string());
        img.id = unique_id(&stem, &mut taken);
    }

    log::info!(
        "Scan complete in {:.2}s. Found {} images ({} with medium proxies).",
        start_time.elapsed().as_secs_f64(),
        images.len(),
        images.iter().filter(|i| i.medium_path.is_some()).count(),
    );
    images
}

fn scan_dir(dir: &Path, recursive: bool, follow_links: bool, dest: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in entries.filter_map(|e| e.ok()) {
        let Ok(ft) = entry.file_type() else { continue };
        if ft.is_symlink() && !follow_links {
            continue;
        }

        let p = entry.path();
        if p.is_file() && is_image_file(&p) && !is_proxy_file(&p) {
            files.push(p);
        } else if recursive && p.is_dir() && !is_proxy_dir(&p) {
            subdirs.push(p);
        }
    }

    files.sort();
    dest.extend(files);

    if recursive {
        subdirs.sort();
        for sub in subdirs {
            scan_dir(&sub, true, follow_links, dest);
        }
    }
}

#[derive(serde::Deserialize)]
struct Manifest {
    images: Vec<ViewerImage>,
}

/// Relative paths in the manifest resolve against the manifest's directory.
pub fn load_manifest(path: &Path) -> Result<Vec<ViewerImage>, ManifestError> {
    let text = fs::read_to_string(path)?;
    let manifest: Manifest = serde_json::from_str(&text)?;
    let base = path.parent().unwrap_or(Path::new("."));
    let resolve = |p: String| -> String {
        if Path::new(&p).is_absolute() { p } else { path_string(&base.join(p)) }
    };

    let mut seen = HashSet::new();
    let mut images = Vec::with_capacity(manifest.images.len());
    for mut img in manifest.images {
        if !seen.insert(img.id.clone()) {
            return Err(ManifestError::DuplicateId(img.id));
        }
        img.file_path = resolve(img.file_path);
        img.medium_path = img.medium_path.map(resolve);
        img.small_thumb_path = img.small_thumb_path.map(resolve);
        img.live_photo_video_path = img.live_photo_video_path.map(resolve);
        images.push(img);
    }
    log::info!("Loaded {} images from {}", images.len(), path.display());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(p: &Path) {
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, b"x").unwrap();
    }

    #[test]
    fn scan_finds_photos_and_their_proxies() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.jpg"));
        touch(&root.join("a.jpg"));
        touch(&root.join("a.medium.webp"));
        touch(&root.join("a.thumb.jpg"));
        touch(&root.join("a.mov"));
        touch(&root.join("medium/b.jpg"));
        touch(&root.join("notes.txt"));
        touch(&root.join("sub/c.png"));

        let flat = collect_gallery(&[root.to_path_buf()], false, false);
        let ids: Vec<_> = flat.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(flat[0].medium_path.as_deref().unwrap().ends_with("a.medium.webp"));
        assert!(flat[0].small_thumb_path.as_deref().unwrap().ends_with("a.thumb.jpg"));
        assert!(flat[0].is_live_photo);
        assert!(flat[1].medium_path.as_deref().unwrap().ends_with("medium/b.jpg"));
        assert!(!flat[1].is_live_photo);

        let deep = collect_gallery(&[root.to_path_buf()], true, false);
        let ids: Vec<_> = deep.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"], "proxy directories are not scanned");
    }

    #[test]
    fn duplicate_stems_get_suffixes() {
        let mut taken = HashSet::new();
        assert_eq!(unique_id("img", &mut taken), "img");
        assert_eq!(unique_id("img", &mut taken), "img-2");
        assert_eq!(unique_id("img", &mut taken), "img-3");
        assert_eq!(unique_id("my photo", &mut taken), "my-photo");
    }

    #[test]
    fn manifest_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("gallery.json");
        fs::write(
            &manifest,
            r#"{"images":[
                {"id":"x","filePath":"full/x.jpg","mediumPath":"med/x.webp","title":"Harbour"},
                {"id":"y","filePath":"/abs/y.jpg","isLivePhoto":true,"livePhotoVideoPath":"y.mov"}
            ]}"#,
        )
        .unwrap();
        let images = load_manifest(&manifest).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].file_path, path_string(&dir.path().join("full/x.jpg")));
        assert_eq!(images[0].title.as_deref(), Some("Harbour"));
        assert_eq!(images[1].file_path, "/abs/y.jpg");
        assert!(images[1].is_live_photo);
    }

    #[test]
    fn manifest_rejects_duplicate_ids_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("m.json");
        fs::write(&manifest, r#"{"images":[{"id":"x","filePath":"a"},{"id":"x","filePath":"b"}]}"#).unwrap();
        assert!(matches!(load_manifest(&manifest), Err(ManifestError::DuplicateId(id)) if id == "x"));
        fs::write(&manifest, "{").unwrap();
        assert!(matches!(load_manifest(&manifest), Err(ManifestError::Parse(_))));
        assert!(matches!(load_manifest(&dir.path().join("none.json")), Err(ManifestError::Io(_))));
    }
}
