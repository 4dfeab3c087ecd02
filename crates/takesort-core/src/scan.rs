use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::ImportError;
use crate::extras;
use crate::media::MediaItem;
use crate::sidecar;

/// True when the name looks like a photo or video. Extension-based via
/// mime type; `.mts` clips map to a non-media type and get a special
/// case, same as the exporter treats them.
pub fn is_media_filename(filename: &str) -> bool {
    match mime_guess::from_path(filename).first() {
        Some(mime) => {
            mime.type_() == mime_guess::mime::IMAGE
                || mime.type_() == mime_guess::mime::VIDEO
                || filename.to_lowercase().ends_with(".mts")
        }
        None => false,
    }
}

/// Streaming walk over the source tree, yielding media candidates in
/// stable name order with their sidecars paired up. Entries that fail
/// individually (unreadable, non-UTF-8 name) turn into warnings and
/// the walk continues.
#[derive(Debug)]
pub struct MediaWalk {
    walker: walkdir::IntoIter,
    skip_derivatives: bool,
    pub warnings: Vec<String>,
}

impl MediaWalk {
    pub fn new(root: &Path, skip_derivatives: bool) -> Result<Self, ImportError> {
        let meta = fs::metadata(root).map_err(|source| ImportError::SourceUnavailable {
            path: root.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(ImportError::SourceUnavailable {
                path: root.to_path_buf(),
                source: std::io::Error::other("not a directory"),
            });
        }
        Ok(Self {
            walker: WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter(),
            skip_derivatives,
            warnings: Vec::new(),
        })
    }

    /// Next media candidate, or `None` once the tree is exhausted.
    pub fn next_item(&mut self) -> Option<MediaItem> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    self.warnings.push(format!("skipping unreadable entry: {err}"));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                self.warnings.push(format!(
                    "skipping non-UTF-8 filename: {}",
                    entry.path().display()
                ));
                continue;
            };
            if !is_media_filename(&filename) {
                continue;
            }
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(err) => {
                    self.warnings.push(format!(
                        "skipping {}: {err}",
                        entry.path().display()
                    ));
                    continue;
                }
            };
            let path = entry.into_path();
            let sidecar = sidecar::find_sidecar(&path);
            let item = MediaItem::new(path, filename, size, sidecar);
            if self.skip_derivatives && extras::is_derivative(item.stem()) {
                continue;
            }
            return Some(item);
        }
    }
}
