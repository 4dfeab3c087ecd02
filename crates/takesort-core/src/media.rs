use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::sidecar::SidecarMatch;

/// Where a capture date came from. Ordered from most to least
/// trustworthy; the resolver stops at the first source that yields a
/// plausible date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DateAccuracy {
    /// Timestamp carried by the export's JSON sidecar.
    Sidecar,
    /// DateTimeOriginal (or sibling tags) embedded in the file.
    Exif,
    /// Date spelled out in the filename itself.
    Filename,
}

/// One media file discovered under the source root.
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Absolute path of the file in the source tree.
    pub path: PathBuf,
    /// File name component, kept separate because placement and
    /// sidecar lookup both work on it.
    pub filename: String,
    /// Size in bytes at scan time.
    pub size: u64,
    /// Sidecar metadata file paired with this media, if one was found.
    /// Only an owned match travels with the file when it moves.
    pub sidecar: Option<SidecarMatch>,
    /// Capture date in UTC. `None` means undated and the file goes to
    /// the review bucket.
    pub date: Option<NaiveDateTime>,
    /// Which source produced `date`.
    pub date_accuracy: Option<DateAccuracy>,
}

impl MediaItem {
    pub fn new(path: PathBuf, filename: String, size: u64, sidecar: Option<SidecarMatch>) -> Self {
        Self {
            path,
            filename,
            size,
            sidecar,
            date: None,
            date_accuracy: None,
        }
    }

    /// File name without the final extension.
    pub fn stem(&self) -> &str {
        match self.filename.rfind('.') {
            Some(pos) if pos > 0 => &self.filename[..pos],
            _ => &self.filename,
        }
    }

    /// Final extension without the dot, empty when there is none.
    pub fn extension(&self) -> &str {
        match self.filename.rfind('.') {
            Some(pos) if pos > 0 => &self.filename[pos + 1..],
            _ => "",
        }
    }
}
