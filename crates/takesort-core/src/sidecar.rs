use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::ImportError;
use crate::extras;

static BRACKET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d+\)\.").unwrap());

/// A located sidecar, tagged with the strength of the name match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarMatch {
    pub path: PathBuf,
    /// True when the sidecar is named for this media file alone (exact,
    /// truncated or bracket-swapped name). The looser transforms pair a
    /// derivative or numbered duplicate with a sidecar that other files
    /// in the same directory resolve to as well; such a match is read
    /// for its date but never moved or deleted out from under the other
    /// claimants.
    pub owned: bool,
}

/// Locate the sidecar for a media file. The exporter derives sidecar
/// names from media names in several ways, so a handful of candidate
/// names is probed in order; first hit wins.
pub fn find_sidecar(media_path: &Path) -> Option<SidecarMatch> {
    let dir = media_path.parent()?;
    let filename = media_path.file_name()?.to_str()?;
    for (name, owned) in candidate_names(filename) {
        let candidate = dir.join(format!("{name}.json"));
        if candidate.is_file() {
            return Some(SidecarMatch {
                path: candidate,
                owned,
            });
        }
    }
    None
}

/// Media-name variants whose `.json` sibling may hold the metadata,
/// most exact first. The first three reconstruct the name the exporter
/// would have written for this very file; the rest are salvage
/// transforms a sibling file can land on too.
fn candidate_names(filename: &str) -> Vec<(String, bool)> {
    let mut names: Vec<(String, bool)> = Vec::with_capacity(6);
    let mut push = |name: String, owned: bool| {
        if !names.iter().any(|(seen, _)| *seen == name) {
            names.push((name, owned));
        }
    };
    push(filename.to_string(), true);
    push(shortened(filename), true);
    push(bracket_swapped(filename), true);
    if let Some(stripped) = extras::strip_derivative(filename) {
        push(stripped, false);
    }
    push(stem_only(filename), false);
    push(digitless(filename), false);
    names
}

/// The exporter truncates long names so `{name}.json` fits in 51
/// bytes, cutting at a char boundary.
fn shortened(filename: &str) -> String {
    const MAX_SIDECAR_NAME: usize = 51;
    let budget = MAX_SIDECAR_NAME - ".json".len();
    if filename.len() <= budget {
        return filename.to_string();
    }
    let mut end = budget;
    while end > 0 && !filename.is_char_boundary(end) {
        end -= 1;
    }
    filename[..end].to_string()
}

/// Numbered duplicates carry the counter past the extension in their
/// sidecar: `IMG(1).jpg` pairs with `IMG.jpg(1).json`.
fn bracket_swapped(filename: &str) -> String {
    if let Some(m) = BRACKET_RE.find_iter(filename).last() {
        let counter = &m.as_str()[..m.as_str().len() - 1];
        let mut swapped = String::with_capacity(filename.len());
        swapped.push_str(&filename[..m.start()]);
        swapped.push_str(&filename[m.start() + counter.len()..]);
        swapped.push_str(counter);
        return swapped;
    }
    filename.to_string()
}

fn stem_only(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_string()
}

/// Duplicates sometimes share the original's sidecar outright.
fn digitless(filename: &str) -> String {
    BRACKET_RE.replace_all(filename, ".").to_string()
}

/// Read the capture timestamp from a sidecar document. `Ok(None)`
/// means the document is valid JSON but holds no usable timestamp;
/// `Err` means the sidecar exists but cannot be understood.
pub fn read_sidecar_date(path: &Path) -> Result<Option<NaiveDateTime>, ImportError> {
    let bytes = fs::read(path).map_err(|e| ImportError::MetadataParseFailure {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let doc: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| ImportError::MetadataParseFailure {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    Ok(timestamp_of(&doc).and_then(to_utc_naive))
}

/// `photoTakenTime` is the shot, `creationTime` the upload; ancient
/// exports wrote a bare top-level `timestamp`.
fn timestamp_of(doc: &serde_json::Value) -> Option<i64> {
    for key in ["photoTakenTime", "creationTime"] {
        if let Some(epoch) = doc.get(key).and_then(|t| t.get("timestamp")).and_then(epoch_of) {
            return Some(epoch);
        }
    }
    doc.get("timestamp").and_then(epoch_of)
}

/// Epochs appear as strings or bare integers depending on export era.
fn epoch_of(value: &serde_json::Value) -> Option<i64> {
    value
        .as_str()
        .and_then(|s| s.parse::<i64>().ok())
        .or_else(|| value.as_i64())
}

/// Zero and negative epochs are placeholders, not captures.
fn to_utc_naive(epoch: i64) -> Option<NaiveDateTime> {
    if epoch <= 0 {
        return None;
    }
    chrono::DateTime::from_timestamp(epoch, 0).map(|utc| utc.naive_utc())
}
