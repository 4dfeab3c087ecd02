use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use filetime::FileTime;

use crate::media::MediaItem;

/// Move a file, falling back to copy-then-delete when the rename
/// cannot cross a device boundary.
pub fn move_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::CrossesDevices | ErrorKind::PermissionDenied
            ) =>
        {
            // fs::copy does not carry mtimes over
            let source_mtime = fs::metadata(from).and_then(|m| m.modified()).ok();
            fs::copy(from, to)
                .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
            if let Some(mtime) = source_mtime {
                let _ = filetime::set_file_mtime(to, FileTime::from_system_time(mtime));
            }
            fs::remove_file(from)
                .with_context(|| format!("removing {} after copy", from.display()))?;
            Ok(())
        }
        Err(err) => {
            Err(err).with_context(|| format!("moving {} to {}", from.display(), to.display()))
        }
    }
}

/// Move an item to its destination, bring its own sidecar along under
/// a matching name, and stamp the file's mtime from the capture date.
/// Only the media move itself can fail; sidecar and mtime trouble
/// comes back as warnings.
pub fn move_into_library(item: &MediaItem, dest: &Path) -> anyhow::Result<Vec<String>> {
    let mut warnings = Vec::new();
    move_file(&item.path, dest)?;

    if let Some(date) = item.date {
        let stamp = FileTime::from_unix_time(date.and_utc().timestamp(), 0);
        if let Err(err) = filetime::set_file_mtime(dest, stamp) {
            warnings.push(format!("could not stamp mtime on {}: {err}", dest.display()));
        }
    }

    // A sidecar matched through a shared name transform may belong to
    // other files still coming up in the walk; only a sidecar named
    // for this file alone travels with it.
    if let Some(sidecar) = item.sidecar.as_ref().filter(|sc| sc.owned) {
        match sidecar_destination(item, &sidecar.path, dest) {
            Some(sc_dest) => {
                if sc_dest.exists() {
                    warnings.push(format!(
                        "sidecar left behind, destination occupied: {}",
                        sidecar.path.display()
                    ));
                } else if let Err(err) = move_file(&sidecar.path, &sc_dest) {
                    warnings.push(format!(
                        "sidecar left behind: {}: {err:#}",
                        sidecar.path.display()
                    ));
                }
            }
            None => warnings.push(format!(
                "sidecar left behind, unmappable name: {}",
                sidecar.path.display()
            )),
        }
    }

    Ok(warnings)
}

/// A renamed media file renames its sidecar the same way:
/// `IMG.jpg` -> `IMG(1).jpg` carries `IMG.jpg.json` -> `IMG(1).jpg.json`.
fn sidecar_destination(item: &MediaItem, sidecar: &Path, media_dest: &Path) -> Option<PathBuf> {
    let dest_dir = media_dest.parent()?;
    let sc_name = sidecar.file_name()?.to_str()?;
    let dest_name = media_dest.file_name()?.to_str()?;
    if dest_name == item.filename {
        return Some(dest_dir.join(sc_name));
    }
    let new_stem = match dest_name.rfind('.') {
        Some(pos) if pos > 0 => &dest_name[..pos],
        _ => dest_name,
    };
    match sc_name.strip_prefix(item.stem()) {
        Some(rest) => Some(dest_dir.join(format!("{new_stem}{rest}"))),
        None => Some(dest_dir.join(sc_name)),
    }
}

/// Delete a source file (and its own sidecar) whose content is already
/// in the library. A shared sidecar stays for its remaining claimants.
/// Failures are warnings; a leftover source is harmless and gets
/// looked at again next run.
pub fn remove_duplicate_source(item: &MediaItem) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Err(err) = fs::remove_file(&item.path) {
        warnings.push(format!(
            "could not remove duplicate {}: {err}",
            item.path.display()
        ));
    }
    if let Some(sidecar) = item.sidecar.as_ref().filter(|sc| sc.owned) {
        if let Err(err) = fs::remove_file(&sidecar.path) {
            warnings.push(format!(
                "could not remove sidecar {}: {err}",
                sidecar.path.display()
            ));
        }
    }
    warnings
}
