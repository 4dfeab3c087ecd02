use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::ImportError;
use crate::identity;
use crate::media::MediaItem;

/// Review bucket for files no source could date.
pub const UNDATED_DIR: &str = "_undated";
/// Numbered-name attempts before a dated file counts as conflicted.
pub const MAX_NAME_ATTEMPTS: u32 = 100;

/// Where an item should go, or why it need not move at all.
#[derive(Debug, PartialEq, Eq)]
pub enum Placement {
    /// Free destination; move the file there.
    New(PathBuf),
    /// Identical content already sits at this path.
    AlreadyPresent(PathBuf),
}

/// Directory an item files under: `YYYY/MM` from the capture date, or
/// the review bucket when undated.
pub fn bucket_dir(library_root: &Path, item: &MediaItem) -> PathBuf {
    match item.date {
        Some(date) => library_root
            .join(date.format("%Y").to_string())
            .join(date.format("%m").to_string()),
        None => library_root.join(UNDATED_DIR),
    }
}

/// Pick the destination for an item whose content digest is known.
///
/// Occupied names are settled by content, not name: a digest match
/// means the file is already imported (possibly by a run that died
/// before its index entry was written) and nothing moves. Dated files
/// sidestep unrelated occupants with `name(1).ext` counters. Undated
/// files are never renamed; a different-content occupant there is a
/// conflict left for manual review.
pub fn plan_destination(
    library_root: &Path,
    item: &MediaItem,
    digest: &str,
) -> anyhow::Result<Placement> {
    let dir = bucket_dir(library_root, item);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let first = dir.join(&item.filename);
    match probe(&first, digest)? {
        Probe::Free => return Ok(Placement::New(first)),
        Probe::SameContent => return Ok(Placement::AlreadyPresent(first)),
        Probe::Occupied => {}
    }

    if item.date.is_none() {
        return Err(ImportError::PlacementConflict {
            path: item.path.clone(),
            attempts: 1,
        }
        .into());
    }

    let stem = item.stem();
    let ext = item.extension();
    for counter in 1..=MAX_NAME_ATTEMPTS {
        let name = if ext.is_empty() {
            format!("{stem}({counter})")
        } else {
            format!("{stem}({counter}).{ext}")
        };
        let candidate = dir.join(name);
        match probe(&candidate, digest)? {
            Probe::Free => return Ok(Placement::New(candidate)),
            Probe::SameContent => return Ok(Placement::AlreadyPresent(candidate)),
            Probe::Occupied => {}
        }
    }

    Err(ImportError::PlacementConflict {
        path: item.path.clone(),
        attempts: MAX_NAME_ATTEMPTS + 1,
    }
    .into())
}

enum Probe {
    Free,
    SameContent,
    Occupied,
}

fn probe(candidate: &Path, digest: &str) -> anyhow::Result<Probe> {
    if !candidate.exists() {
        return Ok(Probe::Free);
    }
    let existing = identity::file_digest(candidate)
        .with_context(|| format!("hashing {}", candidate.display()))?;
    Ok(if existing == digest {
        Probe::SameContent
    } else {
        Probe::Occupied
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn june_2021() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 6, 15).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn item(dir: &Path, name: &str, contents: &[u8], date: Option<NaiveDateTime>) -> (MediaItem, String) {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        let mut item = MediaItem::new(path.clone(), name.to_string(), contents.len() as u64, None);
        item.date = date;
        let digest = identity::file_digest(&path).unwrap();
        (item, digest)
    }

    #[test]
    fn dated_items_file_under_year_and_month() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let (item, digest) = item(src.path(), "IMG_01.jpg", b"aaa", Some(june_2021()));
        let placement = plan_destination(lib.path(), &item, &digest).unwrap();
        assert_eq!(
            placement,
            Placement::New(lib.path().join("2021").join("06").join("IMG_01.jpg"))
        );
        assert!(lib.path().join("2021").join("06").is_dir());
    }

    #[test]
    fn undated_items_file_under_review_bucket() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let (item, digest) = item(src.path(), "holiday.jpg", b"aaa", None);
        let placement = plan_destination(lib.path(), &item, &digest).unwrap();
        assert_eq!(
            placement,
            Placement::New(lib.path().join(UNDATED_DIR).join("holiday.jpg"))
        );
    }

    #[test]
    fn unrelated_occupant_gets_counter_suffix() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let month = lib.path().join("2021").join("06");
        fs::create_dir_all(&month).unwrap();
        fs::write(month.join("IMG_01.jpg"), b"other content").unwrap();

        let (item, digest) = item(src.path(), "IMG_01.jpg", b"mine", Some(june_2021()));
        let placement = plan_destination(lib.path(), &item, &digest).unwrap();
        assert_eq!(placement, Placement::New(month.join("IMG_01(1).jpg")));
    }

    #[test]
    fn counter_skips_every_occupied_name() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let month = lib.path().join("2021").join("06");
        fs::create_dir_all(&month).unwrap();
        fs::write(month.join("IMG_01.jpg"), b"first").unwrap();
        fs::write(month.join("IMG_01(1).jpg"), b"second").unwrap();

        let (item, digest) = item(src.path(), "IMG_01.jpg", b"third", Some(june_2021()));
        let placement = plan_destination(lib.path(), &item, &digest).unwrap();
        assert_eq!(placement, Placement::New(month.join("IMG_01(2).jpg")));
    }

    #[test]
    fn identical_occupant_means_already_present() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let month = lib.path().join("2021").join("06");
        fs::create_dir_all(&month).unwrap();
        fs::write(month.join("IMG_01.jpg"), b"same bytes").unwrap();

        let (item, digest) = item(src.path(), "IMG_01.jpg", b"same bytes", Some(june_2021()));
        let placement = plan_destination(lib.path(), &item, &digest).unwrap();
        assert_eq!(placement, Placement::AlreadyPresent(month.join("IMG_01.jpg")));
    }

    #[test]
    fn identical_content_found_behind_a_counter() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let month = lib.path().join("2021").join("06");
        fs::create_dir_all(&month).unwrap();
        fs::write(month.join("IMG_01.jpg"), b"unrelated").unwrap();
        fs::write(month.join("IMG_01(1).jpg"), b"same bytes").unwrap();

        let (item, digest) = item(src.path(), "IMG_01.jpg", b"same bytes", Some(june_2021()));
        let placement = plan_destination(lib.path(), &item, &digest).unwrap();
        assert_eq!(
            placement,
            Placement::AlreadyPresent(month.join("IMG_01(1).jpg"))
        );
    }

    #[test]
    fn undated_occupant_with_different_content_is_a_conflict() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let bucket = lib.path().join(UNDATED_DIR);
        fs::create_dir_all(&bucket).unwrap();
        fs::write(bucket.join("holiday.jpg"), b"theirs").unwrap();

        let (item, digest) = item(src.path(), "holiday.jpg", b"mine", None);
        let err = plan_destination(lib.path(), &item, &digest).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::PlacementConflict { attempts: 1, .. })
        ));
    }

    #[test]
    fn undated_identical_occupant_is_already_present() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let bucket = lib.path().join(UNDATED_DIR);
        fs::create_dir_all(&bucket).unwrap();
        fs::write(bucket.join("holiday.jpg"), b"same").unwrap();

        let (item, digest) = item(src.path(), "holiday.jpg", b"same", None);
        let placement = plan_destination(lib.path(), &item, &digest).unwrap();
        assert_eq!(
            placement,
            Placement::AlreadyPresent(bucket.join("holiday.jpg"))
        );
    }
}
