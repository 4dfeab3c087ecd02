pub mod exif;
pub mod guess;

use chrono::{Datelike, NaiveDateTime, Utc};

use crate::media::{DateAccuracy, MediaItem};
use crate::sidecar;

/// Years before photography existed, or after today, mean a broken
/// camera clock or a placeholder value.
const MIN_PLAUSIBLE_YEAR: i32 = 1800;

/// Files above this size are not probed for EXIF.
pub const MAX_EXIF_READ: u64 = 32 * 1024 * 1024;

/// A capture date together with the source that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDateTime,
    pub accuracy: DateAccuracy,
}

/// Resolution outcome plus anything worth telling the user about.
#[derive(Debug, Default)]
pub struct DateResolution {
    pub resolved: Option<ResolvedDate>,
    pub warnings: Vec<String>,
}

pub fn is_plausible(date: &NaiveDateTime) -> bool {
    (MIN_PLAUSIBLE_YEAR..=Utc::now().year()).contains(&date.year())
}

/// Work through the date sources most-trustworthy-first and stop at
/// the first plausible hit. An implausible or unreadable value falls
/// through to the next source instead of failing the file; a file no
/// source can date stays undated.
pub fn resolve_capture_date(item: &MediaItem, allow_filename_guess: bool) -> DateResolution {
    let mut resolution = DateResolution::default();

    if let Some(sc) = &item.sidecar {
        match sidecar::read_sidecar_date(&sc.path) {
            Ok(Some(date)) if is_plausible(&date) => {
                resolution.resolved = Some(ResolvedDate {
                    date,
                    accuracy: DateAccuracy::Sidecar,
                });
                return resolution;
            }
            Ok(_) => {}
            Err(err) => resolution.warnings.push(err.to_string()),
        }
    }

    if eligible_for_exif(item) {
        if let Some(date) = exif::date_from_exif(&item.path) {
            if is_plausible(&date) {
                resolution.resolved = Some(ResolvedDate {
                    date,
                    accuracy: DateAccuracy::Exif,
                });
                return resolution;
            }
        }
    }

    if allow_filename_guess {
        if let Some(date) = guess::date_from_filename(&item.filename) {
            if is_plausible(&date) {
                resolution.resolved = Some(ResolvedDate {
                    date,
                    accuracy: DateAccuracy::Filename,
                });
                return resolution;
            }
        }
    }

    resolution
}

/// Only plausible EXIF carriers get probed: image files up to
/// `MAX_EXIF_READ`. Videos and RAW containers are skipped.
fn eligible_for_exif(item: &MediaItem) -> bool {
    if item.size > MAX_EXIF_READ {
        return false;
    }
    match mime_guess::from_path(&item.filename).first() {
        Some(mime) => mime.type_() == mime_guess::mime::IMAGE,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    use chrono::NaiveDate;

    fn media_with_sidecar(dir: &Path, name: &str, sidecar_json: Option<&str>) -> MediaItem {
        let path = dir.join(name);
        fs::write(&path, b"image bytes").unwrap();
        let sidecar = sidecar_json.map(|json| {
            let sc = dir.join(format!("{name}.json"));
            fs::write(&sc, json).unwrap();
            sidecar::SidecarMatch {
                path: sc,
                owned: true,
            }
        });
        MediaItem::new(path, name.to_string(), 11, sidecar)
    }

    #[test]
    fn plausibility_bounds() {
        let too_old = NaiveDate::from_ymd_opt(1799, 12, 31).unwrap().and_hms_opt(23, 59, 59).unwrap();
        let floor = NaiveDate::from_ymd_opt(1800, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let future = NaiveDate::from_ymd_opt(Utc::now().year() + 1, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert!(!is_plausible(&too_old));
        assert!(is_plausible(&floor));
        assert!(!is_plausible(&future));
    }

    #[test]
    fn sidecar_outranks_filename() {
        let dir = tempfile::tempdir().unwrap();
        let item = media_with_sidecar(
            dir.path(),
            "IMG_20190101_000000.jpg",
            Some(r#"{"photoTakenTime":{"timestamp":"1623751200"}}"#),
        );
        let res = resolve_capture_date(&item, true);
        let resolved = res.resolved.unwrap();
        assert_eq!(resolved.accuracy, DateAccuracy::Sidecar);
        assert_eq!(resolved.date.year(), 2021);
    }

    #[test]
    fn implausible_sidecar_falls_through_to_filename() {
        let dir = tempfile::tempdir().unwrap();
        // epoch 7258118400 is in 2200
        let item = media_with_sidecar(
            dir.path(),
            "IMG_20190101_000000.jpg",
            Some(r#"{"photoTakenTime":{"timestamp":"7258118400"}}"#),
        );
        let res = resolve_capture_date(&item, true);
        let resolved = res.resolved.unwrap();
        assert_eq!(resolved.accuracy, DateAccuracy::Filename);
        assert_eq!(resolved.date.year(), 2019);
    }

    #[test]
    fn future_filename_dates_stay_undated() {
        let dir = tempfile::tempdir().unwrap();
        // well-formed name whose year no camera clock reaches
        let item = media_with_sidecar(dir.path(), "IMG_20991231_120000.jpg", None);
        let res = resolve_capture_date(&item, true);
        assert!(res.resolved.is_none());
        assert!(res.warnings.is_empty());
        // year 3000 does not even match a naming convention
        let item = media_with_sidecar(dir.path(), "IMG_30000101_120000.jpg", None);
        assert!(resolve_capture_date(&item, true).resolved.is_none());
    }

    #[test]
    fn unreadable_sidecar_warns_and_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let item = media_with_sidecar(dir.path(), "IMG_20190101_000000.jpg", Some("{broken"));
        let res = resolve_capture_date(&item, true);
        assert_eq!(res.warnings.len(), 1);
        let resolved = res.resolved.unwrap();
        assert_eq!(resolved.accuracy, DateAccuracy::Filename);
    }

    #[test]
    fn guess_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let item = media_with_sidecar(dir.path(), "IMG_20190101_000000.bin", None);
        let res = resolve_capture_date(&item, false);
        assert!(res.resolved.is_none());
        assert!(res.warnings.is_empty());
    }

    #[test]
    fn no_source_means_undated() {
        let dir = tempfile::tempdir().unwrap();
        let item = media_with_sidecar(dir.path(), "holiday.bin", None);
        let res = resolve_capture_date(&item, true);
        assert!(res.resolved.is_none());
        assert!(res.warnings.is_empty());
    }

    #[test]
    fn exif_gate_skips_oversized_and_non_images() {
        let big = MediaItem::new(PathBuf::from("/x/a.jpg"), "a.jpg".into(), MAX_EXIF_READ + 1, None);
        assert!(!eligible_for_exif(&big));
        let video = MediaItem::new(PathBuf::from("/x/a.mp4"), "a.mp4".into(), 10, None);
        assert!(!eligible_for_exif(&video));
        let image = MediaItem::new(PathBuf::from("/x/a.jpg"), "a.jpg".into(), 10, None);
        assert!(eligible_for_exif(&image));
    }
}
