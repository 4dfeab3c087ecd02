use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{In, Reader, Tag};

/// Tags tried in order. DateTimeOriginal is the shutter press; the
/// others drift with edits and copies.
const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// Read the capture date embedded in an image file. EXIF datetimes
/// carry no timezone, so the value is taken as-is.
pub fn date_from_exif(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let exif = Reader::new().read_from_container(&mut BufReader::new(file)).ok()?;
    for tag in DATE_TAGS {
        if let Some(field) = exif.get_field(tag, In::PRIMARY) {
            if let Some(dt) = parse_datetime_field(&field.display_value().to_string()) {
                return Some(dt);
            }
        }
    }
    None
}

/// Cameras disagree on separators; normalize to the canonical
/// `YYYY:MM:DD HH:MM:SS` before parsing. A bare date parses to
/// midnight.
fn parse_datetime_field(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s.replace(['-', '/', '\\', '.'], ":");
    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt);
    }
    let date_part = cleaned.split(' ').next()?;
    chrono::NaiveDate::parse_from_str(date_part, "%Y:%m:%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_canonical_and_variant_separators() {
        let expected = NaiveDate::from_ymd_opt(2021, 6, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(parse_datetime_field("2021:06:15 10:30:00"), Some(expected));
        assert_eq!(parse_datetime_field("2021-06-15 10:30:00"), Some(expected));
        assert_eq!(parse_datetime_field("2021/06/15 10:30:00"), Some(expected));
    }

    #[test]
    fn bare_date_becomes_midnight() {
        let expected = NaiveDate::from_ymd_opt(2019, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime_field("2019:01:02"), Some(expected));
    }

    #[test]
    fn rejects_garbage_and_zeroed_fields() {
        assert_eq!(parse_datetime_field("not a date"), None);
        // some firmwares write all zeros instead of omitting the tag
        assert_eq!(parse_datetime_field("0000:00:00 00:00:00"), None);
    }

    #[test]
    fn non_image_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.jpg");
        std::fs::write(&path, b"plain text, no markers").unwrap();
        assert_eq!(date_from_exif(&path), None);
    }
}
