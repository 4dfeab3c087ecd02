use unicode_normalization::UnicodeNormalization;

/// Localized suffixes the exporter appends to edited copies (lowercase).
const DERIVATIVE_SUFFIXES: &[&str] = &[
    "-edited",      // EN
    "-effects",     // EN
    "-smile",       // EN
    "-mix",         // EN
    "-edytowane",   // PL
    "-bearbeitet",  // DE
    "-bewerkt",     // NL
    "-編集済み",     // JA
    "-modificato",  // IT
    "-modifié",     // FR
    "-ha editado",  // ES
    "-editat",      // CA
];

fn ends_with_suffix(stem: &str, suffix: &str) -> bool {
    stem.len() >= suffix.len()
        && stem.is_char_boundary(stem.len() - suffix.len())
        && stem[stem.len() - suffix.len()..].to_lowercase() == *suffix
}

/// True when the stem (name without extension) marks an
/// export-generated derivative such as `IMG_0001-edited`.
pub fn is_derivative(stem: &str) -> bool {
    let stem: String = stem.nfc().collect();
    DERIVATIVE_SUFFIXES.iter().any(|s| ends_with_suffix(&stem, s))
}

/// Strip the derivative suffix ahead of the extension, yielding the
/// name the unedited original carries. `None` when no suffix matches.
/// The result is NFC-normalized, which is also the form sidecar names
/// arrive in.
pub fn strip_derivative(filename: &str) -> Option<String> {
    let normalized: String = filename.nfc().collect();
    let (stem, ext) = match normalized.rfind('.') {
        Some(pos) if pos > 0 => (&normalized[..pos], &normalized[pos..]),
        _ => (normalized.as_str(), ""),
    };
    for suffix in DERIVATIVE_SUFFIXES {
        if ends_with_suffix(stem, suffix) {
            return Some(format!("{}{}", &stem[..stem.len() - suffix.len()], ext));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_english_suffixes() {
        assert!(is_derivative("IMG_0001-edited"));
        assert!(is_derivative("holiday-effects"));
        assert!(is_derivative("IMG-EDITED"));
        assert!(!is_derivative("IMG_0001"));
        assert!(!is_derivative("smile-face"));
    }

    #[test]
    fn detects_localized_suffixes() {
        assert!(is_derivative("写真-編集済み"));
        assert!(is_derivative("photo-modifié"));
        assert!(is_derivative("foto-ha editado"));
    }

    #[test]
    fn strips_suffix_keeping_extension() {
        assert_eq!(strip_derivative("IMG_0001-edited.jpg").as_deref(), Some("IMG_0001.jpg"));
        assert_eq!(strip_derivative("写真-編集済み.png").as_deref(), Some("写真.png"));
    }

    #[test]
    fn strip_returns_none_without_suffix() {
        assert_eq!(strip_derivative("IMG_0001.jpg"), None);
        assert_eq!(strip_derivative("edited.jpg"), None);
    }
}
