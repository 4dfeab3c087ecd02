use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

struct NamePattern {
    regex: &'static LazyLock<Regex>,
    format: &'static str,
}

// Whitelisted camera/app naming conventions. Anything that needs
// interpretation (two-digit years, DD-MM vs MM-DD) stays out: a wrong
// bucket is worse than the review bucket.
static RE_COMPACT_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20|19|18)\d{2}(0[1-9]|1[0-2])[0-3]\d-\d{6}").unwrap());
static RE_COMPACT_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20|19|18)\d{2}(0[1-9]|1[0-2])[0-3]\d_\d{6}").unwrap());
static RE_DASHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20|19|18)\d{2}-(0[1-9]|1[0-2])-[0-3]\d-\d{2}-\d{2}-\d{2}").unwrap());
static RE_DASHED_COMPACT_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20|19|18)\d{2}-(0[1-9]|1[0-2])-[0-3]\d-\d{6}").unwrap());
static RE_COMPACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20|19|18)\d{2}(0[1-9]|1[0-2])[0-3]\d\d{6}").unwrap());
static RE_UNDERSCORED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20|19|18)\d{2}_(0[1-9]|1[0-2])_[0-3]\d_\d{2}_\d{2}_\d{2}").unwrap());

static PATTERNS: &[NamePattern] = &[
    NamePattern { regex: &RE_COMPACT_DASH, format: "%Y%m%d-%H%M%S" },
    NamePattern { regex: &RE_COMPACT_UNDERSCORE, format: "%Y%m%d_%H%M%S" },
    NamePattern { regex: &RE_DASHED, format: "%Y-%m-%d-%H-%M-%S" },
    NamePattern { regex: &RE_DASHED_COMPACT_TIME, format: "%Y-%m-%d-%H%M%S" },
    NamePattern { regex: &RE_COMPACT, format: "%Y%m%d%H%M%S" },
    NamePattern { regex: &RE_UNDERSCORED, format: "%Y_%m_%d_%H_%M_%S" },
];

/// Read a capture date out of the filename itself, e.g.
/// `IMG_20210615_103000.jpg`. Returns `None` unless the name matches
/// one of the whitelisted conventions and spells a real calendar date.
pub fn date_from_filename(name: &str) -> Option<NaiveDateTime> {
    for pat in PATTERNS {
        if let Some(m) = pat.regex.find(name) {
            if let Ok(dt) = NaiveDateTime::parse_from_str(m.as_str(), pat.format) {
                return Some(dt);
            }
        }
    }
    None
}
