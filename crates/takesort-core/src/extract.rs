use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use encoding_rs::SHIFT_JIS;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::ImportError;
use crate::scan;
use crate::{CancelFlag, ThrottledProgress};

/// Extraction staging area under the source root. Extracted trees are
/// scanned by the same walk as loose files.
pub const EXTRACT_DIR: &str = ".extracted";

#[derive(Debug, Default)]
pub struct ExtractReport {
    pub archives_found: u64,
    pub archives_extracted: u64,
    pub archives_failed: u64,
    pub entries_written: u64,
    /// True when Ctrl-C cut the extraction short; counts and warnings
    /// cover the work done up to that point.
    pub cancelled: bool,
    pub warnings: Vec<String>,
}

/// Unpack every `.zip` sitting in the source root into its own
/// directory under `.extracted/`, keeping only media and sidecar
/// entries. Already-extracted entries are skipped, so an interrupted
/// run picks up where it stopped. A fully extracted archive is
/// deleted unless `keep_archives` is set; a broken archive is
/// reported and left in place. Cancellation stops between entries and
/// comes back as a partial report, the half-done archive kept for the
/// next run to resume.
pub fn extract_archives(
    source_dir: &Path,
    keep_archives: bool,
    progress: &ThrottledProgress<'_>,
    cancel: Option<&CancelFlag>,
) -> anyhow::Result<ExtractReport> {
    let mut report = ExtractReport::default();
    let archives = list_archives(source_dir)?;
    report.archives_found = archives.len() as u64;
    if archives.is_empty() {
        return Ok(report);
    }

    let extract_root = source_dir.join(EXTRACT_DIR);
    for archive_path in archives {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            report.cancelled = true;
            break;
        }
        let out_dir = extract_root.join(extraction_dir_name(&archive_path));
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;

        match extract_archive(
            &archive_path,
            &out_dir,
            progress,
            cancel,
            &mut report.entries_written,
            &mut report.warnings,
        ) {
            Ok(()) => {
                if dir_has_files(&out_dir) {
                    report.archives_extracted += 1;
                    if !keep_archives {
                        if let Err(err) = fs::remove_file(&archive_path) {
                            report.warnings.push(format!(
                                "could not remove {}: {err}",
                                archive_path.display()
                            ));
                        }
                    }
                } else {
                    report.archives_failed += 1;
                    report.warnings.push(format!(
                        "{}: no media or sidecars inside",
                        archive_path.display()
                    ));
                }
            }
            Err(err) => {
                if matches!(err.downcast_ref::<ImportError>(), Some(ImportError::Cancelled)) {
                    report.cancelled = true;
                    break;
                }
                report.archives_failed += 1;
                report
                    .warnings
                    .push(format!("{}: {err:#}", archive_path.display()));
            }
        }
    }
    Ok(report)
}

/// Top-level `.zip` files in name order. The source root being
/// unreadable is a batch precondition, not a per-archive problem.
fn list_archives(source_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(source_dir).map_err(|source| ImportError::SourceUnavailable {
        path: source_dir.to_path_buf(),
        source,
    })?;
    let mut archives = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ImportError::SourceUnavailable {
            path: source_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
        {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

/// `takeout-001.zip` lands in `extract_takeout-001_zip`, stable across
/// runs so interrupted extractions resume into the same place.
fn extraction_dir_name(archive_path: &Path) -> String {
    let name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("archive");
    format!("extract_{}", name.replace('.', "_"))
}

fn extract_archive(
    archive_path: &Path,
    out_dir: &Path,
    progress: &ThrottledProgress<'_>,
    cancel: Option<&CancelFlag>,
    written: &mut u64,
    warnings: &mut Vec<String>,
) -> anyhow::Result<()> {
    let archive_name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("archive");
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let total = archive.len() as u64;

    for i in 0..archive.len() {
        if let Some(cancel) = cancel {
            cancel.check()?;
        }
        progress.report("extract", i as u64, total, archive_name);

        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let entry_name = decode_entry_name(entry.name_raw());
        let filename = Path::new(&entry_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        if filename.is_empty() {
            continue;
        }
        let is_sidecar = filename.to_lowercase().ends_with(".json");
        if !is_sidecar && !scan::is_media_filename(&filename) {
            continue;
        }
        let Some(relative) = sanitized_relative(&entry_name) else {
            warnings.push(format!(
                "{archive_name}: refusing entry that escapes the extraction dir: {entry_name}"
            ));
            continue;
        };
        let target = out_dir.join(relative);
        if target.exists() {
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(
            File::create(&target).with_context(|| format!("creating {}", target.display()))?,
        );
        io::copy(&mut entry, &mut writer)?;
        writer.flush()?;
        *written += 1;
    }
    Ok(())
}

/// Decode an entry name, trying UTF-8 first, then Shift_JIS (common
/// in archives packed on Japanese systems), then lossy UTF-8.
fn decode_entry_name(raw: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_string();
    }
    let (decoded, _, had_errors) = SHIFT_JIS.decode(raw);
    if !had_errors {
        return decoded.into_owned();
    }
    String::from_utf8_lossy(raw).into_owned()
}

/// Rebuild an entry path from its components, refusing anything that
/// would land outside the extraction directory.
fn sanitized_relative(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn dir_has_files(dir: &Path) -> bool {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .flatten()
        .any(|entry| entry.file_type().is_file())
}
