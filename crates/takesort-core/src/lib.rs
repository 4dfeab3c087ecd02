pub mod date;
pub mod error;
pub mod extract;
pub mod extras;
pub mod identity;
pub mod index;
pub mod media;
pub mod mover;
pub mod place;
pub mod scan;
pub mod sidecar;

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

pub use error::ImportError;
pub use extract::{ExtractReport, EXTRACT_DIR};
pub use index::{ImportIndex, IndexEntry, INDEX_FILENAME};
pub use media::{DateAccuracy, MediaItem};
pub use place::UNDATED_DIR;
pub use sidecar::SidecarMatch;

/// Options for an import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Staging area holding loose media, sidecars and/or export
    /// archives.
    pub source: PathBuf,
    /// Library root the dated tree is built under.
    pub library: PathBuf,
    /// Leave `-edited` and friends out of the import.
    pub skip_extras: bool,
    /// Do not read dates out of filenames.
    pub no_guess: bool,
    /// Keep archives on disk after successful extraction.
    pub keep_archives: bool,
}

/// What an import run did.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Media files considered.
    pub candidates: u64,
    /// Files moved into the library this run.
    pub imported: u64,
    /// Subset of `imported` that landed in the review bucket.
    pub undated: u64,
    /// Files whose content was already in the library.
    pub already_present: u64,
    /// Files that could not be imported; each has a warning.
    pub failed: u64,
    /// Archives unpacked before the scan.
    pub archives_extracted: u64,
    /// True when Ctrl-C stopped the run; counts cover the work done up
    /// to that point.
    pub cancelled: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReindexReport {
    /// Media files recorded in the rebuilt index.
    pub indexed: u64,
    pub warnings: Vec<String>,
}

/// Progress callback: (stage, current, total, message). A total of
/// zero means the stage length is unknown.
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str);

/// Throttled progress reporter; emits at most every 200ms, always on
/// completion. Reporting happens from the pipeline thread only.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: Cell<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: Cell::new(Instant::now() - Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = total > 0 && current + 1 >= total;
        if !is_done {
            if self.last_emit.get().elapsed().as_millis() < 200 {
                return;
            }
            self.last_emit.set(Instant::now());
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Cooperative cancellation flag, shared with a Ctrl-C handler.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Ok to continue, `ImportError::Cancelled` otherwise.
    pub fn check(&self) -> Result<(), ImportError> {
        if self.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        Ok(())
    }
}

enum FileOutcome {
    Imported { undated: bool },
    AlreadyPresent,
}

/// Run a full import: unpack archives, scan the source, and file each
/// media item into the library one at a time.
///
/// Per-file trouble is counted and reported in the result; only
/// whole-batch preconditions (unreadable source, unwritable library
/// root, corrupt index) abort with an error. Ctrl-C stops between
/// files and hands back the partial counts with `cancelled` set, index
/// flushed. Either way every move already made is on disk and indexed.
pub fn run_import(
    options: &ImportOptions,
    cancel: Option<&CancelFlag>,
    progress: &ProgressCallback,
) -> anyhow::Result<ImportReport> {
    let tp = ThrottledProgress::new(progress);
    if cancel.is_some_and(|c| c.is_cancelled()) {
        return Ok(ImportReport {
            cancelled: true,
            ..Default::default()
        });
    }

    fs::create_dir_all(&options.library)
        .with_context(|| format!("output root unwritable: {}", options.library.display()))?;
    guard_disjoint_roots(&options.source, &options.library)?;

    let extraction = extract::extract_archives(&options.source, options.keep_archives, &tp, cancel)?;
    let mut report = ImportReport {
        archives_extracted: extraction.archives_extracted,
        cancelled: extraction.cancelled,
        warnings: extraction.warnings,
        ..Default::default()
    };
    if report.cancelled {
        return Ok(report);
    }

    let index = match index::ImportIndex::load(&options.library)? {
        Some(index) => index,
        None => {
            let fresh = index::ImportIndex::new();
            fresh
                .save(&options.library)
                .with_context(|| format!("output root unwritable: {}", options.library.display()))?;
            fresh
        }
    };
    let mut saver = index::IndexSaver::new(index, options.library.clone());

    let mut walk = scan::MediaWalk::new(&options.source, options.skip_extras)?;
    while let Some(mut item) = walk.next_item() {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            report.cancelled = true;
            break;
        }
        report.candidates += 1;
        tp.report("import", report.candidates - 1, 0, &item.filename);

        match import_one(&mut item, options, &mut saver, &mut report.warnings) {
            Ok(FileOutcome::Imported { undated }) => {
                report.imported += 1;
                if undated {
                    report.undated += 1;
                }
            }
            Ok(FileOutcome::AlreadyPresent) => report.already_present += 1,
            Err(err) => {
                report.failed += 1;
                report
                    .warnings
                    .push(format!("{}: {err:#}", item.path.display()));
            }
        }
    }
    report.warnings.extend(walk.warnings.drain(..));

    if let Err(err) = saver.finish() {
        report.warnings.push(err.to_string());
    }
    let closing = if report.cancelled { "interrupted" } else { "done" };
    tp.report("import", report.candidates, report.candidates, closing);
    Ok(report)
}

/// Import a single item. Returns an error only when THIS file failed;
/// softer trouble (sidecar issues, index write hiccups) lands in
/// `warnings` and the file still counts.
fn import_one(
    item: &mut MediaItem,
    options: &ImportOptions,
    saver: &mut index::IndexSaver,
    warnings: &mut Vec<String>,
) -> anyhow::Result<FileOutcome> {
    let digest = identity::file_digest(&item.path)
        .with_context(|| format!("hashing {}", item.path.display()))?;

    // Identity already imported: drop the duplicate source, move nothing.
    if let Some(entry) = saver.index().get(&digest) {
        let dest = options.library.join(&entry.path);
        if dest.exists() {
            warnings.extend(mover::remove_duplicate_source(item));
        } else {
            warnings.push(format!(
                "{} is indexed at missing {}; source kept, refresh with --reindex",
                item.path.display(),
                dest.display()
            ));
        }
        return Ok(FileOutcome::AlreadyPresent);
    }

    let resolution = date::resolve_capture_date(item, !options.no_guess);
    warnings.extend(resolution.warnings);
    if let Some(resolved) = resolution.resolved {
        item.date = Some(resolved.date);
        item.date_accuracy = Some(resolved.accuracy);
    }

    match place::plan_destination(&options.library, item, &digest)? {
        place::Placement::AlreadyPresent(dest) => {
            // On disk but not in the index: a previous run died between
            // the move and the index write. Heal the entry, then treat
            // the source as the duplicate it is.
            record_entry(saver, digest, &options.library, &dest, item.size, warnings);
            warnings.extend(mover::remove_duplicate_source(item));
            Ok(FileOutcome::AlreadyPresent)
        }
        place::Placement::New(dest) => {
            let undated = item.date.is_none();
            warnings.extend(mover::move_into_library(item, &dest)?);
            record_entry(saver, digest, &options.library, &dest, item.size, warnings);
            Ok(FileOutcome::Imported { undated })
        }
    }
}

/// Index writes never fail the file whose move already happened; a
/// later run or `--reindex` recovers the entry.
fn record_entry(
    saver: &mut index::IndexSaver,
    digest: String,
    library: &Path,
    dest: &Path,
    size: u64,
    warnings: &mut Vec<String>,
) {
    let relative = dest.strip_prefix(library).unwrap_or(dest).to_path_buf();
    if let Err(err) = saver.record(digest, relative, size) {
        warnings.push(err.to_string());
    }
}

/// Rebuild the index from the library tree and persist it.
pub fn run_reindex(library: &Path, progress: &ProgressCallback) -> anyhow::Result<ReindexReport> {
    let tp = ThrottledProgress::new(progress);
    let (index, warnings) = index::rebuild(library, &tp)?;
    index.save(library).context("writing rebuilt index")?;
    tp.report("reindex", index.len() as u64, index.len() as u64, "done");
    Ok(ReindexReport {
        indexed: index.len() as u64,
        warnings,
    })
}

/// Importing the library into itself would make the scan eat its own
/// output; refuse up front.
fn guard_disjoint_roots(source: &Path, library: &Path) -> anyhow::Result<()> {
    let source = fs::canonicalize(source).map_err(|err| ImportError::SourceUnavailable {
        path: source.to_path_buf(),
        source: err,
    })?;
    let library = fs::canonicalize(library)
        .with_context(|| format!("output root unwritable: {}", library.display()))?;
    if library.starts_with(&source) {
        anyhow::bail!(
            "output {} lies inside source {}",
            library.display(),
            source.display()
        );
    }
    Ok(())
}
