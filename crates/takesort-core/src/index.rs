use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::ImportError;
use crate::identity;
use crate::scan;
use crate::ThrottledProgress;

/// Current index file format version
const INDEX_VERSION: u32 = 1;

/// Index filename, kept in the library root.
pub const INDEX_FILENAME: &str = ".takesort-index.json";
const INDEX_TMP_FILENAME: &str = ".takesort-index.tmp";

/// One imported identity: where its bytes live now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Destination path relative to the library root.
    pub path: PathBuf,
    pub size: u64,
    pub imported_at: DateTime<Utc>,
}

/// Maps content digests to their place in the library. This is what
/// makes re-running an import against the same library additive
/// instead of duplicating: identity is the file's bytes, never its
/// name or mtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportIndex {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    /// SHA-256 hex digest -> entry, one per identity.
    pub entries: BTreeMap<String, IndexEntry>,
}

impl Default for ImportIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportIndex {
    pub fn new() -> Self {
        Self {
            version: INDEX_VERSION,
            updated_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the index from the library root. `Ok(None)` when no index
    /// exists yet. An index that exists but cannot be parsed is an
    /// error rather than silently starting over; `--reindex` rebuilds
    /// it from the tree.
    pub fn load(library_root: &Path) -> anyhow::Result<Option<Self>> {
        let path = library_root.join(INDEX_FILENAME);
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let index: ImportIndex = serde_json::from_reader(BufReader::new(file))
            .with_context(|| {
                format!(
                    "index {} is unreadable, rebuild it with --reindex",
                    path.display()
                )
            })?;
        if index.version != INDEX_VERSION {
            anyhow::bail!(
                "index {} has version {} (expected {INDEX_VERSION}), rebuild it with --reindex",
                path.display(),
                index.version
            );
        }
        Ok(Some(index))
    }

    /// Write atomically: temp file first, then rename over the old
    /// index so a crash never leaves a torn file behind.
    pub fn save(&self, library_root: &Path) -> anyhow::Result<()> {
        let path = library_root.join(INDEX_FILENAME);
        let temp_path = library_root.join(INDEX_TMP_FILENAME);

        let file = File::create(&temp_path)
            .with_context(|| format!("creating {}", temp_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;

        fs::rename(&temp_path, &path)
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, digest: &str) -> Option<&IndexEntry> {
        self.entries.get(digest)
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.entries.contains_key(digest)
    }

    /// Record an identity at its library-relative destination. A
    /// digest recorded twice keeps the latest path.
    pub fn record(&mut self, digest: String, path: PathBuf, size: u64) {
        self.entries.insert(
            digest,
            IndexEntry {
                path,
                size,
                imported_at: Utc::now(),
            },
        );
        self.updated_at = Utc::now();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Wraps the index with throttled persistence so a crash mid-run
/// loses at most a few seconds of entries, without paying a full
/// rewrite per file.
pub struct IndexSaver {
    index: ImportIndex,
    library_root: PathBuf,
    last_save: Instant,
    entries_since_save: usize,
    dirty: bool,
    min_interval: Duration,
    min_entries: usize,
}

impl IndexSaver {
    pub fn new(index: ImportIndex, library_root: PathBuf) -> Self {
        Self {
            index,
            library_root,
            last_save: Instant::now(),
            entries_since_save: 0,
            dirty: false,
            min_interval: Duration::from_secs(5),
            min_entries: 100,
        }
    }

    pub fn index(&self) -> &ImportIndex {
        &self.index
    }

    /// Record an entry and persist when enough time or entries have
    /// accumulated.
    pub fn record(&mut self, digest: String, path: PathBuf, size: u64) -> Result<(), ImportError> {
        self.index.record(digest, path, size);
        self.entries_since_save += 1;
        self.dirty = true;
        if self.last_save.elapsed() >= self.min_interval
            || self.entries_since_save >= self.min_entries
        {
            self.save_now()?;
        }
        Ok(())
    }

    /// Persist pending entries, if any. A run that recorded nothing
    /// leaves the index file untouched.
    pub fn finish(&mut self) -> Result<(), ImportError> {
        if self.dirty {
            self.save_now()?;
        }
        Ok(())
    }

    fn save_now(&mut self) -> Result<(), ImportError> {
        self.index
            .save(&self.library_root)
            .map_err(|e| ImportError::IndexWriteFailure {
                detail: format!("{e:#}"),
            })?;
        self.last_save = Instant::now();
        self.entries_since_save = 0;
        self.dirty = false;
        Ok(())
    }
}

/// Rebuild the index by walking the library tree and digesting every
/// media file in it. Sidecars and the index file itself are not
/// indexed; anything the importer places, dot-named media included,
/// is. Unreadable files are reported and skipped.
pub fn rebuild(
    library_root: &Path,
    progress: &ThrottledProgress<'_>,
) -> anyhow::Result<(ImportIndex, Vec<String>)> {
    let meta = fs::metadata(library_root).map_err(|source| ImportError::SourceUnavailable {
        path: library_root.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(ImportError::SourceUnavailable {
            path: library_root.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        }
        .into());
    }

    let mut index = ImportIndex::new();
    let mut warnings = Vec::new();
    let mut seen: u64 = 0;
    for entry in WalkDir::new(library_root).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warnings.push(format!("skipping unreadable entry: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            warnings.push(format!(
                "skipping non-UTF-8 filename: {}",
                entry.path().display()
            ));
            continue;
        };
        if name == INDEX_FILENAME || name == INDEX_TMP_FILENAME {
            continue;
        }
        if !scan::is_media_filename(name) {
            continue;
        }

        progress.report("reindex", seen, 0, name);
        seen += 1;

        let path = entry.path();
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                warnings.push(format!("skipping {}: {err}", path.display()));
                continue;
            }
        };
        let digest = match identity::file_digest(path) {
            Ok(digest) => digest,
            Err(err) => {
                warnings.push(format!("skipping {}: {err}", path.display()));
                continue;
            }
        };
        let relative = path.strip_prefix(library_root).unwrap_or(path).to_path_buf();
        index.record(digest, relative, size);
    }

    Ok((index, warnings))
}
