//! Dataset change detection.
//!
//! A single SHA-256 digest is computed over the concatenated contents of the
//! dataset files, ordered by file name so download order does not matter.
//! The digest is compared with the last successfully imported one stored
//! under [`FINGERPRINT_KEY`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use reelsync_common::{Error, Result};
use reelsync_db::pool::{get_conn, DbPool};
use reelsync_db::queries::checkpoints;
use sha2::{Digest, Sha256};

/// Checkpoint key holding the fingerprint of the last imported dataset.
pub const FINGERPRINT_KEY: &str = "imdb_files_hash";

/// Hex SHA-256 over the files' contents, ordered by file name.
pub fn fingerprint_files(paths: &[PathBuf]) -> Result<String> {
    let mut ordered: Vec<&PathBuf> = paths.iter().collect();
    ordered.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1 << 16];
    for path in ordered {
        let file = File::open(path)
            .map_err(|e| Error::file("open", path, e))?;
        let mut reader = BufReader::new(file);
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| Error::file("read", path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

fn sort_key(path: &Path) -> (std::ffi::OsString, PathBuf) {
    (
        path.file_name().map(|n| n.to_os_string()).unwrap_or_default(),
        path.to_path_buf(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// Matches the last import. No diff work is needed.
    Unchanged,
    /// Differs from the last import, or nothing was imported yet.
    Changed,
    /// Comparison bypassed by the caller.
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectOutcome {
    pub fingerprint: String,
    pub previous: Option<String>,
    pub decision: ChangeDecision,
}

impl DetectOutcome {
    pub fn needs_import(&self) -> bool {
        self.decision != ChangeDecision::Unchanged
    }
}

/// Decides whether the bulk import has to run and records the fingerprint
/// once it has succeeded.
pub struct ChangeDetector {
    pool: DbPool,
}

impl ChangeDetector {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fingerprint `files` and compare with the stored checkpoint.
    pub fn detect(&self, files: &[PathBuf], force: bool) -> Result<DetectOutcome> {
        let fingerprint = fingerprint_files(files)?;
        let conn = get_conn(&self.pool)?;
        let previous = checkpoints::get_checkpoint(&conn, FINGERPRINT_KEY)?;

        let decision = if force {
            ChangeDecision::Forced
        } else if previous.as_deref() == Some(fingerprint.as_str()) {
            ChangeDecision::Unchanged
        } else {
            ChangeDecision::Changed
        };

        tracing::info!(
            fingerprint = %fingerprint,
            previous = previous.as_deref().unwrap_or("none"),
            ?decision,
            "Dataset fingerprint computed"
        );

        Ok(DetectOutcome {
            fingerprint,
            previous,
            decision,
        })
    }

    /// Persist the fingerprint. Call only after the whole import succeeded.
    pub fn commit(&self, fingerprint: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        checkpoints::set_checkpoint(&conn, FINGERPRINT_KEY, fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsync_db::pool::init_memory_pool;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn fingerprint_ignores_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.tsv.gz", "alpha");
        let b = write(dir.path(), "b.tsv.gz", "beta");

        let forward = fingerprint_files(&[a.clone(), b.clone()]).unwrap();
        let reverse = fingerprint_files(&[b, a]).unwrap();
        assert_eq!(forward, reverse);
        assert_eq!(forward.len(), 64);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.tsv.gz", "alpha");
        let before = fingerprint_files(&[a.clone()]).unwrap();
        write(dir.path(), "a.tsv.gz", "alpha2");
        assert_ne!(before, fingerprint_files(&[a]).unwrap());
    }

    #[test]
    fn detect_then_commit_then_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![write(dir.path(), "a.tsv.gz", "alpha")];
        let detector = ChangeDetector::new(init_memory_pool().unwrap());

        let first = detector.detect(&files, false).unwrap();
        assert_eq!(first.decision, ChangeDecision::Changed);
        assert!(first.previous.is_none());

        // Not committed yet: still changed.
        assert!(detector.detect(&files, false).unwrap().needs_import());

        detector.commit(&first.fingerprint).unwrap();
        let second = detector.detect(&files, false).unwrap();
        assert_eq!(second.decision, ChangeDecision::Unchanged);
        assert!(!second.needs_import());

        let forced = detector.detect(&files, true).unwrap();
        assert_eq!(forced.decision, ChangeDecision::Forced);
        assert!(forced.needs_import());
    }
}
