//! Directory-backed store: one JSON file per record.
//!
//! Layout: `<root>/<alg>/<hex digest>.json`. A record is written to a private
//! temp file and then hard-linked into place, which fails if the target
//! exists. Readers never observe a partially written record and the first
//! writer of an identifier wins.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use kgen_canonical::{Cid, DigestAlg};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::{AttestationStore, PutOutcome, StoredRecord};

const RECORD_EXTENSION: &str = "json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File-system store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) a store at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `cid`.
    pub fn record_path(&self, cid: &Cid) -> PathBuf {
        self.root
            .join(cid.alg.as_str())
            .join(format!("{}.{}", cid.digest, RECORD_EXTENSION))
    }

    fn temp_path(&self, dir: &Path) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        dir.join(format!(".{}-{}.tmp", std::process::id(), n))
    }
}

impl AttestationStore for FileStore {
    fn put(&self, cid: &Cid, record: &StoredRecord) -> Result<PutOutcome, StoreError> {
        let target = self.record_path(cid);
        if target.exists() {
            return Ok(PutOutcome::AlreadyPresent);
        }
        let dir = self.root.join(cid.alg.as_str());
        fs::create_dir_all(&dir)?;

        let tmp = self.temp_path(&dir);
        let bytes = serde_json::to_vec(record)?;
        let written = (|| -> io::Result<()> {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()
        })();
        let linked = written.and_then(|_| fs::hard_link(&tmp, &target));
        let _ = fs::remove_file(&tmp);

        match linked {
            Ok(()) => {
                debug!(cid = %cid, "stored record");
                Ok(PutOutcome::Inserted)
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(PutOutcome::AlreadyPresent),
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, cid: &Cid) -> Result<StoredRecord, StoreError> {
        let bytes = match fs::read(self.record_path(cid)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(cid.clone()))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn list(&self) -> Result<Vec<Cid>, StoreError> {
        let mut cids = Vec::new();
        for alg in [DigestAlg::Sha256, DigestAlg::Sha512] {
            let dir = self.root.join(alg.as_str());
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match Cid::new(alg, stem) {
                    Ok(cid) => cids.push(cid),
                    Err(err) => warn!(path = %path.display(), error = %err, "skipping foreign file"),
                }
            }
        }
        cids.sort();
        Ok(cids)
    }
}
