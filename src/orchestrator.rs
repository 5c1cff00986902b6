use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::config::WatchSettings;
use crate::rules::RuleSet;
use crate::transform::TransformError;

/// SHA-256 of a file's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{0} disappeared before it could be processed")]
    Vanished(PathBuf),
}

impl ProcessError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ProcessError::Vanished(path.to_path_buf())
        } else {
            ProcessError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// A file that vanished mid-flight is a race, not a fault.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProcessError::Vanished(_))
    }
}

#[derive(Debug)]
pub enum ProcessOutcome {
    Unchanged,
    Rewritten(ContentHash),
    Failed(ProcessError),
}

/// File contents as read at one moment.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub bytes: Vec<u8>,
    pub hash: ContentHash,
}

impl Snapshot {
    pub fn read(path: &Path) -> Result<Self, ProcessError> {
        let bytes = fs::read(path).map_err(|e| ProcessError::io(path, e))?;
        let hash = ContentHash::of(&bytes);
        Ok(Self { bytes, hash })
    }
}

/// Runs the rule pipeline over one file and rewrites it only when the
/// result differs from what is on disk.
#[derive(Debug)]
pub struct Orchestrator {
    rules: RuleSet,
    read_retries: u32,
    retry_delay: Duration,
}

impl Orchestrator {
    pub fn new(rules: RuleSet) -> Self {
        let settings = WatchSettings::default();
        Self {
            rules,
            read_retries: settings.read_retries,
            retry_delay: settings.retry_delay,
        }
    }

    pub fn with_retries(mut self, read_retries: u32, retry_delay: Duration) -> Self {
        self.read_retries = read_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn process(&self, path: &Path) -> ProcessOutcome {
        match Snapshot::read(path) {
            Ok(snapshot) => self.process_snapshot(path, snapshot),
            Err(e) => conclude(path, Err(e)),
        }
    }

    /// Processes contents already read from `path`. If they fail to decode,
    /// the file is re-read a few times in case a writer was still busy.
    pub fn process_snapshot(&self, path: &Path, snapshot: Snapshot) -> ProcessOutcome {
        conclude(path, self.rewrite(path, snapshot))
    }

    fn rewrite(
        &self,
        path: &Path,
        mut snapshot: Snapshot,
    ) -> Result<Option<ContentHash>, ProcessError> {
        let mut attempt = 1;
        let file = loop {
            match codec::decode(&snapshot.bytes) {
                Ok(file) => break file,
                Err(e) if attempt >= self.read_retries => return Err(e.into()),
                Err(e) => {
                    tracing::debug!("retrying {} after decode failure: {}", path.display(), e);
                    attempt += 1;
                    thread::sleep(self.retry_delay);
                    snapshot = Snapshot::read(path)?;
                }
            }
        };

        let pipeline = self.rules.select(path);
        let encoded = codec::encode(&pipeline.apply(file)?)?;
        if encoded == snapshot.bytes {
            return Ok(None);
        }

        write_atomic(path, &encoded).map_err(|e| ProcessError::io(path, e))?;
        Ok(Some(ContentHash::of(&encoded)))
    }
}

/// Logs the result of one processing attempt and turns it into an outcome.
pub(crate) fn conclude(
    path: &Path,
    result: Result<Option<ContentHash>, ProcessError>,
) -> ProcessOutcome {
    match result {
        Ok(Some(hash)) => {
            tracing::info!("processed {}", path.display());
            ProcessOutcome::Rewritten(hash)
        }
        Ok(None) => {
            tracing::debug!("skipped {} (no changes)", path.display());
            ProcessOutcome::Unchanged
        }
        Err(e) if e.is_transient() => {
            tracing::debug!("{}", e);
            ProcessOutcome::Failed(e)
        }
        Err(e) => {
            tracing::warn!("failed to process {}: {}", path.display(), e);
            ProcessOutcome::Failed(e)
        }
    }
}

/// Replaces `path` with `bytes` through a synced temp file in the same
/// directory, so readers see either the old or the new contents.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".midiwatch-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), metadata.permissions())?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
