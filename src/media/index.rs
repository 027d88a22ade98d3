//! Content-addressed record of completed uploads.
//!
//! The renamed filename is still the scanner's fast path, but the index is
//! the durable record: it is written after every successful upload, before
//! the rename, so a failed rename no longer costs a duplicate upload on the
//! next run. Keyed by SHA-256 of the file contents, so it survives renames
//! and moves within the tree.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::warn;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug)]
pub struct UploadIndex {
    path: PathBuf,
    entries: BTreeMap<String, u64>,
}

impl UploadIndex {
    pub const FILE_NAME: &'static str = ".upload-index.json";

    /// Load the index beside the media root, or start empty. A corrupt index
    /// only costs extra existence lookups, so it is replaced, not fatal.
    pub fn open(media_root: &Path) -> Self {
        let path = media_root.join(Self::FILE_NAME);
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(index = %path.display(), error = %err, "unreadable upload index, starting fresh");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    pub fn lookup(&self, digest: &str) -> Option<u64> {
        self.entries.get(digest).copied()
    }

    /// Insert and persist immediately; the index must survive a crash
    /// between upload and rename.
    pub fn record(&mut self, digest: String, id: u64) -> Result<()> {
        self.entries.insert(digest, id);
        let json = serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".into());
        std::fs::write(&self.path, json)
            .with_context(|| format!("cannot write upload index {}", self.path.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
