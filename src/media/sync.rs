//! Idempotent media synchronization.
//!
//! For every project the cover asset is resolved first, then gallery assets
//! in listing order, sequentially: caption alignment and pacing both depend
//! on the order, so there is no fan-out. Each asset is resolved against the
//! remote store, uploaded only when absent, and reconciled on disk so the
//! next run resolves it by identifier.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ExistenceStrategy;
use crate::content_api::MediaStore;
use crate::error::MigrateError;
use crate::media::index::{sha256_hex, UploadIndex};
use crate::media::resolve::{ExistenceResolver, Resolution};
use crate::media::scanner::{scan_media_root, LocalAsset};
use crate::pacing::Pacer;

/// Resolved media for one project key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaMapEntry {
    /// Gallery identifiers in listing order, unique within the project.
    pub gallery: Vec<u64>,
    pub captions: BTreeMap<u64, String>,
    pub featured: Option<u64>,
    pub thumbnail: Option<u64>,
}

impl MediaMapEntry {
    pub fn is_empty(&self) -> bool {
        self.gallery.is_empty() && self.featured.is_none() && self.thumbnail.is_none()
    }
}

/// Per-project lookup built once per run, pure lookup afterwards.
#[derive(Debug, Default)]
pub struct MediaMap {
    entries: IndexMap<String, MediaMapEntry>,
}

impl MediaMap {
    pub fn insert(&mut self, key: String, entry: MediaMapEntry) {
        self.entries.insert(key, entry);
    }

    /// Total lookup: a key without media yields an empty entry, never an
    /// error.
    pub fn entry_for(&self, key: &str) -> MediaMapEntry {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".into())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MediaSyncSummary {
    pub projects: usize,
    pub confirmed_existing: usize,
    pub uploaded: usize,
    pub upload_failures: usize,
    pub rename_failures: usize,
}

pub struct MediaSync<'a, S: MediaStore> {
    store: &'a S,
    pacer: &'a Pacer,
    strategy: ExistenceStrategy,
}

impl<'a, S: MediaStore> MediaSync<'a, S> {
    pub fn new(store: &'a S, pacer: &'a Pacer, strategy: ExistenceStrategy) -> Self {
        Self {
            store,
            pacer,
            strategy,
        }
    }

    /// Walk the tree and produce the media map. Every discovered project
    /// appears in the map, with an empty entry when nothing resolved.
    pub async fn build_media_map(
        &self,
        media_root: &Path,
    ) -> Result<(MediaMap, MediaSyncSummary)> {
        let projects = scan_media_root(media_root)?;
        let mut index = UploadIndex::open(media_root);
        let mut map = MediaMap::default();
        let mut summary = MediaSyncSummary::default();

        for project in &projects {
            summary.projects += 1;
            let mut entry = MediaMapEntry::default();

            if let Some(featured) = &project.featured {
                if let Some(id) = self.sync_asset(featured, &mut index, &mut summary).await {
                    entry.featured = Some(id);
                    entry.thumbnail = Some(id);
                }
            }

            for asset in &project.gallery {
                let Some(id) = self.sync_asset(asset, &mut index, &mut summary).await else {
                    continue;
                };
                if entry.gallery.contains(&id) {
                    warn!(project = %project.key, id, "asset resolved to an identifier already in the gallery, keeping first");
                    continue;
                }
                entry.gallery.push(id);
                if let Some(caption) = &asset.caption {
                    entry.captions.insert(id, caption.clone());
                }
            }

            info!(
                project = %project.key,
                gallery = entry.gallery.len(),
                featured = entry.featured.is_some(),
                "project media synchronized"
            );
            map.insert(project.key.clone(), entry);
        }

        Ok((map, summary))
    }

    /// Resolve one asset, uploading and reconciling when absent. Returns the
    /// remote identifier, or None when the asset had to be skipped.
    async fn sync_asset(
        &self,
        asset: &LocalAsset,
        index: &mut UploadIndex,
        summary: &mut MediaSyncSummary,
    ) -> Option<u64> {
        let file = asset.file_name();

        let bytes = match tokio::fs::read(&asset.path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(file = %file, project = %asset.project_key, error = %err, "cannot read asset, skipping");
                summary.upload_failures += 1;
                return None;
            }
        };
        let digest = sha256_hex(&bytes);

        self.pacer.before_lookup().await;
        let resolver = ExistenceResolver::new(self.store, self.strategy);
        if let Resolution::Present(id) = resolver.resolve(asset, index.lookup(&digest)).await {
            info!(file = %file, id, "already exists remotely, skipping upload");
            summary.confirmed_existing += 1;
            return Some(id);
        }

        self.pacer.before_upload().await;
        info!(file = %file, project = %asset.project_key, "uploading");
        let id = match self.store.upload_media(bytes, &file).await {
            Ok(id) => id,
            Err(err) => {
                let failure = MigrateError::Upload {
                    file: file.clone(),
                    reason: err.to_string(),
                };
                error!(project = %asset.project_key, error = %failure, "asset skipped");
                summary.upload_failures += 1;
                return None;
            }
        };
        summary.uploaded += 1;

        // The index entry lands before the rename so a crash between the two
        // still prevents a duplicate upload next run.
        if let Err(err) = index.record(digest, id) {
            warn!(file = %file, error = %err, "upload index write failed");
        }
        match reconcile_filename(asset, id) {
            Ok(target) => {
                info!(file = %file, id, renamed = %target.display(), "uploaded and reconciled");
            }
            Err(err) => {
                warn!(file = %file, id, error = %err, "rename failed; next run falls back to the upload index");
                summary.rename_failures += 1;
            }
        }
        Some(id)
    }
}

/// Rename the uploaded file so its basename encodes the remote identifier;
/// the filename is the cache the next run's scanner reads. The caption
/// sidecar moves with its image so the pairing survives.
pub fn reconcile_filename(asset: &LocalAsset, id: u64) -> Result<PathBuf, MigrateError> {
    let dir = asset.path.parent().unwrap_or_else(|| Path::new("."));
    let ext = asset.extension();
    let target = if ext.is_empty() {
        dir.join(id.to_string())
    } else {
        dir.join(format!("{id}.{ext}"))
    };

    std::fs::rename(&asset.path, &target).map_err(|source| MigrateError::Rename {
        from: asset.path.clone(),
        to: target.clone(),
        source,
    })?;

    let sidecar = asset.sidecar_path();
    if sidecar.is_file() {
        let caption_target = dir.join(format!("{id}.txt"));
        if let Err(err) = std::fs::rename(&sidecar, &caption_target) {
            warn!(sidecar = %sidecar.display(), error = %err, "caption sidecar rename failed");
        }
    }

    Ok(target)
}
