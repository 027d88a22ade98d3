//! Local project tree scanner.
//!
//! The tree is one subdirectory per project key. Within a project directory,
//! a `featured/` (or `thumbnail/`) subdirectory holds the single cover
//! image, and gallery candidates come from `gallery/` when present, else
//! from image files directly in the project directory. Read-only; the
//! reconciler is the only writer.
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;

use crate::error::MigrateError;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    Featured,
    Gallery,
}

/// One qualifying image file discovered under the tree.
#[derive(Debug, Clone)]
pub struct LocalAsset {
    pub path: PathBuf,
    pub project_key: String,
    pub role: AssetRole,
    /// Trimmed contents of the `<basename>.txt` sidecar, when present and
    /// non-empty.
    pub caption: Option<String>,
}

impl LocalAsset {
    fn new(path: PathBuf, project_key: &str, role: AssetRole) -> Self {
        let caption = match role {
            AssetRole::Gallery => read_caption(&path.with_extension("txt")),
            AssetRole::Featured => None,
        };
        Self {
            path,
            project_key: project_key.to_string(),
            role,
            caption,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Basename with the extension stripped; doubles as the slug.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// The remote identifier encoded in the basename by a previous run's
    /// reconciliation, if any.
    pub fn numeric_identity(&self) -> Option<u64> {
        self.stem().parse().ok()
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.path.with_extension("txt")
    }
}

/// All media discovered for one project key.
#[derive(Debug, Clone)]
pub struct ProjectMedia {
    pub key: String,
    pub featured: Option<LocalAsset>,
    /// Listing order; stable across runs because entries are name-sorted.
    pub gallery: Vec<LocalAsset>,
}

fn qualifies(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

fn read_caption(sidecar: &Path) -> Option<String> {
    let text = std::fs::read_to_string(sidecar).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn list_qualifying(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| qualifies(p))
        .collect();
    files.sort();
    Ok(files)
}

fn scan_project(dir: &Path, key: &str) -> Result<ProjectMedia, MigrateError> {
    let discovery = |source| MigrateError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    // Cover image: first qualifying file under featured/, accepting the
    // thumbnail/ spelling as a fallback of the same convention.
    let mut featured = None;
    for cover_dir in ["featured", "thumbnail"] {
        let sub = dir.join(cover_dir);
        if sub.is_dir() {
            featured = list_qualifying(&sub)
                .map_err(discovery)?
                .into_iter()
                .next()
                .map(|p| LocalAsset::new(p, key, AssetRole::Featured));
            break;
        }
    }

    let gallery_dir = dir.join("gallery");
    let scan_dir = if gallery_dir.is_dir() {
        gallery_dir
    } else {
        dir.to_path_buf()
    };
    let gallery = list_qualifying(&scan_dir)
        .map_err(discovery)?
        .into_iter()
        .map(|p| LocalAsset::new(p, key, AssetRole::Gallery))
        .collect();

    Ok(ProjectMedia {
        key: key.to_string(),
        featured,
        gallery,
    })
}

/// Enumerate project directories under the media root. A missing root means
/// no media for any project, not an error; a project whose directory cannot
/// be read is skipped with a warning.
pub fn scan_media_root(root: &Path) -> Result<Vec<ProjectMedia>> {
    if !root.is_dir() {
        warn!(root = %root.display(), "media root missing, continuing without media");
        return Ok(Vec::new());
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .map_err(|source| MigrateError::Discovery {
            path: root.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut projects = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let key = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match scan_project(&dir, &key) {
            Ok(media) => projects.push(media),
            Err(err) => warn!(project = %key, error = %err, "skipping unreadable project"),
        }
    }
    Ok(projects)
}
