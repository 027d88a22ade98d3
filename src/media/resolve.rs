//! Remote existence resolution for local assets.
//!
//! Two interchangeable strategies, selected once per run: identifier lookup
//! for basenames that parse as integers, slug lookup on the
//! extension-stripped basename. A numeric basename is the reconciler's own
//! marker, so it always resolves by identifier first regardless of the
//! configured strategy; the strategy governs non-numeric basenames only.
//!
//! Resolution fails open: any transport or parse error counts as absence,
//! never aborts the run. The caller then uploads, and a future pass catches
//! any duplicate.
use tracing::warn;

use crate::config::ExistenceStrategy;
use crate::content_api::MediaStore;
use crate::error::MigrateError;
use crate::media::scanner::LocalAsset;

/// Outcome of resolving one asset against the remote store. The third
/// state, uploaded-this-run, is the sync loop's outcome after `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Present(u64),
    Absent,
}

pub struct ExistenceResolver<'a, S: MediaStore> {
    store: &'a S,
    strategy: ExistenceStrategy,
}

impl<'a, S: MediaStore> ExistenceResolver<'a, S> {
    pub fn new(store: &'a S, strategy: ExistenceStrategy) -> Self {
        Self { store, strategy }
    }

    async fn identifier_present(&self, id: u64, file: &str, origin: &str) -> bool {
        match self.store.media_exists(id).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(file, id, origin, "identifier not found remotely, re-uploading");
                false
            }
            Err(err) => {
                let failure = MigrateError::Resolution {
                    file: file.to_string(),
                    reason: err.to_string(),
                };
                warn!(id, origin, error = %failure, "treating as absent");
                false
            }
        }
    }

    /// Decide whether `asset` already exists remotely. `index_hint` is the
    /// upload-index candidate for this content, verified remotely exactly
    /// like a numeric basename.
    pub async fn resolve(&self, asset: &LocalAsset, index_hint: Option<u64>) -> Resolution {
        let file = asset.file_name();

        let numeric = asset.numeric_identity();
        if let Some(id) = numeric {
            if self.identifier_present(id, &file, "filename").await {
                return Resolution::Present(id);
            }
        }

        if let Some(id) = index_hint.filter(|hint| Some(*hint) != numeric) {
            if self.identifier_present(id, &file, "upload-index").await {
                return Resolution::Present(id);
            }
        }

        if self.strategy == ExistenceStrategy::BySlug && numeric.is_none() {
            match self.store.media_by_slug(&asset.stem()).await {
                Ok(Some(remote)) => return Resolution::Present(remote.id),
                Ok(None) => {}
                Err(err) => {
                    let failure = MigrateError::Resolution {
                        file: file.clone(),
                        reason: err.to_string(),
                    };
                    warn!(error = %failure, "slug lookup failed, treating as absent");
                }
            }
        }

        Resolution::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_api::{ApiError, RemoteAssetRef};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::media::scanner::AssetRole;

    #[derive(Default)]
    struct FakeStore {
        present: HashSet<u64>,
        slugs: HashMap<String, u64>,
        failing: bool,
        slug_calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaStore for FakeStore {
        async fn media_exists(&self, id: u64) -> Result<bool, ApiError> {
            if self.failing {
                return Err(ApiError::Other("boom".into()));
            }
            Ok(self.present.contains(&id))
        }

        async fn media_by_slug(&self, slug: &str) -> Result<Option<RemoteAssetRef>, ApiError> {
            self.slug_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(ApiError::Other("boom".into()));
            }
            Ok(self.slugs.get(slug).map(|id| RemoteAssetRef {
                id: *id,
                slug: slug.to_string(),
            }))
        }

        async fn upload_media(&self, _bytes: Vec<u8>, _name: &str) -> Result<u64, ApiError> {
            unreachable!("resolver never uploads")
        }
    }

    fn asset(name: &str) -> LocalAsset {
        LocalAsset {
            path: PathBuf::from(format!("media/acme/{name}")),
            project_key: "acme".into(),
            role: AssetRole::Gallery,
            caption: None,
        }
    }

    #[tokio::test]
    async fn numeric_basename_present_skips_upload_path() {
        let store = FakeStore {
            present: [123].into(),
            ..Default::default()
        };
        let resolver = ExistenceResolver::new(&store, ExistenceStrategy::ById);
        assert_eq!(
            resolver.resolve(&asset("123.jpg"), None).await,
            Resolution::Present(123)
        );
    }

    #[tokio::test]
    async fn stale_numeric_basename_is_absent() {
        let store = FakeStore::default();
        let resolver = ExistenceResolver::new(&store, ExistenceStrategy::ById);
        assert_eq!(
            resolver.resolve(&asset("123.jpg"), None).await,
            Resolution::Absent
        );
    }

    #[tokio::test]
    async fn transport_errors_fail_open_to_absent() {
        let store = FakeStore {
            failing: true,
            ..Default::default()
        };
        let resolver = ExistenceResolver::new(&store, ExistenceStrategy::BySlug);
        assert_eq!(
            resolver.resolve(&asset("photo.png"), Some(7)).await,
            Resolution::Absent
        );
    }

    #[tokio::test]
    async fn slug_strategy_resolves_non_numeric_basenames() {
        let store = FakeStore {
            slugs: [("photo".to_string(), 42)].into(),
            ..Default::default()
        };
        let resolver = ExistenceResolver::new(&store, ExistenceStrategy::BySlug);
        assert_eq!(
            resolver.resolve(&asset("photo.png"), None).await,
            Resolution::Present(42)
        );
    }

    #[tokio::test]
    async fn identifier_takes_precedence_over_configured_slug_strategy() {
        let store = FakeStore {
            present: [123].into(),
            slugs: [("123".to_string(), 9)].into(),
            ..Default::default()
        };
        let resolver = ExistenceResolver::new(&store, ExistenceStrategy::BySlug);
        assert_eq!(
            resolver.resolve(&asset("123.jpg"), None).await,
            Resolution::Present(123)
        );
        assert_eq!(store.slug_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn index_hint_is_verified_remotely() {
        let store = FakeStore {
            present: [77].into(),
            ..Default::default()
        };
        let resolver = ExistenceResolver::new(&store, ExistenceStrategy::ById);
        assert_eq!(
            resolver.resolve(&asset("photo.png"), Some(77)).await,
            Resolution::Present(77)
        );
    }

    #[tokio::test]
    async fn stale_index_hint_falls_through_to_absent() {
        let store = FakeStore::default();
        let resolver = ExistenceResolver::new(&store, ExistenceStrategy::ById);
        assert_eq!(
            resolver.resolve(&asset("photo.png"), Some(77)).await,
            Resolution::Absent
        );
    }
}
