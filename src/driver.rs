//! Sequential record submission with per-record failure isolation.
//!
//! Rows are submitted in CSV order. A failed submission is logged and
//! counted; it never stops the run, and the process exit status does not
//! depend on these counts.
use tracing::{error, info, warn};

use crate::content_api::RecordStore;
use crate::csv_load::{ProjectRow, TagRef};
use crate::error::MigrateError;
use crate::media::sync::MediaMap;
use crate::pacing::Pacer;
use crate::payload;

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct MigrationDriver<'a, S: RecordStore> {
    store: &'a S,
    pacer: &'a Pacer,
}

impl<'a, S: RecordStore> MigrationDriver<'a, S> {
    pub fn new(store: &'a S, pacer: &'a Pacer) -> Self {
        Self { store, pacer }
    }

    /// Resolve tag references to numeric identifiers. Name-mode tags are
    /// searched first and created on a miss; a tag that cannot be resolved
    /// is dropped from the record, not fatal.
    async fn resolve_tags(&self, refs: &[TagRef]) -> Vec<u64> {
        let mut out: Vec<u64> = Vec::with_capacity(refs.len());
        for tag in refs {
            let id = match tag {
                TagRef::ById(id) => Some(*id),
                TagRef::ByName(name) => {
                    self.pacer.before_lookup().await;
                    match self.store.find_tag(name).await {
                        Ok(Some(term)) => Some(term.id),
                        Ok(None) => match self.store.create_tag(name, None).await {
                            Ok(term) => {
                                info!(tag = %name, id = term.id, "created tag");
                                Some(term.id)
                            }
                            Err(err) => {
                                warn!(tag = %name, error = %err, "tag creation failed, dropping");
                                None
                            }
                        },
                        Err(err) => {
                            warn!(tag = %name, error = %err, "tag lookup failed, dropping");
                            None
                        }
                    }
                }
            };
            if let Some(id) = id {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        out
    }

    pub async fn run(&self, rows: &[ProjectRow], media: &MediaMap) -> RunSummary {
        let mut summary = RunSummary::default();

        for row in rows {
            summary.attempted += 1;
            let entry = media.entry_for(&row.project_key());
            let tags = self.resolve_tags(&row.tags).await;
            let request = payload::assemble(row, &entry, &tags);

            self.pacer.before_submit().await;
            match self.store.create_record(&request).await {
                Ok(created) => {
                    info!(id = created.id, title = %created.title, "created record");
                    summary.succeeded += 1;
                }
                Err(err) => {
                    let failure = MigrateError::Submission {
                        title: row.title.clone(),
                        reason: err.to_string(),
                    };
                    error!(error = %failure, "record skipped");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
