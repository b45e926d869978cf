//! FINALIZING phase
//!
//! Normalize → deduplicate → validate → persist, all over the merged batch
//! of the run. This is the only place the seen-key sets are written.

use super::IngestPipeline;
use crate::error::{IngestError, IngestResult};
use crate::models::{RunId, RunSummary};
use crate::services::{Deduplicator, Normalizer};
use crate::validators::ValidationGate;
use mbx_common::records::{Contact, RecordBatch, RecordKind};
use mbx_common::PhoneRules;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

impl IngestPipeline {
    /// **Phase 6: FINALIZING** - clean the batch and hand it to the sink
    pub(super) async fn phase_finalizing(
        &self,
        run_id: &RunId,
        mut batch: RecordBatch,
        vcard_contacts: Vec<Contact>,
        summary: &mut RunSummary,
        cancel_token: &CancellationToken,
    ) -> IngestResult<()> {
        info!(
            run_id = %run_id,
            records = batch.len() + vcard_contacts.len(),
            "Phase 6: FINALIZING - normalizing, deduplicating and validating"
        );

        for kind in RecordKind::ALL {
            summary.kind_mut(kind).extracted = batch.count(kind);
        }
        summary.kind_mut(RecordKind::Contact).extracted += vcard_contacts.len();

        let normalizer = Normalizer::new(PhoneRules::new(&self.settings.country_code));
        normalizer.normalize_batch(&mut batch);
        let mut vcards = RecordBatch {
            contacts: vcard_contacts,
            ..Default::default()
        };
        normalizer.normalize_batch(&mut vcards);

        let (deduped, dedup_stats) = Deduplicator::new().dedup(batch, vcards.contacts);
        for kind in RecordKind::ALL {
            summary.kind_mut(kind).duplicates = dedup_stats.removed(kind);
        }

        let outcome = ValidationGate::from_settings(&self.settings).validate(deduped);
        for kind in RecordKind::ALL {
            summary.kind_mut(kind).rejected = outcome.rejected(kind);
        }
        for rejection in &outcome.rejections {
            debug!(
                run_id = %run_id,
                kind = %rejection.kind,
                subject = %rejection.subject,
                reason = %rejection.reason,
                "Record rejected"
            );
        }

        if cancel_token.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let persisted = self
            .sink
            .insert_batch(run_id, &outcome.accepted)
            .await
            .map_err(|e| IngestError::Persistence(e.to_string()))?;
        for (kind, count) in persisted {
            summary.kind_mut(kind).persisted = count;
        }
        summary.rejections = outcome.rejections;

        let stats = &mut summary.statistics.finalizing;
        stats.duplicates_removed = dedup_stats.removed.values().sum();
        stats.rejected = summary.rejections.len();
        stats.persisted = summary.kinds.values().map(|k| k.persisted).sum();

        info!(
            run_id = %run_id,
            "FINALIZING complete: {}",
            summary.statistics.finalizing.display_string()
        );
        Ok(())
    }
}
