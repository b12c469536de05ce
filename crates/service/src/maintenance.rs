//! Reconciliation for records whose parent no longer resolves.
//!
//! The engine only deletes through cascades, but rows can still be orphaned
//! by tools that write to the store directly.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::descriptor::EntityType;
use crate::errors::ServiceError;
use crate::registry::EntityServiceRegistry;
use crate::store::Filter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Orphan {
    pub entity_type: EntityType,
    pub id: Uuid,
    pub code: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub orphans: Vec<Orphan>,
    /// Records removed, descendants of orphans included.
    pub removed: u64,
    pub dry_run: bool,
}

pub struct OrphanSweeper {
    registry: Arc<EntityServiceRegistry>,
}

impl OrphanSweeper {
    pub fn new(registry: Arc<EntityServiceRegistry>) -> Self { Self { registry } }

    /// Walk the chain top-down and remove every record whose parent is gone,
    /// together with its subtree. With `dry_run` nothing is deleted, and
    /// descendants of an orphan are not reported separately.
    #[instrument(skip(self))]
    pub async fn sweep(&self, dry_run: bool) -> Result<SweepReport, ServiceError> {
        let mut report = SweepReport { dry_run, ..SweepReport::default() };
        let mut flagged = HashSet::new();

        for entity_type in &EntityType::CHAIN[1..] {
            let svc = self.registry.get(*entity_type);
            let Some(parent_type) = svc.descriptor().parent_type() else { continue };
            let parents = self.registry.get(parent_type);

            for doc in svc.find_sorted(&Filter::default()).await? {
                if doc.parent_id.is_some_and(|p| flagged.contains(&p)) {
                    // under an orphan already reported in this dry run
                    flagged.insert(doc.id);
                    continue;
                }
                let resolves = match doc.parent_id {
                    Some(parent_id) => parents.collection().get(parent_id).await?.is_some(),
                    None => false,
                };
                if resolves {
                    continue;
                }
                warn!(%entity_type, id = %doc.id, parent_id = ?doc.parent_id, "orphan found");
                report.orphans.push(Orphan {
                    entity_type: *entity_type,
                    id: doc.id,
                    code: doc.code.clone(),
                    parent_id: doc.parent_id,
                });
                if dry_run {
                    flagged.insert(doc.id);
                } else {
                    report.removed += svc.delete(doc.id).await?;
                }
            }
        }
        info!(orphans = report.orphans.len(), removed = report.removed, dry_run, "orphan sweep finished");
        Ok(report)
    }
}
