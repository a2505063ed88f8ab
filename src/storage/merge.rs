use super::{CsvStore, StoreError};
use crate::models::DrawRecord;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Merged(DrawRecord),
    Unchanged,
}

/// Sole writer of the store. Built idle around the loaded store and consumed
/// by a single [`MergeEngine::merge`].
pub struct MergeEngine {
    store: CsvStore,
}

impl MergeEngine {
    pub fn new(store: CsvStore) -> Self {
        Self { store }
    }

    /// What [`merge`](Self::merge) would do, without writing.
    pub fn preview(&self, record: &DrawRecord) -> MergeOutcome {
        let Some(head) = self.store.head() else {
            return MergeOutcome::Merged(record.clone());
        };

        if head.same_identity(record) {
            if head.primary != record.primary {
                warn!("Head {} has the same identity as {} but different numbers; keeping stored row", head, record);
            }
            return MergeOutcome::Unchanged;
        }
        if record.date <= head.date {
            info!("{} is not newer than head {}; nothing to merge", record.date, head.date);
            return MergeOutcome::Unchanged;
        }
        if self.store.contains_date(record.date) {
            warn!("{} already stored below the head; nothing to merge", record.date);
            return MergeOutcome::Unchanged;
        }
        MergeOutcome::Merged(record.clone())
    }

    /// Compare against the head and prepend when the record is new.
    /// At most one write; the store is released afterwards.
    pub fn merge(mut self, record: DrawRecord) -> Result<MergeOutcome, StoreError> {
        match self.preview(&record) {
            MergeOutcome::Unchanged => Ok(MergeOutcome::Unchanged),
            MergeOutcome::Merged(_) => {
                self.store.prepend(record.clone())?;
                Ok(MergeOutcome::Merged(record))
            }
        }
    }
}
