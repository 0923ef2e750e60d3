use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::batch::{
    latest_batch, latest_per_candidate, sort_newest_first, validate_snapshot, Batch, BatchId,
    BatchState, EvaluationRecord,
};
use super::domain::CandidateId;
use super::repository::{BatchStore, RepositoryError};

#[derive(Debug, Default)]
struct LedgerState {
    batches: BTreeMap<BatchId, Batch>,
    records: BTreeMap<BatchId, Vec<EvaluationRecord>>,
}

impl LedgerState {
    fn committed_records(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.batches
            .values()
            .filter(|batch| batch.is_committed())
            .filter_map(|batch| self.records.get(&batch.id))
            .flatten()
    }
}

/// In-process batch store. A commit swaps a batch to `Committed` and inserts its records under a
/// single write guard, so readers never see a partial batch.
#[derive(Debug, Default, Clone)]
pub struct BatchLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl BatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle state of any batch, including ones readers cannot see.
    pub fn state_of(&self, batch_id: &BatchId) -> Option<BatchState> {
        self.read()
            .ok()
            .and_then(|state| state.batches.get(batch_id).map(|batch| batch.state))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, RepositoryError> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Unavailable("batch ledger lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, RepositoryError> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Unavailable("batch ledger lock poisoned".to_string()))
    }
}

impl BatchStore for BatchLedger {
    fn begin(&self, batch: Batch) -> Result<Batch, RepositoryError> {
        let mut state = self.write()?;
        if state.batches.contains_key(&batch.id) {
            return Err(RepositoryError::Conflict);
        }
        state.batches.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    fn persist_batch(
        &self,
        batch_id: &BatchId,
        mut records: Vec<EvaluationRecord>,
    ) -> Result<Batch, RepositoryError> {
        validate_snapshot(batch_id, &records).map_err(RepositoryError::InvalidSnapshot)?;
        records.sort_by_key(|record| record.rank_position);

        let mut state = self.write()?;
        let batch = state
            .batches
            .get_mut(batch_id)
            .ok_or(RepositoryError::NotFound)?;
        if batch.state != BatchState::Pending {
            return Err(RepositoryError::InvalidState {
                batch_id: batch_id.clone(),
                state: batch.state,
            });
        }

        batch.state = BatchState::Committed;
        batch.record_count = records.len();
        let committed = batch.clone();
        state.records.insert(batch_id.clone(), records);
        Ok(committed)
    }

    fn mark_failed(&self, batch_id: &BatchId, reason: &str) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let batch = state
            .batches
            .get_mut(batch_id)
            .ok_or(RepositoryError::NotFound)?;
        match batch.state {
            BatchState::Pending => {
                batch.state = BatchState::Failed;
                batch.failure = Some(reason.to_string());
                Ok(())
            }
            BatchState::Failed => Ok(()),
            BatchState::Committed => Err(RepositoryError::InvalidState {
                batch_id: batch_id.clone(),
                state: BatchState::Committed,
            }),
        }
    }

    fn batch(&self, batch_id: &BatchId) -> Result<Option<Batch>, RepositoryError> {
        let state = self.read()?;
        Ok(state
            .batches
            .get(batch_id)
            .filter(|batch| batch.is_committed())
            .cloned())
    }

    fn latest_batch(&self) -> Result<Option<Batch>, RepositoryError> {
        let state = self.read()?;
        Ok(latest_batch(state.batches.values()).cloned())
    }

    fn records_for_batch(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        let state = self.read()?;
        let committed = state
            .batches
            .get(batch_id)
            .is_some_and(|batch| batch.is_committed());
        if !committed {
            return Ok(Vec::new());
        }
        Ok(state.records.get(batch_id).cloned().unwrap_or_default())
    }

    fn latest_per_candidate(&self) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        let state = self.read()?;
        Ok(latest_per_candidate(state.committed_records()))
    }

    fn history_for_candidate(
        &self,
        candidate_id: CandidateId,
    ) -> Result<Vec<EvaluationRecord>, RepositoryError> {
        let state = self.read()?;
        let mut history: Vec<EvaluationRecord> = state
            .committed_records()
            .filter(|record| record.candidate_id == candidate_id)
            .cloned()
            .collect();
        sort_newest_first(&mut history);
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::domain::WeightProfileId;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn pending() -> Batch {
        Batch::pending(
            WeightProfileId(1),
            Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap(),
        )
    }

    fn records(batch: &Batch, scores: &[(u64, f64)]) -> Vec<EvaluationRecord> {
        scores
            .iter()
            .enumerate()
            .map(|(index, (candidate, score))| EvaluationRecord {
                batch_id: batch.id.clone(),
                candidate_id: CandidateId(*candidate),
                weight_profile_id: batch.weight_profile_id,
                closeness_score: *score,
                rank_position: index as u32 + 1,
                created_at: batch.created_at,
                execution_time_ms: 1,
            })
            .collect()
    }

    #[test]
    fn pending_batches_are_invisible_until_committed() {
        let ledger = BatchLedger::new();
        let batch = ledger.begin(pending()).expect("begin");

        assert_eq!(ledger.latest_batch().expect("read"), None);
        assert!(ledger.records_for_batch(&batch.id).expect("read").is_empty());
        assert_eq!(ledger.state_of(&batch.id), Some(BatchState::Pending));

        let committed = ledger
            .persist_batch(&batch.id, records(&batch, &[(2, 0.7), (1, 0.3)]))
            .expect("commit");
        assert_eq!(committed.record_count, 2);
        assert_eq!(ledger.latest_batch().expect("read"), Some(committed));
        assert_eq!(ledger.records_for_batch(&batch.id).expect("read").len(), 2);
    }

    #[test]
    fn invalid_snapshot_leaves_batch_pending() {
        let ledger = BatchLedger::new();
        let batch = ledger.begin(pending()).expect("begin");
        let mut broken = records(&batch, &[(2, 0.7), (1, 0.3)]);
        broken[1].rank_position = 5;

        match ledger.persist_batch(&batch.id, broken) {
            Err(RepositoryError::InvalidSnapshot(_)) => {}
            other => panic!("expected invalid snapshot, got {other:?}"),
        }
        assert_eq!(ledger.state_of(&batch.id), Some(BatchState::Pending));
        assert!(ledger.latest_per_candidate().expect("read").is_empty());
    }

    #[test]
    fn committed_batches_cannot_fail_or_recommit() {
        let ledger = BatchLedger::new();
        let batch = ledger.begin(pending()).expect("begin");
        ledger
            .persist_batch(&batch.id, records(&batch, &[(1, 0.5)]))
            .expect("commit");

        assert!(matches!(
            ledger.mark_failed(&batch.id, "late failure"),
            Err(RepositoryError::InvalidState { .. })
        ));
        assert!(matches!(
            ledger.persist_batch(&batch.id, records(&batch, &[(1, 0.5)])),
            Err(RepositoryError::InvalidState { .. })
        ));
        assert!(matches!(
            ledger.begin(batch.clone()),
            Err(RepositoryError::Conflict)
        ));
    }

    #[test]
    fn concurrent_readers_see_whole_batches_or_nothing() {
        const SITES: usize = 64;
        let ledger = BatchLedger::new();
        let batches: Vec<Batch> = (0..24)
            .map(|_| ledger.begin(pending()).expect("begin"))
            .collect();
        let scores: Vec<(u64, f64)> = (1..=SITES as u64)
            .map(|id| (id, 1.0 - id as f64 / 100.0))
            .collect();
        let finished = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                let finished = Arc::clone(&finished);
                let ids: Vec<BatchId> = batches.iter().map(|batch| batch.id.clone()).collect();
                std::thread::spawn(move || {
                    let mut polls = 0usize;
                    loop {
                        let done = finished.load(Ordering::Acquire);
                        for id in &ids {
                            let seen = ledger.records_for_batch(id).expect("read").len();
                            assert!(seen == 0 || seen == SITES, "partial batch: {seen} records");
                        }
                        let latest = ledger.latest_per_candidate().expect("read").len();
                        assert!(latest == 0 || latest == SITES, "partial view: {latest}");
                        polls += 1;
                        if done {
                            return polls;
                        }
                    }
                })
            })
            .collect();

        for batch in &batches {
            ledger
                .persist_batch(&batch.id, records(batch, &scores))
                .expect("commit");
        }
        finished.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.join().expect("reader finishes") > 0);
        }
        for batch in &batches {
            assert_eq!(ledger.records_for_batch(&batch.id).expect("read").len(), SITES);
        }
    }

    #[test]
    fn failed_batches_never_surface() {
        let ledger = BatchLedger::new();
        let batch = ledger.begin(pending()).expect("begin");
        ledger.mark_failed(&batch.id, "scoring failed").expect("fail");

        assert_eq!(ledger.state_of(&batch.id), Some(BatchState::Failed));
        assert_eq!(ledger.batch(&batch.id).expect("read"), None);
        assert!(ledger
            .history_for_candidate(CandidateId(1))
            .expect("read")
            .is_empty());
    }
}
