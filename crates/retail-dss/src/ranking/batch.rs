use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{CandidateId, WeightProfileId};
use super::rank::order_by_closeness;

/// Opaque identifier shared by every record of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl BatchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static BATCH_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique batch id carrying its creation time.
pub fn next_batch_id(created_at: DateTime<Utc>) -> BatchId {
    let sequence = BATCH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format_batch_id(created_at, sequence, Uuid::new_v4().as_fields().0)
}

// Fixed-width fields keep string order equal to (created_at, sequence) order.
fn format_batch_id(created_at: DateTime<Utc>, sequence: u64, nonce: u32) -> BatchId {
    BatchId(format!(
        "batch-{}-{sequence:020}-{nonce:08x}",
        created_at.format("%Y%m%dT%H%M%S%3fZ")
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Pending,
    Committed,
    Failed,
}

impl BatchState {
    pub const fn label(self) -> &'static str {
        match self {
            BatchState::Pending => "pending",
            BatchState::Committed => "committed",
            BatchState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub weight_profile_id: WeightProfileId,
    pub created_at: DateTime<Utc>,
    pub state: BatchState,
    pub record_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Batch {
    pub fn pending(weight_profile_id: WeightProfileId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: next_batch_id(created_at),
            weight_profile_id,
            created_at,
            state: BatchState::Pending,
            record_count: 0,
            failure: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == BatchState::Committed
    }
}

/// One candidate's persisted result within a batch. Never mutated once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub batch_id: BatchId,
    pub candidate_id: CandidateId,
    pub weight_profile_id: WeightProfileId,
    pub closeness_score: f64,
    pub rank_position: u32,
    pub created_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

/// Newest committed batch; equal timestamps fall back to the larger batch id.
pub fn latest_batch<'a, I>(batches: I) -> Option<&'a Batch>
where
    I: IntoIterator<Item = &'a Batch>,
{
    batches
        .into_iter()
        .filter(|batch| batch.is_committed())
        .max_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        })
}

/// Most recent record for each candidate, in ranking order.
pub fn latest_per_candidate<'a, I>(records: I) -> Vec<EvaluationRecord>
where
    I: IntoIterator<Item = &'a EvaluationRecord>,
{
    let mut newest: BTreeMap<CandidateId, &EvaluationRecord> = BTreeMap::new();
    for record in records {
        let replace = newest
            .get(&record.candidate_id)
            .map_or(true, |current| is_newer(record, current));
        if replace {
            newest.insert(record.candidate_id, record);
        }
    }

    let mut latest: Vec<EvaluationRecord> = newest.into_values().cloned().collect();
    order_by_closeness(&mut latest, |record| {
        (record.closeness_score, record.candidate_id)
    });
    latest
}

/// Sorts records newest batch first.
pub fn sort_newest_first(records: &mut [EvaluationRecord]) {
    records.sort_by(|left, right| {
        right
            .created_at
            .cmp(&left.created_at)
            .then_with(|| right.batch_id.cmp(&left.batch_id))
    });
}

fn is_newer(candidate: &EvaluationRecord, current: &EvaluationRecord) -> bool {
    (candidate.created_at, &candidate.batch_id) > (current.created_at, &current.batch_id)
}

/// Checks that a batch's records form one complete ranking before they are committed.
pub fn validate_snapshot(batch_id: &BatchId, records: &[EvaluationRecord]) -> Result<(), String> {
    let mut candidates = BTreeSet::new();
    let mut ranks = BTreeSet::new();

    for record in records {
        if &record.batch_id != batch_id {
            return Err(format!(
                "record for candidate {} belongs to batch {}",
                record.candidate_id, record.batch_id
            ));
        }
        if !candidates.insert(record.candidate_id) {
            return Err(format!("candidate {} appears twice", record.candidate_id));
        }
        if !(0.0..=1.0).contains(&record.closeness_score) {
            return Err(format!(
                "closeness {} for candidate {} is outside [0, 1]",
                record.closeness_score, record.candidate_id
            ));
        }
        ranks.insert(record.rank_position);
    }

    let expected = 1..=records.len() as u32;
    if ranks.len() != records.len() || !ranks.iter().copied().eq(expected) {
        return Err("rank positions are not contiguous from 1".to_string());
    }

    Ok(())
}
