//! Wire shapes of the ingest interface.

use serde::{Deserialize, Serialize};

use tally_types::{
    CategoryId, ContestantId, IdempotencyKey, RejectReason, Timestamp, VoteKind,
};

/// One vote increment as handed over by the upstream acceptance pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSubmission {
    pub contestant_id: ContestantId,
    pub category_id: CategoryId,
    pub vote_kind: VoteKind,
    /// Signed so that malformed upstream input surfaces as `InvalidAmount`
    /// instead of a decode failure.
    pub amount: i64,
    pub idempotency_key: IdempotencyKey,
    pub occurred_at: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl IngestResponse {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    /// A resubmitted increment: successful, but nothing changed.
    pub fn duplicate() -> Self {
        Self {
            accepted: true,
            reason: Some(RejectReason::Duplicate),
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.reason == Some(RejectReason::Duplicate)
    }
}
