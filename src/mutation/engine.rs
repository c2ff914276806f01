//! Update pipeline
//!
//! Each update moves through
//! `Received -> Validated -> Applied -> Indexed -> Committed`, or ends in
//! `Rejected`. Every fallible step (validation, encoding, size check,
//! tier placement) runs before the first index change, so a rejected
//! update leaves no trace. The caller holds the document's exclusive
//! section for the whole run.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::codec;
use crate::document::{Document, ID_FIELD};
use crate::error::{Error, Result};
use crate::index::{IndexManager, KeyIndex, StaleEntry};
use crate::mvcc::{CommitId, VersionPayload};
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::storage::{StorageRecord, Tier, TierManager};

use super::errors::{MutationError, MutationResult};
use super::merge_patch::{apply_merge_patch, validate_patch};
use super::transform::{apply_transform, PathOp};

/// A requested change to one document
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Recursive merge; `null` removes
    MergePatch(Value),
    /// Ordered path operations
    Transform(Vec<PathOp>),
    /// Whole-body replacement; `_id` may be omitted or repeated
    Replace(Value),
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::MergePatch(_) => "merge_patch",
            Mutation::Transform(_) => "transform",
            Mutation::Replace(_) => "replace",
        }
    }

    /// Reject requests that cannot apply to `current`
    pub fn validate(&self, current: &Document) -> MutationResult<()> {
        match self {
            Mutation::MergePatch(patch) => validate_patch(current, patch),
            Mutation::Transform(ops) => ops.iter().try_for_each(PathOp::validate),
            Mutation::Replace(body) => {
                let Value::Object(fields) = body else {
                    return Err(MutationError::InvalidMutation(
                        "replacement must be an object".to_string(),
                    ));
                };
                match fields.get(ID_FIELD) {
                    None => Ok(()),
                    Some(Value::String(id)) if Some(id.as_str()) == current.id() => Ok(()),
                    Some(_) => Err(MutationError::ImmutableKey(ID_FIELD.to_string())),
                }
            }
        }
    }

    /// The body `current` would have afterwards
    pub fn apply(&self, current: &Document) -> MutationResult<Value> {
        match self {
            Mutation::MergePatch(patch) => apply_merge_patch(current, patch),
            Mutation::Transform(ops) => apply_transform(current, ops),
            Mutation::Replace(body) => {
                self.validate(current)?;
                let mut body = body.clone();
                if let (Value::Object(fields), Some(id)) = (&mut body, current.id()) {
                    fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
                }
                Ok(body)
            }
        }
    }
}

/// Lifecycle of one update request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationState {
    Received,
    Validated,
    Applied,
    Indexed,
    Committed,
    Rejected,
}

impl MutationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationState::Received => "RECEIVED",
            MutationState::Validated => "VALIDATED",
            MutationState::Applied => "APPLIED",
            MutationState::Indexed => "INDEXED",
            MutationState::Committed => "COMMITTED",
            MutationState::Rejected => "REJECTED",
        }
    }

    /// Allowed forward transitions
    pub fn can_transition_to(&self, next: MutationState) -> bool {
        use MutationState::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Validated, Applied)
                | (Applied, Indexed)
                | (Indexed, Committed)
                | (Received | Validated | Applied, Rejected)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MutationState::Committed | MutationState::Rejected)
    }
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// States visited by one request, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationTrace {
    states: Vec<MutationState>,
}

impl MutationTrace {
    pub fn new() -> Self {
        Self {
            states: vec![MutationState::Received],
        }
    }

    pub fn current(&self) -> MutationState {
        self.states
            .last()
            .copied()
            .unwrap_or(MutationState::Received)
    }

    pub fn advance(&mut self, next: MutationState) {
        debug_assert!(
            self.current().can_transition_to(next),
            "illegal transition {} -> {}",
            self.current(),
            next
        );
        self.states.push(next);
    }

    pub fn states(&self) -> &[MutationState] {
        &self.states
    }
}

impl Default for MutationTrace {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a committed update
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub document: Document,
    pub commit: CommitId,
    pub previous_tier: Tier,
    pub tier: Tier,
    pub size_bytes: usize,
    pub states: Vec<MutationState>,
}

impl UpdateOutcome {
    pub fn migrated(&self) -> bool {
        self.previous_tier != self.tier
    }
}

/// A committed update plus the index entries it superseded
pub(crate) struct AppliedUpdate {
    pub outcome: UpdateOutcome,
    pub stale: Vec<StaleEntry>,
}

/// Runs updates against one collection's components
pub(crate) struct MutationEngine<'a> {
    pub keys: &'a KeyIndex,
    pub tiers: &'a TierManager,
    pub indexes: &'a IndexManager,
    pub metrics: &'a MetricsRegistry,
    pub max_depth: usize,
}

impl MutationEngine<'_> {
    /// Apply `mutation` to `current`, whose latest record is `record`
    pub fn run(
        &self,
        id: &str,
        current: &Document,
        record: &StorageRecord,
        mutation: &Mutation,
    ) -> Result<AppliedUpdate> {
        let mut trace = MutationTrace::new();
        match self.stage(id, current, record, mutation, &mut trace) {
            Ok((document, updated)) => {
                let stale = self.indexes.on_update(current, &document);
                trace.advance(MutationState::Indexed);

                let commit = self.keys.commit(id, VersionPayload::Record(updated));
                trace.advance(MutationState::Committed);

                self.metrics.increment_updates();
                if updated.tier() != record.tier() {
                    self.metrics.increment_tier_migrations();
                }
                let commit_str = commit.value().to_string();
                log_event(
                    Event::DocumentUpdated,
                    &[
                        ("commit", commit_str.as_str()),
                        ("id", id),
                        ("mutation", mutation.kind()),
                        ("tier", updated.tier().as_str()),
                    ],
                );
                Ok(AppliedUpdate {
                    outcome: UpdateOutcome {
                        document,
                        commit,
                        previous_tier: record.tier(),
                        tier: updated.tier(),
                        size_bytes: updated.size_bytes(),
                        states: trace.states().to_vec(),
                    },
                    stale,
                })
            }
            Err(err) => {
                trace.advance(MutationState::Rejected);
                record_rejection(self.metrics, id, "update", &err);
                Err(err)
            }
        }
    }

    /// Validate, apply and store the new payload. Nothing visible changes.
    fn stage(
        &self,
        id: &str,
        current: &Document,
        record: &StorageRecord,
        mutation: &Mutation,
        trace: &mut MutationTrace,
    ) -> Result<(Document, StorageRecord)> {
        mutation.validate(current)?;
        trace.advance(MutationState::Validated);

        let body = mutation.apply(current)?;
        let document = Document::from_value(body, self.max_depth)?;
        if document.id() != Some(id) {
            return Err(MutationError::ImmutableKey(ID_FIELD.to_string()).into());
        }
        let bytes = codec::encode(&document)?;
        let updated = self.tiers.remigrate(id, record, bytes)?;
        trace.advance(MutationState::Applied);
        Ok((document, updated))
    }
}

/// Count and log a write that failed before commit. Store timeouts are
/// counted where they happen, in the tier manager.
pub(crate) fn record_rejection(metrics: &MetricsRegistry, id: &str, operation: &str, err: &Error) {
    metrics.increment_rejected_writes();
    if err.is_not_found() {
        return;
    }
    let reason = err.to_string();
    log_event(
        Event::MutationRejected,
        &[
            ("code", err.code()),
            ("id", id),
            ("operation", operation),
            ("reason", reason.as_str()),
        ],
    );
}
