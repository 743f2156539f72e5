//! Record contract for the live window, plus the concrete transaction record
//! used by the simulator and the test suites.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Contract every windowed record must satisfy.
///
/// Dedup and identity preservation hinge on two notions of sameness:
/// * the `id` — which *entry* a record is; an empty id means the record has
///   no usable identity and is silently excluded everywhere, and
/// * `same_content` — field-wise structural equality over the tracked
///   comparison set, deciding whether a stored record may keep its identity
///   when the same id arrives again.
pub trait StreamRecord: Clone {
    /// Unique record identifier. Empty means missing.
    fn id(&self) -> &str;

    /// Monotonic ingestion timestamp in Unix ms, when known.
    fn observed_at_ms(&self) -> Option<u64> {
        None
    }

    /// Structural equality over the tracked field set.
    fn same_content(&self, other: &Self) -> bool;
}

/// Shared handle to one windowed record.
pub type RecordRef<R> = Arc<R>;

/// Shared, immutable ordered row set. Cloning is an `Arc` bump; consumers
/// compare row sets with [`Arc::ptr_eq`] to skip unchanged renders.
pub type RowSet<R> = Arc<[Arc<R>]>;

/// Build an empty row set.
#[must_use]
pub fn empty_rows<R>() -> RowSet<R> {
    Arc::from(Vec::new())
}

/// Transaction category for the concrete feed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Payment,
    Transfer,
    Refund,
    Fee,
}

/// Settlement status for the concrete feed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// One transaction event as delivered by the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    /// Unique transaction identifier.
    pub id: String,
    /// Transaction category.
    pub kind: TxKind,
    /// Settlement status.
    pub status: TxStatus,
    /// Amount in minor currency units; negative for outflows.
    pub amount_minor: i64,
    /// Freeform annotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Ingestion timestamp in Unix ms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at_ms: Option<u64>,
}

impl TxRecord {
    /// Convenience constructor for a confirmed payment.
    #[must_use]
    pub fn payment(id: impl Into<String>, amount_minor: i64) -> Self {
        Self {
            id: id.into(),
            kind: TxKind::Payment,
            status: TxStatus::Confirmed,
            amount_minor,
            memo: None,
            observed_at_ms: None,
        }
    }

    /// Set the ingestion timestamp.
    #[must_use]
    pub const fn observed_at(mut self, unix_ms: u64) -> Self {
        self.observed_at_ms = Some(unix_ms);
        self
    }
}

impl StreamRecord for TxRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn observed_at_ms(&self) -> Option<u64> {
        self.observed_at_ms
    }

    /// Everything except `observed_at_ms`: re-observing an unchanged
    /// transaction must not churn its stored identity.
    fn same_content(&self, other: &Self) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.status == other.status
            && self.amount_minor == other.amount_minor
            && self.memo == other.memo
    }
}

#[cfg(test)]
mod tests {
    use super::{StreamRecord, TxRecord, TxStatus};

    #[test]
    fn same_content_ignores_observation_time() {
        let a = TxRecord::payment("tx-1", 500).observed_at(1_000);
        let b = TxRecord::payment("tx-1", 500).observed_at(9_000);
        assert!(a.same_content(&b));
    }

    #[test]
    fn same_content_tracks_status_changes() {
        let a = TxRecord::payment("tx-1", 500);
        let mut b = a.clone();
        b.status = TxStatus::Failed;
        assert!(!a.same_content(&b));
    }

    #[test]
    fn serializes_without_empty_optionals() {
        let json = serde_json::to_string(&TxRecord::payment("tx-1", 500)).expect("json");
        assert!(!json.contains("memo"));
        assert!(!json.contains("observed_at_ms"));
        assert!(json.contains("\"kind\":\"payment\""));
    }
}
