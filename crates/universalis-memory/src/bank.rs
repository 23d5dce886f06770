//! The scoped associative memory bank.
//!
//! One bank exists per simulation. Rows live behind a single async
//! mutex: all mutation serializes through it, and the duplicate-hash
//! check is atomic with the insert. Embedding happens *outside* the
//! critical section -- an LLM-backed embedder must never hold the bank
//! lock across network I/O.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info};

use universalis_llm::Embedder;

use crate::error::MemoryError;
use crate::scopes::{MemoryScope, ScopeFilter};

/// One stored memory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique id: `{simulation_id}_{content_hash}`.
    pub memory_id: String,
    /// The memory text, whitespace-normalized.
    pub text: String,
    /// Dense embedding of `text`.
    pub vector: Vec<f32>,
    /// Visibility scope.
    pub scope: MemoryScope,
    /// Owning agent, when scoped.
    pub owner_id: Option<String>,
    /// Sharing group for [`MemoryScope::SharedGroup`] rows.
    pub group_id: Option<String>,
    /// Cycle of origin.
    pub cycle: u64,
    /// Importance in `[0, 1]`; decayed by the pruner.
    pub importance: f64,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Wall-clock creation time.
    pub timestamp: DateTime<Utc>,
    /// The simulation this row belongs to.
    pub simulation_id: String,
    /// How many times associative retrieval returned this row.
    pub access_count: u32,
}

/// Parameters for one `add` call.
#[derive(Debug, Clone)]
pub struct MemoryParams {
    /// Visibility scope (default private).
    pub scope: MemoryScope,
    /// Owning agent.
    pub owner_id: Option<String>,
    /// Sharing group.
    pub group_id: Option<String>,
    /// Cycle of origin.
    pub cycle: u64,
    /// Importance in `[0, 1]` (default 0.5).
    pub importance: f64,
    /// Free-form tags.
    pub tags: Vec<String>,
}

impl Default for MemoryParams {
    fn default() -> Self {
        Self {
            scope: MemoryScope::Private,
            owner_id: None,
            group_id: None,
            cycle: 0,
            importance: 0.5,
            tags: Vec::new(),
        }
    }
}

impl MemoryParams {
    /// Parameters for a private memory owned by `owner_id`.
    pub fn private(owner_id: impl Into<String>, cycle: u64) -> Self {
        Self {
            scope: MemoryScope::Private,
            owner_id: Some(owner_id.into()),
            cycle,
            ..Self::default()
        }
    }

    /// Parameters for a public memory.
    pub fn public(cycle: u64) -> Self {
        Self {
            scope: MemoryScope::Public,
            cycle,
            ..Self::default()
        }
    }

    /// Parameters for a shared-group memory.
    pub fn shared(
        owner_id: impl Into<String>,
        group_id: impl Into<String>,
        cycle: u64,
    ) -> Self {
        Self {
            scope: MemoryScope::SharedGroup,
            owner_id: Some(owner_id.into()),
            group_id: Some(group_id.into()),
            cycle,
            ..Self::default()
        }
    }

    /// Builder-style importance override.
    #[must_use]
    pub const fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }
}

/// Checkpoint state of a bank: identity plus the duplicate-hash set.
///
/// Row-level data is expected to persist in the backing store; only the
/// hash set (and identity) round-trips through checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankState {
    /// The simulation this bank serves.
    pub simulation_id: String,
    /// The logical table name.
    pub table_name: String,
    /// Content hashes of every stored row.
    pub stored_hashes: Vec<String>,
    /// Number of stored rows.
    pub memory_count: usize,
}

struct BankInner {
    records: Vec<MemoryRecord>,
    stored_hashes: BTreeSet<String>,
}

/// Vector-indexed scoped memory for one simulation.
pub struct MemoryBank {
    simulation_id: String,
    table_name: String,
    embedder: Embedder,
    inner: Mutex<BankInner>,
}

impl MemoryBank {
    /// Create an empty bank.
    pub fn new(
        simulation_id: impl Into<String>,
        table_name: impl Into<String>,
        embedder: Embedder,
    ) -> Self {
        let simulation_id = simulation_id.into();
        let table_name = table_name.into();
        info!(%simulation_id, %table_name, "Memory bank initialized");
        Self {
            simulation_id,
            table_name,
            embedder,
            inner: Mutex::new(BankInner {
                records: Vec::new(),
                stored_hashes: BTreeSet::new(),
            }),
        }
    }

    /// The simulation this bank serves.
    pub fn simulation_id(&self) -> &str {
        &self.simulation_id
    }

    /// Add one memory.
    ///
    /// The text is whitespace-normalized first. Returns `Ok(false)`
    /// without writing when the normalized text is empty or when an
    /// identical `(text, owner, scope)` row already exists.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidImportance`] for out-of-range
    /// importance, or [`MemoryError::Embedding`] if the embedder fails.
    pub async fn add(&self, text: &str, params: MemoryParams) -> Result<bool, MemoryError> {
        if !(0.0..=1.0).contains(&params.importance) {
            return Err(MemoryError::InvalidImportance {
                value: params.importance,
            });
        }

        let text = text.replace('\n', " ").trim().to_owned();
        if text.is_empty() {
            return Ok(false);
        }

        let content_hash = compute_hash(&text, params.owner_id.as_deref(), params.scope);

        // Cheap pre-check so duplicate adds skip the embedding work.
        {
            let inner = self.inner.lock().await;
            if inner.stored_hashes.contains(&content_hash) {
                return Ok(false);
            }
        }

        // Embedding runs outside the critical section.
        let vector = self.embedder.embed(&text).await?;

        let record = MemoryRecord {
            memory_id: format!("{}_{content_hash}", self.simulation_id),
            text,
            vector,
            scope: params.scope,
            owner_id: params.owner_id,
            group_id: params.group_id,
            cycle: params.cycle,
            importance: params.importance,
            tags: params.tags,
            timestamp: Utc::now(),
            simulation_id: self.simulation_id.clone(),
            access_count: 0,
        };

        let mut inner = self.inner.lock().await;
        // Re-check under the lock: another writer may have won the race.
        if !inner.stored_hashes.insert(content_hash) {
            return Ok(false);
        }
        inner.records.push(record);
        debug!(count = inner.records.len(), "Memory added");
        Ok(true)
    }

    /// Batched [`add`](Self::add); returns how many rows were inserted.
    ///
    /// # Errors
    ///
    /// Stops at the first failing add and returns its error.
    pub async fn extend<I, S>(&self, texts: I, params: MemoryParams) -> Result<usize, MemoryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0_usize;
        for text in texts {
            if self.add(text.as_ref(), params.clone()).await? {
                count = count.saturating_add(1);
            }
        }
        Ok(count)
    }

    /// Top-`k` visible rows by vector similarity to `query`.
    ///
    /// Returned rows get their access count bumped, which feeds the
    /// pruner's reinforcement boost.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Embedding`] if the query embedding fails.
    pub async fn retrieve_associative(
        &self,
        query: &str,
        k: usize,
        filter: &ScopeFilter,
    ) -> Result<Vec<String>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(query).await?;

        let mut inner = self.inner.lock().await;
        let mut scored: Vec<(f64, usize)> = inner
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                filter.can_access(
                    record.scope,
                    record.owner_id.as_deref(),
                    record.group_id.as_deref(),
                )
            })
            .map(|(idx, record)| (cosine_similarity(&query_vector, &record.vector), idx))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut results = Vec::with_capacity(k.min(scored.len()));
        for (_, idx) in scored.into_iter().take(k) {
            if let Some(record) = inner.records.get_mut(idx) {
                record.access_count = record.access_count.saturating_add(1);
                results.push(record.text.clone());
            }
        }
        Ok(results)
    }

    /// Top-`k` visible rows by recency (newest first).
    pub async fn retrieve_recent(&self, k: usize, filter: &ScopeFilter) -> Vec<String> {
        if k == 0 {
            return Vec::new();
        }
        let inner = self.inner.lock().await;
        let mut visible: Vec<(usize, &MemoryRecord)> = inner
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                filter.can_access(
                    record.scope,
                    record.owner_id.as_deref(),
                    record.group_id.as_deref(),
                )
            })
            .collect();
        visible.sort_by(|a, b| {
            b.1.timestamp
                .cmp(&a.1.timestamp)
                .then_with(|| b.0.cmp(&a.0))
        });
        visible
            .into_iter()
            .take(k)
            .map(|(_, record)| record.text.clone())
            .collect()
    }

    /// All visible rows whose text matches `predicate`.
    pub async fn scan<F>(&self, predicate: F, filter: &ScopeFilter) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let inner = self.inner.lock().await;
        inner
            .records
            .iter()
            .filter(|record| {
                filter.can_access(
                    record.scope,
                    record.owner_id.as_deref(),
                    record.group_id.as_deref(),
                )
            })
            .filter(|record| predicate(&record.text))
            .map(|record| record.text.clone())
            .collect()
    }

    /// Snapshot of the bank's checkpoint state.
    pub async fn get_state(&self) -> BankState {
        let inner = self.inner.lock().await;
        BankState {
            simulation_id: self.simulation_id.clone(),
            table_name: self.table_name.clone(),
            stored_hashes: inner.stored_hashes.iter().cloned().collect(),
            memory_count: inner.stored_hashes.len(),
        }
    }

    /// Restore the duplicate-hash set from a checkpoint. Row data is
    /// expected to persist in the backing store.
    pub async fn set_state(&self, state: &BankState) {
        let mut inner = self.inner.lock().await;
        inner.stored_hashes = state.stored_hashes.iter().cloned().collect();
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Whether the bank holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }

    /// Drop every row and hash for this simulation.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.records.clear();
        inner.stored_hashes.clear();
        info!(simulation_id = %self.simulation_id, "Memory bank cleared");
    }

    /// Replace the stored rows wholesale (used by the pruner), and
    /// rebuild the duplicate-hash set so pruned content can be re-added.
    pub(crate) async fn replace_records(&self, records: Vec<MemoryRecord>) {
        let mut inner = self.inner.lock().await;
        inner.stored_hashes = records
            .iter()
            .map(|record| compute_hash(&record.text, record.owner_id.as_deref(), record.scope))
            .collect();
        inner.records = records;
    }

    /// Clone of the stored rows (used by the pruner and tests).
    pub(crate) async fn records_snapshot(&self) -> Vec<MemoryRecord> {
        self.inner.lock().await.records.clone()
    }
}

/// SHA-256 content hash over `(text, owner, scope)`.
fn compute_hash(text: &str, owner_id: Option<&str>, scope: MemoryScope) -> String {
    let content = format!("{text}:{}:{scope}", owner_id.unwrap_or_default());
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Cosine similarity; 0.0 when either vector has zero norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator < f64::EPSILON {
        0.0
    } else {
        dot / denominator
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_bank() -> MemoryBank {
        MemoryBank::new("Alpha_Scenario", "memories", Embedder::HashSeeded { dim: 32 })
    }

    #[tokio::test]
    async fn add_is_idempotent_per_content_hash() {
        let bank = make_bank();
        let params = MemoryParams::private("Actor_A", 1);

        let first = bank.add("the river is rising", params.clone()).await.unwrap();
        let second = bank.add("the river is rising", params).await.unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(bank.len().await, 1);
    }

    #[tokio::test]
    async fn same_text_different_owner_is_distinct() {
        let bank = make_bank();
        assert!(
            bank.add("shared phrasing", MemoryParams::private("A", 1))
                .await
                .unwrap()
        );
        assert!(
            bank.add("shared phrasing", MemoryParams::private("B", 1))
                .await
                .unwrap()
        );
        assert_eq!(bank.len().await, 2);
    }

    #[tokio::test]
    async fn empty_text_is_a_no_op() {
        let bank = make_bank();
        assert!(!bank.add("   \n  ", MemoryParams::default()).await.unwrap());
        assert!(bank.is_empty().await);
    }

    #[tokio::test]
    async fn newlines_normalize_to_spaces() {
        let bank = make_bank();
        assert!(
            bank.add("line one\nline two", MemoryParams::public(0))
                .await
                .unwrap()
        );
        // The normalized form collides with the already-normalized text.
        assert!(
            !bank
                .add("line one line two", MemoryParams::public(0))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn importance_out_of_range_rejected() {
        let bank = make_bank();
        let err = bank
            .add(
                "too important",
                MemoryParams::public(0).with_importance(1.5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidImportance { .. }));
    }

    #[tokio::test]
    async fn extend_counts_only_inserts() {
        let bank = make_bank();
        let count = bank
            .extend(
                ["alpha", "bravo", "alpha", ""],
                MemoryParams::public(0),
            )
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn scope_filter_governs_retrieval() {
        let bank = make_bank();
        bank.add("weather stable", MemoryParams::public(1))
            .await
            .unwrap();
        bank.add("my secret", MemoryParams::private("A", 1))
            .await
            .unwrap();
        bank.add("ops note", MemoryParams::shared("A", "ops", 1))
            .await
            .unwrap();

        // B sees only the public row.
        let b_filter = ScopeFilter::for_agent("B");
        let seen = bank
            .retrieve_associative("anything", 10, &b_filter)
            .await
            .unwrap();
        assert_eq!(seen, vec![String::from("weather stable")]);

        // A with ops membership sees all three.
        let a_filter = ScopeFilter::for_agent("A").with_groups(["ops"]);
        let seen = bank
            .retrieve_associative("anything", 10, &a_filter)
            .await
            .unwrap();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn retrieve_zero_is_empty() {
        let bank = make_bank();
        bank.add("something", MemoryParams::public(0)).await.unwrap();
        let results = bank
            .retrieve_associative("something", 0, &ScopeFilter::default())
            .await
            .unwrap();
        assert!(results.is_empty());
        assert!(bank.retrieve_recent(0, &ScopeFilter::default()).await.is_empty());
    }

    #[tokio::test]
    async fn associative_retrieval_finds_exact_duplicate_first() {
        let bank = make_bank();
        bank.add("wildfire spreading north", MemoryParams::public(1))
            .await
            .unwrap();
        bank.add("supply convoy delayed", MemoryParams::public(1))
            .await
            .unwrap();
        bank.add("evacuation complete", MemoryParams::public(1))
            .await
            .unwrap();

        // The hash-seeded embedder is deterministic, so the identical
        // query text has similarity 1.0 with its own row.
        let results = bank
            .retrieve_associative("supply convoy delayed", 1, &ScopeFilter::default())
            .await
            .unwrap();
        assert_eq!(results, vec![String::from("supply convoy delayed")]);
    }

    #[tokio::test]
    async fn retrieval_bumps_access_count() {
        let bank = make_bank();
        bank.add("remember me", MemoryParams::public(1)).await.unwrap();
        let _ = bank
            .retrieve_associative("remember me", 1, &ScopeFilter::default())
            .await
            .unwrap();
        let records = bank.records_snapshot().await;
        assert_eq!(records.first().map(|r| r.access_count), Some(1));
    }

    #[tokio::test]
    async fn retrieve_recent_newest_first() {
        let bank = make_bank();
        bank.add("oldest", MemoryParams::public(1)).await.unwrap();
        bank.add("middle", MemoryParams::public(2)).await.unwrap();
        bank.add("newest", MemoryParams::public(3)).await.unwrap();

        let recent = bank.retrieve_recent(2, &ScopeFilter::default()).await;
        assert_eq!(recent, vec![String::from("newest"), String::from("middle")]);
    }

    #[tokio::test]
    async fn scan_applies_predicate_and_scope() {
        let bank = make_bank();
        bank.add("fuel low at depot", MemoryParams::public(1))
            .await
            .unwrap();
        bank.add("fuel reserves secret", MemoryParams::private("A", 1))
            .await
            .unwrap();
        bank.add("weather clearing", MemoryParams::public(1))
            .await
            .unwrap();

        let matches = bank
            .scan(|text| text.contains("fuel"), &ScopeFilter::for_agent("B"))
            .await;
        assert_eq!(matches, vec![String::from("fuel low at depot")]);
    }

    #[tokio::test]
    async fn state_round_trip_restores_hashes() {
        let bank = make_bank();
        bank.add("persisted fact", MemoryParams::public(1))
            .await
            .unwrap();
        let state = bank.get_state().await;
        assert_eq!(state.memory_count, 1);

        let fresh = make_bank();
        fresh.set_state(&state).await;
        // The hash set knows the row even though row data lives in the
        // backing store: a duplicate add is refused.
        assert!(!fresh.add("persisted fact", MemoryParams::public(1)).await.unwrap());
    }

    #[tokio::test]
    async fn clear_empties_rows_and_hashes() {
        let bank = make_bank();
        bank.add("gone soon", MemoryParams::public(1)).await.unwrap();
        bank.clear().await;
        assert!(bank.is_empty().await);
        assert!(bank.add("gone soon", MemoryParams::public(1)).await.unwrap());
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < 1e-12);
    }
}
